use serde::{Deserialize, Serialize};

use super::{dedup_preserving, split_list};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ParamList {
    Common,
    Admin,
    Debug,
    Api,
}

pub struct ParamWordlists;

impl ParamWordlists {
    const COMMON: &'static [&'static str] = &[
        "id", "page", "limit", "offset", "sort", "order", "filter", "search", "query", "q",
        "name", "email", "user", "username", "password", "pass", "token", "key", "api_key",
        "file", "path", "url", "redirect", "return", "callback", "next", "ref", "source",
        "type", "action", "cmd", "command", "exec", "method", "function", "func",
        "data", "content", "body", "message", "text", "title", "description", "comment",
        "category", "tag", "status", "state", "mode", "format", "output", "response",
        "start", "end", "from", "to", "date", "time", "year", "month", "day",
        "min", "max", "count", "total", "size", "length", "width", "height",
        "include", "exclude", "fields", "select", "columns", "expand", "embed",
        "version", "v", "lang", "language", "locale", "country", "region",
        "access_token", "auth", "authorization", "bearer", "jwt", "session", "sid",
        "price", "amount", "quantity", "qty", "value", "cost", "discount", "coupon",
    ];

    const ADMIN: &'static [&'static str] = &[
        "admin", "administrator", "root", "superuser", "system", "internal", "private",
        "debug", "test", "dev", "development", "staging", "production", "prod",
        "config", "configuration", "settings", "options", "preferences", "params",
        "role", "roles", "permission", "permissions", "privilege", "privileges", "access",
        "bypass", "skip", "override", "force", "ignore", "disable", "enable", "allow",
        "hidden", "secret", "confidential", "restricted", "internal_only",
        "backdoor", "master", "god", "sudo", "elevation", "escalate",
        "export", "import", "backup", "restore", "reset", "delete", "purge", "truncate",
        "sql", "query", "execute", "raw", "direct", "inject", "payload",
        "shell", "console", "terminal", "exec", "run", "spawn", "process",
        "upload", "download", "read", "write", "create", "modify", "update",
    ];

    const DEBUG: &'static [&'static str] = &[
        "debug", "verbose", "trace", "log", "logging", "logger",
        "error", "errors", "exception", "exceptions", "stacktrace", "stack",
        "dump", "print", "show", "display", "reveal", "expose",
        "profile", "profiler", "profiling", "benchmark", "performance", "timing",
        "cache", "nocache", "no_cache", "clear_cache", "refresh", "reload",
        "mock", "fake", "stub", "simulate", "emulate",
        "dry_run", "dryrun", "preview", "test_mode", "sandbox",
        "env", "environment", "context", "scope", "namespace",
    ];

    const API: &'static [&'static str] = &[
        "api_version", "api_key", "api_secret", "api_token", "app_id", "app_key",
        "client_id", "client_secret", "consumer_key", "consumer_secret",
        "grant_type", "scope", "scopes", "audience", "resource",
        "response_type", "redirect_uri", "state", "nonce", "code_challenge",
        "per_page", "page_size", "cursor", "after", "before", "since", "until",
        "include_deleted", "include_hidden", "show_all", "all",
        "webhook", "webhook_url", "callback_url", "notify_url", "return_url",
        "signature", "sig", "hash", "checksum", "hmac", "digest",
    ];

    pub fn get(list: ParamList) -> &'static [&'static str] {
        match list {
            ParamList::Common => Self::COMMON,
            ParamList::Admin => Self::ADMIN,
            ParamList::Debug => Self::DEBUG,
            ParamList::Api => Self::API,
        }
    }

    pub fn build(lists: &[ParamList], custom: Option<&str>) -> Vec<String> {
        let builtin = lists
            .iter()
            .flat_map(|list| Self::get(*list).iter().map(|p| p.to_string()));
        let custom = custom.map(|c| split_list(c, &['\n'])).unwrap_or_default();
        dedup_preserving(builtin.chain(custom))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_dedupes_across_lists() {
        let words = ParamWordlists::build(&[ParamList::Common, ParamList::Admin], Some("debug\n id \n\nshiny\n"));
        assert_eq!(words.iter().filter(|w| w.as_str() == "query").count(), 1);
        assert_eq!(words.iter().filter(|w| w.as_str() == "id").count(), 1);
        assert_eq!(words.iter().filter(|w| w.as_str() == "debug").count(), 1);
        assert_eq!(words.last().map(String::as_str), Some("shiny"));
    }

    #[test]
    fn test_custom_only() {
        let words = ParamWordlists::build(&[], Some("a\r\nb\n"));
        assert_eq!(words, vec!["a".to_string(), "b".to_string()]);
    }
}
