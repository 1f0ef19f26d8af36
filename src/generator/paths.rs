use once_cell::sync::Lazy;
use regex::Regex;

use super::dedup_preserving;

pub const SWAGGER_PATHS: &[&str] = &[
    "/swagger.json",
    "/swagger/v1/swagger.json",
    "/swagger/v2/swagger.json",
    "/api-docs",
    "/api-docs.json",
    "/v1/api-docs",
    "/v2/api-docs",
    "/v3/api-docs",
    "/openapi.json",
    "/openapi.yaml",
    "/openapi/v1.json",
    "/openapi/v2.json",
    "/docs",
    "/documentation",
    "/api/docs",
    "/api/documentation",
    "/swagger-ui.html",
    "/swagger-ui/",
    "/swagger-ui/index.html",
    "/redoc",
    "/api/swagger",
    "/api/openapi",
];

pub const GRAPHQL_PATHS: &[&str] = &[
    "/graphql",
    "/graphiql",
    "/v1/graphql",
    "/api/graphql",
    "/playground",
    "/graphql/playground",
    "/altair",
    "/graphql-explorer",
    "/__graphql",
];

pub const API_PATHS: &[&str] = &[
    "/api", "/api/v1", "/api/v2", "/api/v3",
    "/v1", "/v2", "/v3",
    "/rest", "/rest/v1", "/rest/v2",
    "/json", "/jsonapi",
    "/api/health", "/api/status", "/health", "/status", "/ping",
    "/api/version", "/version", "/api/info", "/info",
    "/api/users", "/api/user", "/users", "/user",
    "/api/admin", "/admin", "/admin/api",
    "/api/config", "/config", "/configuration",
    "/api/debug", "/debug", "/_debug",
    "/api/metrics", "/metrics", "/_metrics",
    "/actuator", "/actuator/health", "/actuator/info", "/actuator/env",
];

pub const GIT_PATHS: &[&str] = &[
    "/.git/HEAD",
    "/.git/config",
    "/.git/index",
    "/.git/logs/HEAD",
    "/.git/COMMIT_EDITMSG",
    "/.git/description",
    "/.git/info/exclude",
    "/.git/objects/",
    "/.git/refs/heads/master",
    "/.git/refs/heads/main",
];

pub const CONFIG_PATHS: &[&str] = &[
    "/.gitignore",
    "/.gitmodules",
    "/.gitattributes",
    "/config.php",
    "/config.json",
    "/config.yml",
    "/config.yaml",
    "/settings.json",
    "/settings.yml",
    "/application.properties",
    "/application.yml",
    "/database.yml",
    "/secrets.yml",
    "/credentials.json",
    "/wp-config.php",
    "/wp-config.php.bak",
    "/configuration.php",
    "/LocalSettings.php",
];

pub const ENV_PATHS: &[&str] = &[
    "/.env",
    "/.env.local",
    "/.env.development",
    "/.env.production",
    "/.env.staging",
    "/.env.example",
    "/.env.bak",
    "/.env.old",
    "/env.js",
    "/env.json",
];

pub const BACKUP_PATHS: &[&str] = &[
    "/backup.sql",
    "/backup.zip",
    "/backup.tar.gz",
    "/dump.sql",
    "/database.sql",
    "/db.sql",
    "/data.sql",
    "/.htaccess",
    "/.htpasswd",
    "/web.config",
    "/phpinfo.php",
    "/info.php",
    "/test.php",
    "/debug.php",
    "/admin.php.bak",
    "/index.php.bak",
    "/robots.txt",
    "/sitemap.xml",
];

pub const MAX_API_VERSION: u32 = 5;

static VERSION_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"v\d").expect("static pattern"));

pub fn union_paths(lists: &[&[&str]]) -> Vec<String> {
    dedup_preserving(lists.iter().flat_map(|list| list.iter().map(|p| p.to_string())))
}

pub fn has_version_token(path: &str) -> bool {
    VERSION_TOKEN.is_match(path)
}

pub fn expand_versions(paths: &[String]) -> Vec<String> {
    let mut variants = Vec::new();

    for path in paths.iter().filter(|p| has_version_token(p)) {
        for version in 1..=MAX_API_VERSION {
            let token = format!("v{}", version);
            variants.push(VERSION_TOKEN.replace(path, token.as_str()).into_owned());
            variants.push(format!("/{}{}", token, path));
        }
    }

    variants
}

pub fn with_versions(paths: Vec<String>) -> Vec<String> {
    let variants = expand_versions(&paths);
    dedup_preserving(paths.into_iter().chain(variants))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_union_preserves_first_seen_order() {
        let paths = union_paths(&[GRAPHQL_PATHS, API_PATHS]);
        assert_eq!(paths[0], "/graphql");
        assert_eq!(paths.iter().filter(|p| p.as_str() == "/v1/graphql").count(), 1);
        assert_eq!(paths.len(), GRAPHQL_PATHS.len() + API_PATHS.len());
    }

    #[test]
    fn test_version_expansion_counts() {
        let variants = expand_versions(&["/api/v2/users".to_string()]);
        let substituted: Vec<_> = variants.iter().filter(|v| v.starts_with("/api/v")).collect();
        let prefixed: Vec<_> = variants.iter().filter(|v| v.ends_with("/api/v2/users") && v.len() > 13).collect();

        assert_eq!(variants.len(), 10);
        assert_eq!(substituted.len(), 5);
        assert_eq!(prefixed.len(), 5);
        assert!(variants.contains(&"/api/v5/users".to_string()));
        assert!(variants.contains(&"/v3/api/v2/users".to_string()));
    }

    #[test]
    fn test_paths_without_token_are_not_expanded() {
        assert!(expand_versions(&["/graphql".to_string(), "/health".to_string()]).is_empty());
    }

    #[test]
    fn test_with_versions_dedupes() {
        let paths = with_versions(vec!["/v1".to_string(), "/v2".to_string()]);
        assert_eq!(paths.iter().filter(|p| p.as_str() == "/v2").count(), 1);
        assert!(paths.contains(&"/v5".to_string()));
        assert!(paths.contains(&"/v4/v1".to_string()));
        let mut sorted = paths.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), paths.len());
    }
}
