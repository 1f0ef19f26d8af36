pub const SUBDOMAIN_PREFIXES: &[&str] = &[
    "www", "mail", "ftp", "admin", "blog", "shop", "store", "api", "dev", "staging",
    "test", "beta", "alpha", "demo", "app", "apps", "mobile", "m", "cdn", "static",
    "assets", "images", "img", "media", "video", "download", "downloads", "upload",
    "portal", "login", "auth", "secure", "ssl", "vpn", "remote", "gateway",
    "dashboard", "panel", "control", "console", "manage", "management",
    "support", "help", "docs", "documentation", "wiki", "forum", "community",
    "status", "monitor", "health", "metrics", "analytics", "stats",
    "smtp", "pop", "imap", "webmail", "email", "mx", "ns", "dns",
    "db", "database", "mysql", "postgres", "mongo", "redis", "cache",
    "web", "web1", "web2", "server", "server1", "server2", "node", "node1",
    "prod", "production", "stage", "uat", "qa", "sandbox", "internal",
    "git", "gitlab", "github", "bitbucket", "jenkins", "ci", "build",
    "aws", "azure", "cloud", "gcp", "s3", "storage", "backup",
    "api1", "api2", "v1", "v2", "graphql", "rest", "soap", "rpc",
    "news", "events", "calendar", "jobs", "careers", "about", "contact",
    "payment", "pay", "checkout", "cart", "order", "orders", "invoice",
    "crm", "erp", "hr", "finance", "sales", "marketing",
    "proxy", "edge", "lb", "loadbalancer", "nginx", "apache",
    "search", "elastic", "solr", "kibana", "grafana", "prometheus",
];

pub const DNS_PREFIXES: &[&str] = &[
    "www", "mail", "ftp", "admin", "api", "dev", "staging", "test",
    "app", "blog", "shop", "store", "secure", "vpn", "remote",
    "portal", "cdn", "static", "assets", "img", "images", "media",
    "ns1", "ns2", "mx", "smtp", "pop", "imap", "webmail",
];

pub fn expand(prefixes: &[&str], domain: &str) -> Vec<String> {
    prefixes.iter().map(|prefix| format!("{}.{}", prefix, domain)).collect()
}
