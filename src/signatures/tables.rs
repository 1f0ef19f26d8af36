pub(crate) type Def = (&'static str, &'static str, &'static str);

pub(crate) const SECRET_PATTERNS: &[Def] = &[
    ("api-key", "API Key", r#"(?i)["'`]?(?:api[_-]?key|apikey)["'`]?\s*[:=]\s*["'`]([a-zA-Z0-9_\-]{20,})["'`]"#),
    ("secret-key", "Secret Key", r#"(?i)["'`]?(?:secret[_-]?key|secretkey)["'`]?\s*[:=]\s*["'`]([a-zA-Z0-9_\-]{20,})["'`]"#),
    ("access-token", "Access Token", r#"(?i)["'`]?(?:access[_-]?token|accesstoken)["'`]?\s*[:=]\s*["'`]([a-zA-Z0-9_\-.]{20,})["'`]"#),
    ("auth-token", "Auth Token", r#"(?i)["'`]?(?:auth[_-]?token|authtoken)["'`]?\s*[:=]\s*["'`]([a-zA-Z0-9_\-.]{20,})["'`]"#),
    ("private-key", "Private Key", r#"(?i)["'`]?(?:private[_-]?key|privatekey)["'`]?\s*[:=]\s*["'`]([^"'`]{20,})["'`]"#),
    ("password", "Password", r#"(?i)["'`]?password["'`]?\s*[:=]\s*["'`]([^"'`]{6,})["'`]"#),
    ("aws-access-key-id", "AWS Access Key", r#"(?i)aws[_-]?access[_-]?key[_-]?id\s*[:=]\s*["'`]?((?-i)AKIA[A-Z0-9]{16})["'`]?"#),
    ("aws-secret-key", "AWS Secret Key", r#"(?i)aws[_-]?secret[_-]?access[_-]?key\s*[:=]\s*["'`]?([a-zA-Z0-9+/]{40})["'`]?"#),
    ("github-pat", "GitHub Token", r"ghp_[a-zA-Z0-9]{36}"),
    ("github-oauth", "GitHub Token", r"gho_[a-zA-Z0-9]{36}"),
    ("github-fine-grained", "GitHub Token", r"github_pat_[a-zA-Z0-9]{22}_[a-zA-Z0-9]{59}"),
    ("openai", "OpenAI API Key", r"sk-[a-zA-Z0-9]{48}"),
    ("stripe-live", "Stripe Live Key", r"sk_live_[a-zA-Z0-9]{24}"),
    ("stripe-test", "Stripe Test Key", r"sk_test_[a-zA-Z0-9]{24}"),
    ("square", "Square Access Token", r"sq0csp-[a-zA-Z0-9_\-]{43}"),
    ("sendgrid", "SendGrid Key", r"SG\.[a-zA-Z0-9_\-]{22}\.[a-zA-Z0-9_\-]{43}"),
    ("slack", "Slack Token", r"xox[baprs]-[a-zA-Z0-9\-]{10,}"),
    ("google-oauth", "Google OAuth Token", r"ya29\.[a-zA-Z0-9_\-]{68,}"),
    ("jwt", "JWT Token", r"eyJ[a-zA-Z0-9_\-]*\.eyJ[a-zA-Z0-9_\-]*\.[a-zA-Z0-9_\-]*"),
];

pub(crate) const ENDPOINT_PATTERNS: &[Def] = &[
    ("api-path", "API path", r#"(?i)["'`](/api/[^"'`\s<>]+)["'`]"#),
    ("versioned-path", "Versioned path", r#"(?i)["'`](/v[0-9]+/[^"'`\s<>]+)["'`]"#),
    ("graphql-path", "GraphQL path", r#"(?i)["'`](/graphql[^"'`\s<>]*)["'`]"#),
    ("rest-path", "REST path", r#"(?i)["'`](/rest/[^"'`\s<>]+)["'`]"#),
    ("ajax-path", "AJAX path", r#"(?i)["'`](/ajax/[^"'`\s<>]+)["'`]"#),
    ("json-path", "JSON path", r#"(?i)["'`](/json/[^"'`\s<>]+)["'`]"#),
    ("fetch-call", "fetch() call", r#"(?i)fetch\s*\(\s*["'`]([^"'`]+)["'`]"#),
    ("axios-call", "axios call", r#"(?i)axios\s*[.(]\s*(?:get|post|put|delete|patch)\s*\(\s*["'`]([^"'`]+)["'`]"#),
    ("jquery-call", "jQuery AJAX call", r#"(?i)\$\.(?:ajax|get|post)\s*\(\s*["'`]([^"'`]+)["'`]"#),
    ("xhr-open", "XMLHttpRequest.open", r#"(?i)\.open\s*\(\s*["'`](?:GET|POST|PUT|DELETE)["'`]\s*,\s*["'`]([^"'`]+)["'`]"#),
    ("url-assignment", "URL assignment", r#"(?i)url\s*[:=]\s*["'`]([^"'`]+api[^"'`]+)["'`]"#),
];

pub(crate) const DOMAIN_PATTERNS: &[Def] = &[
    ("absolute-url", "Absolute URL", r"(?i)https?://(?:[a-zA-Z0-9][-a-zA-Z0-9]*\.)+[a-zA-Z]{2,}"),
    ("quoted-host", "Quoted host", r#"(?i)["'`]((?:[a-zA-Z0-9][-a-zA-Z0-9]*\.)+(?:com|org|net|io|co|dev|app|xyz|cloud|ai))["'`]"#),
];

pub(crate) const PATH_PATTERNS: &[Def] = &[(
    "quoted-path",
    "Quoted path",
    r#"(?i)["'`](/[a-zA-Z0-9_\-]+(?:/[a-zA-Z0-9_\-]+)+)["'`]"#,
)];

pub(crate) const EMAIL_PATTERNS: &[Def] = &[(
    "email",
    "Email Address",
    r"[a-zA-Z0-9._%+\-]+@[a-zA-Z0-9.\-]+\.[a-zA-Z]{2,}",
)];

pub(crate) const IP_PATTERNS: &[Def] = &[
    (
        "ipv4",
        "IPv4 address",
        r"\b(?:(?:25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?)\.){3}(?:25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?)\b",
    ),
    ("ipv4-port", "IPv4 with port", r"\b(?:[0-9]{1,3}\.){3}[0-9]{1,3}(?::[0-9]{1,5})?\b"),
];

pub(crate) const SQL_ERROR_PATTERNS: &[Def] = &[
    ("mysql", "MySQL", r"(?i)SQL syntax.*MySQL"),
    ("mysql", "MySQL", r"(?i)Warning.*mysql_"),
    ("mysql", "MySQL", r"(?i)MySqlException"),
    ("mysql", "MySQL", r"(?i)valid MySQL result"),
    ("mysql", "MySQL", r"(?i)check the manual that corresponds to your (MySQL|MariaDB)"),
    ("mysql", "MySQL", r"(?i)MySqlClient"),
    ("mysql", "MySQL", r"(?i)com\.mysql\.jdbc"),
    ("postgresql", "PostgreSQL", r"(?i)PostgreSQL.*ERROR"),
    ("postgresql", "PostgreSQL", r"(?i)Warning.*pg_"),
    ("postgresql", "PostgreSQL", r"(?i)valid PostgreSQL result"),
    ("postgresql", "PostgreSQL", r"(?i)Npgsql"),
    ("postgresql", "PostgreSQL", r"(?i)PG::SyntaxError"),
    ("postgresql", "PostgreSQL", r"(?i)org\.postgresql\.util\.PSQLException"),
    ("mssql", "MSSQL", r"(?i)Driver.* SQL[-_ ]*Server"),
    ("mssql", "MSSQL", r"(?i)OLE DB.* SQL Server"),
    ("mssql", "MSSQL", r"(?i)SQLServer JDBC"),
    ("mssql", "MSSQL", r"(?i)Microsoft SQL Native Client"),
    ("mssql", "MSSQL", r"(?i)ODBC SQL Server Driver"),
    ("mssql", "MSSQL", r"(?i)SQLSrv"),
    ("mssql", "MSSQL", r"(?i)Unclosed quotation mark"),
    ("oracle", "Oracle", r"(?i)ORA-[0-9]+"),
    ("oracle", "Oracle", r"(?i)Oracle error"),
    ("oracle", "Oracle", r"(?i)Oracle.*Driver"),
    ("oracle", "Oracle", r"(?i)Warning.*oci_"),
    ("oracle", "Oracle", r"(?i)quoted string not properly terminated"),
    ("sqlite", "SQLite", r"(?i)SQLite.*Exception"),
    ("sqlite", "SQLite", r"(?i)System\.Data\.SQLite\.SQLiteException"),
    ("sqlite", "SQLite", r"(?i)Warning.*sqlite_"),
    ("sqlite", "SQLite", r"(?i)SQLite error"),
    ("sqlite", "SQLite", r"(?i)sqlite3\.OperationalError"),
    ("sqlite", "SQLite", r"(?i)SQLITE_ERROR"),
    ("generic", "Generic", r"(?i)SQL error"),
    ("generic", "Generic", r"(?i)SQL syntax"),
    ("generic", "Generic", r"(?i)unclosed quotation"),
    ("generic", "Generic", r"(?i)unterminated string"),
    ("generic", "Generic", r"(?i)syntax error"),
    ("generic", "Generic", r"(?i)query failed"),
    ("generic", "Generic", r"(?i)unexpected end of SQL"),
    ("generic", "Generic", r"(?i)invalid query"),
];

pub(crate) const TAKEOVER_PATTERNS: &[Def] = &[
    ("github", "GitHub", r"(?i)There isn't a GitHub Pages site here"),
    ("heroku", "Heroku", r"(?i)No such app"),
    ("heroku", "Heroku", r"(?i)no-such-app"),
    ("aws-s3", "AWS S3", r"(?i)NoSuchBucket"),
    ("aws-s3", "AWS S3", r"(?i)The specified bucket does not exist"),
    ("azure", "Azure", r"(?i)404 Web Site not found"),
    ("shopify", "Shopify", r"(?i)Sorry, this shop is currently unavailable"),
    ("tumblr", "Tumblr", r"(?i)There's nothing here"),
    ("wordpress", "WordPress", r"(?i)Do you want to register"),
    ("ghost", "Ghost", r"(?i)The thing you were looking for is no longer here"),
    ("surge", "Surge", r"(?i)project not found"),
    ("bitbucket", "Bitbucket", r"(?i)Repository not found"),
    ("pantheon", "Pantheon", r"(?i)The gods are wise"),
    ("fastly", "Fastly", r"(?i)Fastly error: unknown domain"),
    ("zendesk", "Zendesk", r"(?i)Help Center Closed"),
];

pub(crate) const TAKEOVER_CNAME_SUFFIXES: &[&str] = &[
    "amazonaws.com",
    "s3.amazonaws.com",
    "s3-website",
    "cloudfront.net",
    "azurewebsites.net",
    "blob.core.windows.net",
    "cloudapp.net",
    "azureedge.net",
    "trafficmanager.net",
    "herokuapp.com",
    "herokudns.com",
    "wordpress.com",
    "pantheonsite.io",
    "domains.tumblr.com",
    "ghost.io",
    "myshopify.com",
    "shopify.com",
    "surge.sh",
    "bitbucket.io",
    "ghost.org",
    "helpjuice.com",
    "helpscoutdocs.com",
    "feedpress.me",
    "freshdesk.com",
    "readme.io",
    "statuspage.io",
    "uservoice.com",
    "desk.com",
    "teamwork.com",
    "unbounce.com",
    "tictail.com",
    "bigcartel.com",
    "cargo.site",
];

pub(crate) const CACHE_HEADER_NAMES: &[&str] = &[
    "cache-control",
    "x-cache",
    "x-cache-hit",
    "cf-cache-status",
    "x-varnish",
    "x-proxy-cache",
    "age",
    "x-served-by",
    "x-cache-status",
    "x-fastly-request-id",
    "x-amz-cf-pop",
];
