use crate::models::{FindingKind, ResponseRecord, Severity};
use crate::signatures::{Category, SignatureMatch, SignatureRegistry, CODE_SCAN_LIMIT, bounded};

use super::differ::DiffThresholds;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathCategory {
    pub name: &'static str,
    pub description: &'static str,
    pub kind: FindingKind,
    pub severity: Severity,
}

const SWAGGER: PathCategory = PathCategory {
    name: "Swagger/OpenAPI",
    description: "API documentation found",
    kind: FindingKind::Endpoint,
    severity: Severity::High,
};
const GRAPHQL: PathCategory = PathCategory {
    name: "GraphQL",
    description: "GraphQL endpoint found",
    kind: FindingKind::Endpoint,
    severity: Severity::High,
};
const ACTUATOR: PathCategory = PathCategory {
    name: "Spring Actuator",
    description: "Management endpoint exposed",
    kind: FindingKind::Warning,
    severity: Severity::High,
};
const DEBUG: PathCategory = PathCategory {
    name: "Debug Endpoint",
    description: "Debug interface accessible",
    kind: FindingKind::Warning,
    severity: Severity::High,
};
const HEALTH: PathCategory = PathCategory {
    name: "Health Check",
    description: "Service health endpoint",
    kind: FindingKind::Info,
    severity: Severity::Info,
};
const METRICS: PathCategory = PathCategory {
    name: "Metrics",
    description: "Metrics endpoint accessible",
    kind: FindingKind::Warning,
    severity: Severity::Medium,
};
const CONFIG: PathCategory = PathCategory {
    name: "Configuration",
    description: "Configuration endpoint exposed",
    kind: FindingKind::Secret,
    severity: Severity::High,
};
const GENERIC: PathCategory = PathCategory {
    name: "API Endpoint",
    description: "API path accessible",
    kind: FindingKind::Endpoint,
    severity: Severity::Info,
};

pub fn path_category(path: &str, body: &str) -> PathCategory {
    let path = path.to_lowercase();
    let head: String = body.chars().take(1000).collect::<String>().to_lowercase();

    if path.contains("swagger") || path.contains("openapi") || head.contains("\"swagger\"") || head.contains("\"openapi\"") {
        SWAGGER
    } else if path.contains("graphql") || path.contains("graphiql") || head.contains("graphql") || head.contains("__schema") {
        GRAPHQL
    } else if path.contains("actuator") {
        ACTUATOR
    } else if path.contains("debug") {
        DEBUG
    } else if path.contains("health") || path.contains("status") || path.contains("ping") {
        HEALTH
    } else if path.contains("metrics") {
        METRICS
    } else if path.contains("config") || path.contains("env") {
        CONFIG
    } else {
        GENERIC
    }
}

pub fn sql_error_rule(registry: &SignatureRegistry, response: &ResponseRecord) -> Option<SignatureMatch> {
    if !response.success {
        return None;
    }
    registry.first_match(Category::SqlErrors, bounded(&response.body, CODE_SCAN_LIMIT))
}

pub fn header_bypass_rule(no_auth: &ResponseRecord, response: &ResponseRecord) -> bool {
    matches!(no_auth.status, 401 | 403) && response.is_status(200)
}

pub fn idor_rule(response: &ResponseRecord, thresholds: &DiffThresholds) -> bool {
    if !response.is_status(200) || response.body_len() <= thresholds.idor_min_body {
        return false;
    }
    let lower = response.body.to_lowercase();
    !["not found", "unauthorized", "forbidden"]
        .iter()
        .any(|marker| lower.contains(marker))
}

pub fn discovery_rule(response: &ResponseRecord) -> bool {
    response.is_status(200)
}
