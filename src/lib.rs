pub mod analyzer;
pub mod cli;
pub mod config;
pub mod error;
pub mod generator;
pub mod http;
pub mod models;
pub mod reporter;
pub mod scanner;
pub mod signatures;
pub mod tools;

pub use config::{Settings, SettingsStore};
pub use error::{EngineError, EngineResult};
pub use models::{Finding, FindingKind, HttpMethod, ProbeDescriptor, ResponseRecord, RunStatus, Severity, ToolId, ToolRun};
pub use reporter::{ConsoleReporter, FindingSink, GroupView, HtmlExporter, JsonExporter};
pub use scanner::{Engine, RunContext, RunRegistry, Tool, Verdict};
