mod finding;
mod probe;
mod response;
mod run;

pub use finding::{Finding, FindingKind, Severity};
pub use probe::{HttpMethod, ProbeDescriptor, Purpose};
pub use response::{FailureKind, ResponseRecord};
pub use run::{RunStatus, RunSummary, ToolId, ToolRun};
