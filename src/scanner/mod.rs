mod engine;
mod registry;
mod scheduler;

pub use engine::{Engine, Preparation, RunContext, Tool, Verdict};
pub use registry::{ActiveRun, RunRegistry};
pub use scheduler::{SchedulePolicy, Scheduler, SettledGroups};
