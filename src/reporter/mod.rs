mod console;
mod export;
mod groups;
mod sink;

pub use console::ConsoleReporter;
pub use export::{HtmlExporter, JsonExporter};
pub use groups::{GroupEntry, GroupView};
pub use sink::{FindingSink, TieBreak};
