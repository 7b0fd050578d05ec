//! CLI command handlers. Each command is in its own file.

mod get;
mod job;
mod list;
mod put;

pub use get::run_get;
pub use job::run_job;
pub use list::{run_list, ListOptions};
pub use put::{run_put, PutSource};
