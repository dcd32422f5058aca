//! CLI command handlers, one per file.

mod fetch;
mod status;

pub use fetch::{run_fetch, FetchArgs};
pub use status::run_status;
