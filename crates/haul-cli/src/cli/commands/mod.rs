//! CLI command handlers, one per file.

mod checksum;
mod fetch;
mod forget;
mod plan;
mod progress;
mod sessions;
mod upload;

pub use checksum::run_checksum;
pub use fetch::run_fetch;
pub use forget::run_forget;
pub use plan::run_plan;
pub use sessions::run_sessions;
pub use upload::run_upload;
