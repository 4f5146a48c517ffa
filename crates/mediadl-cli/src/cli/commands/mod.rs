//! CLI command handlers, one file per command.

mod add;
mod cancel;
mod health;
mod loops;
mod provider;
mod retry;
mod search;
mod status;

pub use add::{run_add, AddArgs};
pub use cancel::run_cancel;
pub use health::run_health;
pub use loops::{run_scheduler, run_worker};
pub use provider::run_provider;
pub use retry::run_retry;
pub use search::run_search;
pub use status::run_status;
