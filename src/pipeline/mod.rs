//! The fill pipeline: task discovery and batch dispatch.

mod discover;
mod dispatcher;

pub use discover::discover_tasks;
pub use dispatcher::Dispatcher;
