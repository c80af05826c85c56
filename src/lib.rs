//! glossfill - Checkpointed batch generation for sparse glossary tables.
//!
//! ## Architecture
//!
//! glossfill fills the empty cells of a row×column CSV table (rows =
//! terms, columns = content sections) by calling a chat-completion API,
//! and survives interruption: completed cells are recorded in a
//! checkpoint so a restarted run never re-requests or re-pays for them.
//!
//! Pipeline: discover empty cells → dispatch in concurrency-bounded
//! batches → retry/fallback per cell → commit table and checkpoint
//! atomically after each batch.
//!
//! ## Epistemic Design
//!
//! - K_i (Knowledge): Compile-time enforced invariants (types, enums)
//! - B_i (Beliefs): Runtime fallible operations (Result, Option)
//! - I^R (Resolvable): User-configurable parameters
//! - I^B (Bounded): Network/API uncertainties (retry, fallback)

pub mod client;
pub mod models;
pub mod pipeline;
pub mod store;

// Re-exports for convenience
pub use client::{ApiClient, Generate, GenerationClient, RetryPolicy};
pub use models::{CellKey, Config, Direction, FillStats, GlossfillError, Result, Task};
pub use pipeline::{discover_tasks, Dispatcher};
pub use store::{Checkpoint, Table};
