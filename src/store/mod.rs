//! Durable state: the glossary table, the completion checkpoint, and the
//! atomic-write primitive both are committed through.

mod atomic;
mod checkpoint;
mod table;

pub use atomic::write_atomic;
pub use checkpoint::Checkpoint;
pub use table::Table;
