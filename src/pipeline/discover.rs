//! Task discovery: diff the table against the checkpoint.
//!
//! Discovery runs once per process start. The backlog it returns is the
//! complete, ordered set of cells this run will attempt; batching and
//! commits happen downstream.

use crate::models::{CellKey, Direction, Task};
use crate::store::{Checkpoint, Table};
use tracing::{debug, info};

/// Scan the table for empty, unchecked cells in rows with a non-empty
/// term, in the requested direction.
pub fn discover_tasks(table: &Table, checkpoint: &Checkpoint, direction: Direction) -> Vec<Task> {
    let mut tasks = Vec::new();

    for row in 1..=table.data_rows() {
        let term = match table.term(row) {
            Some(t) if !t.trim().is_empty() => t,
            _ => continue,
        };

        for (col, section) in table.headers().iter().enumerate().skip(1) {
            if section.trim().is_empty() {
                continue;
            }

            let key = CellKey::new(row, col);
            if checkpoint.contains(key) || !table.is_empty_cell(key) {
                continue;
            }

            tasks.push(Task {
                key,
                term: term.to_string(),
                section: section.clone(),
            });
        }
    }

    if direction == Direction::BottomUp {
        tasks.reverse();
    }

    if tasks.is_empty() {
        info!("No empty cells to fill");
    } else {
        let preview: Vec<String> = tasks
            .iter()
            .take(3)
            .map(|t| format!("{} ({})", t.key, t.term))
            .collect();
        debug!(first = %preview.join(", "), "Backlog preview");
        info!(cells = tasks.len(), ?direction, "Discovered cells to fill");
    }

    tasks
}
