//! Batch-synchronous dispatch loop.
//!
//! Epistemic foundation:
//! - K_i: Batches run strictly in discovery order; a batch is fully
//!   settled before its results are committed
//! - K_i: Table and checkpoint are owned exclusively by this loop, so
//!   memory needs no locking; crash safety comes from atomic saves
//! - B_i: Any cell in a batch may fail without disturbing its siblings
//! - I^B: A kill mid-batch loses only that batch's uncommitted results
//!
//! Commits are per batch, not per task: a crash between a task's success
//! and its batch commit regenerates that cell next run (extra spend, no
//! corruption). The trade is documented in DESIGN.md.

use crate::client::Generate;
use crate::models::{FillStats, GenerationOutcome, Result, Task};
use crate::store::{Checkpoint, Table};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{info, warn};

/// Consumes the backlog in fixed-size batches under a concurrency ceiling.
pub struct Dispatcher<G> {
    generator: Arc<G>,
    /// Concurrency ceiling: in-flight generations at any moment
    workers: usize,
    /// Cells per batch (workers × multiplier)
    batch_size: usize,
}

impl<G: Generate> Dispatcher<G> {
    pub fn new(generator: Arc<G>, workers: usize, batch_multiplier: usize) -> Self {
        let workers = workers.max(1);
        Self {
            generator,
            workers,
            batch_size: (workers * batch_multiplier).max(1),
        }
    }

    /// Drain the backlog: generate batch by batch, committing table and
    /// checkpoint after each batch settles.
    ///
    /// Returns Err only for persistence failures; generation failures are
    /// tallied in the stats.
    pub async fn run(
        &self,
        table: &mut Table,
        checkpoint: &mut Checkpoint,
        tasks: Vec<Task>,
    ) -> Result<FillStats> {
        let start = Instant::now();
        let mut stats = FillStats {
            total_tasks: tasks.len(),
            ..FillStats::default()
        };

        if tasks.is_empty() {
            return Ok(stats);
        }

        let batch_total = tasks.len().div_ceil(self.batch_size);
        info!(
            cells = tasks.len(),
            batches = batch_total,
            workers = self.workers,
            batch_size = self.batch_size,
            "Starting fill pass"
        );

        let pb = ProgressBar::new(tasks.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} ({percent}%) {msg}")
                .map_err(|e| crate::models::GlossfillError::Internal(e.to_string()))?
                .progress_chars("##-"),
        );

        let semaphore = Arc::new(Semaphore::new(self.workers));

        for (batch_idx, batch) in tasks.chunks(self.batch_size).enumerate() {
            let batch_num = batch_idx + 1;
            info!(batch = batch_num, of = batch_total, cells = batch.len(), "Dispatching batch");

            // Fan the whole batch out at once; the semaphore enforces the
            // ceiling, join_all waits for full settlement.
            let settled = futures::future::join_all(batch.iter().map(|task| {
                let semaphore = Arc::clone(&semaphore);
                let generator = Arc::clone(&self.generator);
                async move {
                    let permit = semaphore.acquire().await;
                    let outcome = match permit {
                        Ok(_permit) => generator.generate(task).await,
                        // Closed semaphore cannot happen while we hold it;
                        // degrade to a task failure rather than poisoning the run
                        Err(_) => GenerationOutcome::Failed,
                    };
                    (task, outcome)
                }
            }))
            .await;

            let mut filled_in_batch = 0usize;
            for (task, outcome) in settled {
                match outcome {
                    GenerationOutcome::Generated { content, model } => {
                        if table.set(task.key, content) {
                            checkpoint.mark_done(task.key);
                            filled_in_batch += 1;
                            stats.filled += 1;
                        } else {
                            // The cell refused the write (already filled or
                            // out of bounds); without a checkpoint entry it
                            // resolves itself on the next discovery pass
                            warn!(key = %task.key, model = %model, "Discarding result for unwritable cell");
                            stats.failed += 1;
                        }
                    }
                    GenerationOutcome::Failed => {
                        stats.failed += 1;
                    }
                }
                pb.inc(1);
            }

            // Commit order: table first, then checkpoint. A crash between
            // the two leaves filled cells without checkpoint entries, and
            // discovery already skips non-empty cells.
            table.save()?;
            checkpoint.save()?;
            stats.batches += 1;

            pb.set_message(format!("filled: {}, failed: {}", stats.filled, stats.failed));
            info!(
                batch = batch_num,
                of = batch_total,
                filled = filled_in_batch,
                cells = batch.len(),
                "Batch committed"
            );
        }

        pb.finish_with_message(format!(
            "done: {} filled, {} failed",
            stats.filled, stats.failed
        ));

        stats.runtime_secs = start.elapsed().as_secs_f64();
        info!(
            filled = stats.filled,
            failed = stats.failed,
            batches = stats.batches,
            runtime_secs = format!("{:.1}", stats.runtime_secs),
            "Fill pass complete"
        );

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CellKey;
    use crate::pipeline::discover_tasks;
    use crate::models::Direction;
    use futures::future::BoxFuture;
    use std::collections::HashSet;
    use std::fs;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Mock generator: fails for terms on its deny list, records every
    /// task it was asked to generate.
    struct MockGenerator {
        fail_terms: HashSet<String>,
        requested: Mutex<Vec<CellKey>>,
    }

    impl MockGenerator {
        fn new(fail_terms: &[&str]) -> Self {
            Self {
                fail_terms: fail_terms.iter().map(|s| s.to_string()).collect(),
                requested: Mutex::new(Vec::new()),
            }
        }

        fn requested(&self) -> Vec<CellKey> {
            self.requested.lock().unwrap().clone()
        }
    }

    impl Generate for MockGenerator {
        fn generate<'a>(&'a self, task: &'a Task) -> BoxFuture<'a, GenerationOutcome> {
            self.requested.lock().unwrap().push(task.key);
            let outcome = if self.fail_terms.contains(&task.term) {
                GenerationOutcome::Failed
            } else {
                GenerationOutcome::Generated {
                    content: format!("{} of {}, generated", task.section, task.term),
                    model: "mock-model".to_string(),
                }
            };
            Box::pin(async move { outcome })
        }
    }

    struct Fixture {
        _dir: TempDir,
        table_path: PathBuf,
        checkpoint_path: PathBuf,
    }

    fn fixture(contents: &str) -> Fixture {
        let dir = TempDir::new().unwrap();
        let table_path = dir.path().join("table.csv");
        let checkpoint_path = dir.path().join("checkpoint.json");
        fs::write(&table_path, contents).unwrap();
        Fixture {
            _dir: dir,
            table_path,
            checkpoint_path,
        }
    }

    async fn run_pass(
        fx: &Fixture,
        generator: Arc<MockGenerator>,
    ) -> (FillStats, Table, Checkpoint) {
        let mut table = Table::load(&fx.table_path).unwrap();
        let mut checkpoint = Checkpoint::load(&fx.checkpoint_path).unwrap();
        checkpoint.reconcile(&table);
        let tasks = discover_tasks(&table, &checkpoint, Direction::TopDown);

        let dispatcher = Dispatcher::new(generator, 2, 1);
        let stats = dispatcher
            .run(&mut table, &mut checkpoint, tasks)
            .await
            .unwrap();
        (stats, table, checkpoint)
    }

    #[tokio::test]
    async fn test_example_a_both_cells_filled() {
        let fx = fixture("Term,definition\nAlpha,\nBeta,\n");
        let generator = Arc::new(MockGenerator::new(&[]));

        let (stats, table, checkpoint) = run_pass(&fx, Arc::clone(&generator)).await;

        assert_eq!(generator.requested().len(), 2);
        assert_eq!(stats.filled, 2);
        assert_eq!(stats.failed, 0);
        assert!(!table.is_empty_cell(CellKey::new(1, 1)));
        assert!(!table.is_empty_cell(CellKey::new(2, 1)));
        assert_eq!(checkpoint.len(), 2);

        // The committed files agree with memory
        let reloaded = Checkpoint::load(&fx.checkpoint_path).unwrap();
        assert_eq!(reloaded.len(), 2);
    }

    #[tokio::test]
    async fn test_example_b_failure_leaves_cell_and_checkpoint_alone() {
        let fx = fixture("Term,definition\nAlpha,\nBeta,\n");
        let generator = Arc::new(MockGenerator::new(&["Beta"]));

        let (stats, table, checkpoint) = run_pass(&fx, generator).await;

        assert_eq!(stats.filled, 1);
        assert_eq!(stats.failed, 1);
        assert!(!table.is_empty_cell(CellKey::new(1, 1)));
        assert!(table.is_empty_cell(CellKey::new(2, 1)));
        assert_eq!(checkpoint.len(), 1);
        assert!(checkpoint.contains(CellKey::new(1, 1)));
    }

    #[tokio::test]
    async fn test_idempotent_rerun_issues_no_calls() {
        let fx = fixture("Term,definition\nAlpha,\nBeta,\n");

        let first = Arc::new(MockGenerator::new(&[]));
        run_pass(&fx, Arc::clone(&first)).await;
        let table_bytes = fs::read(&fx.table_path).unwrap();
        let checkpoint_bytes = fs::read(&fx.checkpoint_path).unwrap();

        let second = Arc::new(MockGenerator::new(&[]));
        let (stats, _, _) = run_pass(&fx, Arc::clone(&second)).await;

        assert_eq!(second.requested().len(), 0);
        assert_eq!(stats.total_tasks, 0);
        assert_eq!(stats.batches, 0);
        assert_eq!(fs::read(&fx.table_path).unwrap(), table_bytes);
        assert_eq!(fs::read(&fx.checkpoint_path).unwrap(), checkpoint_bytes);
    }

    #[tokio::test]
    async fn test_resume_skips_checkpointed_cells() {
        let fx = fixture("Term,definition\nAlpha,\nBeta,\nGamma,\n");

        // First run fails Beta and Gamma, so only Alpha is committed
        let first = Arc::new(MockGenerator::new(&["Beta", "Gamma"]));
        run_pass(&fx, first).await;

        // Second run must not re-request Alpha
        let second = Arc::new(MockGenerator::new(&[]));
        let (stats, _, checkpoint) = run_pass(&fx, Arc::clone(&second)).await;

        let requested = second.requested();
        assert_eq!(requested.len(), 2);
        assert!(!requested.contains(&CellKey::new(1, 1)));
        assert_eq!(stats.filled, 2);
        assert_eq!(checkpoint.len(), 3);
    }

    #[tokio::test]
    async fn test_batches_commit_incrementally() {
        // 4 tasks, workers=2, multiplier=1 → 2 batches of 2
        let fx = fixture("Term,definition,example\nAlpha,,\nBeta,,\n");
        let generator = Arc::new(MockGenerator::new(&[]));

        let (stats, _, _) = run_pass(&fx, generator).await;
        assert_eq!(stats.total_tasks, 4);
        assert_eq!(stats.batches, 2);
        assert_eq!(stats.filled, 4);
    }

    #[tokio::test]
    async fn test_stale_checkpoint_entry_requeued() {
        let fx = fixture("Term,definition\nAlpha,\n");

        // Checkpoint claims 1-1 is done but the cell is empty: the crash
        // window between checkpoint-write and table-write
        fs::write(&fx.checkpoint_path, "{\n  \"1-1\": true\n}").unwrap();

        let generator = Arc::new(MockGenerator::new(&[]));
        let (stats, table, _) = run_pass(&fx, Arc::clone(&generator)).await;

        assert_eq!(generator.requested(), vec![CellKey::new(1, 1)]);
        assert_eq!(stats.filled, 1);
        assert!(!table.is_empty_cell(CellKey::new(1, 1)));
    }
}
