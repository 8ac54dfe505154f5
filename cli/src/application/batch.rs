//! Fleet-wide launch/stop with bounded concurrency.
//!
//! Targets are split into batches of `max_concurrent`. Members of one batch
//! run concurrently and fail independently; every member is re-synced before
//! the next batch starts, and a fixed delay separates batches so boot storms
//! do not exhaust the host.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use anyhow::Result;
use futures_util::future::join_all;

use crate::application::lifecycle::LifecycleController;
use crate::application::ports::{DeviceBridge, InstanceConsole, ProgressReporter};
use crate::domain::batch::{BatchEntry, BatchOutcome, BatchResult, partition};
use crate::domain::config::BatchConfig;
use crate::domain::console::ConsoleEntry;

#[derive(Debug, Clone, Copy)]
pub struct LaunchAllOptions {
    /// Skip instances that are already running.
    pub only_stopped: bool,
    /// Pause between batches.
    pub delay: Duration,
    pub max_concurrent: usize,
}

impl LaunchAllOptions {
    #[must_use]
    pub fn from_config(config: &BatchConfig) -> Self {
        Self {
            only_stopped: true,
            delay: Duration::from_secs(config.delay),
            max_concurrent: config.max_concurrent,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct StopAllOptions {
    /// Skip instances that are already stopped.
    pub only_running: bool,
    pub delay: Duration,
    pub max_concurrent: usize,
}

impl StopAllOptions {
    #[must_use]
    pub fn from_config(config: &BatchConfig) -> Self {
        Self {
            only_running: true,
            delay: Duration::from_secs(config.delay),
            max_concurrent: config.max_concurrent,
        }
    }
}

/// Fans lifecycle calls out over the fleet.
pub struct BatchOrchestrator<C, B> {
    controller: LifecycleController<C, B>,
}

impl<C, B> BatchOrchestrator<C, B>
where
    C: InstanceConsole + 'static,
    B: DeviceBridge + 'static,
{
    #[must_use]
    pub fn new(controller: LifecycleController<C, B>) -> Self {
        Self { controller }
    }

    #[must_use]
    pub fn controller(&self) -> &LifecycleController<C, B> {
        &self.controller
    }

    /// Launch every instance (or every stopped one).
    ///
    /// # Errors
    ///
    /// Only when the console cannot be enumerated up front; per-instance
    /// failures are reported inside the [`BatchResult`].
    pub async fn launch_all(
        &self,
        options: &LaunchAllOptions,
        reporter: &impl ProgressReporter,
    ) -> Result<BatchResult> {
        let entries = self.controller.refresh().await?;
        let (targets, skipped) = select_targets(&entries, |entry| {
            (options.only_stopped && entry.is_running()).then_some("already running")
        });

        let launch = self.controller.launch_options();
        let launch = &launch;
        let attempted = self
            .run_batches(
                "launch",
                targets,
                (options.max_concurrent, options.delay),
                reporter,
                move |name| async move { self.controller.launch(&name, launch).await.map(|_| ()) },
            )
            .await;

        Ok(self.finish(&entries, skipped, attempted).await)
    }

    /// Stop every instance (or every running one).
    ///
    /// # Errors
    ///
    /// Only when the console cannot be enumerated up front.
    pub async fn stop_all(
        &self,
        options: &StopAllOptions,
        reporter: &impl ProgressReporter,
    ) -> Result<BatchResult> {
        let entries = self.controller.refresh().await?;
        let (targets, skipped) = select_targets(&entries, |entry| {
            (options.only_running && !entry.is_running()).then_some("already stopped")
        });

        let stop = self.controller.stop_options();
        let stop = &stop;
        let attempted = self
            .run_batches(
                "stop",
                targets,
                (options.max_concurrent, options.delay),
                reporter,
                move |name| async move { self.controller.stop(&name, stop).await },
            )
            .await;

        Ok(self.finish(&entries, skipped, attempted).await)
    }

    async fn run_batches<F, Fut>(
        &self,
        verb: &str,
        targets: Vec<String>,
        (max_concurrent, delay): (usize, Duration),
        reporter: &impl ProgressReporter,
        op: F,
    ) -> Vec<BatchEntry>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        let batches = partition(&targets, max_concurrent);
        let total = batches.len();
        let mut entries = Vec::with_capacity(targets.len());

        for (i, batch) in batches.into_iter().enumerate() {
            if i > 0 && !delay.is_zero() {
                tracing::debug!(secs = delay.as_secs(), "pausing between batches");
                tokio::time::sleep(delay).await;
            }
            reporter.step(&format!(
                "batch {}/{total}: {verb} {}",
                i + 1,
                batch.join(", ")
            ));

            let results = join_all(batch.iter().map(|name| {
                let fut = op(name.clone());
                async move { (name, fut.await) }
            }))
            .await;

            for (name, result) in results {
                let outcome = match result {
                    Ok(()) => {
                        reporter.success(&format!("{name}: {verb} ok"));
                        BatchOutcome::Success
                    }
                    Err(err) => {
                        let detail = format!("{err:#}");
                        tracing::warn!(name = %name, "{verb} failed: {detail}");
                        reporter.warn(&format!("{name}: {detail}"));
                        BatchOutcome::Failed(detail)
                    }
                };
                entries.push(BatchEntry {
                    instance_name: name.clone(),
                    outcome,
                });
            }

            join_all(batch.iter().map(move |name| async move {
                if let Err(err) = self.controller.sync_state(name).await {
                    tracing::debug!(name = %name, "post-batch sync: {err:#}");
                }
            }))
            .await;
        }
        entries
    }

    /// Final sweep, then order entries the way the console lists instances.
    async fn finish(
        &self,
        listed: &[ConsoleEntry],
        skipped: Vec<BatchEntry>,
        attempted: Vec<BatchEntry>,
    ) -> BatchResult {
        if let Err(err) = self.controller.sync_all().await {
            tracing::warn!("final sync failed: {err:#}");
        }
        let order: HashMap<&str, u32> = listed
            .iter()
            .map(|e| (e.name.as_str(), e.index))
            .collect();
        let mut entries: Vec<BatchEntry> = skipped.into_iter().chain(attempted).collect();
        entries.sort_by_key(|e| {
            order
                .get(e.instance_name.as_str())
                .copied()
                .unwrap_or(u32::MAX)
        });
        let result = BatchResult::from_entries(entries);
        tracing::info!(
            ok = result.success_count(),
            failed = result.fail_count(),
            skipped = result.skipped_count(),
            "batch complete"
        );
        result
    }
}

/// Split the listing into names to act on and pre-skipped entries.
fn select_targets(
    entries: &[ConsoleEntry],
    skip: impl Fn(&ConsoleEntry) -> Option<&'static str>,
) -> (Vec<String>, Vec<BatchEntry>) {
    let mut sorted: Vec<&ConsoleEntry> = entries.iter().collect();
    sorted.sort_by_key(|e| e.index);

    let mut targets = Vec::new();
    let mut skipped = Vec::new();
    for entry in sorted {
        match skip(entry) {
            Some(reason) => skipped.push(BatchEntry {
                instance_name: entry.name.clone(),
                outcome: BatchOutcome::Skipped(reason.to_string()),
            }),
            None => targets.push(entry.name.clone()),
        }
    }
    (targets, skipped)
}
