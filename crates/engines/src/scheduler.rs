//! Stage scheduler: wires the engines into a live pipeline with
//! chained triggers.
//!
//! Each [`EngineLoop`] wakes on its downstream-facing trigger or its
//! poll interval, whichever fires first, and signals the next stage
//! only when it actually processed rows. Wake signals are best-effort;
//! the timer-driven poll is the correctness floor.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{error, info};

type WorkFuture = Pin<Box<dyn Future<Output = anyhow::Result<usize>> + Send>>;
type WorkFn = Box<dyn Fn() -> WorkFuture + Send + Sync>;

/// One engine's scheduling loop.
pub struct EngineLoop {
    name: &'static str,
    work: WorkFn,
    interval: Duration,
    trigger: Arc<Notify>,
    downstream: Option<Arc<Notify>>,
}

impl EngineLoop {
    pub fn new<F, Fut>(
        name: &'static str,
        interval: Duration,
        trigger: Arc<Notify>,
        downstream: Option<Arc<Notify>>,
        work: F,
    ) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<usize>> + Send + 'static,
    {
        Self {
            name,
            work: Box::new(move || Box::pin(work())),
            interval,
            trigger,
            downstream,
        }
    }

    /// Run forever. A work-function error is logged and the loop goes
    /// on: the pipeline must outlive any single bad cycle.
    async fn run(self) {
        loop {
            tokio::select! {
                // notified() consumes a stored permit, so a wake that
                // arrived while working is not lost.
                () = self.trigger.notified() => {}
                () = tokio::time::sleep(self.interval) => {}
            }

            let started = Instant::now();
            match (self.work)().await {
                Ok(processed) => {
                    info!(
                        engine = self.name,
                        processed,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "engine cycle"
                    );
                    if processed > 0 {
                        if let Some(downstream) = &self.downstream {
                            downstream.notify_one();
                        }
                    }
                }
                Err(err) => {
                    error!(engine = self.name, error = %err, "engine cycle failed");
                }
            }
        }
    }
}

/// Manages the lifecycle of all engine loops.
pub struct Scheduler {
    loops: Vec<EngineLoop>,
    tasks: Vec<JoinHandle<()>>,
}

impl Scheduler {
    #[must_use]
    pub fn new(loops: Vec<EngineLoop>) -> Self {
        Self {
            loops,
            tasks: Vec::new(),
        }
    }

    /// Spawn every loop and kick the first engine so the pipeline
    /// begins promptly instead of waiting out its first interval.
    pub fn start(&mut self) {
        if let Some(first) = self.loops.first() {
            first.trigger.notify_one();
        }
        let names: Vec<&str> = self.loops.iter().map(|l| l.name).collect();
        for engine in self.loops.drain(..) {
            self.tasks.push(tokio::spawn(engine.run()));
        }
        info!(engines = ?names, "scheduler started");
    }

    /// Cancel every loop and wait for the tasks to exit.
    pub async fn stop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
        for task in self.tasks.drain(..) {
            let _ = task.await;
        }
        info!("scheduler stopped");
    }
}
