//! Pipeline assembly: builds every runner and chains the engine loops.

use std::sync::Arc;

use tokio::sync::Notify;
use tracing::warn;

use agent::{AgentRunner, LlmClient};
use callgraph::{ReachabilityChecker, SnapshotStore};
use github::GitHubClient;
use store::PgPool;

use crate::analyzer::VulnAnalyzerRunner;
use crate::classifier::EventClassifierRunner;
use crate::collector::EventCollectorRunner;
use crate::config::Config;
use crate::impact::ImpactRunner;
use crate::notification::{Mailer, NotificationRunner};
use crate::reachability::ReachabilityRunner;
use crate::scanner::{DependencyScannerRunner, ManifestScanner};
use crate::scheduler::{EngineLoop, Scheduler};

/// All runners, shared between the scheduler and the one-shot CLI
/// subcommands.
pub struct Runners {
    pub scanner: Option<Arc<DependencyScannerRunner>>,
    pub collector: Arc<EventCollectorRunner>,
    pub classifier: Arc<EventClassifierRunner>,
    pub analyzer: Arc<VulnAnalyzerRunner>,
    pub impact: Arc<ImpactRunner>,
    pub reachability: Option<Arc<ReachabilityRunner>>,
    pub notification: Arc<NotificationRunner>,
}

impl Runners {
    /// Build every runner from the shared clients.
    ///
    /// The dependency scanner and the call-graph store are external
    /// collaborators: when a deployment does not link one in, the
    /// corresponding stage idles (its loop reports zero work).
    pub fn build(
        config: &Config,
        pool: PgPool,
        github: Arc<GitHubClient>,
        llm: LlmClient,
        snapshot_store: Option<Arc<dyn SnapshotStore>>,
        manifest_scanner: Option<Arc<dyn ManifestScanner>>,
    ) -> Self {
        let agent_runner = AgentRunner::new(llm);

        let scanner = manifest_scanner.map(|scanner| {
            Arc::new(DependencyScannerRunner::new(
                pool.clone(),
                scanner,
                config.scan_cutoff,
            ))
        });
        if scanner.is_none() {
            warn!("no manifest scanner linked; dependency scanning idles");
        }

        let reachability = snapshot_store.map(|store| {
            Arc::new(ReachabilityRunner::new(
                pool.clone(),
                ReachabilityChecker::new(store),
                github.clone(),
            ))
        });
        if reachability.is_none() {
            warn!("no call-graph store linked; reachability idles");
        }

        Self {
            scanner,
            collector: Arc::new(EventCollectorRunner::new(
                pool.clone(),
                github.clone(),
                config.collect_interval,
            )),
            classifier: Arc::new(EventClassifierRunner::new(
                pool.clone(),
                github.clone(),
                agent_runner.clone(),
                config.llm_model.clone(),
            )),
            analyzer: Arc::new(VulnAnalyzerRunner::new(
                pool.clone(),
                github,
                agent_runner,
                config.llm_model.clone(),
            )),
            impact: Arc::new(ImpactRunner::new(pool.clone())),
            reachability,
            notification: Arc::new(NotificationRunner::new(
                pool,
                Mailer::new(config.smtp.clone()),
                config.notify_to.clone(),
            )),
        }
    }
}

/// Wire the seven loops into a chain:
///
/// scan → collect → classify → analyze → impact → reachability → notify
#[must_use]
pub fn build_scheduler(config: &Config, runners: Runners) -> Scheduler {
    // Triggers are created bottom-up so each loop can hold its
    // downstream's wake-up handle.
    let notify_trigger = Arc::new(Notify::new());
    let reach_trigger = Arc::new(Notify::new());
    let impact_trigger = Arc::new(Notify::new());
    let analyze_trigger = Arc::new(Notify::new());
    let classify_trigger = Arc::new(Notify::new());
    let collect_trigger = Arc::new(Notify::new());
    let scan_trigger = Arc::new(Notify::new());

    let scan_loop = EngineLoop::new("dep_scanner", config.scan_interval, scan_trigger, Some(collect_trigger.clone()), {
        let runner = runners.scanner.clone();
        move || {
            let runner = runner.clone();
            async move {
                match runner {
                    Some(runner) => runner.run_batch().await,
                    None => Ok(0),
                }
            }
        }
    });

    let collect_loop = EngineLoop::new(
        "event_collector",
        config.collect_interval,
        collect_trigger,
        Some(classify_trigger.clone()),
        {
            let runner = runners.collector.clone();
            move || {
                let runner = runner.clone();
                async move {
                    let results = runner.run_all().await?;
                    Ok(results.iter().map(|r| r.inserted as usize).sum())
                }
            }
        },
    );

    let classify_loop = EngineLoop::new(
        "classifier",
        config.classify_interval,
        classify_trigger,
        Some(analyze_trigger.clone()),
        {
            let runner = runners.classifier.clone();
            move || {
                let runner = runner.clone();
                async move { runner.classify_batch().await }
            }
        },
    );

    let analyze_loop = EngineLoop::new(
        "vuln_analyzer",
        config.analyze_interval,
        analyze_trigger,
        Some(impact_trigger.clone()),
        {
            let runner = runners.analyzer.clone();
            move || {
                let runner = runner.clone();
                async move { runner.analyze_batch().await }
            }
        },
    );

    let impact_loop = EngineLoop::new(
        "impact",
        config.impact_interval,
        impact_trigger,
        Some(reach_trigger.clone()),
        {
            let runner = runners.impact.clone();
            move || {
                let runner = runner.clone();
                async move { runner.run_batch().await }
            }
        },
    );

    let reachability_loop = EngineLoop::new(
        "reachability",
        config.reachability_interval,
        reach_trigger,
        Some(notify_trigger.clone()),
        {
            let runner = runners.reachability.clone();
            move || {
                let runner = runner.clone();
                async move {
                    match runner {
                        Some(runner) => runner.run_batch().await,
                        None => Ok(0),
                    }
                }
            }
        },
    );

    let notification_loop = EngineLoop::new(
        "notification",
        config.notify_interval,
        notify_trigger,
        None,
        {
            let runner = runners.notification.clone();
            move || {
                let runner = runner.clone();
                async move { runner.run_batch().await }
            }
        },
    );

    Scheduler::new(vec![
        scan_loop,
        collect_loop,
        classify_loop,
        analyze_loop,
        impact_loop,
        reachability_loop,
        notification_loop,
    ])
}
