//! Automation orchestrator.
//!
//! Sequences one run from validated idea to final result: idea validation,
//! Cursor launch, composer interaction, change monitoring, deployment fan-out,
//! Cursor shutdown. Emits a status-changed and a progress notification on
//! every transition, and is the single place where run errors are caught and
//! converted into a terminal FAILED result; nothing escapes `run` as an
//! unhandled error.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::controller::{ControllerError, CursorController};
use crate::deploy::DeploymentDispatcher;
use crate::events::EventBroadcaster;
use crate::idea::{Idea, IdeaInput};
use crate::prompt;
use crate::status::{AutomationStatus, ProgressUpdate};
use crate::tracker::ChangeTracker;

/// One successfully deployed target. Records keep submitted order.
#[derive(Debug, Clone, Serialize)]
pub struct DeploymentRecord {
    pub target: String,
    pub url: String,
}

/// Final outcome of a run. Immutable once returned.
#[derive(Debug, Clone, Serialize)]
pub struct AutomationResult {
    pub status: AutomationStatus,
    pub deployment_urls: Vec<DeploymentRecord>,
    pub errors: Vec<String>,
    pub duration_ms: u64,
}

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("cannot {0} service: serviceMode is disabled in configuration")]
    ServiceModeDisabled(&'static str),
    #[error(transparent)]
    Controller(#[from] ControllerError),
}

pub struct Orchestrator {
    config: Arc<Config>,
    controller: CursorController,
    dispatcher: DeploymentDispatcher,
    tracker: ChangeTracker,
    events: EventBroadcaster,
    status: RwLock<AutomationStatus>,
}

impl Orchestrator {
    pub fn new(config: Arc<Config>) -> Self {
        let controller = CursorController::new(
            config.cursor_path.clone(),
            config.working_dir.clone(),
            config.timeouts.clone(),
        );
        let tracker = ChangeTracker::new(config.working_dir.clone(), config.timeouts.debounce);
        let dispatcher = DeploymentDispatcher::new(config.deployment.clone());
        Self {
            config,
            controller,
            dispatcher,
            tracker,
            events: EventBroadcaster::new(),
            status: RwLock::new(AutomationStatus::Idle),
        }
    }

    /// The notification seam: hosts subscribe here to relay progress.
    pub fn events(&self) -> &EventBroadcaster {
        &self.events
    }

    pub async fn status(&self) -> AutomationStatus {
        *self.status.read().await
    }

    /// Process one idea through the canonical phase sequence.
    ///
    /// Never returns an error: any failure before the run completes is
    /// captured into the result's error list with a terminal FAILED status.
    /// Per-target deployment failures are skipped without failing the run;
    /// the URL mapping simply omits them.
    pub async fn run(&self, input: IdeaInput) -> AutomationResult {
        let started = Instant::now();
        let mut urls = Vec::new();

        let outcome = self.run_phases(input, &mut urls).await;
        let (status, errors) = match outcome {
            Ok(()) => (AutomationStatus::Completed, Vec::new()),
            Err(e) => {
                let message = e.to_string();
                error!(err = %message, "automation run failed");
                self.events.error(message.clone());
                self.cleanup_after_failure().await;
                self.transition(AutomationStatus::Failed, format!("automation failed: {message}"))
                    .await;
                (AutomationStatus::Failed, vec![message])
            }
        };

        AutomationResult {
            status,
            deployment_urls: urls,
            errors,
            duration_ms: started.elapsed().as_millis() as u64,
        }
    }

    async fn run_phases(
        &self,
        input: IdeaInput,
        urls: &mut Vec<DeploymentRecord>,
    ) -> anyhow::Result<()> {
        self.transition(AutomationStatus::Initializing, "initializing automation run")
            .await;
        let idea = Idea::validate(input)?;

        self.transition(AutomationStatus::ProcessingIdea, "processing idea input")
            .await;
        let composer_prompt = prompt::build_prompt(&idea);

        self.transition(
            AutomationStatus::LaunchingCursor,
            "launching cursor application",
        )
        .await;
        self.controller.launch().await?;

        self.transition(
            AutomationStatus::InteractingWithComposer,
            "interacting with cursor composer",
        )
        .await;
        self.controller.activate().await?;
        self.controller.send_prompt(&composer_prompt).await?;

        self.transition(
            AutomationStatus::MonitoringProgress,
            "monitoring composer progress",
        )
        .await;
        let project_dir = self.monitor_and_materialize(&idea).await?;

        self.transition(AutomationStatus::Testing, "testing generated application")
            .await;
        // No test runner is wired to generated applications yet; the phase is
        // recorded for its notification.
        debug!("testing phase recorded");

        self.transition(AutomationStatus::Deploying, "deploying application")
            .await;
        self.deploy_all(&idea, &project_dir, urls).await;

        self.controller.close().await?;
        self.transition(
            AutomationStatus::Completed,
            "automation process completed successfully",
        )
        .await;
        Ok(())
    }

    /// One tracker session around the composer's working period, then a
    /// project snapshot assembled from whatever it touched.
    async fn monitor_and_materialize(&self, idea: &Idea) -> anyhow::Result<PathBuf> {
        self.tracker.start_monitoring()?;

        let wait = self
            .controller
            .wait_for_completion(self.config.timeouts.completion)
            .await;
        match wait {
            Ok(()) => info!("composer signaled completion"),
            Err(ControllerError::Timeout { waited, .. }) => {
                // The completion sentinel is advisory; a quiet composer is
                // not a failed one.
                warn!(?waited, "no completion sentinel; materializing what was tracked");
            }
            Err(other) => {
                self.tracker.stop_monitoring();
                return Err(other.into());
            }
        }

        self.tracker.stop_monitoring();
        Ok(self.tracker.materialize_project(&idea.name)?)
    }

    /// Deployment fan-out, best-effort per target in submitted order. A
    /// failing target is logged, emitted as an error event, and skipped; it
    /// never aborts its siblings.
    async fn deploy_all(
        &self,
        idea: &Idea,
        project_dir: &std::path::Path,
        urls: &mut Vec<DeploymentRecord>,
    ) {
        let count = idea.deployment_targets.len();
        for (index, target) in idea.deployment_targets.iter().enumerate() {
            match self.dispatcher.deploy(project_dir, target).await {
                Ok(url) => {
                    info!(%target, %url, "deployed");
                    urls.push(DeploymentRecord {
                        target: target.clone(),
                        url,
                    });
                    // Sub-progress interpolated inside the deploying band so
                    // the overall sequence stays non-decreasing.
                    let percentage = 85 + ((15 * (index + 1)) / count) as u8;
                    self.events.progress(ProgressUpdate::now(
                        AutomationStatus::Deploying,
                        format!("deployed to {target}"),
                        percentage,
                    ));
                }
                Err(e) => {
                    warn!(%target, err = %e, "deployment target failed; continuing");
                    self.events
                        .error(format!("deployment to {target} failed: {e}"));
                }
            }
        }
    }

    async fn cleanup_after_failure(&self) {
        self.tracker.stop_monitoring();
        if self.controller.is_running() {
            if let Err(e) = self.controller.close().await {
                warn!(err = %e, "failed to close cursor during cleanup");
            }
        }
    }

    async fn transition(&self, status: AutomationStatus, message: impl Into<String>) {
        let message = message.into();
        *self.status.write().await = status;
        info!(status = %status, "{message}");
        self.events.status_changed(status);
        self.events
            .progress(ProgressUpdate::now(status, message, status.progress()));
    }

    // ── Service lifecycle ───────────────────────────────────────────────────

    /// Bring the controlled application up for service mode. Usage error when
    /// service mode is disabled; reported immediately, never retried.
    pub async fn start_service(&self) -> Result<(), OrchestratorError> {
        if !self.config.service_mode {
            return Err(OrchestratorError::ServiceModeDisabled("start"));
        }
        self.transition(AutomationStatus::Initializing, "starting automation service")
            .await;
        self.controller.launch().await?;
        self.transition(AutomationStatus::Idle, "automation service ready")
            .await;
        Ok(())
    }

    /// Shut the controlled application down and return to idle.
    pub async fn stop_service(&self) -> Result<(), OrchestratorError> {
        if !self.config.service_mode {
            return Err(OrchestratorError::ServiceModeDisabled("stop"));
        }
        self.transition(AutomationStatus::Cancelled, "stopping automation service")
            .await;
        self.controller.close().await?;
        self.transition(AutomationStatus::Idle, "automation service stopped")
            .await;
        Ok(())
    }
}
