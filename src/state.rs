//! Shared application state handed to every inbound handler.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::display::DisplayZone;
use crate::intent::IntentResolver;
use crate::models::task::FINALIZE_POLL;
use crate::orchestrator::finalizer::Finalizer;
use crate::orchestrator::lifecycle::PollLifecycle;
use crate::orchestrator::locks::PollLocks;
use crate::orchestrator::queue::QueueService;
use crate::orchestrator::scheduler::{Reconciler, TaskRunner};
use crate::orchestrator::wizard::Wizard;
use crate::persistence::db::Database;
use crate::persistence::poll_repo::PollRepo;
use crate::persistence::task_repo::TaskRepo;
use crate::persistence::vote_repo::VoteRepo;
use crate::transport::ChatTransport;
use crate::{GlobalConfig, Result};

/// Shared application state.
pub struct AppState {
    /// Global configuration.
    pub config: Arc<GlobalConfig>,
    /// `SQLite` connection pool.
    pub db: Arc<Database>,
    /// Display timezone.
    pub zone: DisplayZone,
    /// Outbound chat operations.
    pub transport: Arc<dyn ChatTransport>,
    /// Free-text understanding.
    pub resolver: Arc<dyn IntentResolver>,
    /// Poll store.
    pub polls: PollRepo,
    /// Vote store.
    pub votes: VoteRepo,
    /// Poll creation.
    pub lifecycle: PollLifecycle,
    /// Finalize task consumer.
    pub finalizer: Arc<Finalizer>,
    /// Join/leave handling.
    pub queue: QueueService,
    /// Interactive creation sessions.
    pub wizard: Wizard,
    /// Fires when the process begins shutting down.
    pub shutdown: CancellationToken,
    /// Inbound handler work still running.
    pub in_flight: TaskTracker,
    /// Per-poll serialization shared by finalization, votes and queue changes.
    pub locks: Arc<PollLocks>,
    tasks: TaskRepo,
}

impl AppState {
    /// Wire stores, engine components, and collaborators together.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the display zone is invalid.
    pub fn new(
        config: Arc<GlobalConfig>,
        db: Arc<Database>,
        transport: Arc<dyn ChatTransport>,
        resolver: Arc<dyn IntentResolver>,
    ) -> Result<Self> {
        let zone = DisplayZone::from_config(&config.display)?;
        let polls = PollRepo::new(Arc::clone(&db));
        let votes = VoteRepo::new(Arc::clone(&db));
        let tasks = TaskRepo::new(Arc::clone(&db));
        let locks = Arc::new(PollLocks::new());

        let lifecycle = PollLifecycle::new(
            polls.clone(),
            tasks.clone(),
            Arc::clone(&transport),
            zone.clone(),
        );
        let finalizer = Arc::new(Finalizer::new(
            polls.clone(),
            votes.clone(),
            Arc::clone(&transport),
            Arc::clone(&locks),
            config.scheduler.lease(),
        ));
        let queue = QueueService::new(
            polls.clone(),
            votes.clone(),
            Arc::clone(&transport),
            Arc::clone(&locks),
        );
        let wizard = Wizard::new(config.wizard_ttl());

        Ok(Self {
            config,
            db,
            zone,
            transport,
            resolver,
            polls,
            votes,
            lifecycle,
            finalizer,
            queue,
            wizard,
            shutdown: CancellationToken::new(),
            in_flight: TaskTracker::new(),
            locks,
            tasks,
        })
    }

    /// Run inbound handler work in the background unless shutdown has
    /// begun. Returns `false` when the work was dropped.
    pub fn dispatch<F>(&self, work: F) -> bool
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        if self.shutdown.is_cancelled() {
            tracing::info!("shutting down; inbound update dropped");
            return false;
        }
        self.in_flight.spawn(work);
        true
    }

    /// Task runner with the finalizer registered for `finalize_poll`.
    #[must_use]
    pub fn task_runner(&self) -> TaskRunner {
        TaskRunner::new(self.tasks.clone(), &self.config.scheduler)
            .register(FINALIZE_POLL, Arc::clone(&self.finalizer) as _)
    }

    /// Sweep that re-arms finalization for overdue polls.
    #[must_use]
    pub fn reconciler(&self) -> Reconciler {
        Reconciler::new(
            self.polls.clone(),
            self.tasks.clone(),
            std::time::Duration::from_secs(self.config.scheduler.reconcile_grace_seconds),
        )
    }
}
