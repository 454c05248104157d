//! Lifecycle Manager
//!
//! Drives the application through its phases and owns the hooks registered
//! against them.

use super::hooks::{self, HookFn, HookOrder, HookStore, Phase};
use super::{AppContext, LifecycleError, Result};
use crate::logging::Logger;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use strum_macros::Display;
use tokio::sync::watch;

/// Application state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display)]
#[strum(serialize_all = "UPPERCASE")]
pub enum AppState {
    #[default]
    Idle,
    Starting,
    Started,
    Stopping,
    Stopped,
}

/// Outcome of [`LifecycleManager::begin_stop`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StopRequest {
    Begun,
    InProgress,
    NotRunning,
}

/// Runs the lifecycle phases and keeps the application state.
///
/// `start` moves `Idle → Starting`, runs Booting, Booted, Ready and Running,
/// then settles on `Started`. `stop` moves to `Stopping`, runs Disposing and
/// Disposed, then settles on `Stopped`. Hooks of one phase run sequentially
/// in registration order; the first failure aborts the rest of the chain.
///
/// No lock is held while a hook runs, so hooks may register further hooks.
/// Hooks added to a phase that is already running take effect the next time
/// that phase runs.
pub struct LifecycleManager {
    state: Mutex<AppState>,
    hooks: Mutex<HookStore>,
    logger: Arc<dyn Logger>,
    force_shutdown: AtomicBool,
    shutdown_timeout: Duration,
    shutdown: watch::Sender<bool>,
    context: AppContext,
}

impl LifecycleManager {
    pub fn new(service_name: &str, logger: Arc<dyn Logger>, shutdown_timeout: Duration) -> Self {
        let (shutdown, receiver) = watch::channel(false);

        Self {
            state: Mutex::new(AppState::Idle),
            hooks: Mutex::new(HookStore::new()),
            logger,
            force_shutdown: AtomicBool::new(false),
            shutdown_timeout,
            shutdown,
            context: AppContext::new(service_name, receiver),
        }
    }

    pub fn state(&self) -> AppState {
        *self.lock_state()
    }

    pub fn shutdown_timeout(&self) -> Duration {
        self.shutdown_timeout
    }

    pub fn logger(&self) -> &Arc<dyn Logger> {
        &self.logger
    }

    /// Context shared with boot functions and long-running hooks.
    pub fn context(&self) -> AppContext {
        self.context.clone()
    }

    pub fn hook_count(&self, phase: Phase) -> usize {
        self.lock_hooks().len(phase)
    }

    /// Run the startup phases.
    ///
    /// On failure the shutdown phases run as cleanup; a cleanup failure is
    /// logged and the startup error is returned.
    ///
    /// # Errors
    /// [`LifecycleError::AlreadyStarted`] unless the state is `Idle`, or the
    /// error of the first failing hook.
    pub async fn start(&self) -> Result<()> {
        {
            let mut state = self.lock_state();
            if *state != AppState::Idle {
                drop(state);
                self.logger.warn("The application has already started.");
                return Err(LifecycleError::AlreadyStarted);
            }
            *state = AppState::Starting;
        }
        self.logger.info(&format!("Application {}", AppState::Starting));

        if let Err(err) = self.run_phases(&Phase::STARTUP).await {
            self.logger
                .error(&format!("Error transitioning the life cycles: {err}"));

            if let Err(stop_err) = self.stop().await {
                self.logger.error(&format!(
                    "Error stopping the application on start failure: {stop_err}"
                ));
            }

            return Err(err);
        }

        self.set_state(AppState::Started);
        Ok(())
    }

    /// Run the shutdown phases.
    ///
    /// The shutdown broadcast reaches every [`AppContext`] before the
    /// Disposing hooks run.
    ///
    /// # Errors
    /// [`LifecycleError::NotRunning`] if the application never started, or
    /// the error of the first failing hook.
    pub async fn stop(&self) -> Result<()> {
        match self.begin_stop(true) {
            StopRequest::Begun => self.finish_stop().await,
            StopRequest::InProgress | StopRequest::NotRunning => {
                self.logger.warn("The application is not running.");
                Err(LifecycleError::NotRunning)
            }
        }
    }

    /// Move to `Stopping` under the state lock.
    ///
    /// With `repeat` unset a manager that is already `Stopping` or `Stopped`
    /// is left alone and reported as [`StopRequest::InProgress`].
    pub(crate) fn begin_stop(&self, repeat: bool) -> StopRequest {
        let mut state = self.lock_state();
        match *state {
            AppState::Idle => StopRequest::NotRunning,
            AppState::Stopping | AppState::Stopped if !repeat => StopRequest::InProgress,
            _ => {
                *state = AppState::Stopping;
                StopRequest::Begun
            }
        }
    }

    /// Run the shutdown phases after a successful [`begin_stop`](Self::begin_stop).
    pub(crate) async fn finish_stop(&self) -> Result<()> {
        self.logger.info(&format!("Application {}", AppState::Stopping));
        self.shutdown.send_replace(true);

        if let Err(err) = self.run_phases(&Phase::SHUTDOWN).await {
            self.logger
                .error(&format!("Error shutting down the application: {err}"));
            return Err(err);
        }

        self.set_state(AppState::Stopped);
        self.logger.info("Application exited with success");
        Ok(())
    }

    async fn run_phases(&self, phases: &[Phase]) -> Result<()> {
        for &phase in phases {
            self.logger.info(&format!("Processing on{phase}"));
            let chain = self.lock_hooks().get(phase);
            hooks::run_chain(phase, &chain).await?;
        }
        Ok(())
    }

    fn set_state(&self, state: AppState) {
        *self.lock_state() = state;
        self.logger.info(&format!("Application {state}"));
    }

    /// Register hooks for `phase`.
    pub fn on(&self, phase: Phase, order: HookOrder, hooks: impl IntoIterator<Item = HookFn>) {
        self.lock_hooks().add(phase, order, hooks);
    }

    pub fn on_booting(&self, order: HookOrder, hooks: impl IntoIterator<Item = HookFn>) {
        self.on(Phase::Booting, order, hooks);
    }

    pub fn on_booted(&self, order: HookOrder, hooks: impl IntoIterator<Item = HookFn>) {
        self.on(Phase::Booted, order, hooks);
    }

    pub fn on_ready(&self, order: HookOrder, hooks: impl IntoIterator<Item = HookFn>) {
        self.on(Phase::Ready, order, hooks);
    }

    pub fn on_running(&self, order: HookOrder, hooks: impl IntoIterator<Item = HookFn>) {
        self.on(Phase::Running, order, hooks);
    }

    pub fn on_disposing(&self, order: HookOrder, hooks: impl IntoIterator<Item = HookFn>) {
        self.on(Phase::Disposing, order, hooks);
    }

    pub fn on_disposed(&self, order: HookOrder, hooks: impl IntoIterator<Item = HookFn>) {
        self.on(Phase::Disposed, order, hooks);
    }

    /// Set the force-shutdown flag, returning its previous value.
    pub(crate) fn request_force_shutdown(&self) -> bool {
        self.force_shutdown.swap(true, Ordering::SeqCst)
    }

    pub fn is_force_shutdown(&self) -> bool {
        self.force_shutdown.load(Ordering::SeqCst)
    }

    fn lock_state(&self) -> MutexGuard<'_, AppState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_hooks(&self) -> MutexGuard<'_, HookStore> {
        self.hooks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::MemoryLogger;

    fn manager() -> (LifecycleManager, Arc<MemoryLogger>) {
        let logger = Arc::new(MemoryLogger::new());
        let manager = LifecycleManager::new("test", logger.clone(), Duration::from_secs(1));
        (manager, logger)
    }

    fn recorder(log: &Arc<Mutex<Vec<String>>>, name: &str) -> HookFn {
        let log = Arc::clone(log);
        let name = name.to_string();
        HookFn::sync(move || {
            log.lock().unwrap().push(name.clone());
            Ok(())
        })
    }

    #[tokio::test]
    async fn test_full_lifecycle() {
        let (manager, logger) = manager();
        let log = Arc::new(Mutex::new(Vec::new()));

        manager.on_disposed(HookOrder::Append, [recorder(&log, "disposed")]);
        manager.on_running(HookOrder::Append, [recorder(&log, "running")]);
        manager.on_booting(HookOrder::Append, [recorder(&log, "booting")]);
        manager.on_ready(HookOrder::Append, [recorder(&log, "ready")]);
        manager.on_disposing(HookOrder::Append, [recorder(&log, "disposing")]);
        manager.on_booted(HookOrder::Append, [recorder(&log, "booted")]);

        assert_eq!(manager.state(), AppState::Idle);
        manager.start().await.unwrap();
        assert_eq!(manager.state(), AppState::Started);

        manager.stop().await.unwrap();
        assert_eq!(manager.state(), AppState::Stopped);

        assert_eq!(
            *log.lock().unwrap(),
            vec!["booting", "booted", "ready", "running", "disposing", "disposed"]
        );
        assert!(logger.contains("Application STARTING"));
        assert!(logger.contains("Processing onBooting"));
        assert!(logger.contains("Application STARTED"));
        assert!(logger.contains("Application STOPPED"));
        assert!(logger.contains("Application exited with success"));
    }

    #[tokio::test]
    async fn test_hook_ordering() {
        let (manager, _) = manager();
        let log = Arc::new(Mutex::new(Vec::new()));

        manager.on_booting(HookOrder::Append, [recorder(&log, "a"), recorder(&log, "b")]);
        manager.on_booting(HookOrder::Prepend, [recorder(&log, "c")]);
        assert_eq!(manager.hook_count(Phase::Booting), 3);

        manager.start().await.unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["c", "a", "b"]);
    }

    #[tokio::test]
    async fn test_start_twice() {
        let (manager, logger) = manager();
        manager.start().await.unwrap();

        let err = manager.start().await.unwrap_err();
        assert!(matches!(err, LifecycleError::AlreadyStarted));
        assert_eq!(err.to_string(), "the application has already started");
        assert_eq!(manager.state(), AppState::Started);
        assert!(logger.contains("The application has already started."));
    }

    #[tokio::test]
    async fn test_stop_when_idle() {
        let (manager, _) = manager();
        let err = manager.stop().await.unwrap_err();

        assert_eq!(err.to_string(), "the application is not running");
        assert_eq!(manager.state(), AppState::Idle);
    }

    #[tokio::test]
    async fn test_failed_start_runs_cleanup() {
        let (manager, logger) = manager();
        let log = Arc::new(Mutex::new(Vec::new()));

        manager.on_booted(
            HookOrder::Append,
            [HookFn::sync(|| Err(anyhow::anyhow!("no database")))],
        );
        manager.on_ready(HookOrder::Append, [recorder(&log, "ready")]);
        manager.on_disposing(HookOrder::Append, [recorder(&log, "disposing")]);

        let err = manager.start().await.unwrap_err();

        assert_eq!(err.phase(), Some(Phase::Booted));
        assert!(err.to_string().contains("no database"));
        assert_eq!(*log.lock().unwrap(), vec!["disposing"]);
        assert_eq!(manager.state(), AppState::Stopped);
        assert!(logger.contains("Error transitioning the life cycles"));
    }

    #[tokio::test]
    async fn test_failed_cleanup_keeps_start_error() {
        let (manager, logger) = manager();

        manager.on_booting(
            HookOrder::Append,
            [HookFn::sync(|| Err(anyhow::anyhow!("boot failed")))],
        );
        manager.on_disposed(
            HookOrder::Append,
            [HookFn::sync(|| Err(anyhow::anyhow!("dispose failed")))],
        );

        let err = manager.start().await.unwrap_err();
        assert!(err.to_string().contains("boot failed"));
        assert!(logger.contains("Error stopping the application on start failure"));
        assert_eq!(manager.state(), AppState::Stopping);
    }

    #[tokio::test]
    async fn test_hooks_registered_by_hooks_run_in_later_phases() {
        let (manager, _) = manager();
        let manager = Arc::new(manager);
        let log = Arc::new(Mutex::new(Vec::new()));

        let weak = Arc::downgrade(&manager);
        let inner_log = Arc::clone(&log);
        manager.on_booting(
            HookOrder::Append,
            [HookFn::sync(move || {
                if let Some(manager) = weak.upgrade() {
                    manager.on_booted(HookOrder::Append, [recorder(&inner_log, "late")]);
                }
                Ok(())
            })],
        );

        manager.start().await.unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["late"]);
    }

    #[tokio::test]
    async fn test_stop_broadcasts_shutdown() {
        let (manager, _) = manager();
        let ctx = manager.context();

        manager.start().await.unwrap();
        assert!(!ctx.is_shutdown_requested());

        manager.stop().await.unwrap();
        assert!(ctx.is_shutdown_requested());
        ctx.shutdown_requested().await;
    }

    #[test]
    fn test_begin_stop_is_exclusive() {
        let (manager, _) = manager();
        assert_eq!(manager.begin_stop(false), StopRequest::NotRunning);

        *manager.lock_state() = AppState::Started;
        assert_eq!(manager.begin_stop(false), StopRequest::Begun);
        assert_eq!(manager.state(), AppState::Stopping);
        assert_eq!(manager.begin_stop(false), StopRequest::InProgress);
        assert_eq!(manager.begin_stop(true), StopRequest::Begun);
    }

    #[test]
    fn test_state_names() {
        assert_eq!(AppState::Idle.to_string(), "IDLE");
        assert_eq!(AppState::Stopped.to_string(), "STOPPED");
    }
}
