//! Graceful Shutdown Handler
//!
//! Turns termination signals into a call to [`LifecycleManager::stop`],
//! guarded by a watchdog that exits the process if the shutdown phases take
//! longer than the grace period.

use super::manager::StopRequest;
use super::{LifecycleError, LifecycleManager, Result};
use crate::logging::Logger;
use futures::{Stream, StreamExt};
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

/// Stream yielding once per termination signal received.
pub type SignalStream = Pin<Box<dyn Stream<Item = ()> + Send>>;

/// How the process is brought down.
///
/// The default [`ProcessTerminator`] really exits; tests substitute one that
/// records the request instead.
pub trait Terminator: Send + Sync {
    fn exit(&self, code: i32);

    /// Terminate the process immediately, skipping every remaining hook.
    fn kill(&self) -> io::Result<()>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessTerminator;

impl Terminator for ProcessTerminator {
    fn exit(&self, code: i32) {
        std::process::exit(code)
    }

    #[cfg(unix)]
    fn kill(&self) -> io::Result<()> {
        let pid = std::process::id() as libc::pid_t;
        // SAFETY: kill(2) on our own pid has no memory-safety preconditions.
        if unsafe { libc::kill(pid, libc::SIGKILL) } == 0 {
            Ok(())
        } else {
            Err(io::Error::last_os_error())
        }
    }

    #[cfg(not(unix))]
    fn kill(&self) -> io::Result<()> {
        std::process::abort()
    }
}

/// Result of one [`ShutdownHandler::shutdown`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// The shutdown phases completed; exit status 0 was requested.
    Stopped,
    /// A shutdown hook failed; exit status 1 was requested.
    Failed,
    /// A shutdown is already in progress; the next request forces exit.
    Pending,
    /// The process was killed.
    Killed,
}

/// Coordinates shutdown on termination signals.
///
/// # Example
///
/// ```rust,ignore
/// let handler = Arc::new(ShutdownHandler::new(lifecycle_manager, Arc::new(ProcessTerminator)));
/// let signals = termination_signals()?;
/// let outcome = handler.run_until_stopped(signals).await?;
/// ```
pub struct ShutdownHandler {
    lifecycle_manager: Arc<LifecycleManager>,
    terminator: Arc<dyn Terminator>,
}

impl ShutdownHandler {
    pub fn new(lifecycle_manager: Arc<LifecycleManager>, terminator: Arc<dyn Terminator>) -> Self {
        Self {
            lifecycle_manager,
            terminator,
        }
    }

    /// Wait for the first signal, then shut down.
    ///
    /// Signals that arrive while the shutdown phases run call
    /// [`shutdown`](Self::shutdown) again: the first warns, the next one
    /// kills the process.
    ///
    /// # Errors
    /// [`LifecycleError::SignalsClosed`] if `signals` ends before yielding
    /// anything. The application is left running in that case.
    pub async fn run_until_stopped<S>(self: Arc<Self>, signals: S) -> Result<ShutdownOutcome>
    where
        S: Stream<Item = ()> + Unpin,
    {
        let logger = Arc::clone(self.lifecycle_manager.logger());
        let mut signals = signals.fuse();

        if signals.next().await.is_none() {
            logger.error("Termination signal stream closed before any signal");
            return Err(LifecycleError::SignalsClosed);
        }
        logger.info("Termination signal received");

        let handler = Arc::clone(&self);
        let mut stopping = tokio::spawn(async move { handler.shutdown().await });

        loop {
            tokio::select! {
                joined = &mut stopping => {
                    return Ok(joined.unwrap_or_else(|err| {
                        logger.error(&format!("Shutdown task failed: {err}"));
                        ShutdownOutcome::Failed
                    }));
                }
                Some(()) = signals.next() => {
                    self.shutdown().await;
                }
            }
        }
    }

    /// Stop the application, or escalate if a stop is already under way.
    ///
    /// Deciding between the two happens under the manager's state lock, so
    /// concurrent calls run the shutdown phases at most once.
    pub async fn shutdown(&self) -> ShutdownOutcome {
        let logger = self.lifecycle_manager.logger();

        match self.lifecycle_manager.begin_stop(false) {
            StopRequest::InProgress => self.escalate(),
            StopRequest::NotRunning => {
                logger.warn("The application is not running.");
                logger.error(&format!(
                    "Error shutting down the application: {}",
                    LifecycleError::NotRunning
                ));
                self.terminator.exit(1);
                ShutdownOutcome::Failed
            }
            StopRequest::Begun => {
                let watchdog = Watchdog::arm(
                    self.lifecycle_manager.shutdown_timeout(),
                    Arc::clone(logger),
                    Arc::clone(&self.terminator),
                );
                let result = self.lifecycle_manager.finish_stop().await;
                watchdog.disarm();

                match result {
                    Ok(()) => {
                        self.terminator.exit(0);
                        ShutdownOutcome::Stopped
                    }
                    Err(err) => {
                        logger.error(&format!("Error shutting down the application: {err}"));
                        self.terminator.exit(1);
                        ShutdownOutcome::Failed
                    }
                }
            }
        }
    }

    fn escalate(&self) -> ShutdownOutcome {
        let logger = self.lifecycle_manager.logger();

        if !self.lifecycle_manager.request_force_shutdown() {
            logger.warn(
                "The application is yet to finishing the shutdown process. Repeat the command to force exit",
            );
            return ShutdownOutcome::Pending;
        }

        logger.warn("Forcing the application to exit");
        if let Err(err) = self.terminator.kill() {
            logger.error(&format!("Failed to kill the process: {err}"));
        }
        ShutdownOutcome::Killed
    }
}

/// Exits the process with status 1 unless disarmed within the grace period.
///
/// Runs on a dedicated OS thread so a shutdown hook that blocks its runtime
/// worker cannot hold it back.
struct Watchdog {
    _cancel: mpsc::Sender<()>,
}

impl Watchdog {
    fn arm(timeout: Duration, logger: Arc<dyn Logger>, terminator: Arc<dyn Terminator>) -> Self {
        let (cancel, cancelled) = mpsc::channel::<()>();

        let spawned = thread::Builder::new()
            .name("kiln-shutdown-watchdog".into())
            .spawn(move || {
                // Disconnected means the watchdog was disarmed.
                if let Err(RecvTimeoutError::Timeout) = cancelled.recv_timeout(timeout) {
                    logger.warn("OK, my patience is over #ragequit");
                    terminator.exit(1);
                }
            });

        if let Err(err) = spawned {
            tracing::error!(error = %err, "failed to start the shutdown watchdog");
        }

        Self { _cancel: cancel }
    }

    fn disarm(self) {}
}

/// Listen for SIGINT and SIGTERM.
///
/// SIGKILL cannot be caught and is not listed.
#[cfg(unix)]
pub fn termination_signals() -> io::Result<SignalStream> {
    use tokio::signal::unix::{SignalKind, signal};

    let interrupt = signal(SignalKind::interrupt())?;
    let terminate = signal(SignalKind::terminate())?;

    let stream = futures::stream::unfold(
        (interrupt, terminate),
        |(mut interrupt, mut terminate)| async move {
            let received = tokio::select! {
                received = interrupt.recv() => received,
                received = terminate.recv() => received,
            };
            received.map(|()| ((), (interrupt, terminate)))
        },
    );

    Ok(Box::pin(stream))
}

/// Listen for Ctrl+C.
#[cfg(not(unix))]
pub fn termination_signals() -> io::Result<SignalStream> {
    let stream = futures::stream::unfold((), |()| async {
        tokio::signal::ctrl_c().await.ok().map(|()| ((), ()))
    });

    Ok(Box::pin(stream))
}
