//! Application Bootstrap
//!
//! Ties a [`Container`] and a [`LifecycleManager`] together under one service
//! identity and turns termination signals into a graceful shutdown.

use super::shutdown::{self, ProcessTerminator, ShutdownHandler, ShutdownOutcome, Terminator};
use super::{HookFn, HookOrder, LifecycleManager, Result};
use crate::config::{AppConfig, Environment};
use crate::di::Container;
use crate::logging::{Logger, TracingLogger};
use crate::module::{Info, Module};
use std::sync::Arc;
use std::time::Duration;

/// Default grace period between the first termination signal and a forced
/// exit.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// The running service.
///
/// # Example
///
/// ```rust,no_run
/// use kiln::{Application, Module, di};
/// use std::sync::Arc;
///
/// struct ExpenseStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), kiln::lifecycle::LifecycleError> {
///     let expenses = Module::new("expenses", |_ctx, container, _lm, _info| {
///         di::provide(container, || Arc::new(ExpenseStore));
///     });
///
///     let app = Application::new("splitter");
///     app.bootstrap([expenses]).start().await?;
///     Ok(())
/// }
/// ```
pub struct Application {
    info: Info,
    container: Container,
    lifecycle_manager: Arc<LifecycleManager>,
    shutdown_handler: Arc<ShutdownHandler>,
}

impl Application {
    /// Create an application with the default options.
    pub fn new(service_name: impl Into<String>) -> Self {
        Self::builder(service_name).build()
    }

    pub fn builder(service_name: impl Into<String>) -> ApplicationBuilder {
        ApplicationBuilder::new(service_name)
    }

    pub fn container(&self) -> &Container {
        &self.container
    }

    pub fn lifecycle_manager(&self) -> &Arc<LifecycleManager> {
        &self.lifecycle_manager
    }

    pub fn shutdown_handler(&self) -> &Arc<ShutdownHandler> {
        &self.shutdown_handler
    }

    pub fn info(&self) -> &Info {
        &self.info
    }

    /// Queue one Booting hook per module, in the order given.
    ///
    /// Each hook logs `Booting <name>` and runs the module's boot function
    /// against this application's container and lifecycle manager.
    pub fn bootstrap(&self, modules: impl IntoIterator<Item = Module>) -> &Self {
        let boot_order: Vec<HookFn> = modules
            .into_iter()
            .map(|module| {
                let lifecycle_manager = Arc::downgrade(&self.lifecycle_manager);
                let container = self.container.clone();
                let info = self.info.clone();

                HookFn::sync(move || {
                    let Some(lifecycle_manager) = lifecycle_manager.upgrade() else {
                        anyhow::bail!("lifecycle manager dropped before booting {}", module.name());
                    };

                    lifecycle_manager
                        .logger()
                        .info(&format!("Booting {}", module.name()));
                    module.boot(
                        &lifecycle_manager.context(),
                        &container,
                        &lifecycle_manager,
                        &info,
                    );
                    Ok(())
                })
            })
            .collect();

        self.lifecycle_manager
            .on_booting(HookOrder::Append, boot_order);
        self
    }

    /// Start the application and block until it has shut down.
    ///
    /// Termination signals are listened for from the moment this is called.
    /// With the default terminator the process exits inside this call once
    /// the shutdown phases finish.
    ///
    /// # Errors
    /// The startup error, a failure to install the signal handlers, or the
    /// signal stream closing before any signal arrived.
    pub async fn start(&self) -> Result<ShutdownOutcome> {
        let signals = shutdown::termination_signals()?;
        self.start_test().await?;

        Arc::clone(&self.shutdown_handler)
            .run_until_stopped(signals)
            .await
    }

    /// Run the startup phases without waiting for a signal.
    pub async fn start_test(&self) -> Result<()> {
        if let Err(err) = self.lifecycle_manager.start().await {
            self.lifecycle_manager
                .logger()
                .error(&format!("Error starting the application: {err}"));
            return Err(err);
        }
        Ok(())
    }

    /// Run the shutdown phases.
    pub async fn stop(&self) -> Result<()> {
        if let Err(err) = self.lifecycle_manager.stop().await {
            self.lifecycle_manager
                .logger()
                .error(&format!("Failed to stop the application: {err}"));
            return Err(err);
        }
        Ok(())
    }
}

/// Builder for Application
pub struct ApplicationBuilder {
    service_name: String,
    environment: Environment,
    logger: Option<Arc<dyn Logger>>,
    shutdown_timeout: Duration,
    container: Option<Container>,
    terminator: Arc<dyn Terminator>,
}

impl ApplicationBuilder {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            environment: Environment::default(),
            logger: None,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            container: None,
            terminator: Arc::new(ProcessTerminator),
        }
    }

    /// Start from a loaded configuration.
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.service_name.clone())
            .environment(config.environment)
            .shutdown_timeout(config.shutdown_timeout())
    }

    /// Replace the default `tracing` logger
    pub fn logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Set the grace period for the shutdown phases
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Use an existing container instead of a fresh one
    pub fn container(mut self, container: Container) -> Self {
        self.container = Some(container);
        self
    }

    pub fn environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    pub fn terminator(mut self, terminator: Arc<dyn Terminator>) -> Self {
        self.terminator = terminator;
        self
    }

    pub fn build(self) -> Application {
        let logger = self
            .logger
            .unwrap_or_else(|| Arc::new(TracingLogger::new(&self.service_name)) as Arc<dyn Logger>);
        let lifecycle_manager = Arc::new(LifecycleManager::new(
            &self.service_name,
            logger,
            self.shutdown_timeout,
        ));
        let shutdown_handler = Arc::new(ShutdownHandler::new(
            Arc::clone(&lifecycle_manager),
            self.terminator,
        ));

        Application {
            info: Info {
                service_name: self.service_name,
                environment: self.environment,
            },
            container: self.container.unwrap_or_default(),
            lifecycle_manager,
            shutdown_handler,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::AppState;
    use crate::logging::MemoryLogger;

    #[test]
    fn test_builder_defaults() {
        let app = Application::new("splitter");

        assert_eq!(app.info().service_name, "splitter");
        assert_eq!(app.info().environment, Environment::Development);
        assert_eq!(
            app.lifecycle_manager().shutdown_timeout(),
            DEFAULT_SHUTDOWN_TIMEOUT
        );
        assert!(app.container().is_empty());
    }

    #[test]
    fn test_from_config() {
        let config = AppConfig {
            service_name: "ledger".to_string(),
            environment: Environment::Production,
            shutdown_timeout_secs: 3,
        };
        let app = ApplicationBuilder::from_config(&config).build();

        assert_eq!(app.info().service_name, "ledger");
        assert_eq!(app.info().environment, Environment::Production);
        assert_eq!(
            app.lifecycle_manager().shutdown_timeout(),
            Duration::from_secs(3)
        );
    }

    #[tokio::test]
    async fn test_bootstrap_boots_modules_in_order() {
        let logger = Arc::new(MemoryLogger::new());
        let app = Application::builder("splitter")
            .logger(logger.clone())
            .environment(Environment::Test)
            .build();

        let first = Module::new("first", |_ctx, container, _lm, info| {
            assert_eq!(info.environment, Environment::Test);
            container.concrete(1_u8).unwrap();
        });
        let second = Module::new("second", |ctx, container, _lm, _info| {
            assert_eq!(ctx.service_name(), "splitter");
            assert_eq!(container.resolve::<u8>().unwrap(), 1);
        });

        app.bootstrap([first, second]).start_test().await.unwrap();

        let boots: Vec<String> = logger
            .messages()
            .into_iter()
            .filter(|message| message.starts_with("Booting"))
            .collect();
        assert_eq!(boots, vec!["Booting first", "Booting second"]);
        assert_eq!(app.lifecycle_manager().state(), AppState::Started);

        app.stop().await.unwrap();
        assert_eq!(app.lifecycle_manager().state(), AppState::Stopped);
    }

    #[tokio::test]
    async fn test_stop_before_start() {
        let logger = Arc::new(MemoryLogger::new());
        let app = Application::builder("splitter").logger(logger.clone()).build();

        assert!(app.stop().await.is_err());
        assert!(logger.contains("Failed to stop the application"));
    }
}
