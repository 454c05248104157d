//! # Kiln
//!
//! Runtime scaffolding for long-running services: a dependency injection
//! container and a lifecycle manager that boots modules, runs them, and
//! shuts them down on termination signals.
//!
//! ## Features
//!
//! - **Dependency Injection**: lazily built singletons keyed by type and
//!   optional name, with cycle detection at registration and resolution
//! - **Modules**: named boot functions that wire providers and hook into the
//!   lifecycle
//! - **Lifecycle**: six ordered phases with append/prepend hook registration
//! - **Graceful Shutdown**: a grace-period watchdog and escalation to a hard
//!   kill on repeated signals
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use kiln::prelude::*;
//!
//! trait ExpenseRepository: Send + Sync {}
//! struct MemoryExpenses;
//! impl ExpenseRepository for MemoryExpenses {}
//!
//! #[derive(Injectable)]
//! struct ExpenseService {
//!     repository: Arc<dyn ExpenseRepository>,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), LifecycleError> {
//!     let expenses = Module::new("expenses", |_ctx, container, lm, _info| {
//!         di::provide(container, || Arc::new(MemoryExpenses) as Arc<dyn ExpenseRepository>);
//!         container.provide_injectable::<ExpenseService>().unwrap();
//!
//!         lm.on_disposing(HookOrder::Append, [HookFn::sync(|| {
//!             tracing::info!("flushing expenses");
//!             Ok(())
//!         })]);
//!     });
//!
//!     let config = AppConfig::from_env().expect("configuration");
//!     let app = ApplicationBuilder::from_config(&config).build();
//!     app.bootstrap([expenses]).start().await?;
//!     Ok(())
//! }
//! ```

extern crate self as kiln;

pub mod config;
pub mod di;
pub mod error;
pub mod lifecycle;
pub mod logging;
pub mod module;

// Re-export core types
pub use config::{AppConfig, ConfigError, Environment};
pub use di::{Container, ContainerBuilder, Injectable, Key};
pub use error::{ContainerError, Result};
pub use lifecycle::{Application, ApplicationBuilder, LifecycleManager};
pub use module::{Info, Module};

// Re-export macros
pub use kiln_macro::Injectable;

// Re-export commonly used types from dependencies
pub use async_trait::async_trait;

/// Prelude module for convenient imports
///
/// ```
/// use kiln::prelude::*;
/// ```
pub mod prelude {
    pub use crate::config::{AppConfig, Environment};
    pub use crate::di::{self, Container, ContainerBuilder, Injectable};
    pub use crate::error::ContainerError;
    pub use crate::lifecycle::{
        AppContext, AppState, Application, ApplicationBuilder, Hook, HookFn, HookOrder,
        LifecycleError, LifecycleManager, Phase,
    };
    pub use crate::logging::{Logger, TracingLogger};
    pub use crate::module::{Info, Module};
    pub use async_trait::async_trait;
    pub use kiln_macro::Injectable;
    pub use std::sync::Arc;
}
