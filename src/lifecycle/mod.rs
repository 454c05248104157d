//! Application lifecycle.
//!
//! # Phases
//!
//! ```text
//! start():  Booting → Booted → Ready → Running        (Idle → Starting → Started)
//! stop():   Disposing → Disposed                      (→ Stopping → Stopped)
//! ```
//!
//! Modules wire their providers during Booting and hook into the later
//! phases: Booted once every module has booted, Ready to start servers and
//! consumers, Running once the service is up, Disposing to undo what Booting
//! started, Disposed for final cleanup.
//!
//! # Example
//!
//! ```rust
//! use kiln::lifecycle::{HookFn, HookOrder, LifecycleManager};
//! use kiln::logging::TracingLogger;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let manager = LifecycleManager::new(
//!     "splitter",
//!     Arc::new(TracingLogger::new("splitter")),
//!     Duration::from_secs(10),
//! );
//!
//! manager.on_ready(HookOrder::Append, [HookFn::new(|| async {
//!     tracing::info!("listening");
//!     Ok(())
//! })]);
//!
//! manager.start().await.unwrap();
//! manager.stop().await.unwrap();
//! # }
//! ```

mod application;
mod context;
mod error;
mod hooks;
mod manager;
mod shutdown;

pub use application::{Application, ApplicationBuilder, DEFAULT_SHUTDOWN_TIMEOUT};
pub use context::AppContext;
pub use error::{LifecycleError, Result};
pub use hooks::{Hook, HookFn, HookOrder, HookStore, Phase};
pub use manager::{AppState, LifecycleManager};
pub use shutdown::{
    ProcessTerminator, ShutdownHandler, ShutdownOutcome, SignalStream, Terminator,
    termination_signals,
};
