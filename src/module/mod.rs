//! Application modules.
//!
//! A [`Module`] is a named boot function. Passing modules to
//! `Application::bootstrap` queues one Booting hook per module; when the hook
//! runs, the boot function wires its providers into the container and may
//! register hooks for later phases.

use crate::config::Environment;
use crate::di::Container;
use crate::lifecycle::{AppContext, LifecycleManager};
use std::fmt;
use std::sync::Arc;

/// Identity of the running service, passed to every boot function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Info {
    pub service_name: String,
    pub environment: Environment,
}

type BootFn = dyn Fn(&AppContext, &Container, &LifecycleManager, &Info) + Send + Sync;

/// A named unit of application wiring.
///
/// # Example
/// ```
/// use kiln::{di, Module};
/// use std::sync::Arc;
///
/// struct ExpenseRepository;
///
/// let expenses = Module::new("expenses", |_ctx, container, _lm, _info| {
///     di::provide(container, || Arc::new(ExpenseRepository));
/// });
/// assert_eq!(expenses.name(), "expenses");
/// ```
#[derive(Clone)]
pub struct Module {
    name: String,
    boot: Arc<BootFn>,
}

impl Module {
    pub fn new<F>(name: impl Into<String>, boot: F) -> Self
    where
        F: Fn(&AppContext, &Container, &LifecycleManager, &Info) + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            boot: Arc::new(boot),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn boot(
        &self,
        ctx: &AppContext,
        container: &Container,
        lifecycle: &LifecycleManager,
        info: &Info,
    ) {
        (self.boot)(ctx, container, lifecycle, info);
    }
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module").field("name", &self.name).finish()
    }
}
