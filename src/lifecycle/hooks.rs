//! Lifecycle phases and the hooks registered against them.

use super::{LifecycleError, Result};
use async_trait::async_trait;
use futures::FutureExt;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use strum_macros::{Display, EnumIter};

/// The six phases, in the order they run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum Phase {
    Booting,
    Booted,
    Ready,
    Running,
    Disposing,
    Disposed,
}

impl Phase {
    /// Phases run by `start`.
    pub const STARTUP: [Phase; 4] = [Phase::Booting, Phase::Booted, Phase::Ready, Phase::Running];

    /// Phases run by `stop`.
    pub const SHUTDOWN: [Phase; 2] = [Phase::Disposing, Phase::Disposed];
}

/// Where new hooks go relative to the hooks already registered for a phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HookOrder {
    #[default]
    Append,
    Prepend,
}

/// A unit of work run during a lifecycle phase.
#[async_trait]
pub trait Hook: Send + Sync {
    async fn run(&self) -> anyhow::Result<()>;
}

struct AsyncHook<F>(F);

#[async_trait]
impl<F, Fut> Hook for AsyncHook<F>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    async fn run(&self) -> anyhow::Result<()> {
        (self.0)().await
    }
}

struct SyncHook<F>(F);

#[async_trait]
impl<F> Hook for SyncHook<F>
where
    F: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
{
    async fn run(&self) -> anyhow::Result<()> {
        (self.0)()
    }
}

/// Shared handle to a [`Hook`].
#[derive(Clone)]
pub struct HookFn(Arc<dyn Hook>);

impl HookFn {
    /// Wrap an async closure.
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self(Arc::new(AsyncHook(f)))
    }

    /// Wrap a plain closure.
    pub fn sync<F>(f: F) -> Self
    where
        F: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self(Arc::new(SyncHook(f)))
    }

    pub fn from_hook(hook: impl Hook + 'static) -> Self {
        Self(Arc::new(hook))
    }

    pub async fn run(&self) -> anyhow::Result<()> {
        self.0.run().await
    }
}

impl fmt::Debug for HookFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("HookFn")
    }
}

/// Ordered hooks per phase.
#[derive(Debug, Default)]
pub struct HookStore {
    hooks: HashMap<Phase, Vec<HookFn>>,
}

impl HookStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the hooks registered for `phase`.
    pub fn get(&self, phase: Phase) -> Vec<HookFn> {
        self.hooks.get(&phase).cloned().unwrap_or_default()
    }

    pub fn append(&mut self, phase: Phase, hooks: impl IntoIterator<Item = HookFn>) {
        self.hooks.entry(phase).or_default().extend(hooks);
    }

    /// Insert `hooks` ahead of the existing ones, keeping their given order.
    pub fn prepend(&mut self, phase: Phase, hooks: impl IntoIterator<Item = HookFn>) {
        let existing = self.hooks.entry(phase).or_default();
        let mut combined: Vec<HookFn> = hooks.into_iter().collect();
        combined.append(existing);
        *existing = combined;
    }

    pub fn add(&mut self, phase: Phase, order: HookOrder, hooks: impl IntoIterator<Item = HookFn>) {
        match order {
            HookOrder::Append => self.append(phase, hooks),
            HookOrder::Prepend => self.prepend(phase, hooks),
        }
    }

    pub fn len(&self, phase: Phase) -> usize {
        self.hooks.get(&phase).map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.values().all(Vec::is_empty)
    }
}

/// Run `hooks` one after another, stopping at the first failure.
pub(crate) async fn run_chain(phase: Phase, hooks: &[HookFn]) -> Result<()> {
    for hook in hooks {
        match AssertUnwindSafe(hook.run()).catch_unwind().await {
            Ok(Ok(())) => {}
            Ok(Err(source)) => return Err(LifecycleError::HookFailed { phase, source }),
            Err(payload) => {
                return Err(LifecycleError::HookPanicked {
                    phase,
                    message: panic_message(&*payload),
                });
            }
        }
    }
    Ok(())
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
