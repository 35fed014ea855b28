//! Ambient context store.
//!
//! For call chains that do not pass a [`TxContext`] explicitly, the active
//! binding can be carried by the executing future itself. [`scope`] installs a
//! context for the whole extent of a future, across every suspension point;
//! [`current`] reads it back from anywhere inside that extent.
//!
//! The store is a tokio task-local. Each scoped future sees its own value even
//! when it is interleaved with sibling futures in the same task (for example
//! under `tokio::join!`). Tasks started with `tokio::spawn` start empty; use
//! [`spawn_scoped`] to hand the current context to a spawned task.

use crate::context::{Binding, TxContext};
use std::any::Any;
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinHandle;

type ErasedBinding = Arc<dyn Any + Send + Sync>;

tokio::task_local! {
    static AMBIENT: Option<ErasedBinding>;
}

/// Returns the ambient context of the current call chain.
///
/// Outside any [`scope`], or when the ambient binding belongs to a different
/// resource type, the returned context is empty.
#[must_use]
pub fn current<R>() -> TxContext<R>
where
    R: Send + Sync + 'static,
{
    let binding = AMBIENT
        .try_with(|slot| {
            slot.as_ref()
                .and_then(|erased| erased.downcast_ref::<Binding<R>>())
                .cloned()
        })
        .ok()
        .flatten();
    TxContext::from_binding(binding)
}

/// Returns true if any binding is ambient on the current call chain.
#[must_use]
pub fn is_active() -> bool {
    AMBIENT
        .try_with(|slot| slot.is_some())
        .unwrap_or(false)
}

/// Runs `future` with `cx` as its ambient context.
///
/// Callers outside `future` keep observing whatever was ambient before.
pub async fn scope<R, Fut>(cx: TxContext<R>, future: Fut) -> Fut::Output
where
    R: Send + Sync + 'static,
    Fut: Future,
{
    let erased = cx
        .get()
        .cloned()
        .map(|binding| Arc::new(binding) as ErasedBinding);
    AMBIENT.scope(erased, future).await
}

/// Spawns `future` on the runtime with a copy of the current ambient context.
pub fn spawn_scoped<F>(future: F) -> JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    let snapshot = AMBIENT.try_with(Clone::clone).ok().flatten();
    tokio::spawn(AMBIENT.scope(snapshot, future))
}
