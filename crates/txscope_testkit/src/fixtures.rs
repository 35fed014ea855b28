//! Fixtures driving nested transactional calls.

use crate::generators::NestingPlan;
use crate::recording::{RecordingFactory, RecordingResource};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::future::Future;
use thiserror::Error;
use txscope_core::{Transactional, TransactionId, TxContext, TxError};

/// Wrapper over a [`RecordingFactory`].
pub type RecordingTx = Transactional<RecordingFactory>;

/// Context over [`RecordingResource`]s.
pub type RecordingContext = TxContext<RecordingResource>;

/// Error raised by [`run_nested`].
#[derive(Debug, Error)]
pub enum NestError {
    /// Propagation or resource failure.
    #[error(transparent)]
    Tx(#[from] TxError),
    /// Business failure planted at one level.
    #[error("planted failure at level {level}")]
    Planted {
        /// Level that failed.
        level: usize,
    },
}

/// Runs `plan.depth` nested transactional calls on one chain.
///
/// Each level saves one entity and records the transaction it observed; the
/// returned IDs are ordered outermost first.
pub fn run_nested<'a>(
    tx: &'a RecordingTx,
    cx: RecordingContext,
    plan: NestingPlan,
) -> BoxFuture<'a, Result<Vec<TransactionId>, NestError>> {
    nest_level(tx, cx, plan, 0)
}

fn nest_level<'a>(
    tx: &'a RecordingTx,
    cx: RecordingContext,
    plan: NestingPlan,
    level: usize,
) -> BoxFuture<'a, Result<Vec<TransactionId>, NestError>> {
    async move {
        tx.run(&cx, move |handle, cx| async move {
            handle.save(format!("level{level}")).await?;
            let mut seen = vec![handle.id()];
            if level + 1 < plan.depth {
                seen.extend(nest_level(tx, cx, plan, level + 1).await?);
            }
            if plan.fail_at == Some(level) {
                return Err(NestError::Planted { level });
            }
            Ok::<_, NestError>(seen)
        })
        .await
    }
    .boxed()
}

/// Runs `future` to completion on a fresh current-thread runtime.
///
/// For proptest bodies, which are synchronous.
///
/// # Panics
///
/// Panics if the runtime cannot be built.
pub fn block_on<F: Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("Failed to build runtime")
        .block_on(future)
}
