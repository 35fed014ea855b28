//! The transactional wrapper.
//!
//! [`Transactional`] wraps an async body and decides, once at entry, whether
//! this invocation owns the transaction:
//!
//! - **Joiner**: the context already holds a binding. The bound resource is
//!   handed to the body and the body's result is returned untouched. No
//!   lifecycle operation runs.
//! - **Owner**: the context is empty. A fresh resource is created from the
//!   configured factory and bound into a child context, then
//!   `connect → begin → body → commit`. Any failure along the way rolls the
//!   transaction back and re-raises the original error. `release` runs exactly
//!   once on every exit path, including a panic in the body.
//!
//! The owner's binding is visible to the body both ways: through the context
//! it receives and through the [`ambient`] store. Explicit
//! ([`Transactional::run`], [`Transactional::invoke`]) and ambient
//! ([`Transactional::run_ambient`]) calls nested in one owner therefore join
//! the same transaction.
//!
//! ## Cancellation
//!
//! Exit paths are those the owner future reaches itself. Dropping the future
//! before it completes (a `select!` branch losing, a timeout) skips rollback
//! and release; the resource is dropped as-is and a `warn!` names the
//! transaction that was abandoned.
//!
//! ## Example
//!
//! ```ignore
//! let tx = Transactional::new(Arc::new(database));
//! let cx = TxContext::new();
//!
//! let user = tx
//!     .run(&cx, |handle, cx| async move {
//!         let user = dao.create_user(&cx).await?; // joins
//!         handle.save(user).await.map_err(Into::into)
//!     })
//!     .await?;
//! ```

use crate::ambient;
use crate::context::{Binding, TxContext};
use crate::error::{TxError, TxResult};
use crate::marks::{Args, ParameterMarks};
use crate::resource::{ResourceFactory, TransactionResource, TxHandle};
use crate::types::{MethodId, TransactionId};
use futures::FutureExt;
use std::borrow::Cow;
use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, error, trace, warn};

const DEFAULT_LABEL: &str = "transactional";

/// Resource type produced by a factory.
pub type ResourceOf<F> = <F as ResourceFactory>::Resource;

/// Wrapping combinator that propagates one transaction through nested calls.
pub struct Transactional<F: ResourceFactory> {
    factory: Arc<F>,
    marks: Arc<ParameterMarks>,
    label: Cow<'static, str>,
}

impl<F: ResourceFactory> Transactional<F> {
    /// Creates a wrapper drawing resources from `factory`.
    pub fn new(factory: Arc<F>) -> Self {
        Self {
            factory,
            marks: Arc::new(ParameterMarks::new()),
            label: Cow::Borrowed(DEFAULT_LABEL),
        }
    }

    /// Returns a builder for a wrapper.
    #[must_use]
    pub fn builder() -> TransactionalBuilder<F> {
        TransactionalBuilder::default()
    }

    /// Returns the resource factory.
    #[must_use]
    pub fn factory(&self) -> &Arc<F> {
        &self.factory
    }

    /// Returns the parameter mark table consulted by [`Transactional::invoke`].
    #[must_use]
    pub fn marks(&self) -> &Arc<ParameterMarks> {
        &self.marks
    }

    /// Returns the label attached to this wrapper's log events.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Runs `body` inside the transaction of `cx`, starting one if `cx` has
    /// none.
    ///
    /// The body receives the active resource as its leading parameter and
    /// the context to pass to nested transactional calls.
    ///
    /// # Errors
    ///
    /// Returns the body's error unchanged, or the lifecycle error (connect,
    /// begin, commit) converted into `E`. Either way an owned transaction has
    /// been rolled back and released.
    ///
    /// # Cancellation
    ///
    /// Rollback and release run on every path the future completes through,
    /// including a panic in the body. If the future is dropped while it owns
    /// a transaction (a losing `select!` branch, a timeout), neither runs: the
    /// resource is dropped as-is and a `warn!` names the abandoned
    /// transaction.
    pub async fn run<T, E, B, Fut>(&self, cx: &TxContext<ResourceOf<F>>, body: B) -> Result<T, E>
    where
        B: FnOnce(TxHandle<ResourceOf<F>>, TxContext<ResourceOf<F>>) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<TxError>,
    {
        if let Some(binding) = cx.get() {
            self.trace_join(binding);
            return body(binding.handle().clone(), cx.clone()).await;
        }
        self.own(cx, body).await
    }

    /// Like [`Transactional::run`], with the context taken from the ambient
    /// store instead of a parameter.
    ///
    /// On the owner path the body runs with the new binding ambient, so
    /// nested calls join it. Pass [`ambient::current`] to reach it from
    /// explicit calls.
    ///
    /// # Errors
    ///
    /// Same as [`Transactional::run`].
    pub async fn run_ambient<T, E, B, Fut>(&self, body: B) -> Result<T, E>
    where
        B: FnOnce(TxHandle<ResourceOf<F>>) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<TxError>,
    {
        let cx = ambient::current::<ResourceOf<F>>();
        if let Some(binding) = cx.get() {
            self.trace_join(binding);
            return body(binding.handle().clone()).await;
        }
        self.own(&cx, |handle, _| body(handle)).await
    }

    /// Runs `body` through the marked-parameter protocol.
    ///
    /// The position marked for `method` is overwritten with the active
    /// resource before `body` receives `args`.
    ///
    /// # Errors
    ///
    /// Fails with [`TxError::MissingParameterMark`] or
    /// [`TxError::InvalidParameterMark`] before any resource is created;
    /// otherwise same as [`Transactional::run`].
    pub async fn invoke<T, E, B, Fut>(
        &self,
        cx: &TxContext<ResourceOf<F>>,
        method: MethodId,
        args: Args<ResourceOf<F>>,
        body: B,
    ) -> Result<T, E>
    where
        B: FnOnce(Args<ResourceOf<F>>, TxContext<ResourceOf<F>>) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<TxError>,
    {
        let position = self.marks.resolve(method)?;
        if position >= args.len() {
            return Err(TxError::InvalidParameterMark {
                method,
                position,
                arity: args.len(),
            }
            .into());
        }
        trace!(label = %self.label, %method, position, "substituting marked parameter");

        self.run(cx, move |handle, cx| {
            let mut args = args;
            args.substitute(position, handle);
            body(args, cx)
        })
        .await
    }

    async fn own<T, E, B, Fut>(&self, cx: &TxContext<ResourceOf<F>>, body: B) -> Result<T, E>
    where
        B: FnOnce(TxHandle<ResourceOf<F>>, TxContext<ResourceOf<F>>) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<TxError>,
    {
        let id = TransactionId::next();
        let resource = Arc::new(self.factory.create_resource());
        let handle = TxHandle::new(Arc::clone(&resource), id);
        let scoped = cx.with_binding(Binding::new(handle.clone()));
        debug!(label = %self.label, transaction = %id, "starting transaction");
        let mut guard = AbandonGuard::new(&self.label, id);

        let work = async {
            resource.connect().await?;
            resource.begin_transaction().await?;

            let nested = body(handle.clone(), scoped.clone());
            let value = ambient::scope(scoped.clone(), nested).await?;

            debug_assert!(
                scoped
                    .handle()
                    .is_some_and(|bound| bound.same_resource(&handle)),
                "binding of {id} changed while its owner was running"
            );

            resource.commit_transaction().await?;
            Ok::<T, E>(value)
        };

        let outcome = match AssertUnwindSafe(work).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(payload) => {
                warn!(label = %self.label, transaction = %id, "body panicked; rolling back");
                self.roll_back(&*resource, id).await;
                self.release(&*resource, id).await;
                guard.disarm();
                panic::resume_unwind(payload);
            }
        };

        match &outcome {
            Ok(_) => debug!(label = %self.label, transaction = %id, "committed"),
            Err(_) => {
                debug!(label = %self.label, transaction = %id, "failed; rolling back");
                self.roll_back(&*resource, id).await;
            }
        }

        self.release(&*resource, id).await;
        guard.disarm();
        outcome
    }

    async fn roll_back(&self, resource: &ResourceOf<F>, id: TransactionId) {
        match resource.rollback_transaction().await {
            Ok(()) => debug!(label = %self.label, transaction = %id, "rolled back"),
            Err(err) => error!(
                label = %self.label,
                transaction = %id,
                error = %err,
                "rollback failed; propagating original error"
            ),
        }
    }

    async fn release(&self, resource: &ResourceOf<F>, id: TransactionId) {
        match resource.release().await {
            Ok(()) => trace!(label = %self.label, transaction = %id, "released"),
            Err(err) => warn!(
                label = %self.label,
                transaction = %id,
                error = %err,
                "release failed"
            ),
        }
    }

    fn trace_join(&self, binding: &Binding<ResourceOf<F>>) {
        trace!(
            label = %self.label,
            transaction = %binding.transaction_id(),
            depth = binding.depth(),
            "joining active transaction"
        );
    }
}

/// Warns when an owner future is dropped before it released its resource.
struct AbandonGuard<'a> {
    label: &'a str,
    id: TransactionId,
    armed: bool,
}

impl<'a> AbandonGuard<'a> {
    fn new(label: &'a str, id: TransactionId) -> Self {
        Self {
            label,
            id,
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for AbandonGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            warn!(
                label = %self.label,
                transaction = %self.id,
                "owner dropped before completion; transaction abandoned without rollback or release"
            );
        }
    }
}

impl<F: ResourceFactory> Clone for Transactional<F> {
    fn clone(&self) -> Self {
        Self {
            factory: Arc::clone(&self.factory),
            marks: Arc::clone(&self.marks),
            label: self.label.clone(),
        }
    }
}

impl<F: ResourceFactory> fmt::Debug for Transactional<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transactional")
            .field("label", &self.label)
            .field("marked_methods", &self.marks.len())
            .finish_non_exhaustive()
    }
}

/// Builder for [`Transactional`].
pub struct TransactionalBuilder<F> {
    factory: Option<Arc<F>>,
    marks: Option<Arc<ParameterMarks>>,
    label: Cow<'static, str>,
}

impl<F> Default for TransactionalBuilder<F> {
    fn default() -> Self {
        Self {
            factory: None,
            marks: None,
            label: Cow::Borrowed(DEFAULT_LABEL),
        }
    }
}

impl<F: ResourceFactory> TransactionalBuilder<F> {
    /// Sets the connection source resources are drawn from.
    #[must_use]
    pub fn factory(mut self, factory: Arc<F>) -> Self {
        self.factory = Some(factory);
        self
    }

    /// Sets the parameter mark table used by [`Transactional::invoke`].
    #[must_use]
    pub fn marks(mut self, marks: Arc<ParameterMarks>) -> Self {
        self.marks = Some(marks);
        self
    }

    /// Sets the label attached to log events.
    #[must_use]
    pub fn label(mut self, label: impl Into<Cow<'static, str>>) -> Self {
        self.label = label.into();
        self
    }

    /// Builds the wrapper.
    ///
    /// # Errors
    ///
    /// Returns [`TxError::MissingConnectionSource`] if no factory was set.
    pub fn build(self) -> TxResult<Transactional<F>> {
        let factory = self.factory.ok_or(TxError::MissingConnectionSource)?;
        Ok(Transactional {
            factory,
            marks: self.marks.unwrap_or_default(),
            label: self.label,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::UnitOfWork;
    use crate::types::Operation;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, thiserror::Error)]
    enum TestError {
        #[error(transparent)]
        Tx(#[from] TxError),
        #[error("business failure")]
        Business,
    }

    #[derive(Default)]
    struct Journal {
        events: Mutex<Vec<&'static str>>,
    }

    impl Journal {
        fn push(&self, event: &'static str) {
            self.events.lock().push(event);
        }

        fn events(&self) -> Vec<&'static str> {
            self.events.lock().clone()
        }

        fn count(&self, event: &str) -> usize {
            self.events.lock().iter().filter(|e| **e == event).count()
        }
    }

    struct Probe {
        journal: Arc<Journal>,
        failures: Vec<Operation>,
    }

    impl Probe {
        fn step(&self, operation: Operation) -> TxResult<()> {
            self.journal.push(operation.as_str());
            if self.failures.contains(&operation) {
                return Err(TxError::resource(operation, "injected"));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl UnitOfWork for Probe {
        type Entity = u32;
        type Criteria = ();

        async fn load(&self, _kind: &str, _criteria: &()) -> TxResult<Vec<u32>> {
            self.step(Operation::Load)?;
            Ok(Vec::new())
        }

        async fn save(&self, entity: u32) -> TxResult<u32> {
            self.step(Operation::Save)?;
            Ok(entity)
        }
    }

    #[async_trait]
    impl TransactionResource for Probe {
        async fn connect(&self) -> TxResult<()> {
            self.step(Operation::Connect)
        }

        async fn begin_transaction(&self) -> TxResult<()> {
            tokio::task::yield_now().await;
            self.step(Operation::Begin)
        }

        async fn commit_transaction(&self) -> TxResult<()> {
            tokio::task::yield_now().await;
            self.step(Operation::Commit)
        }

        async fn rollback_transaction(&self) -> TxResult<()> {
            self.step(Operation::Rollback)
        }

        async fn release(&self) -> TxResult<()> {
            self.step(Operation::Release)
        }
    }

    #[derive(Default)]
    struct ProbeFactory {
        journal: Arc<Journal>,
        failures: Vec<Operation>,
        created: AtomicUsize,
    }

    impl ProbeFactory {
        fn failing(failures: &[Operation]) -> Self {
            Self {
                failures: failures.to_vec(),
                ..Self::default()
            }
        }
    }

    impl ResourceFactory for ProbeFactory {
        type Resource = Probe;

        fn create_resource(&self) -> Probe {
            self.created.fetch_add(1, Ordering::SeqCst);
            Probe {
                journal: Arc::clone(&self.journal),
                failures: self.failures.clone(),
            }
        }
    }

    fn wrapper(factory: ProbeFactory) -> (Transactional<ProbeFactory>, Arc<ProbeFactory>) {
        let factory = Arc::new(factory);
        (Transactional::new(Arc::clone(&factory)), factory)
    }

    #[tokio::test]
    async fn owner_commits_and_releases() {
        let (tx, factory) = wrapper(ProbeFactory::default());
        let cx = TxContext::new();

        let saved: Result<u32, TestError> = tx
            .run(&cx, |handle, _cx| async move { Ok(handle.save(7).await?) })
            .await;

        assert_eq!(saved.unwrap(), 7);
        assert_eq!(
            factory.journal.events(),
            vec!["connect", "begin", "save", "commit", "release"]
        );
        assert!(!cx.is_bound());
    }

    #[tokio::test]
    async fn nested_calls_join_the_owner() {
        let (tx, factory) = wrapper(ProbeFactory::default());
        let inner_tx = tx.clone();

        let result: Result<bool, TestError> = tx
            .run(&TxContext::new(), |outer, cx| async move {
                inner_tx
                    .run(&cx, |inner, _cx| async move {
                        inner.save(1).await?;
                        Ok::<_, TestError>(inner.same_resource(&outer))
                    })
                    .await
            })
            .await;

        assert!(result.unwrap());
        assert_eq!(factory.created.load(Ordering::SeqCst), 1);
        assert_eq!(factory.journal.count("begin"), 1);
        assert_eq!(factory.journal.count("commit"), 1);
        assert_eq!(factory.journal.count("release"), 1);
    }

    #[tokio::test]
    async fn body_error_rolls_back_and_propagates() {
        let (tx, factory) = wrapper(ProbeFactory::default());

        let result: Result<(), TestError> = tx
            .run(&TxContext::new(), |handle, _cx| async move {
                handle.save(1).await?;
                Err(TestError::Business)
            })
            .await;

        assert!(matches!(result, Err(TestError::Business)));
        assert_eq!(
            factory.journal.events(),
            vec!["connect", "begin", "save", "rollback", "release"]
        );
    }

    #[tokio::test]
    async fn joiner_error_passes_through_unchanged() {
        let (tx, factory) = wrapper(ProbeFactory::default());
        let inner_tx = tx.clone();

        let result: Result<(), TestError> = tx
            .run(&TxContext::new(), |_handle, cx| async move {
                inner_tx
                    .run(&cx, |_inner, _cx| async { Err(TestError::Business) })
                    .await
            })
            .await;

        assert!(matches!(result, Err(TestError::Business)));
        assert_eq!(factory.journal.count("rollback"), 1);
        assert_eq!(factory.journal.count("commit"), 0);
    }

    #[tokio::test]
    async fn commit_failure_rolls_back() {
        let (tx, factory) = wrapper(ProbeFactory::failing(&[Operation::Commit]));

        let result: Result<(), TestError> =
            tx.run(&TxContext::new(), |_h, _cx| async { Ok(()) }).await;

        assert!(matches!(
            result,
            Err(TestError::Tx(TxError::Resource {
                operation: Operation::Commit,
                ..
            }))
        ));
        assert_eq!(
            factory.journal.events(),
            vec!["connect", "begin", "commit", "rollback", "release"]
        );
    }

    #[tokio::test]
    async fn connect_failure_skips_body_but_releases() {
        let (tx, factory) = wrapper(ProbeFactory::failing(&[Operation::Connect]));
        let ran = Arc::new(AtomicUsize::new(0));
        let probe = Arc::clone(&ran);

        let result: Result<(), TestError> = tx
            .run(&TxContext::new(), |_h, _cx| async move {
                probe.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await;

        assert!(matches!(
            result.unwrap_err().into_tx().and_then(|e| e.operation()),
            Some(Operation::Connect)
        ));
        assert_eq!(ran.load(Ordering::SeqCst), 0);
        assert_eq!(factory.journal.count("release"), 1);
    }

    #[tokio::test]
    async fn rollback_failure_does_not_mask_original_error() {
        let (tx, factory) = wrapper(ProbeFactory::failing(&[Operation::Rollback]));

        let result: Result<(), TestError> = tx
            .run(&TxContext::new(), |_h, _cx| async { Err(TestError::Business) })
            .await;

        assert!(matches!(result, Err(TestError::Business)));
        assert_eq!(
            factory.journal.events(),
            vec!["connect", "begin", "rollback", "release"]
        );
    }

    #[tokio::test]
    async fn release_failure_keeps_committed_result() {
        let (tx, factory) = wrapper(ProbeFactory::failing(&[Operation::Release]));

        let result: Result<u8, TestError> =
            tx.run(&TxContext::new(), |_h, _cx| async { Ok(3) }).await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(factory.journal.count("commit"), 1);
        assert_eq!(factory.journal.count("release"), 1);
    }

    #[tokio::test]
    async fn panic_in_body_still_releases() {
        let (tx, factory) = wrapper(ProbeFactory::default());

        let joined = tokio::spawn(async move {
            let _: Result<(), TestError> = tx
                .run(&TxContext::new(), |_h, _cx| async { panic!("boom") })
                .await;
        })
        .await;

        assert!(joined.unwrap_err().is_panic());
        assert_eq!(
            factory.journal.events(),
            vec!["connect", "begin", "rollback", "release"]
        );
    }

    #[tokio::test]
    async fn unused_resource_is_still_released() {
        let (tx, factory) = wrapper(ProbeFactory::default());

        let _: Result<(), TestError> = tx.run(&TxContext::new(), |_h, _cx| async { Ok(()) }).await;

        assert_eq!(
            factory.journal.events(),
            vec!["connect", "begin", "commit", "release"]
        );
    }

    #[test]
    fn builder_requires_connection_source() {
        let built = Transactional::<ProbeFactory>::builder().label("users").build();
        assert!(matches!(built, Err(TxError::MissingConnectionSource)));

        let built = Transactional::builder()
            .factory(Arc::new(ProbeFactory::default()))
            .label("users")
            .build()
            .unwrap();
        assert_eq!(built.label(), "users");
    }

    const UPDATE: MethodId = MethodId::new("Probe::update");

    #[tokio::test]
    async fn invoke_without_mark_fails_before_resource_creation() {
        let (tx, factory) = wrapper(ProbeFactory::default());

        let result: Result<(), TestError> = tx
            .invoke(
                &TxContext::new(),
                UPDATE,
                Args::new().placeholder(),
                |_args, _cx| async { Ok(()) },
            )
            .await;

        assert!(matches!(
            result,
            Err(TestError::Tx(TxError::MissingParameterMark { .. }))
        ));
        assert_eq!(factory.created.load(Ordering::SeqCst), 0);
        assert!(factory.journal.events().is_empty());
    }

    #[tokio::test]
    async fn invoke_rejects_out_of_range_mark() {
        let factory = Arc::new(ProbeFactory::default());
        let tx = Transactional::builder()
            .factory(Arc::clone(&factory))
            .marks(Arc::new(ParameterMarks::new().with_mark(UPDATE, 2)))
            .build()
            .unwrap();

        let result: Result<(), TestError> = tx
            .invoke(
                &TxContext::new(),
                UPDATE,
                Args::new().value(1_u32).placeholder(),
                |_args, _cx| async { Ok(()) },
            )
            .await;

        assert!(matches!(
            result,
            Err(TestError::Tx(TxError::InvalidParameterMark {
                position: 2,
                arity: 2,
                ..
            }))
        ));
        assert_eq!(factory.created.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn invoke_substitutes_active_resource() {
        let factory = Arc::new(ProbeFactory::default());
        let tx = Transactional::builder()
            .factory(Arc::clone(&factory))
            .marks(Arc::new(ParameterMarks::new().with_mark(UPDATE, 1)))
            .build()
            .unwrap();

        let result: Result<u32, TestError> = tx
            .invoke(
                &TxContext::new(),
                UPDATE,
                Args::new().value(41_u32).placeholder(),
                |mut args, cx| async move {
                    let value = args.take::<u32>(0)?;
                    let handle = args.resource(1)?;
                    assert!(handle.same_resource(cx.handle().unwrap()));
                    Ok(handle.save(value + 1).await?)
                },
            )
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(factory.journal.count("commit"), 1);
    }

    #[tokio::test]
    async fn ambient_nested_calls_join() {
        let (tx, factory) = wrapper(ProbeFactory::default());
        let inner_tx = tx.clone();

        let result: Result<bool, TestError> = tx
            .run_ambient(|outer| async move {
                tokio::task::yield_now().await;
                inner_tx
                    .run_ambient(|inner| async move { Ok(inner.same_resource(&outer)) })
                    .await
            })
            .await;

        assert!(result.unwrap());
        assert_eq!(factory.created.load(Ordering::SeqCst), 1);
        assert!(!ambient::is_active());
    }

    #[tokio::test]
    async fn explicit_owner_is_joined_by_ambient_calls() {
        let (tx, factory) = wrapper(ProbeFactory::default());
        let inner_tx = tx.clone();

        let result: Result<bool, TestError> = tx
            .run(&TxContext::new(), |outer, _cx| async move {
                inner_tx
                    .run_ambient(|inner| async move {
                        inner.save(1).await?;
                        Ok(inner.same_resource(&outer))
                    })
                    .await
            })
            .await;

        assert!(result.unwrap());
        assert_eq!(factory.created.load(Ordering::SeqCst), 1);
        assert_eq!(
            factory.journal.events(),
            vec!["connect", "begin", "save", "commit", "release"]
        );
        assert!(!ambient::is_active());
    }

    #[tokio::test]
    async fn invoke_owner_is_joined_by_ambient_calls() {
        let factory = Arc::new(ProbeFactory::default());
        let tx = Transactional::builder()
            .factory(Arc::clone(&factory))
            .marks(Arc::new(ParameterMarks::new().with_mark(UPDATE, 0)))
            .build()
            .unwrap();
        let inner_tx = tx.clone();

        let result: Result<bool, TestError> = tx
            .invoke(
                &TxContext::new(),
                UPDATE,
                Args::new().placeholder(),
                |args, _cx| async move {
                    let outer = args.resource(0)?;
                    inner_tx
                        .run_ambient(|inner| async move { Ok(inner.same_resource(&outer)) })
                        .await
                },
            )
            .await;

        assert!(result.unwrap());
        assert_eq!(factory.created.load(Ordering::SeqCst), 1);
        assert_eq!(factory.journal.count("commit"), 1);
    }

    #[tokio::test]
    async fn ambient_owner_is_joined_by_explicit_calls() {
        let (tx, factory) = wrapper(ProbeFactory::default());
        let inner_tx = tx.clone();

        let result: Result<bool, TestError> = tx
            .run_ambient(|outer| async move {
                inner_tx
                    .run(&ambient::current(), |inner, _cx| async move {
                        Ok(inner.same_resource(&outer))
                    })
                    .await
            })
            .await;

        assert!(result.unwrap());
        assert_eq!(factory.created.load(Ordering::SeqCst), 1);
        assert_eq!(factory.journal.count("release"), 1);
    }

    #[tokio::test]
    async fn nested_ambient_error_rolls_back_explicit_owner() {
        let (tx, factory) = wrapper(ProbeFactory::default());
        let inner_tx = tx.clone();

        let result: Result<(), TestError> = tx
            .run(&TxContext::new(), |outer, _cx| async move {
                outer.save(1).await?;
                inner_tx
                    .run_ambient(|_inner| async { Err(TestError::Business) })
                    .await
            })
            .await;

        assert!(matches!(result, Err(TestError::Business)));
        assert_eq!(
            factory.journal.events(),
            vec!["connect", "begin", "save", "rollback", "release"]
        );
    }

    #[tokio::test]
    async fn dropped_owner_skips_rollback_and_release() {
        let (tx, factory) = wrapper(ProbeFactory::default());

        let timed_out = tokio::time::timeout(
            std::time::Duration::from_millis(20),
            tx.run(&TxContext::new(), |_h, _cx| {
                std::future::pending::<Result<(), TestError>>()
            }),
        )
        .await;

        assert!(timed_out.is_err());
        assert_eq!(factory.journal.events(), vec!["connect", "begin"]);
        assert!(!ambient::is_active());
    }

    impl TestError {
        fn into_tx(self) -> Option<TxError> {
            match self {
                Self::Tx(err) => Some(err),
                Self::Business => None,
            }
        }
    }
}
