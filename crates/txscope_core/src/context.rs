//! Call-chain context carrying the active transaction binding.
//!
//! A [`TxContext`] is passed explicitly down a call chain. It holds at most
//! one [`Binding`]. Contexts are immutable values:
//!
//! - cloning a context forks it; the clone is a read snapshot,
//! - binding produces a new context and leaves the original untouched.
//!
//! A rebind inside one branch of a forked chain is therefore never visible to
//! the parent or to a sibling branch.

use crate::resource::TxHandle;
use crate::types::TransactionId;
use std::fmt;
use std::future::Future;

/// Association between a call chain and its active transaction resource.
pub struct Binding<R> {
    handle: TxHandle<R>,
    depth: usize,
}

impl<R> Binding<R> {
    /// Creates a top-level binding for `handle`.
    #[must_use]
    pub fn new(handle: TxHandle<R>) -> Self {
        Self { handle, depth: 0 }
    }

    /// Returns the bound resource handle.
    #[must_use]
    pub fn handle(&self) -> &TxHandle<R> {
        &self.handle
    }

    /// Returns the bound transaction's ID.
    #[must_use]
    pub fn transaction_id(&self) -> TransactionId {
        self.handle.id()
    }

    /// Number of bindings that were already active when this one was
    /// entered. Zero for an owner binding on an empty chain.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }
}

impl<R> Clone for Binding<R> {
    fn clone(&self) -> Self {
        Self {
            handle: self.handle.clone(),
            depth: self.depth,
        }
    }
}

impl<R> fmt::Debug for Binding<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("transaction", &self.handle.id())
            .field("depth", &self.depth)
            .finish()
    }
}

/// Forkable carrier of at most one [`Binding`].
pub struct TxContext<R> {
    binding: Option<Binding<R>>,
}

impl<R> TxContext<R> {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self { binding: None }
    }

    pub(crate) fn from_binding(binding: Option<Binding<R>>) -> Self {
        Self { binding }
    }

    /// Returns the active binding, if any.
    ///
    /// Reading an empty context is valid and yields `None`.
    #[must_use]
    pub fn get(&self) -> Option<&Binding<R>> {
        self.binding.as_ref()
    }

    /// Returns the active resource handle, if any.
    #[must_use]
    pub fn handle(&self) -> Option<&TxHandle<R>> {
        self.binding.as_ref().map(Binding::handle)
    }

    /// Returns true if a transaction is active on this chain.
    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.binding.is_some()
    }

    /// Forks the context. The fork observes the same binding.
    #[must_use]
    pub fn fork(&self) -> Self {
        self.clone()
    }

    /// Returns a new context observing `binding`.
    ///
    /// The binding's depth is set relative to this context.
    #[must_use]
    pub fn with_binding(&self, binding: Binding<R>) -> Self {
        let depth = self.binding.as_ref().map_or(0, |b| b.depth + 1);
        Self {
            binding: Some(Binding { depth, ..binding }),
        }
    }

    /// Runs `body` with a child context observing `binding`.
    ///
    /// `self` still observes its previous binding once `body` completes.
    pub async fn run_with_binding<T, B, Fut>(&self, binding: Binding<R>, body: B) -> T
    where
        B: FnOnce(TxContext<R>) -> Fut,
        Fut: Future<Output = T>,
    {
        body(self.with_binding(binding)).await
    }
}

impl<R> Default for TxContext<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> Clone for TxContext<R> {
    fn clone(&self) -> Self {
        Self {
            binding: self.binding.clone(),
        }
    }
}

impl<R> fmt::Debug for TxContext<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TxContext")
            .field("binding", &self.binding)
            .finish()
    }
}
