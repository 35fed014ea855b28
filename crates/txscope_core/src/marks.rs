//! Marked-parameter substitution protocol.
//!
//! A transactional method invoked through [`crate::Transactional::invoke`]
//! receives its arguments as a positional [`Args`] list. One position is the
//! injection point for the active transaction resource; that position is
//! recorded once, at registration time, in a [`ParameterMarks`] table.
//!
//! Callers fill the marked position with [`TxSlot::Placeholder`]. The wrapper
//! overwrites it with the live resource before running the method. A body
//! that is called directly, bypassing the wrapper, sees the placeholder and
//! fails with [`TxError::PlaceholderResource`] as soon as it touches it.

use crate::error::{TxError, TxResult};
use crate::resource::TxHandle;
use crate::types::MethodId;
use parking_lot::RwLock;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;

/// Table from method identity to the position of its resource parameter.
#[derive(Debug, Default)]
pub struct ParameterMarks {
    marks: RwLock<HashMap<MethodId, usize>>,
}

impl ParameterMarks {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `position` as the resource parameter of `method`.
    ///
    /// Returns the previously recorded position, if any.
    pub fn mark(&self, method: MethodId, position: usize) -> Option<usize> {
        self.marks.write().insert(method, position)
    }

    /// Builder form of [`ParameterMarks::mark`].
    #[must_use]
    pub fn with_mark(self, method: MethodId, position: usize) -> Self {
        self.mark(method, position);
        self
    }

    /// Returns the marked position of `method`.
    ///
    /// # Errors
    ///
    /// Returns [`TxError::MissingParameterMark`] if `method` was never marked.
    pub fn resolve(&self, method: MethodId) -> TxResult<usize> {
        self.marks
            .read()
            .get(&method)
            .copied()
            .ok_or_else(|| TxError::missing_mark(method))
    }

    /// Returns the number of marked methods.
    #[must_use]
    pub fn len(&self) -> usize {
        self.marks.read().len()
    }

    /// Returns true if no method is marked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.marks.read().is_empty()
    }
}

/// The value occupying a marked resource parameter.
pub enum TxSlot<R> {
    /// Stand-in used when no transactional scope supplied a resource.
    Placeholder,
    /// The active transaction resource.
    Bound(TxHandle<R>),
}

impl<R> TxSlot<R> {
    /// Returns the placeholder slot.
    #[must_use]
    pub fn placeholder() -> Self {
        Self::Placeholder
    }

    /// Returns true if no real resource occupies this slot.
    #[must_use]
    pub fn is_placeholder(&self) -> bool {
        matches!(self, Self::Placeholder)
    }

    /// Returns the bound resource.
    ///
    /// # Errors
    ///
    /// Returns [`TxError::PlaceholderResource`] for the placeholder.
    pub fn handle(&self) -> TxResult<&TxHandle<R>> {
        match self {
            Self::Bound(handle) => Ok(handle),
            Self::Placeholder => Err(TxError::PlaceholderResource),
        }
    }

    /// Consumes the slot, returning the bound resource.
    ///
    /// # Errors
    ///
    /// Returns [`TxError::PlaceholderResource`] for the placeholder.
    pub fn into_handle(self) -> TxResult<TxHandle<R>> {
        match self {
            Self::Bound(handle) => Ok(handle),
            Self::Placeholder => Err(TxError::PlaceholderResource),
        }
    }
}

impl<R> Default for TxSlot<R> {
    fn default() -> Self {
        Self::Placeholder
    }
}

impl<R> Clone for TxSlot<R> {
    fn clone(&self) -> Self {
        match self {
            Self::Placeholder => Self::Placeholder,
            Self::Bound(handle) => Self::Bound(handle.clone()),
        }
    }
}

impl<R> From<TxHandle<R>> for TxSlot<R> {
    fn from(handle: TxHandle<R>) -> Self {
        Self::Bound(handle)
    }
}

impl<R> fmt::Debug for TxSlot<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Placeholder => f.write_str("Placeholder"),
            Self::Bound(handle) => f.debug_tuple("Bound").field(&handle.id()).finish(),
        }
    }
}

enum Arg<R> {
    Value(Box<dyn Any + Send>),
    Resource(TxSlot<R>),
}

/// Positional argument list for a marked transactional method.
pub struct Args<R> {
    items: Vec<Option<Arg<R>>>,
}

impl<R> Args<R> {
    /// Creates an empty argument list.
    #[must_use]
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Appends a plain value argument.
    #[must_use]
    pub fn value<T: Any + Send>(mut self, value: T) -> Self {
        self.items.push(Some(Arg::Value(Box::new(value))));
        self
    }

    /// Appends a placeholder resource argument.
    #[must_use]
    pub fn placeholder(mut self) -> Self {
        self.items.push(Some(Arg::Resource(TxSlot::Placeholder)));
        self
    }

    /// Returns the number of arguments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true if there are no arguments.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Moves the value argument at `position` out of the list.
    ///
    /// # Errors
    ///
    /// Returns [`TxError::ArgumentType`] if the position is empty, holds a
    /// resource, or holds a value of another type.
    pub fn take<T: Any>(&mut self, position: usize) -> TxResult<T> {
        let slot = self
            .items
            .get_mut(position)
            .ok_or(TxError::ArgumentType { position })?;
        match slot.take() {
            Some(Arg::Value(value)) => match value.downcast::<T>() {
                Ok(value) => Ok(*value),
                Err(value) => {
                    *slot = Some(Arg::Value(value));
                    Err(TxError::ArgumentType { position })
                }
            },
            other => {
                *slot = other;
                Err(TxError::ArgumentType { position })
            }
        }
    }

    /// Returns the resource slot at `position`.
    ///
    /// # Errors
    ///
    /// Returns [`TxError::ArgumentType`] if the position does not hold a
    /// resource slot.
    pub fn slot(&self, position: usize) -> TxResult<&TxSlot<R>> {
        match self.items.get(position) {
            Some(Some(Arg::Resource(slot))) => Ok(slot),
            _ => Err(TxError::ArgumentType { position }),
        }
    }

    /// Returns the resource bound at `position`.
    ///
    /// # Errors
    ///
    /// Returns [`TxError::PlaceholderResource`] if the slot still holds the
    /// placeholder.
    pub fn resource(&self, position: usize) -> TxResult<&TxHandle<R>> {
        self.slot(position)?.handle()
    }

    /// Overwrites `position` with the active resource.
    pub(crate) fn substitute(&mut self, position: usize, handle: TxHandle<R>) {
        if let Some(item) = self.items.get_mut(position) {
            *item = Some(Arg::Resource(TxSlot::Bound(handle)));
        }
    }
}

impl<R> Default for Args<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> fmt::Debug for Args<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut list = f.debug_list();
        for item in &self.items {
            match item {
                Some(Arg::Value(_)) => list.entry(&"value"),
                Some(Arg::Resource(slot)) => list.entry(slot),
                None => list.entry(&"taken"),
            };
        }
        list.finish()
    }
}
