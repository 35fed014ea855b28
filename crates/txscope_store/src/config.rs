//! Store configuration.

use std::collections::HashSet;
use txscope_core::Operation;

/// Operations a store resource should fail on purpose.
///
/// Used to exercise rollback and release paths.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FaultPlan {
    operations: HashSet<Operation>,
}

impl FaultPlan {
    /// Creates a plan that injects no faults.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Adds `operation` to the set of failing operations.
    #[must_use]
    pub fn fail_on(mut self, operation: Operation) -> Self {
        self.operations.insert(operation);
        self
    }

    /// Returns true if `operation` should fail.
    #[must_use]
    pub fn fails(&self, operation: Operation) -> bool {
        self.operations.contains(&operation)
    }

    /// Returns true if no fault is configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

/// Configuration for a [`crate::MemoryDatabase`].
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Whether every resource operation yields to the scheduler first,
    /// simulating I/O suspension.
    pub yield_on_io: bool,

    /// Faults injected into every resource created by the database.
    pub faults: FaultPlan,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            yield_on_io: true,
            faults: FaultPlan::none(),
        }
    }
}

impl StoreConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether resource operations yield before running.
    #[must_use]
    pub fn yield_on_io(mut self, value: bool) -> Self {
        self.yield_on_io = value;
        self
    }

    /// Sets the fault plan.
    #[must_use]
    pub fn faults(mut self, faults: FaultPlan) -> Self {
        self.faults = faults;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = StoreConfig::default();
        assert!(config.yield_on_io);
        assert!(config.faults.is_empty());
    }

    #[test]
    fn builder_pattern() {
        let config = StoreConfig::new()
            .yield_on_io(false)
            .faults(FaultPlan::none().fail_on(Operation::Rollback));

        assert!(!config.yield_on_io);
        assert!(config.faults.fails(Operation::Rollback));
        assert!(!config.faults.fails(Operation::Commit));
    }
}
