//! Property-based test generators using proptest.

use proptest::prelude::*;
use txscope_core::Operation;

/// Deepest nesting generated by [`nesting_plan_strategy`].
pub const MAX_DEPTH: usize = 8;

/// A chain of nested transactional calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NestingPlan {
    /// Number of nested transactional calls, at least 1.
    pub depth: usize,
    /// Level (0 = outermost) whose body fails after its nested call returns.
    pub fail_at: Option<usize>,
}

impl NestingPlan {
    /// Creates a plan in which every level succeeds.
    pub fn new(depth: usize) -> Self {
        Self {
            depth: depth.max(1),
            fail_at: None,
        }
    }

    /// Makes `level` fail.
    #[must_use]
    pub fn failing_at(mut self, level: usize) -> Self {
        self.fail_at = Some(level);
        self
    }

    /// Returns true if some level fails.
    pub fn fails(&self) -> bool {
        self.fail_at.is_some_and(|level| level < self.depth)
    }
}

/// A fan-out of forked branches under one owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForkPlan {
    /// For each branch, whether it rebinds its own context before reading.
    pub rebinds: Vec<bool>,
}

impl ForkPlan {
    /// Number of branches.
    pub fn branches(&self) -> usize {
        self.rebinds.len()
    }
}

/// Strategy for nesting depths in `1..=MAX_DEPTH`.
pub fn depth_strategy() -> impl Strategy<Value = usize> {
    1..=MAX_DEPTH
}

/// Strategy for nesting plans, a third of which fail at some level.
pub fn nesting_plan_strategy() -> impl Strategy<Value = NestingPlan> {
    depth_strategy().prop_flat_map(|depth| {
        (Just(depth), prop::option::weighted(0.33, 0..depth))
            .prop_map(|(depth, fail_at)| NestingPlan { depth, fail_at })
    })
}

/// Strategy for fork plans with 1 to 6 branches.
pub fn fork_plan_strategy() -> impl Strategy<Value = ForkPlan> {
    prop::collection::vec(any::<bool>(), 1..=6).prop_map(|rebinds| ForkPlan { rebinds })
}

/// Strategy for a lifecycle operation to fail.
pub fn lifecycle_failure_strategy() -> impl Strategy<Value = Operation> {
    prop_oneof![
        Just(Operation::Connect),
        Just(Operation::Begin),
        Just(Operation::Commit),
        Just(Operation::Rollback),
        Just(Operation::Release),
    ]
}
