//! Native stack accounting for the recursive parser and evaluator.

use std::hint::black_box;

/// Stack the parser and interpreter may use below the point where a run
/// starts. Hosts must call in with at least twice this much available; the
/// default for spawned Rust threads is 2 MiB.
pub const STACK_BUDGET: usize = 1 << 20;

/// Measures how far the native stack has grown since it was created.
#[derive(Debug, Clone, Copy)]
pub struct StackGuard {
    base: usize,
    budget: usize,
}

impl StackGuard {
    pub fn new() -> Self {
        Self::with_budget(STACK_BUDGET)
    }

    pub fn with_budget(budget: usize) -> Self {
        Self {
            base: stack_address(),
            budget,
        }
    }

    pub fn exhausted(&self) -> bool {
        self.base.abs_diff(stack_address()) > self.budget
    }
}

impl Default for StackGuard {
    fn default() -> Self {
        Self::new()
    }
}

#[inline(never)]
fn stack_address() -> usize {
    let marker = 0u8;
    black_box(&marker) as *const u8 as usize
}
