//! Priority assignment (C3).
//!
//! Priority ordering follows spec §4.3's written algorithm rather than the
//! original's `cmp`-based comparator, which the original source itself flags
//! as untranslated Python-2-only code (`## TODO: "key" instead of "cmp"`).
//! The written rule is unambiguous: positive priorities outrank negative
//! ones, smaller positive numbers outrank larger ones, and `0` (reserved for
//! dispatcher-inserted pseudo-tasks) outranks everything. See DESIGN.md.

use std::cmp::Ordering;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{DispatcherError, Result};
use crate::job::{Job, JobHandle};

/// A task's scheduling priority.
///
/// Ordered so that `Priority::HIGHEST` (`0`) sorts first, then positive
/// values ascending, then all negative values (mutually equal-ranked, per
/// spec §4.3) last. Use [`Priority::cmp`] or the `Ord` impl directly as the
/// primary key of a `(Priority, TaskId)` sort; ties are broken by id at the
/// call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Priority(pub i64);

impl Priority {
    /// Reserved for dispatcher-inserted `sleep`/`die` pseudo-tasks (spec §3
    /// invariant 5). Outranks every user-assigned priority.
    pub const HIGHEST: Priority = Priority(0);

    /// The default for a job whose priority has not been user-set or
    /// auto-assigned yet.
    pub const UNSET: Priority = Priority(-1);

    fn rank(self) -> (u8, i64) {
        match self.0 {
            0 => (0, 0),
            p if p > 0 => (1, p),
            _ => (2, 0),
        }
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority::UNSET
    }
}

impl PartialOrd for Priority {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Priority {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank().cmp(&other.rank())
    }
}

/// Policy selected per pool at `initialize_new_job_pool` time (spec §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriorityPolicy {
    /// Default. Drain one dependency tree before starting the next.
    Tree,
    /// Reserved name; not implemented (spec §4.3, §9 Open Questions).
    Trunk,
    /// No automatic assignment; order is constrained only by dependencies.
    Anarchy,
}

/// Assign priorities to every job in `jobs` according to `policy`, honoring
/// user-supplied positive priorities (never overwritten) and `forest`'s tree
/// order (spec §4.3).
pub fn assign_priorities(
    jobs: &mut [Job],
    forest: &[Vec<JobHandle>],
    policy: PriorityPolicy,
) -> Result<()> {
    match policy {
        PriorityPolicy::Anarchy => Ok(()),
        PriorityPolicy::Trunk => Err(DispatcherError::UnsupportedPolicy("trunk".to_string())),
        PriorityPolicy::Tree => {
            assign_tree_priorities(jobs, forest);
            Ok(())
        }
    }
}

fn assign_tree_priorities(jobs: &mut [Job], forest: &[Vec<JobHandle>]) {
    let index: HashMap<JobHandle, usize> = jobs
        .iter()
        .enumerate()
        .map(|(i, job)| (job.handle(), i))
        .collect();

    let mut lowest_priority = jobs
        .iter()
        .map(|j| j.current_priority().0)
        .max()
        .unwrap_or(0)
        .max(0);

    for tree in forest {
        lowest_priority += 1;
        let tree_priority = Priority(lowest_priority);

        for handle in tree {
            let idx = index[handle];
            if jobs[idx].current_priority().0 < 0 {
                jobs[idx].set_priority(tree_priority);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_matches_spec_total_order() {
        // 0 (highest) > smaller positive > larger positive > any negative
        assert!(Priority(0) < Priority(1));
        assert!(Priority(1) < Priority(2));
        assert!(Priority(2) < Priority(-1));
        assert!(Priority(-1) == Priority(-5)); // mutually equal-ranked
        assert!(Priority(-100) == Priority(-1));
    }

    #[test]
    fn sort_key_orders_sleep_die_first() {
        let mut priorities = vec![Priority(3), Priority(-1), Priority(1), Priority::HIGHEST];
        priorities.sort();
        assert_eq!(
            priorities,
            vec![Priority(0), Priority(1), Priority(3), Priority(-1)]
        );
    }

    proptest::proptest! {
        #[test]
        fn total_order_is_transitive(a in -1000i64..1000, b in -1000i64..1000, c in -1000i64..1000) {
            let (pa, pb, pc) = (Priority(a), Priority(b), Priority(c));
            if pa <= pb && pb <= pc {
                proptest::prop_assert!(pa <= pc);
            }
        }

        #[test]
        fn positive_always_beats_negative(p in 1i64..10_000, n in -10_000i64..0) {
            proptest::prop_assert!(Priority(p) < Priority(n));
        }

        #[test]
        fn zero_always_highest(p in -10_000i64..10_000) {
            if p != 0 {
                proptest::prop_assert!(Priority::HIGHEST < Priority(p));
            }
        }
    }
}
