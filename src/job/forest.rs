//! Forest construction (C2): derive dependency-ordered trees from an
//! unordered job pool.
//!
//! Reverse-dependents are built into a transient side-table rather than
//! mutated onto [`Job`] values, per spec §9's ownership-disciplined
//! implementation note (REDESIGN FLAGS).

use std::collections::{HashMap, HashSet};

use petgraph::algo::is_cyclic_directed;
use petgraph::graph::DiGraph;

use crate::error::{DispatcherError, Result};
use crate::job::{Job, JobHandle};

/// An ordered list of trees; each tree is an ordered list of job handles
/// with the root at position 0 (spec §3 "Forest").
pub type Forest = Vec<Vec<JobHandle>>;

/// Build the dependency forest for `jobs` (spec §4.2).
///
/// Fails with [`DispatcherError::DanglingDependency`] if a job depends on a
/// handle absent from `jobs`, [`DispatcherError::CyclicDependency`] if the
/// dependency graph has a cycle, or [`DispatcherError::OrphanJob`] if a job
/// is never reached by the root-outward walk.
pub fn build_forest(jobs: &[Job]) -> Result<Forest> {
    let by_handle: HashMap<JobHandle, &Job> = jobs.iter().map(|j| (j.handle(), j)).collect();

    check_dangling_dependencies(jobs, &by_handle)?;
    check_cycles(jobs)?;

    let reverse_dependents = build_reverse_dependents(jobs);
    let mut trees = seed_roots(jobs);
    walk_trees(&mut trees, &by_handle, &reverse_dependents);
    check_orphans(jobs, &trees)?;

    Ok(trees)
}

fn check_dangling_dependencies(jobs: &[Job], by_handle: &HashMap<JobHandle, &Job>) -> Result<()> {
    for job in jobs {
        for dep in job.depends_on_handles() {
            if !by_handle.contains_key(dep) {
                return Err(DispatcherError::DanglingDependency(job.handle(), *dep));
            }
        }
    }
    Ok(())
}

fn check_cycles(jobs: &[Job]) -> Result<()> {
    let mut graph = DiGraph::<JobHandle, ()>::new();
    let mut nodes = HashMap::new();

    for job in jobs {
        let idx = graph.add_node(job.handle());
        nodes.insert(job.handle(), idx);
    }
    for job in jobs {
        for dep in job.depends_on_handles() {
            // Edge points dependency -> dependent, matching topological flow.
            graph.add_edge(nodes[dep], nodes[&job.handle()], ());
        }
    }

    if is_cyclic_directed(&graph) {
        return Err(DispatcherError::CyclicDependency);
    }
    Ok(())
}

/// For each job, which jobs declare it as a dependency, in insertion order.
fn build_reverse_dependents(jobs: &[Job]) -> HashMap<JobHandle, Vec<JobHandle>> {
    let mut reverse: HashMap<JobHandle, Vec<JobHandle>> = HashMap::new();
    for job in jobs {
        for dep in job.depends_on_handles() {
            reverse.entry(*dep).or_default().push(job.handle());
        }
    }
    reverse
}

fn seed_roots(jobs: &[Job]) -> Forest {
    jobs.iter()
        .filter(|j| j.depends_on_handles().is_empty())
        .map(|j| vec![j.handle()])
        .collect()
}

/// Walk every tree outward from its root, forking a new tree whenever a
/// trunk job has more than one trunk reverse-dependent (spec §4.2 step 4).
///
/// Both the outer list of trees and each individual tree can grow mid-walk
/// (a fork appends a new tree that must itself be walked, and ordinary
/// reverse-dependents append onto the current tree) — mirroring the
/// original's list-mutation-during-iteration behavior with explicit index
/// loops.
fn walk_trees(
    trees: &mut Forest,
    by_handle: &HashMap<JobHandle, &Job>,
    reverse_dependents: &HashMap<JobHandle, Vec<JobHandle>>,
) {
    let mut tree_idx = 0;
    while tree_idx < trees.len() {
        let mut job_idx = 0;
        while job_idx < trees[tree_idx].len() {
            let handle = trees[tree_idx][job_idx];
            let job = by_handle[&handle];

            if job.is_trunk() {
                if let Some(dependents) = reverse_dependents.get(&handle) {
                    let dependents = dependents.clone();
                    let mut trunks_found = 0u32;

                    for dependent in dependents {
                        let dependent_is_trunk = by_handle[&dependent].is_trunk();
                        if dependent_is_trunk {
                            trunks_found += 1;
                            if trunks_found > 1 {
                                trees.push(vec![dependent]);
                                continue;
                            }
                        }
                        trees[tree_idx].push(dependent);
                    }
                }
            }

            job_idx += 1;
        }
        tree_idx += 1;
    }
}

fn check_orphans(jobs: &[Job], trees: &Forest) -> Result<()> {
    let placed: HashSet<JobHandle> = trees.iter().flatten().copied().collect();
    for job in jobs {
        if !placed.contains(&job.handle()) {
            return Err(DispatcherError::OrphanJob(job.handle()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::JobKind;

    fn leaf() -> Job {
        Job::new(JobKind::Respawn)
    }

    #[test]
    fn singleton_tree_for_isolated_job() {
        let job = leaf();
        let forest = build_forest(&[job.clone()]).unwrap();
        assert_eq!(forest.len(), 1);
        assert_eq!(forest[0], vec![job.handle()]);
    }

    #[test]
    fn linear_stream_is_one_tree() {
        let a = leaf().trunk(true);
        let b = leaf().trunk(true).depends_on([a.handle()]);
        let c = leaf().trunk(true).depends_on([b.handle()]);

        let forest = build_forest(&[a.clone(), b.clone(), c.clone()]).unwrap();
        assert_eq!(forest.len(), 1);
        assert_eq!(forest[0], vec![a.handle(), b.handle(), c.handle()]);
    }

    #[test]
    fn fork_splits_second_trunk_child_into_new_tree() {
        let a = leaf().trunk(true);
        let b = leaf().trunk(true).depends_on([a.handle()]);
        let c = leaf().trunk(true).depends_on([a.handle()]);

        let forest = build_forest(&[a.clone(), b.clone(), c.clone()]).unwrap();
        assert_eq!(forest.len(), 2);
        assert_eq!(forest[0], vec![a.handle(), b.handle()]);
        assert_eq!(forest[1], vec![c.handle()]);
    }

    #[test]
    fn non_trunk_dependents_never_fork() {
        let a = leaf().trunk(true);
        let b = leaf().depends_on([a.handle()]);
        let c = leaf().depends_on([a.handle()]);

        let forest = build_forest(&[a.clone(), b.clone(), c.clone()]).unwrap();
        assert_eq!(forest.len(), 1);
        assert_eq!(forest[0].len(), 3);
    }

    #[test]
    fn dangling_dependency_is_rejected() {
        let ghost = JobHandle::new_for_test();
        let job = leaf().depends_on([ghost]);
        let err = build_forest(&[job]).unwrap_err();
        assert!(matches!(err, DispatcherError::DanglingDependency(_, _)));
    }

    #[test]
    fn cycle_is_rejected() {
        let a = leaf();
        let a_handle = a.handle();
        // Build b depending on a, then retroactively make a depend on b to
        // form a 2-cycle; since handles are fixed at construction we instead
        // construct the cycle directly via two passes.
        let b = leaf().depends_on([a_handle]);
        let b_handle = b.handle();
        let a_cyclic = a.depends_on([b_handle]);

        let err = build_forest(&[a_cyclic, b]).unwrap_err();
        assert!(matches!(err, DispatcherError::CyclicDependency));
    }
}
