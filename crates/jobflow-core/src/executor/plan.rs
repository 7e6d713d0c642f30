//! Wave computation.
//!
//! Declaration order is already a valid linearization, so no general sort is
//! needed: a wave is every pending job whose dependencies are all terminal.

use jobflow_types::job::JobId;
use jobflow_types::run::JobState;

use crate::graph::Graph;

// ---------------------------------------------------------------------------
// Dynamic waves
// ---------------------------------------------------------------------------

/// Indices of `Pending` jobs whose dependencies are all in a terminal state.
///
/// `states` is indexed by declaration position. The result is in
/// declaration order.
pub fn ready_jobs(graph: &Graph, states: &[JobState]) -> Vec<usize> {
    graph
        .jobs()
        .iter()
        .enumerate()
        .filter(|(pos, _)| states[*pos] == JobState::Pending)
        .filter(|(_, job)| {
            graph.dependencies(&job.id).iter().all(|dep| {
                graph
                    .position(dep)
                    .is_some_and(|p| states[p].is_terminal())
            })
        })
        .map(|(pos, _)| pos)
        .collect()
}

// ---------------------------------------------------------------------------
// Static plan
// ---------------------------------------------------------------------------

/// The waves a run would go through if every job succeeded.
///
/// Each job's depth is one more than its deepest dependency; jobs sharing a
/// depth share a wave.
pub fn plan_waves(graph: &Graph) -> Vec<Vec<JobId>> {
    let mut depths: Vec<usize> = Vec::with_capacity(graph.len());
    for job in graph.jobs() {
        let depth = graph
            .dependencies(&job.id)
            .iter()
            .filter_map(|dep| graph.position(dep))
            .map(|pos| depths[pos] + 1)
            .max()
            .unwrap_or(0);
        depths.push(depth);
    }

    let Some(&max_depth) = depths.iter().max() else {
        return Vec::new();
    };
    let mut waves: Vec<Vec<JobId>> = vec![Vec::new(); max_depth + 1];
    for (job, depth) in graph.jobs().iter().zip(&depths) {
        waves[*depth].push(job.id.clone());
    }
    waves
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
