//! Job graph: declaration-ordered jobs plus a lazily derived adjacency.
//!
//! - `builder` -- `GraphBuilder`, `JobSpec`, `JobHandle`, `AutomationBuilder`
//! - `matrix` -- cartesian expansion, instance naming, `${{ matrix.* }}` substitution
//!
//! Declaration order is a valid topological order by construction: a job can
//! only name producers that were declared before it. The adjacency
//! (`needs` plus every producer referenced by an input) is computed once, on
//! first use, and cached.

pub mod builder;
pub mod matrix;

pub use builder::{Automation, AutomationBuilder, BuildMode, GraphBuilder, JobHandle, JobSpec};

use std::collections::{BTreeSet, HashMap};
use std::sync::OnceLock;

use jobflow_types::job::{Job, JobId};
use petgraph::graph::{DiGraph, NodeIndex};

/// An immutable job graph.
#[derive(Debug, Clone)]
pub struct Graph {
    mode: BuildMode,
    jobs: Vec<Job>,
    index: HashMap<JobId, usize>,
    /// Local-mode matrix groups: unexpanded name -> instance ids in order.
    groups: HashMap<JobId, Vec<JobId>>,
    adjacency: OnceLock<Vec<Vec<JobId>>>,
}

impl Graph {
    pub(crate) fn new(
        mode: BuildMode,
        jobs: Vec<Job>,
        index: HashMap<JobId, usize>,
        groups: HashMap<JobId, Vec<JobId>>,
    ) -> Self {
        Self {
            mode,
            jobs,
            index,
            groups,
            adjacency: OnceLock::new(),
        }
    }

    pub fn mode(&self) -> BuildMode {
        self.mode
    }

    /// Jobs in declaration order.
    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn job(&self, id: &JobId) -> Option<&Job> {
        self.index.get(id).map(|&i| &self.jobs[i])
    }

    /// Declaration index of a job. Matrix group names have no position.
    pub fn position(&self, id: &JobId) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// Instances a local-mode matrix group expanded into. Empty for any
    /// name that is not a group.
    pub fn instances(&self, group: &JobId) -> &[JobId] {
        self.groups.get(group).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Dependencies of a job: explicit `needs` plus inferred producers,
    /// deduplicated by producer identity and listed in declaration order.
    pub fn dependencies(&self, id: &JobId) -> &[JobId] {
        match self.position(id) {
            Some(pos) => &self.adjacency()[pos],
            None => &[],
        }
    }

    /// Every `(producer, consumer)` edge, consumers in declaration order.
    pub fn edges(&self) -> Vec<(JobId, JobId)> {
        self.jobs
            .iter()
            .zip(self.adjacency())
            .flat_map(|(job, deps)| deps.iter().map(|dep| (dep.clone(), job.id.clone())))
            .collect()
    }

    /// A `petgraph` view with one node per job and an edge per dependency.
    pub fn to_digraph(&self) -> DiGraph<JobId, ()> {
        let mut graph = DiGraph::with_capacity(self.jobs.len(), 0);
        let nodes: Vec<NodeIndex> = self
            .jobs
            .iter()
            .map(|job| graph.add_node(job.id.clone()))
            .collect();
        for (pos, deps) in self.adjacency().iter().enumerate() {
            for dep in deps {
                if let Some(from) = self.position(dep) {
                    graph.add_edge(nodes[from], nodes[pos], ());
                }
            }
        }
        graph
    }

    /// Whether the dependency relation is acyclic. Always true for graphs
    /// produced by the builder.
    pub fn is_acyclic(&self) -> bool {
        !petgraph::algo::is_cyclic_directed(&self.to_digraph())
    }

    fn adjacency(&self) -> &[Vec<JobId>] {
        self.adjacency.get_or_init(|| {
            self.jobs
                .iter()
                .map(|job| self.resolve_dependencies(job))
                .collect()
        })
    }

    fn resolve_dependencies(&self, job: &Job) -> Vec<JobId> {
        let mut positions = BTreeSet::new();
        for target in job.needs.iter().chain(job.referenced_producers()) {
            match self.groups.get(target) {
                Some(instances) => {
                    positions.extend(instances.iter().filter_map(|i| self.position(i)));
                }
                None => positions.extend(self.position(target)),
            }
        }
        positions
            .into_iter()
            .map(|pos| self.jobs[pos].id.clone())
            .collect()
    }
}
