//! Phase dependency graph: construction, validation, and frontier tracking.
//!
//! The graph is an arena of [`DagNode`]s indexed by `u32` id. Building happens
//! in three steps driven by [`Dag::init`]:
//!
//! 1. `adjust`: synthesize the unique `StartPhase`/`EndPhase` endpoints around
//!    the declared sources and sinks,
//! 2. `check_validity`: resolve every node's full name through the alias map
//!    and a caller-supplied validity predicate,
//! 3. `traverse`: depth-first walk that rejects cycles and disconnected
//!    components while collecting every node's parent set.
//!
//! After a successful `init` the graph is a reusable template: each session
//! takes a value copy via [`Dag::copy_from`] so the atomic indegrees consumed
//! by [`Dag::pop`] stay private to that run.

use miette::Diagnostic;
use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicI32, Ordering};
use thiserror::Error;

/// Name of the synthetic entry node. Reserved; user nodes may not use it.
pub const START_NODE_NAME: &str = "StartPhase";
/// Name of the synthetic exit node. Reserved; user nodes may not use it.
pub const END_NODE_NAME: &str = "EndPhase";
/// Supported maximum node count per graph, synthetic endpoints included.
pub const MAX_DAG_NODES: usize = 1024;

/// Graph construction and traversal failures.
///
/// The numeric codes are part of the public contract.
#[derive(Debug, Error, Diagnostic, Clone, Copy, PartialEq, Eq)]
pub enum DagError {
    #[error("both edge and standalone node lists are empty")]
    #[diagnostic(code(phaseflow::dag::empty_links))]
    EmptyLinks,

    #[error("invalid or reserved node name")]
    #[diagnostic(
        code(phaseflow::dag::invalid_name),
        help(
            "Node names must be registered phase classes, must have an alias entry \
             when aliasing is in use, and may not be StartPhase/EndPhase."
        )
    )]
    InvalidName,

    #[error("graph has no source or no sink node")]
    #[diagnostic(code(phaseflow::dag::no_start_end_node))]
    NoStartEndNode,

    #[error("graph contains a cycle")]
    #[diagnostic(code(phaseflow::dag::has_circle))]
    HasCircle,

    #[error("graph is not fully reachable from the start node")]
    #[diagnostic(code(phaseflow::dag::not_connected))]
    NotConnected,

    #[error("graph has no nodes")]
    #[diagnostic(code(phaseflow::dag::empty_nodes))]
    EmptyNodes,

    #[error("no child became ready")]
    #[diagnostic(code(phaseflow::dag::no_ready_nodes))]
    NoReadyNodes,

    #[error("source graph is not traversed; cannot copy")]
    #[diagnostic(code(phaseflow::dag::invalid_copy))]
    InvalidCopy,
}

impl DagError {
    /// The numeric code logged and exposed to callers.
    pub const fn code(self) -> u32 {
        match self {
            Self::EmptyLinks => 80000,
            Self::InvalidName => 80001,
            Self::NoStartEndNode => 80002,
            Self::HasCircle => 80003,
            Self::NotConnected => 80004,
            Self::EmptyNodes => 80005,
            Self::NoReadyNodes => 80006,
            Self::InvalidCopy => 80007,
        }
    }
}

/// One node of the dependency graph.
#[derive(Debug)]
pub struct DagNode {
    id: u32,
    name: String,
    full_name: String,
    indegree: AtomicI32,
    indegree_dup: AtomicI32,
    links: Vec<u32>,
}

impl DagNode {
    fn new(name: String, id: u32) -> Self {
        Self {
            id,
            name,
            full_name: String::new(),
            indegree: AtomicI32::new(0),
            indegree_dup: AtomicI32::new(0),
            links: Vec::new(),
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    /// The short (possibly aliased) name the node was declared with.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The alias-resolved full name; empty until validation ran.
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    pub fn indegree(&self) -> i32 {
        self.indegree.load(Ordering::Relaxed)
    }

    pub fn outdegree(&self) -> usize {
        self.links.len()
    }

    /// Outbound edges as node ids.
    pub fn links(&self) -> &[u32] {
        &self.links
    }
}

impl Clone for DagNode {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            name: self.name.clone(),
            full_name: self.full_name.clone(),
            indegree: AtomicI32::new(self.indegree.load(Ordering::Relaxed)),
            indegree_dup: AtomicI32::new(self.indegree_dup.load(Ordering::Relaxed)),
            links: self.links.clone(),
        }
    }
}

/// The dependency graph and its builder state.
#[derive(Debug, Default)]
pub struct Dag {
    nodes: Vec<DagNode>,
    name_index: FxHashMap<String, u32>,
    alias_map: FxHashMap<String, String>,
    edge_set: FxHashSet<String>,
    parents: Arc<Vec<Vec<u32>>>,
    start_id: u32,
    end_id: u32,
    traversed: bool,
}

impl Dag {
    pub fn new() -> Self {
        Self::default()
    }

    fn is_reserved_name(name: &str) -> bool {
        name == START_NODE_NAME || name == END_NODE_NAME
    }

    /// Records the declared edges and standalone nodes.
    ///
    /// Edges are deduplicated by their `"u->v"` rendering; standalone
    /// duplicates are ignored. Reserved endpoint names are rejected.
    pub fn add_node_links(
        &mut self,
        links: &[(String, String)],
        single_nodes: &[String],
        alias_map: &FxHashMap<String, String>,
    ) -> Result<(), DagError> {
        if links.is_empty() && single_nodes.is_empty() {
            tracing::error!("both edge and standalone node lists are empty");
            return Err(DagError::EmptyLinks);
        }
        self.nodes.reserve(links.len() + single_nodes.len() + 2);
        self.alias_map
            .extend(alias_map.iter().map(|(k, v)| (k.clone(), v.clone())));
        for (from, to) in links {
            if Self::is_reserved_name(from) || Self::is_reserved_name(to) {
                tracing::error!(from = %from, to = %to, "reserved name used as edge endpoint");
                return Err(DagError::InvalidName);
            }
            self.add_link(from, to)?;
        }
        for name in single_nodes {
            if Self::is_reserved_name(name) {
                tracing::error!(node = %name, "reserved name used as standalone node");
                return Err(DagError::InvalidName);
            }
            if self.name_index.contains_key(name) {
                tracing::debug!(node = %name, "standalone node already declared, ignoring");
                continue;
            }
            self.alloc_node(name)?;
        }
        Ok(())
    }

    fn alloc_node(&mut self, name: &str) -> Result<u32, DagError> {
        if self.nodes.len() >= MAX_DAG_NODES {
            tracing::error!(capacity = MAX_DAG_NODES, "node pool capacity exceeded");
            return Err(DagError::InvalidName);
        }
        let id = self.nodes.len() as u32;
        self.nodes.push(DagNode::new(name.to_string(), id));
        self.name_index.insert(name.to_string(), id);
        Ok(id)
    }

    fn add_link(&mut self, from: &str, to: &str) -> Result<(), DagError> {
        let bundle = format!("{from}->{to}");
        if !self.edge_set.insert(bundle) {
            return Ok(());
        }
        let from_id = match self.name_index.get(from) {
            Some(&id) => id,
            None => self.alloc_node(from)?,
        };
        let to_id = match self.name_index.get(to) {
            Some(&id) => id,
            None => self.alloc_node(to)?,
        };
        self.nodes[from_id as usize].links.push(to_id);
        self.nodes[to_id as usize]
            .indegree
            .fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Validates the declared graph and prepares it for scheduling.
    ///
    /// `validity` is asked once per node with the resolved full name; it is
    /// the phase factory's "is this registered?" predicate.
    pub fn init(&mut self, validity: impl Fn(&str) -> bool) -> Result<(), DagError> {
        self.adjust()?;
        self.check_validity(validity)?;
        self.traverse()
    }

    /// Synthesizes the `StartPhase`/`EndPhase` endpoints around the declared
    /// sources and sinks.
    fn adjust(&mut self) -> Result<(), DagError> {
        if self.nodes.is_empty() {
            tracing::error!("graph has no nodes");
            return Err(DagError::EmptyNodes);
        }
        let mut sources = Vec::new();
        let mut sinks = Vec::new();
        for node in &self.nodes {
            if node.indegree() == 0 {
                sources.push(node.name.clone());
            }
            if node.links.is_empty() {
                sinks.push(node.name.clone());
            }
        }
        if sources.is_empty() || sinks.is_empty() {
            tracing::error!(
                sources = sources.len(),
                sinks = sinks.len(),
                "graph is missing a source or a sink"
            );
            return Err(DagError::NoStartEndNode);
        }
        for name in sources {
            self.add_link(START_NODE_NAME, &name)?;
        }
        for name in sinks {
            self.add_link(&name, END_NODE_NAME)?;
        }
        self.start_id = self.name_index[START_NODE_NAME];
        self.end_id = self.name_index[END_NODE_NAME];
        self.nodes[self.start_id as usize].full_name = START_NODE_NAME.to_string();
        self.nodes[self.end_id as usize].full_name = END_NODE_NAME.to_string();
        // The synthetic endpoints resolve to themselves when aliasing is in use.
        if !self.alias_map.is_empty() {
            self.alias_map
                .entry(START_NODE_NAME.to_string())
                .or_insert_with(|| START_NODE_NAME.to_string());
            self.alias_map
                .entry(END_NODE_NAME.to_string())
                .or_insert_with(|| END_NODE_NAME.to_string());
        }
        Ok(())
    }

    fn check_validity(&mut self, validity: impl Fn(&str) -> bool) -> Result<(), DagError> {
        let has_alias = !self.alias_map.is_empty();
        for node in &mut self.nodes {
            if has_alias {
                let Some(full_name) = self.alias_map.get(&node.name) else {
                    tracing::error!(alias = %node.name, "no full name for alias");
                    return Err(DagError::InvalidName);
                };
                node.full_name = full_name.clone();
            } else {
                node.full_name = node.name.clone();
            }
            if !validity(&node.full_name) {
                tracing::error!(
                    alias = %node.name,
                    full_name = %node.full_name,
                    "phase class not registered"
                );
                return Err(DagError::InvalidName);
            }
        }
        Ok(())
    }

    /// DFS cycle/connectivity check; collects parent sets as a side effect.
    fn traverse(&mut self) -> Result<(), DagError> {
        if self.traversed {
            return Ok(());
        }
        let n = self.nodes.len();
        let mut visited = vec![false; n];
        let mut on_stack = vec![false; n];
        let mut parents = vec![Vec::new(); n];
        self.dfs(self.start_id, &mut visited, &mut on_stack, &mut parents)?;
        let visited_count = visited.iter().filter(|v| **v).count();
        if visited_count != self.name_index.len() {
            tracing::error!(
                visited = visited_count,
                total = self.name_index.len(),
                "graph has unreachable nodes"
            );
            return Err(DagError::NotConnected);
        }
        self.parents = Arc::new(parents);
        self.traversed = true;
        Ok(())
    }

    fn dfs(
        &self,
        id: u32,
        visited: &mut [bool],
        on_stack: &mut [bool],
        parents: &mut [Vec<u32>],
    ) -> Result<(), DagError> {
        visited[id as usize] = true;
        on_stack[id as usize] = true;
        for &link in &self.nodes[id as usize].links {
            if visited[link as usize] {
                if on_stack[link as usize] {
                    tracing::error!(
                        from = %self.nodes[id as usize].name,
                        to = %self.nodes[link as usize].name,
                        "cycle detected"
                    );
                    return Err(DagError::HasCircle);
                }
                parents[link as usize].push(id);
                continue;
            }
            parents[link as usize].push(id);
            self.dfs(link, visited, on_stack, parents)?;
        }
        on_stack[id as usize] = false;
        Ok(())
    }

    /// Pops `parent`'s children whose last outstanding dependency was
    /// `parent` itself.
    ///
    /// This is the authoritative "which nodes are ready now" operation: the
    /// indegree fetch-sub is performed exactly once per edge, so exactly one
    /// caller observes the decrement to zero and owns the child.
    pub fn pop(&self, parent: u32, ready: &mut Vec<u32>) -> Result<(), DagError> {
        for &child in &self.nodes[parent as usize].links {
            if self.nodes[child as usize]
                .indegree
                .fetch_sub(1, Ordering::Relaxed)
                == 1
            {
                ready.push(child);
            }
        }
        if ready.is_empty() {
            return Err(DagError::NoReadyNodes);
        }
        Ok(())
    }

    /// Breadth-first levels of the graph, for logging and inspection.
    ///
    /// Replays the frontier walk on the duplicated indegrees so the real
    /// counters stay untouched.
    pub fn topology_levels(&self) -> Vec<Vec<u32>> {
        for node in &self.nodes {
            node.indegree_dup
                .store(node.indegree.load(Ordering::Relaxed), Ordering::Relaxed);
        }
        let mut levels = Vec::new();
        let mut frontier = vec![self.start_id];
        while !frontier.is_empty() {
            let mut next = Vec::new();
            for &id in &frontier {
                for &child in &self.nodes[id as usize].links {
                    if self.nodes[child as usize]
                        .indegree_dup
                        .fetch_sub(1, Ordering::Relaxed)
                        == 1
                    {
                        next.push(child);
                    }
                }
            }
            levels.push(frontier);
            frontier = next;
        }
        levels
    }

    /// The ids of every node that precedes `id`, in traversal order.
    pub fn dep_nodes(&self, id: u32) -> &[u32] {
        self.parents
            .get(id as usize)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn node(&self, id: u32) -> &DagNode {
        &self.nodes[id as usize]
    }

    pub fn nodes(&self) -> impl Iterator<Item = &DagNode> {
        self.nodes.iter()
    }

    pub fn start_id(&self) -> u32 {
        self.start_id
    }

    pub fn end_id(&self) -> u32 {
        self.end_id
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn is_traversed(&self) -> bool {
        self.traversed
    }

    /// Value copy for a new session.
    ///
    /// Nodes are cloned so the indegree atomics are private to the copy; the
    /// parent lists are read-only after build and stay shared.
    pub fn copy_from(source: &Dag) -> Result<Dag, DagError> {
        if !source.traversed {
            tracing::error!("source graph not traversed, cannot copy");
            return Err(DagError::InvalidCopy);
        }
        Ok(Dag {
            nodes: source.nodes.clone(),
            name_index: source.name_index.clone(),
            alias_map: source.alias_map.clone(),
            edge_set: FxHashSet::default(),
            parents: source.parents.clone(),
            start_id: source.start_id,
            end_id: source.end_id,
            traversed: true,
        })
    }

    /// Resets the graph to its freshly constructed state.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.name_index.clear();
        self.alias_map.clear();
        self.edge_set.clear();
        self.parents = Arc::new(Vec::new());
        self.start_id = 0;
        self.end_id = 0;
        self.traversed = false;
    }
}
