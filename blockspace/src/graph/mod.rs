//! The graph model: a spanning tree of vertices joined port-to-port, plus ring chords, symmetric
//! vertex sets and candidate closable chains.

use crate::ids::{GraphId, IdGenerator, VertexId};
use crate::registry::BondOrder;
use crate::rings::ClosableChain;
use crate::vertex::{ApRef, AttachmentPoint, MutationKind, Vertex};
use petgraph::Direction;
use petgraph::graphmap::{DiGraphMap, GraphMap};
use petgraph::visit::Dfs;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::hash::RandomState;
use thiserror::Error;

pub mod dot;
pub mod query;
#[cfg(feature = "serde")]
mod repr;
pub mod subgraph;

pub use dot::DotCollector;
pub use query::{EdgeQuery, VertexQuery};

/// A spanning-tree edge. Points from the parent's port to the child's port.
#[derive(Clone, Copy, PartialEq, Eq, Hash, derive_more::Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[debug("{source:?}->{target:?}:{bond_order:?}")]
pub struct Edge {
    source: ApRef,
    target: ApRef,
    bond_order: BondOrder,
}

impl Edge {
    pub fn new(source: ApRef, target: ApRef, bond_order: BondOrder) -> Self {
        Edge {
            source,
            target,
            bond_order,
        }
    }

    pub fn source(&self) -> ApRef {
        self.source
    }

    pub fn target(&self) -> ApRef {
        self.target
    }

    pub fn bond_order(&self) -> BondOrder {
        self.bond_order
    }

    pub(crate) fn remapped(&self, map: &HashMap<VertexId, VertexId>) -> Option<Edge> {
        Some(Edge {
            source: ApRef::new(*map.get(&self.source.vertex)?, self.source.index),
            target: ApRef::new(*map.get(&self.target.vertex)?, self.target.index),
            bond_order: self.bond_order,
        })
    }
}

/// A cycle recorded as a chord between the first and last vertex of a tree path.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Ring {
    vertices: Vec<VertexId>,
    bond_order: BondOrder,
}

impl Ring {
    pub fn new(vertices: Vec<VertexId>, bond_order: BondOrder) -> Self {
        Ring {
            vertices,
            bond_order,
        }
    }

    pub fn vertices(&self) -> &[VertexId] {
        &self.vertices
    }

    pub fn head(&self) -> Option<VertexId> {
        self.vertices.first().copied()
    }

    pub fn tail(&self) -> Option<VertexId> {
        self.vertices.last().copied()
    }

    pub fn bond_order(&self) -> BondOrder {
        self.bond_order
    }

    pub fn contains(&self, vertex: VertexId) -> bool {
        self.vertices.contains(&vertex)
    }
}

/// Vertices of one graph that must be treated identically by the operators.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SymmetricVertices(BTreeSet<VertexId>);

impl SymmetricVertices {
    pub fn new(members: impl IntoIterator<Item = VertexId>) -> Self {
        SymmetricVertices(members.into_iter().collect())
    }

    pub fn contains(&self, vertex: VertexId) -> bool {
        self.0.contains(&vertex)
    }

    pub fn iter(&self) -> impl Iterator<Item = VertexId> + '_ {
        self.0.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub(crate) fn insert(&mut self, vertex: VertexId) {
        self.0.insert(vertex);
    }

    fn retain(&mut self, keep: impl Fn(&VertexId) -> bool) {
        self.0.retain(|v| keep(v));
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("vertex {0:?} is not in the graph")]
    VertexNotFound(VertexId),
    #[error("vertex {0:?} is already in the graph")]
    DuplicateVertex(VertexId),
    #[error("{ap:?} does not exist, the vertex has {len} ports")]
    ApOutOfRange { ap: ApRef, len: usize },
    #[error("{0:?} is already in use")]
    ApInUse(ApRef),
    #[error("{0:?} is free although an edge uses it, or used without an edge")]
    AvailabilityMismatch(ApRef),
    #[error("cannot connect vertex {0:?} to itself")]
    SelfLoop(VertexId),
    #[error("vertex {0:?} already has a parent")]
    AlreadyHasParent(VertexId),
    #[error("vertex {0:?} has no edge to a parent")]
    NoParent(VertexId),
    #[error("the graph has no vertices")]
    Empty,
    #[error("the edges do not form a spanning tree: {0}")]
    NotATree(String),
    #[error("vertex {vertex:?} is at level {found}, expected {expected}")]
    LevelMismatch {
        vertex: VertexId,
        found: i32,
        expected: i32,
    },
    #[error("vertex {0:?} already belongs to a symmetric set")]
    SymmetricOverlap(VertexId),
    #[error("a symmetric set needs at least two vertices")]
    SymmetricSetTooSmall,
    #[error("a ring needs at least two vertices")]
    RingTooShort,
}

impl GraphError {
    /// Whether the error comes from addressing something that does not exist, as opposed to a
    /// request that would break the graph's structure.
    pub fn is_index_error(&self) -> bool {
        matches!(
            self,
            GraphError::VertexNotFound(_) | GraphError::ApOutOfRange { .. } | GraphError::Empty
        )
    }
}

pub type GraphResult<T> = Result<T, GraphError>;

#[derive(Clone, Debug)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(into = "repr::GraphRepr", try_from = "repr::GraphRepr")
)]
pub struct Graph {
    id: GraphId,
    tree: DiGraphMap<VertexId, Edge, RandomState>,
    vertices: HashMap<VertexId, Vertex>,
    order: Vec<VertexId>,
    rings: Vec<Ring>,
    symmetric_sets: Vec<SymmetricVertices>,
    closable_chains: Vec<ClosableChain>,
}

impl Graph {
    pub fn new(ids: &IdGenerator) -> Self {
        Self::with_id(ids.next_graph_id())
    }

    pub fn with_id(id: GraphId) -> Self {
        Graph {
            id,
            tree: GraphMap::new(),
            vertices: HashMap::new(),
            order: Vec::new(),
            rings: Vec::new(),
            symmetric_sets: Vec::new(),
            closable_chains: Vec::new(),
        }
    }

    pub fn id(&self) -> GraphId {
        self.id
    }

    pub fn vertex_count(&self) -> usize {
        self.order.len()
    }

    pub fn edge_count(&self) -> usize {
        self.tree.edge_count()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Vertex ids in insertion order.
    pub fn vertex_ids(&self) -> &[VertexId] {
        &self.order
    }

    pub fn vertices(&self) -> impl Iterator<Item = &Vertex> {
        self.order.iter().filter_map(|id| self.vertices.get(id))
    }

    pub fn vertex(&self, id: VertexId) -> Option<&Vertex> {
        self.vertices.get(&id)
    }

    pub(crate) fn vertex_mut(&mut self, id: VertexId) -> Option<&mut Vertex> {
        self.vertices.get_mut(&id)
    }

    pub fn contains_vertex(&self, id: VertexId) -> bool {
        self.vertices.contains_key(&id)
    }

    pub fn try_vertex(&self, id: VertexId) -> GraphResult<&Vertex> {
        self.vertex(id).ok_or(GraphError::VertexNotFound(id))
    }

    pub fn ap(&self, ap: ApRef) -> GraphResult<&AttachmentPoint> {
        let vertex = self.try_vertex(ap.vertex)?;
        vertex.ap(ap.index).ok_or(GraphError::ApOutOfRange {
            ap,
            len: vertex.aps().len(),
        })
    }

    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.tree.all_edges().map(|(_, _, e)| e)
    }

    pub fn max_vertex_id(&self) -> Option<VertexId> {
        self.order.iter().copied().max()
    }

    /// Adds an unconnected vertex. The first vertex of a graph becomes its root at level -1.
    pub fn add_vertex(&mut self, mut vertex: Vertex) -> GraphResult<VertexId> {
        let id = vertex.id();
        if self.vertices.contains_key(&id) {
            return Err(GraphError::DuplicateVertex(id));
        }
        if self.order.is_empty() {
            vertex.set_level(-1);
        }
        self.tree.add_node(id);
        self.vertices.insert(id, vertex);
        self.order.push(id);
        Ok(id)
    }

    fn check_free(&self, ap: ApRef) -> GraphResult<()> {
        if self.ap(ap)?.is_available() {
            Ok(())
        } else {
            Err(GraphError::ApInUse(ap))
        }
    }

    /// Connects two free ports of two distinct vertices; the target becomes the source's child.
    pub fn add_edge(&mut self, edge: Edge) -> GraphResult<()> {
        let (source, target) = (edge.source, edge.target);
        if source.vertex == target.vertex {
            return Err(GraphError::SelfLoop(source.vertex));
        }
        self.check_free(source)?;
        self.check_free(target)?;
        if self.parent(target.vertex).is_some() {
            return Err(GraphError::AlreadyHasParent(target.vertex));
        }
        if self.ancestors(source.vertex).any(|v| v == target.vertex) {
            return Err(GraphError::NotATree(format!(
                "{:?} is an ancestor of {:?}",
                target.vertex, source.vertex
            )));
        }
        for end in [source, target] {
            if let Some(ap) = self
                .vertex_mut(end.vertex)
                .and_then(|v| v.ap_mut(end.index))
            {
                ap.set_available(false);
            }
        }
        self.tree.add_edge(source.vertex, target.vertex, edge);
        Ok(())
    }

    /// Adds `vertex` as a child hanging from `parent_ap` through its port `child_ap`.
    pub fn append_vertex_on_ap(
        &mut self,
        parent_ap: ApRef,
        mut vertex: Vertex,
        child_ap: usize,
        bond_order: BondOrder,
    ) -> GraphResult<VertexId> {
        self.check_free(parent_ap)?;
        let child_ref = ApRef::new(vertex.id(), child_ap);
        match vertex.ap(child_ap) {
            Some(ap) if ap.is_available() => {}
            Some(_) => return Err(GraphError::ApInUse(child_ref)),
            None => {
                return Err(GraphError::ApOutOfRange {
                    ap: child_ref,
                    len: vertex.aps().len(),
                });
            }
        }
        let level = self.try_vertex(parent_ap.vertex)?.level() + 1;
        vertex.set_level(level);
        let id = self.add_vertex(vertex)?;
        self.add_edge(Edge::new(parent_ap, child_ref, bond_order))?;
        Ok(id)
    }

    pub fn parent(&self, id: VertexId) -> Option<VertexId> {
        if !self.tree.contains_node(id) {
            return None;
        }
        self.tree.neighbors_directed(id, Direction::Incoming).next()
    }

    /// Walks from the parent of `id` up to the root. Stops early on a cycle.
    pub fn ancestors(&self, id: VertexId) -> impl Iterator<Item = VertexId> + '_ {
        let mut seen = HashSet::from([id]);
        std::iter::successors(self.parent(id), move |v| self.parent(*v))
            .take_while(move |v| seen.insert(*v))
    }

    pub fn edge_to_parent(&self, id: VertexId) -> Option<&Edge> {
        let parent = self.parent(id)?;
        self.tree.edge_weight(parent, id)
    }

    /// Children ordered by the parent port they hang from.
    pub fn children(&self, id: VertexId) -> Vec<VertexId> {
        if !self.tree.contains_node(id) {
            return Vec::new();
        }
        let mut children: Vec<(usize, VertexId)> = self
            .tree
            .neighbors_directed(id, Direction::Outgoing)
            .filter_map(|c| self.tree.edge_weight(id, c).map(|e| (e.source.index, c)))
            .collect();
        children.sort();
        children.into_iter().map(|(_, c)| c).collect()
    }

    /// The child attached on `ap`, if the port is in use towards a child.
    pub fn child_on_ap(&self, ap: ApRef) -> Option<VertexId> {
        self.children(ap.vertex)
            .into_iter()
            .find(|c| self.edge_to_parent(*c).is_some_and(|e| e.source == ap))
    }

    /// `id` followed by all its descendants in depth-first pre-order.
    pub fn branch(&self, id: VertexId) -> Vec<VertexId> {
        if !self.tree.contains_node(id) {
            return Vec::new();
        }
        let mut dfs = Dfs::new(&self.tree, id);
        let mut out = Vec::new();
        while let Some(v) = dfs.next(&self.tree) {
            out.push(v);
        }
        out
    }

    pub fn descendants(&self, id: VertexId) -> Vec<VertexId> {
        self.branch(id).into_iter().skip(1).collect()
    }

    /// The vertex every other vertex descends from.
    pub fn root(&self) -> Option<VertexId> {
        self.order
            .iter()
            .copied()
            .find(|v| self.parent(*v).is_none())
    }

    pub fn free_aps(&self) -> Vec<ApRef> {
        self.vertices()
            .flat_map(|v| v.free_aps().map(|ap| ApRef::new(v.id(), ap.index())))
            .collect()
    }

    /// Removes `id` and all its descendants, freeing the parent's port.
    ///
    /// Rings through a removed vertex disappear; symmetric sets lose the removed members and are
    /// dropped once fewer than two remain. Returns the removed vertices.
    pub fn remove_branch(&mut self, id: VertexId) -> GraphResult<Vec<Vertex>> {
        self.try_vertex(id)?;
        if let Some(edge) = self.edge_to_parent(id).copied() {
            if let Some(ap) = self
                .vertex_mut(edge.source.vertex)
                .and_then(|v| v.ap_mut(edge.source.index))
            {
                ap.set_available(true);
            }
        }
        let branch = self.branch(id);
        let removed: HashSet<VertexId> = branch.iter().copied().collect();
        let mut out = Vec::with_capacity(branch.len());
        for v in &branch {
            self.tree.remove_node(*v);
            if let Some(vertex) = self.vertices.remove(v) {
                out.push(vertex);
            }
        }
        self.order.retain(|v| !removed.contains(v));
        self.forget(&removed);
        Ok(out)
    }

    fn forget(&mut self, removed: &HashSet<VertexId>) {
        self.rings
            .retain(|r| !r.vertices.iter().any(|v| removed.contains(v)));
        for set in &mut self.symmetric_sets {
            set.retain(|v| !removed.contains(v));
        }
        self.symmetric_sets.retain(|s| s.len() >= 2);
    }

    pub fn rings(&self) -> &[Ring] {
        &self.rings
    }

    pub fn add_ring(&mut self, ring: Ring) -> GraphResult<()> {
        if ring.vertices.len() < 2 {
            return Err(GraphError::RingTooShort);
        }
        for v in &ring.vertices {
            self.try_vertex(*v)?;
        }
        self.rings.push(ring);
        Ok(())
    }

    pub fn symmetric_sets(&self) -> &[SymmetricVertices] {
        &self.symmetric_sets
    }

    pub fn add_symmetric_set(&mut self, set: SymmetricVertices) -> GraphResult<()> {
        if set.len() < 2 {
            return Err(GraphError::SymmetricSetTooSmall);
        }
        for v in set.iter() {
            self.try_vertex(v)?;
            if self.symmetric_set_of(v).is_some() {
                return Err(GraphError::SymmetricOverlap(v));
            }
        }
        self.symmetric_sets.push(set);
        Ok(())
    }

    pub fn symmetric_set_of(&self, id: VertexId) -> Option<&SymmetricVertices> {
        self.symmetric_sets.iter().find(|s| s.contains(id))
    }

    pub fn has_symmetry_involving(&self, id: VertexId) -> bool {
        self.symmetric_set_of(id).is_some()
    }

    /// The members of `id`'s symmetric set, or just `id`.
    pub fn symmetric_partners(&self, id: VertexId) -> Vec<VertexId> {
        match self.symmetric_set_of(id) {
            Some(set) => set.iter().collect(),
            None => vec![id],
        }
    }

    pub fn closable_chains(&self) -> &[ClosableChain] {
        &self.closable_chains
    }

    pub fn set_closable_chains(&mut self, chains: Vec<ClosableChain>) {
        self.closable_chains = chains;
    }

    /// Drops the chains at the given positions.
    pub fn remove_closable_chains(&mut self, positions: &[usize]) {
        let drop: HashSet<usize> = positions.iter().copied().collect();
        let mut i = 0;
        self.closable_chains.retain(|_| {
            let keep = !drop.contains(&i);
            i += 1;
            keep
        });
    }

    /// Mutation kinds applicable to `id` right now, minus `excluded`.
    pub fn allowed_mutations(&self, id: VertexId, excluded: &[MutationKind]) -> Vec<MutationKind> {
        let Some(vertex) = self.vertex(id) else {
            return Vec::new();
        };
        let has_parent = self.parent(id).is_some();
        let has_caps = self
            .children(id)
            .iter()
            .any(|c| self.vertex(*c).is_some_and(Vertex::is_capping));
        vertex
            .mutation_kinds()
            .iter()
            .copied()
            .filter(|k| !excluded.contains(k))
            .filter(|k| match k {
                MutationKind::ChangeBranch | MutationKind::Delete => has_parent,
                MutationKind::Extend => vertex.has_free_ap() || has_caps,
            })
            .collect()
    }

    /// Vertices offering at least one mutation kind not in `excluded`.
    pub fn mutation_sites(&self, excluded: &[MutationKind]) -> Vec<VertexId> {
        self.order
            .iter()
            .copied()
            .filter(|v| !self.allowed_mutations(*v, excluded).is_empty())
            .collect()
    }

    /// Verifies the structural invariants: unique ids, port usage mirrors edges, the edges form
    /// a spanning tree with consistent levels, symmetric sets are disjoint and rings refer to
    /// vertices of this graph.
    pub fn check_consistency(&self) -> GraphResult<()> {
        if self.order.len() != self.vertices.len() || self.tree.node_count() != self.vertices.len()
        {
            return Err(GraphError::NotATree(format!(
                "{} ordered ids, {} vertices, {} tree nodes",
                self.order.len(),
                self.vertices.len(),
                self.tree.node_count()
            )));
        }
        let mut seen = HashSet::new();
        for id in &self.order {
            if !seen.insert(*id) {
                return Err(GraphError::DuplicateVertex(*id));
            }
            let vertex = self.try_vertex(*id)?;
            if vertex.id() != *id {
                return Err(GraphError::VertexNotFound(*id));
            }
        }

        let mut used = HashSet::new();
        for (s, t, edge) in self.tree.all_edges() {
            if edge.source.vertex != s || edge.target.vertex != t {
                return Err(GraphError::NotATree(format!("edge {edge:?} stored under {s:?}->{t:?}")));
            }
            for end in [edge.source, edge.target] {
                if self.ap(end)?.is_available() || !used.insert(end) {
                    return Err(GraphError::AvailabilityMismatch(end));
                }
            }
        }
        for vertex in self.vertices() {
            for ap in vertex.aps() {
                let r = ApRef::new(vertex.id(), ap.index());
                if !ap.is_available() && !used.contains(&r) {
                    return Err(GraphError::AvailabilityMismatch(r));
                }
            }
        }

        if !self.vertices.is_empty() {
            let root = self
                .root()
                .ok_or_else(|| GraphError::NotATree("every vertex has a parent".to_string()))?;
            if self.tree.edge_count() + 1 != self.vertices.len() {
                return Err(GraphError::NotATree(format!(
                    "{} edges for {} vertices",
                    self.tree.edge_count(),
                    self.vertices.len()
                )));
            }
            let reachable = self.branch(root);
            if reachable.len() != self.vertices.len() {
                return Err(GraphError::NotATree(format!(
                    "only {} of {} vertices reachable from the root",
                    reachable.len(),
                    self.vertices.len()
                )));
            }
            for v in reachable {
                if self
                    .tree
                    .neighbors_directed(v, Direction::Incoming)
                    .count()
                    > 1
                {
                    return Err(GraphError::NotATree(format!("{v:?} has several parents")));
                }
                if let Some(parent) = self.parent(v) {
                    let expected = self.try_vertex(parent)?.level() + 1;
                    let found = self.try_vertex(v)?.level();
                    if found != expected {
                        return Err(GraphError::LevelMismatch {
                            vertex: v,
                            found,
                            expected,
                        });
                    }
                }
            }
        }

        let mut in_set = HashSet::new();
        for set in &self.symmetric_sets {
            if set.len() < 2 {
                return Err(GraphError::SymmetricSetTooSmall);
            }
            for v in set.iter() {
                self.try_vertex(v)?;
                if !in_set.insert(v) {
                    return Err(GraphError::SymmetricOverlap(v));
                }
            }
        }
        for ring in &self.rings {
            for v in ring.vertices() {
                self.try_vertex(*v)?;
            }
        }
        Ok(())
    }
}
