//! Vertices, their attachment points and payloads.

use crate::graph::Graph;
use crate::ids::VertexId;
use crate::library::{BlockRef, Pool};
use crate::registry::PortClass;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Port classes that mark a single-port vertex as a ring-closing carrier.
pub const RING_CLOSING_CLASSES: [&str; 3] = ["ATplus", "ATminus", "ATneutral"];

/// Addresses one attachment point of one vertex.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[debug("{vertex:?}.ap{index}")]
pub struct ApRef {
    pub vertex: VertexId,
    pub index: usize,
}

impl ApRef {
    pub fn new(vertex: VertexId, index: usize) -> Self {
        ApRef { vertex, index }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AttachmentPoint {
    index: usize,
    class: PortClass,
    multiplicity_capable: bool,
    available: bool,
}

impl AttachmentPoint {
    pub(crate) fn new(index: usize, class: PortClass, multiplicity_capable: bool) -> Self {
        AttachmentPoint {
            index,
            class,
            multiplicity_capable,
            available: true,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn class(&self) -> &PortClass {
        &self.class
    }

    pub fn is_multiplicity_capable(&self) -> bool {
        self.multiplicity_capable
    }

    pub fn is_available(&self) -> bool {
        self.available
    }

    pub(crate) fn set_available(&mut self, available: bool) {
        self.available = available;
    }
}

/// A group of attachment points of one vertex that are interchangeable.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SymmetricAps(BTreeSet<usize>);

impl SymmetricAps {
    pub fn new(indices: impl IntoIterator<Item = usize>) -> Self {
        SymmetricAps(indices.into_iter().collect())
    }

    pub fn contains(&self, index: usize) -> bool {
        self.0.contains(&index)
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.0.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum MutationKind {
    /// Replace the branch rooted at the vertex with a freshly grown one.
    ChangeBranch,
    /// Grow on the vertex's free ports.
    Extend,
    /// Remove the vertex and everything below it.
    Delete,
}

impl MutationKind {
    pub const ALL: [MutationKind; 3] = [
        MutationKind::ChangeBranch,
        MutationKind::Extend,
        MutationKind::Delete,
    ];

    /// Kinds a block from `pool` supports unless it declares its own.
    pub fn defaults_for(pool: Pool) -> BTreeSet<MutationKind> {
        match pool {
            Pool::Scaffold => BTreeSet::from([MutationKind::Extend]),
            Pool::Fragment => MutationKind::ALL.into_iter().collect(),
            Pool::Capping => BTreeSet::new(),
        }
    }
}

#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum VertexPayload {
    Fragment { label: String },
    Empty,
    /// An embedded graph that is treated as a single opaque block.
    Template(Box<Graph>),
}

#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Vertex {
    id: VertexId,
    source: Option<BlockRef>,
    aps: Vec<AttachmentPoint>,
    symmetric_aps: Vec<SymmetricAps>,
    level: i32,
    mutation_kinds: BTreeSet<MutationKind>,
    payload: VertexPayload,
}

impl Vertex {
    /// A vertex that does not come from a library, with one port per class.
    pub fn detached(
        id: VertexId,
        classes: impl IntoIterator<Item = PortClass>,
        payload: VertexPayload,
    ) -> Self {
        Vertex {
            id,
            source: None,
            aps: classes
                .into_iter()
                .enumerate()
                .map(|(i, c)| AttachmentPoint::new(i, c, false))
                .collect(),
            symmetric_aps: Vec::new(),
            level: 0,
            mutation_kinds: MutationKind::ALL.into_iter().collect(),
            payload,
        }
    }

    pub(crate) fn from_parts(
        id: VertexId,
        source: Option<BlockRef>,
        aps: Vec<AttachmentPoint>,
        symmetric_aps: Vec<SymmetricAps>,
        mutation_kinds: BTreeSet<MutationKind>,
        payload: VertexPayload,
    ) -> Self {
        Vertex {
            id,
            source,
            aps,
            symmetric_aps,
            level: 0,
            mutation_kinds,
            payload,
        }
    }

    pub fn id(&self) -> VertexId {
        self.id
    }

    pub(crate) fn set_id(&mut self, id: VertexId) {
        self.id = id;
    }

    pub fn source(&self) -> Option<BlockRef> {
        self.source
    }

    pub fn pool(&self) -> Option<Pool> {
        self.source.map(|s| s.pool)
    }

    pub fn is_capping(&self) -> bool {
        self.pool() == Some(Pool::Capping)
    }

    pub fn aps(&self) -> &[AttachmentPoint] {
        &self.aps
    }

    pub fn ap(&self, index: usize) -> Option<&AttachmentPoint> {
        self.aps.get(index)
    }

    pub(crate) fn ap_mut(&mut self, index: usize) -> Option<&mut AttachmentPoint> {
        self.aps.get_mut(index)
    }

    pub(crate) fn aps_mut(&mut self) -> &mut [AttachmentPoint] {
        &mut self.aps
    }

    pub fn free_aps(&self) -> impl Iterator<Item = &AttachmentPoint> {
        self.aps.iter().filter(|ap| ap.is_available())
    }

    pub fn has_free_ap(&self) -> bool {
        self.aps.iter().any(AttachmentPoint::is_available)
    }

    pub fn symmetric_aps(&self) -> &[SymmetricAps] {
        &self.symmetric_aps
    }

    /// The symmetric group containing `index`, if any.
    pub fn symmetric_aps_of(&self, index: usize) -> Option<&SymmetricAps> {
        self.symmetric_aps.iter().find(|s| s.contains(index))
    }

    pub fn level(&self) -> i32 {
        self.level
    }

    pub(crate) fn set_level(&mut self, level: i32) {
        self.level = level;
    }

    pub fn mutation_kinds(&self) -> &BTreeSet<MutationKind> {
        &self.mutation_kinds
    }

    pub fn payload(&self) -> &VertexPayload {
        &self.payload
    }

    pub fn is_ring_closing(&self) -> bool {
        self.aps.len() == 1
            && RING_CLOSING_CLASSES.contains(&self.aps[0].class().as_str())
    }

    /// Number of used ports other than `index`.
    pub fn crowdedness(&self, index: usize) -> usize {
        self.aps
            .iter()
            .filter(|ap| ap.index() != index && !ap.is_available())
            .count()
    }
}
