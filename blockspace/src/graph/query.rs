//! Wildcard queries over the vertices of a graph.

use super::{Edge, Graph};
use crate::ids::VertexId;
use crate::library::{BlockRef, Pool};
use crate::registry::{BondOrder, PortClass};
use crate::vertex::ApRef;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Filter on an edge. `None` fields match anything.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EdgeQuery {
    pub source_ap: Option<usize>,
    pub target_ap: Option<usize>,
    pub bond_order: Option<BondOrder>,
    pub source_class: Option<PortClass>,
    pub target_class: Option<PortClass>,
}

impl EdgeQuery {
    pub fn is_wildcard(&self) -> bool {
        *self == EdgeQuery::default()
    }

    pub fn matches(&self, graph: &Graph, edge: &Edge) -> bool {
        let class_of = |ap: ApRef| graph.ap(ap).ok().map(|ap| *ap.class());
        self.source_ap.is_none_or(|i| i == edge.source().index)
            && self.target_ap.is_none_or(|i| i == edge.target().index)
            && self.bond_order.is_none_or(|b| b == edge.bond_order())
            && self
                .source_class
                .is_none_or(|c| class_of(edge.source()) == Some(c))
            && self
                .target_class
                .is_none_or(|c| class_of(edge.target()) == Some(c))
    }
}

/// Filter on a vertex and the edges around it. `None` fields match anything.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct VertexQuery {
    pub vertex: Option<VertexId>,
    pub block: Option<BlockRef>,
    pub pool: Option<Pool>,
    pub level: Option<i32>,
    /// Must match the edge to the parent. Vertices without a parent fail a non-wildcard filter.
    pub incoming: Option<EdgeQuery>,
    /// At least one edge to a child must match.
    pub outgoing: Option<EdgeQuery>,
}

impl VertexQuery {
    pub fn matches(&self, graph: &Graph, id: VertexId) -> bool {
        let Some(vertex) = graph.vertex(id) else {
            return false;
        };
        if self.vertex.is_some_and(|v| v != id)
            || self.block.is_some_and(|b| vertex.source() != Some(b))
            || self.pool.is_some_and(|p| vertex.pool() != Some(p))
            || self.level.is_some_and(|l| l != vertex.level())
        {
            return false;
        }
        if let Some(incoming) = self.incoming.as_ref().filter(|q| !q.is_wildcard()) {
            match graph.edge_to_parent(id) {
                Some(edge) if incoming.matches(graph, edge) => {}
                _ => return false,
            }
        }
        if let Some(outgoing) = self.outgoing.as_ref().filter(|q| !q.is_wildcard()) {
            let any = graph.children(id).into_iter().any(|c| {
                graph
                    .edge_to_parent(c)
                    .is_some_and(|e| outgoing.matches(graph, e))
            });
            if !any {
                return false;
            }
        }
        true
    }
}

impl Graph {
    /// Vertices matching `query`, in insertion order.
    ///
    /// With `one_per_symmetric_set`, only the first match of each symmetric set is kept.
    pub fn find_vertices(&self, query: &VertexQuery, one_per_symmetric_set: bool) -> Vec<VertexId> {
        let mut covered: HashSet<VertexId> = HashSet::new();
        let mut found = Vec::new();
        for id in self.vertex_ids() {
            if !query.matches(self, *id) || covered.contains(id) {
                continue;
            }
            if one_per_symmetric_set {
                covered.extend(self.symmetric_partners(*id));
            }
            found.push(*id);
        }
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::IdGenerator;
    use crate::graph::SymmetricVertices;
    use crate::vertex::{Vertex, VertexPayload};

    #[test_log::test]
    fn queries_filter_by_level_edges_and_symmetry() {
        let ids = IdGenerator::new();
        let mut g = Graph::new(&ids);
        let v = |classes: &[&str]| {
            Vertex::detached(
                ids.next_vertex_id(),
                classes.iter().map(|c| PortClass::from(*c)),
                VertexPayload::Empty,
            )
        };
        let root = g.add_vertex(v(&["A", "A", "B"])).unwrap();
        let a = g
            .append_vertex_on_ap(ApRef::new(root, 0), v(&["X"]), 0, BondOrder::SINGLE)
            .unwrap();
        let b = g
            .append_vertex_on_ap(ApRef::new(root, 1), v(&["X"]), 0, BondOrder::SINGLE)
            .unwrap();
        let c = g
            .append_vertex_on_ap(ApRef::new(root, 2), v(&["Y"]), 0, BondOrder(2))
            .unwrap();
        g.add_symmetric_set(SymmetricVertices::new([a, b])).unwrap();

        let level0 = VertexQuery {
            level: Some(0),
            ..Default::default()
        };
        assert_eq!(g.find_vertices(&level0, false), vec![a, b, c]);
        assert_eq!(g.find_vertices(&level0, true), vec![a, c]);

        let double_bond = VertexQuery {
            incoming: Some(EdgeQuery {
                bond_order: Some(BondOrder(2)),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert_eq!(g.find_vertices(&double_bond, false), vec![c]);

        let from_a_class = VertexQuery {
            incoming: Some(EdgeQuery {
                source_class: Some("A".into()),
                target_class: Some("X".into()),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert_eq!(g.find_vertices(&from_a_class, false), vec![a, b]);

        let parent_of_b_port = VertexQuery {
            outgoing: Some(EdgeQuery {
                source_ap: Some(2),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert_eq!(g.find_vertices(&parent_of_b_port, false), vec![root]);

        let exact = VertexQuery {
            vertex: Some(b),
            ..Default::default()
        };
        assert_eq!(g.find_vertices(&exact, true), vec![b]);
    }
}
