//! Flat serialized form of a [`Graph`]. Deserialization replays the edges, so a tampered
//! document cannot produce an inconsistent graph.

use super::{Edge, Graph, GraphError, Ring, SymmetricVertices};
use crate::ids::GraphId;
use crate::rings::ClosableChain;
use crate::vertex::Vertex;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize)]
pub(super) struct GraphRepr {
    id: GraphId,
    vertices: Vec<Vertex>,
    edges: Vec<Edge>,
    rings: Vec<Ring>,
    symmetric_sets: Vec<SymmetricVertices>,
    closable_chains: Vec<ClosableChain>,
}

impl From<Graph> for GraphRepr {
    fn from(graph: Graph) -> Self {
        let edges = graph.edges().copied().collect();
        let mut vertices = Vec::with_capacity(graph.vertex_count());
        let Graph {
            id,
            vertices: mut by_id,
            order,
            rings,
            symmetric_sets,
            closable_chains,
            ..
        } = graph;
        for v in order {
            if let Some(vertex) = by_id.remove(&v) {
                vertices.push(vertex);
            }
        }
        GraphRepr {
            id,
            vertices,
            edges,
            rings,
            symmetric_sets,
            closable_chains,
        }
    }
}

impl TryFrom<GraphRepr> for Graph {
    type Error = GraphError;

    fn try_from(repr: GraphRepr) -> Result<Self, Self::Error> {
        let mut graph = Graph::with_id(repr.id);
        for mut vertex in repr.vertices {
            let level = vertex.level();
            for ap in vertex.aps_mut() {
                ap.set_available(true);
            }
            let id = graph.add_vertex(vertex)?;
            if let Some(v) = graph.vertex_mut(id) {
                v.set_level(level);
            }
        }
        for edge in repr.edges {
            graph.add_edge(edge)?;
        }
        for ring in repr.rings {
            graph.add_ring(ring)?;
        }
        for set in repr.symmetric_sets {
            graph.add_symmetric_set(set)?;
        }
        graph.closable_chains = repr.closable_chains;
        graph.check_consistency()?;
        Ok(graph)
    }
}
