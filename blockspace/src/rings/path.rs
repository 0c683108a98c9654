use super::ClosableChain;
use super::chain::ChainLink;
use crate::graph::{Edge, Graph, GraphResult};
use crate::ids::{IdGenerator, VertexId};

/// The tree path between two vertices of a graph, with the identifiers used to look it up in a
/// [`RingClosuresArchive`](super::RingClosuresArchive).
#[derive(Clone, Debug)]
pub struct PathSubGraph {
    head: VertexId,
    tail: VertexId,
    turning_point: Option<VertexId>,
    vertices: Vec<VertexId>,
    edges: Vec<Edge>,
    chain: ClosableChain,
    chain_id: String,
    reverse_chain_id: String,
    alternative_ids: Vec<String>,
}

impl PathSubGraph {
    /// Walks from `head` and `tail` towards the root until the walks meet.
    ///
    /// A path from a vertex to itself, or between vertices that share no ancestor, is empty and
    /// has an empty chain id.
    pub fn new(graph: &Graph, head: VertexId, tail: VertexId) -> GraphResult<Self> {
        graph.try_vertex(head)?;
        graph.try_vertex(tail)?;
        let mut path = PathSubGraph {
            head,
            tail,
            turning_point: None,
            vertices: Vec::new(),
            edges: Vec::new(),
            chain: ClosableChain::default(),
            chain_id: String::new(),
            reverse_chain_id: String::new(),
            alternative_ids: Vec::new(),
        };
        if head == tail {
            return Ok(path);
        }

        let from_head = ancestry(graph, head);
        let from_tail = ancestry(graph, tail);
        let Some((head_pos, tail_pos)) = from_head
            .iter()
            .enumerate()
            .find_map(|(i, v)| from_tail.iter().position(|w| w == v).map(|j| (i, j)))
        else {
            return Ok(path);
        };

        let mut vertices: Vec<VertexId> = from_head[..=head_pos].to_vec();
        vertices.extend(from_tail[..tail_pos].iter().rev());
        let mut edges = Vec::with_capacity(vertices.len() - 1);
        for pair in vertices.windows(2) {
            edges.push(edge_between(graph, pair[0], pair[1])?);
        }

        let mut links = Vec::with_capacity(vertices.len().saturating_sub(2));
        for i in 1..vertices.len() - 1 {
            let here = vertices[i];
            let back = ap_on(&edges[i - 1], here);
            let front = ap_on(&edges[i], here);
            links.push(ChainLink::new(graph.try_vertex(here)?.source(), back, front));
        }
        // the turning point only has a link when it is internal to the path
        let internal = head_pos + 1 < vertices.len();
        let chain = ClosableChain::new(links, head_pos.checked_sub(1).filter(|_| internal));

        let reverse = chain.reversed();
        let mut alternative_ids = vec![chain.to_string(), reverse.to_string()];
        for by in 1..chain.len() {
            for id in [chain.rotated(by).to_string(), reverse.rotated(by).to_string()] {
                if !alternative_ids.contains(&id) {
                    alternative_ids.push(id);
                }
            }
        }

        path.turning_point = Some(from_head[head_pos]);
        path.chain_id = chain.to_string();
        path.reverse_chain_id = reverse.to_string();
        path.alternative_ids = alternative_ids;
        path.chain = chain;
        path.vertices = vertices;
        path.edges = edges;
        Ok(path)
    }

    pub fn head(&self) -> VertexId {
        self.head
    }

    pub fn tail(&self) -> VertexId {
        self.tail
    }

    /// The vertex of the path closest to the root.
    pub fn turning_point(&self) -> Option<VertexId> {
        self.turning_point
    }

    /// Vertices from head to tail, both included.
    pub fn vertices(&self) -> &[VertexId] {
        &self.vertices
    }

    /// Tree edges along the path, in head-to-tail order and with their original direction.
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn chain(&self) -> &ClosableChain {
        &self.chain
    }

    pub fn chain_id(&self) -> &str {
        &self.chain_id
    }

    pub fn reverse_chain_id(&self) -> &str {
        &self.reverse_chain_id
    }

    /// Every id under which an equivalent chain may have been archived.
    pub fn alternative_ids(&self) -> &[String] {
        &self.alternative_ids
    }

    /// Copies the path vertices into a standalone graph whose edges all point from head to tail.
    pub fn to_graph(&self, graph: &Graph, ids: &IdGenerator) -> GraphResult<Graph> {
        let mut out = Graph::new(ids);
        for v in &self.vertices {
            let mut vertex = graph.try_vertex(*v)?.clone();
            for ap in vertex.aps_mut() {
                ap.set_available(true);
            }
            out.add_vertex(vertex)?;
        }
        for (pair, edge) in self.vertices.windows(2).zip(&self.edges) {
            let oriented = if edge.source().vertex == pair[0] {
                *edge
            } else {
                Edge::new(edge.target(), edge.source(), edge.bond_order())
            };
            out.add_edge(oriented)?;
        }
        out.update_levels(-1);
        Ok(out)
    }
}

/// `v`, its parent, its grandparent and so on up to the root.
fn ancestry(graph: &Graph, v: VertexId) -> Vec<VertexId> {
    let mut chain = vec![v];
    let mut current = v;
    while let Some(parent) = graph.parent(current) {
        if chain.contains(&parent) {
            break;
        }
        chain.push(parent);
        current = parent;
    }
    chain
}

fn edge_between(graph: &Graph, a: VertexId, b: VertexId) -> GraphResult<Edge> {
    graph
        .edge_to_parent(b)
        .filter(|e| e.source().vertex == a)
        .or_else(|| graph.edge_to_parent(a).filter(|e| e.source().vertex == b))
        .copied()
        .ok_or(crate::graph::GraphError::NoParent(b))
}

fn ap_on(edge: &Edge, vertex: VertexId) -> usize {
    if edge.source().vertex == vertex {
        edge.source().index
    } else {
        edge.target().index
    }
}
