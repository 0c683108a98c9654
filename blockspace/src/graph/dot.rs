use super::Graph;
use crate::vertex::VertexPayload;
use petgraph::dot;
use petgraph::dot::Dot;
use petgraph::visit::NodeIndexable;

impl Graph {
    /// Graphviz rendering of the spanning tree. Ring chords are drawn dashed.
    pub fn dot(&self) -> String {
        let tree = format!(
            "{:?}",
            Dot::with_attr_getters(
                &self.tree,
                &[dot::Config::EdgeNoLabel, dot::Config::NodeNoLabel],
                &|_, (_, _, edge)| {
                    format!(
                        "label = \"ap{}-ap{} ({})\"",
                        edge.source().index,
                        edge.target().index,
                        edge.bond_order().0
                    )
                },
                &|_, (id, _)| {
                    let description = match self.vertex(id) {
                        Some(v) => {
                            let kind = match v.payload() {
                                VertexPayload::Fragment { label } => label.clone(),
                                VertexPayload::Empty => "empty".to_string(),
                                VertexPayload::Template(_) => "template".to_string(),
                            };
                            let source = v
                                .source()
                                .map(|s| format!("{s:?}"))
                                .unwrap_or_else(|| "-".to_string());
                            format!("{kind}|{source}|L{}", v.level())
                        }
                        None => "?".to_string(),
                    };
                    let description = description.escape_debug();
                    format!("label = \"{id}|{description}\"")
                }
            )
        );
        if self.rings.is_empty() {
            return tree;
        }
        let chords: String = self
            .rings
            .iter()
            .filter_map(|r| Some((r.head()?, r.tail()?)))
            .filter(|(h, t)| self.tree.contains_node(*h) && self.tree.contains_node(*t))
            .map(|(h, t)| {
                let (h, t) = (self.tree.to_index(h), self.tree.to_index(t));
                format!("    {h} -> {t} [ style = dashed, dir = none ]\n")
            })
            .collect();
        match tree.rfind('}') {
            Some(end) => format!("{}{chords}}}\n", &tree[..end]),
            None => tree,
        }
    }
}

/// Concatenates the renderings of several graphs, e.g. the states of a graph across operators.
#[derive(Default)]
pub struct DotCollector {
    dot: String,
}

impl DotCollector {
    pub fn new() -> Self {
        DotCollector { dot: String::new() }
    }

    pub fn collect(&mut self, graph: &Graph) {
        if !self.dot.is_empty() {
            self.dot.push_str("\n---\n");
        }
        self.dot.push_str(&graph.dot());
    }

    pub fn finalize(&self) -> String {
        self.dot.clone()
    }
}
