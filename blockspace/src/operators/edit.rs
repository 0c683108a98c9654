//! Scripted edits: query-driven replacement and deletion of branches.

use super::{ClassifyExt, GraphOperators, OperatorResult};
use crate::graph::{Graph, VertexQuery};
use crate::ids::VertexId;
use crate::registry::BondOrder;
use crate::util::log;
use crate::vertex::ApRef;
use error_stack::ResultExt;

#[derive(Clone, Debug)]
pub enum GraphEdit {
    /// Replace the branch rooted at every match with a copy of `replacement`, attached by its
    /// root's port `root_ap` to the port the match hung from.
    ReplaceChild {
        query: VertexQuery,
        replacement: Graph,
        root_ap: usize,
        /// Also replace the symmetric partners of each match, grouping the copies into one
        /// symmetric set.
        symmetric: bool,
    },
    /// Remove the branch rooted at every match.
    DeleteVertex { query: VertexQuery, symmetric: bool },
}

impl GraphOperators<'_> {
    /// Applies `edits` in order to a copy of `graph` and returns the copy.
    ///
    /// Matches without a parent (the root) are skipped.
    pub fn edit_graph(&self, graph: &Graph, edits: &[GraphEdit]) -> OperatorResult<Graph> {
        let mut edited = graph.clone();
        if let Some(max) = edited.max_vertex_id() {
            self.ids().observe_vertex_id(max);
        }
        for (i, edit) in edits.iter().enumerate() {
            match edit {
                GraphEdit::ReplaceChild {
                    query,
                    replacement,
                    root_ap,
                    symmetric,
                } => {
                    for m in edited.find_vertices(query, *symmetric) {
                        let Some((sites, bond_order)) = cut(&mut edited, m, *symmetric)? else {
                            continue;
                        };
                        edited
                            .append_subgraph(
                                &sites,
                                replacement,
                                *root_ap,
                                bond_order,
                                false,
                                self.ids(),
                            )
                            .classified()
                            .attach_printable_lazy(|| format!("edit #{i} replacing {m:?}"))?;
                    }
                }
                GraphEdit::DeleteVertex { query, symmetric } => {
                    for m in edited.find_vertices(query, *symmetric) {
                        cut(&mut edited, m, *symmetric)?;
                    }
                }
            }
        }
        Ok(edited)
    }
}

/// Removes the branch at `vertex` (and at its partners with `symmetric`), returning the freed
/// parent ports and the bond order of the first removed parent edge.
fn cut(
    graph: &mut Graph,
    vertex: VertexId,
    symmetric: bool,
) -> OperatorResult<Option<(Vec<ApRef>, BondOrder)>> {
    if !graph.contains_vertex(vertex) {
        return Ok(None);
    }
    let targets = if symmetric {
        graph.symmetric_partners(vertex)
    } else {
        vec![vertex]
    };
    let mut sites = Vec::new();
    let mut bond_order = None;
    for target in targets {
        if !graph.contains_vertex(target) {
            continue;
        }
        let Some(edge) = graph.edge_to_parent(target).copied() else {
            log::debug!("Edit skips {target:?}, which has no parent");
            continue;
        };
        graph.remove_branch(target).classified()?;
        sites.push(edge.source());
        bond_order.get_or_insert(edge.bond_order());
    }
    sites.retain(|site| graph.contains_vertex(site.vertex));
    Ok(bond_order.map(|bond| (sites, bond)))
}
