//! Capping: saturating free attachment points that must not stay open.

use super::{ClassifyExt, GraphOperators, OperatorResult};
use crate::graph::Graph;
use crate::ids::VertexId;
use crate::library::Pool;
use crate::util::log;
use crate::vertex::{ApRef, Vertex};

impl GraphOperators<'_> {
    /// Attaches a capping block to every free attachment point whose class has a capping rule.
    ///
    /// The first capping block carrying the capping class is used. Attachment points without a
    /// rule, or whose capping class no block provides, are left free. Returns the added vertices.
    pub fn add_capping_groups(&self, graph: &mut Graph) -> OperatorResult<Vec<VertexId>> {
        if let Some(max) = graph.max_vertex_id() {
            self.ids().observe_vertex_id(max);
        }
        let library = self.space.library();
        let registry = self.space.registry();
        let mut added = Vec::new();
        for site in graph.free_aps() {
            let class = *graph.ap(site).classified()?.class();
            let Some(cap_class) = registry.capping_class(&class) else {
                continue;
            };
            let Some(block) = library.capping_blocks_with_class(&cap_class).first() else {
                log::debug!("No capping block carries {cap_class}, leaving {site:?} free");
                continue;
            };
            let cap = library.get_block(Pool::Capping, block.index).classified()?;
            let id = graph
                .append_vertex_on_ap(site, cap, 0, registry.bond_order(&class))
                .classified()?;
            added.push(id);
        }
        log::trace!("Capped {} attachment points of graph {:?}", added.len(), graph.id());
        Ok(added)
    }

    /// Removes the capping blocks attached to `vertex`, freeing the ports they used.
    pub fn remove_capping_on(&self, graph: &mut Graph, vertex: VertexId) -> OperatorResult<usize> {
        graph.try_vertex(vertex).classified()?;
        let caps: Vec<VertexId> = graph
            .children(vertex)
            .into_iter()
            .filter(|c| graph.vertex(*c).is_some_and(Vertex::is_capping))
            .collect();
        for cap in &caps {
            graph.remove_branch(*cap).classified()?;
        }
        Ok(caps.len())
    }

    /// Free attachment points whose class must never be left unused.
    pub fn forbidden_ends(&self, graph: &Graph) -> Vec<ApRef> {
        let registry = self.space.registry();
        graph
            .free_aps()
            .into_iter()
            .filter(|site| {
                graph
                    .ap(*site)
                    .is_ok_and(|ap| registry.is_forbidden_end(ap.class()))
            })
            .collect()
    }

    pub fn has_forbidden_ends(&self, graph: &Graph) -> bool {
        !self.forbidden_ends(graph).is_empty()
    }
}
