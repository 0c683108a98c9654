//! Moving branches between graphs.

use super::{Edge, Graph, GraphError, GraphResult, Ring, SymmetricVertices};
use crate::ids::{IdGenerator, VertexId};
use crate::registry::BondOrder;
use crate::util::log;
use crate::vertex::ApRef;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

impl Graph {
    /// Relabels levels top-down so the root sits at `root_level`.
    pub fn update_levels(&mut self, root_level: i32) {
        let Some(root) = self.root() else {
            return;
        };
        let mut queue = VecDeque::from([(root, root_level)]);
        while let Some((v, level)) = queue.pop_front() {
            if let Some(vertex) = self.vertex_mut(v) {
                vertex.set_level(level);
            }
            for child in self.children(v) {
                queue.push_back((child, level + 1));
            }
        }
    }

    /// Assigns fresh ids to every vertex, rewriting edges, rings and symmetric sets.
    ///
    /// Returns the old-to-new id map.
    pub fn renumber(&mut self, ids: &IdGenerator) -> HashMap<VertexId, VertexId> {
        let map: HashMap<VertexId, VertexId> = self
            .order
            .iter()
            .map(|v| (*v, ids.next_vertex_id()))
            .collect();
        let mut renumbered = Graph::with_id(self.id);
        for old in &self.order {
            if let Some(mut vertex) = self.vertices.get(old).cloned() {
                vertex.set_id(map[old]);
                renumbered.tree.add_node(map[old]);
                renumbered.vertices.insert(map[old], vertex);
                renumbered.order.push(map[old]);
            }
        }
        for edge in self.edges() {
            if let Some(e) = edge.remapped(&map) {
                renumbered
                    .tree
                    .add_edge(e.source.vertex, e.target.vertex, e);
            }
        }
        renumbered.rings = self
            .rings
            .iter()
            .map(|r| Ring::new(r.vertices.iter().map(|v| map[v]).collect(), r.bond_order))
            .collect();
        renumbered.symmetric_sets = self
            .symmetric_sets
            .iter()
            .map(|s| SymmetricVertices::new(s.iter().map(|v| map[&v])))
            .collect();
        renumbered.closable_chains = std::mem::take(&mut self.closable_chains);
        *self = renumbered;
        map
    }

    /// Detaches the branch rooted at `id` into a new graph.
    ///
    /// The parent's port and the branch root's port become free. Rings and symmetric sets move
    /// along when all their members do; rings crossing the cut are dropped and symmetric sets
    /// crossing it are split.
    pub fn extract_subgraph(&mut self, id: VertexId, ids: &IdGenerator) -> GraphResult<Graph> {
        self.try_vertex(id)?;
        let branch = self.branch(id);
        let members: HashSet<VertexId> = branch.iter().copied().collect();

        let parent_edge = self.edge_to_parent(id).copied();
        if let Some(edge) = parent_edge {
            self.tree.remove_edge(edge.source.vertex, edge.target.vertex);
            for end in [edge.source, edge.target] {
                if let Some(ap) = self
                    .vertex_mut(end.vertex)
                    .and_then(|v| v.ap_mut(end.index))
                {
                    ap.set_available(true);
                }
            }
        }

        let mut sub = Graph::new(ids);
        let inner_edges: Vec<Edge> = self
            .edges()
            .filter(|e| members.contains(&e.source.vertex))
            .copied()
            .collect();
        for v in &branch {
            self.tree.remove_node(*v);
            if let Some(vertex) = self.vertices.remove(v) {
                sub.tree.add_node(*v);
                sub.vertices.insert(*v, vertex);
                sub.order.push(*v);
            }
        }
        self.order.retain(|v| !members.contains(v));
        for e in inner_edges {
            sub.tree.add_edge(e.source.vertex, e.target.vertex, e);
        }

        let (inside, outside): (Vec<Ring>, Vec<Ring>) = std::mem::take(&mut self.rings)
            .into_iter()
            .partition(|r| r.vertices.iter().all(|v| members.contains(v)));
        sub.rings = inside;
        self.rings = outside
            .into_iter()
            .filter(|r| !r.vertices.iter().any(|v| members.contains(v)))
            .collect();

        for set in std::mem::take(&mut self.symmetric_sets) {
            let (moved, kept): (Vec<VertexId>, Vec<VertexId>) =
                set.iter().partition(|v| members.contains(v));
            if moved.len() >= 2 {
                sub.symmetric_sets.push(SymmetricVertices::new(moved));
            }
            if kept.len() >= 2 {
                self.symmetric_sets.push(SymmetricVertices::new(kept));
            }
        }
        log::trace!("Extracted {} vertices rooted at {id:?}", sub.vertex_count());
        Ok(sub)
    }

    /// Expands a site to the free ports symmetric to it on the same vertex.
    fn symmetric_sites(&self, site: ApRef) -> Vec<ApRef> {
        let Some(vertex) = self.vertex(site.vertex) else {
            return vec![site];
        };
        match vertex.symmetric_aps_of(site.index) {
            Some(group) => group
                .iter()
                .filter(|i| *i == site.index || vertex.ap(*i).is_some_and(|ap| ap.is_available()))
                .map(|i| ApRef::new(site.vertex, i))
                .collect(),
            None => vec![site],
        }
    }

    /// Grafts a renumbered copy of `subgraph` onto each of `sites`, connecting the copy's root
    /// through its port `root_ap`.
    ///
    /// With `on_all_symmetric_aps`, each site is widened to the free ports symmetric to it. All
    /// copies of one subgraph vertex (and of its symmetric partners inside `subgraph`) made in one
    /// call end up in the same symmetric set. Nothing is changed if any site is unusable.
    ///
    /// Returns one old-to-new id map per copy.
    pub fn append_subgraph(
        &mut self,
        sites: &[ApRef],
        subgraph: &Graph,
        root_ap: usize,
        bond_order: BondOrder,
        on_all_symmetric_aps: bool,
        ids: &IdGenerator,
    ) -> GraphResult<Vec<HashMap<VertexId, VertexId>>> {
        let root = subgraph.root().ok_or(GraphError::Empty)?;
        let root_ref = ApRef::new(root, root_ap);
        if !subgraph.ap(root_ref)?.is_available() {
            return Err(GraphError::ApInUse(root_ref));
        }

        let mut targets: Vec<ApRef> = Vec::new();
        for site in sites {
            let expanded = if on_all_symmetric_aps {
                self.symmetric_sites(*site)
            } else {
                vec![*site]
            };
            for s in expanded {
                if !targets.contains(&s) {
                    targets.push(s);
                }
            }
        }
        for site in &targets {
            self.check_free(*site)?;
        }

        // copies of symmetric partners inside the subgraph share one key
        let class_key = |v: VertexId| {
            subgraph
                .symmetric_set_of(v)
                .and_then(|s| s.iter().next())
                .unwrap_or(v)
        };
        let mut groups: BTreeMap<VertexId, Vec<VertexId>> = BTreeMap::new();
        let mut maps = Vec::with_capacity(targets.len());

        for site in targets {
            let level = self.try_vertex(site.vertex)?.level() + 1;
            let mut copy = subgraph.clone();
            let map = copy.renumber(ids);
            copy.update_levels(level);
            for v in &copy.order {
                if let Some(vertex) = copy.vertices.remove(v) {
                    self.tree.add_node(*v);
                    self.vertices.insert(*v, vertex);
                    self.order.push(*v);
                }
            }
            for (s, t, e) in copy.tree.all_edges() {
                self.tree.add_edge(s, t, *e);
            }
            self.rings.append(&mut copy.rings);
            self.add_edge(Edge::new(site, ApRef::new(map[&root], root_ap), bond_order))?;
            for (old, new) in &map {
                groups.entry(class_key(*old)).or_default().push(*new);
            }
            maps.push(map);
        }

        for (_, members) in groups {
            if members.len() >= 2 {
                self.symmetric_sets.push(SymmetricVertices::new(members));
            }
        }
        Ok(maps)
    }
}
