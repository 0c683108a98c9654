//! Mutation: deleting, extending or regrowing the branch at one vertex.

use super::{ClassifyExt, GraphOperators, GrowthOptions, OperatorResult};
use crate::graph::Graph;
use crate::ids::VertexId;
use crate::util::log;
use crate::vertex::MutationKind;
use rand::Rng;
use rand::seq::IndexedRandom;
use std::collections::HashSet;

impl GraphOperators<'_> {
    /// Applies `kind` at `vertex` with default growth options.
    ///
    /// Returns `false` when the mutation is refused (unknown vertex, kind not allowed there) or
    /// has no effect.
    pub fn mutate<R: Rng + ?Sized>(
        &self,
        graph: &mut Graph,
        vertex: VertexId,
        kind: MutationKind,
        rng: &mut R,
    ) -> OperatorResult<bool> {
        self.mutate_with(graph, vertex, kind, GrowthOptions::default(), rng)
    }

    /// Applies `kind` at `vertex`; `options` drive the growth of `Extend` and `ChangeBranch`.
    pub fn mutate_with<R: Rng + ?Sized>(
        &self,
        graph: &mut Graph,
        vertex: VertexId,
        kind: MutationKind,
        options: GrowthOptions,
        rng: &mut R,
    ) -> OperatorResult<bool> {
        if !graph.contains_vertex(vertex) {
            log::info!("{vertex:?} is not in graph {:?}, mutation refused", graph.id());
            return Ok(false);
        }
        if !graph.allowed_mutations(vertex, &[]).contains(&kind) {
            log::info!("{vertex:?} does not allow {kind:?}, mutation refused");
            return Ok(false);
        }
        let done = match kind {
            MutationKind::Delete => self.delete_branch(graph, vertex)?,
            MutationKind::Extend => {
                self.remove_capping_on(graph, vertex)?;
                self.extend_graph(graph, vertex, options, rng)?.grew()
            }
            MutationKind::ChangeBranch => self.substitute(graph, vertex, options, rng)?,
        };
        log::info!(
            "Mutation {kind:?} on {vertex:?} (graph {:?}): {}",
            graph.id(),
            if done { "done" } else { "unsuccessful" }
        );
        Ok(done)
    }

    /// Picks a vertex uniformly among those offering a kind not in `excluded`, then one of its
    /// kinds uniformly, and applies it.
    pub fn mutate_random<R: Rng + ?Sized>(
        &self,
        graph: &mut Graph,
        excluded: &[MutationKind],
        rng: &mut R,
    ) -> OperatorResult<bool> {
        let sites = graph.mutation_sites(excluded);
        let Some(vertex) = sites.choose(rng).copied() else {
            log::info!("Graph {:?} has no mutable site", graph.id());
            return Ok(false);
        };
        let kinds = graph.allowed_mutations(vertex, excluded);
        let Some(kind) = kinds.choose(rng).copied() else {
            return Ok(false);
        };
        self.mutate(graph, vertex, kind, rng)
    }

    /// Removes the branch at `vertex` and the branches of its symmetric partners.
    ///
    /// Refused, leaving the graph untouched, when `vertex` has no parent or fewer than two
    /// vertices would remain.
    pub fn delete_branch(&self, graph: &mut Graph, vertex: VertexId) -> OperatorResult<bool> {
        graph.try_vertex(vertex).classified()?;
        if graph.parent(vertex).is_none() {
            log::info!("Refusing to delete the root {vertex:?}");
            return Ok(false);
        }
        let doomed: HashSet<VertexId> = graph
            .symmetric_partners(vertex)
            .into_iter()
            .flat_map(|v| graph.branch(v))
            .collect();
        if graph.vertex_count() - doomed.len() < 2 {
            log::info!(
                "Deleting {vertex:?} would leave graph {:?} with {} vertices",
                graph.id(),
                graph.vertex_count() - doomed.len()
            );
            return Ok(false);
        }
        self.remove_with_partners(graph, vertex)?;
        Ok(true)
    }

    /// Deletes the branch at `vertex` (with its symmetric partners) and regrows from the parent,
    /// replicating on symmetric ports if the vertex was symmetric.
    pub fn substitute<R: Rng + ?Sized>(
        &self,
        graph: &mut Graph,
        vertex: VertexId,
        options: GrowthOptions,
        rng: &mut R,
    ) -> OperatorResult<bool> {
        graph.try_vertex(vertex).classified()?;
        let Some(parent) = graph.parent(vertex) else {
            log::info!("{vertex:?} has no parent to regrow from");
            return Ok(false);
        };
        let symmetric = graph.has_symmetry_involving(vertex);
        self.remove_with_partners(graph, vertex)?;
        let options = GrowthOptions {
            recursive: false,
            symmetry_on_aps: options.symmetry_on_aps || symmetric,
            ..options
        };
        Ok(self.extend_graph(graph, parent, options, rng)?.grew())
    }

    fn remove_with_partners(&self, graph: &mut Graph, vertex: VertexId) -> OperatorResult<()> {
        for partner in graph.symmetric_partners(vertex) {
            if graph.contains_vertex(partner) {
                graph.remove_branch(partner).classified()?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::SymmetricVertices;
    use crate::ids::IdGenerator;
    use crate::library::{BlockLibrary, BuildingBlock, Pool};
    use crate::registry::{BondOrder, CompatibilityRegistry};
    use crate::settings::GrowthSettings;
    use crate::space::BlockSpace;
    use crate::vertex::ApRef;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::sync::Arc;

    fn space() -> BlockSpace {
        let library = BlockLibrary::new(
            Arc::new(IdGenerator::new()),
            vec![
                BuildingBlock::fragment("core")
                    .with_port("A")
                    .with_port("A")
                    .with_symmetric_ports([0, 1]),
            ],
            vec![
                BuildingBlock::fragment("linker").with_port("A").with_port("A"),
                BuildingBlock::fragment("end").with_port("A"),
            ],
            vec![],
        )
        .unwrap();
        let mut rules = CompatibilityRegistry::builder();
        rules.compatibility("A", ["A"]);
        BlockSpace::new(library, rules.build().unwrap())
    }

    /// core with a linker on each port (symmetric), an end below the first linker.
    fn sample(space: &BlockSpace) -> (Graph, [VertexId; 4]) {
        let lib = space.library();
        let mut g = Graph::new(space.ids());
        let root = g.add_vertex(lib.get_block(Pool::Scaffold, 0).unwrap()).unwrap();
        let a = g
            .append_vertex_on_ap(ApRef::new(root, 0), lib.get_block(Pool::Fragment, 0).unwrap(), 0, BondOrder::SINGLE)
            .unwrap();
        let b = g
            .append_vertex_on_ap(ApRef::new(root, 1), lib.get_block(Pool::Fragment, 0).unwrap(), 0, BondOrder::SINGLE)
            .unwrap();
        let c = g
            .append_vertex_on_ap(ApRef::new(a, 1), lib.get_block(Pool::Fragment, 1).unwrap(), 0, BondOrder::SINGLE)
            .unwrap();
        g.add_symmetric_set(SymmetricVertices::new([a, b])).unwrap();
        (g, [root, a, b, c])
    }

    #[test_log::test]
    fn delete_takes_symmetric_partners_along() {
        let space = space();
        let settings = GrowthSettings::default();
        let ops = GraphOperators::new(&space, &settings);
        let (mut g, [_, _, _, c]) = sample(&space);
        assert!(ops.delete_branch(&mut g, c).unwrap());
        assert_eq!(g.vertex_count(), 3);

        // removing both linkers would leave only the root
        let (mut g, [_, a, _, _]) = sample(&space);
        assert!(!ops.delete_branch(&mut g, a).unwrap());
        assert_eq!(g.vertex_count(), 4);
        g.check_consistency().unwrap();
    }

    #[test_log::test]
    fn refused_mutations_leave_the_graph_alone() {
        let space = space();
        let settings = GrowthSettings::default();
        let ops = GraphOperators::new(&space, &settings);
        let (mut g, [root, ..]) = sample(&space);
        let mut rng = StdRng::seed_from_u64(4);
        assert!(!ops.mutate(&mut g, root, MutationKind::Delete, &mut rng).unwrap());
        assert!(!ops.mutate(&mut g, VertexId(9999), MutationKind::Extend, &mut rng).unwrap());
        assert_eq!(g.vertex_count(), 4);
    }

    #[test_log::test]
    fn substitution_regrows_symmetrically() {
        let space = space();
        let settings = GrowthSettings::default();
        let ops = GraphOperators::new(&space, &settings);
        let (mut g, [root, a, _, _]) = sample(&space);
        let mut rng = StdRng::seed_from_u64(8);
        let done = ops
            .substitute(&mut g, a, GrowthOptions::default().forced(), &mut rng)
            .unwrap();
        assert!(done);
        g.check_consistency().unwrap();
        let children = g.children(root);
        assert_eq!(children.len(), 2);
        assert!(g.symmetric_set_of(children[0]).unwrap().contains(children[1]));
    }

    #[test_log::test]
    fn random_mutations_keep_the_graph_consistent() {
        let space = space();
        let settings = GrowthSettings::default();
        let ops = GraphOperators::new(&space, &settings);
        let mut rng = StdRng::seed_from_u64(21);
        let (mut g, _) = sample(&space);
        for _ in 0..50 {
            ops.mutate_random(&mut g, &[], &mut rng).unwrap();
            g.check_consistency().unwrap();
            assert!(g.vertex_count() >= 1);
        }
    }
}
