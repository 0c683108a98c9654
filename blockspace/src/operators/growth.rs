//! Growth: filling the free attachment points of a vertex with library blocks.

use super::{ClassifyExt, GraphOperators, OperatorError, OperatorResult};
use crate::graph::{Edge, Graph, SymmetricVertices};
use crate::ids::VertexId;
use crate::library::{BlockRef, Pool, PortRef};
use crate::registry::{PortClass, SymmetryConstraint};
use crate::rings::{ClosableChain, RingClosuresArchive};
use crate::util::{clamp_probability, log};
use crate::vertex::ApRef;
use error_stack::{ResultExt, bail};
use rand::Rng;
use rand::seq::{IndexedRandom, SliceRandom};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GrowthOptions {
    /// Keep growing on every vertex added.
    pub recursive: bool,
    /// Replicate every placement on the symmetric ports of the vertex, whatever the symmetry
    /// policy says.
    pub symmetry_on_aps: bool,
    /// Skip the growth and crowding draws on the vertex the growth starts from.
    pub force: bool,
    /// Attach this library port instead of selecting one, on the starting vertex only.
    pub chosen: Option<PortRef>,
}

impl GrowthOptions {
    pub fn recursive() -> Self {
        GrowthOptions {
            recursive: true,
            ..GrowthOptions::default()
        }
    }

    pub fn forced(mut self) -> Self {
        self.force = true;
        self
    }

    pub fn with_symmetry_on_aps(mut self, symmetry_on_aps: bool) -> Self {
        self.symmetry_on_aps = symmetry_on_aps;
        self
    }

    pub fn with_chosen(mut self, port: PortRef) -> Self {
        self.chosen = Some(port);
        self
    }

    /// Options for the vertices added by a recursive growth.
    fn nested(&self) -> Self {
        GrowthOptions {
            recursive: self.recursive,
            symmetry_on_aps: self.symmetry_on_aps,
            force: false,
            chosen: None,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GrowthOutcome {
    /// Vertices added, in the order they were attached.
    pub added: Vec<VertexId>,
}

impl GrowthOutcome {
    /// Whether at least one attachment point was filled.
    pub fn grew(&self) -> bool {
        !self.added.is_empty()
    }
}

/// What the closable chains of a graph dictate for one free attachment point.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChainSelection {
    /// Attach `port`, then drop the chains at positions `incompatible`, which expected a
    /// different continuation here.
    Attach {
        port: PortRef,
        incompatible: Vec<usize>,
    },
    /// The chosen chains end at this attachment point. They dictate no block, so free
    /// selection applies.
    Terminal,
    /// No chain goes through this attachment point.
    NoCandidate,
}

/// Where a chain continues after the link matched on the growing vertex.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum NextLink {
    Port(PortRef),
    End,
}

#[derive(Debug)]
struct ChainGroup {
    next: NextLink,
    compatible: Vec<usize>,
    incompatible: Vec<usize>,
}

impl GraphOperators<'_> {
    /// Grows on the free attachment points of `vertex`, each visited once in random order.
    ///
    /// Per attachment point: used ports are skipped; unless forced, a growth draw (level and
    /// crowding dependent) may decline; closable chains are consulted when the ring-closure bias
    /// is on; otherwise a compatible library port is picked. The placement is replicated on the
    /// symmetric ports of the vertex (per symmetry policy) and on the vertex's symmetric
    /// partners, and every copy made for one attachment point joins one new symmetric set.
    pub fn extend_graph<R: Rng + ?Sized>(
        &self,
        graph: &mut Graph,
        vertex: VertexId,
        options: GrowthOptions,
        rng: &mut R,
    ) -> OperatorResult<GrowthOutcome> {
        if let Some(max) = graph.max_vertex_id() {
            self.ids().observe_vertex_id(max);
        }
        let mut outcome = GrowthOutcome::default();
        self.grow_on(graph, vertex, options, rng, &mut outcome)
            .attach_printable_lazy(|| format!("growing graph {:?} on {vertex:?}", graph.id()))?;
        log::debug!(
            "Growth on {vertex:?} added {} vertices to graph {:?}",
            outcome.added.len(),
            graph.id()
        );
        Ok(outcome)
    }

    fn grow_on<R: Rng + ?Sized>(
        &self,
        graph: &mut Graph,
        vid: VertexId,
        options: GrowthOptions,
        rng: &mut R,
        outcome: &mut GrowthOutcome,
    ) -> OperatorResult<()> {
        let vertex = graph.try_vertex(vid).classified()?;
        if !vertex.has_free_ap() {
            log::trace!("{vid:?} has no free attachment point");
            return Ok(());
        }
        let level = vertex.level();
        let mut order: Vec<usize> = (0..vertex.aps().len()).collect();
        order.shuffle(rng);

        let registry = self.space.registry();
        let mut added_here = Vec::new();
        for index in order {
            let site = ApRef::new(vid, index);
            let ap = graph.ap(site).classified()?;
            if !ap.is_available() {
                log::trace!("{site:?} is already in use");
                continue;
            }
            let class = *ap.class();

            if !options.force {
                let crowdedness = graph.try_vertex(vid).classified()?.crowdedness(index);
                let p = self.settings.growth_probability(level)
                    * self.settings.crowding_probability(crowdedness);
                if !rng.random_bool(clamp_probability(p)) {
                    log::trace!("Declined growth on {site:?} (p = {p:.3})");
                    continue;
                }
            }

            let ring_closures = &self.settings.ring_closures;
            if ring_closures.enabled && ring_closures.closable_chain_bias {
                match self.chain_candidates(graph, site, rng)? {
                    ChainSelection::Attach { port, incompatible } => {
                        let child = self.instantiate(port)?;
                        let id = graph
                            .append_vertex_on_ap(site, child, port.ap, registry.bond_order(&class))
                            .classified()?;
                        graph.remove_closable_chains(&incompatible);
                        log::debug!(
                            "Attached {port:?} on {site:?} following a closable chain, dropped {} chains",
                            incompatible.len()
                        );
                        added_here.push(id);
                        continue;
                    }
                    ChainSelection::Terminal => {
                        log::debug!("Closable chains end at {site:?}, selecting freely");
                    }
                    ChainSelection::NoCandidate => {}
                }
            }

            let port = match options.chosen {
                Some(port) => {
                    self.space
                        .library()
                        .port_class(port)
                        .classified()
                        .attach_printable_lazy(|| format!("chosen port {port:?}"))?;
                    port
                }
                None => match self.select_port(&class, rng) {
                    Some(port) => port,
                    None => {
                        log::debug!("No block compatible with {site:?} ({class})");
                        continue;
                    }
                },
            };

            let vertex = graph.try_vertex(vid).classified()?;
            let ap_indices: Vec<usize> = match vertex.symmetric_aps_of(index) {
                Some(group) if options.symmetry_on_aps || self.symmetric_on_aps(&class, rng) => {
                    group.iter().collect()
                }
                _ => vec![index],
            };
            let mut created = Vec::new();
            for partner in graph.symmetric_partners(vid) {
                for i in &ap_indices {
                    let target = ApRef::new(partner, *i);
                    let Ok(target_ap) = graph.ap(target) else {
                        continue;
                    };
                    if !target_ap.is_available() {
                        continue;
                    }
                    let bond = registry.bond_order(target_ap.class());
                    let child = self.instantiate(port)?;
                    created.push(
                        graph
                            .append_vertex_on_ap(target, child, port.ap, bond)
                            .classified()?,
                    );
                }
            }
            if created.len() > 1 {
                graph
                    .add_symmetric_set(SymmetricVertices::new(created.iter().copied()))
                    .classified()?;
            }
            log::trace!("Attached {port:?} on {} sites from {site:?}", created.len());
            added_here.extend(created);
        }

        outcome.added.extend(&added_here);
        if options.recursive {
            let nested = options.nested();
            for v in added_here {
                if graph.contains_vertex(v) {
                    self.grow_on(graph, v, nested, rng, outcome)?;
                }
            }
        }
        Ok(())
    }

    /// Free selection of a library port for a site of class `class`.
    fn select_port<R: Rng + ?Sized>(&self, class: &PortClass, rng: &mut R) -> Option<PortRef> {
        let library = self.space.library();
        let registry = self.space.registry();
        if registry.is_class_based() {
            library
                .ports_compatible_with(registry, class)
                .choose(rng)
                .copied()
        } else {
            library.random_fragment_port(rng)
        }
    }

    fn symmetric_on_aps<R: Rng + ?Sized>(&self, class: &PortClass, rng: &mut R) -> bool {
        match self.space.registry().symmetry_constraint(class) {
            SymmetryConstraint::ForcedOn => true,
            SymmetryConstraint::ForcedOff => false,
            SymmetryConstraint::Defer => {
                self.settings.enforce_symmetry
                    || rng.random_bool(clamp_probability(self.settings.symmetry_probability))
            }
        }
    }

    /// Consults the closable chains of `graph` for the free attachment point `site`.
    ///
    /// Chains going through the vertex via `site` (and, below the root, via the port its parent
    /// edge uses) are grouped by the block and port they continue with. One group is drawn at
    /// random; the chains of the other groups are reported as incompatible.
    pub fn chain_candidates<R: Rng + ?Sized>(
        &self,
        graph: &Graph,
        site: ApRef,
        rng: &mut R,
    ) -> OperatorResult<ChainSelection> {
        let vertex = graph.try_vertex(site.vertex).classified()?;
        let Some(block) = vertex.source() else {
            return Ok(ChainSelection::NoCandidate);
        };
        let parent = graph.edge_to_parent(site.vertex).map(|edge| {
            let parent_block = graph.vertex(edge.source().vertex).and_then(|v| v.source());
            (*edge, parent_block)
        });
        let site_class = *graph.ap(site).classified()?.class();

        let mut groups: Vec<ChainGroup> = Vec::new();
        for (i, chain) in graph.closable_chains().iter().enumerate() {
            let next = match parent {
                None => next_link_from_root(chain, block, site.index),
                Some((edge, parent_block)) => {
                    next_link_below(chain, block, site.index, &edge, parent_block)
                }
            };
            let Some(next) = next else {
                continue;
            };
            if let NextLink::Port(port) = next {
                if !self.continues_compatibly(&site_class, port) {
                    log::trace!("Chain {chain} continues with unusable {port:?}");
                    continue;
                }
            }
            match groups.iter().position(|g| g.next == next) {
                Some(pos) => {
                    for (j, group) in groups.iter_mut().enumerate() {
                        if j == pos {
                            group.compatible.push(i);
                        } else {
                            group.incompatible.push(i);
                        }
                    }
                }
                None => {
                    let incompatible = groups
                        .iter()
                        .flat_map(|g| g.compatible.iter().copied())
                        .collect();
                    for group in &mut groups {
                        group.incompatible.push(i);
                    }
                    groups.push(ChainGroup {
                        next,
                        compatible: vec![i],
                        incompatible,
                    });
                }
            }
        }

        let Some(group) = groups.choose(rng) else {
            return Ok(ChainSelection::NoCandidate);
        };
        Ok(match group.next {
            NextLink::End => ChainSelection::Terminal,
            NextLink::Port(port) => ChainSelection::Attach {
                port,
                incompatible: group.incompatible.clone(),
            },
        })
    }

    fn continues_compatibly(&self, site_class: &PortClass, port: PortRef) -> bool {
        match self.space.library().port_class(port) {
            Ok(class) => self.space.registry().is_compatible(site_class, &class),
            Err(_) => false,
        }
    }

    /// Builds a whole graph: a scaffold, recursive growth from it, capping.
    ///
    /// `scaffold` picks the scaffold block; a random one is used otherwise. With ring closures
    /// enabled and an archive given, the closable chains turning at the scaffold seed the graph.
    /// Returns `None` when free attachment points of a forbidden-end class remain.
    pub fn construct_graph<R: Rng + ?Sized>(
        &self,
        scaffold: Option<usize>,
        archive: Option<&RingClosuresArchive>,
        rng: &mut R,
    ) -> OperatorResult<Option<Graph>> {
        self.construct_graph_with(scaffold, GrowthOptions::recursive(), archive, rng)
    }

    /// [`construct_graph`](Self::construct_graph) with explicit options for the growth from the
    /// scaffold.
    pub fn construct_graph_with<R: Rng + ?Sized>(
        &self,
        scaffold: Option<usize>,
        options: GrowthOptions,
        archive: Option<&RingClosuresArchive>,
        rng: &mut R,
    ) -> OperatorResult<Option<Graph>> {
        let library = self.space.library();
        let index = match scaffold {
            Some(index) => index,
            None => {
                let available = library.pool_len(Pool::Scaffold);
                if available == 0 {
                    bail!(OperatorError::Configuration);
                }
                rng.random_range(0..available)
            }
        };
        let root = library
            .get_block(Pool::Scaffold, index)
            .classified()
            .attach_printable_lazy(|| format!("scaffold {index}"))?;

        let mut graph = Graph::new(self.ids());
        let root = graph.add_vertex(root).classified()?;
        if self.settings.ring_closures.enabled {
            if let Some(archive) = archive {
                let chains: Vec<ClosableChain> = archive
                    .closable_chains_with_turning_point(BlockRef::new(Pool::Scaffold, index));
                log::debug!("Seeding graph {:?} with {} closable chains", graph.id(), chains.len());
                graph.set_closable_chains(chains);
            }
        }

        self.extend_graph(&mut graph, root, options, rng)?;
        self.add_capping_groups(&mut graph)?;
        let forbidden = self.forbidden_ends(&graph);
        if !forbidden.is_empty() {
            log::debug!(
                "Rejecting graph {:?}: forbidden ends left free at {forbidden:?}",
                graph.id()
            );
            return Ok(None);
        }
        graph
            .check_consistency()
            .classified()
            .attach_printable("graph built from scratch")?;
        Ok(Some(graph))
    }
}

/// Continuation of `chain` from the root vertex (an instance of `block`) through its port `ap`.
fn next_link_from_root(chain: &ClosableChain, block: BlockRef, ap: usize) -> Option<NextLink> {
    let pos = chain.involves_block(block)?;
    let link = chain.link(pos)?;
    if link.right_ap() == ap {
        forward(chain, pos)
    } else if link.left_ap() == ap {
        backward(chain, pos)
    } else {
        None
    }
}

/// Continuation of `chain` through port `ap` of a non-root vertex, an instance of `block`
/// attached by `edge` to a parent that is an instance of `parent_block`.
fn next_link_below(
    chain: &ClosableChain,
    block: BlockRef,
    ap: usize,
    edge: &Edge,
    parent_block: Option<BlockRef>,
) -> Option<NextLink> {
    let parent_ap = edge.source().index;
    let child_ap = edge.target().index;
    let pos = chain.involves_block_and_aps(block, ap, child_ap)?;
    let link = chain.link(pos)?;
    let after_turning_point = chain.turning_point().is_none_or(|tp| pos > tp);
    let before_turning_point = chain.turning_point().is_some_and(|tp| pos < tp);
    if after_turning_point {
        let previous = chain.link(pos.checked_sub(1)?)?;
        let parent_matches = previous.block() == parent_block
            && previous.right_ap() == parent_ap
            && link.left_ap() == child_ap;
        parent_matches.then(|| forward(chain, pos)).flatten()
    } else if before_turning_point {
        let previous = chain.link(pos + 1)?;
        let parent_matches = previous.block() == parent_block
            && previous.left_ap() == parent_ap
            && link.right_ap() == child_ap;
        parent_matches.then(|| backward(chain, pos)).flatten()
    } else {
        None
    }
}

fn forward(chain: &ClosableChain, pos: usize) -> Option<NextLink> {
    if pos + 1 == chain.len() {
        return Some(NextLink::End);
    }
    let next = chain.link(pos + 1)?;
    Some(NextLink::Port(PortRef::new(next.block()?, next.left_ap())))
}

fn backward(chain: &ClosableChain, pos: usize) -> Option<NextLink> {
    let Some(prev) = pos.checked_sub(1) else {
        return Some(NextLink::End);
    };
    let next = chain.link(prev)?;
    Some(NextLink::Port(PortRef::new(next.block()?, next.right_ap())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::IdGenerator;
    use crate::library::{BlockLibrary, BuildingBlock};
    use crate::registry::CompatibilityRegistry;
    use crate::settings::{GrowthSettings, ProbabilityScheme, RingClosureSettings};
    use crate::space::BlockSpace;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::sync::Arc;

    fn space() -> BlockSpace {
        let ids = Arc::new(IdGenerator::new());
        let library = BlockLibrary::new(
            ids,
            vec![
                BuildingBlock::fragment("core")
                    .with_port("A")
                    .with_port("A")
                    .with_port("A")
                    .with_symmetric_ports([0, 1, 2]),
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

    fn scaffold_graph(space: &BlockSpace) -> (Graph, VertexId) {
        let mut graph = Graph::new(space.ids());
        let root = graph
            .add_vertex(space.library().get_block(Pool::Scaffold, 0).unwrap())
            .unwrap();
        (graph, root)
    }

    #[test_log::test]
    fn forced_growth_fills_every_port_once() {
        let space = space();
        let settings = GrowthSettings::default();
        let ops = GraphOperators::new(&space, &settings);
        let (mut graph, root) = scaffold_graph(&space);
        let mut rng = StdRng::seed_from_u64(7);
        let outcome = ops
            .extend_graph(&mut graph, root, GrowthOptions::default().forced(), &mut rng)
            .unwrap();
        assert!(outcome.grew());
        assert_eq!(outcome.added.len(), 3);
        assert!(!graph.vertex(root).unwrap().has_free_ap());
        graph.check_consistency().unwrap();
    }

    #[test_log::test]
    fn enforced_symmetry_makes_one_symmetric_set() {
        let space = space();
        let settings = GrowthSettings::default().with_enforced_symmetry(true);
        let ops = GraphOperators::new(&space, &settings);
        let (mut graph, root) = scaffold_graph(&space);
        let mut rng = StdRng::seed_from_u64(11);
        let outcome = ops
            .extend_graph(&mut graph, root, GrowthOptions::default().forced(), &mut rng)
            .unwrap();
        assert_eq!(outcome.added.len(), 3);
        assert_eq!(graph.symmetric_sets().len(), 1);
        assert_eq!(graph.symmetric_sets()[0].len(), 3);
        let blocks: Vec<_> = outcome
            .added
            .iter()
            .map(|v| graph.vertex(*v).unwrap().source())
            .collect();
        assert!(blocks.windows(2).all(|w| w[0] == w[1]));
    }

    #[test_log::test]
    fn chosen_port_is_used_and_checked() {
        let space = space();
        let settings = GrowthSettings::default();
        let ops = GraphOperators::new(&space, &settings);
        let (mut graph, root) = scaffold_graph(&space);
        let mut rng = StdRng::seed_from_u64(1);
        let end = PortRef::new(BlockRef::new(Pool::Fragment, 1), 0);
        let outcome = ops
            .extend_graph(
                &mut graph,
                root,
                GrowthOptions::default().forced().with_chosen(end),
                &mut rng,
            )
            .unwrap();
        assert!(outcome
            .added
            .iter()
            .all(|v| graph.vertex(*v).unwrap().source() == Some(end.block)));

        let (mut graph, root) = scaffold_graph(&space);
        let bad = PortRef::new(BlockRef::new(Pool::Fragment, 1), 5);
        let err = ops
            .extend_graph(
                &mut graph,
                root,
                GrowthOptions::default().forced().with_chosen(bad),
                &mut rng,
            )
            .unwrap_err();
        assert_eq!(*err.current_context(), OperatorError::Index);
    }

    #[test_log::test]
    fn zero_growth_probability_adds_nothing() {
        let space = space();
        let settings = GrowthSettings::default().with_growth(ProbabilityScheme::Sigma {
            steepness: 100.0,
            middle: -10.0,
        });
        let ops = GraphOperators::new(&space, &settings);
        let (mut graph, root) = scaffold_graph(&space);
        let mut rng = StdRng::seed_from_u64(3);
        let outcome = ops
            .extend_graph(&mut graph, root, GrowthOptions::recursive(), &mut rng)
            .unwrap();
        assert!(!outcome.grew());
        assert_eq!(graph.vertex_count(), 1);
    }

    #[test_log::test]
    fn recursive_growth_terminates_with_a_consistent_tree() {
        let space = space();
        let settings = GrowthSettings::default();
        let ops = GraphOperators::new(&space, &settings);
        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            let graph = ops
                .construct_graph(Some(0), None, &mut rng)
                .unwrap()
                .unwrap();
            graph.check_consistency().unwrap();
            assert!(graph.vertex_count() >= 1);
        }
    }

    #[test_log::test]
    fn chains_from_the_root_dictate_the_next_block() {
        let space = space();
        let settings = GrowthSettings::default()
            .with_ring_closures(RingClosureSettings::enabled().with_closable_chain_bias(true));
        let ops = GraphOperators::new(&space, &settings);
        let (mut graph, root) = scaffold_graph(&space);
        // scaffold port 2 continues into the linker's port 0; port 0 ends the chain
        graph.set_closable_chains(vec![
            ClosableChain::parse("0/0/ap0ap2_0/1/ap0ap1_%0").unwrap(),
        ]);
        let mut rng = StdRng::seed_from_u64(5);
        assert_eq!(
            ops.chain_candidates(&graph, ApRef::new(root, 2), &mut rng)
                .unwrap(),
            ChainSelection::Attach {
                port: PortRef::new(BlockRef::new(Pool::Fragment, 0), 0),
                incompatible: vec![],
            }
        );
        assert_eq!(
            ops.chain_candidates(&graph, ApRef::new(root, 0), &mut rng)
                .unwrap(),
            ChainSelection::Terminal
        );
        assert_eq!(
            ops.chain_candidates(&graph, ApRef::new(root, 1), &mut rng)
                .unwrap(),
            ChainSelection::NoCandidate
        );
    }

    #[test_log::test]
    fn diverging_chains_are_dropped_after_a_guided_attachment() {
        let space = space();
        let settings = GrowthSettings::default()
            .with_ring_closures(RingClosureSettings::enabled().with_closable_chain_bias(true));
        let ops = GraphOperators::new(&space, &settings);
        let (mut graph, root) = scaffold_graph(&space);
        graph.set_closable_chains(vec![
            ClosableChain::parse("0/0/ap0ap2_0/1/ap0ap1_%0").unwrap(),
            ClosableChain::parse("0/0/ap0ap2_1/1/ap0ap0_%0").unwrap(),
        ]);
        let mut rng = StdRng::seed_from_u64(9);
        let ChainSelection::Attach { port, incompatible } = ops
            .chain_candidates(&graph, ApRef::new(root, 2), &mut rng)
            .unwrap()
        else {
            panic!("expected a chain-guided attachment");
        };
        assert_eq!(incompatible.len(), 1);
        assert_ne!(incompatible[0], if port.block.index == 0 { 0 } else { 1 });

        let child = space.library().get_block(port.block.pool, port.block.index).unwrap();
        let id = graph
            .append_vertex_on_ap(ApRef::new(root, 2), child, port.ap, Default::default())
            .unwrap();
        graph.remove_closable_chains(&incompatible);
        assert_eq!(graph.closable_chains().len(), 1);
        // below the root, the remaining chain either ends or continues from the new vertex
        let free = graph.vertex(id).unwrap().free_aps().next().map(|ap| ap.index());
        if let Some(ap) = free {
            assert_eq!(
                ops.chain_candidates(&graph, ApRef::new(id, ap), &mut rng)
                    .unwrap(),
                ChainSelection::Terminal
            );
        }
    }
}
