//! Crossover: swapping branches between two graphs.

use super::{ClassifyExt, GraphOperators, OperatorError, OperatorResult};
use crate::graph::{Edge, Graph, GraphError};
use crate::ids::VertexId;
use crate::registry::BondOrder;
use crate::util::log;
use crate::vertex::ApRef;
use error_stack::{ResultExt, report};
use rand::Rng;
use rand::seq::IndexedRandom;

/// A pair of branch roots, one per graph, whose branches may be exchanged.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CrossoverPoint {
    pub male: VertexId,
    pub female: VertexId,
}

/// Where one side of a crossover receives the other side's branch.
struct GraftSites {
    sites: Vec<ApRef>,
    root_ap: usize,
    bond_order: BondOrder,
}

impl GraphOperators<'_> {
    /// Every pair of non-capping vertices, one per graph, built from different blocks and whose
    /// parent edges are compatible crosswise: each parent port accepts the other vertex's port.
    pub fn locate_crossover_points(&self, male: &Graph, female: &Graph) -> Vec<CrossoverPoint> {
        let mut points = Vec::new();
        for male_edge in male.edges() {
            let Some(male_vertex) = male.vertex(male_edge.target().vertex) else {
                continue;
            };
            if male_vertex.is_capping() {
                continue;
            }
            for female_edge in female.edges() {
                let Some(female_vertex) = female.vertex(female_edge.target().vertex) else {
                    continue;
                };
                if female_vertex.is_capping() {
                    continue;
                }
                if male_vertex.source().is_some() && male_vertex.source() == female_vertex.source()
                {
                    continue;
                }
                if self.crosswise_compatible(male, male_edge, female, female_edge) {
                    points.push(CrossoverPoint {
                        male: male_vertex.id(),
                        female: female_vertex.id(),
                    });
                }
            }
        }
        points
    }

    fn crosswise_compatible(&self, male: &Graph, em: &Edge, female: &Graph, ef: &Edge) -> bool {
        let registry = self.space.registry();
        let class = |graph: &Graph, ap: ApRef| graph.ap(ap).ok().map(|ap| *ap.class());
        let (Some(ms), Some(mt), Some(fs), Some(ft)) = (
            class(male, em.source()),
            class(male, em.target()),
            class(female, ef.source()),
            class(female, ef.target()),
        ) else {
            return false;
        };
        registry.is_compatible(&ms, &ft) && registry.is_compatible(&fs, &mt)
    }

    /// Exchanges the branch rooted at `mvid` in `male` with the branch rooted at `fvid` in
    /// `female`.
    ///
    /// Branches of the symmetric partners of either vertex are removed first; their attachment
    /// sites receive copies of the incoming branch, and all copies grafted into one graph join
    /// one symmetric set. Fails without touching either graph when a vertex is missing or has no
    /// parent.
    pub fn crossover(
        &self,
        male: &mut Graph,
        mvid: VertexId,
        female: &mut Graph,
        fvid: VertexId,
    ) -> OperatorResult<()> {
        let em = parent_edge(male, mvid)?;
        let ef = parent_edge(female, fvid)?;
        let registry = self.space.registry();
        let male_bond = registry.bond_order(male.ap(em.source()).classified()?.class());
        let female_bond = registry.bond_order(female.ap(ef.source()).classified()?.class());

        let male_sites = clear_symmetric_branches(male, mvid, em)?;
        let female_sites = clear_symmetric_branches(female, fvid, ef)?;
        log::debug!(
            "Crossover {:?}/{mvid:?} x {:?}/{fvid:?} on {} and {} sites",
            male.id(),
            female.id(),
            male_sites.len(),
            female_sites.len()
        );

        let ids = self.ids();
        let male_branch = male.extract_subgraph(mvid, ids).classified()?;
        let female_branch = female.extract_subgraph(fvid, ids).classified()?;

        let into_male = GraftSites {
            sites: male_sites,
            root_ap: ef.target().index,
            bond_order: male_bond,
        };
        let into_female = GraftSites {
            sites: female_sites,
            root_ap: em.target().index,
            bond_order: female_bond,
        };
        graft(self, male, &female_branch, into_male)
            .attach_printable_lazy(|| format!("grafting female branch into {:?}", male.id()))?;
        graft(self, female, &male_branch, into_female)
            .attach_printable_lazy(|| format!("grafting male branch into {:?}", female.id()))?;
        Ok(())
    }

    /// Crossover at a uniformly chosen point. Returns `false`, changing nothing, when the graphs
    /// have no crossover point.
    pub fn crossover_random<R: Rng + ?Sized>(
        &self,
        male: &mut Graph,
        female: &mut Graph,
        rng: &mut R,
    ) -> OperatorResult<bool> {
        let points = self.locate_crossover_points(male, female);
        let Some(point) = points.choose(rng).copied() else {
            log::info!(
                "No crossover possible between {:?} and {:?}",
                male.id(),
                female.id()
            );
            return Ok(false);
        };
        self.crossover(male, point.male, female, point.female)?;
        Ok(true)
    }
}

fn parent_edge(graph: &Graph, vertex: VertexId) -> OperatorResult<Edge> {
    graph.try_vertex(vertex).classified()?;
    graph
        .edge_to_parent(vertex)
        .copied()
        .ok_or_else(|| report!(GraphError::NoParent(vertex)))
        .change_context(OperatorError::StructuralInconsistency)
}

/// Removes the branches of `vertex`'s symmetric partners and returns every site where the
/// incoming branch goes: the partners' former parent ports, then `vertex`'s own.
fn clear_symmetric_branches(
    graph: &mut Graph,
    vertex: VertexId,
    edge: Edge,
) -> OperatorResult<Vec<ApRef>> {
    let mut sites = Vec::new();
    for partner in graph.symmetric_partners(vertex) {
        if partner == vertex || !graph.contains_vertex(partner) {
            continue;
        }
        if graph.branch(partner).contains(&vertex) {
            continue;
        }
        let Some(partner_edge) = graph.edge_to_parent(partner).copied() else {
            continue;
        };
        graph.remove_branch(partner).classified()?;
        sites.push(partner_edge.source());
    }
    sites.push(edge.source());
    sites.retain(|site| graph.contains_vertex(site.vertex));
    Ok(sites)
}

fn graft(
    ops: &GraphOperators<'_>,
    graph: &mut Graph,
    branch: &Graph,
    into: GraftSites,
) -> OperatorResult<()> {
    graph
        .append_subgraph(
            &into.sites,
            branch,
            into.root_ap,
            into.bond_order,
            false,
            ops.ids(),
        )
        .classified()?;
    Ok(())
}
