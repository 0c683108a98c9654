mod util;

use blockspace::{BondOrder, GraphOperators, GrowthOptions, GrowthSettings, ProbabilityScheme};
use util::*;

#[test_log::test]
fn scaffold_without_fragments_is_fully_capped() {
    let space = scaffold_and_cap_space();
    let settings = GrowthSettings::default().with_enforced_symmetry(true);
    let ops = GraphOperators::new(&space, &settings);

    let graph = ops
        .construct_graph_with(Some(0), GrowthOptions::recursive().forced(), None, &mut rng(3))
        .unwrap()
        .expect("no forbidden ends are configured");

    assert_eq!(graph.vertex_count(), 4);
    assert_eq!(graph.edge_count(), 3);
    let root = graph.root().unwrap();
    let caps = graph.children(root);
    assert_eq!(caps.len(), 3);
    for cap in caps {
        assert!(graph.vertex(cap).unwrap().is_capping());
        assert_eq!(graph.edge_to_parent(cap).unwrap().bond_order(), BondOrder(1));
    }
    assert!(graph.free_aps().is_empty());
}

#[test_log::test]
fn symmetric_scaffolds_grow_one_set_per_port_group() {
    let space = branching_space();
    let settings = GrowthSettings::default().with_enforced_symmetry(true);
    let ops = GraphOperators::new(&space, &settings);

    for k in 2..=4 {
        let (mut graph, root) = rooted(&space, k - 2);
        let outcome = ops
            .extend_graph(&mut graph, root, GrowthOptions::default().forced(), &mut rng(k as u64))
            .unwrap();
        graph.check_consistency().unwrap();

        assert_eq!(outcome.added.len(), k);
        assert_eq!(graph.symmetric_sets().len(), 1);
        let set = &graph.symmetric_sets()[0];
        assert_eq!(set.len(), k);
        assert!(outcome.added.iter().all(|v| set.contains(*v)));
        let sources: Vec<_> = outcome
            .added
            .iter()
            .map(|v| graph.vertex(*v).unwrap().source())
            .collect();
        assert!(sources.windows(2).all(|w| w[0] == w[1]));
    }
}

#[test_log::test]
fn forced_growth_fills_every_compatible_port() {
    let space = branching_space();
    let settings = GrowthSettings::default();
    let ops = GraphOperators::new(&space, &settings);

    for seed in 0..10 {
        let (mut graph, root) = rooted(&space, 1);
        let outcome = ops
            .extend_graph(&mut graph, root, GrowthOptions::default().forced(), &mut rng(seed))
            .unwrap();
        assert_eq!(outcome.added.len(), 3, "seed {seed}");
        assert!(graph.symmetric_sets().is_empty());
        assert_eq!(graph.children(root).len(), 3);
    }
}

#[test_log::test]
fn symmetry_on_aps_overrides_the_settings() {
    let space = branching_space();
    let settings = GrowthSettings::default().with_symmetry_probability(0.0);
    let ops = GraphOperators::new(&space, &settings);

    let (mut graph, root) = rooted(&space, 2);
    let options = GrowthOptions::default().forced().with_symmetry_on_aps(true);
    let outcome = ops.extend_graph(&mut graph, root, options, &mut rng(11)).unwrap();
    assert_eq!(outcome.added.len(), 4);
    assert_eq!(graph.symmetric_sets().len(), 1);
}

#[test_log::test]
fn unforced_growth_stops_where_probability_vanishes() {
    let space = branching_space();
    let settings = GrowthSettings::default()
        .with_growth(ProbabilityScheme::Sigma {
            steepness: 100.0,
            middle: 1.5,
        })
        .with_crowding(ProbabilityScheme::Unrestricted);
    let ops = GraphOperators::new(&space, &settings);

    for seed in 0..10 {
        let graph = ops
            .construct_graph(Some(0), None, &mut rng(seed))
            .unwrap()
            .unwrap();
        graph.check_consistency().unwrap();
        // only the root and level 0 grow; caps on level 1 sit at level 2
        assert!(graph.vertices().all(|v| v.level() <= 2), "seed {seed}");
    }
}
