mod util;

use blockspace::{
    ApRef, BlockRef, Graph, GraphOperators, GrowthSettings, Pool, PortClass, SymmetricVertices,
    VertexId,
};
use util::*;

#[test_log::test]
fn symmetric_branches_are_exchanged_together() {
    let space = branching_space();
    let settings = GrowthSettings::default();
    let ops = GraphOperators::new(&space, &settings);

    // two symmetric linkers on a 2-port scaffold
    let (mut male, male_root) = rooted(&space, 0);
    let a = attach(&space, &mut male, ApRef::new(male_root, 0), 0);
    let b = attach(&space, &mut male, ApRef::new(male_root, 1), 0);
    male.add_symmetric_set(SymmetricVertices::new([a, b])).unwrap();

    // a single end on a 3-port scaffold
    let (mut female, female_root) = rooted(&space, 1);
    let end = attach(&space, &mut female, ApRef::new(female_root, 0), 2);

    ops.crossover(&mut male, a, &mut female, end).unwrap();
    male.check_consistency().unwrap();
    female.check_consistency().unwrap();

    let ends = male.children(male_root);
    assert_eq!(male.vertex_count(), 3);
    assert_eq!(ends.len(), 2);
    for v in &ends {
        assert_eq!(
            male.vertex(*v).unwrap().source(),
            Some(BlockRef::new(Pool::Fragment, 2))
        );
    }
    assert_eq!(male.symmetric_sets().len(), 1);
    assert!(male.symmetric_set_of(ends[0]).unwrap().contains(ends[1]));

    let linkers = female.children(female_root);
    assert_eq!(female.vertex_count(), 2);
    assert_eq!(linkers.len(), 1);
    assert_eq!(
        female.vertex(linkers[0]).unwrap().source(),
        Some(BlockRef::new(Pool::Fragment, 0))
    );
    assert!(female.symmetric_sets().is_empty());
}

#[test_log::test]
fn crossover_points_skip_capping_vertices() {
    let space = branching_space();
    let settings = GrowthSettings::default();
    let ops = GraphOperators::new(&space, &settings);
    let mut r = rng(17);
    let male = ops.construct_graph(Some(0), None, &mut r).unwrap().unwrap();
    let female = ops.construct_graph(Some(2), None, &mut r).unwrap().unwrap();

    for point in ops.locate_crossover_points(&male, &female) {
        let m = male.vertex(point.male).unwrap();
        let f = female.vertex(point.female).unwrap();
        assert!(!m.is_capping() && !f.is_capping());
        assert_ne!(m.source(), f.source());
    }
}

/// What a graph is made of, independent of vertex ids: the blocks, the classes of the parent
/// ports every edge hangs from, and the sizes of the symmetric sets.
fn composition(graph: &Graph) -> (Vec<Option<BlockRef>>, Vec<PortClass>, Vec<usize>) {
    let mut blocks: Vec<_> = graph.vertices().map(|v| v.source()).collect();
    blocks.sort();
    let mut parent_ports: Vec<_> = graph
        .edges()
        .map(|e| *graph.ap(e.source()).unwrap().class())
        .collect();
    parent_ports.sort();
    let mut sets: Vec<_> = graph.symmetric_sets().iter().map(|s| s.len()).collect();
    sets.sort();
    (blocks, parent_ports, sets)
}

/// Crosses `male` and `female` both ways round and checks each graph ends up the same.
fn assert_role_swap_is_equivalent(
    ops: &GraphOperators<'_>,
    male: &Graph,
    m: VertexId,
    female: &Graph,
    f: VertexId,
) {
    let (mut male_a, mut female_a) = (male.clone(), female.clone());
    ops.crossover(&mut male_a, m, &mut female_a, f).unwrap();
    let (mut male_b, mut female_b) = (male.clone(), female.clone());
    ops.crossover(&mut female_b, f, &mut male_b, m).unwrap();

    for g in [&male_a, &female_a, &male_b, &female_b] {
        g.check_consistency().unwrap();
    }
    assert_eq!(composition(&male_a), composition(&male_b));
    assert_eq!(composition(&female_a), composition(&female_b));
    assert_ne!(composition(&male_a), composition(male));
}

#[test_log::test]
fn swapping_roles_exchanges_the_same_branches() {
    let space = branching_space();
    let settings = GrowthSettings::default();
    let ops = GraphOperators::new(&space, &settings);

    // linker with an end below it on a 2-port scaffold
    let (mut male, male_root) = rooted(&space, 0);
    let linker = attach(&space, &mut male, ApRef::new(male_root, 0), 0);
    attach(&space, &mut male, ApRef::new(linker, 1), 2);

    // a fork on a 3-port scaffold
    let (mut female, female_root) = rooted(&space, 1);
    let fork = attach(&space, &mut female, ApRef::new(female_root, 1), 1);

    assert_role_swap_is_equivalent(&ops, &male, linker, &female, fork);
}

#[test_log::test]
fn swapping_roles_with_symmetric_partners_on_both_sides() {
    let space = branching_space();
    let settings = GrowthSettings::default();
    let ops = GraphOperators::new(&space, &settings);

    let (mut male, male_root) = rooted(&space, 0);
    let a = attach(&space, &mut male, ApRef::new(male_root, 0), 0);
    let b = attach(&space, &mut male, ApRef::new(male_root, 1), 0);
    male.add_symmetric_set(SymmetricVertices::new([a, b])).unwrap();

    // two symmetric ends and an unrelated linker
    let (mut female, female_root) = rooted(&space, 1);
    let e1 = attach(&space, &mut female, ApRef::new(female_root, 0), 2);
    let e2 = attach(&space, &mut female, ApRef::new(female_root, 1), 2);
    attach(&space, &mut female, ApRef::new(female_root, 2), 0);
    female.add_symmetric_set(SymmetricVertices::new([e1, e2])).unwrap();

    assert_role_swap_is_equivalent(&ops, &male, b, &female, e1);

    let (mut male, mut female) = (male, female);
    ops.crossover(&mut female, e1, &mut male, b).unwrap();
    let linker = BlockRef::new(Pool::Fragment, 0);
    let end = BlockRef::new(Pool::Fragment, 2);
    assert_eq!(
        composition(&male).0,
        vec![Some(BlockRef::new(Pool::Scaffold, 0)), Some(end), Some(end)]
    );
    assert_eq!(composition(&male).2, vec![2]);
    let (blocks, _, sets) = composition(&female);
    assert_eq!(blocks.iter().filter(|s| **s == Some(linker)).count(), 3);
    assert_eq!(sets, vec![2]);
}
