mod util;

#[cfg(feature = "serde")]
use blockspace::{
    ApRef, BondOrder, Edge, Graph, GraphOperators, GrowthSettings, RingClosureSettings,
};
#[cfg(feature = "serde")]
use util::*;

#[cfg(feature = "serde")]
#[test_log::test]
fn graph_round_trips_through_json() {
    let space = branching_space();
    let settings = GrowthSettings::default().with_symmetry_probability(0.7);
    let ops = GraphOperators::new(&space, &settings);
    let graph = ops
        .construct_graph(Some(2), None, &mut rng(42))
        .unwrap()
        .unwrap();

    let serialized = serde_json::to_string_pretty(&graph).unwrap();
    eprintln!("Serialized graph: {}", serialized);
    let deserialized: Graph = serde_json::from_str(&serialized).unwrap();

    deserialized.check_consistency().unwrap();
    assert_eq!(deserialized.id(), graph.id());
    assert_eq!(deserialized.vertex_ids(), graph.vertex_ids());
    let edges: Vec<_> = graph.edges().copied().collect();
    let mut restored: Vec<_> = deserialized.edges().copied().collect();
    restored.retain(|e| edges.contains(e));
    assert_eq!(restored.len(), edges.len());
    assert_eq!(deserialized.edge_count(), graph.edge_count());
    assert_eq!(
        deserialized.symmetric_sets().len(),
        graph.symmetric_sets().len()
    );
    for v in graph.vertex_ids() {
        assert_eq!(
            deserialized.vertex(*v).unwrap().level(),
            graph.vertex(*v).unwrap().level()
        );
    }
    assert_eq!(deserialized.free_aps(), graph.free_aps());
}

#[cfg(feature = "serde")]
#[test_log::test]
fn settings_round_trip_through_json() {
    let settings = GrowthSettings::default()
        .with_enforced_symmetry(true)
        .with_ring_closures(RingClosureSettings::enabled().with_closable_chain_bias(true));
    let serialized = serde_json::to_string(&settings).unwrap();
    let deserialized: GrowthSettings = serde_json::from_str(&serialized).unwrap();
    assert_eq!(deserialized, settings);
}

#[cfg(feature = "serde")]
#[test_log::test]
fn tampered_graph_documents_are_rejected() {
    let space = branching_space();
    let settings = GrowthSettings::default();
    let ops = GraphOperators::new(&space, &settings);
    let graph = ops
        .construct_graph(Some(0), None, &mut rng(1))
        .unwrap()
        .unwrap();
    let mut doc: serde_json::Value = serde_json::to_value(&graph).unwrap();
    // a second edge into an already attached port
    let edges = doc["edges"].as_array_mut().unwrap();
    let first = edges[0].clone();
    edges.push(first);
    assert!(serde_json::from_value::<Graph>(doc).is_err());
}

#[cfg(feature = "serde")]
#[test_log::test]
fn cyclic_graph_documents_are_rejected() {
    let space = branching_space();
    let (mut graph, root) = rooted(&space, 0);
    let linker = attach(&space, &mut graph, ApRef::new(root, 0), 0);
    let mut doc: serde_json::Value = serde_json::to_value(&graph).unwrap();
    assert!(serde_json::from_value::<Graph>(doc.clone()).is_ok());

    // the linker's free port bonded back to the root
    let back = Edge::new(ApRef::new(linker, 1), ApRef::new(root, 1), BondOrder::SINGLE);
    let edges = doc["edges"].as_array_mut().unwrap();
    edges.push(serde_json::to_value(back).unwrap());
    assert!(serde_json::from_value::<Graph>(doc.clone()).is_err());

    // replayed in the other order the cycle is still caught
    doc["edges"].as_array_mut().unwrap().reverse();
    assert!(serde_json::from_value::<Graph>(doc).is_err());
}
