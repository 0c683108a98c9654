#![allow(dead_code)]

use blockspace::{
    ApRef, BlockLibrary, BlockSpace, BondOrder, BuildingBlock, CompatibilityRegistry, Graph,
    IdGenerator, Pool, VertexId,
};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::sync::Arc;

pub fn rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

/// Rules shared by the fixtures: `A` joins `A`, `A` is capped by `H`-type ports of class `cap`.
pub fn rules() -> CompatibilityRegistry {
    let mut rules = CompatibilityRegistry::builder();
    rules
        .compatibility("A", ["A"])
        .bond_order("cap", 1)
        .capping("A", "cap");
    rules.build().unwrap()
}

/// A `k`-port scaffold whose ports are all symmetric.
pub fn symmetric_scaffold(k: usize) -> BuildingBlock {
    let mut block = BuildingBlock::fragment(format!("core{k}"));
    for _ in 0..k {
        block = block.with_port("A");
    }
    block.with_symmetric_ports(0..k)
}

pub fn cap() -> BuildingBlock {
    BuildingBlock::fragment("H").with_port("cap")
}

/// One symmetric 3-port scaffold, no fragments, one capping block.
pub fn scaffold_and_cap_space() -> BlockSpace {
    let library = BlockLibrary::new(
        Arc::new(IdGenerator::new()),
        vec![symmetric_scaffold(3)],
        vec![],
        vec![cap()],
    )
    .unwrap();
    BlockSpace::new(library, rules())
}

/// Scaffolds with 2 to 4 symmetric ports and a few fragments of different shapes.
pub fn branching_space() -> BlockSpace {
    let library = BlockLibrary::new(
        Arc::new(IdGenerator::new()),
        vec![symmetric_scaffold(2), symmetric_scaffold(3), symmetric_scaffold(4)],
        vec![
            BuildingBlock::fragment("linker").with_port("A").with_port("A"),
            BuildingBlock::fragment("fork")
                .with_port("A")
                .with_port("A")
                .with_port("A")
                .with_symmetric_ports([1, 2]),
            BuildingBlock::fragment("end").with_port("A"),
        ],
        vec![cap()],
    )
    .unwrap();
    BlockSpace::new(library, rules())
}

/// A graph holding only an instance of scaffold `index`.
pub fn rooted(space: &BlockSpace, index: usize) -> (Graph, VertexId) {
    let mut graph = Graph::new(space.ids());
    let root = graph
        .add_vertex(space.library().get_block(Pool::Scaffold, index).unwrap())
        .unwrap();
    (graph, root)
}

/// Attaches fragment `block` through its port 0 to `site`.
pub fn attach(space: &BlockSpace, graph: &mut Graph, site: ApRef, block: usize) -> VertexId {
    graph
        .append_vertex_on_ap(
            site,
            space.library().get_block(Pool::Fragment, block).unwrap(),
            0,
            BondOrder::SINGLE,
        )
        .unwrap()
}
