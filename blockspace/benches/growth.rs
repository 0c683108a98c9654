use blockspace::{
    BlockLibrary, BlockSpace, BuildingBlock, CompatibilityRegistry, GraphOperators, GrowthSettings,
    IdGenerator, MutationKind, ProbabilityScheme,
};
use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::sync::Arc;

fn space(fragments: usize) -> BlockSpace {
    let mut pool = Vec::new();
    for i in 0..fragments {
        let mut block = BuildingBlock::fragment(format!("f{i}"));
        for _ in 0..(1 + i % 4) {
            block = block.with_port("A");
        }
        pool.push(block);
    }
    let library = BlockLibrary::new(
        Arc::new(IdGenerator::new()),
        vec![
            BuildingBlock::fragment("core")
                .with_port("A")
                .with_port("A")
                .with_port("A")
                .with_symmetric_ports([0, 1, 2]),
        ],
        pool,
        vec![BuildingBlock::fragment("H").with_port("cap")],
    )
    .expect("benchmark library is valid");
    let mut rules = CompatibilityRegistry::builder();
    rules
        .compatibility("A", ["A"])
        .bond_order("cap", 1)
        .capping("A", "cap");
    BlockSpace::new(library, rules.build().expect("benchmark rules are valid"))
}

fn criterion_benchmark(c: &mut Criterion) {
    for lambda in [0.5, 1.0, 2.0] {
        let space = space(12);
        let settings = GrowthSettings::default()
            .with_growth(ProbabilityScheme::ExpDiff { lambda })
            .with_symmetry_probability(0.5);
        let ops = GraphOperators::new(&space, &settings);
        c.bench_with_input(
            BenchmarkId::new("construct_graph", lambda),
            &lambda,
            |b, _| {
                let mut rng = StdRng::seed_from_u64(7);
                b.iter(|| ops.construct_graph(black_box(Some(0)), None, &mut rng).unwrap());
            },
        );
    }

    let space = space(12);
    let settings = GrowthSettings::default().with_symmetry_probability(0.5);
    let ops = GraphOperators::new(&space, &settings);
    let mut rng = StdRng::seed_from_u64(11);
    let base = ops.construct_graph(Some(0), None, &mut rng).unwrap().unwrap();
    c.bench_function("mutate_random", |b| {
        b.iter(|| {
            let mut graph = base.clone();
            ops.mutate_random(&mut graph, black_box(&[] as &[MutationKind]), &mut rng)
                .unwrap()
        });
    });

    let other = ops.construct_graph(Some(0), None, &mut rng).unwrap().unwrap();
    c.bench_function("locate_crossover_points", |b| {
        b.iter(|| ops.locate_crossover_points(black_box(&base), black_box(&other)));
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
