use blockspace::{BlockSpace, GraphOperators, IdGenerator, PortClass};
use blockspace_syntax::{LoadError, blocks, rules, settings};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::sync::Arc;

const RULES: &str = "\
# linkers bond to anything A-like
RCN A:0 A:0,A:1
RCN A:1 A:0
RBO A:0 SINGLE
RBO A:1 1
RBO cap:0 1
CAP A:0 cap:0
CAP A:1 cap:0
SYM A:0 1.0
";

const BLOCKS: &str = "\
scaffold core ports(A:0, A:0, A:0) sym(0 1 2)
fragment linker ports(A:0, A:1)
fragment end ports(A:0)
capping H ports(cap:0)
";

const SETTINGS: &str = "\
FS-GrowthProbScheme=TANH
FS-GrowthMultiplier=0.8
FS-SymmetryProbability=0.3
";

#[test_log::test]
fn loaded_space_grows_capped_graphs() {
    let registry = rules::load_rules(RULES).unwrap();
    let library = blocks::load_blocks(BLOCKS, Arc::new(IdGenerator::new())).unwrap();
    let settings = settings::load_settings(SETTINGS).unwrap();
    assert!(registry.is_compatible(&PortClass::from("A:1"), &PortClass::from("A:0")));
    assert!(!registry.is_compatible(&PortClass::from("A:1"), &PortClass::from("A:1")));

    let space = BlockSpace::new(library, registry);
    let ops = GraphOperators::new(&space, &settings);
    let mut rng = StdRng::seed_from_u64(9);
    for _ in 0..10 {
        let graph = ops.construct_graph(None, None, &mut rng).unwrap().unwrap();
        graph.check_consistency().unwrap();
        assert!(graph.free_aps().is_empty());
        // every class-A:0 port of the core is symmetric, so growth on it is all or nothing
        let root = graph.root().unwrap();
        let kinds: Vec<_> = graph
            .children(root)
            .iter()
            .map(|c| graph.vertex(*c).unwrap().source())
            .collect();
        assert_eq!(kinds.len(), 3);
        assert!(kinds.windows(2).all(|w| w[0] == w[1]));
    }
}

#[test_log::test]
fn syntax_errors_are_counted_in_the_report() {
    let err = rules::load_rules("RCN A\nRBO A one\n").unwrap_err();
    assert_eq!(err.current_context(), &LoadError::Syntax(2));
}

#[test_log::test]
fn semantic_errors_surface_as_their_own_context() {
    // capping class never defined
    let err = rules::load_rules("RCN A A\nCAP A cap\n").unwrap_err();
    assert_eq!(err.current_context(), &LoadError::Rules);

    let err = blocks::load_blocks("capping H ports(cap, cap)\n", Arc::new(IdGenerator::new()))
        .unwrap_err();
    assert_eq!(err.current_context(), &LoadError::Library);
}
