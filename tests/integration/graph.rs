// tests/integration/graph.rs

use parbuild::dag::DagGraph;
use parbuild::errors::BuildError;
use parbuild_test_utils::builders::task;

#[test]
fn adjacency_in_both_directions() {
    let specs = [
        task("A", &[]),
        task("B", &["A"]),
        task("C", &["A"]),
        task("D", &["B", "C"]),
    ];
    let graph = DagGraph::from_specs(&specs);

    assert_eq!(graph.dependencies_of("D"), ["B", "C"]);
    assert_eq!(graph.dependents_of("A"), ["B", "C"]);
    assert!(graph.dependents_of("D").is_empty());
    assert!(graph.dependencies_of("missing").is_empty());

    let mut downstream = graph.transitive_dependents("A");
    downstream.sort();
    assert_eq!(downstream, vec!["B", "C", "D"]);
    assert!(graph.validate().is_ok());
}

#[test]
fn topological_order_respects_every_edge() {
    let specs = [
        task("link", &["compile-a", "compile-b"]),
        task("compile-a", &["configure"]),
        task("compile-b", &["configure"]),
        task("configure", &[]),
    ];
    let order = DagGraph::from_specs(&specs).topological_order().unwrap();
    let pos = |id: &str| order.iter().position(|t| t == id).unwrap();

    for spec in &specs {
        for dep in &spec.deps {
            assert!(pos(dep.as_str()) < pos(spec.id.as_str()), "{dep} must come before {}", spec.id);
        }
    }
}

#[test]
fn validate_reports_cycles_and_unknown_dependencies() {
    let cyclic = [task("A", &["B"]), task("B", &["A"])];
    assert!(matches!(
        DagGraph::from_specs(&cyclic).validate(),
        Err(BuildError::CyclicDependency(msg)) if msg.contains("cycle detected")
    ));

    let dangling = [task("A", &["ghost"])];
    assert!(matches!(
        DagGraph::from_specs(&dangling).validate(),
        Err(BuildError::UnknownTask(msg)) if msg.contains("ghost")
    ));
}
