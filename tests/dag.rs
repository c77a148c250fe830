//! Graph construction and validation scenarios.

use rustc_hash::FxHashMap;

use phaseflow::dag::{Dag, DagError};
use phaseflow::expr::parse_exprs;

fn build(exprs: &[&str]) -> Result<Dag, DagError> {
    let parsed = parse_exprs(exprs).expect("parse");
    let mut dag = Dag::new();
    dag.add_node_links(&parsed.edges, &parsed.standalone, &FxHashMap::default())?;
    dag.init(|_| true)?;
    Ok(dag)
}

#[test]
fn empty_graph() {
    let mut dag = Dag::new();
    let err = dag.init(|_| true).unwrap_err();
    assert_eq!(err, DagError::EmptyNodes);
    assert_eq!(err.code(), 80005);
}

#[test]
fn disconnected_graph() {
    // The a->b->c->a cycle is isolated, so the walk from the synthetic start
    // only reaches d and the connectivity check fires first.
    let err = build(&["a->b", "b->c", "c->a", "d"]).unwrap_err();
    assert_eq!(err, DagError::NotConnected);
    assert_eq!(err.code(), 80004);
}

#[test]
fn cyclic_graph() {
    let err = build(&["a->b", "b->c", "c->d", "d->b", "e"]).unwrap_err();
    assert_eq!(err, DagError::HasCircle);
    assert_eq!(err.code(), 80003);
}

#[test]
fn normal_graph() {
    let dag = build(&["a->b", "b->c", "b->d", "e"]).expect("valid graph");

    // a, b, c, d, e plus the synthetic endpoints.
    assert_eq!(dag.len(), 7);
    assert_eq!(dag.node(dag.start_id()).full_name(), "StartPhase");
    assert_eq!(dag.node(dag.end_id()).full_name(), "EndPhase");

    // The initial frontier is a and e.
    let mut ready = Vec::new();
    dag.pop(dag.start_id(), &mut ready).expect("pop start");
    let mut names: Vec<&str> = ready.iter().map(|&id| dag.node(id).name()).collect();
    names.sort_unstable();
    assert_eq!(names, vec!["a", "e"]);

    // Both depend on the synthetic start alone.
    let parents = dag.dep_nodes(ready[0]);
    assert_eq!(parents.len(), 1);
    assert_eq!(dag.node(parents[0]).name(), "StartPhase");
}

#[test]
fn pop_yields_nothing_until_all_parents_completed() {
    let dag = build(&["a->c", "b->c"]).expect("valid graph");
    let mut ready = Vec::new();
    dag.pop(dag.start_id(), &mut ready).expect("pop start");
    assert_eq!(ready.len(), 2);

    // After only one parent of c finishes, nothing is ready.
    let (a, b) = (ready[0], ready[1]);
    let mut next = Vec::new();
    assert_eq!(dag.pop(a, &mut next), Err(DagError::NoReadyNodes));
    assert!(next.is_empty());

    // The second parent releases c.
    dag.pop(b, &mut next).expect("pop second parent");
    assert_eq!(next.len(), 1);
    assert_eq!(dag.node(next[0]).name(), "c");
}

#[test]
fn alias_map_resolves_full_names() {
    let parsed = parse_exprs(&["a->b"]).expect("parse");
    let mut alias = FxHashMap::default();
    alias.insert("a".to_string(), "APhase".to_string());
    alias.insert("b".to_string(), "BPhase(redo:true)".to_string());
    let mut dag = Dag::new();
    dag.add_node_links(&parsed.edges, &parsed.standalone, &alias)
        .expect("links");
    dag.init(|_| true).expect("init");

    let b = dag.nodes().find(|n| n.name() == "b").expect("node b");
    assert_eq!(b.full_name(), "BPhase(redo:true)");
    // Synthetic endpoints resolve to themselves.
    assert_eq!(dag.node(dag.start_id()).full_name(), "StartPhase");
}
