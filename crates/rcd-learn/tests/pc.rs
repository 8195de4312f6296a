use rcd_core::{Model, RelationalVariable, Schema};
use rcd_learn::{Oracle, Pc, RcdError, SepsetMap, VariableGraph};
use std::collections::BTreeSet;

fn single_entity(attrs: &[&str]) -> Schema {
    let mut schema = Schema::new();
    schema.add_entity("A").unwrap();
    for attr in attrs {
        schema.add_attribute("A", *attr, None).unwrap();
    }
    schema
}

fn oracle_pc(schema: &Schema, model_deps: &[&str]) -> Pc<Oracle> {
    let model = Model::parse(schema.clone(), model_deps).unwrap();
    Pc::new(schema.clone(), Oracle::new(model, 0))
}

fn var(s: &str) -> RelationalVariable {
    s.parse().unwrap()
}

fn nodes(graph: &VariableGraph) -> BTreeSet<String> {
    graph.node_weights().map(ToString::to_string).collect()
}

fn edges(graph: &VariableGraph) -> BTreeSet<(String, String)> {
    graph
        .raw_edges()
        .iter()
        .map(|e| (graph[e.source()].to_string(), graph[e.target()].to_string()))
        .collect()
}

fn strs(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(ToString::to_string).collect()
}

fn arcs(pairs: &[(&str, &str)]) -> BTreeSet<(String, String)> {
    pairs.iter().map(|(a, b)| (a.to_string(), b.to_string())).collect()
}

/// Each pair as two opposing arcs.
fn undirected(pairs: &[(&str, &str)]) -> BTreeSet<(String, String)> {
    pairs
        .iter()
        .flat_map(|(a, b)| [(a.to_string(), b.to_string()), (b.to_string(), a.to_string())])
        .collect()
}

fn skeleton_of(vars: &[&str], pairs: &[(&str, &str)]) -> VariableGraph {
    let mut graph = VariableGraph::new();
    let idx: Vec<_> = vars.iter().map(|v| graph.add_node(var(v))).collect();
    let at = |v: &str| vars.iter().position(|n| *n == v).unwrap();
    for &(a, b) in pairs {
        graph.add_edge(idx[at(a)], idx[at(b)], ());
        graph.add_edge(idx[at(b)], idx[at(a)], ());
    }
    graph
}

#[test]
fn test_new_pc() {
    let schema = Schema::new();
    let pc = oracle_pc(&schema, &[]);
    assert_eq!(pc.schema(), &schema);
    assert_eq!(pc.rcd().hop_threshold(), 0);
    assert!(pc.undirected_skeleton().is_none());
    assert!(pc.partially_directed_graph().is_none());
    assert!(pc.sepsets().is_none());
}

#[test]
fn test_phase_one() {
    let schema = single_entity(&["X"]);
    let mut pc = oracle_pc(&schema, &[]);
    let skeleton = pc.phase_one().unwrap();
    assert_eq!(nodes(skeleton), strs(&["[A].X"]));
    assert!(edges(skeleton).is_empty());
    assert!(pc.sepsets().unwrap().is_empty());
    assert_eq!(pc.rcd().ci_record().total, 0);

    let schema = single_entity(&["X", "Y"]);
    let mut pc = oracle_pc(&schema, &[]);
    let skeleton = pc.phase_one().unwrap();
    assert_eq!(nodes(skeleton), strs(&["[A].X", "[A].Y"]));
    assert!(edges(skeleton).is_empty());
    let sepsets = pc.sepsets().unwrap();
    assert_eq!(sepsets.len(), 2);
    assert_eq!(sepsets.get(&var("[A].Y"), &var("[A].X")), Some(&BTreeSet::new()));
    assert_eq!(pc.rcd().ci_record().total, 1);

    let mut pc = oracle_pc(&schema, &["[A].X -> [A].Y"]);
    let skeleton = pc.phase_one().unwrap();
    assert_eq!(edges(skeleton), undirected(&[("[A].X", "[A].Y")]));
    assert_eq!(pc.rcd().ci_record().total, 2);

    let schema = single_entity(&["X", "Y", "Z"]);
    let mut pc = oracle_pc(&schema, &["[A].X -> [A].Y"]);
    let skeleton = pc.phase_one().unwrap();
    assert_eq!(nodes(skeleton), strs(&["[A].X", "[A].Y", "[A].Z"]));
    assert_eq!(edges(skeleton), undirected(&[("[A].X", "[A].Y")]));
    let sepsets = pc.sepsets().unwrap();
    assert_eq!(sepsets.len(), 4);
    assert_eq!(sepsets.get(&var("[A].Z"), &var("[A].X")), Some(&BTreeSet::new()));
    assert_eq!(sepsets.get(&var("[A].Y"), &var("[A].Z")), Some(&BTreeSet::new()));
    assert_eq!(pc.rcd().ci_record().total, 4);

    let mut pc = oracle_pc(&schema, &["[A].X -> [A].Z", "[A].Z -> [A].Y"]);
    let skeleton = pc.phase_one().unwrap();
    assert_eq!(edges(skeleton), undirected(&[("[A].X", "[A].Z"), ("[A].Z", "[A].Y")]));
    let sepsets = pc.sepsets().unwrap();
    assert_eq!(sepsets.len(), 2);
    assert_eq!(sepsets.get(&var("[A].X"), &var("[A].Y")), Some(&[var("[A].Z")].into()));
    assert_eq!(pc.rcd().ci_record().total, 9);
}

#[test]
fn test_phase_one_bigger_conditioning_sets() {
    let schema = single_entity(&["X", "Y", "Z", "W"]);
    let mut pc = oracle_pc(
        &schema,
        &["[A].X -> [A].Y", "[A].X -> [A].Z", "[A].Y -> [A].W", "[A].Z -> [A].W"],
    );
    let skeleton = pc.phase_one().unwrap();
    assert_eq!(
        edges(skeleton),
        undirected(&[
            ("[A].X", "[A].Y"),
            ("[A].X", "[A].Z"),
            ("[A].W", "[A].Y"),
            ("[A].W", "[A].Z"),
        ])
    );
    let sepsets = pc.sepsets().unwrap();
    assert_eq!(sepsets.len(), 4);
    assert_eq!(
        sepsets.get(&var("[A].W"), &var("[A].X")),
        Some(&[var("[A].Y"), var("[A].Z")].into())
    );
    assert_eq!(sepsets.get(&var("[A].Y"), &var("[A].Z")), Some(&[var("[A].X")].into()));
}

#[test]
fn test_phase_two() {
    let schema = single_entity(&["X"]);
    let mut pc = oracle_pc(&schema, &[]);
    pc.phase_one().unwrap();
    let pattern = pc.phase_two().unwrap();
    assert_eq!(nodes(pattern), strs(&["[A].X"]));
    assert!(edges(pattern).is_empty());

    let schema = single_entity(&["X", "Y", "Z"]);
    let cases: [(&[&str], BTreeSet<(String, String)>); 3] = [
        (&["[A].X -> [A].Y"], undirected(&[("[A].X", "[A].Y")])),
        (
            &["[A].X -> [A].Z", "[A].Y -> [A].Z"],
            arcs(&[("[A].X", "[A].Z"), ("[A].Y", "[A].Z")]),
        ),
        (
            &["[A].X -> [A].Z", "[A].Z -> [A].Y"],
            undirected(&[("[A].X", "[A].Z"), ("[A].Y", "[A].Z")]),
        ),
    ];
    for (model_deps, expected) in cases {
        let mut pc = oracle_pc(&schema, model_deps);
        pc.phase_one().unwrap();
        let pattern = pc.phase_two().unwrap();
        assert_eq!(nodes(pattern), strs(&["[A].X", "[A].Y", "[A].Z"]));
        assert_eq!(edges(pattern), expected, "model {model_deps:?}");
    }

    let schema = single_entity(&["X", "Y", "Z", "W"]);
    let mut pc = oracle_pc(&schema, &["[A].X -> [A].Z", "[A].Y -> [A].Z"]);
    pc.phase_one().unwrap();
    let pattern = pc.phase_two().unwrap();
    assert_eq!(nodes(pattern).len(), 4);
    assert_eq!(edges(pattern), arcs(&[("[A].X", "[A].Z"), ("[A].Y", "[A].Z")]));
}

#[test]
fn test_phase_two_five_attributes() {
    let schema = single_entity(&["X", "Y", "Z", "W", "V"]);
    let cases: [(&[&str], BTreeSet<(String, String)>); 5] = [
        (
            &["[A].X -> [A].Z", "[A].Y -> [A].Z", "[A].Y -> [A].W", "[A].V -> [A].W"],
            arcs(&[("[A].X", "[A].Z"), ("[A].Y", "[A].Z"), ("[A].Y", "[A].W"), ("[A].V", "[A].W")]),
        ),
        (
            &["[A].X -> [A].Z", "[A].Y -> [A].Z", "[A].Z -> [A].W", "[A].W -> [A].V"],
            arcs(&[("[A].X", "[A].Z"), ("[A].Y", "[A].Z"), ("[A].Z", "[A].W"), ("[A].W", "[A].V")]),
        ),
        (
            &["[A].X -> [A].Z", "[A].Y -> [A].Z", "[A].Z -> [A].W", "[A].Y -> [A].W"],
            arcs(&[("[A].X", "[A].Z"), ("[A].Y", "[A].Z"), ("[A].Z", "[A].W"), ("[A].Y", "[A].W")]),
        ),
        (
            &["[A].X -> [A].Y", "[A].X -> [A].W", "[A].X -> [A].Z", "[A].Y -> [A].Z", "[A].W -> [A].Z"],
            &arcs(&[("[A].X", "[A].Z"), ("[A].Y", "[A].Z"), ("[A].W", "[A].Z")])
                | &undirected(&[("[A].X", "[A].Y"), ("[A].X", "[A].W")]),
        ),
        (
            &[
                "[A].W -> [A].X",
                "[A].W -> [A].Z",
                "[A].W -> [A].Y",
                "[A].X -> [A].V",
                "[A].X -> [A].Z",
                "[A].Y -> [A].V",
                "[A].Y -> [A].Z",
                "[A].Z -> [A].V",
            ],
            &arcs(&[
                ("[A].X", "[A].V"),
                ("[A].Y", "[A].V"),
                ("[A].Z", "[A].V"),
                ("[A].Y", "[A].Z"),
                ("[A].W", "[A].Z"),
                ("[A].X", "[A].Z"),
            ]) | &undirected(&[("[A].W", "[A].X"), ("[A].W", "[A].Y")]),
        ),
    ];
    for (model_deps, expected) in cases {
        let mut pc = oracle_pc(&schema, model_deps);
        pc.phase_one().unwrap();
        let pattern = pc.phase_two().unwrap();
        assert_eq!(nodes(pattern).len(), 5);
        assert_eq!(edges(pattern), expected, "model {model_deps:?}");
    }
}

#[test]
fn test_phase_two_requires_phase_one() {
    let schema = Schema::new();
    let mut pc = oracle_pc(&schema, &[]);
    let err = pc.phase_two().unwrap_err();
    assert!(matches!(err, RcdError::PrerequisiteMissing(_)));
    assert_eq!(err.to_string(), "No undirected skeleton found. Try running Phase I first.");

    let mut pc = oracle_pc(&schema, &[]);
    pc.set_undirected_skeleton(VariableGraph::new()).unwrap();
    let err = pc.phase_two().unwrap_err();
    assert_eq!(err.to_string(), "No sepsets found. Try running Phase I first.");
}

#[test]
fn test_set_undirected_skeleton() {
    let schema = Schema::new();
    let mut pc = oracle_pc(&schema, &[]);
    pc.set_undirected_skeleton(VariableGraph::new()).unwrap();
    assert_eq!(pc.undirected_skeleton().map(VariableGraph::node_count), Some(0));
    assert_eq!(pc.rcd().undirected_dependencies().map(<[_]>::len), Some(0));

    // nodes must match the entity's attributes
    let mut stray = VariableGraph::new();
    stray.add_node(var("[A].X"));
    let err = pc.set_undirected_skeleton(stray).unwrap_err();
    assert!(matches!(err, RcdError::SkeletonNodeMismatch));
    assert_eq!(err.to_string(), "undirected skeleton's nodes must match schema attributes");

    let schema = single_entity(&["X"]);
    let mut pc = oracle_pc(&schema, &[]);
    assert!(matches!(
        pc.set_undirected_skeleton(VariableGraph::new()),
        Err(RcdError::SkeletonNodeMismatch)
    ));

    let mut duplicated = VariableGraph::new();
    duplicated.add_node(var("[A].X"));
    duplicated.add_node(var("[A].X"));
    assert!(matches!(
        pc.set_undirected_skeleton(duplicated),
        Err(RcdError::SkeletonNodeMismatch)
    ));
    assert!(pc.undirected_skeleton().is_none());

    pc.set_undirected_skeleton(skeleton_of(&["[A].X"], &[])).unwrap();
    assert_eq!(pc.undirected_skeleton().map(VariableGraph::node_count), Some(1));
}

#[test]
fn test_set_sepsets() {
    let schema = Schema::new();
    let mut pc = oracle_pc(&schema, &[]);
    pc.set_sepsets(SepsetMap::new()).unwrap();
    assert_eq!(pc.sepsets(), Some(&SepsetMap::new()));
}

#[test]
fn test_injected_skeleton_and_sepsets_are_oriented() {
    let schema = single_entity(&["X", "Y", "Z"]);
    let mut pc = oracle_pc(&schema, &["[A].X -> [A].Z", "[A].Y -> [A].Z"]);
    pc.set_undirected_skeleton(skeleton_of(
        &["[A].X", "[A].Y", "[A].Z"],
        &[("[A].X", "[A].Z"), ("[A].Y", "[A].Z")],
    ))
    .unwrap();
    let mut sepsets = SepsetMap::new();
    sepsets.insert_str("[A].X", "[A].Y", &[]).unwrap();
    sepsets.insert_str("[A].Y", "[A].X", &[]).unwrap();
    pc.set_sepsets(sepsets).unwrap();

    let pattern = pc.phase_two().unwrap();
    assert_eq!(nodes(pattern), strs(&["[A].X", "[A].Y", "[A].Z"]));
    assert_eq!(edges(pattern), arcs(&[("[A].X", "[A].Z"), ("[A].Y", "[A].Z")]));
    assert_eq!(pc.rcd().ci_record().total, 0);
}

#[test]
fn test_learn_model() {
    let schema = single_entity(&["X", "Y", "Z", "W"]);
    let mut pc = oracle_pc(
        &schema,
        &["[A].X -> [A].Y", "[A].X -> [A].W", "[A].X -> [A].Z", "[A].Y -> [A].Z", "[A].W -> [A].Z"],
    );
    let pattern = pc.learn_model().unwrap();
    assert_eq!(nodes(pattern), strs(&["[A].X", "[A].Y", "[A].Z", "[A].W"]));
    assert_eq!(
        edges(pattern),
        &arcs(&[("[A].X", "[A].Z"), ("[A].Y", "[A].Z"), ("[A].W", "[A].Z")])
            | &undirected(&[("[A].X", "[A].Y"), ("[A].X", "[A].W")])
    );
    assert!(pc.undirected_skeleton().is_some());
    assert!(pc.partially_directed_graph().is_some());
}
