use rcd_core::space::*;
use rcd_core::validity::is_valid_relational_path;
use rcd_core::{Cardinality, Schema};

fn two_entities(card_a: Cardinality, card_b: Cardinality) -> Schema {
    let mut schema = Schema::new();
    schema.add_entity("A").unwrap();
    schema.add_entity("B").unwrap();
    schema
        .add_relationship("AB", ("A", card_a), ("B", card_b))
        .unwrap();
    schema
}

fn sorted_paths(schema: &Schema, hop: usize) -> Vec<String> {
    let mut paths: Vec<String> = relational_paths(schema, hop)
        .iter()
        .map(|p| p.join(","))
        .collect();
    paths.sort();
    paths
}

fn expected(paths: &[&str]) -> Vec<String> {
    let mut paths: Vec<String> = paths.iter().map(|s| s.to_string()).collect();
    paths.sort();
    paths
}

#[test]
fn test_single_entity() {
    let mut schema = Schema::new();
    schema.add_entity("B").unwrap();
    schema.add_entity("A").unwrap();
    assert_eq!(sorted_paths(&schema, 0), expected(&["A", "B"]));
    assert_eq!(sorted_paths(&schema, 4), expected(&["A", "B"]));
}

#[test]
fn test_many_to_many_paths() {
    let schema = two_entities(Cardinality::Many, Cardinality::Many);
    assert_eq!(
        sorted_paths(&schema, 3),
        expected(&[
            "A", "B", "AB",
            "A,AB", "AB,A", "AB,B", "B,AB",
            "A,AB,B", "AB,A,AB", "AB,B,AB", "B,AB,A",
            "A,AB,B,AB", "AB,A,AB,B", "AB,B,AB,A", "B,AB,A,AB",
        ])
    );
}

#[test]
fn test_one_to_many_paths_terminate() {
    let schema = two_entities(Cardinality::Many, Cardinality::One);
    let hop4 = expected(&[
        "A", "B", "AB",
        "A,AB", "AB,A", "AB,B", "B,AB",
        "A,AB,B", "AB,A,AB", "B,AB,A",
        "AB,A,AB,B", "B,AB,A,AB",
        "B,AB,A,AB,B",
    ]);
    assert_eq!(sorted_paths(&schema, 4), hop4);
    // nothing can be added past four hops
    assert_eq!(sorted_paths(&schema, 5), hop4);
}

#[test]
fn test_one_to_one_paths() {
    let schema = two_entities(Cardinality::One, Cardinality::One);
    assert_eq!(
        sorted_paths(&schema, 3),
        expected(&["A", "B", "AB", "A,AB", "AB,A", "AB,B", "B,AB", "A,AB,B", "B,AB,A"])
    );
}

#[test]
fn test_two_relationships_hop_two() {
    let mut schema = Schema::new();
    for e in ["A", "B", "C"] {
        schema.add_entity(e).unwrap();
    }
    schema
        .add_relationship("AB", ("A", Cardinality::Many), ("B", Cardinality::One))
        .unwrap();
    schema
        .add_relationship("BC", ("B", Cardinality::One), ("C", Cardinality::Many))
        .unwrap();
    assert_eq!(
        sorted_paths(&schema, 2),
        expected(&[
            "A", "B", "C", "AB", "BC",
            "A,AB", "B,AB", "B,BC", "C,BC", "AB,A", "AB,B", "BC,C", "BC,B",
            "A,AB,B", "B,AB,A", "B,BC,C", "C,BC,B", "AB,A,AB", "AB,B,BC", "BC,C,BC", "BC,B,AB",
        ])
    );
}

#[test]
fn test_enumerated_paths_are_valid() {
    let schema = two_entities(Cardinality::Many, Cardinality::One);
    for path in relational_paths(&schema, 5) {
        assert!(is_valid_relational_path(&schema, &path), "{path:?}");
    }
}

#[test]
fn test_dependencies_share_base_and_are_canonical() {
    let mut schema = two_entities(Cardinality::Many, Cardinality::Many);
    schema.add_attribute("A", "X", None).unwrap();
    schema.add_attribute("B", "Y", None).unwrap();
    schema.add_attribute("AB", "XY", None).unwrap();

    let deps = relational_dependencies(&schema, 2, false);
    assert!(!deps.is_empty());
    for dep in &deps {
        assert_eq!(dep.effect.path_len(), 1);
        assert_eq!(dep.cause.base_item(), dep.effect.base_item());
        assert_ne!(dep.cause.attr_name(), dep.effect.attr_name());
        // every potential dependency's reverse is also potential
        assert!(deps.contains(&dep.reverse()), "{dep}");
    }
    let strs: Vec<String> = deps.iter().map(|d| d.to_string()).collect();
    assert!(strs.contains(&"[A, AB].XY -> [A].X".to_string()));
    assert!(strs.contains(&"[AB, B].Y -> [AB].XY".to_string()));
    assert!(strs.contains(&"[A, AB, B].Y -> [A].X".to_string()));
}

#[test]
fn test_existence_dependencies() {
    let mut schema = two_entities(Cardinality::Many, Cardinality::Many);
    schema.add_attribute("A", "X", None).unwrap();
    let deps = relational_dependencies(&schema, 1, true);
    let strs: Vec<String> = deps.iter().map(|d| d.to_string()).collect();
    // relationship existence may depend on an endpoint attribute
    assert!(strs.contains(&"[AB, A].X -> [AB].exists".to_string()));
    // entity existence never participates
    assert!(strs.iter().all(|s| !s.contains("[A].exists") && !s.contains("[B].exists")));
}
