//! Enumeration of the relational paths, variables and dependencies a schema
//! admits within a hop threshold.

use crate::schema::{Cardinality, EXISTS_ATTR_NAME, Schema, SchemaItem};
use crate::variable::{RelationalDependency, RelationalVariable};

/// All relational paths with at most `hop` extensions, grown breadth-first from
/// every schema item in [`Schema::schema_items`] order.
pub fn relational_paths(schema: &Schema, hop: usize) -> Vec<Vec<String>> {
    let mut paths: Vec<Vec<String>> = schema
        .schema_items()
        .iter()
        .map(|item| vec![item.name().to_string()])
        .collect();
    let mut frontier = paths.clone();
    for _ in 0..hop {
        let extended = extend_relational_paths(schema, &frontier);
        paths.extend(extended.iter().cloned());
        frontier = extended;
    }
    paths
}

fn extend_relational_paths(schema: &Schema, paths: &[Vec<String>]) -> Vec<Vec<String>> {
    let mut extended = Vec::new();
    for path in paths {
        let Some(terminal) = path.last() else {
            continue;
        };
        let previous = (path.len() > 1).then(|| path[path.len() - 2].as_str());
        let push = |out: &mut Vec<Vec<String>>, item: &str| {
            let mut next = path.clone();
            next.push(item.to_string());
            out.push(next);
        };

        if let Some(rel) = schema.relationship(terminal) {
            for entity in [&rel.entity1, &rel.entity2] {
                if previous != Some(entity.as_str()) {
                    push(&mut extended, entity.as_str());
                }
            }
            continue;
        }

        let Ok(member_rels) = schema.relationships_for_entity(terminal) else {
            continue;
        };
        for rel in member_rels {
            if previous != Some(rel.name.as_str()) {
                push(&mut extended, rel.name.as_str());
                continue;
            }
            // Re-entering the relationship just left needs many instances on this side.
            let card = if *terminal == rel.entity1 {
                rel.entity1_card
            } else {
                rel.entity2_card
            };
            if card == Cardinality::Many {
                push(&mut extended, rel.name.as_str());
            }
        }
    }
    extended
}

/// Every path from [`relational_paths`] paired with each attribute of its
/// terminal item, plus the existence attribute when `include_existence` is set.
pub fn relational_variables(
    schema: &Schema,
    hop: usize,
    include_existence: bool,
) -> Vec<RelationalVariable> {
    let mut vars = Vec::new();
    for path in relational_paths(schema, hop) {
        let Some(item) = path.last().and_then(|t| schema.schema_item(t)) else {
            continue;
        };
        for attr in item.attributes() {
            vars.push(RelationalVariable::new(path.iter().cloned(), attr.name.as_str()));
        }
        if include_existence {
            vars.push(RelationalVariable::new(path.iter().cloned(), EXISTS_ATTR_NAME));
        }
    }
    vars
}

/// Every dependency `cause -> effect` between relational variables that could
/// appear in a model:
///
/// 1. cause and effect share a base item;
/// 2. the effect has a singleton path;
/// 3. attributes differ unless both are existence;
/// 4. a relationship-existence effect cannot have its base item revisited by the cause path;
/// 5. singleton-path pairs never involve existence;
/// 6. entity existence is never a cause or an effect.
pub fn relational_dependencies(
    schema: &Schema,
    hop: usize,
    include_existence: bool,
) -> Vec<RelationalDependency> {
    let vars = relational_variables(schema, hop, include_existence);
    let is_entity_existence = |v: &RelationalVariable| {
        v.is_existence()
            && schema
                .schema_item(v.terminal_item())
                .is_some_and(|item| matches!(item, SchemaItem::Entity(_)))
    };

    let mut deps = Vec::new();
    for cause in &vars {
        if is_entity_existence(cause) {
            continue;
        }
        for effect in &vars {
            if is_entity_existence(effect) || effect.path_len() > 1 {
                continue;
            }
            if cause.base_item() != effect.base_item() {
                continue;
            }
            if cause.path_len() == 1 && (cause.is_existence() || effect.is_existence()) {
                continue;
            }
            if effect.is_existence()
                && cause.path().iter().filter(|i| *i == effect.base_item()).count() > 1
            {
                continue;
            }
            if cause.attr_name() == effect.attr_name() && !cause.is_existence() {
                continue;
            }
            deps.push(RelationalDependency::new(cause.clone(), effect.clone()));
        }
    }
    deps
}
