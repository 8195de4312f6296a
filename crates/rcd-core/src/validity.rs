//! Structural validity rules for relational paths, variables, dependencies and
//! variable sets.

use crate::error::ModelError;
use crate::schema::{Cardinality, Schema};
use crate::variable::{RelationalDependency, RelationalVariable};

fn invalid_path(path: &[String], reason: impl Into<String>) -> ModelError {
    ModelError::InvalidPath {
        path: format!("[{}]", path.join(", ")),
        reason: reason.into(),
    }
}

/// A path is valid when its items alternate between entities and relationships,
/// every entity participates in its neighboring relationships, no `E R E`
/// triple returns to the same entity, and an `R E R` triple returning to the same
/// relationship only occurs when `card(R, E)` is many.
pub fn check_relational_path(schema: &Schema, path: &[String]) -> Result<(), ModelError> {
    if path.is_empty() {
        return Err(invalid_path(path, "path is empty"));
    }
    for item in path {
        if !schema.has_schema_item(item) {
            return Err(invalid_path(path, format!("schema has no item {item:?}")));
        }
    }

    for pair in path.windows(2) {
        let (item1, item2) = (pair[0].as_str(), pair[1].as_str());
        let (entity, rel) = match (schema.relationship(item1), schema.relationship(item2)) {
            (None, Some(rel)) => (item1, rel),
            (Some(rel), None) => (item2, rel),
            _ => {
                return Err(invalid_path(
                    path,
                    format!("{item1:?} and {item2:?} must alternate between entities and relationships"),
                ));
            }
        };
        if !rel.has_entity(entity) {
            return Err(invalid_path(
                path,
                format!("entity {entity:?} does not participate in relationship {:?}", rel.name),
            ));
        }
    }

    for triple in path.windows(3) {
        if triple[0] != triple[2] {
            continue;
        }
        if schema.has_relationship(&triple[1]) {
            return Err(invalid_path(path, "found ERE pattern"));
        }
        if let Some(rel) = schema.relationship(&triple[0])
            && rel.cardinality(&triple[1]) == Some(Cardinality::One)
        {
            return Err(invalid_path(path, "found RER pattern with card(R, E) = ONE"));
        }
    }
    Ok(())
}

pub fn is_valid_relational_path(schema: &Schema, path: &[String]) -> bool {
    check_relational_path(schema, path).is_ok()
}

pub fn check_relational_variable(schema: &Schema, var: &RelationalVariable) -> Result<(), ModelError> {
    check_relational_path(schema, var.path())?;
    if var.is_existence() {
        return Ok(());
    }
    let terminal = var.terminal_item();
    let item = schema
        .schema_item(terminal)
        .ok_or_else(|| ModelError::UnknownItem(terminal.to_string()))?;
    if !item.has_attribute(var.attr_name()) {
        return Err(ModelError::UnknownAttribute {
            item: terminal.to_string(),
            attr: var.attr_name().to_string(),
            variable: var.to_string(),
        });
    }
    Ok(())
}

/// A dependency must be canonical (singleton effect path), share one base item,
/// and relate two valid variables.
pub fn check_relational_dependency(schema: &Schema, dep: &RelationalDependency) -> Result<(), ModelError> {
    if dep.effect.path_len() > 1 {
        return Err(ModelError::NonCanonicalDependency(dep.to_string()));
    }
    if dep.cause.base_item() != dep.effect.base_item() {
        return Err(ModelError::InconsistentBaseItems(dep.to_string()));
    }
    check_relational_variable(schema, &dep.effect)?;
    check_relational_variable(schema, &dep.cause)
}

/// Checks a set of variables used together in one query: non-empty, one shared
/// perspective, no path longer than `hop + 1`, and every variable valid.
pub fn check_relational_variable_set<'a, I>(schema: &Schema, hop: usize, vars: I) -> Result<(), ModelError>
where
    I: IntoIterator<Item = &'a RelationalVariable>,
{
    let vars: Vec<&RelationalVariable> = vars.into_iter().collect();
    let first = vars.first().ok_or(ModelError::EmptyVariableSet)?;
    let perspective = first.base_item();
    if vars.iter().any(|v| v.base_item() != perspective) {
        return Err(ModelError::InconsistentPerspective);
    }
    for var in vars {
        if var.path_len() > hop + 1 {
            return Err(ModelError::ExceedsHopThreshold {
                variable: var.to_string(),
                hop,
            });
        }
        check_relational_variable(schema, var)?;
    }
    Ok(())
}
