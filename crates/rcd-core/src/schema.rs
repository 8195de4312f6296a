//! Relational schema: entities, relationships, their attributes and cardinalities.
//!
//! Entity and relationship names share one namespace. Every item also carries an
//! implicit existence attribute named [`EXISTS_ATTR_NAME`], which is never listed
//! among its attributes and cannot be added explicitly.

use crate::error::ModelError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Reserved name of the implicit existence attribute of every schema item.
pub const EXISTS_ATTR_NAME: &str = "exists";

/// How many instances of an entity may take part in one relationship instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cardinality {
    One,
    Many,
}

/// Declared data type of an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DataType {
    String,
    Integer,
    Float,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    #[serde(default, rename = "dataType", skip_serializing_if = "Option::is_none")]
    pub data_type: Option<DataType>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub name: String,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
}

/// A binary relationship between two entities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    pub name: String,
    pub entity1: String,
    pub entity1_card: Cardinality,
    pub entity2: String,
    pub entity2_card: Cardinality,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
}

impl Relationship {
    pub fn has_entity(&self, entity: &str) -> bool {
        self.entity1 == entity || self.entity2 == entity
    }

    /// Cardinality of `entity` in this relationship, `None` if it does not participate.
    pub fn cardinality(&self, entity: &str) -> Option<Cardinality> {
        if self.entity1 == entity {
            Some(self.entity1_card)
        } else if self.entity2 == entity {
            Some(self.entity2_card)
        } else {
            None
        }
    }
}

/// Borrowed view of either kind of schema item.
#[derive(Debug, Clone, Copy)]
pub enum SchemaItem<'a> {
    Entity(&'a Entity),
    Relationship(&'a Relationship),
}

impl<'a> SchemaItem<'a> {
    pub fn name(&self) -> &'a str {
        match self {
            SchemaItem::Entity(e) => &e.name,
            SchemaItem::Relationship(r) => &r.name,
        }
    }

    pub fn attributes(&self) -> &'a [Attribute] {
        match self {
            SchemaItem::Entity(e) => &e.attributes,
            SchemaItem::Relationship(r) => &r.attributes,
        }
    }

    pub fn has_attribute(&self, attr: &str) -> bool {
        self.attributes().iter().any(|a| a.name == attr)
    }

    pub fn is_entity(&self) -> bool {
        matches!(self, SchemaItem::Entity(_))
    }
}

/// A relational schema.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
    entities: BTreeMap<String, Entity>,
    relationships: BTreeMap<String, Relationship>,
}

/// On-the-wire layout used by [`Schema::to_json`] and [`Schema::from_json`].
#[derive(Serialize, Deserialize)]
struct SchemaDoc {
    entities: Vec<Entity>,
    relationships: Vec<Relationship>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_entity(&mut self, name: impl Into<String>) -> Result<(), ModelError> {
        let name = name.into();
        if self.has_schema_item(&name) {
            return Err(ModelError::DuplicateItem(name));
        }
        self.entities.insert(
            name.clone(),
            Entity {
                name,
                attributes: Vec::new(),
            },
        );
        Ok(())
    }

    /// Add a relationship between two existing entities, given as `(entity, cardinality)` pairs.
    pub fn add_relationship(
        &mut self,
        name: impl Into<String>,
        end1: (&str, Cardinality),
        end2: (&str, Cardinality),
    ) -> Result<(), ModelError> {
        let name = name.into();
        if self.has_schema_item(&name) {
            return Err(ModelError::DuplicateItem(name));
        }
        for entity in [end1.0, end2.0] {
            if !self.has_entity(entity) {
                return Err(ModelError::UnknownEndpoint {
                    relationship: name,
                    entity: entity.to_string(),
                });
            }
        }
        self.relationships.insert(
            name.clone(),
            Relationship {
                name,
                entity1: end1.0.to_string(),
                entity1_card: end1.1,
                entity2: end2.0.to_string(),
                entity2_card: end2.1,
                attributes: Vec::new(),
            },
        );
        Ok(())
    }

    pub fn add_attribute(
        &mut self,
        item: &str,
        attr: impl Into<String>,
        data_type: Option<DataType>,
    ) -> Result<(), ModelError> {
        let attr = attr.into();
        if attr == EXISTS_ATTR_NAME {
            return Err(ModelError::ReservedAttribute(attr));
        }
        let attributes = if let Some(e) = self.entities.get_mut(item) {
            &mut e.attributes
        } else if let Some(r) = self.relationships.get_mut(item) {
            &mut r.attributes
        } else {
            return Err(ModelError::UnknownItem(item.to_string()));
        };
        if attributes.iter().any(|a| a.name == attr) {
            return Err(ModelError::DuplicateAttribute {
                item: item.to_string(),
                attr,
            });
        }
        attributes.push(Attribute {
            name: attr,
            data_type,
        });
        Ok(())
    }

    pub fn has_entity(&self, name: &str) -> bool {
        self.entities.contains_key(name)
    }

    pub fn has_relationship(&self, name: &str) -> bool {
        self.relationships.contains_key(name)
    }

    pub fn has_schema_item(&self, name: &str) -> bool {
        self.has_entity(name) || self.has_relationship(name)
    }

    pub fn entity(&self, name: &str) -> Option<&Entity> {
        self.entities.get(name)
    }

    pub fn relationship(&self, name: &str) -> Option<&Relationship> {
        self.relationships.get(name)
    }

    pub fn schema_item(&self, name: &str) -> Option<SchemaItem<'_>> {
        self.entities
            .get(name)
            .map(SchemaItem::Entity)
            .or_else(|| self.relationships.get(name).map(SchemaItem::Relationship))
    }

    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    pub fn relationships(&self) -> impl Iterator<Item = &Relationship> {
        self.relationships.values()
    }

    /// All items: entities first, then relationships, each ordered by name.
    pub fn schema_items(&self) -> Vec<SchemaItem<'_>> {
        self.entities
            .values()
            .map(SchemaItem::Entity)
            .chain(self.relationships.values().map(SchemaItem::Relationship))
            .collect()
    }

    pub fn relationships_for_entity(&self, entity: &str) -> Result<Vec<&Relationship>, ModelError> {
        if !self.has_entity(entity) {
            return Err(ModelError::UnknownEntity(entity.to_string()));
        }
        Ok(self
            .relationships
            .values()
            .filter(|r| r.has_entity(entity))
            .collect())
    }

    pub fn relationships_between(
        &self,
        entity1: &str,
        entity2: &str,
    ) -> Result<Vec<&Relationship>, ModelError> {
        for entity in [entity1, entity2] {
            if !self.has_entity(entity) {
                return Err(ModelError::UnknownEntity(entity.to_string()));
            }
        }
        Ok(self
            .relationships
            .values()
            .filter(|r| r.has_entity(entity1) && r.has_entity(entity2))
            .collect())
    }

    pub fn to_json(&self) -> Result<String, ModelError> {
        let doc = SchemaDoc {
            entities: self.entities.values().cloned().collect(),
            relationships: self.relationships.values().cloned().collect(),
        };
        Ok(serde_json::to_string_pretty(&doc)?)
    }

    /// Parse a schema document, re-running every naming and attribute check.
    pub fn from_json(json: &str) -> Result<Self, ModelError> {
        let doc: SchemaDoc = serde_json::from_str(json)?;
        let mut schema = Schema::new();
        for entity in &doc.entities {
            schema.add_entity(entity.name.as_str())?;
            for attr in &entity.attributes {
                schema.add_attribute(&entity.name, attr.name.as_str(), attr.data_type)?;
            }
        }
        for rel in &doc.relationships {
            schema.add_relationship(
                rel.name.as_str(),
                (rel.entity1.as_str(), rel.entity1_card),
                (rel.entity2.as_str(), rel.entity2_card),
            )?;
            for attr in &rel.attributes {
                schema.add_attribute(&rel.name, attr.name.as_str(), attr.data_type)?;
            }
        }
        Ok(schema)
    }
}
