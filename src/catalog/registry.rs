//! The entity registry: an immutable, indexed catalog of entities.
//!
//! A registry is built once from a versioned TOML document and shared by
//! reference afterwards. There is no way to mutate it after construction,
//! so any number of compilers may read it concurrently.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

use super::graph::RelationshipGraph;
use super::types::{Entity, EntityCategory, Field, Relationship};

/// The telematics catalog shipped with the crate.
const BUILTIN_CATALOG: &str = include_str!("telematics.toml");

static BUILTIN: LazyLock<EntityRegistry> = LazyLock::new(|| {
    EntityRegistry::from_toml_str(BUILTIN_CATALOG).expect("embedded catalog must be valid")
});

/// Errors raised while loading a catalog document.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Catalog file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to read catalog: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse catalog: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Duplicate entity id: {0}")]
    DuplicateEntity(String),

    #[error("Duplicate field '{field}' on entity '{entity}'")]
    DuplicateField { entity: String, field: String },

    #[error("Category '{category}' references unknown entity '{entity}'")]
    UnknownCategoryEntity { category: String, entity: String },
}

pub type CatalogResult<T> = Result<T, CatalogError>;

/// On-disk shape of a catalog document.
#[derive(Debug, Deserialize)]
struct CatalogDocument {
    version: String,
    #[serde(default)]
    categories: Vec<EntityCategory>,
    #[serde(default)]
    entities: Vec<Entity>,
}

/// Read-only catalog of entities, indexed by id.
#[derive(Debug, Clone)]
pub struct EntityRegistry {
    version: String,
    entities: Vec<Entity>,
    index: HashMap<String, usize>,
    categories: Vec<EntityCategory>,
    graph: RelationshipGraph,
}

impl EntityRegistry {
    /// The built-in telematics catalog, parsed on first use.
    pub fn builtin() -> &'static EntityRegistry {
        &BUILTIN
    }

    /// Load a registry from a TOML catalog file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> CatalogResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(CatalogError::FileNotFound(path.display().to_string()));
        }
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse a registry from TOML catalog source.
    pub fn from_toml_str(source: &str) -> CatalogResult<Self> {
        let doc: CatalogDocument = toml::from_str(source)?;
        Self::new(doc.version, doc.entities, doc.categories)
    }

    /// Build a registry from already-constructed entities.
    ///
    /// Entity order is preserved; it decides join-path search priority.
    pub fn new(
        version: impl Into<String>,
        entities: Vec<Entity>,
        categories: Vec<EntityCategory>,
    ) -> CatalogResult<Self> {
        let mut index = HashMap::with_capacity(entities.len());
        for (pos, entity) in entities.iter().enumerate() {
            if index.insert(entity.id.clone(), pos).is_some() {
                return Err(CatalogError::DuplicateEntity(entity.id.clone()));
            }
            let mut seen = HashSet::new();
            for field in &entity.fields {
                if !seen.insert(field.id.as_str()) {
                    return Err(CatalogError::DuplicateField {
                        entity: entity.id.clone(),
                        field: field.id.clone(),
                    });
                }
            }
        }

        for category in &categories {
            if let Some(missing) = category.entities.iter().find(|e| !index.contains_key(*e)) {
                return Err(CatalogError::UnknownCategoryEntity {
                    category: category.id.clone(),
                    entity: missing.clone(),
                });
            }
        }

        for entity in &entities {
            for rel in &entity.relationships {
                if !index.contains_key(&rel.target) {
                    debug!(
                        entity = %entity.id,
                        target = %rel.target,
                        "relationship targets an undeclared entity"
                    );
                }
            }
        }

        let version = version.into();
        let graph = RelationshipGraph::build(&entities);
        info!(
            version = %version,
            entities = entities.len(),
            edges = graph.edge_count(),
            "entity registry loaded"
        );

        Ok(Self {
            version,
            entities,
            index,
            categories,
            graph,
        })
    }

    /// Catalog document version.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Look up an entity by id.
    pub fn lookup(&self, entity_id: &str) -> Option<&Entity> {
        self.index.get(entity_id).map(|&pos| &self.entities[pos])
    }

    /// Look up a field on an entity.
    pub fn field(&self, entity_id: &str, field_id: &str) -> Option<(&Entity, &Field)> {
        let entity = self.lookup(entity_id)?;
        entity.field(field_id).map(|field| (entity, field))
    }

    /// All entities in registry order.
    pub fn all(&self) -> &[Entity] {
        &self.entities
    }

    /// Relationships declared by an entity. Empty for unknown ids.
    pub fn relationships_of(&self, entity_id: &str) -> &[Relationship] {
        self.lookup(entity_id)
            .map(|e| e.relationships.as_slice())
            .unwrap_or(&[])
    }

    /// Relationships declared elsewhere that target `entity_id`, with their
    /// owning entity, in registry order.
    pub fn inbound<'a>(
        &'a self,
        entity_id: &'a str,
    ) -> impl Iterator<Item = (&'a Entity, &'a Relationship)> + 'a {
        self.entities.iter().flat_map(move |owner| {
            owner
                .relationships
                .iter()
                .filter(move |rel| rel.target == entity_id)
                .map(move |rel| (owner, rel))
        })
    }

    /// Ids of the entities an entity declares relationships to.
    pub fn related_entities(&self, entity_id: &str) -> Vec<&str> {
        self.relationships_of(entity_id)
            .iter()
            .map(|r| r.target.as_str())
            .collect()
    }

    pub fn categories(&self) -> &[EntityCategory] {
        &self.categories
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Bidirectional relationship graph used for shortest-path joins.
    pub fn graph(&self) -> &RelationshipGraph {
        &self.graph
    }
}
