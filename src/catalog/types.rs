//! Type definitions for the entity catalog.
//!
//! Entities, their fields, and the relationships between them. Everything in
//! here is plain data: once a catalog is loaded nothing mutates it.

use serde::{Deserialize, Serialize};

// ============================================================================
// Supporting Enums
// ============================================================================

/// Semantic type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    String,
    Number,
    Boolean,
    Datetime,
    Date,
    Time,
    Json,
    Coordinates,
    Enum,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Number => "number",
            FieldType::Boolean => "boolean",
            FieldType::Datetime => "datetime",
            FieldType::Date => "date",
            FieldType::Time => "time",
            FieldType::Json => "json",
            FieldType::Coordinates => "coordinates",
            FieldType::Enum => "enum",
        }
    }

    /// Is this a temporal type usable as a time-window column?
    pub fn is_temporal(&self) -> bool {
        matches!(self, FieldType::Datetime | FieldType::Date)
    }
}

/// Aggregation applied to a selected field.
///
/// Parsing never fails: names outside the known set become
/// [`AggregationKind::Unrecognized`], which compiles to the bare field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AggregationKind {
    Count,
    Sum,
    Avg,
    Min,
    Max,
    CountDistinct,
    Unrecognized(String),
}

impl AggregationKind {
    /// Parse an aggregation name (case-insensitive).
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "count" => AggregationKind::Count,
            "sum" => AggregationKind::Sum,
            "avg" => AggregationKind::Avg,
            "min" => AggregationKind::Min,
            "max" => AggregationKind::Max,
            "count_distinct" => AggregationKind::CountDistinct,
            _ => AggregationKind::Unrecognized(name.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            AggregationKind::Count => "count",
            AggregationKind::Sum => "sum",
            AggregationKind::Avg => "avg",
            AggregationKind::Min => "min",
            AggregationKind::Max => "max",
            AggregationKind::CountDistinct => "count_distinct",
            AggregationKind::Unrecognized(name) => name,
        }
    }

    /// Returns true for the six aggregations the compiler knows how to emit.
    pub fn is_known(&self) -> bool {
        !matches!(self, AggregationKind::Unrecognized(_))
    }
}

impl From<String> for AggregationKind {
    fn from(name: String) -> Self {
        AggregationKind::parse(&name)
    }
}

impl From<AggregationKind> for String {
    fn from(kind: AggregationKind) -> Self {
        kind.as_str().to_string()
    }
}

impl std::fmt::Display for AggregationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cardinality of a relationship between entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Cardinality {
    #[serde(rename = "one-to-one")]
    OneToOne,
    #[serde(rename = "one-to-many")]
    OneToMany,
    #[serde(rename = "many-to-one")]
    ManyToOne,
    #[serde(rename = "many-to-many")]
    ManyToMany,
}

impl Cardinality {
    /// Reverse the cardinality (swap left/right sides).
    pub fn reverse(self) -> Self {
        match self {
            Cardinality::OneToMany => Cardinality::ManyToOne,
            Cardinality::ManyToOne => Cardinality::OneToMany,
            Cardinality::OneToOne => Cardinality::OneToOne,
            Cardinality::ManyToMany => Cardinality::ManyToMany,
        }
    }

    /// Returns true if this cardinality can cause row multiplication.
    pub fn causes_fanout(&self) -> bool {
        matches!(self, Cardinality::OneToMany | Cardinality::ManyToMany)
    }
}

impl std::fmt::Display for Cardinality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Cardinality::OneToOne => write!(f, "1:1"),
            Cardinality::OneToMany => write!(f, "1:N"),
            Cardinality::ManyToOne => write!(f, "N:1"),
            Cardinality::ManyToMany => write!(f, "N:N"),
        }
    }
}

/// SQL join kind declared on a relationship.
///
/// Anything other than `inner`, `left` or `right` falls back to `Left`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", rename_all = "lowercase")]
pub enum JoinKind {
    Inner,
    #[default]
    Left,
    Right,
}

impl JoinKind {
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "inner" => JoinKind::Inner,
            "right" => JoinKind::Right,
            _ => JoinKind::Left,
        }
    }

    /// SQL keyword for this join kind.
    pub fn keyword(&self) -> &'static str {
        match self {
            JoinKind::Inner => "INNER",
            JoinKind::Left => "LEFT",
            JoinKind::Right => "RIGHT",
        }
    }
}

impl From<String> for JoinKind {
    fn from(name: String) -> Self {
        JoinKind::parse(&name)
    }
}

// ============================================================================
// Fields
// ============================================================================

/// Advisory foreign-key target of a field. Not enforced by the compiler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignRef {
    pub entity: String,
    pub field: String,
}

/// A typed attribute of an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    /// Identifier, unique within the owning entity.
    pub id: String,
    /// Physical column name (defaults to `id`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub primary_key: bool,
    #[serde(default)]
    pub foreign_key: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub references: Option<ForeignRef>,
    #[serde(default)]
    pub filterable: bool,
    #[serde(default)]
    pub sortable: bool,
    /// Aggregations offered for this field. `None` means unrestricted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregations: Option<Vec<AggregationKind>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

impl Field {
    /// Create a field with the given id and type and no flags set.
    pub fn new(id: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            id: id.into(),
            column: None,
            display_name: None,
            field_type,
            description: None,
            primary_key: false,
            foreign_key: false,
            references: None,
            filterable: false,
            sortable: false,
            aggregations: None,
            enum_values: None,
            format: None,
        }
    }

    pub fn with_column(mut self, column: &str) -> Self {
        self.column = Some(column.into());
        self
    }

    pub fn primary(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn filterable(mut self) -> Self {
        self.filterable = true;
        self
    }

    pub fn sortable(mut self) -> Self {
        self.sortable = true;
        self
    }

    pub fn with_aggregations(mut self, kinds: Vec<AggregationKind>) -> Self {
        self.aggregations = Some(kinds);
        self
    }

    /// The physical column this field reads from.
    pub fn column_name(&self) -> &str {
        self.column.as_deref().unwrap_or(&self.id)
    }

    pub fn display_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.id)
    }

    /// Is the aggregation offered for this field?
    pub fn permits(&self, kind: &AggregationKind) -> bool {
        match &self.aggregations {
            Some(kinds) => kinds.contains(kind),
            None => true,
        }
    }
}

// ============================================================================
// Relationships
// ============================================================================

/// A directed edge declared by an entity towards another entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    /// Target entity id.
    pub target: String,
    #[serde(rename = "type")]
    pub cardinality: Cardinality,
    /// Field on the declaring entity.
    pub source_field: String,
    /// Field on the target entity.
    pub target_field: String,
    #[serde(default)]
    pub join: JoinKind,
    /// Bridge table for many-to-many relationships (advisory).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub through: Option<String>,
}

impl Relationship {
    pub fn new(
        target: impl Into<String>,
        cardinality: Cardinality,
        source_field: impl Into<String>,
        target_field: impl Into<String>,
    ) -> Self {
        Self {
            target: target.into(),
            cardinality,
            source_field: source_field.into(),
            target_field: target_field.into(),
            join: JoinKind::Left,
            through: None,
        }
    }

    pub fn with_join(mut self, join: JoinKind) -> Self {
        self.join = join;
        self
    }
}

// ============================================================================
// Entities
// ============================================================================

/// A declared record type backed by a physical table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Identifier, unique across the registry.
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name_plural: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub schema_name: String,
    pub table_name: String,
    #[serde(default)]
    pub fields: Vec<Field>,
    #[serde(default)]
    pub relationships: Vec<Relationship>,
    #[serde(default)]
    pub default_fields: Vec<String>,
    #[serde(default)]
    pub searchable_fields: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp_field: Option<String>,
}

impl Entity {
    /// Create an entity with no fields or relationships.
    pub fn new(id: impl Into<String>, schema_name: &str, table_name: &str) -> Self {
        Self {
            id: id.into(),
            display_name: None,
            display_name_plural: None,
            description: None,
            schema_name: schema_name.into(),
            table_name: table_name.into(),
            fields: Vec::new(),
            relationships: Vec::new(),
            default_fields: Vec::new(),
            searchable_fields: Vec::new(),
            timestamp_field: None,
        }
    }

    pub fn with_field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    pub fn with_relationship(mut self, relationship: Relationship) -> Self {
        self.relationships.push(relationship);
        self
    }

    /// Look up a field by id.
    pub fn field(&self, id: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.id == id)
    }

    /// Physical column for a field id, falling back to the id itself.
    ///
    /// Relationship endpoints name fields; this maps them to columns.
    pub fn column_for(&self, field_id: &str) -> String {
        self.field(field_id)
            .map(|f| f.column_name().to_string())
            .unwrap_or_else(|| field_id.to_string())
    }

    pub fn display_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.id)
    }
}

/// A named group of entities, used for browsing the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityCategory {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub entities: Vec<String>,
}
