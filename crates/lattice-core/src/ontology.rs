//! Graph object model shared across lattice crates.
//!
//! These types mirror the shape of the external graph store's ontology and
//! knowledge objects at the interface boundary: data types, property types,
//! entity types, entities, and the embedding vectors attached to them. The
//! store itself is external; lattice only reads, enriches, and writes back
//! through the [`crate::traits::GraphStore`] trait.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Base URL of a property type, used to key property values on an entity.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BaseUrl(pub String);

impl BaseUrl {
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BaseUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Versioned URL identifying one revision of an ontology type.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionedUrl(pub String);

impl VersionedUrl {
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The base URL of this versioned URL: everything up to and including
    /// the segment before the `v/{version}` suffix. Returned unchanged if
    /// the suffix is absent.
    pub fn base_url(&self) -> BaseUrl {
        match self.0.rsplit_once("v/") {
            Some((base, version)) if version.chars().all(|c| c.is_ascii_digit()) => {
                BaseUrl::new(base)
            }
            _ => BaseUrl::new(self.0.clone()),
        }
    }
}

impl std::fmt::Display for VersionedUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of an entity record in the graph store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub String);

impl EntityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Account identifier of an actor in the graph store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(pub Uuid);

impl std::fmt::Display for AccountId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Authorization context a job runs under. Every graph operation carries one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authentication {
    pub actor_id: AccountId,
}

impl Authentication {
    pub fn new(actor_id: AccountId) -> Self {
        Self { actor_id }
    }
}

// =============================================================================
// TEMPORAL METADATA
// =============================================================================

/// Revision timestamps for a graph object.
///
/// `transaction_time` and `decision_time` are the start bounds of the
/// object's current revision interval. Embedding writes are tagged with
/// these so the store can reject writes against a stale revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemporalVersioning {
    pub transaction_time: DateTime<Utc>,
    pub decision_time: DateTime<Utc>,
}

/// Temporal axis of the graph store's bitemporal model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TemporalAxis {
    TransactionTime,
    DecisionTime,
}

/// Which axis a query is pinned on and which varies.
///
/// Opaque to the orchestration core; forwarded verbatim to the graph store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryTemporalAxes {
    pub pinned: TemporalAxis,
    pub variable: TemporalAxis,
}

impl Default for QueryTemporalAxes {
    /// Pin transaction time at "now", vary over decision time — the axes all
    /// enrichment jobs query with.
    fn default() -> Self {
        Self {
            pinned: TemporalAxis::TransactionTime,
            variable: TemporalAxis::DecisionTime,
        }
    }
}

// =============================================================================
// RESOLVE DEPTHS
// =============================================================================

/// How far the graph store should resolve references when answering a query.
///
/// Caller-supplied and opaque to the orchestration core.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphResolveDepths {
    /// Outgoing `inheritsFrom` edges to follow (255 = full closure).
    pub inherits_from: u8,
    /// Outgoing `constrainsPropertiesOn` edges to follow.
    pub constrains_properties_on: u8,
}

impl GraphResolveDepths {
    /// Resolve nothing beyond the matched objects themselves.
    pub fn none() -> Self {
        Self::default()
    }

    /// Resolve the full inheritance chain plus directly constrained
    /// property types. Used when collecting the property-type closure of
    /// an entity's type.
    pub fn property_type_closure() -> Self {
        Self {
            inherits_from: u8::MAX,
            constrains_properties_on: 1,
        }
    }
}

// =============================================================================
// ONTOLOGY TYPES
// =============================================================================

/// Schema fields common to all ontology type kinds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OntologySchema {
    /// Versioned URL identifying this type revision (`$id`).
    pub id: VersionedUrl,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Metadata attached to an ontology type by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OntologyMetadata {
    pub temporal_versioning: TemporalVersioning,
}

/// A data type with its store-issued metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataType {
    pub schema: OntologySchema,
    pub metadata: OntologyMetadata,
}

/// A property type with its store-issued metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyType {
    pub schema: OntologySchema,
    pub metadata: OntologyMetadata,
}

/// An entity type with its store-issued metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityType {
    pub schema: OntologySchema,
    pub metadata: OntologyMetadata,
}

/// An entity type with its property types resolved inline, as handed to the
/// inference backend. Produced once per research job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DereferencedEntityType {
    pub id: VersionedUrl,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub property_types: Vec<OntologySchema>,
}

// =============================================================================
// ENTITIES
// =============================================================================

/// Property values of an entity, keyed by property-type base URL.
pub type EntityProperties = BTreeMap<BaseUrl, JsonValue>;

/// Record identifier of an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRecordId {
    pub entity_id: EntityId,
}

/// Metadata attached to an entity by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityMetadata {
    pub record_id: EntityRecordId,
    pub entity_type_id: VersionedUrl,
    pub temporal_versioning: TemporalVersioning,
}

/// An entity with its property values and store-issued metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub properties: EntityProperties,
    pub metadata: EntityMetadata,
}

// =============================================================================
// EMBEDDINGS
// =============================================================================

/// One generated embedding vector, optionally tied to a single property.
///
/// Entity embedding generation yields one vector per non-empty property
/// (tagged with the property's base URL) plus an untagged combined vector;
/// ontology-type generation yields a single untagged vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property: Option<BaseUrl>,
    pub vector: Vec<f32>,
}

// =============================================================================
// PAGINATION
// =============================================================================

/// Opaque, source-issued pagination token.
///
/// A non-null cursor means more pages may exist and must be re-submitted
/// verbatim on the next fetch. Never inspected or constructed by the
/// orchestration core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(pub String);

impl Cursor {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

/// One page of a server-paginated result set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Continuation token; `None` signals exhaustion.
    #[serde(default = "Option::default", skip_serializing_if = "Option::is_none")]
    pub cursor: Option<Cursor>,
}

impl<T> Page<T> {
    /// A final page with no continuation.
    pub fn last(items: Vec<T>) -> Self {
        Self {
            items,
            cursor: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
