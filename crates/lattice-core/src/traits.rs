//! Core traits for lattice abstractions.
//!
//! These traits define the interfaces that concrete implementations must
//! satisfy, enabling pluggable backends and testability. The graph store is
//! specified only at this boundary; lattice never persists graph state
//! itself.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::filter::Filter;
use crate::ontology::*;

/// A filtered, depth-configured query against the graph store.
///
/// Resolve depths and temporal axes are supplied by the caller and opaque to
/// the orchestration core; the store interprets them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuralQuery {
    pub filter: Filter,
    pub graph_resolve_depths: GraphResolveDepths,
    pub temporal_axes: QueryTemporalAxes,
    pub include_drafts: bool,
}

impl StructuralQuery {
    /// Query matching `filter` with no reference resolution, on the default
    /// temporal axes, including drafts. The shape every backfill job uses.
    pub fn new(filter: Filter) -> Self {
        Self {
            filter,
            graph_resolve_depths: GraphResolveDepths::none(),
            temporal_axes: QueryTemporalAxes::default(),
            include_drafts: true,
        }
    }

    pub fn with_resolve_depths(mut self, depths: GraphResolveDepths) -> Self {
        self.graph_resolve_depths = depths;
        self
    }

    pub fn with_include_drafts(mut self, include_drafts: bool) -> Self {
        self.include_drafts = include_drafts;
        self
    }
}

/// An embedding write for one graph object, tagged with the object's
/// last-modified timestamps so the store can reject writes against a stale
/// revision. Repeating an identical write is a no-op at the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingUpdate {
    pub embeddings: Vec<Embedding>,
    pub updated_at_transaction_time: DateTime<Utc>,
    /// Only meaningful for entities; ontology types carry `None`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at_decision_time: Option<DateTime<Utc>>,
}

/// The external graph storage collaborator.
///
/// All operations are remote calls made through the operation invoker with
/// the graph policy (short timeout, retried). Reads are idempotent;
/// embedding writes are idempotent on repeated identical input.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Fetch all data types matching the query.
    async fn get_data_types(
        &self,
        authentication: Authentication,
        query: StructuralQuery,
    ) -> Result<Vec<DataType>>;

    /// Fetch all property types matching the query.
    async fn get_property_types(
        &self,
        authentication: Authentication,
        query: StructuralQuery,
    ) -> Result<Vec<PropertyType>>;

    /// Fetch all entity types matching the query.
    async fn get_entity_types(
        &self,
        authentication: Authentication,
        query: StructuralQuery,
    ) -> Result<Vec<EntityType>>;

    /// Fetch one page of entities matching the query.
    ///
    /// A returned cursor must be re-submitted verbatim to fetch the next
    /// page; `None` together with an empty page signals exhaustion.
    async fn get_entities(
        &self,
        authentication: Authentication,
        query: StructuralQuery,
        cursor: Option<Cursor>,
        limit: usize,
    ) -> Result<Page<Entity>>;

    /// Resolve the property-type closure of the entity types matched by the
    /// query (the query's resolve depths decide how far inheritance is
    /// followed).
    async fn get_entity_type_property_types(
        &self,
        authentication: Authentication,
        query: StructuralQuery,
    ) -> Result<Vec<PropertyType>>;

    /// Fetch entity types with their property types resolved inline, as
    /// consumed by the inference backend.
    async fn get_dereferenced_entity_types(
        &self,
        authentication: Authentication,
        entity_type_ids: &[VersionedUrl],
    ) -> Result<Vec<DereferencedEntityType>>;

    /// Write embeddings for a data type.
    async fn update_data_type_embeddings(
        &self,
        authentication: Authentication,
        data_type_id: VersionedUrl,
        update: EmbeddingUpdate,
    ) -> Result<()>;

    /// Write embeddings for a property type.
    async fn update_property_type_embeddings(
        &self,
        authentication: Authentication,
        property_type_id: VersionedUrl,
        update: EmbeddingUpdate,
    ) -> Result<()>;

    /// Write embeddings for an entity type.
    async fn update_entity_type_embeddings(
        &self,
        authentication: Authentication,
        entity_type_id: VersionedUrl,
        update: EmbeddingUpdate,
    ) -> Result<()>;

    /// Write embeddings for an entity.
    async fn update_entity_embeddings(
        &self,
        authentication: Authentication,
        entity_id: EntityId,
        update: EmbeddingUpdate,
    ) -> Result<()>;

    /// List every user account id known to the store.
    async fn get_user_account_ids(&self) -> Result<Vec<AccountId>>;

    /// Resolve the account usable as an autonomous AI actor for the given
    /// user, granting it creation permission in `web_owner_id`'s web.
    /// Returns `None` when no such account exists.
    async fn get_ai_assistant_account_id(
        &self,
        authentication: Authentication,
        web_owner_id: AccountId,
    ) -> Result<Option<AccountId>>;
}
