//! Shared test doubles for job integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use uuid::Uuid;

use lattice_core::filter::{Filter, FilterExpression};
use lattice_core::ontology::{
    AccountId, Authentication, BaseUrl, Cursor, DataType, DereferencedEntityType, Entity,
    EntityId, EntityMetadata, EntityProperties, EntityRecordId, EntityType, OntologyMetadata,
    OntologySchema, Page, PropertyType, TemporalVersioning, VersionedUrl,
};
use lattice_core::traits::{EmbeddingUpdate, GraphStore, StructuralQuery};
use lattice_core::{Error, Result};

/// Install the log subscriber for test output. Idempotent; later calls are
/// no-ops.
pub fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("lattice_jobs=debug"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_test_writer()
        .try_init();
}

pub const PERSON_TYPE: &str = "https://example.org/entity-types/person/v/1";
pub const NAME_PROPERTY: &str = "https://example.org/property-types/name/";

pub fn fixed_versioning() -> TemporalVersioning {
    let ts = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
    TemporalVersioning {
        transaction_time: ts,
        decision_time: ts,
    }
}

pub fn account(n: u128) -> AccountId {
    AccountId(Uuid::from_u128(n))
}

pub fn property_type(base: &str, title: &str) -> PropertyType {
    PropertyType {
        schema: OntologySchema {
            id: VersionedUrl::new(format!("{base}v/1")),
            title: title.to_string(),
            description: None,
        },
        metadata: OntologyMetadata {
            temporal_versioning: fixed_versioning(),
        },
    }
}

pub fn data_type(id: &str, title: &str, description: &str) -> DataType {
    DataType {
        schema: OntologySchema {
            id: VersionedUrl::new(id),
            title: title.to_string(),
            description: Some(description.to_string()),
        },
        metadata: OntologyMetadata {
            temporal_versioning: fixed_versioning(),
        },
    }
}

pub fn person_entity(id: &str, name: &str) -> Entity {
    let mut properties = EntityProperties::new();
    properties.insert(BaseUrl::new(NAME_PROPERTY), serde_json::json!(name));
    Entity {
        properties,
        metadata: EntityMetadata {
            record_id: EntityRecordId {
                entity_id: EntityId::new(id),
            },
            entity_type_id: VersionedUrl::new(PERSON_TYPE),
            temporal_versioning: fixed_versioning(),
        },
    }
}

pub fn person_dereferenced() -> DereferencedEntityType {
    DereferencedEntityType {
        id: VersionedUrl::new(PERSON_TYPE),
        title: "Person".to_string(),
        description: None,
        property_types: vec![OntologySchema {
            id: VersionedUrl::new(format!("{NAME_PROPERTY}v/1")),
            title: "Name".to_string(),
            description: None,
        }],
    }
}

/// One recorded embedding write.
#[derive(Debug, Clone)]
pub struct WriteRecord {
    pub target: String,
    pub actor_id: AccountId,
    pub update: EmbeddingUpdate,
}

/// In-memory graph store double.
///
/// Entities are held per account; the missing-embeddings filter is evaluated
/// against recorded writes, so the matching set drains as a backfill
/// progresses, the way the real store behaves.
#[derive(Default)]
pub struct InMemoryGraph {
    data_types: Vec<DataType>,
    property_types: Vec<PropertyType>,
    entity_types: Vec<EntityType>,
    entities_by_account: HashMap<AccountId, Vec<Entity>>,
    closures: HashMap<VersionedUrl, Vec<PropertyType>>,
    dereferenced: HashMap<VersionedUrl, DereferencedEntityType>,
    user_accounts: Vec<AccountId>,
    ai_assistant: Option<AccountId>,
    writes: Mutex<Vec<WriteRecord>>,
    entity_fetches: Mutex<Vec<Option<Cursor>>>,
}

impl InMemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_data_types(mut self, data_types: Vec<DataType>) -> Self {
        self.data_types = data_types;
        self
    }

    pub fn with_property_types(mut self, property_types: Vec<PropertyType>) -> Self {
        self.property_types = property_types;
        self
    }

    pub fn with_entity_types(mut self, entity_types: Vec<EntityType>) -> Self {
        self.entity_types = entity_types;
        self
    }

    pub fn with_entities(mut self, account_id: AccountId, entities: Vec<Entity>) -> Self {
        self.entities_by_account.insert(account_id, entities);
        self
    }

    /// Register the property-type closure served for an entity type.
    pub fn with_closure(mut self, entity_type_id: &str, closure: Vec<PropertyType>) -> Self {
        self.closures
            .insert(VersionedUrl::new(entity_type_id), closure);
        self
    }

    pub fn with_dereferenced(mut self, entity_type: DereferencedEntityType) -> Self {
        self.dereferenced.insert(entity_type.id.clone(), entity_type);
        self
    }

    pub fn with_user_accounts(mut self, accounts: Vec<AccountId>) -> Self {
        self.user_accounts = accounts;
        self
    }

    pub fn with_ai_assistant(mut self, account_id: AccountId) -> Self {
        self.ai_assistant = Some(account_id);
        self
    }

    pub fn writes(&self) -> Vec<WriteRecord> {
        self.writes.lock().unwrap().clone()
    }

    pub fn write_targets(&self) -> Vec<String> {
        self.writes().into_iter().map(|w| w.target).collect()
    }

    /// Cursors the entity pager was called with, in order.
    pub fn entity_fetches(&self) -> Vec<Option<Cursor>> {
        self.entity_fetches.lock().unwrap().clone()
    }

    fn record_write(&self, target: impl Into<String>, actor_id: AccountId, update: EmbeddingUpdate) {
        self.writes.lock().unwrap().push(WriteRecord {
            target: target.into(),
            actor_id,
            update,
        });
    }

    fn has_embedding(&self, entity_id: &EntityId) -> bool {
        self.writes
            .lock()
            .unwrap()
            .iter()
            .any(|w| w.target == entity_id.0)
    }

    fn versioned_url_of(filter: &Filter) -> Option<VersionedUrl> {
        match filter {
            Filter::Equal(FilterExpression::Path(path), FilterExpression::Parameter(value))
                if path == &["versionedUrl".to_string()] =>
            {
                value.as_str().map(VersionedUrl::new)
            }
            _ => None,
        }
    }
}

#[async_trait]
impl GraphStore for InMemoryGraph {
    async fn get_data_types(
        &self,
        _authentication: Authentication,
        _query: StructuralQuery,
    ) -> Result<Vec<DataType>> {
        Ok(self.data_types.clone())
    }

    async fn get_property_types(
        &self,
        _authentication: Authentication,
        _query: StructuralQuery,
    ) -> Result<Vec<PropertyType>> {
        Ok(self.property_types.clone())
    }

    async fn get_entity_types(
        &self,
        _authentication: Authentication,
        _query: StructuralQuery,
    ) -> Result<Vec<EntityType>> {
        Ok(self.entity_types.clone())
    }

    async fn get_entities(
        &self,
        authentication: Authentication,
        _query: StructuralQuery,
        cursor: Option<Cursor>,
        limit: usize,
    ) -> Result<Page<Entity>> {
        self.entity_fetches.lock().unwrap().push(cursor);

        // Evaluate the missing-embeddings filter against recorded writes.
        let matching: Vec<Entity> = self
            .entities_by_account
            .get(&authentication.actor_id)
            .map(|entities| {
                entities
                    .iter()
                    .filter(|e| {
                        !e.properties.is_empty()
                            && !self.has_embedding(&e.metadata.record_id.entity_id)
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        let more = matching.len() > limit;
        Ok(Page {
            items: matching.into_iter().take(limit).collect(),
            cursor: more.then(|| Cursor::new("more")),
        })
    }

    async fn get_entity_type_property_types(
        &self,
        _authentication: Authentication,
        query: StructuralQuery,
    ) -> Result<Vec<PropertyType>> {
        let id = Self::versioned_url_of(&query.filter)
            .ok_or_else(|| Error::Graph("Expected a versionedUrl filter".into()))?;
        Ok(self.closures.get(&id).cloned().unwrap_or_default())
    }

    async fn get_dereferenced_entity_types(
        &self,
        _authentication: Authentication,
        entity_type_ids: &[VersionedUrl],
    ) -> Result<Vec<DereferencedEntityType>> {
        Ok(entity_type_ids
            .iter()
            .filter_map(|id| self.dereferenced.get(id).cloned())
            .collect())
    }

    async fn update_data_type_embeddings(
        &self,
        authentication: Authentication,
        data_type_id: VersionedUrl,
        update: EmbeddingUpdate,
    ) -> Result<()> {
        self.record_write(data_type_id.0, authentication.actor_id, update);
        Ok(())
    }

    async fn update_property_type_embeddings(
        &self,
        authentication: Authentication,
        property_type_id: VersionedUrl,
        update: EmbeddingUpdate,
    ) -> Result<()> {
        self.record_write(property_type_id.0, authentication.actor_id, update);
        Ok(())
    }

    async fn update_entity_type_embeddings(
        &self,
        authentication: Authentication,
        entity_type_id: VersionedUrl,
        update: EmbeddingUpdate,
    ) -> Result<()> {
        self.record_write(entity_type_id.0, authentication.actor_id, update);
        Ok(())
    }

    async fn update_entity_embeddings(
        &self,
        authentication: Authentication,
        entity_id: EntityId,
        update: EmbeddingUpdate,
    ) -> Result<()> {
        self.record_write(entity_id.0, authentication.actor_id, update);
        Ok(())
    }

    async fn get_user_account_ids(&self) -> Result<Vec<AccountId>> {
        Ok(self.user_accounts.clone())
    }

    async fn get_ai_assistant_account_id(
        &self,
        _authentication: Authentication,
        _web_owner_id: AccountId,
    ) -> Result<Option<AccountId>> {
        Ok(self.ai_assistant)
    }
}
