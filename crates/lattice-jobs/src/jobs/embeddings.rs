//! Embedding backfill jobs, one per graph object kind.
//!
//! Each job accepts either an explicit item list or a filter. Filter mode
//! queries the store; for entities it streams pages of
//! [`lattice_core::defaults::EMBED_PAGE_LIMIT`] through the batch driver,
//! re-issuing the same filter each page (entities gain embeddings as they
//! are processed, so the matching set drains itself). Per item: generate
//! embeddings through the AI backend, fold usage into the job total, and
//! write back tagged with the object's last-modified timestamps only when
//! at least one vector was produced.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::{debug, info, instrument};

use lattice_core::cancel::CancelToken;
use lattice_core::defaults::EMBED_PAGE_LIMIT;
use lattice_core::filter::Filter;
use lattice_core::ontology::{AccountId, Authentication, DataType, Entity, EntityType, PropertyType};
use lattice_core::traits::{EmbeddingUpdate, GraphStore, StructuralQuery};
use lattice_core::{Result, TokenUsage};

use lattice_inference::embeddings::{
    create_data_type_embeddings, create_entity_embeddings, create_entity_type_embeddings,
    create_property_type_embeddings,
};
use lattice_inference::provider::EmbeddingBackend;

use crate::batch::for_each_page;
use crate::handler::{JobContext, JobHandler};
use crate::invoke::{invoke, OperationPolicy};

/// Where a backfill job gets its items: an explicit list, or a filter the
/// store resolves.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackfillSource<T> {
    Items(Vec<T>),
    Filter(Filter),
}

/// Parameters shared by all per-kind backfill jobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackfillParams<T> {
    pub authentication: Authentication,
    pub source: BackfillSource<T>,
}

/// Totals for one backfill run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BackfillReport {
    /// Items whose embeddings were generated.
    pub items: usize,
    /// Items whose embeddings were written back (≥1 vector produced).
    pub written: usize,
    pub usage: TokenUsage,
}

impl BackfillReport {
    fn absorb(&mut self, other: BackfillReport) {
        self.items += other.items;
        self.written += other.written;
        self.usage += other.usage;
    }
}

/// Totals for the all-accounts sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AllEntityBackfillReport {
    pub accounts: usize,
    pub items: usize,
    pub written: usize,
    pub usage: TokenUsage,
}

// =============================================================================
// ONTOLOGY TYPE BACKFILLS
// =============================================================================

/// Backfill embeddings for data types.
#[instrument(skip_all, fields(subsystem = "jobs", op = "update_data_type_embeddings"))]
pub async fn update_data_type_embeddings(
    graph: &dyn GraphStore,
    embedding: &dyn EmbeddingBackend,
    authentication: Authentication,
    source: BackfillSource<DataType>,
    cancel: &CancelToken,
) -> Result<BackfillReport> {
    let items = match source {
        BackfillSource::Items(items) => items,
        BackfillSource::Filter(filter) => {
            let query = StructuralQuery::new(filter);
            invoke("get_data_types", OperationPolicy::graph(), cancel, || {
                graph.get_data_types(authentication, query.clone())
            })
            .await?
        }
    };

    let mut report = BackfillReport::default();
    for data_type in items {
        let output = invoke(
            "create_data_type_embeddings",
            OperationPolicy::ai(),
            cancel,
            || create_data_type_embeddings(embedding, &data_type),
        )
        .await?;

        report.items += 1;
        report.usage += output.usage;
        if output.embeddings.is_empty() {
            debug!(type_id = %data_type.schema.id, "No vectors produced, skipping write");
            continue;
        }

        let update = EmbeddingUpdate {
            embeddings: output.embeddings,
            updated_at_transaction_time: data_type.metadata.temporal_versioning.transaction_time,
            updated_at_decision_time: None,
        };
        invoke(
            "update_data_type_embeddings",
            OperationPolicy::graph(),
            cancel,
            || {
                graph.update_data_type_embeddings(
                    authentication,
                    data_type.schema.id.clone(),
                    update.clone(),
                )
            },
        )
        .await?;
        report.written += 1;
    }

    info!(
        item_count = report.items,
        written = report.written,
        total_tokens = report.usage.total_tokens,
        "Data type embedding backfill complete"
    );
    Ok(report)
}

/// Backfill embeddings for property types.
#[instrument(skip_all, fields(subsystem = "jobs", op = "update_property_type_embeddings"))]
pub async fn update_property_type_embeddings(
    graph: &dyn GraphStore,
    embedding: &dyn EmbeddingBackend,
    authentication: Authentication,
    source: BackfillSource<PropertyType>,
    cancel: &CancelToken,
) -> Result<BackfillReport> {
    let items = match source {
        BackfillSource::Items(items) => items,
        BackfillSource::Filter(filter) => {
            let query = StructuralQuery::new(filter);
            invoke("get_property_types", OperationPolicy::graph(), cancel, || {
                graph.get_property_types(authentication, query.clone())
            })
            .await?
        }
    };

    let mut report = BackfillReport::default();
    for property_type in items {
        let output = invoke(
            "create_property_type_embeddings",
            OperationPolicy::ai(),
            cancel,
            || create_property_type_embeddings(embedding, &property_type),
        )
        .await?;

        report.items += 1;
        report.usage += output.usage;
        if output.embeddings.is_empty() {
            debug!(type_id = %property_type.schema.id, "No vectors produced, skipping write");
            continue;
        }

        let update = EmbeddingUpdate {
            embeddings: output.embeddings,
            updated_at_transaction_time: property_type
                .metadata
                .temporal_versioning
                .transaction_time,
            updated_at_decision_time: None,
        };
        invoke(
            "update_property_type_embeddings",
            OperationPolicy::graph(),
            cancel,
            || {
                graph.update_property_type_embeddings(
                    authentication,
                    property_type.schema.id.clone(),
                    update.clone(),
                )
            },
        )
        .await?;
        report.written += 1;
    }

    info!(
        item_count = report.items,
        written = report.written,
        total_tokens = report.usage.total_tokens,
        "Property type embedding backfill complete"
    );
    Ok(report)
}

/// Backfill embeddings for entity types.
#[instrument(skip_all, fields(subsystem = "jobs", op = "update_entity_type_embeddings"))]
pub async fn update_entity_type_embeddings(
    graph: &dyn GraphStore,
    embedding: &dyn EmbeddingBackend,
    authentication: Authentication,
    source: BackfillSource<EntityType>,
    cancel: &CancelToken,
) -> Result<BackfillReport> {
    let items = match source {
        BackfillSource::Items(items) => items,
        BackfillSource::Filter(filter) => {
            let query = StructuralQuery::new(filter);
            invoke("get_entity_types", OperationPolicy::graph(), cancel, || {
                graph.get_entity_types(authentication, query.clone())
            })
            .await?
        }
    };

    let mut report = BackfillReport::default();
    for entity_type in items {
        let output = invoke(
            "create_entity_type_embeddings",
            OperationPolicy::ai(),
            cancel,
            || create_entity_type_embeddings(embedding, &entity_type),
        )
        .await?;

        report.items += 1;
        report.usage += output.usage;
        if output.embeddings.is_empty() {
            debug!(type_id = %entity_type.schema.id, "No vectors produced, skipping write");
            continue;
        }

        let update = EmbeddingUpdate {
            embeddings: output.embeddings,
            updated_at_transaction_time: entity_type.metadata.temporal_versioning.transaction_time,
            updated_at_decision_time: None,
        };
        invoke(
            "update_entity_type_embeddings",
            OperationPolicy::graph(),
            cancel,
            || {
                graph.update_entity_type_embeddings(
                    authentication,
                    entity_type.schema.id.clone(),
                    update.clone(),
                )
            },
        )
        .await?;
        report.written += 1;
    }

    info!(
        item_count = report.items,
        written = report.written,
        total_tokens = report.usage.total_tokens,
        "Entity type embedding backfill complete"
    );
    Ok(report)
}

// =============================================================================
// ENTITY BACKFILL
// =============================================================================

/// Generate and write embeddings for a single entity. Returns the usage
/// consumed and whether a write happened.
async fn process_entity(
    graph: &dyn GraphStore,
    embedding: &dyn EmbeddingBackend,
    authentication: Authentication,
    entity: &Entity,
    cancel: &CancelToken,
) -> Result<(TokenUsage, bool)> {
    // Property titles come from the property-type closure of the entity's
    // type: full inheritance chain, directly constrained property types.
    let closure_query =
        StructuralQuery::new(Filter::for_versioned_url(&entity.metadata.entity_type_id))
            .with_resolve_depths(lattice_core::ontology::GraphResolveDepths::property_type_closure());
    let property_types = invoke(
        "get_entity_type_property_types",
        OperationPolicy::graph(),
        cancel,
        || graph.get_entity_type_property_types(authentication, closure_query.clone()),
    )
    .await?;

    let output = invoke("create_entity_embeddings", OperationPolicy::ai(), cancel, || {
        create_entity_embeddings(embedding, &entity.properties, &property_types)
    })
    .await?;

    if output.embeddings.is_empty() {
        debug!(
            entity_id = %entity.metadata.record_id.entity_id,
            "No vectors produced, skipping write"
        );
        return Ok((output.usage, false));
    }

    let update = EmbeddingUpdate {
        embeddings: output.embeddings,
        updated_at_transaction_time: entity.metadata.temporal_versioning.transaction_time,
        updated_at_decision_time: Some(entity.metadata.temporal_versioning.decision_time),
    };
    invoke(
        "update_entity_embeddings",
        OperationPolicy::graph(),
        cancel,
        || {
            graph.update_entity_embeddings(
                authentication,
                entity.metadata.record_id.entity_id.clone(),
                update.clone(),
            )
        },
    )
    .await?;
    Ok((output.usage, true))
}

/// Backfill embeddings for entities.
///
/// Filter mode pages through the store with the same filter every fetch;
/// processed entities stop matching once their embeddings land, so the set
/// drains toward exhaustion. Explicit-list mode processes the list in order
/// without the driver.
#[instrument(skip_all, fields(subsystem = "jobs", op = "update_entity_embeddings"))]
pub async fn update_entity_embeddings(
    graph: &dyn GraphStore,
    embedding: &dyn EmbeddingBackend,
    authentication: Authentication,
    source: BackfillSource<Entity>,
    cancel: &CancelToken,
) -> Result<BackfillReport> {
    let report = Mutex::new(BackfillReport::default());

    match source {
        BackfillSource::Items(items) => {
            for entity in &items {
                let (usage, written) =
                    process_entity(graph, embedding, authentication, entity, cancel).await?;
                let mut report = report.lock().unwrap_or_else(|e| e.into_inner());
                report.items += 1;
                report.usage += usage;
                if written {
                    report.written += 1;
                }
            }
        }
        BackfillSource::Filter(filter) => {
            let query = StructuralQuery::new(filter);
            for_each_page(
                |cursor| {
                    let query = query.clone();
                    async move {
                        invoke("get_entities", OperationPolicy::graph(), cancel, || {
                            graph.get_entities(
                                authentication,
                                query.clone(),
                                cursor.clone(),
                                EMBED_PAGE_LIMIT,
                            )
                        })
                        .await
                    }
                },
                |entity| {
                    let report = &report;
                    async move {
                        let (usage, written) =
                            process_entity(graph, embedding, authentication, &entity, cancel)
                                .await?;
                        let mut report = report.lock().unwrap_or_else(|e| e.into_inner());
                        report.items += 1;
                        report.usage += usage;
                        if written {
                            report.written += 1;
                        }
                        Ok(())
                    }
                },
            )
            .await?;
        }
    }

    let report = report.into_inner().unwrap_or_else(|e| e.into_inner());
    info!(
        item_count = report.items,
        written = report.written,
        total_tokens = report.usage.total_tokens,
        "Entity embedding backfill complete"
    );
    Ok(report)
}

/// Backfill embeddings for every user account's entities, strictly
/// sequentially per account, each pass under that account's authorization.
#[instrument(skip_all, fields(subsystem = "jobs", op = "update_all_entity_embeddings"))]
pub async fn update_all_entity_embeddings(
    graph: &dyn GraphStore,
    embedding: &dyn EmbeddingBackend,
    cancel: &CancelToken,
) -> Result<AllEntityBackfillReport> {
    let account_ids: Vec<AccountId> =
        invoke("get_user_account_ids", OperationPolicy::graph(), cancel, || {
            graph.get_user_account_ids()
        })
        .await?;

    let mut totals = BackfillReport::default();
    let accounts = account_ids.len();
    for account_id in account_ids {
        let report = update_entity_embeddings(
            graph,
            embedding,
            Authentication::new(account_id),
            BackfillSource::Filter(Filter::entities_missing_embeddings()),
            cancel,
        )
        .await?;
        debug!(
            actor_id = %account_id,
            item_count = report.items,
            "Per-account entity backfill complete"
        );
        totals.absorb(report);
    }

    info!(
        accounts,
        item_count = totals.items,
        total_tokens = totals.usage.total_tokens,
        "All-accounts entity embedding sweep complete"
    );
    Ok(AllEntityBackfillReport {
        accounts,
        items: totals.items,
        written: totals.written,
        usage: totals.usage,
    })
}

// =============================================================================
// HANDLERS
// =============================================================================

macro_rules! backfill_handler {
    ($name:ident, $job_name:literal, $item:ty, $run:path) => {
        pub struct $name {
            graph: Arc<dyn GraphStore>,
            embedding: Arc<dyn EmbeddingBackend>,
        }

        impl $name {
            pub fn new(graph: Arc<dyn GraphStore>, embedding: Arc<dyn EmbeddingBackend>) -> Self {
                Self { graph, embedding }
            }
        }

        #[async_trait]
        impl JobHandler for $name {
            fn job_name(&self) -> &'static str {
                $job_name
            }

            async fn execute(&self, ctx: JobContext) -> Result<JsonValue> {
                let params: BackfillParams<$item> = ctx.params()?;
                let report = $run(
                    self.graph.as_ref(),
                    self.embedding.as_ref(),
                    params.authentication,
                    params.source,
                    &ctx.cancel,
                )
                .await?;
                Ok(serde_json::to_value(report)?)
            }
        }
    };
}

backfill_handler!(
    DataTypeEmbeddingsHandler,
    "update_data_type_embeddings",
    DataType,
    update_data_type_embeddings
);
backfill_handler!(
    PropertyTypeEmbeddingsHandler,
    "update_property_type_embeddings",
    PropertyType,
    update_property_type_embeddings
);
backfill_handler!(
    EntityTypeEmbeddingsHandler,
    "update_entity_type_embeddings",
    EntityType,
    update_entity_type_embeddings
);
backfill_handler!(
    EntityEmbeddingsHandler,
    "update_entity_embeddings",
    Entity,
    update_entity_embeddings
);

/// Handler for the all-accounts entity sweep.
pub struct AllEntityEmbeddingsHandler {
    graph: Arc<dyn GraphStore>,
    embedding: Arc<dyn EmbeddingBackend>,
}

impl AllEntityEmbeddingsHandler {
    pub fn new(graph: Arc<dyn GraphStore>, embedding: Arc<dyn EmbeddingBackend>) -> Self {
        Self { graph, embedding }
    }
}

#[async_trait]
impl JobHandler for AllEntityEmbeddingsHandler {
    fn job_name(&self) -> &'static str {
        "update_all_entity_embeddings"
    }

    async fn execute(&self, ctx: JobContext) -> Result<JsonValue> {
        // The sweep takes no parameters: it enumerates accounts itself and
        // runs each pass under that account's own authorization.
        let report =
            update_all_entity_embeddings(self.graph.as_ref(), self.embedding.as_ref(), &ctx.cancel)
                .await?;
        Ok(serde_json::to_value(report)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_backfill_source_tagged_json() {
        let source: BackfillSource<Entity> =
            BackfillSource::Filter(Filter::entities_missing_embeddings());
        let value = serde_json::to_value(&source).unwrap();
        assert!(value.get("filter").is_some());

        let items: BackfillSource<u32> = serde_json::from_value(json!({"items": [1, 2]})).unwrap();
        assert!(matches!(items, BackfillSource::Items(v) if v == vec![1, 2]));
    }

    #[test]
    fn test_report_absorb_folds_usage() {
        let mut total = BackfillReport::default();
        total.absorb(BackfillReport {
            items: 2,
            written: 1,
            usage: TokenUsage::new(10, 10),
        });
        total.absorb(BackfillReport {
            items: 3,
            written: 3,
            usage: TokenUsage::new(5, 7),
        });
        assert_eq!(total.items, 5);
        assert_eq!(total.written, 4);
        assert_eq!(total.usage, TokenUsage::new(15, 17));
    }
}
