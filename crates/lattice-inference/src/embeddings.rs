//! Embedding input construction and generation per graph object kind.
//!
//! Ontology types (data, property, entity types) embed as a single
//! `title: description` text. Entities embed one text per non-empty
//! property, tagged with the property's base URL, plus one untagged
//! combined text. An entity with no non-empty properties produces zero
//! embeddings without calling the backend.

use serde_json::Value as JsonValue;
use tracing::{debug, instrument};

use lattice_core::inference::EmbeddingOutput;
use lattice_core::ontology::{
    BaseUrl, DataType, Embedding, EntityProperties, EntityType, OntologySchema, PropertyType,
};
use lattice_core::Result;

use crate::provider::EmbeddingBackend;

/// The text an ontology type embeds as.
pub fn ontology_type_input(schema: &OntologySchema) -> String {
    match &schema.description {
        Some(description) => format!("{}: {}", schema.title, description),
        None => schema.title.clone(),
    }
}

/// Render a property value for embedding. `None` for values with no
/// embeddable content (null, empty string, empty containers).
fn property_value_text(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::Null => None,
        JsonValue::String(s) if s.trim().is_empty() => None,
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Array(a) if a.is_empty() => None,
        JsonValue::Object(o) if o.is_empty() => None,
        other => Some(other.to_string()),
    }
}

/// The texts an entity embeds as: one per non-empty property (tagged with
/// the property's base URL), then one untagged combined text.
///
/// Property types whose base URL has no value on the entity are skipped, as
/// are properties whose value is empty.
pub fn entity_embedding_inputs(
    properties: &EntityProperties,
    property_types: &[PropertyType],
) -> Vec<(Option<BaseUrl>, String)> {
    let mut inputs = Vec::new();
    let mut combined_lines = Vec::new();

    for property_type in property_types {
        let base_url = property_type.schema.id.base_url();
        let Some(value) = properties.get(&base_url) else {
            continue;
        };
        let Some(text) = property_value_text(value) else {
            continue;
        };

        let line = format!("{}: {}", property_type.schema.title, text);
        combined_lines.push(line.clone());
        inputs.push((Some(base_url), line));
    }

    if !combined_lines.is_empty() {
        inputs.push((None, combined_lines.join("\n")));
    }

    inputs
}

async fn embed_tagged(
    backend: &dyn EmbeddingBackend,
    inputs: Vec<(Option<BaseUrl>, String)>,
) -> Result<EmbeddingOutput> {
    if inputs.is_empty() {
        return Ok(EmbeddingOutput::default());
    }

    let (tags, texts): (Vec<_>, Vec<_>) = inputs.into_iter().unzip();
    let (vectors, usage) = backend.embed_texts(&texts).await?;

    // The backend may legitimately produce fewer vectors than inputs (it
    // filters content it cannot embed); usage is reported regardless.
    let embeddings = tags
        .into_iter()
        .zip(vectors)
        .map(|(property, vector)| Embedding { property, vector })
        .collect();

    Ok(EmbeddingOutput { embeddings, usage })
}

async fn embed_ontology_type(
    backend: &dyn EmbeddingBackend,
    schema: &OntologySchema,
) -> Result<EmbeddingOutput> {
    let output = embed_tagged(backend, vec![(None, ontology_type_input(schema))]).await?;
    debug!(
        type_id = %schema.id,
        embedding_count = output.embeddings.len(),
        total_tokens = output.usage.total_tokens,
        "Generated ontology type embeddings"
    );
    Ok(output)
}

/// Generate embeddings for a data type.
#[instrument(skip_all, fields(subsystem = "inference", op = "create_data_type_embeddings"))]
pub async fn create_data_type_embeddings(
    backend: &dyn EmbeddingBackend,
    data_type: &DataType,
) -> Result<EmbeddingOutput> {
    embed_ontology_type(backend, &data_type.schema).await
}

/// Generate embeddings for a property type.
#[instrument(skip_all, fields(subsystem = "inference", op = "create_property_type_embeddings"))]
pub async fn create_property_type_embeddings(
    backend: &dyn EmbeddingBackend,
    property_type: &PropertyType,
) -> Result<EmbeddingOutput> {
    embed_ontology_type(backend, &property_type.schema).await
}

/// Generate embeddings for an entity type.
#[instrument(skip_all, fields(subsystem = "inference", op = "create_entity_type_embeddings"))]
pub async fn create_entity_type_embeddings(
    backend: &dyn EmbeddingBackend,
    entity_type: &EntityType,
) -> Result<EmbeddingOutput> {
    embed_ontology_type(backend, &entity_type.schema).await
}

/// Generate embeddings for an entity's property values.
///
/// `property_types` is the property-type closure of the entity's type,
/// resolved by the caller from the graph store.
#[instrument(skip_all, fields(subsystem = "inference", op = "create_entity_embeddings"))]
pub async fn create_entity_embeddings(
    backend: &dyn EmbeddingBackend,
    properties: &EntityProperties,
    property_types: &[PropertyType],
) -> Result<EmbeddingOutput> {
    embed_tagged(backend, entity_embedding_inputs(properties, property_types)).await
}
