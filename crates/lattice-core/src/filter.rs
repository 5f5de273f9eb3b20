//! Structural query filters for the graph store.
//!
//! Filters are a tagged sum type matched exhaustively rather than a bag of
//! optional fields, and serialize to the store's structural-query JSON
//! (`{"all": [...]}`, `{"equal": [lhs, rhs]}`). The orchestration core never
//! evaluates a filter; it only constructs and forwards them.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::ontology::VersionedUrl;

/// One side of a comparison inside a [`Filter`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FilterExpression {
    /// A path into the queried object (e.g., `["versionedUrl"]`).
    Path(Vec<String>),
    /// A literal parameter. `JsonValue::Null` compares against absence.
    Parameter(JsonValue),
}

impl FilterExpression {
    pub fn path<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Path(segments.into_iter().map(Into::into).collect())
    }

    pub fn parameter(value: impl Into<JsonValue>) -> Self {
        Self::Parameter(value.into())
    }
}

/// A structural query filter, combinable with `all`/`any`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Filter {
    /// Conjunction: every sub-filter must match.
    All(Vec<Filter>),
    /// Disjunction: at least one sub-filter must match.
    Any(Vec<Filter>),
    /// Equality between two expressions.
    Equal(FilterExpression, FilterExpression),
    /// Inequality between two expressions.
    NotEqual(FilterExpression, FilterExpression),
}

impl Filter {
    /// Match objects whose versioned URL equals `id`.
    pub fn for_versioned_url(id: &VersionedUrl) -> Self {
        Filter::Equal(
            FilterExpression::path(["versionedUrl"]),
            FilterExpression::parameter(id.as_str()),
        )
    }

    /// Match entities that still need an embedding: none generated yet, and
    /// at least one property present to generate it from.
    ///
    /// Entities that gain an embedding drop out of this filter's result set,
    /// so a backfill re-issuing it drains to an empty page. For a full
    /// regeneration the stored embeddings must be wiped first.
    pub fn entities_missing_embeddings() -> Self {
        Filter::All(vec![
            Filter::Equal(
                FilterExpression::path(["embedding"]),
                FilterExpression::Parameter(JsonValue::Null),
            ),
            Filter::NotEqual(
                FilterExpression::path(["properties"]),
                FilterExpression::parameter(serde_json::json!({})),
            ),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_equal_json_shape() {
        let filter = Filter::Equal(
            FilterExpression::path(["versionedUrl"]),
            FilterExpression::parameter("https://example.org/v/1"),
        );
        let json = serde_json::to_value(&filter).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "equal": [
                    { "path": ["versionedUrl"] },
                    { "parameter": "https://example.org/v/1" }
                ]
            })
        );
    }

    #[test]
    fn test_entities_missing_embeddings_shape() {
        let json = serde_json::to_value(Filter::entities_missing_embeddings()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "all": [
                    { "equal": [{ "path": ["embedding"] }, { "parameter": null }] },
                    { "notEqual": [{ "path": ["properties"] }, { "parameter": {} }] }
                ]
            })
        );
    }

    #[test]
    fn test_filter_roundtrip() {
        let filter = Filter::Any(vec![
            Filter::for_versioned_url(&VersionedUrl::new("https://example.org/v/2")),
            Filter::entities_missing_embeddings(),
        ]);
        let json = serde_json::to_string(&filter).unwrap();
        let back: Filter = serde_json::from_str(&json).unwrap();
        assert_eq!(back, filter);
    }

    #[test]
    fn test_exhaustive_match() {
        // The variants are a closed set; this match is required to stay
        // exhaustive when new combinators are added.
        let filter = Filter::for_versioned_url(&VersionedUrl::new("https://example.org/v/1"));
        let described = match filter {
            Filter::All(_) => "all",
            Filter::Any(_) => "any",
            Filter::Equal(_, _) => "equal",
            Filter::NotEqual(_, _) => "notEqual",
        };
        assert_eq!(described, "equal");
    }
}
