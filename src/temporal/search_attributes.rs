//! Custom search attribute drift reconciliation
//!
//! The whole attribute mapping is recomputed from the spec and the server's
//! current state on every pass, so missed events or operator restarts never
//! leave drift behind. A type conflict on any shared name fails the pass
//! before anything is removed or added.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::TemporalClient;
use crate::Error;

/// Value type of a search attribute
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SearchAttributeType {
    /// Full-text searchable string
    #[serde(rename = "INDEXED_VALUE_TYPE_TEXT")]
    Text,
    /// Exact-match string
    #[serde(rename = "INDEXED_VALUE_TYPE_KEYWORD")]
    Keyword,
    /// 64-bit integer
    #[serde(rename = "INDEXED_VALUE_TYPE_INT")]
    Int,
    /// 64-bit float
    #[serde(rename = "INDEXED_VALUE_TYPE_DOUBLE")]
    Double,
    /// Boolean
    #[serde(rename = "INDEXED_VALUE_TYPE_BOOL")]
    Bool,
    /// Timestamp
    #[serde(rename = "INDEXED_VALUE_TYPE_DATETIME")]
    Datetime,
    /// List of exact-match strings
    #[serde(rename = "INDEXED_VALUE_TYPE_KEYWORD_LIST")]
    KeywordList,
}

impl SearchAttributeType {
    /// Every supported type
    pub const ALL: [SearchAttributeType; 7] = [
        Self::Text,
        Self::Keyword,
        Self::Int,
        Self::Double,
        Self::Bool,
        Self::Datetime,
        Self::KeywordList,
    ];

    /// Short name as written in specs
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "Text",
            Self::Keyword => "Keyword",
            Self::Int => "Int",
            Self::Double => "Double",
            Self::Bool => "Bool",
            Self::Datetime => "Datetime",
            Self::KeywordList => "KeywordList",
        }
    }

    /// Case-insensitive lookup of a spec type string
    pub fn from_spec(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(value))
    }
}

impl std::fmt::Display for SearchAttributeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Remote changes needed to make the server match the spec
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SearchAttributePlan {
    /// Names to remove, sorted
    pub remove: Vec<String>,
    /// Attributes to add
    pub add: BTreeMap<String, SearchAttributeType>,
}

impl SearchAttributePlan {
    /// True when the server already matches the spec
    pub fn is_empty(&self) -> bool {
        self.remove.is_empty() && self.add.is_empty()
    }
}

/// Translate spec type strings, failing on the first unsupported one
pub fn translate(
    spec: &BTreeMap<String, String>,
) -> Result<BTreeMap<String, SearchAttributeType>, Error> {
    spec.iter()
        .map(|(name, value)| {
            SearchAttributeType::from_spec(value)
                .map(|t| (name.clone(), t))
                .ok_or_else(|| Error::UnknownSearchAttributeType {
                    name: name.clone(),
                    value: value.clone(),
                })
        })
        .collect()
}

/// Compute the removal and addition sets
///
/// Fails without a plan if a spec type is unsupported or any name exists on
/// both sides with different types.
pub fn plan_search_attributes(
    spec: &BTreeMap<String, String>,
    remote: &BTreeMap<String, SearchAttributeType>,
) -> Result<SearchAttributePlan, Error> {
    let desired = translate(spec)?;

    if let Some((name, declared, existing)) = desired.iter().find_map(|(name, declared)| {
        remote
            .get(name)
            .filter(|existing| *existing != declared)
            .map(|existing| (name, declared, existing))
    }) {
        return Err(Error::SearchAttributeConflict {
            name: name.clone(),
            declared: declared.to_string(),
            existing: existing.to_string(),
        });
    }

    let remove = remote
        .keys()
        .filter(|name| !desired.contains_key(*name))
        .cloned()
        .collect();
    let add = desired
        .into_iter()
        .filter(|(name, _)| !remote.contains_key(name))
        .collect();

    Ok(SearchAttributePlan { remove, add })
}

/// Bring the server's custom search attributes in line with the spec
///
/// Lists, plans, then removes and adds as needed. Remote failures are
/// returned as-is; nothing is retried or split here.
pub async fn reconcile_search_attributes(
    client: &dyn TemporalClient,
    namespace: &str,
    spec: &BTreeMap<String, String>,
) -> Result<SearchAttributePlan, Error> {
    let remote = client.list_search_attributes(namespace).await?;
    let plan = plan_search_attributes(spec, &remote)?;

    if !plan.remove.is_empty() {
        client.remove_search_attributes(namespace, &plan.remove).await?;
        info!(%namespace, removed = ?plan.remove, "removed custom search attributes");
    }
    if !plan.add.is_empty() {
        client.add_search_attributes(namespace, &plan.add).await?;
        info!(%namespace, added = ?plan.add, "added custom search attributes");
    }

    Ok(plan)
}
