use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The unit a sync is tracked and deduplicated by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum SyncScope {
    /// The whole category tree, plus every category's products.
    All,
    /// Products of one category.
    Category(u64),
    /// Reduced refresh of one category.
    Quick(u64),
}

impl SyncScope {
    pub fn category_id(&self) -> Option<u64> {
        match self {
            SyncScope::All => None,
            SyncScope::Category(id) | SyncScope::Quick(id) => Some(*id),
        }
    }
}

impl fmt::Display for SyncScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncScope::All => write!(f, "all"),
            SyncScope::Category(id) => write!(f, "category:{}", id),
            SyncScope::Quick(id) => write!(f, "quick:{}", id),
        }
    }
}

impl FromStr for SyncScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "all" {
            return Ok(SyncScope::All);
        }
        let parse_id = |raw: &str| raw.parse::<u64>().map_err(|e| format!("Invalid scope '{}': {}", s, e));
        if let Some(raw) = s.strip_prefix("category:") {
            return parse_id(raw).map(SyncScope::Category);
        }
        if let Some(raw) = s.strip_prefix("quick:") {
            return parse_id(raw).map(SyncScope::Quick);
        }
        Err(format!("Unknown sync scope '{}'", s))
    }
}

impl From<SyncScope> for String {
    fn from(scope: SyncScope) -> Self {
        scope.to_string()
    }
}

impl TryFrom<String> for SyncScope {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Sync bookkeeping for one scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRecord {
    pub scope: SyncScope,
    pub last_success: Option<DateTime<Utc>>,
    pub last_attempt: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    /// Memory only; a record loaded from disk is never in flight.
    #[serde(skip)]
    pub in_flight: bool,
}

impl SyncRecord {
    pub fn new(scope: SyncScope) -> Self {
        Self {
            scope,
            last_success: None,
            last_attempt: None,
            last_error: None,
            in_flight: false,
        }
    }
}
