//! Cost accounting for metered external calls
//!
//! Prices are fixed when the monitor is built: the built-in
//! [`PriceTable::default`] merged with any configured overrides. Which
//! price a metric pays is decided by a [`CostAttributor`]; the default
//! [`HeuristicCostAttributor`] matches service aliases and operation-name
//! substrings.

use std::collections::BTreeMap;

use mealwise_domain::constants::{
    SERVICE_AI_INFERENCE, SERVICE_NUTRITION_DB, SERVICE_REMOTE_DB, SERVICE_VECTOR_SEARCH,
};
use mealwise_domain::CostSummary;

/// Canonical cost keys of the built-in price table
pub mod cost_keys {
    pub const OPENAI_EMBEDDING: &str = "openai_embedding";
    pub const OPENAI_VISION: &str = "openai_vision";
    pub const OPENAI_COMPLETION: &str = "openai_completion";
    pub const PINECONE_UPSERT: &str = "pinecone_upsert";
    pub const PINECONE_QUERY: &str = "pinecone_query";
    pub const NUTRITION_LOOKUP: &str = "nutrition_lookup";
    pub const FIRESTORE_READ: &str = "firestore_read";
    pub const FIRESTORE_WRITE: &str = "firestore_write";
}

/* -------------------------------------------------------------------------- */
/* Price Table */
/* -------------------------------------------------------------------------- */

/// Unit price in USD per cost key
#[derive(Debug, Clone, PartialEq)]
pub struct PriceTable {
    prices: BTreeMap<String, f64>,
}

impl Default for PriceTable {
    fn default() -> Self {
        use cost_keys::*;

        Self::new([
            (OPENAI_EMBEDDING, 0.0001),
            (OPENAI_VISION, 0.01),
            (OPENAI_COMPLETION, 0.002),
            (PINECONE_UPSERT, 0.0002),
            (PINECONE_QUERY, 0.0004),
            (NUTRITION_LOOKUP, 0.001),
            (FIRESTORE_READ, 0.000_000_36),
            (FIRESTORE_WRITE, 0.000_001_8),
        ])
    }
}

impl PriceTable {
    pub fn new<K: Into<String>>(prices: impl IntoIterator<Item = (K, f64)>) -> Self {
        Self { prices: prices.into_iter().map(|(key, price)| (key.into(), price)).collect() }
    }

    /// Replace or add prices, returning the merged table
    pub fn with_overrides(mut self, overrides: &BTreeMap<String, f64>) -> Self {
        for (key, price) in overrides {
            self.prices.insert(key.clone(), *price);
        }
        self
    }

    /// Unit cost for a key, `0.0` when the key is not priced
    pub fn unit_cost(&self, key: &str) -> f64 {
        self.prices.get(key).copied().unwrap_or(0.0)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.prices.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.prices.iter().map(|(key, price)| (key.as_str(), *price))
    }
}

/* -------------------------------------------------------------------------- */
/* Cost Tracker */
/* -------------------------------------------------------------------------- */

/// Usage counts and accumulated cost per cost key
#[derive(Debug, Clone, Default)]
pub struct CostTracker {
    prices: PriceTable,
    usage: BTreeMap<String, u64>,
    costs: BTreeMap<String, f64>,
}

impl CostTracker {
    pub fn new(prices: PriceTable) -> Self {
        Self { prices, usage: BTreeMap::new(), costs: BTreeMap::new() }
    }

    /// Add `count` uses of `key`; unknown keys accrue usage at zero cost
    pub fn track_usage(&mut self, key: &str, count: u64) {
        let unit_cost = self.prices.unit_cost(key);
        *self.usage.entry(key.to_string()).or_insert(0) += count;
        *self.costs.entry(key.to_string()).or_insert(0.0) += unit_cost * count as f64;
    }

    pub fn total_cost(&self) -> f64 {
        self.costs.values().fold(0.0, |total, cost| total + cost)
    }

    /// Accumulated cost per key (owned copy)
    pub fn cost_breakdown(&self) -> BTreeMap<String, f64> {
        self.costs.clone()
    }

    /// Usage count per key (owned copy)
    pub fn usage_breakdown(&self) -> BTreeMap<String, u64> {
        self.usage.clone()
    }

    pub fn prices(&self) -> &PriceTable {
        &self.prices
    }

    pub fn summary(&self) -> CostSummary {
        CostSummary {
            total_cost_usd: self.total_cost(),
            cost_breakdown: self.cost_breakdown(),
            usage_breakdown: self.usage_breakdown(),
        }
    }

    /// Zero usage and cost; prices are kept
    pub fn reset(&mut self) {
        self.usage.clear();
        self.costs.clear();
    }
}

/* -------------------------------------------------------------------------- */
/* Attribution */
/* -------------------------------------------------------------------------- */

/// Maps a recorded call to the cost key it should be charged under
///
/// Returning `None` means the call is not billable and is left out of cost
/// accounting entirely.
pub trait CostAttributor: Send + Sync {
    fn cost_key(&self, service: &str, operation: &str) -> Option<String>;
}

/// One provider's aliases and its operation-substring routes, checked in
/// order
#[derive(Debug, Clone, Copy)]
struct ProviderRule {
    aliases: &'static [&'static str],
    routes: &'static [(&'static [&'static str], &'static str)],
}

const PROVIDER_RULES: &[ProviderRule] = &[
    ProviderRule {
        aliases: &["openai", SERVICE_AI_INFERENCE],
        routes: &[
            (&["embedding"], cost_keys::OPENAI_EMBEDDING),
            (&["vision", "image"], cost_keys::OPENAI_VISION),
            (&["completion", "chat", "advice"], cost_keys::OPENAI_COMPLETION),
        ],
    },
    ProviderRule {
        aliases: &["pinecone", SERVICE_VECTOR_SEARCH],
        routes: &[
            (&["upsert"], cost_keys::PINECONE_UPSERT),
            (&["query", "search"], cost_keys::PINECONE_QUERY),
        ],
    },
    ProviderRule {
        aliases: &["nutritionix", SERVICE_NUTRITION_DB, "nutrition"],
        routes: &[(&["lookup", "search", "nutrient"], cost_keys::NUTRITION_LOOKUP)],
    },
    ProviderRule {
        aliases: &[SERVICE_REMOTE_DB, "firebase"],
        routes: &[
            (&["read", "get", "query", "list"], cost_keys::FIRESTORE_READ),
            (&["write", "set", "update", "add", "delete"], cost_keys::FIRESTORE_WRITE),
        ],
    },
];

/// Service-alias and operation-substring attribution
///
/// The service must equal a known alias (ignoring case); the first route
/// whose substring appears in the lowercased operation wins.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicCostAttributor;

impl CostAttributor for HeuristicCostAttributor {
    fn cost_key(&self, service: &str, operation: &str) -> Option<String> {
        let rule = PROVIDER_RULES
            .iter()
            .find(|rule| rule.aliases.iter().any(|alias| service.eq_ignore_ascii_case(alias)))?;

        let operation = operation.to_ascii_lowercase();
        rule.routes
            .iter()
            .find(|(needles, _)| needles.iter().any(|needle| operation.contains(needle)))
            .map(|(_, key)| (*key).to_string())
    }
}
