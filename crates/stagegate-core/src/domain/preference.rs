//! Operator-configured gate thresholds.
//!
//! Thresholds are read through the preference store, keyed by a fixed
//! enumerated set of keys and scoped to the approving principal. Absent
//! keys resolve to the documented defaults below.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use venture_state::{PreferenceStore, StorageResult};

/// The fixed set of threshold preference keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreferenceKey {
    CostMaxUsd,
    MinScore,
    ApprovedTechList,
    ApprovedVendorList,
    PivotKeywords,
}

impl PreferenceKey {
    /// All keys, in evaluation order.
    pub const ALL: [PreferenceKey; 5] = [
        Self::CostMaxUsd,
        Self::MinScore,
        Self::ApprovedTechList,
        Self::ApprovedVendorList,
        Self::PivotKeywords,
    ];

    /// Canonical store key.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CostMaxUsd => "filter.cost_max_usd",
            Self::MinScore => "filter.min_score",
            Self::ApprovedTechList => "filter.approved_tech_list",
            Self::ApprovedVendorList => "filter.approved_vendor_list",
            Self::PivotKeywords => "filter.pivot_keywords",
        }
    }
}

/// Resolved threshold values for one gate evaluation.
///
/// Defaults: cost ceiling $5,000, minimum score 6.0, empty allow-lists
/// (no restriction), pivot keyword "pivot".
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GateThresholds {
    pub cost_max_usd: f64,
    pub min_score: f64,
    pub approved_tech_list: Vec<String>,
    pub approved_vendor_list: Vec<String>,
    pub pivot_keywords: Vec<String>,
}

impl Default for GateThresholds {
    fn default() -> Self {
        Self {
            cost_max_usd: 5000.0,
            min_score: 6.0,
            approved_tech_list: Vec::new(),
            approved_vendor_list: Vec::new(),
            pivot_keywords: vec!["pivot".to_string()],
        }
    }
}

fn string_list(value: &serde_json::Value) -> Option<Vec<String>> {
    value.as_array().map(|items| {
        items
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect()
    })
}

impl GateThresholds {
    /// Overlay store values onto the defaults. Values of the wrong type
    /// are ignored rather than coerced.
    pub fn from_values(values: &HashMap<String, serde_json::Value>) -> Self {
        let mut thresholds = Self::default();
        if let Some(v) = values
            .get(PreferenceKey::CostMaxUsd.as_str())
            .and_then(|v| v.as_f64())
        {
            thresholds.cost_max_usd = v;
        }
        if let Some(v) = values
            .get(PreferenceKey::MinScore.as_str())
            .and_then(|v| v.as_f64())
        {
            thresholds.min_score = v;
        }
        if let Some(v) = values
            .get(PreferenceKey::ApprovedTechList.as_str())
            .and_then(string_list)
        {
            thresholds.approved_tech_list = v;
        }
        if let Some(v) = values
            .get(PreferenceKey::ApprovedVendorList.as_str())
            .and_then(string_list)
        {
            thresholds.approved_vendor_list = v;
        }
        if let Some(v) = values
            .get(PreferenceKey::PivotKeywords.as_str())
            .and_then(string_list)
        {
            thresholds.pivot_keywords = v;
        }
        thresholds
    }
}

/// Read-only accessor resolving typed thresholds for an approving
/// principal.
#[derive(Clone)]
pub struct GateThresholdStore {
    store: Arc<dyn PreferenceStore>,
}

impl GateThresholdStore {
    pub fn new(store: Arc<dyn PreferenceStore>) -> Self {
        Self { store }
    }

    /// Resolve the threshold set for a principal, venture-scoped values
    /// taking precedence. Store failures propagate so gate evaluation
    /// can fail closed.
    pub async fn resolve(
        &self,
        principal_id: &str,
        venture_id: Option<Uuid>,
    ) -> StorageResult<GateThresholds> {
        let keys: Vec<String> = PreferenceKey::ALL
            .iter()
            .map(|k| k.as_str().to_string())
            .collect();
        let values = self
            .store
            .get_preferences(principal_id, venture_id, &keys)
            .await?;
        Ok(GateThresholds::from_values(&values))
    }
}
