//! Catalog and control identifiers that claims are filed against.

use serde::{Deserialize, Serialize};

/// Default catalog used when no assessment plan is configured.
pub const DEFAULT_CATALOG_ID: &str = "default-catalog";

/// Placeholder control until a control-mapping provider is wired in.
pub const PLACEHOLDER_CONTROL_ID: &str = "CTRL-1";

/// Placeholder requirement under [`PLACEHOLDER_CONTROL_ID`].
pub const PLACEHOLDER_REQUIREMENT_ID: &str = "CTRL-1.1";

/// Where a claim sits in a compliance catalog.
///
/// Every claim built by the agent carries the plan's catalog, control and
/// requirement identifiers. The metrics gauge exposes `catalog_id` as the
/// `baseline_id` label.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct AssessmentPlan {
    /// The catalog (baseline) the claim is evidence for.
    pub catalog_id: String,
    /// The control within the catalog.
    pub control_id: String,
    /// The requirement within the control.
    pub requirement_id: String,
}

impl AssessmentPlan {
    /// A plan for `catalog_id` using the placeholder control mapping.
    pub fn for_catalog(catalog_id: impl Into<String>) -> Self {
        Self {
            catalog_id: catalog_id.into(),
            ..Self::default()
        }
    }
}

impl Default for AssessmentPlan {
    fn default() -> Self {
        Self {
            catalog_id: DEFAULT_CATALOG_ID.to_string(),
            control_id: PLACEHOLDER_CONTROL_ID.to_string(),
            requirement_id: PLACEHOLDER_REQUIREMENT_ID.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_catalog_keeps_placeholder_mapping() {
        let plan = AssessmentPlan::for_catalog("pci-dss");
        assert_eq!(plan.catalog_id, "pci-dss");
        assert_eq!(plan.control_id, "CTRL-1");
        assert_eq!(plan.requirement_id, "CTRL-1.1");
    }

    #[test]
    fn test_partial_plan_fills_defaults() {
        let plan: AssessmentPlan = serde_json::from_str(r#"{"catalog_id": "nist-800-53"}"#).unwrap();
        assert_eq!(plan.catalog_id, "nist-800-53");
        assert_eq!(plan.control_id, PLACEHOLDER_CONTROL_ID);
    }
}
