//! Request and response bodies for the reconciliation and extension services.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use semtab_model::{de_label, de_string_or_number, Candidate};

use crate::ordered::OrderedMap;

// ---------------------------------------------------------------------------
// Reconciliation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationRequest {
    pub service_id: String,
    pub items: Vec<ReconciliationItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub second_part: Option<OrderedMap<SecondaryValue>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub third_part: Option<OrderedMap<SecondaryValue>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationItem {
    pub id: String,
    pub label: String,
}

/// Per-row context value: `[label, [], columnName]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecondaryValue(pub String, pub Vec<Value>, pub String);

impl SecondaryValue {
    pub fn new(label: impl Into<String>, column: impl Into<String>) -> Self {
        Self(label.into(), Vec::new(), column.into())
    }
}

/// One entry of a reconciliation response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationResult {
    #[serde(deserialize_with = "de_string_or_number")]
    pub id: String,
    #[serde(default)]
    pub metadata: Vec<Candidate>,
}

// ---------------------------------------------------------------------------
// Extension
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionRequest {
    pub service_id: String,
    /// Column name -> row id -> entity id.
    pub items: OrderedMap<OrderedMap<String>>,
    #[serde(default)]
    pub property: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dates: Option<OrderedMap<SecondaryValue>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weather_params: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decimal_format: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtensionResponse {
    /// Property key -> new column, in service order.
    pub columns: OrderedMap<ExtensionColumn>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtensionColumn {
    #[serde(default, deserialize_with = "de_label")]
    pub label: String,
    pub cells: OrderedMap<ExtensionCell>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtensionCell {
    #[serde(deserialize_with = "de_label")]
    pub label: String,
    #[serde(default)]
    pub metadata: Vec<Candidate>,
}

// ---------------------------------------------------------------------------
// Service catalogue
// ---------------------------------------------------------------------------

/// Catalogue entry from `/reconciliators/list` or `/extenders/list`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceInfo {
    pub id: String,
    pub relative_url: String,
    pub name: String,
    /// Form fields the service accepts; older backends omit them.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub form_params: Vec<FormParam>,
}

/// One `formParams` field of a catalogue entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormParam {
    pub id: String,
    #[serde(default)]
    pub input_type: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub info_text: String,
    #[serde(default)]
    pub rules: Vec<String>,
    #[serde(default)]
    pub options: Vec<FormOption>,
}

impl FormParam {
    pub fn is_required(&self) -> bool {
        self.rules.iter().any(|r| r == "required")
    }

    pub fn option_ids(&self) -> impl Iterator<Item = &str> {
        self.options.iter().map(|o| o.id.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormOption {
    #[serde(deserialize_with = "de_string_or_number")]
    pub id: String,
    #[serde(default)]
    pub label: String,
}

/// A service's form fields split by the `required` rule, in catalogue order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ServiceParameters {
    pub mandatory: Vec<FormParam>,
    pub optional: Vec<FormParam>,
}

impl ServiceParameters {
    pub fn from_info(info: &ServiceInfo) -> Self {
        let (mandatory, optional): (Vec<_>, Vec<_>) =
            info.form_params.iter().cloned().partition(FormParam::is_required);
        Self { mandatory, optional }
    }

    /// Look a field up by id in either group.
    pub fn get(&self, id: &str) -> Option<&FormParam> {
        self.mandatory.iter().chain(&self.optional).find(|p| p.id == id)
    }
}
