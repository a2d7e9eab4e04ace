use chrono::{DateTime, Local};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::fmt;

/// A deal pipeline as listed by the CRM. Stage definitions and other
/// metadata in the payload are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pipeline {
    pub id: String,
    pub label: String,
}

/// A raw deal record. Property values are coerced to strings while decoding;
/// `null` and non-scalar values become `None`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deal {
    pub id: String,
    #[serde(default, deserialize_with = "deserialize_properties")]
    pub properties: HashMap<String, Option<String>>,
}

impl Deal {
    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties.get(name).and_then(|v| v.as_deref())
    }
}

fn deserialize_properties<'de, D>(
    deserializer: D,
) -> std::result::Result<HashMap<String, Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<HashMap<String, serde_json::Value>> = Option::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .map(|(key, value)| {
            let value = match value {
                serde_json::Value::String(s) => Some(s),
                serde_json::Value::Number(n) => Some(n.to_string()),
                serde_json::Value::Bool(b) => Some(b.to_string()),
                _ => None,
            };
            (key, value)
        })
        .collect())
}

/// The fixed-shape spreadsheet row derived from a [`Deal`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DealRow {
    pub name: String,
    /// Decimal string exactly as the CRM returned it, or empty.
    pub amount: String,
    pub stage: String,
    pub close_date: String,
    pub created_date: String,
}

impl DealRow {
    pub const HEADERS: [&'static str; 5] = [
        "Deal Name",
        "Amount",
        "Deal Stage",
        "Close Date",
        "Created Date",
    ];

    /// Cell values in header order.
    pub fn cells(&self) -> [&str; 5] {
        [
            self.name.as_str(),
            self.amount.as_str(),
            self.stage.as_str(),
            self.close_date.as_str(),
            self.created_date.as_str(),
        ]
    }
}

#[derive(Debug, Clone)]
pub struct Report {
    pub pipeline: Pipeline,
    /// In the order the CRM returned the deals.
    pub rows: Vec<DealRow>,
    pub generated_at: DateTime<Local>,
}

/// Output of the extract phase.
#[derive(Debug, Clone)]
pub struct Extracted {
    pub pipeline: Pipeline,
    pub deals: Vec<Deal>,
}

/// One page of a cursor-paginated listing.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub results: Vec<T>,
    pub next_cursor: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub limit: u32,
    pub after: Option<String>,
    pub properties: Vec<String>,
}

impl PageRequest {
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![("limit", self.limit.to_string())];
        if !self.properties.is_empty() {
            pairs.push(("properties", self.properties.join(",")));
        }
        if let Some(after) = &self.after {
            pairs.push(("after", after.clone()));
        }
        pairs
    }
}

/// Which pipeline a run exports.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineSelector {
    /// The first pipeline in API order.
    #[default]
    First,
    ById(String),
    /// Case-insensitive label match.
    ByLabel(String),
}

impl fmt::Display for PipelineSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineSelector::First => write!(f, "the first pipeline"),
            PipelineSelector::ById(id) => write!(f, "pipeline id '{}'", id),
            PipelineSelector::ByLabel(label) => write!(f, "pipeline label '{}'", label),
        }
    }
}
