use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::serde_ids::de_string_or_number;

// ---------------------------------------------------------------------------
// Candidate
// ---------------------------------------------------------------------------

/// One proposed knowledge-base entity for a cell or column.
///
/// Candidates are not sorted; the first one with `match == true` is the
/// canonical entity (see [`canonical_candidate`]). Knowledge-base properties
/// the service attaches beyond the fixed fields are kept in `properties`
/// and survive a parse/serialize cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    #[serde(deserialize_with = "de_string_or_number")]
    pub id: String,
    #[serde(default)]
    pub name: EntityName,
    #[serde(default)]
    pub score: f64,
    #[serde(rename = "match", default)]
    pub matched: bool,
    #[serde(rename = "type", default)]
    pub types: Vec<EntityType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature: Option<Vec<Value>>,
    #[serde(flatten)]
    pub properties: Map<String, Value>,
}

impl Candidate {
    pub fn new(id: impl Into<String>, name: impl Into<String>, score: f64, matched: bool) -> Self {
        Self {
            id: id.into(),
            name: EntityName {
                value: name.into(),
                uri: String::new(),
            },
            score,
            matched,
            types: Vec::new(),
            feature: None,
            properties: Map::new(),
        }
    }

    /// The id without its knowledge-base prefix (`"geo:123"` -> `"123"`).
    pub fn local_id(&self) -> &str {
        self.id.rsplit(':').next().unwrap_or(&self.id)
    }

    /// Project a named property to a cell label.
    ///
    /// `id`, `name` and `uri` read the fixed fields; any other key is looked
    /// up in the knowledge-base properties. Returns `None` when the property
    /// is absent, null, or not representable as a label.
    pub fn project(&self, property: &str) -> Option<String> {
        match property {
            "id" => Some(self.id.clone()),
            "name" => Some(self.name.value.clone()),
            "uri" if !self.name.uri.is_empty() => Some(self.name.uri.clone()),
            _ => self.properties.get(property).and_then(value_label),
        }
    }
}

fn value_label(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        // Multi-valued properties keep their first value.
        Value::Array(items) => items.first().and_then(value_label),
        Value::Object(obj) => obj
            .get("value")
            .or_else(|| obj.get("id"))
            .and_then(value_label),
        Value::Null => None,
    }
}

/// First candidate with `match == true`.
pub fn canonical_candidate(candidates: &[Candidate]) -> Option<&Candidate> {
    candidates.iter().find(|c| c.matched)
}

// ---------------------------------------------------------------------------
// Entity name / type
// ---------------------------------------------------------------------------

/// Display name plus resolvable URI.
///
/// Services may send the name as a bare string; it decodes with an empty
/// `uri` that reconciliation later fills from the service's base URI.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EntityName {
    pub value: String,
    pub uri: String,
}

impl<'de> Deserialize<'de> for EntityName {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Plain(String),
            Full {
                #[serde(default)]
                value: String,
                #[serde(default)]
                uri: String,
            },
        }

        Ok(match Option::<Repr>::deserialize(deserializer)? {
            None => EntityName::default(),
            Some(Repr::Plain(value)) => EntityName {
                value,
                uri: String::new(),
            },
            Some(Repr::Full { value, uri }) => EntityName { value, uri },
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityType {
    #[serde(deserialize_with = "de_string_or_number")]
    pub id: String,
    #[serde(default)]
    pub name: String,
}

// ---------------------------------------------------------------------------
// Annotation summary
// ---------------------------------------------------------------------------

/// Summarized annotation state of a cell or column.
///
/// Every field defaults so that the `{}` placeholder the backend stores on
/// freshly extended columns decodes as "not annotated".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AnnotationMeta {
    pub annotated: bool,
    #[serde(rename = "match")]
    pub match_info: MatchInfo,
    pub lowest_score: f64,
    pub highest_score: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchInfo {
    pub value: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bare_string_name_decodes() {
        let c: Candidate = serde_json::from_value(json!({
            "id": "geo:1", "name": "Rome", "score": 0.9, "match": true, "type": []
        }))
        .unwrap();
        assert_eq!(c.name.value, "Rome");
        assert_eq!(c.name.uri, "");
        assert!(c.matched);
        assert!(c.properties.is_empty());
    }

    #[test]
    fn missing_score_defaults_to_zero() {
        let c: Candidate = serde_json::from_value(json!({"id": "geo:1"})).unwrap();
        assert_eq!(c.score, 0.0);
        assert!(!c.matched);
    }

    #[test]
    fn extra_properties_round_trip() {
        let raw = json!({
            "id": "wd:Q220",
            "name": {"value": "Rome", "uri": "https://www.wikidata.org/wiki/Q220"},
            "score": 1.0,
            "match": true,
            "type": [{"id": "wd:Q515", "name": "city"}],
            "population": 2873000
        });
        let c: Candidate = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(c.project("population").as_deref(), Some("2873000"));
        assert_eq!(serde_json::to_value(&c).unwrap(), raw);
    }

    #[test]
    fn project_fixed_fields() {
        let c = Candidate::new("geo:3169070", "Rome", 1.0, true);
        assert_eq!(c.project("id").as_deref(), Some("geo:3169070"));
        assert_eq!(c.project("name").as_deref(), Some("Rome"));
        assert_eq!(c.project("uri"), None);
        assert_eq!(c.project("population"), None);
        assert_eq!(c.local_id(), "3169070");
    }

    #[test]
    fn canonical_is_first_match() {
        let list = vec![
            Candidate::new("a", "A", 0.9, false),
            Candidate::new("b", "B", 0.5, true),
            Candidate::new("c", "C", 0.7, true),
        ];
        assert_eq!(canonical_candidate(&list).map(|c| c.id.as_str()), Some("b"));
        assert!(canonical_candidate(&list[..1]).is_none());
    }

    #[test]
    fn empty_annotation_meta_is_unannotated() {
        let meta: AnnotationMeta = serde_json::from_value(json!({})).unwrap();
        assert!(!meta.annotated);
    }
}
