use crate::domain::aliases::{AliasTable, CanonicalField};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

pub const UNKNOWN_PREFIX: &str = "unknown:";

const SUMMARY_TYPE: &str = "summary";
const SUMMARY_TEXT_KEY: &str = "summary";
const SUMMARY_LEAF_KEY: &str = "leafUuid";
const FLATTENED_MESSAGE_KEYS: [&str; 2] = ["content", "text"];

#[derive(Clone, Debug, PartialEq)]
pub enum EntryVariant {
    Standard,
    /// Session summaries only carry their text and the uuid of the leaf message they describe.
    Summary {
        summary: String,
        leaf_uuid: Option<String>,
    },
    /// The line held valid JSON that is not an object. `reason` is a kind name, never content.
    Unparseable { raw: Value, reason: &'static str },
}

#[derive(Clone, Debug, PartialEq)]
pub struct NormalizedMessage {
    pub role: String,
    pub content: Option<Value>,
    /// `id`, `model`, `usage`, `stop_reason` when the producer sent them.
    pub extra: BTreeMap<String, Value>,
}

impl NormalizedMessage {
    pub fn usage(&self) -> Option<&Value> {
        self.extra.get("usage")
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct NormalizedEntry {
    pub variant: EntryVariant,
    fields: BTreeMap<CanonicalField, Value>,
    pub message: Option<NormalizedMessage>,
    unknown: BTreeMap<String, Value>,
}

impl NormalizedEntry {
    fn empty(variant: EntryVariant) -> Self {
        Self {
            variant,
            fields: BTreeMap::new(),
            message: None,
            unknown: BTreeMap::new(),
        }
    }

    pub fn field(&self, field: CanonicalField) -> Option<&Value> {
        self.fields.get(&field)
    }

    pub fn str_field(&self, field: CanonicalField) -> Option<&str> {
        self.field(field).and_then(|v| v.as_str())
    }

    /// Truthiness of a flag field. Producers have written these as bools and as strings.
    pub fn flag(&self, field: CanonicalField) -> bool {
        match self.field(field) {
            Some(Value::Bool(value)) => *value,
            Some(Value::String(value)) => value.eq_ignore_ascii_case("true"),
            Some(Value::Number(value)) => value.as_i64().is_some_and(|n| n != 0),
            _ => false,
        }
    }

    pub fn entry_type(&self) -> Option<&str> {
        match &self.variant {
            EntryVariant::Summary { .. } => Some(SUMMARY_TYPE),
            _ => self.str_field(CanonicalField::Type),
        }
    }

    pub fn tool_use_result(&self) -> Option<&Value> {
        self.field(CanonicalField::ToolUseResult)
    }

    pub fn content(&self) -> Option<&Value> {
        self.message.as_ref().and_then(|message| message.content.as_ref())
    }

    pub fn unknown_keys(&self) -> impl Iterator<Item = &str> {
        self.unknown.keys().map(String::as_str)
    }

    pub fn is_unparseable(&self) -> bool {
        matches!(self.variant, EntryVariant::Unparseable { .. })
    }

    /// Flat JSON view: canonical names, then every unknown key under `unknown:<name>`.
    pub fn to_json(&self) -> Value {
        let mut out = Map::new();
        for (field, value) in &self.fields {
            out.insert(field.name().to_string(), value.clone());
        }
        match &self.variant {
            EntryVariant::Standard => {}
            EntryVariant::Summary { summary, leaf_uuid } => {
                out.insert("type".to_string(), Value::from(SUMMARY_TYPE));
                out.insert(SUMMARY_TEXT_KEY.to_string(), Value::from(summary.as_str()));
                out.insert(
                    SUMMARY_LEAF_KEY.to_string(),
                    leaf_uuid.clone().map(Value::from).unwrap_or(Value::Null),
                );
            }
            EntryVariant::Unparseable { raw, reason } => {
                out.insert("raw".to_string(), raw.clone());
                out.insert("parseError".to_string(), Value::from(*reason));
            }
        }
        if let Some(message) = &self.message {
            let mut msg = Map::new();
            msg.insert("role".to_string(), Value::from(message.role.as_str()));
            msg.insert(
                "content".to_string(),
                message.content.clone().unwrap_or(Value::Null),
            );
            for (key, value) in &message.extra {
                msg.insert(key.clone(), value.clone());
            }
            out.insert("message".to_string(), Value::Object(msg));
        }
        for (key, value) in &self.unknown {
            out.insert(format!("{UNKNOWN_PREFIX}{key}"), value.clone());
        }
        Value::Object(out)
    }
}

/// Projects raw log values onto the canonical entry shape using an alias table.
#[derive(Clone, Debug, Default)]
pub struct EntryNormalizer {
    aliases: AliasTable,
}

impl EntryNormalizer {
    pub fn new(aliases: AliasTable) -> Self {
        Self { aliases }
    }

    pub fn aliases(&self) -> &AliasTable {
        &self.aliases
    }

    pub fn normalize(&self, raw: &Value) -> NormalizedEntry {
        let Some(obj) = raw.as_object() else {
            return NormalizedEntry::empty(EntryVariant::Unparseable {
                raw: raw.clone(),
                reason: "NotAnObject",
            });
        };

        let mut matched: BTreeSet<&str> = BTreeSet::new();
        let type_key = find_alias(obj, self.aliases.aliases_for(CanonicalField::Type));

        if type_key.and_then(|key| obj.get(key)).and_then(|v| v.as_str()) == Some(SUMMARY_TYPE) {
            return self.normalize_summary(obj, type_key);
        }

        let mut fields = BTreeMap::new();
        let mut message: Option<NormalizedMessage> = None;
        for entry in self.aliases.fields() {
            let Some(key) = find_alias(obj, &entry.aliases) else {
                continue;
            };
            let Some(value) = obj.get(key) else {
                continue;
            };
            if entry.field == CanonicalField::Message {
                // A message of unusable shape stays in the unknown namespace.
                let Some(normalized) = self.normalize_message(value) else {
                    continue;
                };
                message = Some(normalized);
            } else {
                fields.insert(entry.field, value.clone());
            }
            matched.insert(key);
        }

        let message = match message {
            Some(message) => Some(message),
            None => {
                let flattened = FLATTENED_MESSAGE_KEYS
                    .iter()
                    .filter(|key| obj.contains_key(**key))
                    .copied()
                    .collect::<Vec<_>>();
                if flattened.is_empty() {
                    None
                } else {
                    matched.extend(flattened);
                    Some(self.normalize_message_object(obj))
                }
            }
        };

        NormalizedEntry {
            variant: EntryVariant::Standard,
            fields,
            message,
            unknown: collect_unknown(obj, &matched),
        }
    }

    fn normalize_summary(
        &self,
        obj: &Map<String, Value>,
        type_key: Option<&str>,
    ) -> NormalizedEntry {
        let summary_text = obj.get(SUMMARY_TEXT_KEY).and_then(|v| v.as_str());
        let leaf_uuid = obj.get(SUMMARY_LEAF_KEY).and_then(|v| v.as_str());

        // Non-string values supply nothing and stay in the unknown namespace.
        let mut matched: BTreeSet<&str> = BTreeSet::new();
        matched.extend(type_key);
        if summary_text.is_some() {
            matched.insert(SUMMARY_TEXT_KEY);
        }
        if leaf_uuid.is_some() {
            matched.insert(SUMMARY_LEAF_KEY);
        }

        let summary = summary_text.unwrap_or("").to_string();
        let leaf_uuid = leaf_uuid.map(str::to_string);
        let mut entry = NormalizedEntry::empty(EntryVariant::Summary { summary, leaf_uuid });
        entry.unknown = collect_unknown(obj, &matched);
        entry
    }

    fn normalize_message(&self, value: &Value) -> Option<NormalizedMessage> {
        match value {
            Value::Object(map) => Some(self.normalize_message_object(map)),
            Value::String(_) | Value::Array(_) => Some(NormalizedMessage {
                role: "unknown".to_string(),
                content: Some(value.clone()),
                extra: BTreeMap::new(),
            }),
            _ => None,
        }
    }

    fn normalize_message_object(&self, map: &Map<String, Value>) -> NormalizedMessage {
        let aliases = &self.aliases.message;
        let role = find_alias(map, &aliases.role)
            .and_then(|key| map.get(key))
            .and_then(|v| v.as_str())
            .unwrap_or("unknown")
            .to_string();
        let content = find_alias(map, &aliases.content).and_then(|key| map.get(key)).cloned();
        let extra = aliases
            .passthrough
            .iter()
            .filter_map(|key| map.get(key).map(|value| (key.clone(), value.clone())))
            .collect();
        NormalizedMessage {
            role,
            content,
            extra,
        }
    }
}

fn find_alias<'a>(obj: &Map<String, Value>, aliases: &'a [String]) -> Option<&'a str> {
    aliases
        .iter()
        .map(String::as_str)
        .find(|alias| obj.contains_key(*alias))
}

fn collect_unknown(obj: &Map<String, Value>, matched: &BTreeSet<&str>) -> BTreeMap<String, Value> {
    obj.iter()
        .filter(|(key, _)| !matched.contains(key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn normalize(raw: Value) -> NormalizedEntry {
        EntryNormalizer::default().normalize(&raw)
    }

    fn unknown<'a>(entry: &'a NormalizedEntry, key: &str) -> Option<&'a Value> {
        entry.unknown.get(key)
    }

    #[test]
    fn maps_current_producer_fields() {
        let entry = normalize(json!({
            "type": "assistant",
            "timestamp": "2026-02-19T00:00:00Z",
            "version": "1.0.80",
            "uuid": "u1",
            "sessionId": "s1",
            "parentUuid": "p1",
            "requestId": "r1",
            "isMeta": false,
            "isSidechain": true,
            "userType": "external",
            "cwd": "/tmp/p",
            "gitBranch": "main",
            "message": {"role": "assistant", "content": "hi", "model": "m1", "id": "msg_1"}
        }));
        assert_eq!(entry.entry_type(), Some("assistant"));
        assert_eq!(entry.str_field(CanonicalField::SessionId), Some("s1"));
        assert_eq!(entry.str_field(CanonicalField::GitBranch), Some("main"));
        assert!(entry.flag(CanonicalField::IsSidechain));
        assert!(!entry.flag(CanonicalField::IsMeta));
        let message = entry.message.as_ref().expect("message");
        assert_eq!(message.role, "assistant");
        assert_eq!(message.content, Some(json!("hi")));
        assert_eq!(message.extra.get("model"), Some(&json!("m1")));
        assert_eq!(entry.unknown_keys().count(), 0);
    }

    #[test]
    fn first_alias_in_priority_order_wins() {
        let entry = normalize(json!({
            "type": "user",
            "created": "later",
            "time": "earlier",
        }));
        assert_eq!(entry.str_field(CanonicalField::Timestamp), Some("earlier"));
        // The losing alias is still kept verbatim.
        assert_eq!(unknown(&entry, "created"), Some(&json!("later")));
    }

    #[test]
    fn preserves_unknown_fields_verbatim() {
        let raw = json!({
            "type": "user",
            "message": {"content": "x"},
            "new_field": {"nested": [1, 2]},
            "_private": 7,
        });
        let entry = normalize(raw.clone());
        let obj = raw.as_object().expect("object");
        let expected = obj
            .keys()
            .filter(|key| key.as_str() != "type" && key.as_str() != "message")
            .cloned()
            .collect::<Vec<_>>();
        assert_eq!(entry.unknown_keys().collect::<Vec<_>>(), expected);
        for key in expected {
            assert_eq!(unknown(&entry, &key), obj.get(&key));
        }
        let json = entry.to_json();
        assert_eq!(json.get("unknown:new_field"), Some(&json!({"nested": [1, 2]})));
    }

    #[test]
    fn normalization_is_deterministic() {
        let raw = json!({
            "kind": "assistant",
            "payload": {"sender": "assistant", "body": [{"text": "a"}]},
            "zeta": 1,
            "alpha": [true],
        });
        let normalizer = EntryNormalizer::default();
        let first = serde_json::to_string(&normalizer.normalize(&raw).to_json()).expect("encode");
        for _ in 0..5 {
            let again =
                serde_json::to_string(&normalizer.normalize(&raw).to_json()).expect("encode");
            assert_eq!(first, again);
        }
    }

    #[test]
    fn string_message_is_wrapped_with_unknown_role() {
        let entry = normalize(json!({"type": "user", "message": "plain"}));
        let message = entry.message.expect("message");
        assert_eq!(message.role, "unknown");
        assert_eq!(message.content, Some(json!("plain")));
    }

    #[test]
    fn flattened_entry_content_becomes_message() {
        let entry = normalize(json!({
            "type": "system",
            "content": "Running hook",
            "level": "info",
        }));
        assert_eq!(entry.content(), Some(&json!("Running hook")));
        assert_eq!(entry.str_field(CanonicalField::Level), Some("info"));
        assert_eq!(unknown(&entry, "content"), None);
    }

    #[test]
    fn missing_message_is_empty_not_an_error() {
        let entry = normalize(json!({"type": "user", "toolUseResult": "file1 file2"}));
        assert!(entry.message.is_none());
        assert_eq!(entry.tool_use_result(), Some(&json!("file1 file2")));
    }

    #[test]
    fn non_string_summary_keys_stay_unknown() {
        let entry = normalize(json!({
            "type": "summary",
            "summary": {"text": "Fixed parser"},
            "leafUuid": 42,
        }));
        assert_eq!(
            entry.variant,
            EntryVariant::Summary {
                summary: String::new(),
                leaf_uuid: None,
            }
        );
        assert_eq!(entry.unknown_keys().collect::<Vec<_>>(), vec!["leafUuid", "summary"]);
        assert_eq!(unknown(&entry, "summary"), Some(&json!({"text": "Fixed parser"})));
        assert_eq!(unknown(&entry, "leafUuid"), Some(&json!(42)));
        let json = entry.to_json();
        assert_eq!(json.get("unknown:leafUuid"), Some(&json!(42)));
    }

    #[test]
    fn summary_entries_bypass_full_normalization() {
        let entry = normalize(json!({
            "type": "summary",
            "summary": "Fixed the parser",
            "leafUuid": "leaf-1",
            "timestamp": "2026-02-19T00:00:00Z",
        }));
        assert_eq!(
            entry.variant,
            EntryVariant::Summary {
                summary: "Fixed the parser".to_string(),
                leaf_uuid: Some("leaf-1".to_string()),
            }
        );
        assert_eq!(entry.entry_type(), Some("summary"));
        assert!(entry.field(CanonicalField::Timestamp).is_none());
        assert!(entry.message.is_none());
        assert_eq!(
            unknown(&entry, "timestamp"),
            Some(&json!("2026-02-19T00:00:00Z"))
        );
    }

    #[test]
    fn non_object_input_is_flagged_unparseable() {
        let entry = normalize(json!([1, 2, 3]));
        assert!(entry.is_unparseable());
        assert_eq!(
            entry.variant,
            EntryVariant::Unparseable {
                raw: json!([1, 2, 3]),
                reason: "NotAnObject",
            }
        );
    }

    #[test]
    fn custom_alias_table_supports_renamed_fields() {
        let file: crate::domain::AliasTableFile = serde_json::from_str(
            r#"{"fields":[{"field":"timestamp","aliases":["ts"]}]}"#,
        )
        .expect("parse");
        let normalizer = EntryNormalizer::new(AliasTable::default().with_overrides(file));
        let entry = normalizer.normalize(&json!({"type": "user", "ts": "2026-01-01T00:00:00Z"}));
        assert_eq!(
            entry.str_field(CanonicalField::Timestamp),
            Some("2026-01-01T00:00:00Z")
        );
    }
}
