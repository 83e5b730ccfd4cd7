use crate::domain::aliases::ToolPatterns;
use crate::domain::entry::NormalizedEntry;
use serde_json::{Map, Value};
use std::collections::HashMap;

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum InvocationKind {
    Tool,
    /// The call hands work to a sub-agent; its result is a delegated conversation.
    Delegate {
        subagent_type: Option<String>,
        description: Option<String>,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct ToolInvocation {
    pub id: String,
    pub name: String,
    pub input: Value,
    pub kind: InvocationKind,
}

/// A result block found in message content.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ToolResultBlock<'a> {
    pub tool_use_id: Option<&'a str>,
    pub content: Option<&'a Value>,
    pub is_error: bool,
}

/// Per-session table of tool calls, keyed by call id. Entries are never removed.
#[derive(Clone, Debug, Default)]
pub struct ToolInvocationTracker {
    patterns: ToolPatterns,
    invocations: HashMap<String, ToolInvocation>,
}

impl ToolInvocationTracker {
    pub fn new(patterns: ToolPatterns) -> Self {
        Self {
            patterns,
            invocations: HashMap::new(),
        }
    }

    /// Remember every tool-use block in the entry. Returns how many were recorded.
    pub fn record_invocation(&mut self, entry: &NormalizedEntry) -> usize {
        let Some(Value::Array(items)) = entry.content() else {
            return 0;
        };

        let mut recorded = 0usize;
        for item in items {
            let Some(block) = item.as_object() else {
                continue;
            };
            if !has_type(block, &self.patterns.use_types) {
                continue;
            }
            let Some(id) = first_str(block, &self.patterns.id_fields) else {
                continue;
            };
            let name = first_str(block, &self.patterns.name_fields)
                .unwrap_or("Unknown")
                .to_string();
            let input = first_value(block, &self.patterns.input_fields)
                .cloned()
                .unwrap_or(Value::Null);
            let kind = if self.patterns.delegate_tools.iter().any(|tool| *tool == name) {
                InvocationKind::Delegate {
                    subagent_type: input
                        .get("subagent_type")
                        .and_then(|v| v.as_str())
                        .map(str::to_string),
                    description: input
                        .get("description")
                        .and_then(|v| v.as_str())
                        .map(str::to_string),
                }
            } else {
                InvocationKind::Tool
            };

            // First sighting wins; a replayed line never rewrites the record.
            if !self.invocations.contains_key(id) {
                self.invocations.insert(
                    id.to_string(),
                    ToolInvocation {
                        id: id.to_string(),
                        name,
                        input,
                        kind,
                    },
                );
                recorded += 1;
            }
        }
        recorded
    }

    pub fn lookup(&self, id: &str) -> Option<&ToolInvocation> {
        self.invocations.get(id)
    }

    /// The invocation behind the first result block in `entry` whose id was seen before.
    pub fn resolve_result(&self, entry: &NormalizedEntry) -> Option<&ToolInvocation> {
        self.result_blocks(entry)
            .into_iter()
            .filter_map(|block| block.tool_use_id)
            .find_map(|id| self.lookup(id))
    }

    pub fn result_blocks<'a>(&self, entry: &'a NormalizedEntry) -> Vec<ToolResultBlock<'a>> {
        let Some(Value::Array(items)) = entry.content() else {
            return Vec::new();
        };
        items
            .iter()
            .filter_map(|item| item.as_object())
            .filter(|block| has_type(block, &self.patterns.result_types))
            .map(|block| ToolResultBlock {
                tool_use_id: first_str(block, &self.patterns.result_id_fields),
                content: block.get("content").or_else(|| block.get("output")),
                is_error: block
                    .get("is_error")
                    .and_then(|v| v.as_bool())
                    .unwrap_or(false),
            })
            .collect()
    }

    pub fn is_result_block(&self, item: &Value) -> bool {
        item.as_object()
            .is_some_and(|block| has_type(block, &self.patterns.result_types))
    }

    /// Tool-use blocks in message content, in order, without touching the table.
    pub fn use_blocks<'a>(&self, entry: &'a NormalizedEntry) -> Vec<ToolUseBlock<'a>> {
        let Some(Value::Array(items)) = entry.content() else {
            return Vec::new();
        };
        items
            .iter()
            .filter_map(|item| item.as_object())
            .filter(|block| has_type(block, &self.patterns.use_types))
            .map(|block| ToolUseBlock {
                id: first_str(block, &self.patterns.id_fields),
                name: first_str(block, &self.patterns.name_fields).unwrap_or("Unknown Tool"),
                input: first_value(block, &self.patterns.input_fields),
            })
            .collect()
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ToolUseBlock<'a> {
    pub id: Option<&'a str>,
    pub name: &'a str,
    pub input: Option<&'a Value>,
}

fn has_type(block: &Map<String, Value>, types: &[String]) -> bool {
    block
        .get("type")
        .and_then(|v| v.as_str())
        .is_some_and(|kind| types.iter().any(|known| known == kind))
}

fn first_value<'a>(block: &'a Map<String, Value>, fields: &[String]) -> Option<&'a Value> {
    fields.iter().find_map(|field| block.get(field))
}

fn first_str<'a>(block: &'a Map<String, Value>, fields: &[String]) -> Option<&'a str> {
    fields
        .iter()
        .find_map(|field| block.get(field).and_then(|v| v.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::EntryNormalizer;
    use serde_json::json;

    fn entry(raw: Value) -> NormalizedEntry {
        EntryNormalizer::default().normalize(&raw)
    }

    fn tool_call(id: &str, name: &str, input: Value) -> NormalizedEntry {
        entry(json!({
            "type": "assistant",
            "uuid": "test-uuid",
            "message": {
                "role": "assistant",
                "content": [{"type": "tool_use", "id": id, "name": name, "input": input}]
            }
        }))
    }

    fn tool_result(id: &str, text: &str) -> NormalizedEntry {
        entry(json!({
            "type": "user",
            "message": {
                "role": "user",
                "content": [{"type": "tool_result", "tool_use_id": id, "content": text}]
            }
        }))
    }

    #[test]
    fn resolves_result_to_recorded_invocation() {
        let mut tracker = ToolInvocationTracker::default();
        let recorded =
            tracker.record_invocation(&tool_call("tool-123", "Bash", json!({"command": "ls -la"})));
        assert_eq!(recorded, 1);

        let info = tracker
            .resolve_result(&tool_result("tool-123", "ok"))
            .expect("resolved");
        assert_eq!(info.name, "Bash");
        assert_eq!(info.input, json!({"command": "ls -la"}));
        assert_eq!(info.kind, InvocationKind::Tool);
    }

    #[test]
    fn unseen_id_resolves_to_none() {
        let mut tracker = ToolInvocationTracker::default();
        tracker.record_invocation(&tool_call("tool-1", "Read", json!({})));
        assert!(tracker.resolve_result(&tool_result("tool-999", "late")).is_none());
    }

    #[test]
    fn task_calls_are_tagged_as_delegates() {
        let mut tracker = ToolInvocationTracker::default();
        tracker.record_invocation(&tool_call(
            "task-456",
            "Task",
            json!({
                "subagent_type": "hack-spotter",
                "description": "Security audit",
                "prompt": "Analyze security"
            }),
        ));
        let info = tracker.lookup("task-456").expect("recorded");
        assert_eq!(
            info.kind,
            InvocationKind::Delegate {
                subagent_type: Some("hack-spotter".to_string()),
                description: Some("Security audit".to_string()),
            }
        );
    }

    #[test]
    fn alternate_block_shapes_are_recognized() {
        let mut tracker = ToolInvocationTracker::default();
        let call = entry(json!({
            "type": "assistant",
            "message": {"content": [
                {"type": "function_call", "call_id": "c1", "function": "search", "arguments": {"q": "x"}}
            ]}
        }));
        tracker.record_invocation(&call);
        let result = entry(json!({
            "type": "user",
            "message": {"content": [
                {"type": "function_call_output", "call_id": "c1", "output": "found"}
            ]}
        }));
        let info = tracker.resolve_result(&result).expect("resolved");
        assert_eq!(info.name, "search");
        assert_eq!(tracker.result_blocks(&result)[0].content, Some(&json!("found")));
    }

    #[test]
    fn first_sighting_is_kept() {
        let mut tracker = ToolInvocationTracker::default();
        tracker.record_invocation(&tool_call("t1", "Bash", json!({"command": "ls"})));
        assert_eq!(
            tracker.record_invocation(&tool_call("t1", "Edit", json!({}))),
            0
        );
        assert_eq!(tracker.lookup("t1").map(|info| info.name.as_str()), Some("Bash"));
        assert_eq!(tracker.invocations.len(), 1);
    }

    #[test]
    fn entries_without_content_record_nothing() {
        let mut tracker = ToolInvocationTracker::default();
        assert_eq!(
            tracker.record_invocation(&entry(json!({"type": "user", "toolUseResult": "x"}))),
            0
        );
        assert!(tracker.invocations.is_empty());
    }
}
