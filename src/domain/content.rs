use serde_json::Value;

/// Nesting beyond this many levels is not descended into.
pub const MAX_CONTENT_DEPTH: usize = 20;

pub const TOO_DEEPLY_NESTED: &str = "[Content too deeply nested]";

const LIST_ITEM_TEXT_FIELDS: [&str; 4] = ["text", "content", "value", "data"];
const OBJECT_TEXT_FIELDS: [&str; 5] = ["text", "content", "value", "body", "message"];

/// Flatten any observed `content` shape into plain text.
///
/// Strings pass through, lists are joined line by line, objects are searched for a text-bearing
/// field, and anything left over is rendered as JSON rather than dropped. Returns `None` when the
/// value carries no text at all (null, empty list, list of tool calls).
pub fn extract_text(content: &Value) -> Option<String> {
    extract_text_at(content, 0)
}

fn extract_text_at(content: &Value, depth: usize) -> Option<String> {
    if depth > MAX_CONTENT_DEPTH {
        return Some(TOO_DEEPLY_NESTED.to_string());
    }

    match content {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        Value::Bool(value) => Some(value.to_string()),
        Value::Number(value) => Some(value.to_string()),
        Value::Array(items) => {
            let texts = items
                .iter()
                .filter_map(|item| extract_list_item(item, depth))
                .filter(|text| !text.is_empty())
                .collect::<Vec<_>>();
            if texts.is_empty() {
                None
            } else {
                Some(texts.join("\n"))
            }
        }
        Value::Object(map) => {
            for field in OBJECT_TEXT_FIELDS {
                if let Some(inner) = map.get(field) {
                    if let Some(text) = non_empty(extract_text_at(inner, depth + 1)) {
                        return Some(text);
                    }
                }
            }
            Some(serde_json::to_string(content).unwrap_or_else(|_| content.to_string()))
        }
    }
}

fn extract_list_item(item: &Value, depth: usize) -> Option<String> {
    match item {
        Value::Object(map) => {
            for field in LIST_ITEM_TEXT_FIELDS {
                if let Some(inner) = map.get(field) {
                    if let Some(text) = non_empty(extract_text_at(inner, depth + 1)) {
                        return Some(text);
                    }
                }
            }
            // Tagged blocks without a text field (tool_use, image) add nothing to the transcript.
            None
        }
        other => extract_text_at(other, depth + 1),
    }
}

fn non_empty(text: Option<String>) -> Option<String> {
    text.filter(|text| !text.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn plain_string_passes_through() {
        assert_eq!(extract_text(&json!("hello")), Some("hello".to_string()));
    }

    #[test]
    fn joins_list_items_and_skips_empty_ones() {
        let content = json!([
            {"type": "text", "text": "first"},
            "second",
            {"type": "tool_use", "id": "t1", "name": "Bash", "input": {"command": "ls"}},
            {"type": "text", "text": ""},
            {"value": "third"},
        ]);
        assert_eq!(
            extract_text(&content),
            Some("first\nsecond\nthird".to_string())
        );
    }

    #[test]
    fn list_of_only_tool_calls_has_no_text() {
        let content = json!([
            {"type": "tool_use", "id": "t1", "name": "Bash", "input": {"command": "ls"}}
        ]);
        assert_eq!(extract_text(&content), None);
    }

    #[test]
    fn nested_objects_resolve_to_inner_text() {
        let content = json!({"content": {"text": {"value": "This is the actual text"}}});
        assert_eq!(
            extract_text(&content),
            Some("This is the actual text".to_string())
        );
    }

    #[test]
    fn unknown_objects_fall_back_to_json() {
        let content = json!({"stdout": "ok", "exitCode": 0});
        assert_eq!(
            extract_text(&content),
            Some(r#"{"exitCode":0,"stdout":"ok"}"#.to_string())
        );
    }

    #[test]
    fn scalars_render_as_text_and_null_yields_nothing() {
        assert_eq!(extract_text(&json!(42)), Some("42".to_string()));
        assert_eq!(extract_text(&json!(true)), Some("true".to_string()));
        assert_eq!(extract_text(&Value::Null), None);
    }

    #[test]
    fn deep_nesting_yields_sentinel() {
        let mut content = json!({"text": "base"});
        for _ in 0..30 {
            content = json!({ "content": content });
        }
        assert_eq!(extract_text(&content), Some(TOO_DEEPLY_NESTED.to_string()));
    }

    #[test]
    fn deeply_nested_lists_also_hit_the_bound() {
        let mut content = json!("leaf");
        for _ in 0..(MAX_CONTENT_DEPTH + 5) {
            content = json!([content]);
        }
        assert_eq!(extract_text(&content), Some(TOO_DEEPLY_NESTED.to_string()));
    }
}
