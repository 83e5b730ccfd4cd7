use serde::{Deserialize, Serialize};

/// Logical fields every normalized entry exposes, whatever the producer version called them.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CanonicalField {
    Type,
    Timestamp,
    Version,
    Uuid,
    SessionId,
    ParentUuid,
    RequestId,
    IsMeta,
    IsSidechain,
    UserType,
    Cwd,
    GitBranch,
    Level,
    Message,
    ToolUseResult,
}

impl CanonicalField {
    pub fn name(self) -> &'static str {
        match self {
            Self::Type => "type",
            Self::Timestamp => "timestamp",
            Self::Version => "version",
            Self::Uuid => "uuid",
            Self::SessionId => "sessionId",
            Self::ParentUuid => "parentUuid",
            Self::RequestId => "requestId",
            Self::IsMeta => "isMeta",
            Self::IsSidechain => "isSidechain",
            Self::UserType => "userType",
            Self::Cwd => "cwd",
            Self::GitBranch => "gitBranch",
            Self::Level => "level",
            Self::Message => "message",
            Self::ToolUseResult => "toolUseResult",
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub struct FieldAliases {
    pub field: CanonicalField,
    pub aliases: Vec<String>,
}

#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MessageAliases {
    pub role: Vec<String>,
    pub content: Vec<String>,
    pub passthrough: Vec<String>,
}

impl Default for MessageAliases {
    fn default() -> Self {
        Self {
            role: strings(&["role", "type", "sender", "author"]),
            content: strings(&["content", "text", "message", "body", "data"]),
            passthrough: strings(&["id", "model", "usage", "stop_reason"]),
        }
    }
}

/// Where tool calls and their results hide inside message content blocks.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ToolPatterns {
    pub use_types: Vec<String>,
    pub name_fields: Vec<String>,
    pub id_fields: Vec<String>,
    pub input_fields: Vec<String>,
    pub result_types: Vec<String>,
    pub result_id_fields: Vec<String>,
    pub delegate_tools: Vec<String>,
}

impl Default for ToolPatterns {
    fn default() -> Self {
        Self {
            use_types: strings(&["tool_use", "tool", "function_call"]),
            name_fields: strings(&["name", "tool", "function"]),
            id_fields: strings(&["id", "tool_id", "call_id"]),
            input_fields: strings(&["input", "arguments", "params", "data"]),
            result_types: strings(&["tool_result", "function_call_output"]),
            result_id_fields: strings(&["tool_use_id", "toolUseId", "call_id"]),
            delegate_tools: strings(&["Task", "Agent"]),
        }
    }
}

/// Ordered `(canonical field, [raw key names])` pairs. The first alias present in an entry wins.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AliasTable {
    fields: Vec<FieldAliases>,
    pub message: MessageAliases,
    pub tools: ToolPatterns,
}

impl Default for AliasTable {
    fn default() -> Self {
        let fields = [
            (CanonicalField::Type, &["type", "entryType", "kind"][..]),
            (
                CanonicalField::Timestamp,
                &["timestamp", "time", "created", "createdAt", "datetime"][..],
            ),
            (CanonicalField::Version, &["version", "ver", "v"][..]),
            (CanonicalField::Uuid, &["uuid", "id"][..]),
            (CanonicalField::SessionId, &["sessionId", "session_id"][..]),
            (CanonicalField::ParentUuid, &["parentUuid", "parent_uuid"][..]),
            (CanonicalField::RequestId, &["requestId", "request_id"][..]),
            (CanonicalField::IsMeta, &["isMeta", "is_meta"][..]),
            (CanonicalField::IsSidechain, &["isSidechain", "is_sidechain"][..]),
            (CanonicalField::UserType, &["userType", "user_type"][..]),
            (CanonicalField::Cwd, &["cwd", "workingDirectory"][..]),
            (CanonicalField::GitBranch, &["gitBranch", "git_branch"][..]),
            (CanonicalField::Level, &["level"][..]),
            (CanonicalField::Message, &["message", "msg", "data", "payload"][..]),
            (
                CanonicalField::ToolUseResult,
                &["toolUseResult", "tool_result", "toolResult", "result", "output"][..],
            ),
        ]
        .into_iter()
        .map(|(field, aliases)| FieldAliases {
            field,
            aliases: strings(aliases),
        })
        .collect();

        Self {
            fields,
            message: MessageAliases::default(),
            tools: ToolPatterns::default(),
        }
    }
}

/// On-disk shape of an alias table. Every section is optional; listed fields replace the
/// built-in aliases for that field only.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AliasTableFile {
    pub fields: Vec<FieldAliases>,
    pub message: Option<MessageAliases>,
    pub tools: Option<ToolPatterns>,
}

impl AliasTable {
    pub fn fields(&self) -> &[FieldAliases] {
        &self.fields
    }

    pub fn aliases_for(&self, field: CanonicalField) -> &[String] {
        self.fields
            .iter()
            .find(|entry| entry.field == field)
            .map(|entry| entry.aliases.as_slice())
            .unwrap_or(&[])
    }

    pub fn with_overrides(mut self, overrides: AliasTableFile) -> Self {
        for entry in overrides.fields {
            match self.fields.iter_mut().find(|known| known.field == entry.field) {
                Some(known) => known.aliases = entry.aliases,
                None => self.fields.push(entry),
            }
        }
        if let Some(message) = overrides.message {
            self.message = message;
        }
        if let Some(tools) = overrides.tools {
            self.tools = tools;
        }
        self
    }
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| (*value).to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primary_alias_comes_first() {
        let table = AliasTable::default();
        assert_eq!(table.aliases_for(CanonicalField::Timestamp)[0], "timestamp");
        assert_eq!(table.aliases_for(CanonicalField::Type)[0], "type");
        assert_eq!(table.fields().len(), 15);
    }

    #[test]
    fn overrides_replace_only_listed_fields() {
        let file: AliasTableFile = serde_json::from_str(
            r#"{"fields":[{"field":"timestamp","aliases":["ts","timestamp"]}]}"#,
        )
        .expect("parse");
        let table = AliasTable::default().with_overrides(file);
        assert_eq!(
            table.aliases_for(CanonicalField::Timestamp),
            &["ts".to_string(), "timestamp".to_string()]
        );
        assert_eq!(table.aliases_for(CanonicalField::Cwd)[0], "cwd");
        assert_eq!(table.tools, ToolPatterns::default());
    }

    #[test]
    fn partial_tool_section_keeps_remaining_defaults() {
        let file: AliasTableFile =
            serde_json::from_str(r#"{"tools":{"delegateTools":["Delegate"]}}"#).expect("parse");
        let table = AliasTable::default().with_overrides(file);
        assert_eq!(table.tools.delegate_tools, vec!["Delegate".to_string()]);
        assert_eq!(table.tools.use_types, ToolPatterns::default().use_types);
    }
}
