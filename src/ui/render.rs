use crate::domain::{
    CanonicalField, EntryVariant, InvocationKind, NormalizedEntry, ShowFlag, ShowOptions,
    ToolInvocation, ToolInvocationTracker, TruncationCategory, extract_text,
};
use crate::ui::theme::Theme;
use serde_json::Value;
use time::format_description::BorrowedFormatItem;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};

const CLOCK_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[hour]:[minute]:[second]");
const SHORT_ID_CHARS: usize = 8;
const COMMAND_PREFIXES: [&str; 2] = ["<command-", "<local-command-"];
const HOOK_MARKERS: [&str; 2] = ["PreToolUse", "PostToolUse"];
const ERROR_PREFIX: &str = "Error:";
const USAGE_FIELDS: [(&str, &str); 4] = [
    ("input_tokens", "input"),
    ("output_tokens", "output"),
    ("cache_read_input_tokens", "cache read"),
    ("cache_creation_input_tokens", "cache write"),
];

/// Turns normalized entries into display text. Holds no session state; tool linkage comes from
/// the tracker passed in on every call.
#[derive(Clone, Debug)]
pub struct Renderer {
    theme: Theme,
    options: ShowOptions,
    show_timestamp: bool,
}

impl Renderer {
    pub fn new(theme: Theme, options: ShowOptions, show_timestamp: bool) -> Self {
        Self {
            theme,
            options,
            show_timestamp,
        }
    }

    /// Display text for one entry, or `None` when the current toggles hide all of it.
    pub fn render_entry(
        &self,
        entry: &NormalizedEntry,
        tracker: &ToolInvocationTracker,
    ) -> Option<String> {
        match &entry.variant {
            EntryVariant::Summary { summary, leaf_uuid } => {
                return self.render_summary(summary, leaf_uuid.as_deref());
            }
            EntryVariant::Unparseable { reason, .. } => {
                if !self.enabled(ShowFlag::Errors) {
                    return None;
                }
                return Some(self.theme.paint(
                    self.theme.error,
                    &format!("\n⚠ Unparseable entry ({reason})"),
                ));
            }
            EntryVariant::Standard => {}
        }

        if entry.flag(CanonicalField::IsMeta) && !self.enabled(ShowFlag::Metadata) {
            return None;
        }
        if entry.flag(CanonicalField::IsSidechain) && !self.enabled(ShowFlag::Sidechains) {
            return None;
        }

        let mut header = self.header_lines(entry);
        let timestamp = self.timestamp_prefix(entry);

        let kind = entry
            .entry_type()
            .or_else(|| entry.message.as_ref().map(|message| message.role.as_str()));
        let body = match kind {
            Some("user") => self.render_user(entry, tracker, &timestamp),
            Some("assistant") => self.render_assistant(entry, tracker, &timestamp),
            Some("system") => self.render_system(entry, &timestamp),
            _ => Vec::new(),
        };
        if body.is_empty() {
            return None;
        }

        header.extend(body);
        Some(header.join("\n"))
    }

    fn enabled(&self, flag: ShowFlag) -> bool {
        self.options.is_enabled(flag)
    }

    fn render_summary(&self, summary: &str, leaf_uuid: Option<&str>) -> Option<String> {
        if !self.enabled(ShowFlag::Summaries) {
            return None;
        }
        let mut lines = vec![
            self.theme
                .paint(self.theme.separator, &format!("\n📝 Summary: {summary}")),
        ];
        if let (true, Some(leaf)) = (self.enabled(ShowFlag::Metadata), leaf_uuid) {
            lines.push(format!(
                "   {}",
                self.theme.paint(self.theme.metadata, &format!("Session: {leaf}"))
            ));
        }
        Some(lines.join("\n"))
    }

    fn header_lines(&self, entry: &NormalizedEntry) -> Vec<String> {
        let mut lines = Vec::new();
        let field = |name| entry.field(name).map(value_text);

        if self.enabled(ShowFlag::Metadata) {
            let mut items = Vec::new();
            if let Some(uuid) = field(CanonicalField::Uuid) {
                items.push(format!("uuid:{}", short_id(&uuid)));
            }
            if let Some(session) = field(CanonicalField::SessionId) {
                items.push(format!("session:{}", short_id(&session)));
            }
            if let Some(version) = field(CanonicalField::Version) {
                items.push(format!("v{version}"));
            }
            if let Some(branch) = field(CanonicalField::GitBranch) {
                items.push(format!("git:{branch}"));
            }
            if !items.is_empty() {
                lines.push(self.meta(&format!("[{}]", items.join(" | "))));
            }
        }
        if self.enabled(ShowFlag::RequestIds) {
            if let Some(request) = field(CanonicalField::RequestId) {
                lines.push(self.meta(&format!("Request: {request}")));
            }
        }
        if self.enabled(ShowFlag::Flow) {
            if let Some(parent) = field(CanonicalField::ParentUuid).filter(|p| !p.is_empty()) {
                lines.push(self.meta(&format!("Parent: {}...", short_id(&parent))));
            }
        }
        if self.enabled(ShowFlag::Paths) {
            if let Some(cwd) = field(CanonicalField::Cwd) {
                lines.push(self.meta(&format!("Path: {cwd}")));
            }
        }
        if self.enabled(ShowFlag::UserTypes) {
            if let Some(user_type) = field(CanonicalField::UserType) {
                lines.push(self.meta(&format!("UserType: {user_type}")));
            }
        }
        if self.enabled(ShowFlag::Levels) {
            if let Some(level) = field(CanonicalField::Level) {
                lines.push(self.meta(&format!("Level: {level}")));
            }
        }
        if entry.flag(CanonicalField::IsSidechain) {
            lines.push(self.meta("[SIDECHAIN]"));
        }
        lines
    }

    fn meta(&self, text: &str) -> String {
        self.theme.paint(self.theme.metadata, text)
    }

    fn label(&self, code: &str, text: &str) -> String {
        if code.is_empty() && self.theme.bold.is_empty() {
            return text.to_string();
        }
        format!("{code}{}{text}{}", self.theme.bold, self.theme.reset)
    }

    fn timestamp_prefix(&self, entry: &NormalizedEntry) -> String {
        if !self.show_timestamp {
            return String::new();
        }
        entry
            .str_field(CanonicalField::Timestamp)
            .and_then(clock_time)
            .map(|clock| {
                let stamp = self.theme.paint(self.theme.timestamp, &format!("[{clock}]"));
                format!("{stamp} ")
            })
            .unwrap_or_default()
    }

    fn render_user(
        &self,
        entry: &NormalizedEntry,
        tracker: &ToolInvocationTracker,
        timestamp: &str,
    ) -> Vec<String> {
        let mut out = Vec::new();

        if self.enabled(ShowFlag::User) {
            if let Some(text) = conversation_text(entry, tracker) {
                let is_command = COMMAND_PREFIXES.iter().any(|prefix| text.starts_with(prefix));
                let shown = if self.enabled(ShowFlag::Commands) {
                    Some(text)
                } else if is_command {
                    None
                } else {
                    Some(strip_tags(&text).trim().to_string())
                };
                if let Some(text) = shown.filter(|text| !text.is_empty()) {
                    out.push(format!(
                        "\n{timestamp}{} {}",
                        self.label(self.theme.user, "User:"),
                        self.theme.paint(self.theme.user, &text)
                    ));
                }
            }
        }

        if self.enabled(ShowFlag::Tools) {
            out.extend(self.render_tool_results(entry, tracker));
        }
        out
    }

    fn render_assistant(
        &self,
        entry: &NormalizedEntry,
        tracker: &ToolInvocationTracker,
        timestamp: &str,
    ) -> Vec<String> {
        let mut out = Vec::new();

        if self.enabled(ShowFlag::Assistant) {
            if let Some(text) = conversation_text(entry, tracker).filter(|text| !text.is_empty()) {
                let text = self.options.truncate(&text, TruncationCategory::Default);
                out.push(format!(
                    "\n{timestamp}{} {}",
                    self.label(self.theme.assistant, "Claude:"),
                    self.theme.paint(self.theme.assistant, &text)
                ));
            }
        }

        if self.enabled(ShowFlag::Tools) {
            for block in tracker.use_blocks(entry) {
                out.push(
                    self.theme
                        .paint(self.theme.tool_name, &format!("\n🔧 Tool: {}", block.name)),
                );
                if let (true, Some(id)) = (self.enabled(ShowFlag::ToolDetails), block.id) {
                    out.push(format!("   {}", self.meta(&format!("ID: {id}"))));
                }
                out.extend(self.tool_params(block.input));
            }
        }

        if !out.is_empty() && self.enabled(ShowFlag::Diagnostics) {
            if let Some(usage) = entry.message.as_ref().and_then(|message| message.usage()) {
                out.extend(self.usage_line(usage));
            }
        }
        out
    }

    fn tool_params(&self, input: Option<&Value>) -> Vec<String> {
        let params = match input {
            None | Some(Value::Null) => return Vec::new(),
            Some(Value::Object(map)) if map.is_empty() => return Vec::new(),
            Some(Value::Object(map)) => map
                .iter()
                .map(|(key, value)| (key.clone(), value_text(value)))
                .collect::<Vec<_>>(),
            Some(other) => vec![("input".to_string(), value_text(other))],
        };
        params
            .into_iter()
            .map(|(key, value)| {
                let value = self.options.truncate(&value, TruncationCategory::ToolParam);
                format!(
                    "   {}",
                    self.theme.paint(self.theme.tool_param, &format!("{key}: {value}"))
                )
            })
            .collect()
    }

    fn usage_line(&self, usage: &Value) -> Option<String> {
        let parts = USAGE_FIELDS
            .iter()
            .filter_map(|(key, label)| {
                usage
                    .get(*key)
                    .and_then(|v| v.as_u64())
                    .map(|count| format!("{label} {count}"))
            })
            .collect::<Vec<_>>();
        if parts.is_empty() {
            return None;
        }
        Some(format!("   {}", self.meta(&format!("Tokens: {}", parts.join(" | ")))))
    }

    fn render_tool_results(
        &self,
        entry: &NormalizedEntry,
        tracker: &ToolInvocationTracker,
    ) -> Vec<String> {
        let blocks = tracker.result_blocks(entry);
        if blocks.is_empty() {
            // Older producers only carry the result on the entry itself, without a call id.
            return entry
                .tool_use_result()
                .and_then(|result| self.format_result(result, false, None))
                .into_iter()
                .collect();
        }
        blocks
            .into_iter()
            .filter_map(|block| {
                let invocation = block.tool_use_id.and_then(|id| tracker.lookup(id));
                let content = block.content.or_else(|| entry.tool_use_result())?;
                self.format_result(content, block.is_error, invocation)
            })
            .collect()
    }

    fn format_result(
        &self,
        result: &Value,
        is_error: bool,
        invocation: Option<&ToolInvocation>,
    ) -> Option<String> {
        let text = extract_text(result)?;
        let text = text.trim();
        if text.is_empty() {
            return None;
        }

        if is_error || text.starts_with(ERROR_PREFIX) {
            let text = if text.starts_with(ERROR_PREFIX) {
                text.to_string()
            } else {
                format!("{ERROR_PREFIX} {text}")
            };
            let text = self.options.truncate(&text, TruncationCategory::Error);
            return Some(self.theme.paint(self.theme.error, &format!("   ❌ {text}")));
        }

        let text = self.options.truncate(text, TruncationCategory::ToolResult);
        let line = match invocation {
            Some(ToolInvocation {
                kind:
                    InvocationKind::Delegate {
                        subagent_type,
                        description,
                    },
                ..
            }) => {
                let agent = subagent_type.as_deref().unwrap_or("general");
                match description.as_deref() {
                    Some(description) if self.enabled(ShowFlag::ToolDetails) => {
                        format!("   ✓ Subagent ({agent}) [{description}]: {text}")
                    }
                    _ => format!("   ✓ Subagent ({agent}): {text}"),
                }
            }
            Some(invocation) => format!("   ✓ Result ({}): {text}", invocation.name),
            None => format!("   ✓ Result: {text}"),
        };
        Some(self.theme.paint(self.theme.tool_output, &line))
    }

    fn render_system(&self, entry: &NormalizedEntry, timestamp: &str) -> Vec<String> {
        let Some(content) = entry.content().and_then(extract_text) else {
            return Vec::new();
        };
        if content.is_empty() {
            return Vec::new();
        }

        let is_hook = content.to_lowercase().contains("hook")
            || HOOK_MARKERS.iter().any(|marker| content.contains(marker));
        let should_show = if self.enabled(ShowFlag::System) {
            true
        } else if is_hook {
            self.enabled(ShowFlag::Hooks)
        } else {
            let styled = content.starts_with("[1m") || content.starts_with("\x1b[1m");
            !styled && (content.contains("Error") || !content.contains("completed successfully"))
        };
        if !should_show {
            return Vec::new();
        }

        vec![format!(
            "\n{timestamp}{}",
            self.theme
                .paint(self.theme.system, &format!("System: {}", strip_ansi(&content)))
        )]
    }
}

/// Message text with tool-result blocks left out; those render as tool results instead.
fn conversation_text(entry: &NormalizedEntry, tracker: &ToolInvocationTracker) -> Option<String> {
    match entry.content()? {
        Value::Array(items) => {
            let items = items
                .iter()
                .filter(|item| !tracker.is_result_block(item))
                .cloned()
                .collect::<Vec<_>>();
            extract_text(&Value::Array(items))
        }
        other => extract_text(other),
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn short_id(id: &str) -> &str {
    id.char_indices()
        .nth(SHORT_ID_CHARS)
        .map(|(idx, _)| &id[..idx])
        .unwrap_or(id)
}

fn clock_time(timestamp: &str) -> Option<String> {
    OffsetDateTime::parse(timestamp, &Rfc3339)
        .ok()?
        .to_offset(UtcOffset::UTC)
        .format(CLOCK_FORMAT)
        .ok()
}

/// Remove `<...>` markup such as `<command-name>` wrappers.
fn strip_tags(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find('<') {
        match rest[start..].find('>') {
            Some(end) if end > 1 => {
                out.push_str(&rest[..start]);
                rest = &rest[start + end + 1..];
            }
            _ => {
                out.push_str(&rest[..=start]);
                rest = &rest[start + 1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Remove SGR sequences, including ones whose escape byte was already lost.
fn strip_ansi(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find('[') {
        let tail = &rest[start + 1..];
        let params = tail
            .find(|c: char| !(c.is_ascii_digit() || c == ';'))
            .unwrap_or(tail.len());
        if tail[params..].starts_with('m') {
            let before = &rest[..start];
            out.push_str(before.strip_suffix('\x1b').unwrap_or(before));
            rest = &tail[params + 1..];
        } else {
            out.push_str(&rest[..=start]);
            rest = tail;
        }
    }
    out.push_str(rest);
    out
}
