use std::collections::BTreeSet;

/// One named display toggle, selected by a single lowercase letter.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum ShowFlag {
    User,
    Assistant,
    Summaries,
    Hooks,
    Metadata,
    Commands,
    System,
    ToolDetails,
    Tools,
    Errors,
    RequestIds,
    Flow,
    Unfiltered,
    Diagnostics,
    Paths,
    Levels,
    Sidechains,
    UserTypes,
}

impl ShowFlag {
    pub const ALL: [ShowFlag; 18] = [
        ShowFlag::User,
        ShowFlag::Assistant,
        ShowFlag::Summaries,
        ShowFlag::Hooks,
        ShowFlag::Metadata,
        ShowFlag::Commands,
        ShowFlag::System,
        ShowFlag::ToolDetails,
        ShowFlag::Tools,
        ShowFlag::Errors,
        ShowFlag::RequestIds,
        ShowFlag::Flow,
        ShowFlag::Unfiltered,
        ShowFlag::Diagnostics,
        ShowFlag::Paths,
        ShowFlag::Levels,
        ShowFlag::Sidechains,
        ShowFlag::UserTypes,
    ];

    pub const DEFAULTS: [ShowFlag; 3] = [ShowFlag::User, ShowFlag::Assistant, ShowFlag::Tools];

    pub fn letter(self) -> char {
        match self {
            Self::User => 'q',
            Self::Assistant => 'w',
            Self::Summaries => 's',
            Self::Hooks => 'h',
            Self::Metadata => 'm',
            Self::Commands => 'c',
            Self::System => 'y',
            Self::ToolDetails => 't',
            Self::Tools => 'o',
            Self::Errors => 'e',
            Self::RequestIds => 'r',
            Self::Flow => 'f',
            Self::Unfiltered => 'u',
            Self::Diagnostics => 'd',
            Self::Paths => 'p',
            Self::Levels => 'l',
            Self::Sidechains => 'k',
            Self::UserTypes => 'v',
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Summaries => "summaries",
            Self::Hooks => "hooks",
            Self::Metadata => "metadata",
            Self::Commands => "commands",
            Self::System => "system",
            Self::ToolDetails => "tool_details",
            Self::Tools => "tools",
            Self::Errors => "errors",
            Self::RequestIds => "request_ids",
            Self::Flow => "flow",
            Self::Unfiltered => "unfiltered",
            Self::Diagnostics => "diagnostics",
            Self::Paths => "paths",
            Self::Levels => "levels",
            Self::Sidechains => "sidechains",
            Self::UserTypes => "user_types",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::User => "Show user messages",
            Self::Assistant => "Show assistant (Claude) messages",
            Self::Summaries => "Show session summaries",
            Self::Hooks => "Show hook executions",
            Self::Metadata => "Show metadata (uuid, sessionId, version, etc.)",
            Self::Commands => "Show command-related messages",
            Self::System => "Show all system messages",
            Self::ToolDetails => "Show full tool details without truncation",
            Self::Tools => "Show tool executions",
            Self::Errors => "Show all error details and warnings",
            Self::RequestIds => "Show API request IDs",
            Self::Flow => "Show parent/child relationships",
            Self::Unfiltered => "Show all content without truncation",
            Self::Diagnostics => "Show performance metrics and token counts",
            Self::Paths => "Show working directory (cwd) for each message",
            Self::Levels => "Show message level/priority",
            Self::Sidechains => "Show sidechain/parallel messages",
            Self::UserTypes => "Show user type for each message",
        }
    }

    pub fn from_letter(letter: char) -> Option<Self> {
        Self::ALL.into_iter().find(|flag| flag.letter() == letter)
    }
}

/// Text classes with their own length caps.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TruncationCategory {
    ToolParam,
    ToolResult,
    Default,
    Error,
}

const TOOL_PARAM_LIMIT: usize = 200;
const TOOL_RESULT_LIMIT: usize = 500;
const DEFAULT_LIMIT: usize = 500;
const ERROR_LIMIT: usize = 500;
const ERROR_LIMIT_EXPANDED: usize = 1000;

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ShowOptions {
    enabled: BTreeSet<ShowFlag>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ParsedShowOptions {
    pub options: ShowOptions,
    /// `?` appeared: report the resulting state instead of rendering.
    pub status_requested: bool,
}

impl Default for ShowOptions {
    fn default() -> Self {
        Self {
            enabled: ShowFlag::DEFAULTS.into_iter().collect(),
        }
    }
}

impl ShowOptions {
    /// Apply a flag string left to right on top of the defaults.
    ///
    /// `a` enables everything, `A` disables everything, a known lowercase letter enables its
    /// toggle and the uppercase form disables it. Anything else is ignored.
    pub fn parse(flags: &str) -> ParsedShowOptions {
        let mut options = Self::default();
        let mut status_requested = false;
        for ch in flags.chars() {
            match ch {
                '?' => status_requested = true,
                'a' => options.enabled.extend(ShowFlag::ALL),
                'A' => options.enabled.clear(),
                _ => {
                    let Some(flag) = ShowFlag::from_letter(ch.to_ascii_lowercase()) else {
                        continue;
                    };
                    if ch.is_ascii_uppercase() {
                        options.enabled.remove(&flag);
                    } else {
                        options.enabled.insert(flag);
                    }
                }
            }
        }
        ParsedShowOptions {
            options,
            status_requested,
        }
    }

    pub fn is_enabled(&self, flag: ShowFlag) -> bool {
        self.enabled.contains(&flag)
    }

    pub fn should_truncate(&self, category: TruncationCategory) -> bool {
        if self.is_enabled(ShowFlag::Unfiltered) {
            return false;
        }
        match category {
            TruncationCategory::ToolParam | TruncationCategory::ToolResult => {
                !self.is_enabled(ShowFlag::ToolDetails)
            }
            TruncationCategory::Default | TruncationCategory::Error => true,
        }
    }

    /// `None` means unbounded.
    pub fn max_length(&self, category: TruncationCategory) -> Option<usize> {
        if !self.should_truncate(category) {
            return None;
        }
        Some(match category {
            TruncationCategory::ToolParam => TOOL_PARAM_LIMIT,
            TruncationCategory::ToolResult => TOOL_RESULT_LIMIT,
            TruncationCategory::Default => DEFAULT_LIMIT,
            TruncationCategory::Error if self.is_enabled(ShowFlag::Errors) => ERROR_LIMIT_EXPANDED,
            TruncationCategory::Error => ERROR_LIMIT,
        })
    }

    pub fn truncate(&self, text: &str, category: TruncationCategory) -> String {
        truncate_text(text, self.max_length(category))
    }

    /// Enabled and disabled toggles with their letters, for `-s ...?`.
    pub fn status_report(&self) -> StatusReport {
        let (enabled, disabled) = ShowFlag::ALL
            .into_iter()
            .partition(|flag| self.is_enabled(*flag));
        StatusReport { enabled, disabled }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StatusReport {
    pub enabled: Vec<ShowFlag>,
    pub disabled: Vec<ShowFlag>,
}

/// Cut `text` to `max_chars` characters and append `...` when it was longer.
pub fn truncate_text(text: &str, max_chars: Option<usize>) -> String {
    let Some(max_chars) = max_chars else {
        return text.to_string();
    };
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}...", &text[..byte_idx]),
        None => text.to_string(),
    }
}
