use crate::domain::{EntryNormalizer, ToolInvocationTracker};
use crate::ui::Renderer;
use serde_json::Value;
use std::fmt;

/// Why a line produced a warning. Carries a kind name only, never line content.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LineWarningKind {
    MalformedJson,
    NotAnObject,
}

impl LineWarningKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::MalformedJson => "MalformedJson",
            Self::NotAnObject => "NotAnObject",
        }
    }
}

impl fmt::Display for LineWarningKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct LineWarning {
    /// 1-based.
    pub line_no: usize,
    pub kind: LineWarningKind,
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ProcessedLine {
    pub output: Option<String>,
    pub warning: Option<LineWarning>,
}

/// One session's parse, normalize, track, render chain. Static viewing and live tail both feed
/// lines through here in file order.
#[derive(Debug)]
pub struct SessionPipeline {
    normalizer: EntryNormalizer,
    tracker: ToolInvocationTracker,
    renderer: Renderer,
}

impl SessionPipeline {
    pub fn new(normalizer: EntryNormalizer, renderer: Renderer) -> Self {
        let tracker = ToolInvocationTracker::new(normalizer.aliases().tools.clone());
        Self {
            normalizer,
            tracker,
            renderer,
        }
    }

    pub fn process_line(&mut self, line_no: usize, line: &str) -> ProcessedLine {
        let line = line.trim();
        if line.is_empty() {
            return ProcessedLine::default();
        }

        let raw: Value = match serde_json::from_str(line) {
            Ok(raw) => raw,
            Err(error) => {
                tracing::debug!(line_no, error = %error, "skipping malformed line");
                return ProcessedLine {
                    output: None,
                    warning: Some(LineWarning {
                        line_no,
                        kind: LineWarningKind::MalformedJson,
                    }),
                };
            }
        };

        let entry = self.normalizer.normalize(&raw);
        tracing::trace!(line_no, entry = %entry.to_json(), "normalized");
        if entry.unknown_keys().next().is_some() {
            let unknown = entry.unknown_keys().collect::<Vec<_>>().join(",");
            tracing::debug!(line_no, unknown = %unknown, "unrecognized keys kept");
        }
        let warning = entry.is_unparseable().then_some(LineWarning {
            line_no,
            kind: LineWarningKind::NotAnObject,
        });

        self.tracker.record_invocation(&entry);
        if !self.tracker.result_blocks(&entry).is_empty()
            && self.tracker.resolve_result(&entry).is_none()
        {
            tracing::debug!(line_no, "tool result without a recorded call");
        }
        ProcessedLine {
            output: self.renderer.render_entry(&entry, &self.tracker),
            warning,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ShowOptions;
    use crate::ui::theme::MONO;

    fn pipeline(flags: &str) -> SessionPipeline {
        SessionPipeline::new(
            EntryNormalizer::default(),
            Renderer::new(MONO, ShowOptions::parse(flags).options, false),
        )
    }

    #[test]
    fn renders_user_hello() {
        let mut pipeline = pipeline("");
        let out = pipeline.process_line(
            1,
            r#"{"type":"user","message":{"role":"user","content":"Hello"}}"#,
        );
        assert_eq!(out.output.as_deref(), Some("\nUser: Hello"));
        assert_eq!(out.warning, None);
    }

    #[test]
    fn links_tool_results_across_lines() {
        let mut pipeline = pipeline("");
        pipeline.process_line(
            1,
            r#"{"type":"assistant","message":{"content":[{"type":"tool_use","id":"tool-123","name":"Bash","input":{"command":"ls"}}]}}"#,
        );
        assert!(pipeline.tracker.lookup("tool-123").is_some());

        let out = pipeline.process_line(
            2,
            r#"{"type":"user","message":{"content":[{"type":"tool_result","tool_use_id":"tool-123","content":"file1 file2"}]},"toolUseResult":"file1 file2"}"#,
        );
        let text = out.output.expect("rendered");
        assert!(text.contains("Result (Bash): file1 file2"));
        assert!(!text.contains("User:"));
    }

    #[test]
    fn malformed_lines_warn_and_continue() {
        let mut pipeline = pipeline("");
        let bad = pipeline.process_line(3, "{not json");
        assert_eq!(
            bad.warning,
            Some(LineWarning {
                line_no: 3,
                kind: LineWarningKind::MalformedJson,
            })
        );
        assert_eq!(bad.output, None);

        let good = pipeline.process_line(4, r#"{"type":"user","message":{"content":"ok"}}"#);
        assert!(good.output.is_some());
    }

    #[test]
    fn non_object_lines_are_kept_with_a_kind_warning() {
        let mut pipeline = pipeline("e");
        let out = pipeline.process_line(7, "[1,2,3]");
        assert_eq!(out.warning.map(|w| w.kind), Some(LineWarningKind::NotAnObject));
        assert!(out.output.expect("rendered").contains("NotAnObject"));
    }

    #[test]
    fn blank_lines_are_silent() {
        let mut pipeline = pipeline("");
        assert_eq!(pipeline.process_line(1, "   "), ProcessedLine::default());
    }
}
