use crate::app::SessionPipeline;
use crate::infra::session::MAX_FILE_SIZE;
use notify::event::EventKind;
use notify::{Config, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::HashSet;
use std::ffi::OsString;
use std::fs;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{Receiver, RecvTimeoutError, channel};
use std::time::{Duration, Instant};
use thiserror::Error;

pub const WATCH_POLL_INTERVAL: Duration = Duration::from_millis(500);
/// Change notifications may cut a wait short, but ticks never come closer together than this.
pub const MIN_TICK_GAP: Duration = Duration::from_millis(100);

#[derive(Debug, Error)]
pub enum WatchError {
    #[error("failed to stat {}: {source}", path.display())]
    Stat {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(
        "stopped watching {}: {size} bytes exceeds the {limit} byte limit",
        path.display()
    )]
    TooLarge { path: PathBuf, size: u64, limit: u64 },

    #[error("failed to write output: {0}")]
    Write(#[from] io::Error),
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct NewLine {
    /// 1-based position in the file at the time it was read.
    pub line_no: usize,
    pub text: String,
}

/// What one watch session has already emitted.
///
/// Lines are identified by their raw text, so the file can be re-read from the start on every
/// growth without repeating output. The seen set is never pruned and grows with the file.
#[derive(Debug, Default)]
pub struct WatchCursor {
    last_size: u64,
    seen: HashSet<u64>,
    /// Unterminated, unparseable last line held back from the previous growth.
    pending_tail: Option<NewLine>,
}

impl WatchCursor {
    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }

    /// Lines not emitted before, in file order. Empty when the file has not grown.
    pub fn poll(&mut self, path: &Path) -> Result<Vec<NewLine>, WatchError> {
        let size = fs::metadata(path)
            .map_err(|source| WatchError::Stat {
                path: path.to_path_buf(),
                source,
            })?
            .len();
        if size > MAX_FILE_SIZE {
            return Err(WatchError::TooLarge {
                path: path.to_path_buf(),
                size,
                limit: MAX_FILE_SIZE,
            });
        }

        if size < self.last_size {
            tracing::debug!(
                path = %path.display(),
                previous = self.last_size,
                current = size,
                "session file shrank"
            );
            self.last_size = size;
            self.pending_tail = None;
            return Ok(Vec::new());
        }
        if size == self.last_size {
            // Writer stalled mid-line: release the held tail to the pipeline.
            return Ok(self
                .pending_tail
                .take()
                .filter(|tail| self.seen.insert(fingerprint(&tail.text)))
                .into_iter()
                .collect());
        }

        let bytes = fs::read(path).map_err(|source| WatchError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        self.last_size = size;
        self.pending_tail = None;

        let ends_with_newline = bytes.last() == Some(&b'\n');
        let segments = bytes.split(|byte| *byte == b'\n').collect::<Vec<_>>();
        let last_idx = segments.len().saturating_sub(1);

        let mut fresh = Vec::new();
        for (idx, segment) in segments.into_iter().enumerate() {
            let text = String::from_utf8_lossy(segment);
            let text = text.trim();
            if text.is_empty() {
                continue;
            }
            // A producer may be mid-write; hold an unterminated tail until it is complete JSON.
            if idx == last_idx
                && !ends_with_newline
                && serde_json::from_str::<serde::de::IgnoredAny>(text).is_err()
            {
                if !self.seen.contains(&fingerprint(text)) {
                    self.pending_tail = Some(NewLine {
                        line_no: idx + 1,
                        text: text.to_string(),
                    });
                }
                continue;
            }
            if self.seen.insert(fingerprint(text)) {
                fresh.push(NewLine {
                    line_no: idx + 1,
                    text: text.to_string(),
                });
            }
        }
        Ok(fresh)
    }
}

fn fingerprint(line: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    line.hash(&mut hasher);
    hasher.finish()
}

/// Checked once per tick; returning true ends the watch.
pub trait CancelSignal {
    fn is_cancelled(&mut self) -> bool;
}

/// OS change notifications for one file, used only to wake the poll loop early.
#[derive(Debug)]
pub struct FileChangeHint {
    _watcher: RecommendedWatcher,
    rx: Receiver<()>,
}

#[derive(Debug, Error)]
pub enum FileChangeHintError {
    #[error("watch error: {0}")]
    Notify(#[from] notify::Error),
}

impl FileChangeHint {
    pub fn new(path: &Path) -> Result<Self, FileChangeHintError> {
        let (tx, rx) = channel::<()>();
        let file_name = path.file_name().map(OsString::from);

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<notify::Event>| match res {
                Ok(event) => {
                    if touches_file(&event, file_name.as_deref()) {
                        let _ = tx.send(());
                    }
                }
                Err(error) => {
                    tracing::debug!(error = %error, "change notification error");
                }
            },
            Config::default(),
        )?;

        let watch_target = path.parent().filter(|parent| !parent.as_os_str().is_empty());
        watcher.watch(watch_target.unwrap_or(path), RecursiveMode::NonRecursive)?;

        Ok(Self {
            _watcher: watcher,
            rx,
        })
    }

    /// Block until a change arrives or `timeout` passes. Queued notifications are drained.
    pub fn wait(&self, timeout: Duration) -> bool {
        let changed = match self.rx.recv_timeout(timeout) {
            Ok(()) => true,
            Err(RecvTimeoutError::Timeout) => false,
            Err(RecvTimeoutError::Disconnected) => {
                std::thread::sleep(timeout);
                false
            }
        };
        while self.rx.try_recv().is_ok() {}
        changed
    }
}

fn touches_file(event: &notify::Event, file_name: Option<&std::ffi::OsStr>) -> bool {
    if matches!(event.kind, EventKind::Access(_)) {
        return false;
    }
    if event.paths.is_empty() {
        return true;
    }
    event
        .paths
        .iter()
        .any(|path| path.file_name() == file_name)
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct WatchTiming {
    pub poll_interval: Duration,
    pub min_tick_gap: Duration,
}

impl Default for WatchTiming {
    fn default() -> Self {
        Self {
            poll_interval: WATCH_POLL_INTERVAL,
            min_tick_gap: MIN_TICK_GAP,
        }
    }
}

/// Tail `path` through `pipeline` until `cancel` fires. Existing lines are shown first.
pub fn watch_session_file<C, O, E>(
    path: &Path,
    pipeline: &mut SessionPipeline,
    cancel: &mut C,
    hint: Option<&FileChangeHint>,
    timing: WatchTiming,
    out: &mut O,
    err: &mut E,
) -> Result<(), WatchError>
where
    C: CancelSignal + ?Sized,
    O: Write + ?Sized,
    E: Write + ?Sized,
{
    let mut cursor = WatchCursor::default();
    let file_label = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    loop {
        if cancel.is_cancelled() {
            return Ok(());
        }
        let tick_started = Instant::now();

        let fresh = cursor.poll(path)?;
        if !fresh.is_empty() {
            tracing::debug!(lines = fresh.len(), seen = cursor.seen_count(), "watch tick");
        }
        for line in fresh {
            let processed = pipeline.process_line(line.line_no, &line.text);
            if let Some(warning) = processed.warning {
                writeln!(
                    err,
                    "Warning: {file_label}:{}: {}",
                    warning.line_no, warning.kind
                )?;
            }
            if let Some(output) = processed.output {
                writeln!(out, "{output}")?;
            }
        }
        out.flush()?;
        err.flush()?;

        match hint {
            Some(hint) => {
                hint.wait(timing.poll_interval);
            }
            None => std::thread::sleep(timing.poll_interval),
        }
        let elapsed = tick_started.elapsed();
        if elapsed < timing.min_tick_gap {
            std::thread::sleep(timing.min_tick_gap - elapsed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EntryNormalizer, ShowOptions};
    use crate::ui::Renderer;
    use crate::ui::theme::MONO;
    use std::fs::OpenOptions;
    use tempfile::tempdir;

    fn append(path: &Path, text: &str) {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .expect("open");
        file.write_all(text.as_bytes()).expect("append");
    }

    fn user_line(n: usize) -> String {
        format!("{{\"type\":\"user\",\"uuid\":\"u{n}\",\"message\":{{\"content\":\"msg {n}\"}}}}\n")
    }

    #[test]
    fn appended_lines_are_emitted_once_in_order() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("s.jsonl");
        append(&path, &user_line(1));

        let mut cursor = WatchCursor::default();
        let first = cursor.poll(&path).expect("poll");
        assert_eq!(first.len(), 1);

        for n in 2..=5 {
            append(&path, &user_line(n));
        }
        let next = cursor.poll(&path).expect("poll");
        assert_eq!(
            next.iter().map(|line| line.line_no).collect::<Vec<_>>(),
            vec![2, 3, 4, 5]
        );
        assert!(next[0].text.contains("msg 2"));
        assert!(next[3].text.contains("msg 5"));
    }

    #[test]
    fn unchanged_file_emits_nothing() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("s.jsonl");
        append(&path, &user_line(1));

        let mut cursor = WatchCursor::default();
        assert_eq!(cursor.poll(&path).expect("poll").len(), 1);
        assert!(cursor.poll(&path).expect("poll").is_empty());
        assert!(cursor.poll(&path).expect("poll").is_empty());
        assert_eq!(cursor.seen_count(), 1);
    }

    #[test]
    fn partial_tail_waits_for_completion() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("s.jsonl");
        append(&path, &user_line(1));
        append(&path, "{\"type\":\"user\",\"mess");

        let mut cursor = WatchCursor::default();
        assert_eq!(cursor.poll(&path).expect("poll").len(), 1);

        append(&path, "age\":{\"content\":\"late\"}}\n");
        let completed = cursor.poll(&path).expect("poll");
        assert_eq!(completed.len(), 1);
        assert!(completed[0].text.contains("late"));
    }

    #[test]
    fn stalled_broken_tail_is_released_once() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("s.jsonl");
        append(&path, &user_line(1));
        append(&path, "not json at all");

        let mut cursor = WatchCursor::default();
        assert_eq!(cursor.poll(&path).expect("poll").len(), 1);

        let released = cursor.poll(&path).expect("poll");
        assert_eq!(
            released,
            vec![NewLine {
                line_no: 2,
                text: "not json at all".to_string(),
            }]
        );
        assert!(cursor.poll(&path).expect("poll").is_empty());
    }

    #[test]
    fn oversized_file_stops_the_watch() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("s.jsonl");
        let file = fs::File::create(&path).expect("create");
        file.set_len(MAX_FILE_SIZE + 1).expect("sparse");

        let mut cursor = WatchCursor::default();
        assert!(matches!(
            cursor.poll(&path),
            Err(WatchError::TooLarge { size, .. }) if size == MAX_FILE_SIZE + 1
        ));
    }

    #[test]
    fn complete_json_without_newline_is_not_repeated() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("s.jsonl");
        append(&path, user_line(1).trim_end());

        let mut cursor = WatchCursor::default();
        assert_eq!(cursor.poll(&path).expect("poll").len(), 1);
        append(&path, "\n");
        assert!(cursor.poll(&path).expect("poll").is_empty());
    }

    #[test]
    fn shrinking_file_resets_size_without_output() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("s.jsonl");
        append(&path, &user_line(1));
        append(&path, &user_line(2));

        let mut cursor = WatchCursor::default();
        assert_eq!(cursor.poll(&path).expect("poll").len(), 2);

        fs::write(&path, user_line(1)).expect("truncate");
        assert!(cursor.poll(&path).expect("poll").is_empty());
        assert_eq!(cursor.last_size, user_line(1).len() as u64);

        append(&path, &user_line(3));
        let next = cursor.poll(&path).expect("poll");
        assert_eq!(next.len(), 1);
        assert!(next[0].text.contains("msg 3"));
    }

    struct CancelAfter(usize);

    impl CancelSignal for CancelAfter {
        fn is_cancelled(&mut self) -> bool {
            if self.0 == 0 {
                return true;
            }
            self.0 -= 1;
            false
        }
    }

    #[test]
    fn watch_loop_renders_existing_lines_and_stops_on_cancel() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("s.jsonl");
        append(&path, &user_line(1));
        append(&path, "not json\n");
        append(&path, &user_line(2));

        let mut pipeline = SessionPipeline::new(
            EntryNormalizer::default(),
            Renderer::new(MONO, ShowOptions::default(), false),
        );
        let timing = WatchTiming {
            poll_interval: Duration::from_millis(5),
            min_tick_gap: Duration::from_millis(1),
        };
        let mut out = Vec::new();
        let mut err = Vec::new();
        watch_session_file(
            &path,
            &mut pipeline,
            &mut CancelAfter(3),
            None,
            timing,
            &mut out,
            &mut err,
        )
        .expect("watch");

        let out = String::from_utf8(out).expect("utf8");
        assert_eq!(out, "\nUser: msg 1\n\nUser: msg 2\n");
        let err = String::from_utf8(err).expect("utf8");
        assert_eq!(err, "Warning: s.jsonl:2: MalformedJson\n");
    }
}
