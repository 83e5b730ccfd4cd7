use dirs::home_dir;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use thiserror::Error;

/// Files above this size are refused before any line is read.
pub const MAX_FILE_SIZE: u64 = 100 * 1024 * 1024;

const SESSION_EXTENSION: &str = "jsonl";
const PROJECT_MARKERS: [&str; 8] = [
    ".git",
    ".claude",
    ".hg",
    ".svn",
    "pyproject.toml",
    "setup.py",
    "package.json",
    "Cargo.toml",
];

#[derive(Debug, Error)]
pub enum ResolveClaudeProjectsDirError {
    #[error("home directory not found")]
    HomeDirNotFound,
}

pub fn resolve_claude_projects_dir() -> Result<PathBuf, ResolveClaudeProjectsDirError> {
    if let Some(override_dir) = std::env::var_os("CLAUDE_PROJECTS_DIR") {
        return Ok(PathBuf::from(override_dir));
    }

    let Some(home) = home_dir() else {
        return Err(ResolveClaudeProjectsDirError::HomeDirNotFound);
    };

    Ok(home.join(".claude").join("projects"))
}

/// Directory name the producer uses for a project path: separators and underscores become `-`,
/// and a hidden segment `.name` becomes `-name` (so `--name` once joined).
pub fn session_dir_name(project_path: &Path) -> String {
    let raw = project_path.to_string_lossy();
    let parts = raw
        .split(['/', '\\'])
        .filter(|part| !part.is_empty())
        .map(|part| {
            let part = part.replace('_', "-");
            match part.strip_prefix('.') {
                Some(hidden) => format!("-{hidden}"),
                None => part,
            }
        })
        .collect::<Vec<_>>();
    format!("-{}", parts.join("-"))
}

/// Best-effort inverse of [`session_dir_name`]. Dashes that were underscores or literal dashes
/// cannot be told apart, so they all come back as separators.
pub fn decode_project_dir_name(dir_name: &str) -> String {
    let name = dir_name.strip_prefix('-').unwrap_or(dir_name);
    format!("/{}", name.replace("--", "-.").replace('-', "/"))
}

/// Walk up from `start` to the nearest directory holding a project marker.
pub fn find_project_root(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| PROJECT_MARKERS.iter().any(|marker| dir.join(marker).exists()))
        .map(Path::to_path_buf)
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SessionFile {
    pub path: PathBuf,
    pub name: String,
    pub size_bytes: u64,
    pub modified: Option<SystemTime>,
}

impl SessionFile {
    pub fn stem(&self) -> &str {
        self.name
            .strip_suffix(".jsonl")
            .unwrap_or(self.name.as_str())
    }
}

/// `*.jsonl` files directly under `session_dir`, newest first.
pub fn list_session_files(session_dir: &Path) -> io::Result<Vec<SessionFile>> {
    let mut files = Vec::new();
    for dir_entry in fs::read_dir(session_dir)? {
        let dir_entry = dir_entry?;
        let path = dir_entry.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some(SESSION_EXTENSION) {
            continue;
        }
        let metadata = match dir_entry.metadata() {
            Ok(metadata) if metadata.is_file() => metadata,
            Ok(_) => continue,
            Err(error) => {
                tracing::debug!(
                    path = %path.display(),
                    error = %error,
                    "skipping unreadable entry"
                );
                continue;
            }
        };
        files.push(SessionFile {
            name: dir_entry.file_name().to_string_lossy().into_owned(),
            path,
            size_bytes: metadata.len(),
            modified: metadata.modified().ok(),
        });
    }

    files.sort_by(|a, b| b.modified.cmp(&a.modified).then_with(|| a.name.cmp(&b.name)));
    Ok(files)
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ProjectSummary {
    pub dir_name: String,
    pub decoded_path: String,
    pub session_count: usize,
}

pub fn list_projects(projects_dir: &Path) -> io::Result<Vec<ProjectSummary>> {
    let mut projects = Vec::new();
    for dir_entry in fs::read_dir(projects_dir)? {
        let dir_entry = dir_entry?;
        if !dir_entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
            continue;
        }
        let dir_name = dir_entry.file_name().to_string_lossy().into_owned();
        let session_count = list_session_files(&dir_entry.path())
            .map(|files| files.len())
            .unwrap_or(0);
        projects.push(ProjectSummary {
            decoded_path: decode_project_dir_name(&dir_name),
            dir_name,
            session_count,
        });
    }
    projects.sort_by(|a, b| a.dir_name.cmp(&b.dir_name));
    Ok(projects)
}

#[derive(Debug, Error)]
pub enum SelectSessionError {
    #[error("index {index} out of range (1-{len})")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("file '{0}' not found")]
    NotFound(String),
}

/// `file` picks one session by 1-based index or by name/stem; otherwise the newest `number`
/// sessions are taken (0 means all).
pub fn select_sessions(
    files: &[SessionFile],
    file: Option<&str>,
    number: usize,
) -> Result<Vec<SessionFile>, SelectSessionError> {
    let Some(file) = file else {
        let take = if number == 0 { files.len() } else { number };
        return Ok(files.iter().take(take).cloned().collect());
    };

    if !file.is_empty() && file.chars().all(|c| c.is_ascii_digit()) {
        let index = file.parse::<usize>().unwrap_or(0);
        return index
            .checked_sub(1)
            .and_then(|idx| files.get(idx))
            .map(|found| vec![found.clone()])
            .ok_or(SelectSessionError::IndexOutOfRange {
                index,
                len: files.len(),
            });
    }

    files
        .iter()
        .find(|candidate| candidate.name == file || candidate.stem() == file)
        .map(|found| vec![found.clone()])
        .ok_or_else(|| SelectSessionError::NotFound(file.to_string()))
}

#[derive(Debug, Error)]
pub enum SessionFileError {
    #[error("failed to resolve {}: {source}", path.display())]
    Resolve {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(
        "refusing to read {}: outside the sessions directory {}",
        path.display(),
        root.display()
    )]
    OutsideSessionsRoot { path: PathBuf, root: PathBuf },

    #[error("refusing to read {}: {size} bytes exceeds the {limit} byte limit", path.display())]
    TooLarge { path: PathBuf, size: u64, limit: u64 },

    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Resolve symlinks and confirm `path` is a regular file under `root` and within the size limit.
pub fn validate_session_path(path: &Path, root: &Path) -> Result<PathBuf, SessionFileError> {
    let canonical_root = root.canonicalize().map_err(|source| SessionFileError::Resolve {
        path: root.to_path_buf(),
        source,
    })?;
    let canonical = path.canonicalize().map_err(|source| SessionFileError::Resolve {
        path: path.to_path_buf(),
        source,
    })?;
    if !canonical.starts_with(&canonical_root) {
        return Err(SessionFileError::OutsideSessionsRoot {
            path: path.to_path_buf(),
            root: canonical_root,
        });
    }

    let metadata = fs::metadata(&canonical).map_err(|source| SessionFileError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    if metadata.len() > MAX_FILE_SIZE {
        return Err(SessionFileError::TooLarge {
            path: path.to_path_buf(),
            size: metadata.len(),
            limit: MAX_FILE_SIZE,
        });
    }
    Ok(canonical)
}

/// Every line of an already validated session file. Invalid UTF-8 is replaced, not fatal.
pub fn load_session_lines(path: &Path) -> Result<Vec<String>, SessionFileError> {
    let read_error = |source| SessionFileError::Read {
        path: path.to_path_buf(),
        source,
    };
    let mut bytes = Vec::new();
    File::open(path)
        .and_then(|mut file| file.read_to_end(&mut bytes))
        .map_err(read_error)?;

    Ok(bytes
        .split(|byte| *byte == b'\n')
        .map(|line| String::from_utf8_lossy(line).into_owned())
        .collect())
}
