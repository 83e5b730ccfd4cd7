use crate::app::SessionPipeline;
use crate::domain::{AliasTable, EntryNormalizer, ShowOptions};
use crate::infra::{
    ALIASES_ENV, AppConfig, CrlfWriter, FileChangeHint, KeypressCancel, LoadAliasTableError,
    ResolveClaudeProjectsDirError, SelectSessionError, SessionFile, SessionFileError, THEME_ENV,
    WatchError, WatchTiming, alias_table_path, config_path, determine_theme, find_project_root,
    list_projects, list_session_files, load_alias_table, load_config_or_default,
    load_session_lines, resolve_claude_projects_dir, select_sessions, session_dir_name,
    validate_session_path, watch_session_file,
};
use crate::ui::Renderer;
use crate::ui::theme::{DEFAULT_THEME, THEMES, Theme};
use humansize::{DECIMAL, format_size};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use unicode_width::UnicodeWidthStr;

const FILENAME_DISPLAY_WIDTH: usize = 44;
const SEPARATOR_WIDTH: usize = 70;
const STATUS_RULE_WIDTH: usize = 40;
const LIST_DATE_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]");
const HEADER_DATE_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum CliInvocation {
    PrintHelp,
    PrintVersion,
    ListThemes,
    View(ViewArgs),
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ViewArgs {
    /// Newest sessions to show; 0 shows all.
    pub number: usize,
    pub list: bool,
    pub file: Option<String>,
    pub timestamp: bool,
    pub watch: bool,
    pub no_color: bool,
    pub theme: Option<String>,
    pub project: Option<PathBuf>,
    pub list_projects: bool,
    pub show: Option<String>,
    pub aliases: Option<PathBuf>,
}

impl Default for ViewArgs {
    fn default() -> Self {
        Self {
            number: 1,
            list: false,
            file: None,
            timestamp: false,
            watch: false,
            no_color: false,
            theme: None,
            project: None,
            list_projects: false,
            show: None,
            aliases: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum CliParseError {
    #[error("unknown flag: {0}")]
    UnknownFlag(String),

    #[error("missing value for flag: {0}")]
    MissingFlagValue(String),

    #[error("invalid value for {flag}: {value}")]
    InvalidFlagValue { flag: String, value: String },

    #[error("unexpected argument: {0}")]
    UnexpectedArgument(String),
}

pub fn parse_invocation(args: &[String]) -> Result<CliInvocation, CliParseError> {
    if args.iter().skip(1).any(|arg| arg == "--help" || arg == "-h") {
        return Ok(CliInvocation::PrintHelp);
    }
    if args.iter().skip(1).any(|arg| arg == "--version" || arg == "-V") {
        return Ok(CliInvocation::PrintVersion);
    }

    let mut view = ViewArgs::default();
    let mut list_themes = false;
    let mut iter = args.iter().skip(1).peekable();
    while let Some(arg) = iter.next() {
        let (flag, inline) = split_inline_value(arg);
        match flag {
            "-n" | "--number" => {
                let value = take_value(flag, inline, &mut iter)?;
                view.number = parse_usize_flag(flag, &value)?;
            }
            "-f" | "--file" => view.file = Some(take_value(flag, inline, &mut iter)?),
            "-p" | "--project" => {
                view.project = Some(PathBuf::from(take_value(flag, inline, &mut iter)?));
            }
            "-s" | "--show" => view.show = Some(take_value(flag, inline, &mut iter)?),
            "--aliases" => {
                view.aliases = Some(PathBuf::from(take_value(flag, inline, &mut iter)?));
            }
            "--theme" => {
                // Bare `--theme` lists the themes, like `--theme list`.
                let value = match inline {
                    Some(value) => Some(value.to_string()),
                    None => iter.next_if(|next| !next.starts_with('-')).cloned(),
                };
                match value.as_deref() {
                    None | Some("list") => list_themes = true,
                    Some(name) => view.theme = Some(name.to_string()),
                }
            }
            "-l" | "--list" => view.list = true,
            "-t" | "--timestamp" => view.timestamp = true,
            "-w" | "--watch" => view.watch = true,
            "--no-color" => view.no_color = true,
            "--list-projects" => view.list_projects = true,
            _ if is_short_cluster(arg) => apply_short_cluster(arg, &mut view, &mut iter)?,
            _ if arg.starts_with('-') => return Err(CliParseError::UnknownFlag(arg.to_string())),
            _ => return Err(CliParseError::UnexpectedArgument(arg.to_string())),
        }
    }

    if list_themes {
        return Ok(CliInvocation::ListThemes);
    }
    Ok(CliInvocation::View(view))
}

fn split_inline_value(arg: &str) -> (&str, Option<&str>) {
    if arg.starts_with("--") {
        if let Some((flag, value)) = arg.split_once('=') {
            return (flag, Some(value));
        }
    }
    (arg, None)
}

fn take_value<'a>(
    flag: &str,
    inline: Option<&str>,
    iter: &mut impl Iterator<Item = &'a String>,
) -> Result<String, CliParseError> {
    if let Some(value) = inline {
        return Ok(value.to_string());
    }
    iter.next()
        .cloned()
        .ok_or_else(|| CliParseError::MissingFlagValue(flag.to_string()))
}

/// `-saH`, `-n3`, `-tw`: one dash followed by several characters.
fn is_short_cluster(arg: &str) -> bool {
    arg.len() > 2 && arg.starts_with('-') && !arg.starts_with("--")
}

fn apply_short_cluster<'a>(
    arg: &str,
    view: &mut ViewArgs,
    iter: &mut impl Iterator<Item = &'a String>,
) -> Result<(), CliParseError> {
    let body = &arg[1..];
    for (idx, ch) in body.char_indices() {
        let rest = &body[idx + ch.len_utf8()..];
        let attached = (!rest.is_empty()).then_some(rest);
        match ch {
            's' | 'n' | 'f' | 'p' => {
                let flag = format!("-{ch}");
                let value = take_value(&flag, attached, iter)?;
                match ch {
                    's' => view.show = Some(value),
                    'n' => view.number = parse_usize_flag(&flag, &value)?,
                    'f' => view.file = Some(value),
                    _ => view.project = Some(PathBuf::from(value)),
                }
                return Ok(());
            }
            'l' => view.list = true,
            't' => view.timestamp = true,
            'w' => view.watch = true,
            _ => return Err(CliParseError::UnknownFlag(arg.to_string())),
        }
    }
    Ok(())
}

fn parse_usize_flag(flag: &str, value: &str) -> Result<usize, CliParseError> {
    value
        .parse::<usize>()
        .map_err(|_| CliParseError::InvalidFlagValue {
            flag: flag.to_string(),
            value: value.to_string(),
        })
}

#[derive(Debug, Error)]
pub enum CliRunError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    ResolveProjectsDir(#[from] ResolveClaudeProjectsDirError),

    #[error(transparent)]
    LoadAliasTable(#[from] LoadAliasTableError),

    #[error(transparent)]
    SelectSession(#[from] SelectSessionError),

    #[error(transparent)]
    SessionFile(#[from] SessionFileError),

    #[error(transparent)]
    Watch(#[from] WatchError),

    #[error("unknown theme: {0}\nHint: run `claudelog --theme` to list the available themes.")]
    UnknownTheme(String),

    #[error("no projects found in {}", .0.display())]
    NoProjects(PathBuf),

    #[error(
        "no session history found for project: {}\nHint: use --list-projects to see all projects with sessions.\nNote: underscores and slashes in paths both become dashes in session folders.",
        .0.display()
    )]
    NoSessionHistory(PathBuf),

    #[error("no session files found in {}", .0.display())]
    NoSessionFiles(PathBuf),

    #[error("{0} session file(s) could not be displayed")]
    SessionsFailed(usize),
}

pub fn run(args: ViewArgs) -> Result<(), CliRunError> {
    let stdout = io::stdout();
    let mut out = io::BufWriter::new(stdout.lock());
    let stderr = io::stderr();
    let mut err = io::BufWriter::new(stderr.lock());

    let config = load_config_or_default(config_path().as_deref());

    let show_flags = args.show.as_deref().or(config.show.as_deref()).unwrap_or("");
    let parsed = ShowOptions::parse(show_flags);

    let env_theme = std::env::var(THEME_ENV).ok();
    let theme_name = determine_theme(
        args.theme.as_deref(),
        args.no_color,
        env_theme.as_deref(),
        &config,
    );
    let theme = Theme::by_name(theme_name)
        .ok_or_else(|| CliRunError::UnknownTheme(theme_name.to_string()))?;

    if parsed.status_requested {
        write_status_report(&mut out, &theme, &parsed.options)?;
        out.flush()?;
        return Ok(());
    }

    let aliases = load_aliases(&args, &config)?;
    let projects_dir = resolve_claude_projects_dir()?;

    if args.list_projects {
        return print_projects(&mut out, &theme, &projects_dir);
    }

    let project = match &args.project {
        Some(project) => project.clone(),
        None => {
            let cwd = std::env::current_dir()?;
            find_project_root(&cwd).unwrap_or(cwd)
        }
    };
    let session_dir = projects_dir.join(session_dir_name(&project));
    if !session_dir.is_dir() {
        return Err(CliRunError::NoSessionHistory(project));
    }

    let files = list_session_files(&session_dir)?;
    if files.is_empty() {
        return Err(CliRunError::NoSessionFiles(session_dir));
    }

    if args.list {
        print_session_list(&mut out, &theme, &files)?;
        out.flush()?;
        return Ok(());
    }

    let selected = select_sessions(&files, args.file.as_deref(), args.number)?;
    let normalizer = EntryNormalizer::new(aliases);
    let make_pipeline = || {
        SessionPipeline::new(
            normalizer.clone(),
            Renderer::new(theme, parsed.options.clone(), args.timestamp),
        )
    };

    if args.watch {
        drop(out);
        drop(err);
        return watch_first(&selected, &projects_dir, &theme, make_pipeline());
    }

    let mut failed = 0usize;
    let multiple = selected.len() > 1;
    for file in &selected {
        if multiple && !write_session_header(&mut out, &theme, file)? {
            return Ok(());
        }
        match show_session(&mut out, &mut err, &theme, file, &projects_dir, make_pipeline()) {
            Ok(true) => {}
            Ok(false) => return Ok(()),
            Err(error) => {
                failed += 1;
                out.flush()?;
                write_line(&mut err, &theme.paint(theme.error, &format!("Error: {error}")))?;
                err.flush()?;
            }
        }
    }
    out.flush()?;
    err.flush()?;

    if failed > 0 {
        return Err(CliRunError::SessionsFailed(failed));
    }
    Ok(())
}

fn load_aliases(args: &ViewArgs, config: &AppConfig) -> Result<AliasTable, CliRunError> {
    let env_path = std::env::var_os(ALIASES_ENV).map(PathBuf::from);
    match alias_table_path(args.aliases.as_deref(), env_path.as_deref(), config) {
        Some(path) => Ok(load_alias_table(&path)?),
        None => Ok(AliasTable::default()),
    }
}

/// Render one session file. `Ok(false)` means stdout went away.
fn show_session(
    out: &mut impl Write,
    err: &mut impl Write,
    theme: &Theme,
    file: &SessionFile,
    projects_dir: &Path,
    mut pipeline: SessionPipeline,
) -> Result<bool, CliRunError> {
    let path = validate_session_path(&file.path, projects_dir)?;
    let lines = load_session_lines(&path)?;

    if lines.iter().all(|line| line.trim().is_empty()) {
        return Ok(write_line(
            out,
            &theme.paint(theme.error, &format!("No data found in {}", file.name)),
        )?);
    }

    for (idx, line) in lines.iter().enumerate() {
        let processed = pipeline.process_line(idx + 1, line);
        if let Some(warning) = processed.warning {
            let text = format!(
                "Warning: {}:{}: {}",
                file.name, warning.line_no, warning.kind
            );
            tracing::debug!(
                file = %file.name,
                line_no = warning.line_no,
                kind = %warning.kind,
                "skipped line"
            );
            if !write_line(err, &theme.paint(theme.error, &text))? {
                return Ok(false);
            }
        }
        if let Some(output) = processed.output {
            if !write_line(out, &output)? {
                return Ok(false);
            }
        }
    }

    let footer = format!(
        "\n{}\n{}",
        theme.paint(theme.separator, &"─".repeat(SEPARATOR_WIDTH)),
        theme.paint(theme.timestamp, "End of session")
    );
    Ok(write_line(out, &footer)?)
}

fn watch_first(
    selected: &[SessionFile],
    projects_dir: &Path,
    theme: &Theme,
    mut pipeline: SessionPipeline,
) -> Result<(), CliRunError> {
    let Some(first) = selected.first() else {
        return Ok(());
    };
    let path = validate_session_path(&first.path, projects_dir)?;

    let mut cancel = KeypressCancel::install();
    let raw = cancel.raw_mode();
    let mut out = CrlfWriter::new(io::stdout().lock(), raw);
    let mut err = CrlfWriter::new(io::stderr().lock(), raw);

    if selected.len() > 1 {
        writeln!(
            err,
            "{}",
            theme.paint(
                theme.error,
                &format!(
                    "Warning: watching several files is not supported; watching only {}",
                    first.name
                )
            )
        )?;
    }

    let hint = match FileChangeHint::new(&path) {
        Ok(hint) => Some(hint),
        Err(error) => {
            tracing::debug!(error = %error, "falling back to plain polling");
            None
        }
    };

    writeln!(
        out,
        "\n{}",
        theme.paint(theme.system, &format!("Watching session: {}", first.name))
    )?;
    let exit_hint = if raw {
        "Press ESC or Ctrl+C to exit"
    } else {
        "Press Ctrl+C to exit"
    };
    writeln!(out, "{}\n", theme.paint(theme.dim, exit_hint))?;

    match watch_session_file(
        &path,
        &mut pipeline,
        &mut cancel,
        hint.as_ref(),
        WatchTiming::default(),
        &mut out,
        &mut err,
    ) {
        Ok(()) => {}
        Err(WatchError::Write(error)) if error.kind() == io::ErrorKind::BrokenPipe => {
            return Ok(());
        }
        Err(error) => return Err(error.into()),
    }

    writeln!(out, "\n{}", theme.paint(theme.system, "Stopped watching"))?;
    out.flush()?;
    Ok(())
}

fn print_projects(
    out: &mut impl Write,
    theme: &Theme,
    projects_dir: &Path,
) -> Result<(), CliRunError> {
    if !projects_dir.is_dir() {
        return Err(CliRunError::NoProjects(projects_dir.to_path_buf()));
    }
    let projects = list_projects(projects_dir)?;
    let heading = format!(
        "\n{}",
        theme.paint(
            theme.bold,
            &format!("Found {} project(s) with session history:", projects.len())
        )
    );
    if !write_line(out, &heading)? {
        return Ok(());
    }
    for project in projects {
        let line = format!(
            "  {} ({} sessions)",
            theme.paint(theme.bold, &project.decoded_path),
            project.session_count
        );
        if !write_line(out, &line)? {
            return Ok(());
        }
    }
    out.flush()?;
    Ok(())
}

fn print_session_list(
    out: &mut impl Write,
    theme: &Theme,
    files: &[SessionFile],
) -> io::Result<()> {
    let heading = format!(
        "\n{}",
        theme.paint(
            theme.bold,
            &format!("Found {} session file(s):", files.len())
        )
    );
    if !write_line(out, &heading)? {
        return Ok(());
    }
    for (idx, file) in files.iter().enumerate() {
        let name = pad_right(
            &truncate_end(&file.name, FILENAME_DISPLAY_WIDTH),
            FILENAME_DISPLAY_WIDTH,
        );
        let modified = format_modified(file.modified, LIST_DATE_FORMAT);
        let size = format_size(file.size_bytes, DECIMAL);
        let line = format!(
            "  {} {name} {}",
            theme.paint(theme.bold, &format!("{:3}.", idx + 1)),
            theme.paint(theme.timestamp, &format!("{modified}  {size:>8}"))
        );
        if !write_line(out, &line)? {
            return Ok(());
        }
    }
    Ok(())
}

fn write_session_header(
    out: &mut impl Write,
    theme: &Theme,
    file: &SessionFile,
) -> io::Result<bool> {
    let rule = theme.paint(theme.separator, &"=".repeat(SEPARATOR_WIDTH));
    let header = format!(
        "\n{rule}\n{}\n{}\n{rule}",
        theme.paint(theme.bold, &format!("Session: {}", file.name)),
        theme.paint(
            theme.timestamp,
            &format!("Date: {}", format_modified(file.modified, HEADER_DATE_FORMAT))
        ),
    );
    write_line(out, &header)
}

fn write_status_report(
    out: &mut impl Write,
    theme: &Theme,
    options: &ShowOptions,
) -> io::Result<()> {
    let report = options.status_report();
    let rule = "-".repeat(STATUS_RULE_WIDTH);
    let mut lines = vec![String::new(), "Show Options Status:".to_string(), rule.clone()];
    if !report.enabled.is_empty() {
        lines.push(theme.paint(theme.assistant, "ENABLED:"));
        for flag in &report.enabled {
            lines.push(theme.paint(
                theme.assistant,
                &format!("  {}: {}", flag.letter(), flag.description()),
            ));
        }
    }
    if !report.disabled.is_empty() {
        lines.push(String::new());
        lines.push(theme.paint(theme.dim, "DISABLED:"));
        for flag in &report.disabled {
            lines.push(theme.paint(
                theme.dim,
                &format!("  {}: {}", flag.letter(), flag.description()),
            ));
        }
    }
    lines.push(rule);
    lines.push(String::new());

    for line in lines {
        if !write_line(out, &line)? {
            break;
        }
    }
    Ok(())
}

pub fn print_themes(out: &mut impl Write) -> io::Result<()> {
    write_line(out, "Available themes:")?;
    for theme in THEMES {
        let marker = if theme.name == DEFAULT_THEME {
            " (default)"
        } else {
            ""
        };
        let line = format!(
            "  {} {}{marker}",
            pad_right(theme.name, 16),
            theme.description
        );
        if !write_line(out, &line)? {
            return Ok(());
        }
    }
    Ok(())
}

fn format_modified(modified: Option<SystemTime>, format: &[BorrowedFormatItem<'_>]) -> String {
    modified
        .and_then(|time| OffsetDateTime::from(time).format(format).ok())
        .unwrap_or_else(|| "-".to_string())
}

fn pad_right(text: &str, width: usize) -> String {
    let current = UnicodeWidthStr::width(text);
    if current >= width {
        return text.to_string();
    }
    format!("{}{}", text, " ".repeat(width.saturating_sub(current)))
}

fn truncate_end(text: &str, max_width: usize) -> String {
    if UnicodeWidthStr::width(text) <= max_width {
        return text.to_string();
    }
    let mut out = String::new();
    let mut width = 0usize;
    for ch in text.chars() {
        let ch_width = unicode_width::UnicodeWidthChar::width(ch).unwrap_or(0);
        if width + ch_width > max_width {
            break;
        }
        width += ch_width;
        out.push(ch);
    }
    out
}

fn write_line(out: &mut impl Write, line: &str) -> io::Result<bool> {
    match writeln!(out, "{line}") {
        Ok(()) => Ok(true),
        Err(error) if error.kind() == io::ErrorKind::BrokenPipe => Ok(false),
        Err(error) => Err(error),
    }
}
