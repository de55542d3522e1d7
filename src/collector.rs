//! Memory collection from workspace file changes and git history.
//!
//! The collector is stateless: the scan watermark is supplied by the caller
//! on every invocation, so the same instance can be driven from tests and
//! from the monitoring loop without hidden state.

use std::path::{Path, PathBuf};
use std::process::Command;

use chrono::{DateTime, Duration, Utc};
use tracing::warn;
use walkdir::{DirEntry, WalkDir};

use crate::errors::Error;
use crate::memory::{clamp_importance, Memory};

/// File size cap for workspace reads (10 MB).
const MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Content excerpt length folded into a memory, in characters.
const CONTENT_EXCERPT: usize = 1000;

/// Extensions worth tracking: source, markup, config and data file types.
const TRACKED_EXTENSIONS: &[&str] = &[
    "rs", "py", "js", "ts", "md", "json", "yaml", "yml", "toml", "txt", "sql", "sh", "html", "css",
];

/// Directory names never descended into.
const EXCLUDED_DIRS: &[&str] = &[
    ".git",
    ".vscode",
    "node_modules",
    "target",
    "__pycache__",
    "dist",
    "build",
    "vendor",
];

/// File suffixes always skipped.
const EXCLUDED_SUFFIXES: &[&str] = &[".log", ".tmp", ".temp", ".pyc", ".pyo"];

/// Commit subject keywords that raise commit importance by 10 each.
const COMMIT_KEYWORDS: &[&str] = &[
    "fix",
    "add",
    "implement",
    "feature",
    "bug",
    "security",
    "performance",
];

/// Conventional commit types extracted as tags.
const COMMIT_TYPES: &[&str] = &["feat", "fix", "docs", "style", "refactor", "test", "chore"];

/// Topic keywords extracted as commit tags after the types.
const COMMIT_TOPICS: &[&str] = &["api", "ui", "database", "auth", "security", "performance"];

/// File stems signaling a project-significant file (+15 importance).
const SIGNIFICANT_STEMS: &[&str] = &["main", "app", "config", "readme", "lib", "setup"];

/// Turns workspace file deltas and git log entries into raw memory candidates.
pub struct Collector {
    workspace: PathBuf,
}

/// One parsed `hash|author|date|subject` log record.
#[derive(Debug)]
struct LogEntry {
    hash: String,
    author: String,
    date: DateTime<Utc>,
    subject: String,
}

impl Collector {
    /// Create a collector over a workspace root.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WorkspaceNotFound`] if the root is not a directory.
    pub fn new(workspace: impl Into<PathBuf>) -> Result<Self, Error> {
        let workspace = workspace.into();
        if !workspace.is_dir() {
            return Err(Error::WorkspaceNotFound(workspace));
        }
        Ok(Collector { workspace })
    }

    /// The observed workspace root.
    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    /// Collect unenriched memories for files modified after `since`.
    ///
    /// Per-file read errors are logged and the file skipped; the call fails
    /// only if the workspace root itself cannot be walked.
    pub fn collect_file_changes(&self, since: DateTime<Utc>) -> Result<Vec<Memory>, Error> {
        if !self.workspace.is_dir() {
            return Err(Error::WorkspaceNotFound(self.workspace.clone()));
        }

        let mut memories = Vec::new();
        let walker = WalkDir::new(&self.workspace)
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_excluded(e));

        for entry in walker {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    warn!(error = %e, "skipping unreadable workspace entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() || !has_tracked_extension(entry.path()) {
                continue;
            }

            let metadata = match entry.metadata() {
                Ok(m) => m,
                Err(e) => {
                    warn!(path = %entry.path().display(), error = %e, "cannot stat file");
                    continue;
                }
            };
            let modified: DateTime<Utc> = match metadata.modified() {
                Ok(t) => t.into(),
                Err(e) => {
                    warn!(path = %entry.path().display(), error = %e, "no modification time");
                    continue;
                }
            };
            if modified <= since {
                continue;
            }

            let Some(content) = read_file_capped(entry.path(), metadata.len()) else {
                continue;
            };
            memories.push(self.file_memory(entry.path(), &content, &metadata, modified));
        }

        Ok(memories)
    }

    fn file_memory(
        &self,
        path: &Path,
        content: &str,
        metadata: &std::fs::Metadata,
        modified: DateTime<Utc>,
    ) -> Memory {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let excerpt: String = content.chars().take(CONTENT_EXCERPT).collect();

        let mut memory = Memory::with_timestamp(
            format!("File modified: {name}\n\n{excerpt}"),
            "file",
            modified,
        );
        memory.importance_score = file_importance(path);
        memory.tags = file_tags(path, &self.workspace);
        memory.file_path = Some(path.to_string_lossy().into_owned());
        memory
            .metadata
            .insert("file_size".into(), metadata.len().into());
        memory
            .metadata
            .insert("file_type".into(), extension_of(path).into());
        memory
            .metadata
            .insert("modification_type".into(), "update".into());
        memory
    }

    /// Collect one memory per commit in the last `since_hours` hours.
    ///
    /// Malformed log records are logged and skipped, degrading to whatever
    /// parsed cleanly. A git binary that cannot be invoked at all surfaces
    /// as [`Error::GitUnavailable`] so callers can tell "no commits" apart
    /// from "no provider".
    pub fn collect_git_history(&self, since_hours: i64) -> Result<Vec<Memory>, Error> {
        let since = Utc::now() - Duration::hours(since_hours);
        let since_arg = format!("--since={}", since.format("%Y-%m-%d %H:%M:%S"));

        let output = Command::new("git")
            .args([
                "log",
                &since_arg,
                "--pretty=format:%H|%an|%ad|%s",
                "--date=iso",
            ])
            .current_dir(&self.workspace)
            .env("GIT_TERMINAL_PROMPT", "0")
            .output()
            .map_err(|e| Error::GitUnavailable(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(Error::GitUnavailable(stderr));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let mut memories = Vec::new();
        for line in stdout.lines().filter(|l| !l.trim().is_empty()) {
            let Some(entry) = parse_log_line(line) else {
                warn!(line, "skipping malformed git log record");
                continue;
            };
            let stat = self.commit_stat(&entry.hash);
            memories.push(commit_memory(&entry, &stat));
        }

        Ok(memories)
    }

    /// Fetch the stat-style change summary for one commit, empty on failure.
    fn commit_stat(&self, hash: &str) -> String {
        let output = Command::new("git")
            .args(["show", "--stat", "--no-color", hash])
            .current_dir(&self.workspace)
            .env("GIT_TERMINAL_PROMPT", "0")
            .output();
        match output {
            Ok(out) if out.status.success() => String::from_utf8_lossy(&out.stdout).into_owned(),
            Ok(out) => {
                let stderr = String::from_utf8_lossy(&out.stderr);
                warn!(hash, error = %stderr.trim(), "git show failed");
                String::new()
            }
            Err(e) => {
                warn!(hash, error = %e, "git show could not run");
                String::new()
            }
        }
    }
}

fn commit_memory(entry: &LogEntry, stat: &str) -> Memory {
    let excerpt: String = stat.chars().take(CONTENT_EXCERPT).collect();
    let mut memory = Memory::with_timestamp(
        format!(
            "Git commit: {}\n\nAuthor: {}\n\n{}",
            entry.subject, entry.author, excerpt
        ),
        "git",
        entry.date,
    );
    memory.importance_score = commit_importance(&entry.subject, stat);
    memory.tags = commit_tags(&entry.subject).into_iter().collect();
    memory
        .metadata
        .insert("commit_hash".into(), entry.hash.clone().into());
    memory
        .metadata
        .insert("author".into(), entry.author.clone().into());
    memory
        .metadata
        .insert("commit_message".into(), entry.subject.clone().into());
    memory
}

fn parse_log_line(line: &str) -> Option<LogEntry> {
    let mut parts = line.splitn(4, '|');
    let hash = parts.next()?.trim();
    let author = parts.next()?.trim();
    let date_str = parts.next()?.trim();
    let subject = parts.next()?.trim();
    if hash.is_empty() || date_str.is_empty() {
        return None;
    }

    // git --date=iso: "2024-01-01 12:00:00 +0200"
    let date = DateTime::parse_from_str(date_str, "%Y-%m-%d %H:%M:%S %z")
        .ok()?
        .with_timezone(&Utc);

    Some(LogEntry {
        hash: hash.to_string(),
        author: author.to_string(),
        date,
        subject: subject.to_string(),
    })
}

/// Deterministic commit importance: base 50, +10 per subject keyword,
/// +20 for a >100 line stat (+10 for >50), clamped to 100.
fn commit_importance(subject: &str, stat: &str) -> u8 {
    let lower = subject.to_lowercase();
    let mut score: u32 = 50;

    for keyword in COMMIT_KEYWORDS {
        if lower.contains(keyword) {
            score += 10;
        }
    }

    let lines_changed = stat.lines().count();
    if lines_changed > 100 {
        score += 20;
    } else if lines_changed > 50 {
        score += 10;
    }

    clamp_importance(score)
}

/// Up to 3 tags from conventional-commit types and topic keywords.
fn commit_tags(subject: &str) -> Vec<String> {
    let lower = subject.to_lowercase();
    COMMIT_TYPES
        .iter()
        .chain(COMMIT_TOPICS.iter())
        .filter(|t| lower.contains(*t))
        .take(3)
        .map(|t| t.to_string())
        .collect()
}

/// Deterministic file importance: base 50, plus kind and stem bonuses,
/// clamped to 100.
fn file_importance(path: &Path) -> u8 {
    let mut score: u32 = 50;

    match extension_of(path).as_str() {
        "rs" | "py" | "js" | "ts" => score += 20,
        "md" | "txt" => score += 10,
        "json" | "yaml" | "yml" | "toml" => score += 15,
        _ => {}
    }

    if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
        let stem = stem.to_lowercase();
        if SIGNIFICANT_STEMS.iter().any(|name| stem.contains(name)) {
            score += 15;
        }
    }

    clamp_importance(score)
}

/// Extension tag plus up to 5 lower-cased path segments under the workspace.
fn file_tags(path: &Path, workspace: &Path) -> std::collections::BTreeSet<String> {
    let mut tags = std::collections::BTreeSet::new();

    let ext = extension_of(path);
    if !ext.is_empty() {
        tags.insert(ext);
    }

    let relative = path.strip_prefix(workspace).unwrap_or(path);
    for part in relative
        .iter()
        .filter_map(|p| p.to_str())
        .filter(|p| *p != "." && !p.starts_with('.'))
        .take(5)
    {
        tags.insert(part.to_lowercase());
    }

    tags
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default()
}

fn has_tracked_extension(path: &Path) -> bool {
    TRACKED_EXTENSIONS.contains(&extension_of(path).as_str())
}

fn is_excluded(entry: &DirEntry) -> bool {
    let name = entry.file_name().to_string_lossy();
    name.starts_with('.')
        || EXCLUDED_DIRS.contains(&name.as_ref())
        || EXCLUDED_SUFFIXES.iter().any(|s| name.ends_with(s))
}

/// Read a file with a size cap and lossy UTF-8 decoding.
///
/// Malformed bytes are replaced rather than fatal; oversized or unreadable
/// files yield `None` after a logged warning.
pub(crate) fn read_file_capped(path: &Path, size: u64) -> Option<String> {
    if size > MAX_FILE_SIZE {
        warn!(path = %path.display(), size, "file exceeds read cap, skipping");
        return None;
    }
    match std::fs::read(path) {
        Ok(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "error reading file");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn workspace_with(files: &[(&str, &str)]) -> TempDir {
        let dir = TempDir::new().unwrap();
        for (rel, content) in files {
            let path = dir.path().join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }
        dir
    }

    fn long_ago() -> DateTime<Utc> {
        Utc::now() - Duration::days(365)
    }

    #[test]
    fn test_collect_includes_markdown_excludes_hidden() {
        let dir = workspace_with(&[
            ("NOTES.md", "# notes"),
            (".secret/hidden.md", "# hidden"),
            (".hidden.md", "# dotfile"),
        ]);
        let collector = Collector::new(dir.path()).unwrap();

        let memories = collector.collect_file_changes(long_ago()).unwrap();
        assert_eq!(memories.len(), 1);
        assert!(memories[0].content.contains("NOTES.md"));
    }

    #[test]
    fn test_collect_skips_excluded_dirs_and_untracked_extensions() {
        let dir = workspace_with(&[
            ("src/main.rs", "fn main() {}"),
            ("node_modules/pkg/index.js", "module.exports = {}"),
            ("target/debug/out.txt", "artifact"),
            ("image.png", "not text"),
        ]);
        let collector = Collector::new(dir.path()).unwrap();

        let memories = collector.collect_file_changes(long_ago()).unwrap();
        assert_eq!(memories.len(), 1);
        assert_eq!(memories[0].file_path.as_deref().map(Path::new).and_then(|p| p.file_name()),
            Some(std::ffi::OsStr::new("main.rs")));
    }

    #[test]
    fn test_watermark_filters_old_files() {
        let dir = workspace_with(&[("old.md", "stale")]);
        let collector = Collector::new(dir.path()).unwrap();

        let future = Utc::now() + Duration::hours(1);
        let memories = collector.collect_file_changes(future).unwrap();
        assert!(memories.is_empty());
    }

    #[test]
    fn test_file_memory_shape() {
        let dir = workspace_with(&[("docs/guide/setup.md", "install steps")]);
        let collector = Collector::new(dir.path()).unwrap();

        let memories = collector.collect_file_changes(long_ago()).unwrap();
        let m = &memories[0];
        assert_eq!(m.memory_type, "file");
        assert!(m.content.starts_with("File modified: setup.md\n\n"));
        assert!(m.tags.contains("md"));
        assert!(m.tags.contains("docs"));
        assert!(m.tags.contains("guide"));
        assert_eq!(m.metadata["modification_type"], "update");
        assert_eq!(m.metadata["file_type"], "md");
        assert!(m.metadata["file_size"].as_u64().unwrap() > 0);
    }

    #[test]
    fn test_workspace_not_found() {
        let result = Collector::new("/nonexistent/workspace/path");
        assert!(matches!(result, Err(Error::WorkspaceNotFound(_))));
    }

    #[test]
    fn test_file_importance_source_and_significant_stem() {
        // base 50 + 20 (source) + 15 (stem "main")
        assert_eq!(file_importance(Path::new("src/main.rs")), 85);
        // base 50 + 10 (prose) + 15 (stem "readme")
        assert_eq!(file_importance(Path::new("README.md")), 75);
        // base 50 + 15 (structured config) + 15 (stem "config")
        assert_eq!(file_importance(Path::new("config.yaml")), 80);
        // base 50 only
        assert_eq!(file_importance(Path::new("queries.sql")), 50);
    }

    #[test]
    fn test_commit_importance_keyword_and_size() {
        let stat: String = (0..120).map(|i| format!("file{i} | 1 +\n")).collect();
        assert_eq!(commit_importance("fix: repair null pointer", &stat), 80);
    }

    #[test]
    fn test_commit_importance_is_capped() {
        let subject = "fix bug: add security feature, implement performance";
        let stat: String = (0..200).map(|i| format!("f{i} | 2 ++\n")).collect();
        assert_eq!(commit_importance(subject, stat.as_str()), 100);
    }

    #[test]
    fn test_commit_importance_medium_diff() {
        let stat: String = (0..60).map(|i| format!("f{i} | 1 +\n")).collect();
        // 50 + 10 (fix) + 10 (>50 lines)
        assert_eq!(commit_importance("fix typo", &stat), 70);
    }

    #[test]
    fn test_commit_tags_limited_to_three() {
        let tags = commit_tags("feat: fix api auth for database tests");
        assert_eq!(tags.len(), 3);
        assert!(tags.contains(&"feat".to_string()));
        assert!(tags.contains(&"fix".to_string()));
    }

    #[test]
    fn test_parse_log_line() {
        let entry =
            parse_log_line("abc123|Jane Doe|2024-03-01 10:00:00 +0000|fix: null check").unwrap();
        assert_eq!(entry.hash, "abc123");
        assert_eq!(entry.author, "Jane Doe");
        assert_eq!(entry.subject, "fix: null check");
    }

    #[test]
    fn test_parse_log_line_malformed() {
        assert!(parse_log_line("only|three|fields").is_none());
        assert!(parse_log_line("h|a|not a date|subject").is_none());
        assert!(parse_log_line("").is_none());
    }

    #[test]
    fn test_subject_with_pipes_kept_whole() {
        let entry =
            parse_log_line("h1|Ann|2024-03-01 10:00:00 +0000|feat: a | b | c").unwrap();
        assert_eq!(entry.subject, "feat: a | b | c");
    }
}
