//! Repository data model and analysis.
//!
//! A `RepositorySnapshot` is what the collector hands over: identity, the
//! candidate files (with or without text) and the README. Everything here
//! is pure: metrics, the summary used for prompts and the fallback, and the
//! size-capped JSON context sent to the generative service.

use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::sync::LazyLock;

use crate::config::LimitsConfig;

/// Identity of the analysed repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepositoryIdentity {
    pub owner: String,
    pub name: String,
    pub branch: String,
    /// Canonical `https://github.com/<owner>/<name>` URL.
    pub url: String,
}

/// A collected file. `text` is `None` when the content was not fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub path: String,
    pub text: Option<String>,
}

impl FileEntry {
    pub fn new(path: impl Into<String>, text: Option<String>) -> Self {
        Self {
            path: path.into(),
            text,
        }
    }

    /// File name without directories.
    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    /// Lowercased extension without the dot, if any.
    pub fn extension(&self) -> Option<String> {
        let name = self.file_name();
        match name.rfind('.') {
            Some(idx) if idx > 0 && idx + 1 < name.len() => Some(name[idx + 1..].to_lowercase()),
            _ => None,
        }
    }
}

/// Everything the collector produced for one repository.
#[derive(Debug, Clone)]
pub struct RepositorySnapshot {
    pub identity: RepositoryIdentity,
    pub files: Vec<FileEntry>,
    /// README text, empty when absent.
    pub readme: String,
}

/// Size figures the complexity classifier works on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct RepositoryMetrics {
    pub file_count: u64,
    pub code_char_count: u64,
    pub language_count: u64,
    pub readme_char_count: u64,
}

/// Incremental metrics computation, one file at a time.
#[derive(Debug, Default)]
pub struct MetricsAccumulator {
    file_count: u64,
    code_char_count: u64,
    extensions: HashSet<String>,
}

impl MetricsAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, file: &FileEntry) {
        self.file_count += 1;
        if let Some(text) = &file.text {
            self.code_char_count += text.chars().count() as u64;
        }
        if let Some(ext) = file.extension() {
            self.extensions.insert(ext);
        }
    }

    pub fn finish(self, readme: &str) -> RepositoryMetrics {
        RepositoryMetrics {
            file_count: self.file_count,
            code_char_count: self.code_char_count,
            language_count: self.extensions.len() as u64,
            readme_char_count: readme.chars().count() as u64,
        }
    }
}

/// Guess at the role of a notable file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyFileKind {
    Config,
    Entry,
    Build,
    Docs,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyFile {
    pub path: String,
    pub kind: KeyFileKind,
}

/// Human-oriented summary used in prompts and in the fallback narration.
#[derive(Debug, Clone, Serialize)]
pub struct RepositorySummary {
    pub title: String,
    pub owner: String,
    pub url: String,
    pub branch: String,
    pub description: String,
    /// Extension tally, most frequent first.
    pub languages: Vec<(String, usize)>,
    pub file_count: usize,
    pub key_files: Vec<KeyFile>,
}

impl RepositorySummary {
    /// Most frequent extension, if any file had one.
    pub fn main_language(&self) -> Option<&str> {
        self.languages.first().map(|(lang, _)| lang.as_str())
    }
}

const MAX_DESCRIPTION_CHARS: usize = 300;
const MAX_KEY_FILES: usize = 10;

static TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^#[ \t]+(.+?)[ \t]*$").expect("valid title regex"));
static BADGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*\[!\[[^\]]*\]\([^)]*\)\]\([^)]*\)[ \t]*\r?\n?")
        .expect("valid badge regex")
});

const KEY_FILE_PATTERNS: &[(KeyFileKind, &[&str])] = &[
    (
        KeyFileKind::Config,
        &["config.", "settings.", "env", ".config", "conf.", "manifest."],
    ),
    (
        KeyFileKind::Entry,
        &["main.", "app.", "index.", "server.", "run.", "__main__."],
    ),
    (
        KeyFileKind::Build,
        &[
            "package.json",
            "requirements.txt",
            "pom.xml",
            "build.gradle",
            "dockerfile",
            "makefile",
            "setup.py",
            "cargo.toml",
        ],
    ),
    (
        KeyFileKind::Docs,
        &["contributing.md", "license", "code_of_conduct.md"],
    ),
];

/// Build the summary for a snapshot.
pub fn summarize(snapshot: &RepositorySnapshot) -> RepositorySummary {
    let identity = &snapshot.identity;
    let (title, description) = if snapshot.readme.trim().is_empty() {
        (
            identity.name.clone(),
            format!(
                "Um repositório GitHub de {} sem README.md detalhado.",
                identity.owner
            ),
        )
    } else {
        readme_title_and_description(&snapshot.readme, &identity.name)
    };

    RepositorySummary {
        title,
        owner: identity.owner.clone(),
        url: identity.url.clone(),
        branch: identity.branch.clone(),
        description,
        languages: language_tally(&snapshot.files),
        file_count: snapshot.files.len(),
        key_files: guess_key_files(&snapshot.files),
    }
}

fn readme_title_and_description(readme: &str, fallback_title: &str) -> (String, String) {
    let title = TITLE_RE
        .captures(readme)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_else(|| fallback_title.to_string());

    let without_title = TITLE_RE.replace(readme, "");
    let cleaned = BADGE_RE.replace_all(&without_title, "");
    let cleaned = cleaned.replace("\r\n", "\n");
    let cleaned = cleaned.trim();

    let paragraph = match cleaned.find("\n\n") {
        Some(end) => cleaned[..end].to_string(),
        None => cleaned.lines().take(3).collect::<Vec<_>>().join("\n"),
    };
    let collapsed = paragraph.split_whitespace().collect::<Vec<_>>().join(" ");

    (title, shorten(&collapsed, MAX_DESCRIPTION_CHARS))
}

/// Shorten at a word boundary, appending "..." when text was cut.
fn shorten(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }

    let mut result = String::new();
    for word in text.split_whitespace() {
        let extra = if result.is_empty() { 0 } else { 1 };
        if result.chars().count() + extra + word.chars().count() + 3 > width {
            break;
        }
        if !result.is_empty() {
            result.push(' ');
        }
        result.push_str(word);
    }
    result.push_str("...");
    result
}

fn language_tally(files: &[FileEntry]) -> Vec<(String, usize)> {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for ext in files.iter().filter_map(FileEntry::extension) {
        *counts.entry(ext).or_insert(0) += 1;
    }

    let mut tally: Vec<(String, usize)> = counts.into_iter().collect();
    // BTreeMap order keeps ties alphabetical under the stable sort.
    tally.sort_by(|a, b| b.1.cmp(&a.1));
    tally
}

fn guess_key_files(files: &[FileEntry]) -> Vec<KeyFile> {
    files
        .iter()
        .filter_map(|file| {
            let name = file.file_name().to_lowercase();
            KEY_FILE_PATTERNS.iter().find_map(|(kind, prefixes)| {
                prefixes
                    .iter()
                    .any(|prefix| name.starts_with(prefix))
                    .then(|| KeyFile {
                        path: file.path.clone(),
                        kind: *kind,
                    })
            })
        })
        .take(MAX_KEY_FILES)
        .collect()
}

#[derive(Debug, Serialize)]
struct CodeSnippet<'a> {
    path: &'a str,
    content_snippet: String,
}

#[derive(Debug, Serialize)]
struct ContextPayload<'a> {
    summary: &'a RepositorySummary,
    readme_preview: String,
    code_snippets: Vec<CodeSnippet<'a>>,
    all_files_list: Vec<&'a str>,
}

/// Build the JSON context sent along with the narration template.
///
/// Key files come first among the snippets; snippet collection stops at the
/// first snippet that would exceed the total cap.
pub fn build_context(
    snapshot: &RepositorySnapshot,
    summary: &RepositorySummary,
    limits: &LimitsConfig,
) -> String {
    let readme_preview = if snapshot.readme.trim().is_empty() {
        "README não disponível ou vazio.".to_string()
    } else {
        truncate_chars(&snapshot.readme, limits.readme_preview_chars)
    };

    let key_paths: HashSet<&str> = summary.key_files.iter().map(|k| k.path.as_str()).collect();
    let mut with_content: Vec<(&FileEntry, &str)> = snapshot
        .files
        .iter()
        .filter_map(|f| f.text.as_deref().map(|t| (f, t)))
        .filter(|(_, t)| !t.is_empty())
        .collect();
    with_content.sort_by_key(|(f, _)| !key_paths.contains(f.path.as_str()));

    let mut code_snippets = Vec::new();
    let mut total = 0;
    for (file, text) in with_content {
        let snippet = truncate_chars(text, limits.snippet_chars);
        let len = snippet.chars().count();
        if total + len >= limits.total_snippet_chars {
            tracing::debug!(
                limit = limits.total_snippet_chars,
                "Snippet budget reached, remaining files left out of the prompt"
            );
            break;
        }
        total += len;
        code_snippets.push(CodeSnippet {
            path: &file.path,
            content_snippet: snippet,
        });
    }

    let payload = ContextPayload {
        summary,
        readme_preview,
        code_snippets,
        all_files_list: snapshot
            .files
            .iter()
            .take(limits.max_listed_files)
            .map(|f| f.path.as_str())
            .collect(),
    };

    serde_json::to_string_pretty(&payload).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to serialise repository context");
        String::new()
    })
}

/// First `max` characters of `text`, on a char boundary.
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}
