//! Repository collection from the GitHub REST API.

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;
use std::time::Duration;

#[cfg(test)]
use mockall::automock;

use crate::config::LimitsConfig;
use crate::error::CollectionError;
use crate::repository::{FileEntry, RepositoryIdentity, RepositorySnapshot, truncate_chars};

const GITHUB_API: &str = "https://api.github.com";

/// Extensions worth narrating about.
const CODE_EXTENSIONS: &[&str] = &[
    "py", "js", "html", "css", "java", "cpp", "c", "h", "go", "rb", "php", "ts", "jsx", "tsx",
    "ipynb", "sh", "md", "rs", "kt", "swift", "cs", "scala", "toml", "yaml", "yml",
];

/// Source of repository snapshots.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait RepositorySource: Send + Sync {
    async fn collect(&self, url: &str) -> Result<RepositorySnapshot, CollectionError>;
}

/// Owner, name and optional branch parsed from a GitHub URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryLocation {
    pub owner: String,
    pub name: String,
    pub branch: Option<String>,
}

impl RepositoryLocation {
    /// Parse `https://github.com/<owner>/<repo>[.git][/tree/<branch>]`.
    pub fn parse(url: &str) -> Result<Self, CollectionError> {
        let invalid = || CollectionError::InvalidUrl(url.to_string());

        let rest = url
            .trim()
            .strip_prefix("https://")
            .or_else(|| url.trim().strip_prefix("http://"))
            .ok_or_else(invalid)?;
        let rest = rest.strip_prefix("www.").unwrap_or(rest);
        let path = rest.strip_prefix("github.com/").ok_or_else(invalid)?;

        let parts: Vec<&str> = path
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .split('/')
            .filter(|p| !p.is_empty())
            .collect();

        let (owner, name) = match parts.as_slice() {
            [owner, name, ..] => (*owner, name.trim_end_matches(".git")),
            _ => return Err(invalid()),
        };
        let valid = |s: &str| {
            !s.is_empty()
                && s
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        };
        if !valid(owner) || !valid(name) {
            return Err(invalid());
        }

        let branch = match parts.as_slice() {
            [_, _, "tree", branch_parts @ ..] if !branch_parts.is_empty() => {
                Some(branch_parts.join("/"))
            }
            _ => None,
        };

        Ok(Self {
            owner: owner.to_string(),
            name: name.to_string(),
            branch,
        })
    }

    pub fn canonical_url(&self) -> String {
        format!("https://github.com/{}/{}", self.owner, self.name)
    }
}

#[derive(Debug, Deserialize)]
struct RepoInfo {
    default_branch: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TreeResponse {
    #[serde(default)]
    tree: Vec<TreeItem>,
    #[serde(default)]
    truncated: bool,
}

#[derive(Debug, Deserialize)]
struct TreeItem {
    path: String,
    #[serde(rename = "type")]
    kind: String,
    sha: String,
}

/// Collector over the GitHub REST API.
pub struct GitHubCollector {
    client: reqwest::Client,
    api_base: String,
    limits: LimitsConfig,
}

impl GitHubCollector {
    pub fn new(token: Option<&str>, limits: LimitsConfig) -> Result<Self, CollectionError> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("codecast"));
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        if let Some(token) = token.filter(|t| !t.trim().is_empty()) {
            let value = HeaderValue::from_str(&format!("Bearer {}", token.trim()))
                .map_err(|e| CollectionError::Forbidden(format!("Invalid GitHub token: {}", e)))?;
            headers.insert(AUTHORIZATION, value);
        } else {
            tracing::warn!("No GitHub token set; private or busy repositories may fail");
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(60))
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| CollectionError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_base: GITHUB_API.to_string(),
            limits,
        })
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response, CollectionError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| CollectionError::Network(e.to_string()))?;
        check_status(response)
    }

    async fn default_branch(&self, location: &RepositoryLocation) -> String {
        let url = format!("{}/repos/{}/{}", self.api_base, location.owner, location.name);
        let info = match self.get(&url).await {
            Ok(response) => response.json::<RepoInfo>().await.ok(),
            Err(e) => {
                tracing::warn!(error = %e, "Could not resolve default branch, using 'main'");
                None
            }
        };
        info.and_then(|i| i.default_branch)
            .unwrap_or_else(|| "main".to_string())
    }

    async fn fetch_blob(&self, location: &RepositoryLocation, sha: &str, path: &str) -> Option<String> {
        let url = format!(
            "{}/repos/{}/{}/git/blobs/{}",
            self.api_base, location.owner, location.name, sha
        );
        let result = async {
            let response = self
                .client
                .get(&url)
                .header(ACCEPT, "application/vnd.github.raw")
                .send()
                .await
                .map_err(|e| CollectionError::Network(e.to_string()))?;
            let bytes = check_status(response)?
                .bytes()
                .await
                .map_err(|e| CollectionError::Network(e.to_string()))?;
            Ok::<_, CollectionError>(String::from_utf8_lossy(&bytes).into_owned())
        }
        .await;

        match result {
            Ok(text) => Some(truncate_chars(&text, self.limits.max_file_chars)),
            Err(e) => {
                tracing::warn!(path, error = %e, "Failed to fetch file content");
                None
            }
        }
    }
}

#[async_trait]
impl RepositorySource for GitHubCollector {
    async fn collect(&self, url: &str) -> Result<RepositorySnapshot, CollectionError> {
        let location = RepositoryLocation::parse(url)?;
        let branch = match &location.branch {
            Some(branch) => branch.clone(),
            None => self.default_branch(&location).await,
        };
        tracing::info!(owner = %location.owner, name = %location.name, %branch, "Collecting repository");

        let tree_url = format!(
            "{}/repos/{}/{}/git/trees/{}?recursive=1",
            self.api_base, location.owner, location.name, branch
        );
        let tree: TreeResponse = self
            .get(&tree_url)
            .await?
            .json()
            .await
            .map_err(|e| CollectionError::Decode(e.to_string()))?;
        if tree.truncated {
            tracing::warn!("Repository tree was truncated by GitHub; analysing the listed files only");
        }

        let mut files = Vec::new();
        let mut readme = String::new();
        let mut fetched = 0;

        for item in tree.tree.iter().filter(|i| i.kind == "blob") {
            let entry = FileEntry::new(item.path.clone(), None);
            let file_name = entry.file_name().to_lowercase();

            if file_name == "readme.md" {
                if readme.is_empty() {
                    if let Some(text) = self.fetch_blob(&location, &item.sha, &item.path).await {
                        readme = text;
                    }
                }
                continue;
            }

            let Some(ext) = entry.extension() else { continue };
            if !CODE_EXTENSIONS.contains(&ext.as_str()) {
                continue;
            }

            let text = if fetched < self.limits.max_content_files {
                fetched += 1;
                self.fetch_blob(&location, &item.sha, &item.path).await
            } else {
                None
            };
            tracing::debug!(path = %item.path, has_text = text.is_some(), "Collected file");
            files.push(FileEntry::new(item.path.clone(), text));
        }

        tracing::info!(files = files.len(), fetched, has_readme = !readme.is_empty(), "Repository collected");

        Ok(RepositorySnapshot {
            identity: RepositoryIdentity {
                url: location.canonical_url(),
                owner: location.owner,
                name: location.name,
                branch,
            },
            files,
            readme,
        })
    }
}

fn check_status(response: reqwest::Response) -> Result<reqwest::Response, CollectionError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let url = response.url().to_string();
    let rate_limited = response
        .headers()
        .get("x-ratelimit-remaining")
        .and_then(|v| v.to_str().ok())
        == Some("0");

    Err(match status {
        StatusCode::NOT_FOUND => CollectionError::NotFound(url),
        StatusCode::TOO_MANY_REQUESTS => CollectionError::RateLimited(url),
        StatusCode::FORBIDDEN if rate_limited => CollectionError::RateLimited(url),
        StatusCode::FORBIDDEN | StatusCode::UNAUTHORIZED => CollectionError::Forbidden(url),
        other => CollectionError::Network(format!("HTTP {} from {}", other, url)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_url() {
        let location = RepositoryLocation::parse("https://github.com/octo/widgets").unwrap();
        assert_eq!(
            location,
            RepositoryLocation {
                owner: "octo".to_string(),
                name: "widgets".to_string(),
                branch: None,
            }
        );
        assert_eq!(location.canonical_url(), "https://github.com/octo/widgets");
    }

    #[test]
    fn test_parse_git_suffix_and_trailing_slash() {
        let location = RepositoryLocation::parse("https://github.com/octo/widgets.git/").unwrap();
        assert_eq!(location.name, "widgets");
        assert_eq!(location.branch, None);
    }

    #[test]
    fn test_parse_branch() {
        let location =
            RepositoryLocation::parse("https://github.com/octo/widgets/tree/feature/audio").unwrap();
        assert_eq!(location.branch.as_deref(), Some("feature/audio"));
    }

    #[test]
    fn test_parse_rejects_other_hosts() {
        for url in [
            "https://gitlab.com/octo/widgets",
            "https://github.com/octo",
            "github.com/octo/widgets",
            "https://github.com/oc to/widgets",
            "",
        ] {
            assert!(
                matches!(RepositoryLocation::parse(url), Err(CollectionError::InvalidUrl(_))),
                "{url} should be rejected"
            );
        }
    }

    #[test]
    fn test_malformed_token_is_forbidden() {
        let result = GitHubCollector::new(Some("bad\ntoken"), LimitsConfig::default());
        assert!(matches!(result, Err(CollectionError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_collect_invalid_url_fails_without_network() {
        let collector = GitHubCollector::new(None, LimitsConfig::default()).unwrap();
        let result = collector.collect("https://example.com/a/b").await;
        assert!(matches!(result, Err(CollectionError::InvalidUrl(_))));
    }
}
