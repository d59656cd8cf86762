use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

const ENV_FILE: &str = ".env";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub zotero: ZoteroConfig,
    pub feed: FeedConfig,
    #[serde(default)]
    pub git: GitConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ZoteroConfig {
    /// Numeric group ID, e.g. "5560460".
    pub group_id: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Items per page. The API caps this at 100.
    #[serde(default = "default_page_limit")]
    pub page_limit: u32,
    #[serde(default = "default_sort")]
    pub sort: String,
    #[serde(default = "default_direction")]
    pub direction: String,
    #[serde(default = "default_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_api_base() -> String {
    "https://api.zotero.org".to_string()
}

fn default_page_limit() -> u32 {
    100
}

fn default_sort() -> String {
    "dateAdded".to_string()
}

fn default_direction() -> String {
    "desc".to_string()
}

fn default_timeout_ms() -> u64 {
    30_000
}

#[derive(Debug, Deserialize, Clone)]
pub struct FeedConfig {
    /// Output filename, relative to the repository root.
    #[serde(default = "default_output")]
    pub output: String,
    pub title: String,
    /// Feed-level Atom id. Defaults to `urn:zotero:group:{group_id}:items`.
    #[serde(default)]
    pub id: Option<String>,
    pub author: String,
}

fn default_output() -> String {
    "zotero_feed.xml".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct GitConfig {
    #[serde(default = "default_commit_message")]
    pub commit_message: String,
    #[serde(default = "default_author_name")]
    pub author_name: String,
    #[serde(default = "default_author_email")]
    pub author_email: String,
    #[serde(default = "default_push")]
    pub push: bool,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            commit_message: default_commit_message(),
            author_name: default_author_name(),
            author_email: default_author_email(),
            push: default_push(),
        }
    }
}

fn default_commit_message() -> String {
    "Automated update of Zotero feed".to_string()
}

fn default_author_name() -> String {
    "zotero-feed".to_string()
}

fn default_author_email() -> String {
    "zotero-feed@users.noreply.github.com".to_string()
}

fn default_push() -> bool {
    true
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| "Failed to parse config TOML")?;
        Ok(config)
    }

    /// Load .env file into process environment. Real env vars take precedence.
    pub fn load_env_file() {
        let path = Path::new(ENV_FILE);
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(_) => return,
        };
        // Strip BOM if present (common on Windows-created files)
        let content = content.strip_prefix('\u{feff}').unwrap_or(&content);
        for line in content.lines() {
            let line = line.trim().trim_matches('\r');
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some((key, value)) = line.split_once('=') {
                let key = key.trim();
                let value = value.trim().trim_matches('"').trim_matches('\'');
                if std::env::var(key).is_err() {
                    std::env::set_var(key, value);
                }
            }
        }
    }
}

/// Repository owner and name, read from the environment at invocation time.
/// They feed the `rel="self"` link of the generated feed.
#[derive(Debug, Clone)]
pub struct RepoContext {
    pub owner: String,
    pub repo_name: String,
}

impl RepoContext {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            owner: require_env("GITHUB_USERNAME")?,
            repo_name: require_env("REPO_NAME")?,
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    match std::env::var(key) {
        Ok(v) if !v.trim().is_empty() => Ok(sanitize(&v)),
        _ => anyhow::bail!("{} must be set in the environment", key),
    }
}

/// Optional API key for private group libraries.
pub fn zotero_api_key() -> Option<String> {
    std::env::var("ZOTERO_API_KEY")
        .ok()
        .map(|k| sanitize(&k))
        .filter(|k| !k.is_empty())
}

/// Strip carriage returns, BOM, and other invisible chars from an env value.
fn sanitize(raw: &str) -> String {
    raw.replace(['\r', '\u{feff}', '\u{200b}'], "")
        .trim()
        .to_string()
}
