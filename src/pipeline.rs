use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

use crate::atom::{self, FeedMeta};
use crate::config::{Config, RepoContext};
use crate::git;
use crate::zotero::EntrySource;

/// What caused a run.
#[derive(Debug, Clone)]
pub enum Trigger {
    /// The daily 08:00 UTC firing.
    Schedule { fired_at: DateTime<Utc> },
    /// Direct CLI invocation.
    Manual,
}

impl std::fmt::Display for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Trigger::Schedule { fired_at } => {
                write!(f, "schedule ({})", fired_at.format("%Y-%m-%dT%H:%M:%SZ"))
            }
            Trigger::Manual => write!(f, "manual"),
        }
    }
}

/// Result of one pipeline run.
#[derive(Debug)]
pub struct RunOutcome {
    pub entries: usize,
    /// `*.xml` paths that differed from the last commit after generation.
    pub changed_paths: Vec<String>,
    pub committed: bool,
}

/// One full pass: fetch the library, regenerate the feed file, and commit it
/// back when (and only when) a tracked XML file changed.
///
/// Steps run strictly in order and fail fast. A failure after the file was
/// written leaves the working tree modified but uncommitted, visible only in
/// the logs.
pub async fn run_once(
    config: &Config,
    context: &RepoContext,
    source: &mut dyn EntrySource,
    repo: &Path,
    trigger: Trigger,
) -> Result<RunOutcome> {
    tracing::info!(trigger = %trigger, group = %config.zotero.group_id, "starting feed run");

    anyhow::ensure!(
        git::is_repo(repo),
        "{} is not a git repository",
        repo.display()
    );
    // The branch current at run start is the one a later push targets.
    let branch = git::current_branch(repo)?;

    let entries = source
        .fetch_entries()
        .await
        .context("feed generation failed: could not fetch library")?;

    let meta = FeedMeta::from_config(config, context);
    let xml = atom::render(&meta, &entries, Utc::now())
        .context("feed generation failed: could not render feed")?;

    let output = repo.join(&config.feed.output);
    std::fs::write(&output, &xml)
        .with_context(|| format!("failed to write {}", output.display()))?;
    tracing::info!(
        path = %output.display(),
        bytes = xml.len(),
        entries = entries.len(),
        "feed written"
    );

    let changed_paths = git::changed_xml_paths(repo)?;
    if changed_paths.is_empty() {
        tracing::info!("no feed changes since last commit, skipping commit");
        return Ok(RunOutcome {
            entries: entries.len(),
            changed_paths,
            committed: false,
        });
    }

    tracing::info!(paths = ?changed_paths, "feed changed, committing");
    git::stage_xml(repo)?;
    git::commit(
        repo,
        &config.git.commit_message,
        &config.git.author_name,
        &config.git.author_email,
    )?;
    if config.git.push {
        git::push(repo, &branch)?;
        tracing::info!(branch = %branch, "pushed");
    }

    Ok(RunOutcome {
        entries: entries.len(),
        changed_paths,
        committed: true,
    })
}
