use std::path::Path;
use std::process::{Command, Output};

use anyhow::{bail, Context, Result};

fn execute_git(repo: &Path, args: &[&str]) -> Result<Output> {
    Command::new("git")
        .args(args)
        .current_dir(repo)
        .output()
        .with_context(|| format!("failed to run git {}", args.first().copied().unwrap_or("")))
}

fn run_git(repo: &Path, args: &[&str]) -> Result<String> {
    let output = execute_git(repo, args)?;
    if !output.status.success() {
        bail!(
            "git {} failed ({}): {}",
            args.join(" "),
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

pub fn is_repo(repo: &Path) -> bool {
    execute_git(repo, &["rev-parse", "--git-dir"])
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Branch checked out at run start. This is the branch a later push targets.
pub fn current_branch(repo: &Path) -> Result<String> {
    run_git(repo, &["rev-parse", "--abbrev-ref", "HEAD"])
}

/// Paths matching `*.xml` that differ from the last commit, including
/// untracked files. Empty means the commit step must not run.
///
/// Reads the raw output: trimming would eat the first line's status columns.
pub fn changed_xml_paths(repo: &Path) -> Result<Vec<String>> {
    let args = ["status", "--porcelain=v1", "--", "*.xml"];
    let output = execute_git(repo, &args)?;
    if !output.status.success() {
        bail!(
            "git {} failed ({}): {}",
            args.join(" "),
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(parse_porcelain(&String::from_utf8_lossy(&output.stdout)))
}

fn parse_porcelain(stdout: &str) -> Vec<String> {
    // Lines are "XY <path>": two status columns, a space, then the path.
    stdout
        .lines()
        .filter(|line| line.len() > 3)
        .map(|line| line[3..].trim().to_string())
        .collect()
}

pub fn stage_xml(repo: &Path) -> Result<()> {
    run_git(repo, &["add", "--", "*.xml"])?;
    Ok(())
}

/// Create the feed commit. The identity is passed with `-c` so the tool works
/// in checkouts that have no git identity configured; `--signoff` uses it too.
pub fn commit(repo: &Path, message: &str, author_name: &str, author_email: &str) -> Result<()> {
    let user_name = format!("user.name={}", author_name);
    let user_email = format!("user.email={}", author_email);
    run_git(
        repo,
        &[
            "-c",
            &user_name,
            "-c",
            &user_email,
            "commit",
            "--no-verify",
            "--signoff",
            "-m",
            message,
        ],
    )?;
    Ok(())
}

/// Push to the triggering branch. No fetch first: overlapping runs race the
/// same way the original did (last push wins or one fails non-fast-forward).
pub fn push(repo: &Path, branch: &str) -> Result<()> {
    run_git(repo, &["push", "origin", branch])?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_porcelain_extracts_paths() {
        let out = " M zotero_feed.xml\n?? extra.xml\n";
        assert_eq!(parse_porcelain(out), vec!["zotero_feed.xml", "extra.xml"]);
    }

    #[test]
    fn parse_porcelain_empty_means_clean() {
        assert!(parse_porcelain("").is_empty());
        assert!(parse_porcelain("\n").is_empty());
    }
}
