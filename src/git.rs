//! Plumbing for the scratch clone that bridges the two remotes.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::{BridgeError, Result};

/// SSH options for the mirror remote: throwaway known-hosts file, no
/// interactive host key prompt.
const GIT_SSH_COMMAND: &str =
    "ssh -F /dev/null -o UserKnownHostsFile=/dev/null -o StrictHostKeyChecking=no";

/// A scratch repository with two remotes: `github` (source) and `gitlab`
/// (mirror).
pub struct GitRepo {
    workdir: PathBuf,
    ssh_auth_sock: Option<String>,
}

impl GitRepo {
    /// Initialize a scratch repository in `workdir` and register both
    /// remotes.
    pub fn init(
        workdir: &Path,
        github_url: &str,
        gitlab_url: &str,
        ssh_auth_sock: Option<String>,
    ) -> Result<Self> {
        let repo = Self {
            workdir: workdir.to_path_buf(),
            ssh_auth_sock,
        };
        repo.run(&["init", "--quiet"])?;
        repo.run(&["remote", "add", "github", github_url])?;
        repo.run(&["remote", "add", "gitlab", gitlab_url])?;
        Ok(repo)
    }

    fn run(&self, args: &[&str]) -> Result<String> {
        let mut command = Command::new("git");
        command
            .args(args)
            .current_dir(&self.workdir)
            .env("GIT_SSH_COMMAND", GIT_SSH_COMMAND);
        if let Some(sock) = &self.ssh_auth_sock {
            command.env("SSH_AUTH_SOCK", sock);
        }

        let output = command
            .output()
            .map_err(|e| BridgeError::Git(format!("failed to run git: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(BridgeError::Git(format!(
                "git {} failed: {}",
                args.join(" "),
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Shallow fetch of the mirror's current state.
    pub fn shallow_fetch_mirror(&self) -> Result<()> {
        self.run(&["fetch", "-q", "--depth=1", "gitlab"]).map(drop)
    }

    /// PR branch names that currently have mirror tracking refs.
    pub fn mirror_pr_branches(&self) -> Result<Vec<String>> {
        let output = self.run(&["branch", "--remotes", "--list", "gitlab/github/pr*"])?;
        Ok(parse_remote_pr_branches(&output))
    }

    /// Subject line of the mirror tracking ref's tip commit, if the ref
    /// exists. A missing ref is the ordinary "never pushed" case.
    pub fn mirror_tip_subject(&self, pr_name: &str) -> Option<String> {
        self.run(&[
            "log",
            "-1",
            "--pretty=%s",
            &format!("gitlab/github/{pr_name}"),
        ])
        .ok()
        .map(|subject| subject.trim().to_string())
    }

    /// Fetch the given refspecs from the source remote.
    pub fn fetch_refspecs(&self, refspecs: &[String]) -> Result<()> {
        let mut args = vec!["fetch", "-q", "github"];
        args.extend(refspecs.iter().map(String::as_str));
        self.run(&args).map(drop)
    }

    /// Create a local branch per tracking ref so it can be pushed by name.
    pub fn create_local_branches(&self, names: &[String]) -> Result<()> {
        for name in names {
            let branch = format!("github/{name}");
            self.run(&["branch", "-q", &branch, &branch])?;
        }
        Ok(())
    }

    /// Force-push the given refspecs (deletions included) to the mirror.
    pub fn push_refspecs(&self, refspecs: &[String]) -> Result<()> {
        let mut args = vec!["push", "--porcelain", "-f", "gitlab"];
        args.extend(refspecs.iter().map(String::as_str));
        self.run(&args).map(drop)
    }
}

/// Extract PR branch names from `git branch --remotes --list` output.
pub fn parse_remote_pr_branches(output: &str) -> Vec<String> {
    output
        .lines()
        .filter_map(|line| line.trim().strip_prefix("gitlab/github/"))
        .map(str::to_string)
        .collect()
}

/// The head sha recorded in a mirror merge subject
/// (`Merge <head> into <base>`).
pub fn merged_head_sha(subject: &str) -> Option<&str> {
    static MERGE_SUBJECT: OnceLock<Regex> = OnceLock::new();
    let re = MERGE_SUBJECT.get_or_init(|| {
        Regex::new(r"^Merge\s+(\S+)\s+into\s+\S+").unwrap()
    });
    re.captures(subject)
        .and_then(|captures| captures.get(1))
        .map(|m| m.as_str())
}
