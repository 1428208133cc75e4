use anyhow::{bail, Context, Result};
use chrono::Duration;
use clap::Parser;
use log::info;
use std::path::PathBuf;

use crate::auth::Token;
use crate::config::{
    BridgeConfig, FileConfig, DEFAULT_MAIN_PIPELINE_WINDOW_MINUTES, DEFAULT_PIPELINE_WINDOW_MINUTES,
};
use crate::git::GitRepo;
use crate::output;
use crate::providers::github::GitHubClient;
use crate::providers::gitlab::GitLabClient;
use crate::ssh::SshAgent;
use crate::sync;

#[derive(Parser)]
#[command(name = "cibridge")]
#[command(author, version, about = "Mirror GitHub pull requests into GitLab CI", long_about = None)]
pub struct Cli {
    /// GitHub project (owner/repo)
    github_project: String,

    /// Full clone URL for the GitLab mirror
    gitlab_repo: String,

    /// GitLab web host (e.g. https://gitlab.example.com)
    gitlab_host: String,

    /// GitLab project path (group/project)
    gitlab_project: String,

    /// GitHub API token
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    github_token: Option<String>,

    /// GitLab API token
    #[arg(long, env = "GITLAB_TOKEN", hide_env_values = true)]
    gitlab_token: Option<String>,

    /// Base64-encoded private key for pushing to the mirror
    #[arg(long, env = "GITLAB_SSH_KEY_BASE64", hide_env_values = true)]
    ssh_key_base64: Option<String>,

    /// GitHub API base URL
    #[arg(long, default_value = "https://api.github.com")]
    github_api_url: String,

    /// Do not post pipeline status to each GitHub PR
    #[arg(long, default_value_t = false)]
    disable_status_post: bool,

    /// Defer PRs whose base commit has a pipeline running on this branch
    #[arg(long)]
    main_branch: Option<String>,

    /// Only push PRs whose named GitHub checks have already succeeded
    #[arg(long = "prereq-check", num_args = 1..)]
    prereq_checks: Vec<String>,

    /// Path to a configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

impl Cli {
    pub async fn execute(&self) -> Result<()> {
        let file = FileConfig::load(self.config.as_deref())?;
        let config = self.resolve(&file);

        let github_token = self
            .github_token
            .clone()
            .context("GITHUB_TOKEN environment is not set")?;
        let ssh_key = self
            .ssh_key_base64
            .clone()
            .context("GITLAB_SSH_KEY_BASE64 environment is not set")?;

        info!("Bridging {} into {}", config.github_project, config.gitlab_project);

        let github = GitHubClient::new(
            self.github_api_url.clone(),
            &config.github_project,
            Token::from(github_token.clone()),
        )?;
        let gitlab = GitLabClient::new(
            &config.gitlab_host,
            &config.gitlab_project,
            self.gitlab_token.as_deref().map(Token::from),
        )?;

        let agent = SshAgent::start(&ssh_key)?;

        // Scratch clone in a directory deleted when the run finishes.
        let workdir = tempfile::tempdir().context("Failed to create scratch directory")?;
        let github_remote = format!(
            "https://{}@github.com/{}.git",
            github_token, config.github_project
        );
        let repo = GitRepo::init(
            workdir.path(),
            &github_remote,
            &config.gitlab_repo,
            Some(agent.auth_sock().to_string()),
        )?;

        let report = sync::run(&config, &github, &gitlab, &repo).await?;
        output::print_run_summary(&report);

        if report.status_failures > 0 {
            bail!("{} status publish attempts failed", report.status_failures);
        }
        Ok(())
    }

    /// File values fill in whatever the command line left unset.
    fn resolve(&self, file: &FileConfig) -> BridgeConfig {
        BridgeConfig {
            github_project: self.github_project.clone(),
            gitlab_repo: self.gitlab_repo.clone(),
            gitlab_host: self.gitlab_host.clone(),
            gitlab_project: self.gitlab_project.clone(),
            main_branch: self.main_branch.clone().or_else(|| file.main_branch.clone()),
            prereq_checks: if self.prereq_checks.is_empty() {
                file.prereq_checks.clone()
            } else {
                self.prereq_checks.clone()
            },
            post_status: !self.disable_status_post,
            brief_window: Duration::minutes(
                file.pipeline_window_minutes
                    .unwrap_or(DEFAULT_PIPELINE_WINDOW_MINUTES),
            ),
            long_window: Duration::minutes(
                file.main_pipeline_window_minutes
                    .unwrap_or(DEFAULT_MAIN_PIPELINE_WINDOW_MINUTES),
            ),
        }
    }
}
