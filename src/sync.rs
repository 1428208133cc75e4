//! The sync run: phases, run context, and the decision core.

mod backlog;
mod refs;
mod status;

pub use backlog::Backlog;
pub use status::StatusOutcome;

use chrono::Utc;
use log::info;

use crate::config::BridgeConfig;
use crate::error::Result;
use crate::git::GitRepo;
use crate::providers::github::GitHubClient;
use crate::providers::gitlab::{dedupe_pipelines, GitLabClient, PipelineStatus};

/// The pipeline currently running on the main branch's head, if any.
#[derive(Debug, Clone)]
pub struct RunningPipeline {
    pub sha: String,
    pub web_url: String,
}

/// Immutable context threaded through every phase of one run.
pub struct RunContext<'a> {
    pub config: &'a BridgeConfig,
    pub main_pipeline: Option<RunningPipeline>,
}

impl RunContext<'_> {
    pub fn running_sha(&self) -> Option<&str> {
        self.main_pipeline.as_ref().map(|p| p.sha.as_str())
    }
}

/// What one run did, for the summary table and the exit code.
#[derive(Debug, Default)]
pub struct SyncReport {
    pub open_prs: usize,
    pub active_prs: usize,
    pub backlogged_prs: usize,
    pub already_synced_prs: usize,
    pub unmergeable_prs: usize,
    pub protected_branches: usize,
    pub tags: usize,
    pub pruned_refs: usize,
    pub statuses_posted: usize,
    pub status_failures: usize,
}

/// Probe the main branch for a pipeline already running on its head.
async fn find_running_main_pipeline(
    config: &BridgeConfig,
    gitlab: &GitLabClient,
) -> Result<Option<RunningPipeline>> {
    let Some(main_branch) = &config.main_branch else {
        return Ok(None);
    };

    let window_start = Utc::now() - config.long_window;
    let pipelines = gitlab
        .pipelines_updated_after(&format!("github/{main_branch}"), window_start)
        .await?;

    Ok(dedupe_pipelines(pipelines)
        .values()
        .find(|p| p.status == Some(PipelineStatus::Running))
        .map(|p| RunningPipeline {
            sha: p.sha.clone(),
            web_url: p.web_url.clone(),
        }))
}

/// Synchronize open pull requests and protected branches to the mirror,
/// then reflect pipeline results back as commit statuses.
///
/// Phases run strictly in sequence; each one is narrated to stdout so a
/// run's decisions can be audited from its console output alone.
pub async fn run(
    config: &BridgeConfig,
    github: &GitHubClient,
    gitlab: &GitLabClient,
    repo: &GitRepo,
) -> Result<SyncReport> {
    info!("Starting sync for {}", config.github_project);

    let main_pipeline = find_running_main_pipeline(config, gitlab).await?;
    if let Some(main_branch) = &config.main_branch {
        match &main_pipeline {
            Some(p) => println!("Currently running {main_branch} pipeline: {}", p.sha),
            None => println!("Currently running {main_branch} pipeline: none"),
        }
    }
    let ctx = RunContext {
        config,
        main_pipeline,
    };

    // Mirror state first, so already-synced decisions see fresh refs.
    repo.shallow_fetch_mirror()?;

    let pulls = github.list_open_pulls().await?;
    let mut listing = refs::collect_candidates(&pulls, |name| repo.mirror_tip_subject(name));

    // Backlog gates apply to the PRs that would otherwise be pushed now.
    for candidate in listing.candidates.iter_mut().filter(|c| !c.synced) {
        let check_runs = if ctx.config.prereq_checks.is_empty() {
            Vec::new()
        } else {
            github.check_runs(&candidate.head_sha).await?
        };
        candidate.backlog = backlog::evaluate(
            &candidate.base_sha,
            ctx.running_sha(),
            &ctx.config.prereq_checks,
            &check_runs,
        );
    }

    let protected_branches = refs::protected_for_sync(
        github.list_protected_branches().await?,
        ctx.config.main_branch.as_deref(),
        ctx.running_sha(),
    );

    let tags = github.list_tags().await?;
    println!("Tags:");
    for tag in &tags {
        println!("    {tag}");
    }

    let synced_names = repo.mirror_pr_branches()?;
    let open_names: Vec<String> = listing.candidates.iter().map(|c| c.name.clone()).collect();
    let closed_refspecs = refs::prs_to_delete(&open_names, &synced_names);

    let (mut push_refspecs, mut fetch_refspecs) = refs::build_refspecs(&listing.candidates);
    refs::extend_refspecs_for_protected_branches(
        &protected_branches,
        &mut push_refspecs,
        &mut fetch_refspecs,
    );
    refs::extend_refspecs_for_tags(&tags, &mut push_refspecs, &mut fetch_refspecs);

    if !fetch_refspecs.is_empty() {
        println!("Fetching GitHub refs for open PRs");
        repo.fetch_refspecs(&fetch_refspecs)?;
    }

    println!("Building local branches for open PRs and protected branches");
    let mut local_branches: Vec<String> = listing
        .candidates
        .iter()
        .filter(|c| c.is_active())
        .map(|c| c.name.clone())
        .collect();
    local_branches.extend(protected_branches.iter().cloned());
    repo.create_local_branches(&local_branches)?;

    if !push_refspecs.is_empty() || !closed_refspecs.is_empty() {
        println!("Syncing to GitLab");
        let mut refspecs = closed_refspecs.clone();
        refspecs.extend(push_refspecs.iter().cloned());
        repo.push_refspecs(&refspecs)?;
    }

    let outcome = if ctx.config.post_status {
        println!("Posting pipeline status for open PRs and protected branches");
        status::post_pipeline_status(&ctx, &listing, &protected_branches, github, gitlab).await?
    } else {
        StatusOutcome::default()
    };

    Ok(SyncReport {
        open_prs: listing.candidates.len() + listing.unmergeable_heads.len(),
        active_prs: listing.candidates.iter().filter(|c| c.is_active()).count(),
        backlogged_prs: listing
            .candidates
            .iter()
            .filter(|c| !c.backlog.is_none())
            .count(),
        already_synced_prs: listing.candidates.iter().filter(|c| c.synced).count(),
        unmergeable_prs: listing.unmergeable_heads.len(),
        protected_branches: protected_branches.len(),
        tags: tags.len(),
        pruned_refs: closed_refspecs.len(),
        statuses_posted: outcome.posted,
        status_failures: outcome.failures,
    })
}
