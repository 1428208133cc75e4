use chrono::Utc;
use indexmap::IndexMap;
use log::warn;

use crate::error::Result;
use crate::git::merged_head_sha;
use crate::providers::github::{CommitStatus, GitHubClient};
use crate::providers::gitlab::{dedupe_pipelines, GitLabClient, Pipeline, PipelineStatus};

use super::backlog::Backlog;
use super::refs::PrListing;
use super::RunContext;

/// Context label carried by every status the bridge publishes.
pub const STATUS_CONTEXT: &str = "ci/gitlab-ci";

/// External status states the source platform accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusState {
    Pending,
    Success,
    Error,
    Failure,
}

impl StatusState {
    pub fn as_str(self) -> &'static str {
        match self {
            StatusState::Pending => "pending",
            StatusState::Success => "success",
            StatusState::Error => "error",
            StatusState::Failure => "failure",
        }
    }
}

/// A status ready to publish to the source platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalStatus {
    pub state: StatusState,
    pub description: String,
    pub target_url: String,
}

/// Counts of publish attempts for the run summary and exit code.
#[derive(Debug, Default, Clone, Copy)]
pub struct StatusOutcome {
    pub posted: usize,
    pub failures: usize,
}

/// Map a pipeline into the bounded external status vocabulary.
///
/// Canceled, unrecognized, and absent statuses produce nothing: the next
/// cycle reports on whatever replaces them.
pub fn status_for_pipeline(pipeline: &Pipeline) -> Option<ExternalStatus> {
    let (state, description) = match pipeline.status? {
        PipelineStatus::Created => (StatusState::Pending, "Pipeline has been created"),
        PipelineStatus::WaitingForResource => {
            (StatusState::Pending, "Pipeline is waiting for resources")
        }
        PipelineStatus::Preparing => (StatusState::Pending, "Pipeline is preparing"),
        PipelineStatus::Pending => (StatusState::Pending, "Pipeline is pending"),
        PipelineStatus::Running => (StatusState::Pending, "Pipeline is running"),
        PipelineStatus::Manual => (StatusState::Pending, "Pipeline is running manually"),
        PipelineStatus::Scheduled => (StatusState::Pending, "Pipeline is scheduled"),
        PipelineStatus::Failed => (StatusState::Error, "Pipeline failed"),
        PipelineStatus::Skipped => (StatusState::Failure, "Pipeline was skipped"),
        PipelineStatus::Success => (StatusState::Success, "Pipeline succeeded"),
        PipelineStatus::Canceled | PipelineStatus::Unrecognized => return None,
    };

    Some(ExternalStatus {
        state,
        description: description.to_string(),
        target_url: pipeline.web_url.clone(),
    })
}

/// The deduped pipeline to report for a ref, most recent first.
fn latest_for_ref<'a>(
    deduped: &'a IndexMap<String, Pipeline>,
    ref_name: &str,
) -> Option<&'a Pipeline> {
    deduped
        .values()
        .filter(|p| p.ref_ == ref_name)
        .max_by_key(|p| p.id)
}

/// The head sha a mirror pipeline should be reported against, recovered
/// from the merge subject of the tested commit. `None` for non-merge
/// commits or when the lookup fails; callers fall back to the tested sha.
async fn recover_source_sha(gitlab: &GitLabClient, tested_sha: &str) -> Option<String> {
    let commit = match gitlab.commit(tested_sha).await {
        Ok(commit) => commit,
        Err(err) => {
            warn!("Failed to fetch commit for tested sha {tested_sha}: {err}");
            return None;
        }
    };
    let title = commit.title?;
    merged_head_sha(&title).map(str::to_string)
}

async fn publish(
    github: &GitHubClient,
    sha: &str,
    status: &ExternalStatus,
    outcome: &mut StatusOutcome,
) {
    let body = CommitStatus {
        state: status.state.as_str().to_string(),
        target_url: status.target_url.clone(),
        description: status.description.clone(),
        context: STATUS_CONTEXT.to_string(),
    };
    match github.create_commit_status(sha, &body).await {
        Ok(created) => {
            if created.state != body.state {
                println!(
                    "Expected CommitStatus state {}, got {}",
                    body.state, created.state
                );
            }
            outcome.posted += 1;
        }
        Err(err) => {
            println!("Caught error posting status for {sha}: {err}");
            outcome.failures += 1;
        }
    }
}

/// Publish one status per open PR: real pipeline results for branches that
/// ran, "pending" placeholders for deferred ones, and an error for heads
/// with no merge commit. Protected-branch pipelines are reported the same
/// way as PR pipelines.
pub async fn post_pipeline_status(
    ctx: &RunContext<'_>,
    listing: &PrListing,
    protected_branches: &[String],
    github: &GitHubClient,
    gitlab: &GitLabClient,
) -> Result<StatusOutcome> {
    let mut outcome = StatusOutcome::default();

    // Branches whose pipelines get reported: open PRs that were not
    // deferred, plus protected branches.
    let mut pipeline_branches: Vec<&str> = listing
        .candidates
        .iter()
        .filter(|c| c.backlog.is_none())
        .map(|c| c.name.as_str())
        .collect();
    pipeline_branches.extend(protected_branches.iter().map(String::as_str));

    let window_start = Utc::now() - ctx.config.brief_window;
    let mut window = Vec::new();
    println!("Querying pipelines to post status for:");
    for branch in &pipeline_branches {
        println!("    github/{branch}");
        window.extend(
            gitlab
                .pipelines_updated_after(&format!("github/{branch}"), window_start)
                .await?,
        );
    }
    let deduped = dedupe_pipelines(window);

    println!("Posting pipeline status to the following:");
    for branch in &pipeline_branches {
        let ref_name = format!("github/{branch}");
        let Some(pipeline) = latest_for_ref(&deduped, &ref_name) else {
            continue;
        };
        let Some(status) = status_for_pipeline(pipeline) else {
            continue;
        };
        let target_sha = match recover_source_sha(gitlab, &pipeline.sha).await {
            Some(sha) => sha,
            None => {
                println!(
                    "Could not find source head for tested commit {}; using tested commit",
                    pipeline.sha
                );
                pipeline.sha.clone()
            }
        };
        println!("  {branch} -> {target_sha}");
        publish(github, &target_sha, &status, &mut outcome).await;
    }

    println!("Posting backlogged status to the following:");
    for candidate in &listing.candidates {
        let (description, target_url) = match &candidate.backlog {
            Backlog::None => continue,
            Backlog::Base => {
                let main_branch = ctx.config.main_branch.as_deref().unwrap_or_default();
                (
                    format!("waiting for base {main_branch} commit pipeline to succeed"),
                    ctx.main_pipeline
                        .as_ref()
                        .map(|p| p.web_url.clone())
                        .unwrap_or_default(),
                )
            }
            Backlog::Check(description) => (description.clone(), String::new()),
        };
        println!("  {} -> {}", candidate.name, candidate.head_sha);
        let status = ExternalStatus {
            state: StatusState::Pending,
            description,
            target_url,
        };
        publish(github, &candidate.head_sha, &status, &mut outcome).await;
    }

    println!("Posting unmergeable status to the following:");
    for head_sha in &listing.unmergeable_heads {
        println!("  {head_sha}");
        let status = ExternalStatus {
            state: StatusState::Error,
            description: "PR could not be merged with base".to_string(),
            target_url: String::new(),
        };
        publish(github, head_sha, &status, &mut outcome).await;
    }

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pipeline(id: u64, sha: &str, ref_: &str, status: Option<PipelineStatus>) -> Pipeline {
        Pipeline {
            id,
            sha: sha.to_string(),
            ref_: ref_.to_string(),
            status,
            created_at: "2024-05-01T10:00:00Z".parse().unwrap(),
            updated_at: "2024-05-01T10:05:00Z".parse().unwrap(),
            web_url: format!("https://gitlab.example.com/pipelines/{id}"),
        }
    }

    #[test]
    fn every_pending_status_maps_to_pending_with_its_description() {
        let cases = [
            (PipelineStatus::Created, "Pipeline has been created"),
            (
                PipelineStatus::WaitingForResource,
                "Pipeline is waiting for resources",
            ),
            (PipelineStatus::Preparing, "Pipeline is preparing"),
            (PipelineStatus::Pending, "Pipeline is pending"),
            (PipelineStatus::Running, "Pipeline is running"),
            (PipelineStatus::Manual, "Pipeline is running manually"),
            (PipelineStatus::Scheduled, "Pipeline is scheduled"),
        ];
        for (pipeline_status, description) in cases {
            let status =
                status_for_pipeline(&pipeline(1, "abc", "github/x", Some(pipeline_status)))
                    .unwrap();
            assert_eq!(status.state, StatusState::Pending);
            assert_eq!(status.description, description);
        }
    }

    #[test]
    fn terminal_statuses_map_to_their_states() {
        let failed =
            status_for_pipeline(&pipeline(1, "abc", "github/x", Some(PipelineStatus::Failed)))
                .unwrap();
        assert_eq!(failed.state, StatusState::Error);
        assert_eq!(failed.description, "Pipeline failed");

        let skipped =
            status_for_pipeline(&pipeline(1, "abc", "github/x", Some(PipelineStatus::Skipped)))
                .unwrap();
        assert_eq!(skipped.state, StatusState::Failure);
        assert_eq!(skipped.description, "Pipeline was skipped");

        let success =
            status_for_pipeline(&pipeline(1, "abc", "github/x", Some(PipelineStatus::Success)))
                .unwrap();
        assert_eq!(success.state, StatusState::Success);
        assert_eq!(success.description, "Pipeline succeeded");
    }

    #[test]
    fn canceled_unrecognized_and_absent_statuses_emit_nothing() {
        for status in [
            Some(PipelineStatus::Canceled),
            Some(PipelineStatus::Unrecognized),
            None,
        ] {
            assert!(status_for_pipeline(&pipeline(1, "abc", "github/x", status)).is_none());
        }
    }

    #[test]
    fn target_url_comes_from_the_pipeline() {
        let status =
            status_for_pipeline(&pipeline(7, "abc", "github/x", Some(PipelineStatus::Running)))
                .unwrap();
        assert_eq!(status.target_url, "https://gitlab.example.com/pipelines/7");
    }

    #[test]
    fn latest_for_ref_prefers_the_largest_id_for_that_ref() {
        let deduped = dedupe_pipelines(vec![
            pipeline(3, "aaa", "github/pr1_x", Some(PipelineStatus::Success)),
            pipeline(9, "bbb", "github/pr1_x", Some(PipelineStatus::Running)),
            pipeline(20, "ccc", "github/other", Some(PipelineStatus::Success)),
        ]);

        let found = latest_for_ref(&deduped, "github/pr1_x").unwrap();
        assert_eq!(found.id, 9);
        assert!(latest_for_ref(&deduped, "github/absent").is_none());
    }
}
