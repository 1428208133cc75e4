use serde::{Deserialize, Serialize};

/// An open pull request on the source platform.
///
/// Deserialized straight off the REST payload; only the fields the bridge
/// makes decisions from are kept.
#[derive(Debug, Clone, Deserialize)]
pub struct PullRequest {
    /// PR number; the PR's identity within one sync cycle
    pub number: u64,
    /// Head ref (branch name + commit)
    pub head: HeadRef,
    /// Base ref (commit only)
    pub base: BaseRef,
    /// Test merge commit. Absent while mergeability is being recomputed or
    /// when the PR cannot be merged with its base.
    pub merge_commit_sha: Option<String>,
}

/// Head ref of a pull request.
#[derive(Debug, Clone, Deserialize)]
pub struct HeadRef {
    /// Branch name
    #[serde(rename = "ref")]
    pub ref_: String,
    /// Head commit sha
    pub sha: String,
}

/// Base ref of a pull request.
#[derive(Debug, Clone, Deserialize)]
pub struct BaseRef {
    /// Base commit sha
    pub sha: String,
}

/// A repository branch with its protection flag.
#[derive(Debug, Clone, Deserialize)]
pub struct Branch {
    pub name: String,
    #[serde(default)]
    pub protected: bool,
}

/// A repository tag.
#[derive(Debug, Clone, Deserialize)]
pub struct Tag {
    pub name: String,
}

/// A check run attached to a commit.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckRun {
    pub name: String,
    pub status: String,
    pub conclusion: Option<String>,
}

impl CheckRun {
    /// A prerequisite check only counts once it has run to completion and
    /// concluded successfully.
    pub fn is_successful(&self) -> bool {
        self.status == "completed" && self.conclusion.as_deref() == Some("success")
    }
}

/// POST body for creating a commit status.
#[derive(Debug, Clone, Serialize)]
pub struct CommitStatus {
    pub state: String,
    pub target_url: String,
    pub description: String,
    pub context: String,
}

/// The platform's echo of a created commit status.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatedStatus {
    pub state: String,
}
