mod client;
mod types;

pub use client::GitHubClient;
pub use types::{Branch, CheckRun, CommitStatus, CreatedStatus, PullRequest, Tag};
