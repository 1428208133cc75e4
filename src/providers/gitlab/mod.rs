mod client;
mod dedupe;
mod types;

pub use client::GitLabClient;
pub use dedupe::dedupe_pipelines;
pub use types::{Pipeline, PipelineStatus};
