use chrono::{DateTime, Utc};
use serde::Deserialize;

/// A pipeline run on the mirror side.
#[derive(Debug, Clone, Deserialize)]
pub struct Pipeline {
    /// Numeric pipeline id; larger means more recent
    pub id: u64,
    /// Commit the pipeline ran against (a mirror merge commit for PRs)
    pub sha: String,
    /// Ref the pipeline ran on (e.g. "github/pr1_improve_docs")
    #[serde(rename = "ref")]
    pub ref_: String,
    /// Lifecycle status; an absent field is tolerated
    #[serde(default)]
    pub status: Option<PipelineStatus>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub web_url: String,
}

/// Pipeline lifecycle states the bridge knows how to map.
///
/// Anything the platform grows in the future lands on `Unrecognized` and is
/// treated as "no status to report" rather than a parse failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStatus {
    Created,
    WaitingForResource,
    Preparing,
    Pending,
    Running,
    Manual,
    Scheduled,
    Failed,
    Skipped,
    Success,
    Canceled,
    #[serde(other)]
    Unrecognized,
}

/// Commit metadata, used to recover the tested head sha from the subject of
/// a mirror merge commit.
#[derive(Debug, Clone, Deserialize)]
pub struct Commit {
    #[serde(default)]
    pub title: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pipeline_json(status: &str) -> String {
        format!(
            r#"{{
                "id": 1,
                "sha": "abc",
                "ref": "github/pr1_fix",
                "status": {status},
                "created_at": "2024-05-01T10:00:00Z",
                "updated_at": "2024-05-01T10:05:00Z",
                "web_url": "https://gitlab.example.com/pipelines/1"
            }}"#
        )
    }

    #[test]
    fn unknown_status_string_deserializes_to_unrecognized() {
        let pipeline: Pipeline =
            serde_json::from_str(&pipeline_json("\"some_future_state\"")).unwrap();
        assert_eq!(pipeline.status, Some(PipelineStatus::Unrecognized));
    }

    #[test]
    fn known_status_strings_deserialize_to_their_variants() {
        let pipeline: Pipeline =
            serde_json::from_str(&pipeline_json("\"waiting_for_resource\"")).unwrap();
        assert_eq!(pipeline.status, Some(PipelineStatus::WaitingForResource));
    }

    #[test]
    fn missing_status_field_deserializes_to_none() {
        let payload = r#"{
            "id": 2,
            "sha": "def",
            "ref": "github/develop",
            "created_at": "2024-05-01T10:00:00Z",
            "updated_at": "2024-05-01T10:05:00Z",
            "web_url": "https://gitlab.example.com/pipelines/2"
        }"#;
        let pipeline: Pipeline = serde_json::from_str(payload).unwrap();
        assert!(pipeline.status.is_none());
    }
}
