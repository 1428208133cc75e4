use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::auth::Token;
use crate::error::{BridgeError, Result};

use super::types::{Branch, CheckRun, CommitStatus, CreatedStatus, PullRequest, Tag};

const PER_PAGE: usize = 100;

/// GitHub API client for the source side of the bridge.
#[derive(Debug)]
pub struct GitHubClient {
    /// HTTP client
    client: reqwest::Client,
    /// Base URL for the GitHub API
    base_url: String,
    /// Repository owner
    owner: String,
    /// Repository name
    repo: String,
}

impl GitHubClient {
    /// Create a new GitHub API client.
    ///
    /// # Arguments
    ///
    /// * `base_url` - GitHub API base URL (e.g., "https://api.github.com")
    /// * `project_path` - Repository path in format "owner/repo"
    /// * `token` - GitHub personal access token
    ///
    /// # Errors
    ///
    /// Returns an error if the project path is not "owner/repo" or the
    /// token cannot be carried in a request header.
    pub fn new(base_url: String, project_path: &str, token: Token) -> Result<Self> {
        let (owner, repo) = match project_path.split('/').collect::<Vec<_>>()[..] {
            [owner, repo] if !owner.is_empty() && !repo.is_empty() => {
                (owner.to_string(), repo.to_string())
            }
            _ => {
                return Err(BridgeError::Config(
                    "Project path must be in format 'owner/repo'".to_string(),
                ))
            }
        };

        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("cibridge/0.3"));
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        let auth = HeaderValue::from_str(&format!("Bearer {}", token.as_str()))
            .map_err(|_| BridgeError::Config("GitHub token is not header-safe".to_string()))?;
        headers.insert(AUTHORIZATION, auth);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| BridgeError::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url,
            owner,
            repo,
        })
    }

    fn repo_url(&self, path: &str) -> String {
        format!(
            "{}/repos/{}/{}/{}",
            self.base_url, self.owner, self.repo, path
        )
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BridgeError::Api(format!(
                "GET {url} returned {status}: {body}"
            )));
        }
        Ok(response.json().await?)
    }

    /// Fetch every open pull request, following pagination to the end.
    pub async fn list_open_pulls(&self) -> Result<Vec<PullRequest>> {
        let mut pulls = Vec::new();
        let mut page = 1;

        loop {
            let url = format!(
                "{}?state=open&per_page={}&page={}",
                self.repo_url("pulls"),
                PER_PAGE,
                page
            );
            let batch: Vec<PullRequest> = self.get_json(&url).await?;
            let batch_len = batch.len();
            pulls.extend(batch);

            if batch_len < PER_PAGE {
                break;
            }
            page += 1;
        }

        Ok(pulls)
    }

    /// Fetch the names of protected branches, sorted.
    pub async fn list_protected_branches(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let mut page = 1;

        loop {
            let url = format!(
                "{}?protected=true&per_page={}&page={}",
                self.repo_url("branches"),
                PER_PAGE,
                page
            );
            let batch: Vec<Branch> = self.get_json(&url).await?;
            let batch_len = batch.len();
            names.extend(batch.into_iter().filter(|b| b.protected).map(|b| b.name));

            if batch_len < PER_PAGE {
                break;
            }
            page += 1;
        }

        names.sort();
        Ok(names)
    }

    /// Fetch tag names, sorted.
    pub async fn list_tags(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let mut page = 1;

        loop {
            let url = format!(
                "{}?per_page={}&page={}",
                self.repo_url("tags"),
                PER_PAGE,
                page
            );
            let batch: Vec<Tag> = self.get_json(&url).await?;
            let batch_len = batch.len();
            names.extend(batch.into_iter().map(|t| t.name));

            if batch_len < PER_PAGE {
                break;
            }
            page += 1;
        }

        names.sort();
        Ok(names)
    }

    /// Latest check runs for a commit. A payload without a `check_runs`
    /// field comes back as an empty list; the backlog evaluator treats
    /// missing checks as unsatisfied.
    pub async fn check_runs(&self, sha: &str) -> Result<Vec<CheckRun>> {
        let url = format!(
            "{}?per_page={}",
            self.repo_url(&format!("commits/{sha}/check-runs")),
            PER_PAGE
        );
        let response: CheckRunsResponse = self.get_json(&url).await?;
        Ok(response.check_runs)
    }

    /// Create a commit status, returning the state echoed by the platform.
    pub async fn create_commit_status(
        &self,
        sha: &str,
        status: &CommitStatus,
    ) -> Result<CreatedStatus> {
        let url = self.repo_url(&format!("statuses/{sha}"));
        let response = self.client.post(&url).json(status).send().await?;
        let http_status = response.status();
        if !http_status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BridgeError::Api(format!(
                "POST {url} returned {http_status}: {body}"
            )));
        }
        Ok(response.json().await?)
    }
}

/// Response from the GitHub API for check runs.
#[derive(Deserialize)]
struct CheckRunsResponse {
    #[serde(default)]
    check_runs: Vec<CheckRun>,
}
