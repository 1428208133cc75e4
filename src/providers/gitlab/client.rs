use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::Client;
use url::Url;

use crate::auth::Token;
use crate::error::{BridgeError, Result};

use super::types::{Commit, Pipeline};

const PER_PAGE: usize = 100;

pub struct GitLabClient {
    client: Client,
    api_url: Url,
    project: String,
    token: Option<Token>,
}

impl GitLabClient {
    pub fn new(base_url: &str, project: &str, token: Option<Token>) -> Result<Self> {
        let client = Client::builder()
            .user_agent("cibridge/0.3")
            .build()
            .map_err(|e| BridgeError::Config(format!("Failed to create HTTP client: {e}")))?;

        let api_url = Url::parse(base_url)
            .map_err(|e| BridgeError::Config(format!("Invalid base URL: {e}")))?
            .join("api/v4/")
            .map_err(|e| BridgeError::Config(format!("Invalid API base URL: {e}")))?;

        Ok(Self {
            client,
            api_url,
            project: project.to_string(),
            token,
        })
    }

    /// Helper to build authenticated requests
    fn auth_request(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if let Some(token) = &self.token {
            request.bearer_auth(token.as_str())
        } else {
            request
        }
    }

    /// Construct a project-scoped URL
    fn project_url(&self, path: &str) -> Result<Url> {
        self.api_url
            .join(&format!(
                "projects/{}/{}",
                urlencoding::encode(&self.project),
                path
            ))
            .map_err(|e| BridgeError::Config(format!("Invalid project URL: {e}")))
    }

    /// Pipelines on a ref updated after the given instant, all pages.
    ///
    /// Pagination is drained before anything is returned; callers never act
    /// on a partial window.
    pub async fn pipelines_updated_after(
        &self,
        ref_: &str,
        updated_after: DateTime<Utc>,
    ) -> Result<Vec<Pipeline>> {
        let mut pipelines = Vec::new();
        let mut page = 1;

        loop {
            let mut url = self.project_url("pipelines")?;
            url.query_pairs_mut()
                .append_pair(
                    "updated_after",
                    &updated_after.to_rfc3339_opts(SecondsFormat::Secs, true),
                )
                .append_pair("ref", ref_)
                .append_pair("per_page", &PER_PAGE.to_string())
                .append_pair("page", &page.to_string());

            let response = self.auth_request(self.client.get(url.clone())).send().await?;
            let status = response.status();
            if !status.is_success() {
                return Err(BridgeError::Api(format!("GET {url} returned {status}")));
            }

            let batch: Vec<Pipeline> = response.json().await?;
            let batch_len = batch.len();
            pipelines.extend(batch);

            if batch_len < PER_PAGE {
                break;
            }
            page += 1;
        }

        Ok(pipelines)
    }

    /// A single commit, used to read the merge subject of a mirror commit.
    pub async fn commit(&self, sha: &str) -> Result<Commit> {
        let url = self.project_url(&format!("repository/commits/{sha}"))?;

        let response = self.auth_request(self.client.get(url.clone())).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(BridgeError::Api(format!("GET {url} returned {status}")));
        }

        Ok(response.json().await?)
    }
}
