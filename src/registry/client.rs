//! Registry management API client
//!
//! Speaks the Quay-style `/api/v1/repository` endpoints used for repository
//! creation and for paginated repository/tag discovery. Interpretation of
//! status codes lives with the callers ([`crate::registry::provisioner`],
//! [`crate::registry::directory`]); this layer only moves bytes.

use crate::config::TargetEnvironment;
use crate::error::handlers::{HttpErrorHandler, NetworkErrorHandler};
use crate::error::{ReplicationError, Result};
use crate::logging::Logger;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

/// Body of `POST /api/v1/repository`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateRepositoryRequest {
    pub namespace: String,
    pub repository: String,
    pub visibility: String,
    pub description: String,
    pub repo_kind: String,
}

impl CreateRepositoryRequest {
    /// Private image repository `repository` under the target's organization
    pub fn private_image(target: &TargetEnvironment, repository: &str, description: String) -> Self {
        Self {
            namespace: target.organization.clone(),
            repository: repository.to_string(),
            visibility: "private".to_string(),
            description,
            repo_kind: "image".to_string(),
        }
    }
}

/// Raw status and body; the provisioner decides what they mean
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: String,
}

/// One page of names plus the "more pages" flag
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingPage {
    pub items: Vec<String>,
    pub has_additional: bool,
}

#[derive(Debug, Deserialize)]
struct NamedEntry {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RepositoryPageBody {
    #[serde(default)]
    repositories: Vec<NamedEntry>,
    #[serde(default)]
    has_additional: bool,
}

#[derive(Debug, Deserialize)]
struct TagPageBody {
    #[serde(default)]
    tags: Vec<NamedEntry>,
    #[serde(default)]
    has_additional: bool,
}

fn names(entries: Vec<NamedEntry>) -> Vec<String> {
    entries
        .into_iter()
        .filter_map(|entry| entry.name)
        .filter(|name| !name.is_empty())
        .collect()
}

/// Management API operations used by replication
#[async_trait]
pub trait RegistryApi: Send + Sync {
    async fn create_repository(
        &self,
        target: &TargetEnvironment,
        request: &CreateRepositoryRequest,
    ) -> Result<ApiResponse>;

    /// Page `page` (1-based) of repositories in the target's organization
    async fn repository_page(&self, target: &TargetEnvironment, page: u32) -> Result<ListingPage>;

    /// Page `page` (1-based) of tags in `repository`
    async fn tag_page(
        &self,
        target: &TargetEnvironment,
        repository: &str,
        page: u32,
    ) -> Result<ListingPage>;
}

pub struct QuayClientBuilder {
    timeout: Duration,
    skip_tls: bool,
    output: Logger,
}

impl QuayClientBuilder {
    pub fn new(output: Logger) -> Self {
        Self {
            timeout: Duration::from_secs(30),
            skip_tls: false,
            output,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_skip_tls(mut self, skip_tls: bool) -> Self {
        self.skip_tls = skip_tls;
        self
    }

    pub fn build(self) -> Result<QuayClient> {
        let mut builder = Client::builder().timeout(self.timeout);
        if self.skip_tls {
            builder = builder
                .danger_accept_invalid_certs(true)
                .danger_accept_invalid_hostnames(true);
        }
        let client = builder.build().map_err(|e| {
            ReplicationError::Config(format!("Failed to build HTTP client: {}", e))
        })?;

        Ok(QuayClient {
            client,
            output: self.output,
        })
    }
}

/// reqwest-backed [`RegistryApi`]
#[derive(Clone)]
pub struct QuayClient {
    client: Client,
    output: Logger,
}

impl QuayClient {
    pub fn builder(output: Logger) -> QuayClientBuilder {
        QuayClientBuilder::new(output)
    }

    fn endpoint(target: &TargetEnvironment, path: &str) -> Result<Url> {
        Ok(Url::parse(&format!("{}{}", target.api_base(), path))?)
    }

    pub fn repositories_url(target: &TargetEnvironment, page: u32) -> Result<Url> {
        let mut url = Self::endpoint(target, "/api/v1/repository")?;
        url.query_pairs_mut()
            .append_pair("namespace", &target.organization)
            .append_pair("public", "false")
            .append_pair("page", &page.to_string());
        Ok(url)
    }

    pub fn tags_url(target: &TargetEnvironment, repository: &str, page: u32) -> Result<Url> {
        let mut url = Self::endpoint(
            target,
            &format!("/api/v1/repository/{}/{}/tag/", target.organization, repository),
        )?;
        url.query_pairs_mut().append_pair("page", &page.to_string());
        Ok(url)
    }

    async fn get_page(&self, target: &TargetEnvironment, url: Url, context: &str) -> Result<String> {
        self.output
            .debug("API Call", "API_FETCHING", &format!("GET {}", url));

        let response = self
            .client
            .get(url)
            .bearer_auth(&target.api_token)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .send()
            .await
            .map_err(|e| NetworkErrorHandler::handle_network_error(&e, context))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| NetworkErrorHandler::handle_network_error(&e, context))?;

        if !status.is_success() {
            return Err(HttpErrorHandler::handle_listing_error(status, &body, context));
        }
        Ok(body)
    }
}

#[async_trait]
impl RegistryApi for QuayClient {
    async fn create_repository(
        &self,
        target: &TargetEnvironment,
        request: &CreateRepositoryRequest,
    ) -> Result<ApiResponse> {
        let url = Self::endpoint(target, "/api/v1/repository")?;
        let response = self
            .client
            .post(url)
            .bearer_auth(&target.api_token)
            .json(request)
            .send()
            .await
            .map_err(|e| NetworkErrorHandler::handle_network_error(&e, "repository creation"))?;

        let status = response.status();
        // A body we cannot read still leaves the status to interpret
        let body = response.text().await.unwrap_or_default();
        Ok(ApiResponse { status, body })
    }

    async fn repository_page(&self, target: &TargetEnvironment, page: u32) -> Result<ListingPage> {
        let url = Self::repositories_url(target, page)?;
        let body = self.get_page(target, url, "repository listing").await?;
        let parsed: RepositoryPageBody = serde_json::from_str(&body)?;
        Ok(ListingPage {
            items: names(parsed.repositories),
            has_additional: parsed.has_additional,
        })
    }

    async fn tag_page(
        &self,
        target: &TargetEnvironment,
        repository: &str,
        page: u32,
    ) -> Result<ListingPage> {
        let url = Self::tags_url(target, repository, page)?;
        let body = self.get_page(target, url, "tag listing").await?;
        let parsed: TagPageBody = serde_json::from_str(&body)?;
        Ok(ListingPage {
            items: names(parsed.tags),
            has_additional: parsed.has_additional,
        })
    }
}
