//! HTTP implementation of [`KnowledgeApi`] using `reqwest`.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::sync::OnceCell;
use uuid::Uuid;

use super::session::Session;
use super::KnowledgeApi;
use crate::config::{Config, ConnectionConfig, IndexingConfig};
use crate::errors::{KbError, KbResult};
use crate::types::{Connection, KnowledgeBase, Organization, Resource, ResourceId};

/// Maximum number of body bytes kept in error messages.
const MAX_ERROR_BODY: usize = 512;

/// Children listings come either bare or wrapped in `{"data": [...]}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ChildrenPayload {
    Wrapped { data: Vec<Resource> },
    Bare(Vec<Resource>),
}

impl ChildrenPayload {
    fn into_resources(self) -> Vec<Resource> {
        match self {
            Self::Wrapped { data } => data,
            Self::Bare(resources) => resources,
        }
    }
}

/// Knowledge-base backend client.
///
/// The active connection and the organization are looked up once and reused
/// for the lifetime of the client.
#[derive(Debug)]
pub struct HttpKnowledgeApi {
    client: reqwest::Client,
    base_url: String,
    session: Session,
    connection: ConnectionConfig,
    indexing: IndexingConfig,
    active_connection: OnceCell<Connection>,
    organization: OnceCell<Organization>,
}

impl HttpKnowledgeApi {
    /// Build a client from configuration.
    ///
    /// No request is sent; the session authenticates on first use.
    ///
    /// # Errors
    ///
    /// Returns [`KbError::MissingCredentials`] if the config has no credentials,
    /// or [`KbError::Other`] if the HTTP client cannot be built.
    pub fn from_config(config: &Config) -> KbResult<Self> {
        let mut builder = reqwest::Client::builder();
        if config.request_timeout_secs > 0 {
            builder = builder.timeout(Duration::from_secs(config.request_timeout_secs));
        }
        let client = builder
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build HTTP client: {}", e))?;

        let session = Session::new(client.clone(), config)?;

        Ok(Self {
            client,
            base_url: config.backend_base().to_string(),
            session,
            connection: config.connection.clone(),
            indexing: config.indexing.clone(),
            active_connection: OnceCell::new(),
            organization: OnceCell::new(),
        })
    }

    /// The authenticated session.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Authenticate now instead of on first request.
    pub async fn initialize(&self) -> KbResult<()> {
        self.session.ensure_initialized().await.map(|_| ())
    }

    /// The connection being browsed.
    pub async fn active_connection(&self) -> KbResult<&Connection> {
        self.active_connection
            .get_or_try_init(|| async {
                let connections = self.list_connections().await?;
                select_connection(connections, &self.connection)
            })
            .await
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        endpoint: &str,
    ) -> KbResult<reqwest::Response> {
        let request = self.session.authorize(request).await?;
        tracing::debug!("-> {}", endpoint);

        let response = request.send().await.map_err(|e| {
            tracing::error!("Request to {} failed: {}", endpoint, e);
            KbError::request(endpoint, e)
        })?;

        let status = response.status();
        if !status.is_success() {
            let mut body = response.text().await.unwrap_or_default();
            if body.len() > MAX_ERROR_BODY {
                let mut cut = MAX_ERROR_BODY;
                while !body.is_char_boundary(cut) {
                    cut -= 1;
                }
                body.truncate(cut);
            }
            tracing::error!("Request to {} returned {}", endpoint, status);
            return Err(KbError::UnexpectedStatus {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        Ok(response)
    }

    async fn read_json<T: DeserializeOwned>(
        response: reqwest::Response,
        endpoint: &str,
    ) -> KbResult<T> {
        response
            .json::<T>()
            .await
            .map_err(|e| KbError::request(endpoint, format!("invalid response body: {}", e)))
    }
}

/// Pick the pinned connection, or the first one listed.
fn select_connection(
    connections: Vec<Connection>,
    config: &ConnectionConfig,
) -> KbResult<Connection> {
    let found = match &config.connection_id {
        Some(id) => connections.into_iter().find(|c| &c.connection_id == id),
        None => connections.into_iter().next(),
    };
    found.ok_or_else(|| KbError::NoConnection {
        provider: config.provider.clone(),
    })
}

/// Body of the knowledge base creation request.
fn knowledge_base_body(
    connection_id: &str,
    resource_id: &ResourceId,
    indexing: &IndexingConfig,
) -> serde_json::Value {
    serde_json::json!({
        "connection_id": connection_id,
        "connection_source_ids": [resource_id.as_str()],
        "name": format!("Knowledge Base for {}", resource_id),
        "description": "Created via kbpick",
        "indexing_params": {
            "ocr": indexing.ocr,
            "unstructured": indexing.unstructured,
            "embedding_params": {
                "embedding_model": indexing.embedding_model,
                "api_key": null,
            },
            "chunker_params": {
                "chunk_size": indexing.chunk_size,
                "chunk_overlap": indexing.chunk_overlap,
                "chunker": indexing.chunker,
            },
        },
        "org_level_role": null,
        "cron_job_id": null,
    })
}

#[async_trait]
impl KnowledgeApi for HttpKnowledgeApi {
    async fn list_connections(&self) -> KbResult<Vec<Connection>> {
        let endpoint = "/connections";
        let request = self
            .client
            .get(self.url(endpoint))
            .query(&[("connection_provider", self.connection.provider.as_str())]);
        let response = self.send(request, endpoint).await?;
        Self::read_json(response, endpoint).await
    }

    async fn list_children(&self, parent: Option<&ResourceId>) -> KbResult<Vec<Resource>> {
        let connection = self.active_connection().await?;
        let endpoint = format!(
            "/connections/{}/resources/children",
            connection.connection_id
        );

        let mut request = self.client.get(self.url(&endpoint));
        if let Some(parent) = parent {
            request = request.query(&[("resource_id", parent.as_str())]);
        }

        let response = self.send(request, &endpoint).await?;
        let payload: ChildrenPayload = Self::read_json(response, &endpoint).await?;
        let resources = payload.into_resources();
        tracing::debug!(
            "Listed {} children of {}",
            resources.len(),
            parent.map(ResourceId::as_str).unwrap_or("root")
        );
        Ok(resources)
    }

    async fn create_knowledge_base(&self, resource_id: &ResourceId) -> KbResult<KnowledgeBase> {
        let connection = self.active_connection().await?;
        let endpoint = "/knowledge_bases";
        let body = knowledge_base_body(&connection.connection_id, resource_id, &self.indexing);

        let request = self.client.post(self.url(endpoint)).json(&body);
        let response = self.send(request, endpoint).await?;
        Self::read_json(response, endpoint).await
    }

    async fn current_organization(&self) -> KbResult<Organization> {
        let org = self
            .organization
            .get_or_try_init(|| async {
                let endpoint = "/organizations/me/current";
                let request = self.client.get(self.url(endpoint));
                let response = self.send(request, endpoint).await?;
                Self::read_json::<Organization>(response, endpoint).await
            })
            .await?;
        Ok(org.clone())
    }

    async fn trigger_sync(&self, knowledge_base_id: &Uuid, org_id: &str) -> KbResult<()> {
        let endpoint = format!("/knowledge_bases/sync/trigger/{}/{}", knowledge_base_id, org_id);
        let request = self.client.get(self.url(&endpoint));
        self.send(request, &endpoint).await?;
        tracing::debug!("Sync triggered for knowledge base {}", knowledge_base_id);
        Ok(())
    }

    async fn delete_knowledge_base_resource(
        &self,
        knowledge_base_id: &Uuid,
        resource_path: &str,
    ) -> KbResult<()> {
        let endpoint = format!("/knowledge_bases/{}/resources", knowledge_base_id);
        let request = self
            .client
            .delete(self.url(&endpoint))
            .query(&[("resource_path", resource_path)]);
        self.send(request, &endpoint).await?;
        Ok(())
    }
}
