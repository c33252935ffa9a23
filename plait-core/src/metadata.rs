//! Client for the pipeline metadata store.

use std::time::Duration;

use reqwest::Client;
use tracing::{debug, info};

use crate::error::{MetadataError, PlaitError};

/// Metadata fetch timeout.
const FETCH_TIMEOUT: Duration = Duration::from_secs(15);

/// Source of pipeline plan documents, keyed by pipeline UUID.
///
/// The seam exists so graph building can run against fixture documents in
/// tests; production code uses [`MetadataClient`].
#[async_trait::async_trait]
pub trait PipelineSource {
    /// Fetch the Turtle document describing one pipeline.
    async fn fetch_turtle(&self, pipeline_uuid: &str) -> crate::error::Result<String>;
}

/// HTTP client for the metadata store: `GET {base}/{uuid}` returning Turtle.
///
/// Stateless and safe to call repeatedly.
#[derive(Debug, Clone)]
pub struct MetadataClient {
    base_url: String,
    client: Client,
}

impl MetadataClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
        Self {
            base_url: base_url.into(),
            client: Client::builder()
                .timeout(FETCH_TIMEOUT)
                .build()
                .unwrap_or_default(),
        }
    }
}

#[async_trait::async_trait]
impl PipelineSource for MetadataClient {
    async fn fetch_turtle(&self, pipeline_uuid: &str) -> crate::error::Result<String> {
        let url = format!("{}/{pipeline_uuid}", self.base_url.trim_end_matches('/'));
        info!(url = %url, "Fetching pipeline definition");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|source| MetadataError::Fetch {
                uuid: pipeline_uuid.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(PlaitError::Metadata(MetadataError::Status {
                uuid: pipeline_uuid.to_string(),
                status: status.as_u16(),
            }));
        }

        let body = response
            .text()
            .await
            .map_err(|source| MetadataError::Fetch {
                uuid: pipeline_uuid.to_string(),
                source,
            })?;

        debug!(uuid = %pipeline_uuid, bytes = body.len(), "Fetched pipeline definition");
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    #[tokio::test]
    async fn returns_body_on_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/pipelines/abc"))
            .respond_with(ResponseTemplate::new(200).set_body_string("@prefix p: <urn:p> ."))
            .mount(&server)
            .await;

        let client = MetadataClient::new(format!("{}/pipelines", server.uri()));
        let body = client.fetch_turtle("abc").await.unwrap();
        assert_eq!(body, "@prefix p: <urn:p> .");
    }

    #[tokio::test]
    async fn non_2xx_is_a_status_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = MetadataClient::new(format!("{}/pipelines", server.uri()));
        let err = client.fetch_turtle("missing").await.unwrap_err();
        match err {
            PlaitError::Metadata(MetadataError::Status { uuid, status }) => {
                assert_eq!(uuid, "missing");
                assert_eq!(status, 404);
            }
            other => panic!("expected status error, got {other}"),
        }
    }

    #[tokio::test]
    async fn connection_failure_carries_the_uuid() {
        // Nothing listens on this port.
        let client = MetadataClient::new("http://127.0.0.1:1/pipelines");
        let err = client.fetch_turtle("abc").await.unwrap_err();
        match err {
            PlaitError::Metadata(MetadataError::Fetch { uuid, .. }) => assert_eq!(uuid, "abc"),
            other => panic!("expected fetch error, got {other}"),
        }
    }

    #[tokio::test]
    async fn trailing_slash_in_base_is_tolerated() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/pipelines/abc"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;

        let client = MetadataClient::new(format!("{}/pipelines/", server.uri()));
        assert_eq!(client.fetch_turtle("abc").await.unwrap(), "ok");
    }
}
