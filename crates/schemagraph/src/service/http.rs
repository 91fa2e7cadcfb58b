//! REST client for the relationship service.
//!
//! Endpoints:
//!
//! - `GET  {base}/neighborhood/{project}/{focus}?hops=N`
//! - `PUT  {base}/logical-fks/{project}/{id}/confirm` with `{ "notes": ... }`
//! - `PUT  {base}/logical-fks/{project}/{id}/reject` with `{ "notes": ... }`
//! - `GET  {base}/objects/{project}`

use super::RelationshipService;
use crate::config::SchemaGraphConfig;
use crate::domain::{
    EdgeAction, HopDepth, NeighborhoodGraph, ObjectId, ObjectSummary, ProjectId, RelationshipId,
};
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode, Url};
use serde::Serialize;
use tracing::debug;

/// Relationship service reached over HTTP.
#[derive(Debug, Clone)]
pub struct HttpRelationshipService {
    client: Client,
    base: Url,
    auth_token: Option<String>,
}

#[derive(Serialize)]
struct MutationBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    notes: Option<&'a str>,
}

impl HttpRelationshipService {
    /// Build a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the base URL cannot be parsed or the HTTP
    /// client cannot be constructed.
    pub fn from_config(config: &SchemaGraphConfig) -> Result<Self> {
        let base = Url::parse(&config.base_url)
            .map_err(|e| Error::Config(format!("invalid base-url '{}': {e}", config.base_url)))?;
        if base.cannot_be_a_base() {
            return Err(Error::Config(format!(
                "base-url '{}' cannot carry a path",
                config.base_url
            )));
        }
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| Error::Config(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            base,
            auth_token: config.auth_token.clone(),
        })
    }

    /// Append path segments (percent-encoded) to the base URL.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        // `from_config` rejects cannot-be-a-base URLs, so segments are always available.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.auth_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

/// Turn a non-success response into a `Network` error carrying the body.
async fn unexpected(response: Response) -> Error {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    Error::Network(format!("HTTP {status}: {}", body.trim()))
}

#[async_trait]
impl RelationshipService for HttpRelationshipService {
    async fn fetch_neighborhood(
        &self,
        project: &ProjectId,
        focus: ObjectId,
        hops: HopDepth,
    ) -> Result<NeighborhoodGraph> {
        let focus_segment = focus.to_string();
        let mut url = self.endpoint(&["neighborhood", &project.0, &focus_segment]);
        url.query_pairs_mut()
            .append_pair("hops", &hops.to_string());
        debug!(%url, "GET neighborhood");

        let response = self.authorize(self.client.get(url)).send().await?;
        match response.status() {
            status if status.is_success() => Ok(response.json::<NeighborhoodGraph>().await?),
            StatusCode::NOT_FOUND => Err(Error::NotFound(focus)),
            _ => Err(unexpected(response).await),
        }
    }

    async fn mutate_logical_fk(
        &self,
        project: &ProjectId,
        id: &RelationshipId,
        action: EdgeAction,
        notes: Option<&str>,
    ) -> Result<()> {
        let url = self.endpoint(&["logical-fks", &project.0, id.as_str(), action.as_str()]);
        debug!(%url, "PUT logical foreign key");

        let response = self
            .authorize(self.client.put(url))
            .json(&MutationBody { notes })
            .send()
            .await?;
        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::NOT_FOUND => Err(Error::UnknownEdge(id.clone())),
            StatusCode::CONFLICT => Err(Error::MutationConflict(id.clone())),
            _ => Err(unexpected(response).await),
        }
    }

    async fn list_objects(&self, project: &ProjectId) -> Result<Vec<ObjectSummary>> {
        let url = self.endpoint(&["objects", &project.0]);
        debug!(%url, "GET objects");

        let response = self.authorize(self.client.get(url)).send().await?;
        if response.status().is_success() {
            Ok(response.json::<Vec<ObjectSummary>>().await?)
        } else {
            Err(unexpected(response).await)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(base: &str) -> HttpRelationshipService {
        let config = SchemaGraphConfig::new(base, ProjectId::new("wh"));
        HttpRelationshipService::from_config(&config).unwrap()
    }

    #[test]
    fn endpoints_append_to_base_path() {
        let svc = service("https://docs.example.com/api/");
        let url = svc.endpoint(&["neighborhood", "wh", "42"]);
        assert_eq!(url.as_str(), "https://docs.example.com/api/neighborhood/wh/42");
    }

    #[test]
    fn segments_are_percent_encoded() {
        let svc = service("https://docs.example.com/api");
        let url = svc.endpoint(&["logical-fks", "my project", "a/b", "confirm"]);
        assert_eq!(
            url.as_str(),
            "https://docs.example.com/api/logical-fks/my%20project/a%2Fb/confirm"
        );
    }

    #[test]
    fn invalid_base_url_is_a_config_error() {
        let config = SchemaGraphConfig::new("not a url", ProjectId::new("wh"));
        let err = HttpRelationshipService::from_config(&config).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn mutation_body_omits_missing_notes() {
        let body = serde_json::to_string(&MutationBody { notes: None }).unwrap();
        assert_eq!(body, "{}");
        let body = serde_json::to_string(&MutationBody { notes: Some("looks right") }).unwrap();
        assert_eq!(body, r#"{"notes":"looks right"}"#);
    }
}
