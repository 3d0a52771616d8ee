use std::marker::PhantomData;
use std::time::Duration;

use serde::Deserialize;
use uuid::Uuid;

use crate::models::SyncEntity;

/// Errors from remote API calls.
#[derive(Debug)]
pub enum RemoteError {
    /// Could not reach the server, or the request timed out.
    Transport(String),
    /// The server answered with a non-2xx status.
    Api {
        status: u16,
        message: String,
        code: Option<String>,
    },
    /// A 2xx response body did not parse.
    Decode(String),
}

impl RemoteError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, RemoteError::Api { status: 404, .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, RemoteError::Api { status: 409, .. })
    }
}

impl std::fmt::Display for RemoteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RemoteError::Transport(e) => write!(f, "Transport error: {}", e),
            RemoteError::Api {
                status,
                message,
                code,
            } => match code {
                Some(code) => write!(f, "HTTP {} ({}): {}", status, code, message),
                None => write!(f, "HTTP {}: {}", status, message),
            },
            RemoteError::Decode(e) => write!(f, "Response decode error: {}", e),
        }
    }
}

impl std::error::Error for RemoteError {}

impl From<reqwest::Error> for RemoteError {
    fn from(e: reqwest::Error) -> Self {
        RemoteError::Transport(e.to_string())
    }
}

/// Error body shape the remote uses for non-2xx responses.
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: String,
    code: Option<String>,
}

/// HTTP client for the remote store, shared across entity kinds.
#[derive(Debug, Clone)]
pub struct RemoteClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl RemoteClient {
    /// Builds a client with a bounded per-request timeout.
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, RemoteError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RemoteError::Transport(e.to_string()))?;

        let base_url = base_url.into().trim_end_matches('/').to_string();

        Ok(Self {
            http,
            base_url,
            api_key,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The per-kind operation set for `E`.
    pub fn collection<E: SyncEntity>(&self) -> RemoteCollection<E> {
        RemoteCollection {
            client: self.clone(),
            _marker: PhantomData,
        }
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        let mut builder = self.http.request(method, url);
        if let Some(key) = &self.api_key {
            builder = builder.header("Authorization", format!("Bearer {}", key));
        }
        builder
    }
}

/// Remote operations for one entity kind.
pub struct RemoteCollection<E: SyncEntity> {
    client: RemoteClient,
    _marker: PhantomData<E>,
}

impl<E: SyncEntity> Clone for RemoteCollection<E> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            _marker: PhantomData,
        }
    }
}

impl<E: SyncEntity> RemoteCollection<E> {
    fn base(&self) -> String {
        format!("{}{}", self.client.base_url, E::KIND.base_path())
    }

    fn item_url(&self, id: Uuid) -> String {
        format!("{}/{}", self.base(), id)
    }

    /// `GET <base>` with optional filter query parameters.
    pub async fn list(&self, filters: &[(&str, String)]) -> Result<Vec<E>, RemoteError> {
        let response = self
            .client
            .request(reqwest::Method::GET, &self.base())
            .query(filters)
            .send()
            .await?;

        decode_body(response).await
    }

    /// `GET <base>/<id>`; 404 maps to `None`.
    pub async fn get(&self, id: Uuid) -> Result<Option<E>, RemoteError> {
        let response = self
            .client
            .request(reqwest::Method::GET, &self.item_url(id))
            .send()
            .await?;

        if response.status().as_u16() == 404 {
            return Ok(None);
        }
        decode_body(response).await.map(Some)
    }

    /// `POST <base>` with the full entity body.
    pub async fn create(&self, entity: &E) -> Result<E, RemoteError> {
        let response = self
            .client
            .request(reqwest::Method::POST, &self.base())
            .json(entity)
            .send()
            .await?;

        decode_body(response).await
    }

    /// `PUT <base>/<id>` with a full or partial entity body.
    pub async fn update(&self, id: Uuid, body: &serde_json::Value) -> Result<E, RemoteError> {
        let response = self
            .client
            .request(reqwest::Method::PUT, &self.item_url(id))
            .json(body)
            .send()
            .await?;

        decode_body(response).await
    }

    /// `DELETE <base>/<id>`; a 404 means the record is already gone
    /// and is not an error.
    pub async fn delete(&self, id: Uuid) -> Result<(), RemoteError> {
        let response = self
            .client
            .request(reqwest::Method::DELETE, &self.item_url(id))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() || status.as_u16() == 404 {
            Ok(())
        } else {
            Err(read_api_error(response).await)
        }
    }
}

async fn decode_body<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, RemoteError> {
    if !response.status().is_success() {
        return Err(read_api_error(response).await);
    }
    response
        .json()
        .await
        .map_err(|e| RemoteError::Decode(e.to_string()))
}

async fn read_api_error(response: reqwest::Response) -> RemoteError {
    let status = response.status().as_u16();
    match response.json::<ApiErrorBody>().await {
        Ok(body) => RemoteError::Api {
            status,
            message: body.error,
            code: body.code,
        },
        Err(_) => RemoteError::Api {
            status,
            message: format!("server returned status {}", status),
            code: None,
        },
    }
}

/// Quick reachability probe against the server's health endpoint.
///
/// Used by callers that map platform connectivity onto
/// [`Connectivity`](crate::sync::Connectivity).
pub async fn check_server(base_url: &str) -> bool {
    let url = format!("{}/health", base_url.trim_end_matches('/'));
    let client = match reqwest::Client::builder()
        .timeout(Duration::from_secs(2))
        .build()
    {
        Ok(client) => client,
        Err(_) => return false,
    };

    match client.get(&url).send().await {
        Ok(response) => response.status().is_success(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Recipe;

    fn client(base: &str) -> RemoteClient {
        RemoteClient::new(base, Some("test-key".to_string()), Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_base_url_trailing_slash_stripped() {
        let client = client("http://localhost:8080/");
        assert_eq!(client.base_url(), "http://localhost:8080");
    }

    #[test]
    fn test_collection_urls() {
        let client = client("http://localhost:8080");
        let recipes: RemoteCollection<Recipe> = client.collection();

        assert_eq!(recipes.base(), "http://localhost:8080/api/recipes");

        let id = Uuid::nil();
        assert_eq!(
            recipes.item_url(id),
            format!("http://localhost:8080/api/recipes/{}", id)
        );
    }

    #[test]
    fn test_error_classification() {
        let not_found = RemoteError::Api {
            status: 404,
            message: "not found".to_string(),
            code: None,
        };
        assert!(not_found.is_not_found());
        assert!(!not_found.is_conflict());

        let conflict = RemoteError::Api {
            status: 409,
            message: "duplicate title".to_string(),
            code: Some("duplicate".to_string()),
        };
        assert!(conflict.is_conflict());
        assert_eq!(
            conflict.to_string(),
            "HTTP 409 (duplicate): duplicate title"
        );
    }
}
