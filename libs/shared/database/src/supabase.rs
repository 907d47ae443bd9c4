use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client, Method, StatusCode,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error};

use shared_config::AppConfig;

#[derive(Debug, Error)]
pub enum SupabaseError {
    /// Unique or exclusion constraint violation (PostgREST answers 409).
    #[error("Constraint conflict: {0}")]
    Conflict(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid header value: {0}")]
    InvalidHeader(String),

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Thin PostgREST client. Requests are authorised with the server key, so
/// row-level policies must allow the service role.
pub struct SupabaseClient {
    client: Client,
    base_url: String,
    anon_key: String,
    server_key: String,
}

impl SupabaseClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.supabase_url.trim_end_matches('/').to_string(),
            anon_key: config.supabase_anon_key.clone(),
            server_key: config.supabase_server_key().to_string(),
        }
    }

    fn get_headers(&self, prefer: Option<&str>) -> Result<HeaderMap, SupabaseError> {
        let mut headers = HeaderMap::new();

        headers.insert("apikey", header_value(&self.anon_key)?);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(AUTHORIZATION, header_value(&format!("Bearer {}", self.server_key))?);

        if let Some(prefer) = prefer {
            headers.insert("Prefer", header_value(prefer)?);
        }

        Ok(headers)
    }

    pub async fn request<T>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        prefer: Option<&str>,
    ) -> Result<T, SupabaseError>
    where
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making {} request to {}", method, url);

        let mut req = self.client.request(method, &url).headers(self.get_headers(prefer)?);

        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req.send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await?;
            return Err(classify_failure(status, error_text));
        }

        Ok(response.json::<T>().await?)
    }

    pub fn get_base_url(&self) -> &str {
        &self.base_url
    }
}

fn header_value(raw: &str) -> Result<HeaderValue, SupabaseError> {
    HeaderValue::from_str(raw).map_err(|e| SupabaseError::InvalidHeader(e.to_string()))
}

fn classify_failure(status: StatusCode, error_text: String) -> SupabaseError {
    match status {
        StatusCode::CONFLICT => {
            debug!("Constraint conflict reported by PostgREST: {}", error_text);
            SupabaseError::Conflict(error_text)
        }
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            error!("API auth error ({}): {}", status, error_text);
            SupabaseError::Auth(error_text)
        }
        StatusCode::NOT_FOUND => SupabaseError::NotFound(error_text),
        _ => {
            error!("API error ({}): {}", status, error_text);
            SupabaseError::Api {
                status: status.as_u16(),
                message: error_text,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> SupabaseClient {
        let config = AppConfig {
            supabase_url: server.uri(),
            supabase_anon_key: "anon".to_string(),
            supabase_service_role_key: "service".to_string(),
            ..AppConfig::default()
        };
        SupabaseClient::new(&config)
    }

    #[tokio::test]
    async fn sends_keys_and_prefer_header() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/things"))
            .and(header("apikey", "anon"))
            .and(header("authorization", "Bearer service"))
            .and(header("prefer", "return=representation"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!([{ "id": 1 }])))
            .mount(&server)
            .await;

        let rows: Vec<Value> = client_for(&server)
            .request(Method::POST, "/rest/v1/things", Some(json!({})), Some("return=representation"))
            .await
            .unwrap();
        assert_eq!(rows[0]["id"], 1);
    }

    #[tokio::test]
    async fn unique_violation_is_conflict() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/things"))
            .respond_with(ResponseTemplate::new(409).set_body_json(json!({
                "code": "23505",
                "message": "duplicate key value violates unique constraint"
            })))
            .mount(&server)
            .await;

        let result: Result<Vec<Value>, _> = client_for(&server)
            .request(Method::POST, "/rest/v1/things", Some(json!({})), None)
            .await;
        assert_matches!(result, Err(SupabaseError::Conflict(_)));
    }

    #[tokio::test]
    async fn server_error_keeps_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503).set_body_string("down"))
            .mount(&server)
            .await;

        let result: Result<Vec<Value>, _> = client_for(&server)
            .request(Method::GET, "/rest/v1/things", None, None)
            .await;
        assert_matches!(result, Err(SupabaseError::Api { status: 503, .. }));
    }
}
