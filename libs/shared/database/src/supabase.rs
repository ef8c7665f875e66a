use anyhow::{Result, anyhow};
use reqwest::{
    Client,
    header::{HeaderMap, HeaderValue, CONTENT_TYPE, AUTHORIZATION},
    Method,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, error};

use shared_config::AppConfig;

/// Supabase's default `max-rows` cap on a single PostgREST response.
pub const PAGE_SIZE: usize = 1000;

/// Thin PostgREST client. Every call authenticates with the project's anon key
/// plus the bearer token handed in by the caller.
#[derive(Clone)]
pub struct SupabaseClient {
    client: Client,
    base_url: String,
    anon_key: String,
    service_role_key: String,
}

impl SupabaseClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.supabase_url.trim_end_matches('/').to_string(),
            anon_key: config.supabase_anon_key.clone(),
            service_role_key: config.supabase_service_role_key.clone(),
        }
    }

    /// Bearer token for server-owned writes that bypass row level security.
    pub fn service_token(&self) -> &str {
        &self.service_role_key
    }

    fn get_headers(&self, auth_token: Option<&str>) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();

        headers.insert("apikey", HeaderValue::from_str(&self.anon_key)?);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(token) = auth_token.filter(|token| !token.is_empty()) {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {}", token))?,
            );
        }

        Ok(headers)
    }

    pub async fn request<T>(&self, method: Method, path: &str,
                            auth_token: Option<&str>, body: Option<Value>)
                            -> Result<T>
    where T: DeserializeOwned {
        self.request_with_headers(method, path, auth_token, body, None).await
    }

    pub async fn request_with_headers<T>(
        &self,
        method: Method,
        path: &str,
        auth_token: Option<&str>,
        body: Option<Value>,
        extra_headers: Option<HeaderMap>,
    ) -> Result<T>
    where T: DeserializeOwned {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making {} request to {}", method, url);

        let mut headers = self.get_headers(auth_token)?;
        if let Some(extra) = extra_headers {
            headers.extend(extra);
        }

        let mut req = self.client.request(method, &url)
            .headers(headers);

        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req.send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await?;
            error!("API error ({}): {}", status, error_text);

            return Err(match status.as_u16() {
                401 | 403 => anyhow!("Authentication error: {}", error_text),
                404 => anyhow!("Resource not found: {}", error_text),
                409 => anyhow!("Constraint violation: {}", error_text),
                _ => anyhow!("API error ({}): {}", status, error_text),
            });
        }

        // DELETE and minimal-return writes answer with an empty body.
        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Ok(serde_json::from_value(Value::Null)?);
        }

        Ok(serde_json::from_slice(&bytes)?)
    }

    /// GET every row behind a table query, `page_size` rows per request.
    /// Stops at the first short page. `page_size` must not exceed the
    /// project's `max-rows` setting or the first page already looks short.
    pub async fn select_all<T>(&self, path: &str, auth_token: Option<&str>, page_size: usize) -> Result<Vec<T>>
    where T: DeserializeOwned {
        let page_size = page_size.max(1);
        let separator = if path.contains('?') { '&' } else { '?' };
        let mut rows = Vec::new();

        loop {
            let page_path = format!("{}{}limit={}&offset={}", path, separator, page_size, rows.len());
            let page: Vec<T> = self.request(Method::GET, &page_path, auth_token, None).await?;
            let fetched = page.len();
            rows.extend(page);

            if fetched < page_size {
                break;
            }
            debug!("Fetched {} rows from {}, requesting next page", rows.len(), path);
        }

        Ok(rows)
    }

    /// Call a Postgres function exposed under `/rest/v1/rpc/{function}`.
    /// The function body runs inside a single database transaction.
    pub async fn rpc<T>(&self, function: &str, auth_token: Option<&str>, params: Value) -> Result<T>
    where T: DeserializeOwned {
        let path = format!("/rest/v1/rpc/{}", function);
        self.request(Method::POST, &path, auth_token, Some(params)).await
    }
}
