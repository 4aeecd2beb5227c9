//! HTTP client for the cooking assistant backend

use reqwest::{Method, RequestBuilder, Response, header};

use crate::{
    error::{Error, Result},
    stream::{EventStream, decode_stream},
    types::{
        ChatAnswer, ChatRequest, Credential, LoginResponse, RecipeDetail, RecipeQuery,
        RecipeSummary, SystemStats,
    },
};

/// Default backend address used by the web client
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Backend API client.
///
/// Credentials are passed per call rather than stored on the client, so the
/// same client can serve requests before and after login.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    /// Create a client for the given base URL
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    /// Create a client reusing an existing reqwest client
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(Error::InvalidConfig(format!(
                "server URL must start with http:// or https://, got {:?}",
                base_url
            )));
        }
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Start a request, attaching the bearer credential when present
    pub fn request(
        &self,
        method: Method,
        path: &str,
        credential: Option<&Credential>,
    ) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let builder = self.client.request(method, url);
        match credential {
            Some(credential) => builder.header(header::AUTHORIZATION, credential.bearer()),
            None => builder,
        }
    }

    /// Build the streaming chat request
    pub fn chat_request(&self, question: &str, credential: Option<&Credential>) -> RequestBuilder {
        self.request(Method::POST, "/api/chat", credential)
            .header(header::ACCEPT, "text/event-stream")
            .json(&ChatRequest::streaming(question))
    }

    /// Open a streaming chat exchange.
    ///
    /// Fails before any event when the connection cannot be made or the
    /// server answers with a non-success status.
    pub async fn open_chat_stream(
        &self,
        question: &str,
        credential: Option<&Credential>,
    ) -> Result<EventStream> {
        let response = self.chat_request(question, credential).send().await?;
        let response = check_status(response).await?;
        Ok(decode_stream(response.bytes_stream()))
    }

    /// Ask a question without streaming
    pub async fn ask(&self, question: &str, credential: Option<&Credential>) -> Result<ChatAnswer> {
        let response = self
            .request(Method::POST, "/api/chat", credential)
            .json(&ChatRequest::blocking(question))
            .send()
            .await?;
        Ok(check_status(response).await?.json().await?)
    }

    /// Exchange username and password for a bearer credential
    pub async fn login(&self, username: &str, password: &str) -> Result<Credential> {
        let response = self
            .request(Method::POST, "/api/login", None)
            .form(&[("username", username), ("password", password)])
            .send()
            .await?;
        let login: LoginResponse = check_status(response).await?.json().await?;
        Ok(Credential::new(login.access_token))
    }

    /// Check whether the backend is ready to answer
    pub async fn health(&self) -> Result<()> {
        let response = self.request(Method::GET, "/api/health", None).send().await?;
        check_status(response).await?;
        Ok(())
    }

    /// Fetch the dashboard counters
    pub async fn stats(&self, credential: Option<&Credential>) -> Result<SystemStats> {
        let response = self
            .request(Method::GET, "/api/stats", credential)
            .send()
            .await?;
        Ok(check_status(response).await?.json().await?)
    }

    /// List recipes matching the query
    pub async fn recipes(
        &self,
        query: &RecipeQuery,
        credential: Option<&Credential>,
    ) -> Result<Vec<RecipeSummary>> {
        let response = self
            .request(Method::GET, "/api/recipes", credential)
            .query(&query.params())
            .send()
            .await?;
        Ok(check_status(response).await?.json().await?)
    }

    /// Fetch a single recipe with ingredients and steps
    pub async fn recipe(&self, id: &str, credential: Option<&Credential>) -> Result<RecipeDetail> {
        let response = self
            .request(Method::GET, &format!("/api/recipes/{}", id), credential)
            .send()
            .await?;
        Ok(check_status(response).await?.json().await?)
    }

    /// Mark or unmark a recipe as favorite
    pub async fn set_favorite(
        &self,
        id: &str,
        favorite: bool,
        credential: Option<&Credential>,
    ) -> Result<()> {
        let response = self
            .request(
                Method::POST,
                &format!("/api/recipes/{}/favorite", id),
                credential,
            )
            .json(&serde_json::json!({ "favorite": favorite }))
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }
}

/// Map non-success responses to errors, preferring the server's `detail`
async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == reqwest::StatusCode::UNAUTHORIZED {
        tracing::warn!("Backend rejected the credential");
        return Err(Error::Unauthorized);
    }

    let text = response.text().await.unwrap_or_default();
    let body = serde_json::from_str::<serde_json::Value>(&text)
        .ok()
        .and_then(|v| v.get("detail").and_then(|d| d.as_str()).map(String::from))
        .unwrap_or(text);
    Err(Error::status(status.as_u16(), body))
}
