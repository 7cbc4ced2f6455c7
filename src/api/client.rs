//! HTTP client for the Murmur backend
//!
//! Handles the two external collaborators of the crypto layer: the
//! public-key directory and the message transport. Both only ever see
//! base64-encoded ciphertext and public keys.

use reqwest::{Client, Response};
use serde::{de::DeserializeOwned, Serialize};

use crate::error::{AppError, AppResult};
use crate::models::{DirectoryEntry, Envelope};

/// API client for the Murmur backend
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    /// Create a new API client
    pub fn new(base_url: &str) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url: base_url.to_string(),
        }
    }

    /// Build URL for endpoint
    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    /// Make authenticated GET request
    async fn get<T: DeserializeOwned>(&self, endpoint: &str, token: &str) -> AppResult<T> {
        let response = self
            .client
            .get(self.url(endpoint))
            .header("Authorization", format!("Bearer {}", token))
            .send()
            .await?;
        self.handle_response(response).await
    }

    /// Make authenticated POST request
    async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        endpoint: &str,
        body: &B,
        token: &str,
    ) -> AppResult<T> {
        let response = self
            .client
            .post(self.url(endpoint))
            .json(body)
            .header("Authorization", format!("Bearer {}", token))
            .send()
            .await?;
        self.handle_response(response).await
    }

    /// Handle response and parse JSON
    async fn handle_response<T: DeserializeOwned>(&self, response: Response) -> AppResult<T> {
        let status = response.status();

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(AppError::SessionExpired);
        }

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::Api(format!("({}): {}", status, error_text)));
        }

        let data = response.json().await?;
        Ok(data)
    }

    // ========================================================================
    // Directory Endpoints
    // ========================================================================

    /// Publish our public key under our user id
    pub async fn publish_key(&self, entry: &DirectoryEntry, token: &str) -> AppResult<()> {
        let _: serde_json::Value = self.post("/api/directory", entry, token).await?;
        Ok(())
    }

    /// Look up a user's public key
    pub async fn lookup_key(&self, user_id: &str, token: &str) -> AppResult<DirectoryEntry> {
        self.get(&format!("/api/directory/{}", user_id), token)
            .await
            .map_err(|e| match e {
                AppError::Api(msg) if msg.starts_with("(404") => {
                    AppError::UserNotFound(user_id.to_string())
                }
                other => other,
            })
    }

    // ========================================================================
    // Transport Endpoints
    // ========================================================================

    /// Hand an envelope to the transport for delivery
    pub async fn send_envelope(&self, envelope: &Envelope, token: &str) -> AppResult<Envelope> {
        self.post("/api/messages", envelope, token).await
    }

    /// Fetch envelopes addressed to a user
    pub async fn fetch_envelopes(&self, receiver_id: &str, token: &str) -> AppResult<Vec<Envelope>> {
        self.get(&format!("/api/messages?receiverId={}", receiver_id), token)
            .await
    }
}
