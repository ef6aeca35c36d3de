use std::collections::HashMap;

use async_trait::async_trait;
use contracts::system::onboarding::UpdateAttributesRequest;

use super::ports::{AttributeFallback, StoreError};

/// Remote attribute API reached over HTTP with the caller's bearer token
pub struct HttpAttributeFallback {
    client: reqwest::Client,
    base_url: String,
    bearer: String,
}

impl HttpAttributeFallback {
    pub fn new(client: reqwest::Client, base_url: &str, bearer: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            bearer: bearer.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn check(response: reqwest::Response) -> Result<(), StoreError> {
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        if status.is_server_error() {
            Err(StoreError::Unavailable(format!("{}: {}", status, body)))
        } else {
            Err(StoreError::Rejected(format!("{}: {}", status, body)))
        }
    }
}

#[async_trait]
impl AttributeFallback for HttpAttributeFallback {
    async fn update_attributes(
        &self,
        attributes: HashMap<String, String>,
        force_update: bool,
    ) -> Result<(), StoreError> {
        let body = UpdateAttributesRequest {
            attributes,
            force_update,
        };
        let response = self
            .client
            .post(self.url("/api/user/update-attributes"))
            .bearer_auth(&self.bearer)
            .json(&body)
            .send()
            .await?;
        Self::check(response).await
    }

    async fn complete_onboarding(&self) -> Result<(), StoreError> {
        let response = self
            .client
            .post(self.url("/api/onboarding/complete"))
            .bearer_auth(&self.bearer)
            .send()
            .await?;
        Self::check(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joins_without_double_slash() {
        let fallback =
            HttpAttributeFallback::new(reqwest::Client::new(), "http://idp.local/", "token");
        assert_eq!(
            fallback.url("/api/onboarding/complete"),
            "http://idp.local/api/onboarding/complete"
        );
    }
}
