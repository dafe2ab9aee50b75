use async_trait::async_trait;
use crosspost_common::remote::{DispatchRequest, DispatchTrigger, RemoteError};
use tracing::debug;

/// Fires the automation webhook. Only the status of the reply is looked at.
#[derive(Clone, Debug)]
pub struct WebhookDispatchTrigger {
    url: String,
    client: reqwest::Client,
}

impl WebhookDispatchTrigger {
    #[must_use]
    pub fn new(url: String) -> Self {
        Self {
            url,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl DispatchTrigger for WebhookDispatchTrigger {
    async fn trigger(&self, request: &DispatchRequest) -> Result<(), RemoteError> {
        let response = self
            .client
            .post(&self.url)
            .json(request)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|err| RemoteError::new("dispatch webhook", err))?;

        debug!(label = %request.label, status = %response.status(), "Dispatch triggered");
        Ok(())
    }
}
