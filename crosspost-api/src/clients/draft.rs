use async_trait::async_trait;
use crosspost_common::{
    model::platform::Platform,
    remote::{DraftGenerator, DraftMap, DraftRequest, RemoteError},
};
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::{debug, warn};

const SERVICE: &str = "draft generator";

#[derive(Clone, Eq, PartialEq, Debug, Deserialize)]
struct DraftResponse {
    drafts: BTreeMap<String, String>,
}

/// Posts the draft request as JSON to an endpoint that answers with
/// `{ "drafts": { "<platform id>": "<text>" } }`.
#[derive(Clone, Debug)]
pub struct HttpDraftGenerator {
    endpoint: String,
    client: reqwest::Client,
}

impl HttpDraftGenerator {
    #[must_use]
    pub fn new(endpoint: String) -> Self {
        Self {
            endpoint,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl DraftGenerator for HttpDraftGenerator {
    async fn generate(&self, request: &DraftRequest) -> Result<DraftMap, RemoteError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|err| RemoteError::new(SERVICE, err))?;

        let DraftResponse { drafts } = response
            .json()
            .await
            .map_err(|err| RemoteError::new(SERVICE, err))?;
        debug!(count = drafts.len(), provider = %request.provider, "Draft response received");

        let drafts = drafts
            .into_iter()
            .filter_map(|(id, text)| match id.parse::<Platform>() {
                Ok(platform) => Some((platform, text)),
                Err(err) => {
                    warn!(error = %err, "Ignoring draft for unknown platform");
                    None
                }
            })
            .collect();

        Ok(drafts)
    }
}
