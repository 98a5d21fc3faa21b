use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use crate::common::{ComplaintId, Message, PartyId};
use crate::error::{ChatError, Result};
use crate::protocol::MessageRecord;
use crate::protocol::envelope::{
    FallbackRequest, error_message, record_from_post_response, records_from_history,
};
use crate::storage::HistorySource;

/// Request/response collaborator for complaint messages.
#[async_trait]
pub trait ComplaintApi: Send + Sync {
    /// `GET /complaints/{id}/messages`
    async fn fetch_messages(&self, complaint_id: &ComplaintId) -> Result<Vec<MessageRecord>>;

    /// `POST /complaints/{id}/messages`; returns the created record when the
    /// server echoes one back.
    async fn post_message(
        &self,
        complaint_id: &ComplaintId,
        content: &str,
    ) -> Result<Option<MessageRecord>>;
}

pub struct HttpComplaintApi {
    http: Client,
    base_url: String,
}

impl HttpComplaintApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(http: Client, base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn messages_url(&self, complaint_id: &ComplaintId) -> String {
        format!("{}/complaints/{}/messages", self.base_url, complaint_id)
    }
}

#[async_trait]
impl ComplaintApi for HttpComplaintApi {
    async fn fetch_messages(&self, complaint_id: &ComplaintId) -> Result<Vec<MessageRecord>> {
        let res = self.http.get(self.messages_url(complaint_id)).send().await?;
        let status = res.status();
        if !status.is_success() {
            return Err(ChatError::Status {
                status: status.as_u16(),
                message: format!("Failed to load messages ({status})"),
            });
        }
        let body: Value = res.json().await?;
        Ok(records_from_history(body))
    }

    async fn post_message(
        &self,
        complaint_id: &ComplaintId,
        content: &str,
    ) -> Result<Option<MessageRecord>> {
        let res = self
            .http
            .post(self.messages_url(complaint_id))
            .json(&FallbackRequest { message: content })
            .send()
            .await?;
        let status = res.status();
        // An unreadable body is treated like an empty one.
        let body: Value = res.json().await.unwrap_or(Value::Null);
        if !status.is_success() {
            let message = error_message(&body)
                .unwrap_or_else(|| format!("Failed to send ({})", status.as_u16()));
            return Err(ChatError::Status {
                status: status.as_u16(),
                message,
            });
        }
        Ok(record_from_post_response(body))
    }
}

/// Adapts a [`ComplaintApi`] into the conversation store's history source,
/// resolving message direction against the local party.
pub struct ApiHistory {
    api: Arc<dyn ComplaintApi>,
    owner: PartyId,
}

impl ApiHistory {
    pub fn new(api: Arc<dyn ComplaintApi>, owner: PartyId) -> Self {
        Self { api, owner }
    }
}

#[async_trait]
impl HistorySource for ApiHistory {
    async fn fetch_history(&self, complaint_id: &ComplaintId) -> Result<Vec<Message>> {
        let records = self.api.fetch_messages(complaint_id).await?;
        let total = records.len();
        let messages: Vec<Message> = records
            .into_iter()
            .filter_map(|record| record.into_message(complaint_id, &self.owner))
            .collect();
        if messages.len() < total {
            log::debug!(
                "Skipped {} history records without content for complaint {complaint_id}",
                total - messages.len()
            );
        }
        Ok(messages)
    }
}
