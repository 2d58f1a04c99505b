//! HTTP API client: persisted session history, model/profile options, and
//! user feedback. All calls are fail-safe: errors are surfaced to the caller
//! and never mutate client state.

use datachat_protocol::{FeedbackRequest, HistoryRequest, HistoryResponse, SelectDataResponse};
use tracing::debug;

use crate::error::ClientError;

pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// Fetch the persisted transcript for one session.
    pub async fn fetch_history(&self, req: &HistoryRequest) -> Result<HistoryResponse, ClientError> {
        debug!(
            component = "api",
            event = "history.fetch",
            session_id = %req.session_id,
            profile_name = %req.profile_name,
            "Fetching session history"
        );
        let response = self
            .http
            .post(self.url("qa/get_history_by_session"))
            .json(req)
            .send()
            .await?
            .error_for_status()?
            .json::<HistoryResponse>()
            .await?;
        Ok(response)
    }

    /// Delete the persisted transcript for one session (used when the
    /// session itself is deleted client-side).
    pub async fn delete_history(&self, req: &HistoryRequest) -> Result<(), ClientError> {
        self.http
            .post(self.url("qa/delete_history_by_session"))
            .json(req)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    /// Fetch configured model ids and data profiles; the first entry of each
    /// list serves as the default selection.
    pub async fn fetch_select_data(&self) -> Result<SelectDataResponse, ClientError> {
        let response = self
            .http
            .get(self.url("qa/option"))
            .send()
            .await?
            .error_for_status()?
            .json::<SelectDataResponse>()
            .await?;
        Ok(response)
    }

    /// Submit upvote/downvote feedback for a generated SQL answer. The
    /// backend answers with a bare boolean.
    pub async fn post_feedback(&self, req: &FeedbackRequest) -> Result<bool, ClientError> {
        let accepted = self
            .http
            .post(self.url("qa/user_feedback"))
            .json(req)
            .send()
            .await?
            .error_for_status()?
            .json::<bool>()
            .await?;
        Ok(accepted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_is_normalized() {
        let api = ApiClient::new("http://localhost:8000/api/");
        assert_eq!(api.url("qa/option"), "http://localhost:8000/api/qa/option");
    }
}
