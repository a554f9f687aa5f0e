//! Adapter letting the unified client serve the smart compactor

use async_trait::async_trait;
use foundry_client::UnifiedClient;
use foundry_context::SummaryModel;
use foundry_utils::types::PhaseKind;
use std::sync::Arc;

/// Routes compaction summaries through the scout-phase model.
pub struct ClientSummaryModel {
    client: Arc<UnifiedClient>,
}

impl ClientSummaryModel {
    #[must_use]
    pub fn new(client: Arc<UnifiedClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SummaryModel for ClientSummaryModel {
    async fn summarize(&self, transcript: &str, max_tokens: u32) -> anyhow::Result<String> {
        let prompt = format!(
            "Stay under {max_tokens} output tokens.\n\n{transcript}"
        );
        let response = self
            .client
            .call_detached(PhaseKind::Scout, &prompt, None)
            .await?;
        Ok(response.content)
    }
}
