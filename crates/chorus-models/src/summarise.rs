//! Conversation summarisation backed by a chat model

use crate::error::Result;
use crate::openai::OpenAiClient;
use crate::prompts;
use crate::traits::SummaryModel;
use chorus_core::{Conversation, ConversationSummary, GeneratedSummary};
use tracing::debug;

pub struct OpenAiSummaryModel {
    client: OpenAiClient,
}

impl OpenAiSummaryModel {
    pub fn new(client: OpenAiClient) -> Self {
        Self { client }
    }
}

impl SummaryModel for OpenAiSummaryModel {
    fn checkpoint_filename(&self) -> &str {
        "summaries.jsonl"
    }

    async fn summarise(&self, conversations: &[Conversation]) -> Result<Vec<ConversationSummary>> {
        let mut summaries = Vec::with_capacity(conversations.len());
        for conversation in conversations {
            debug!("summarising conversation {}", conversation.chat_id);
            let generated: GeneratedSummary = self
                .client
                .chat_json(prompts::SUMMARY_SYSTEM, &prompts::summary_prompt(conversation))
                .await?;

            let mut metadata = conversation.metadata.clone();
            metadata.insert(
                "conversation_turns".to_string(),
                serde_json::json!(conversation.messages.len()),
            );

            summaries.push(ConversationSummary {
                chat_id: conversation.chat_id.clone(),
                summary: generated.summary,
                metadata,
            });
        }
        Ok(summaries)
    }
}
