// Copyright © 2025 mailfabric contributors
// Licensed under the MIT License. See LICENSE for details.

//! Thin wrapper over `async-openai`, enforcing the orchestrator's 120s
//! per-call timeout and translating transport/API failures into
//! [`MailFabricError`] the rest of the pipeline already knows how to retry.

use crate::modules::error::code::ErrorCode;
use crate::modules::error::MailFabricResult;
use crate::modules::settings::cli::SETTINGS;
use crate::raise_error;
use async_openai::config::OpenAIConfig;
use async_openai::types::{
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequestArgs,
};
use async_openai::Client;
use std::sync::LazyLock;
use std::time::Duration;

pub static LLM_CLIENT: LazyLock<LlmClient> = LazyLock::new(LlmClient::new);

pub struct LlmClient {
    client: Client<OpenAIConfig>,
    timeout: Duration,
}

impl LlmClient {
    fn new() -> Self {
        let config =
            OpenAIConfig::new().with_api_key(SETTINGS.openai_api_key.as_deref().unwrap_or_default());
        Self {
            client: Client::with_config(config),
            timeout: Duration::from_secs(SETTINGS.llm_timeout_secs),
        }
    }

    /// Runs a single system/user chat completion and returns the assistant's
    /// reply text. Callers that need structured output ask for JSON in the
    /// system prompt and parse it themselves -- the batch classify path does
    /// this to get one completion covering up to 10 messages at once.
    pub async fn complete(&self, system_prompt: &str, user_prompt: &str) -> MailFabricResult<String> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&SETTINGS.openai_model)
            .messages([
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(system_prompt)
                    .build()
                    .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::LlmRequestFailed))?
                    .into(),
                ChatCompletionRequestUserMessageArgs::default()
                    .content(user_prompt)
                    .build()
                    .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::LlmRequestFailed))?
                    .into(),
            ])
            .build()
            .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::LlmRequestFailed))?;

        let response = tokio::time::timeout(self.timeout, self.client.chat().create(request))
            .await
            .map_err(|_| raise_error!("llm call timed out".into(), ErrorCode::LlmTimeout))?
            .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::LlmRequestFailed))?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| raise_error!("llm returned no choices".into(), ErrorCode::LlmRequestFailed))
    }
}
