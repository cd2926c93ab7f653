use crate::llm;
use crate::{Error, Result};
use async_openai::{
    Client,
    config::{AzureConfig, Config},
    types::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestAssistantMessageContent,
        ChatCompletionRequestMessage, ChatCompletionRequestUserMessage,
        ChatCompletionRequestUserMessageContent, CreateChatCompletionRequestArgs, Role,
    },
};
use async_trait::async_trait;
use std::sync::Arc;

pub struct OpenAI<C: Config = AzureConfig> {
    model: String,
    client: Client<C>,
}

impl OpenAI<AzureConfig> {
    /// Azure deployments are addressed by name, so `model` doubles as the
    /// deployment id.
    pub fn azure(endpoint: &str, api_key: &str, api_version: &str, model: String) -> Arc<Self> {
        let config = AzureConfig::new()
            .with_api_base(endpoint)
            .with_api_key(api_key)
            .with_api_version(api_version)
            .with_deployment_id(model.as_str());

        Arc::new(Self {
            model,
            client: Client::with_config(config),
        })
    }
}

impl TryFrom<&llm::Message> for ChatCompletionRequestMessage {
    type Error = Error;

    fn try_from(msg: &llm::Message) -> Result<Self> {
        match msg {
            llm::Message::User(msg) => Ok(ChatCompletionRequestMessage::User(
                ChatCompletionRequestUserMessage {
                    content: ChatCompletionRequestUserMessageContent::Text(msg.clone()),
                    name: None,
                },
            )),
            llm::Message::Assistant(msg) => Ok(ChatCompletionRequestMessage::Assistant(
                ChatCompletionRequestAssistantMessageArgs::default()
                    .content(ChatCompletionRequestAssistantMessageContent::Text(
                        msg.clone(),
                    ))
                    .build()?,
            )),
        }
    }
}

#[async_trait]
impl<C> llm::LLM for OpenAI<C>
where
    C: Config + Send + Sync,
{
    fn model(&self) -> &str {
        &self.model
    }

    async fn completion<'a>(
        &self,
        request: llm::CompletionRequest<'a>,
    ) -> Result<llm::CompletionResponse> {
        let mut completion = CreateChatCompletionRequestArgs::default();
        completion.model(&self.model).messages(
            request
                .messages
                .iter()
                .map(ChatCompletionRequestMessage::try_from)
                .collect::<Result<Vec<_>>>()?,
        );

        if let Some(max_tokens) = request.max_tokens {
            completion.max_completion_tokens(max_tokens);
        }

        let completion = completion.build()?;

        let res = self.client.chat().create(completion).await?;

        let choice = res
            .choices
            .first()
            .ok_or(Error::LLMResponseError("choices is empty".to_string()))?;

        if choice.message.role != Role::Assistant {
            return Err(Error::LLMResponseError(
                "expected role to be assistant".to_string(),
            ));
        }

        let content = choice
            .message
            .content
            .as_ref()
            .ok_or(Error::LLMResponseError("content is empty".to_string()))?;

        Ok(llm::CompletionResponse {
            content: content.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::OpenAI;
    use crate::llm::{LLM, Message};
    use async_openai::types::{
        ChatCompletionRequestAssistantMessageContent, ChatCompletionRequestMessage,
        ChatCompletionRequestUserMessageContent,
    };

    #[test]
    fn test_message_conversion() {
        let user = ChatCompletionRequestMessage::try_from(&Message::User("hi".to_string())).unwrap();
        assert!(matches!(
            user,
            ChatCompletionRequestMessage::User(m)
                if m.content == ChatCompletionRequestUserMessageContent::Text("hi".to_string())
        ));

        let assistant =
            ChatCompletionRequestMessage::try_from(&Message::Assistant("yo".to_string())).unwrap();
        assert!(matches!(
            assistant,
            ChatCompletionRequestMessage::Assistant(m)
                if m.content == Some(ChatCompletionRequestAssistantMessageContent::Text("yo".to_string()))
        ));
    }

    #[test]
    fn test_azure_reports_deployment_as_model() {
        let llm = OpenAI::azure(
            "https://example.openai.azure.com",
            "key",
            "2024-02-01",
            "o1-mini".to_string(),
        );
        assert_eq!(llm.model(), "o1-mini");
    }
}
