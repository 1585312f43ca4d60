use llm::builder::{LLMBackend, LLMBuilder};
use llm::chat::ChatMessage;
use llm::LLMProvider;

use hunch_core::AiSettings;

use crate::{Error, Result};

/// Provider names accepted in settings, with the backend each one selects.
const BACKENDS: &[(&str, LLMBackend)] = &[
    ("openai", LLMBackend::OpenAI),
    ("anthropic", LLMBackend::Anthropic),
    ("google", LLMBackend::Google),
    ("ollama", LLMBackend::Ollama),
    ("groq", LLMBackend::Groq),
    ("mistral", LLMBackend::Mistral),
    ("deepseek", LLMBackend::DeepSeek),
];

/// Provider names in display order.
pub fn providers() -> Vec<&'static str> {
    BACKENDS.iter().map(|(name, _)| *name).collect()
}

fn map_backend(provider: &str) -> Result<LLMBackend> {
    BACKENDS
        .iter()
        .find(|(name, _)| *name == provider)
        .map(|(_, backend)| backend.clone())
        .ok_or_else(|| Error::UnknownProvider(provider.to_string()))
}

/// Build a client whose system prompt is fixed to `system`. Optional
/// settings are only passed on when present.
fn client(settings: &AiSettings, system: &str) -> Result<Box<dyn LLMProvider>> {
    let mut builder = LLMBuilder::new()
        .backend(map_backend(&settings.provider)?)
        .model(&settings.model)
        .system(system);

    if !settings.api_key.is_empty() {
        builder = builder.api_key(&settings.api_key);
    }
    if let Some(temperature) = settings.temperature {
        builder = builder.temperature(temperature);
    }
    if let Some(url) = &settings.base_url {
        builder = builder.base_url(url);
    }

    builder.build().map_err(|e| Error::Build(e.to_string()))
}

fn non_empty(text: Option<String>) -> Result<String> {
    text.filter(|t| !t.trim().is_empty())
        .ok_or(Error::EmptyResponse)
}

/// One stateless chat round trip: system prompt plus a single user message.
pub async fn generate(settings: &AiSettings, system: &str, user_msg: &str) -> Result<String> {
    let llm = client(settings, system)?;
    let messages = [ChatMessage::user().content(user_msg).build()];

    tracing::debug!(provider = %settings.provider, model = %settings.model, "sending chat request");
    let response = llm
        .chat(&messages)
        .await
        .map_err(|e| Error::Chat(e.to_string()))?;

    non_empty(response.text())
}
