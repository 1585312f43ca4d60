pub mod engine;
mod parse;
mod prompt;

use async_trait::async_trait;
use hunch_core::{
    AiSettings, GeneratorDemo, NextQuestion, PredictorState, Program, ReflectorDemo, Transcript,
};

pub use prompt::MAX_DEMOS;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unknown provider: {0}")]
    UnknownProvider(String),

    #[error("build LLM: {0}")]
    Build(String),

    #[error("chat: {0}")]
    Chat(String),

    #[error("LLM returned no text")]
    EmptyResponse,

    #[error("malformed question from LLM ({reason}): {raw}")]
    Malformed { reason: String, raw: String },
}

pub type Result<T> = std::result::Result<T, Error>;

/// Produces the next yes/no question from the history so far.
///
/// Implementations must be pure functions of `history`: the same
/// history is all they get, and they keep no session state between calls.
#[async_trait]
pub trait QuestionGenerator: Send + Sync {
    async fn next_question(&self, history: &Transcript) -> Result<NextQuestion>;
}

/// Writes a free-text critique of a finished session.
#[async_trait]
pub trait Reflector: Send + Sync {
    async fn reflect(
        &self,
        concept: &str,
        final_question: &str,
        history: &Transcript,
    ) -> Result<String>;
}

/// Both predictors backed by a chat LLM, configured from a `Program`.
#[derive(Debug, Clone)]
pub struct LlmPredictor {
    settings: AiSettings,
    generator: PredictorState<GeneratorDemo>,
    reflector: PredictorState<ReflectorDemo>,
}

impl LlmPredictor {
    pub fn new(settings: AiSettings, program: Program) -> Self {
        Self {
            settings,
            generator: program.generator,
            reflector: program.reflector,
        }
    }
}

#[async_trait]
impl QuestionGenerator for LlmPredictor {
    async fn next_question(&self, history: &Transcript) -> Result<NextQuestion> {
        let system = prompt::generator_system_prompt(&self.generator);
        let user_msg = prompt::generator_user_message(history);

        let raw = engine::generate(&self.settings, &system, &user_msg).await?;
        tracing::debug!(%raw, "generator output");

        let next = parse::parse_next_question(&raw)?;
        if let Some(reasoning) = &next.reasoning {
            tracing::debug!(%reasoning, guess_made = next.guess_made, "generator reasoning");
        }
        Ok(next)
    }
}

#[async_trait]
impl Reflector for LlmPredictor {
    async fn reflect(
        &self,
        concept: &str,
        final_question: &str,
        history: &Transcript,
    ) -> Result<String> {
        let system = prompt::reflector_system_prompt(&self.reflector);
        let user_msg = prompt::reflector_user_message(concept, final_question, history);

        let raw = engine::generate(&self.settings, &system, &user_msg).await?;
        tracing::debug!(%raw, "reflector output");

        Ok(parse::parse_critique(&raw, self.reflector.chain_of_thought))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn predictor(provider: &str) -> LlmPredictor {
        let settings = AiSettings {
            provider: provider.into(),
            api_key: "k".into(),
            model: "m".into(),
            ..Default::default()
        };
        LlmPredictor::new(settings, Program::default())
    }

    #[tokio::test]
    async fn unknown_provider_fails_before_any_request() {
        let p = predictor("nonesuch");
        let err = p.next_question(&Transcript::new()).await.unwrap_err();
        assert!(matches!(err, Error::UnknownProvider(_)));

        let err = p
            .reflect("Cher", "Is it Cher?", &Transcript::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnknownProvider(_)));
    }

    #[test]
    fn malformed_error_shows_reason_and_output() {
        let err = Error::Malformed {
            reason: "empty question".into(),
            raw: "{}".into(),
        };
        assert_eq!(
            err.to_string(),
            "malformed question from LLM (empty question): {}"
        );
    }
}
