use hunch_core::{
    validate_program_name, Program, SessionOutcome, Store, Transcript, DEFAULT_MAX_ROUNDS,
};
use hunch_predict::{QuestionGenerator, Reflector};

use crate::oracle::Oracle;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("prediction failed")]
    Predict(#[from] hunch_predict::Error),

    #[error("terminal I/O failed")]
    Io(#[from] std::io::Error),

    #[error("a session needs at least one round")]
    NoRounds,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Round ceiling. `run_session` rejects 0.
    pub max_rounds: usize,
    pub reflect: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_rounds: DEFAULT_MAX_ROUNDS,
            reflect: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionReport {
    pub concept: String,
    pub transcript: Transcript,
    pub outcome: SessionOutcome,
    pub critique: Option<String>,
}

/// Play one game: ask questions until a guess is confirmed or the round
/// ceiling is hit, then reflect on how it went.
///
/// The concept is only ever shown to the reflector. Prediction and I/O
/// errors end the session immediately.
pub async fn run_session<G, F, O>(
    generator: &G,
    reflector: &F,
    oracle: &mut O,
    config: &SessionConfig,
) -> Result<SessionReport, SessionError>
where
    G: QuestionGenerator + ?Sized,
    F: Reflector + ?Sized,
    O: Oracle + ?Sized,
{
    if config.max_rounds == 0 {
        return Err(SessionError::NoRounds);
    }

    let concept = oracle.concept()?;
    let mut transcript = Transcript::new();
    let mut final_question = String::new();
    let mut solved = false;

    tracing::info!(max_rounds = config.max_rounds, "session started");

    while !solved && transcript.len() < config.max_rounds {
        let round = transcript.len() + 1;
        let next = generator.next_question(&transcript).await?;
        let answer = oracle.confirm(&format!("{round}. {}", next.question))?;

        tracing::debug!(round, guess_made = next.guess_made, answer, "round played");
        transcript.push(next.question.clone(), answer);
        solved = next.guess_made && answer;
        final_question = next.question;
    }

    let outcome = SessionOutcome {
        solved,
        final_question,
        rounds: transcript.len(),
    };
    tracing::info!(solved, rounds = outcome.rounds, "session finished");

    if outcome.solved {
        oracle.tell(&format!("\nGot it in {} questions!", outcome.rounds))?;
    } else {
        oracle.tell(&format!(
            "\nOut of questions after {} rounds. You stumped me!",
            outcome.rounds
        ))?;
    }

    let critique = if config.reflect {
        let critique = reflector
            .reflect(&concept, &outcome.final_question, &transcript)
            .await?;
        oracle.tell("\nReflection:")?;
        oracle.tell(&critique)?;
        Some(critique)
    } else {
        None
    };

    Ok(SessionReport {
        concept,
        transcript,
        outcome,
        critique,
    })
}

/// Add a solved session to the named program, creating the program when
/// missing. Returns the program's generator demo count, or `None` when the
/// session was not solved and nothing was written.
pub fn record_report(
    store: &Store,
    name: &str,
    report: &SessionReport,
) -> hunch_core::Result<Option<usize>> {
    validate_program_name(name)?;
    let mut program = if store.program_exists(name) {
        store.read_program(name)?
    } else {
        Program::default()
    };

    let recorded = program.record_session(
        &report.concept,
        &report.transcript,
        &report.outcome,
        report.critique.as_deref(),
    );
    if !recorded {
        return Ok(None);
    }

    store.write_program(name, &program)?;
    tracing::info!(program = name, demos = program.generator.demos.len(), "session recorded");
    Ok(Some(program.generator.demos.len()))
}
