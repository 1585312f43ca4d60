pub mod signatures;

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_MAX_ROUNDS: usize = 20;
pub const PROGRAM_VERSION: u32 = 1;
pub const API_KEY_ENV: &str = "HUNCH_API_KEY";

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("program '{0}' not found")]
    NotFound(String),

    #[error("invalid program name '{0}': use letters, digits, '-' or '_'")]
    InvalidName(String),

    #[error("unsupported program version {found} (this build reads version {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },
}

pub type Result<T> = std::result::Result<T, Error>;

// --- Session types ---

/// One question and the player's answer to it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Turn {
    pub question: String,
    pub answer: bool,
}

/// Question and answer history of one session.
///
/// Questions and answers are only ever appended together, so both
/// histories always have the same length.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, question: impl Into<String>, answer: bool) {
        self.turns.push(Turn {
            question: question.into(),
            answer,
        });
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    pub fn questions(&self) -> Vec<&str> {
        self.turns.iter().map(|t| t.question.as_str()).collect()
    }

    pub fn answers(&self) -> Vec<bool> {
        self.turns.iter().map(|t| t.answer).collect()
    }

    /// Everything but the final turn.
    pub fn without_last(&self) -> Transcript {
        let keep = self.turns.len().saturating_sub(1);
        Transcript {
            turns: self.turns[..keep].to_vec(),
        }
    }
}

/// Output of the question generator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, schemars::JsonSchema)]
pub struct NextQuestion {
    /// Step-by-step thinking about what the answers so far rule in and out
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    /// The next yes/no question, or the final guess phrased as "Is it <name>?"
    pub question: String,
    /// True only when `question` names one specific person as the final guess
    pub guess_made: bool,
}

impl NextQuestion {
    pub fn question(question: impl Into<String>) -> Self {
        Self {
            reasoning: None,
            question: question.into(),
            guess_made: false,
        }
    }

    pub fn guess(question: impl Into<String>) -> Self {
        Self {
            reasoning: None,
            question: question.into(),
            guess_made: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SessionOutcome {
    pub solved: bool,
    /// The question or guess asked in the last round played.
    pub final_question: String,
    pub rounds: usize,
}

// --- Programs ---

/// A worked example rendered into the generator prompt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GeneratorDemo {
    pub history: Transcript,
    pub output: NextQuestion,
}

/// A worked example rendered into the reflector prompt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ReflectorDemo {
    pub concept: String,
    pub final_question: String,
    pub history: Transcript,
    pub critique: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PredictorState<D> {
    pub instructions: String,
    #[serde(default)]
    pub chain_of_thought: bool,
    #[serde(default = "Vec::new", skip_serializing_if = "Vec::is_empty")]
    pub demos: Vec<D>,
}

impl<D> PredictorState<D> {
    pub fn new(instructions: impl Into<String>, chain_of_thought: bool) -> Self {
        Self {
            instructions: instructions.into(),
            chain_of_thought,
            demos: Vec::new(),
        }
    }
}

/// Saved configuration of both predictors.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Program {
    pub version: u32,
    pub generator: PredictorState<GeneratorDemo>,
    pub reflector: PredictorState<ReflectorDemo>,
}

impl Default for Program {
    fn default() -> Self {
        Self {
            version: PROGRAM_VERSION,
            generator: PredictorState::new(signatures::GENERATOR_INSTRUCTIONS, true),
            reflector: PredictorState::new(signatures::REFLECTOR_INSTRUCTIONS, false),
        }
    }
}

impl Program {
    /// Append a solved session as demos. The reflector only gets one when
    /// a critique was written. Returns false (and records nothing) for
    /// unsolved sessions.
    pub fn record_session(
        &mut self,
        concept: &str,
        transcript: &Transcript,
        outcome: &SessionOutcome,
        critique: Option<&str>,
    ) -> bool {
        if !outcome.solved || transcript.is_empty() {
            return false;
        }

        self.generator.demos.push(GeneratorDemo {
            history: transcript.without_last(),
            output: NextQuestion::guess(outcome.final_question.clone()),
        });
        if let Some(critique) = critique.filter(|c| !c.trim().is_empty()) {
            self.reflector.demos.push(ReflectorDemo {
                concept: concept.to_string(),
                final_question: outcome.final_question.clone(),
                history: transcript.clone(),
                critique: critique.to_string(),
            });
        }
        true
    }
}

pub fn validate_program_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidName(name.to_string()))
    }
}

// --- Settings ---

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AiSettings {
    pub provider: String,
    pub api_key: String,
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

impl AiSettings {
    /// Replace the stored key with `key` when it is set and non-empty.
    pub fn with_api_key_override(mut self, key: Option<String>) -> Self {
        if let Some(key) = key.filter(|k| !k.trim().is_empty()) {
            self.api_key = key;
        }
        self
    }
}

pub fn ai_configured(settings: &AiSettings) -> bool {
    !settings.provider.is_empty()
        && !settings.model.is_empty()
        && (settings.provider == "ollama" || !settings.api_key.is_empty())
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default)]
    pub ai: AiSettings,
    #[serde(default = "default_max_rounds")]
    pub max_rounds: usize,
    /// Program loaded by `play` when none is given on the command line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub program: Option<String>,
}

fn default_max_rounds() -> usize {
    DEFAULT_MAX_ROUNDS
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            ai: AiSettings::default(),
            max_rounds: DEFAULT_MAX_ROUNDS,
            program: None,
        }
    }
}

// --- Storage ---

/// Resolve the global data directory (~/.hunch/).
pub fn hunch_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".hunch")
}

/// File-backed settings and programs rooted at one directory.
#[derive(Debug, Clone)]
pub struct Store {
    root: PathBuf,
}

impl Store {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn open_default() -> Self {
        Self::new(hunch_dir())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    fn programs_dir(&self) -> PathBuf {
        self.root.join("programs")
    }

    fn settings_path(&self) -> PathBuf {
        self.root.join("settings.json")
    }

    fn program_path(&self, name: &str) -> PathBuf {
        self.programs_dir().join(format!("{}.json", name))
    }

    /// Read settings, falling back to defaults when the file is missing or unreadable.
    pub fn read_settings(&self) -> Settings {
        let path = self.settings_path();
        if !path.exists() {
            return Settings::default();
        }
        match fs::read_to_string(&path)
            .map_err(Error::from)
            .and_then(|s| serde_json::from_str::<Settings>(&s).map_err(Error::from))
        {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!("ignoring unreadable settings at {}: {}", path.display(), e);
                Settings::default()
            }
        }
    }

    pub fn write_settings(&self, settings: &Settings) -> Result<()> {
        let json = serde_json::to_string_pretty(settings)?;
        write_atomic(&self.root, "settings.json", &json)
    }

    /// List all program names (without .json extension), sorted.
    pub fn list_programs(&self) -> Result<Vec<String>> {
        let dir = self.programs_dir();
        if !dir.exists() {
            return Ok(vec![]);
        }
        let mut names: Vec<String> = fs::read_dir(&dir)?
            .filter_map(|entry| {
                let entry = entry.ok()?;
                let name = entry.file_name().to_string_lossy().to_string();
                name.strip_suffix(".json")
                    .filter(|n| !n.starts_with('.'))
                    .map(|n| n.to_string())
            })
            .collect();
        names.sort();
        Ok(names)
    }

    /// False for names that could never be saved.
    pub fn program_exists(&self, name: &str) -> bool {
        validate_program_name(name).is_ok() && self.program_path(name).exists()
    }

    pub fn read_program(&self, name: &str) -> Result<Program> {
        validate_program_name(name)?;
        let path = self.program_path(name);
        if !path.exists() {
            return Err(Error::NotFound(name.to_string()));
        }
        let raw = fs::read_to_string(&path)?;
        let program: Program = serde_json::from_str(&raw)?;
        if program.version != PROGRAM_VERSION {
            return Err(Error::UnsupportedVersion {
                found: program.version,
                expected: PROGRAM_VERSION,
            });
        }
        Ok(program)
    }

    pub fn write_program(&self, name: &str, program: &Program) -> Result<()> {
        validate_program_name(name)?;
        let json = serde_json::to_string_pretty(program)?;
        write_atomic(&self.programs_dir(), &format!("{}.json", name), &json)?;
        tracing::debug!(program = name, "program saved");
        Ok(())
    }

    /// Delete a program by name. Missing programs are not an error.
    pub fn delete_program(&self, name: &str) -> Result<()> {
        validate_program_name(name)?;
        let path = self.program_path(name);
        if path.exists() {
            fs::remove_file(&path)?;
        }
        Ok(())
    }
}

/// Write via temp file + rename so readers never see a half-written document.
fn write_atomic(dir: &Path, file_name: &str, data: &str) -> Result<()> {
    fs::create_dir_all(dir)?;
    let tmp = dir.join(format!(".{}.tmp", file_name));
    fs::write(&tmp, data)?;
    fs::rename(&tmp, dir.join(file_name))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solved_session() -> (Transcript, SessionOutcome) {
        let mut transcript = Transcript::new();
        transcript.push("Is the person alive?", true);
        transcript.push("Is it Taylor Swift?", true);
        let outcome = SessionOutcome {
            solved: true,
            final_question: "Is it Taylor Swift?".into(),
            rounds: 2,
        };
        (transcript, outcome)
    }

    #[test]
    fn transcript_keeps_histories_aligned() {
        let mut t = Transcript::new();
        assert!(t.is_empty());
        t.push("Is the person an athlete?", false);
        t.push("Is the person a musician?", true);

        assert_eq!(t.len(), 2);
        assert_eq!(t.questions().len(), t.answers().len());
        assert_eq!(
            t.questions(),
            vec!["Is the person an athlete?", "Is the person a musician?"]
        );
        assert_eq!(t.answers(), vec![false, true]);
        assert_eq!(t.without_last().len(), 1);
        assert_eq!(Transcript::new().without_last().len(), 0);
    }

    #[test]
    fn transcript_serializes_as_turn_list() {
        let mut t = Transcript::new();
        t.push("Is the person fictional?", false);
        let json = serde_json::to_value(&t).unwrap();
        assert_eq!(
            json,
            serde_json::json!([{ "question": "Is the person fictional?", "answer": false }])
        );
    }

    #[test]
    fn record_session_only_keeps_solved_games() {
        let (transcript, outcome) = solved_session();
        let mut program = Program::default();

        assert!(program.record_session("Taylor Swift", &transcript, &outcome, Some("Quick.")));
        assert_eq!(program.generator.demos.len(), 1);
        let demo = &program.generator.demos[0];
        assert_eq!(demo.history.len(), 1);
        assert!(demo.output.guess_made);
        assert_eq!(demo.output.question, "Is it Taylor Swift?");
        assert_eq!(program.reflector.demos[0].concept, "Taylor Swift");

        let failed = SessionOutcome {
            solved: false,
            ..outcome.clone()
        };
        assert!(!program.record_session("Taylor Swift", &transcript, &failed, Some("Slow.")));
        assert_eq!(program.generator.demos.len(), 1);

        assert!(program.record_session("Taylor Swift", &transcript, &outcome, None));
        assert_eq!(program.generator.demos.len(), 2);
        assert_eq!(program.reflector.demos.len(), 1);
    }

    #[test]
    fn program_round_trips_through_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(dir.path());
        let (transcript, outcome) = solved_session();
        let mut program = Program::default();
        program.record_session("Taylor Swift", &transcript, &outcome, Some("Good narrowing."));

        store.write_program("celebs", &program).unwrap();
        assert!(store.program_exists("celebs"));
        assert_eq!(store.read_program("celebs").unwrap(), program);
        assert_eq!(store.list_programs().unwrap(), vec!["celebs".to_string()]);

        store.delete_program("celebs").unwrap();
        assert!(store.list_programs().unwrap().is_empty());
        store.delete_program("celebs").unwrap();
    }

    #[test]
    fn missing_program_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(dir.path());
        assert!(matches!(store.read_program("nope"), Err(Error::NotFound(_))));
    }

    #[test]
    fn unknown_program_version_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(dir.path());
        let mut program = Program::default();
        program.version = 7;
        store.write_program("future", &program).unwrap();

        match store.read_program("future") {
            Err(Error::UnsupportedVersion { found, expected }) => {
                assert_eq!(found, 7);
                assert_eq!(expected, PROGRAM_VERSION);
            }
            other => panic!("expected version error, got {other:?}"),
        }
    }

    #[test]
    fn program_optional_fields_default() {
        let raw = r#"{
            "version": 1,
            "generator": { "instructions": "ask" },
            "reflector": { "instructions": "review", "chainOfThought": true }
        }"#;
        let program: Program = serde_json::from_str(raw).unwrap();
        assert!(!program.generator.chain_of_thought);
        assert!(program.generator.demos.is_empty());
        assert!(program.reflector.chain_of_thought);
    }

    #[test]
    fn program_names_are_validated() {
        assert!(validate_program_name("celebs_v2-final").is_ok());
        assert!(validate_program_name("").is_err());
        assert!(validate_program_name("../etc").is_err());
        assert!(validate_program_name("has space").is_err());
    }

    #[test]
    fn program_exists_is_false_for_invalid_names() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(dir.path());
        fs::write(dir.path().join("escaped.json"), "{}").unwrap();
        assert!(!store.program_exists("../escaped"));
        assert!(!store.program_exists(""));
    }

    #[test]
    fn settings_default_when_missing_or_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(dir.path());
        let settings = store.read_settings();
        assert_eq!(settings.max_rounds, DEFAULT_MAX_ROUNDS);
        assert!(settings.program.is_none());

        fs::write(dir.path().join("settings.json"), "{ not json").unwrap();
        assert_eq!(store.read_settings(), Settings::default());
    }

    #[test]
    fn settings_round_trip_and_fill_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(dir.path());
        let mut settings = Settings::default();
        settings.ai.provider = "openai".into();
        settings.ai.model = "gpt-4o-mini".into();
        settings.max_rounds = 12;
        store.write_settings(&settings).unwrap();
        assert_eq!(store.read_settings(), settings);

        fs::write(
            dir.path().join("settings.json"),
            r#"{ "ai": { "provider": "ollama", "apiKey": "", "model": "llama3" } }"#,
        )
        .unwrap();
        let partial = store.read_settings();
        assert_eq!(partial.max_rounds, DEFAULT_MAX_ROUNDS);
        assert!(ai_configured(&partial.ai));
    }

    #[test]
    fn api_key_override_ignores_blank_values() {
        let ai = AiSettings {
            provider: "openai".into(),
            api_key: "stored".into(),
            model: "gpt-4o".into(),
            ..Default::default()
        };
        assert_eq!(ai.clone().with_api_key_override(None).api_key, "stored");
        assert_eq!(
            ai.clone().with_api_key_override(Some("  ".into())).api_key,
            "stored"
        );
        assert_eq!(
            ai.with_api_key_override(Some("from-env".into())).api_key,
            "from-env"
        );
    }

    #[test]
    fn ai_configured_requires_key_except_for_ollama() {
        let mut ai = AiSettings {
            provider: "anthropic".into(),
            model: "claude".into(),
            ..Default::default()
        };
        assert!(!ai_configured(&ai));
        ai.api_key = "k".into();
        assert!(ai_configured(&ai));
        ai.provider = "ollama".into();
        ai.api_key.clear();
        assert!(ai_configured(&ai));
    }
}
