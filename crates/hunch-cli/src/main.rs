mod logging;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use hunch_core::{ai_configured, validate_program_name, Program, Settings, Store, API_KEY_ENV};
use hunch_predict::{engine::providers, LlmPredictor, MAX_DEMOS};

use hunch_cli::{record_report, run_session, Console, SessionConfig};

#[derive(Parser)]
#[command(name = "hunch", version, about = "Think of someone famous and let an LLM guess who")]
struct Cli {
    /// Log debug output to the terminal
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Play a game (the default)
    Play(PlayArgs),
    /// Show or change stored settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
    /// Manage saved predictor programs
    Program {
        #[command(subcommand)]
        action: ProgramAction,
    },
}

#[derive(Args, Default)]
struct PlayArgs {
    /// Maximum number of questions
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    rounds: Option<u32>,
    /// Saved program to play with
    #[arg(long)]
    program: Option<String>,
    /// After a solved game, add it as a demo to this program
    #[arg(long)]
    record: Option<String>,
    /// LLM provider for this game only
    #[arg(long)]
    provider: Option<String>,
    /// Model for this game only
    #[arg(long)]
    model: Option<String>,
    /// Skip the post-game reflection
    #[arg(long)]
    no_reflect: bool,
}

#[derive(Subcommand)]
enum SettingsAction {
    Show,
    Set {
        #[arg(long)]
        provider: Option<String>,
        #[arg(long)]
        model: Option<String>,
        #[arg(long)]
        api_key: Option<String>,
        #[arg(long)]
        base_url: Option<String>,
        #[arg(long)]
        temperature: Option<f32>,
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
        rounds: Option<u32>,
        /// Program used when `play` is given none
        #[arg(long)]
        program: Option<String>,
    },
}

#[derive(Subcommand)]
enum ProgramAction {
    List,
    Show { name: String },
    /// Write a fresh program with the default instructions
    Init {
        name: String,
        #[arg(long)]
        force: bool,
    },
    Delete { name: String },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let store = Store::open_default();
    let _guard = logging::init_logging(&store.logs_dir(), cli.verbose)?;

    match cli.command.unwrap_or(Command::Play(PlayArgs::default())) {
        Command::Play(args) => play(&store, args).await,
        Command::Settings { action } => settings(&store, action),
        Command::Program { action } => program(&store, action),
    }
}

async fn play(store: &Store, args: PlayArgs) -> Result<()> {
    // Bad names fail before the game starts
    if let Some(name) = &args.record {
        validate_program_name(name)?;
    }
    let settings = store.read_settings();

    let mut ai = settings
        .ai
        .clone()
        .with_api_key_override(std::env::var(API_KEY_ENV).ok());
    if let Some(provider) = args.provider {
        ai.provider = provider;
    }
    if let Some(model) = args.model {
        ai.model = model;
    }
    if !ai_configured(&ai) {
        bail!(
            "no LLM configured: run `hunch settings set --provider <{}> --model <name> --api-key <key>` \
             or set {API_KEY_ENV}",
            providers().join("|")
        );
    }

    let max_rounds = args
        .rounds
        .map(|r| r as usize)
        .unwrap_or(settings.max_rounds);
    if max_rounds == 0 {
        bail!("maxRounds in settings must be at least 1");
    }

    let program = match args.program.as_ref().or(settings.program.as_ref()) {
        Some(name) => store
            .read_program(name)
            .with_context(|| format!("loading program '{name}'"))?,
        None => Program::default(),
    };

    tracing::info!(provider = %ai.provider, model = %ai.model, max_rounds, "starting game");
    let predictor = LlmPredictor::new(ai, program);
    let config = SessionConfig {
        max_rounds,
        reflect: !args.no_reflect,
    };

    println!("Think of a famous person. I'll ask up to {max_rounds} yes/no questions.");
    let mut console = Console::stdio();
    let report = run_session(&predictor, &predictor, &mut console, &config).await?;

    if let Some(name) = args.record {
        match record_report(store, &name, &report)
            .with_context(|| format!("recording into program '{name}'"))?
        {
            Some(demos) => {
                println!("Recorded game in program '{name}' ({demos} generator demos).")
            }
            None => println!("Game not solved, nothing recorded."),
        }
    }
    Ok(())
}

/// Masked view for `settings show`. Key presence and `configured` account
/// for the environment key, the same way `play` does.
fn settings_view(settings: &Settings, env_key: Option<String>) -> serde_json::Value {
    let effective = settings.ai.clone().with_api_key_override(env_key);
    serde_json::json!({
        "provider": settings.ai.provider,
        "model": settings.ai.model,
        "hasKey": !effective.api_key.is_empty(),
        "keyFromEnv": effective.api_key != settings.ai.api_key,
        "baseUrl": settings.ai.base_url,
        "temperature": settings.ai.temperature,
        "maxRounds": settings.max_rounds,
        "program": settings.program,
        "configured": ai_configured(&effective),
    })
}

fn settings(store: &Store, action: SettingsAction) -> Result<()> {
    let mut settings = store.read_settings();
    match action {
        SettingsAction::Show => {
            let view = settings_view(&settings, std::env::var(API_KEY_ENV).ok());
            println!("{}", serde_json::to_string_pretty(&view)?);
        }
        SettingsAction::Set {
            provider,
            model,
            api_key,
            base_url,
            temperature,
            rounds,
            program,
        } => {
            if let Some(provider) = provider {
                if !providers().contains(&provider.as_str()) {
                    bail!(
                        "unknown provider '{provider}', expected one of: {}",
                        providers().join(", ")
                    );
                }
                settings.ai.provider = provider;
            }
            if let Some(model) = model {
                settings.ai.model = model;
            }
            // Empty key means "keep existing"
            if let Some(key) = api_key.filter(|k| !k.is_empty()) {
                settings.ai.api_key = key;
            }
            if let Some(url) = base_url {
                settings.ai.base_url = Some(url).filter(|u| !u.is_empty());
            }
            if let Some(t) = temperature {
                settings.ai.temperature = Some(t);
            }
            if let Some(r) = rounds {
                settings.max_rounds = r as usize;
            }
            if let Some(name) = program {
                if name.is_empty() {
                    settings.program = None;
                } else {
                    validate_program_name(&name)?;
                    settings.program = Some(name);
                }
            }
            store.write_settings(&settings).context("saving settings")?;
            println!("Settings saved to {}", store.root().display());
        }
    }
    Ok(())
}

fn program(store: &Store, action: ProgramAction) -> Result<()> {
    match action {
        ProgramAction::List => {
            for name in store.list_programs()? {
                println!("{name}");
            }
        }
        ProgramAction::Show { name } => {
            let program = store.read_program(&name)?;
            println!("{}", serde_json::to_string_pretty(&program)?);
            let demos = program.generator.demos.len();
            println!(
                "\n{demos} generator demos ({} used in prompts), chain of thought: {}",
                demos.min(MAX_DEMOS),
                if program.generator.chain_of_thought { "on" } else { "off" }
            );
        }
        ProgramAction::Init { name, force } => {
            if store.program_exists(&name) && !force {
                bail!("program '{name}' already exists (use --force to overwrite)");
            }
            store.write_program(&name, &Program::default())?;
            println!("Wrote program '{name}'");
        }
        ProgramAction::Delete { name } => {
            store.delete_program(&name)?;
            println!("Deleted program '{name}'");
        }
    }
    Ok(())
}
