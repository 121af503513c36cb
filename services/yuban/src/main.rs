use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::fmt::time::ChronoLocal;
use yuban_core::language::{LanguageService, OfflineLanguageService};
use yuban_core::message::demo_conversation;
use yuban_core::session::{ChatSession, run_commands, run_speech_events};
use yuban_core::settings::UserSettings;
use yuban_core::voice::VoiceSynthesizer;
use yuban_service::config::{Config, SpeechBackend};
use yuban_service::gemini_adapter::GeminiLanguageService;
use yuban_service::prompt_loader::Prompts;
use yuban_service::repl::{self, ReplCommand};
use yuban_service::speech::Engine;

#[derive(Parser)]
#[command(version, about = "Spoken English practice partner in the terminal")]
struct Cli {
    /// Start with an empty conversation instead of the demo one
    #[arg(long)]
    empty: bool,

    /// Speech backend, overriding SPEECH_BACKEND
    #[arg(long, value_enum)]
    backend: Option<SpeechBackend>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load application configuration")?;

    // --- 2. Initialize Logging ---
    // Logs go to stderr so they don't interleave with the conversation on stdout.
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(ChronoLocal::rfc_3339())
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Configuration loaded successfully. Starting Yuban...");

    // --- 3. Parse Command-Line Arguments ---
    let args = Cli::parse();

    // --- 4. Load Prompts ---
    let prompts =
        Prompts::load(config.prompts_dir.as_deref()).context("Failed to load LLM prompts")?;

    // --- 5. Initialize the Language Service ---
    let language: Arc<dyn LanguageService> = match config.gemini_api_key {
        Some(key) => {
            let client_config = gemini_client::Config::builder()
                .with_base_url(&config.gemini_base_url)
                .with_api_key(key)
                .with_model(&config.chat_model)
                .build();
            tracing::info!("Using {} for conversation.", config.chat_model);
            Arc::new(GeminiLanguageService::new(
                gemini_client::GeminiClient::new(client_config),
                prompts,
            ))
        }
        None => {
            tracing::warn!("No GEMINI_API_KEY or API_KEY set; running offline with canned replies.");
            Arc::new(OfflineLanguageService)
        }
    };

    // --- 6. Speech Runtime ---
    let backend = args.backend.unwrap_or(config.speech_backend);
    let engine = Engine::for_backend(backend).await;
    tracing::info!("Speech backend: {}", engine.name());

    // Create the command channel to decouple core logic from the runtime.
    let (command_tx, command_rx) = tokio::sync::mpsc::channel::<yuban_core::Command>(32);
    let (event_tx, event_rx) = tokio::sync::mpsc::channel::<yuban_core::SpeechEvent>(32);

    let synthesizer = Arc::new(VoiceSynthesizer::new(engine, event_tx));
    let voices = synthesizer.refresh_voices().await;
    tracing::info!("{} synthesis voices available.", voices);

    let messages = if args.empty {
        Vec::new()
    } else {
        demo_conversation()
    };
    let session = ChatSession::new(language, UserSettings::default(), messages, command_tx);

    let command_handler = tokio::spawn(run_commands(synthesizer, command_rx));
    let event_handler = tokio::spawn(run_speech_events(session.clone(), event_rx));

    // --- 7. Terminal Loop ---
    let list = repl::execute(&session, ReplCommand::List).await?;
    if !list.is_empty() {
        println!("{list}");
    }
    println!("Type /help for commands.");

    let input = tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
            let command = match repl::parse_line(&line) {
                Ok(Some(command)) => command,
                Ok(None) => continue,
                Err(e) => {
                    println!("{e}");
                    continue;
                }
            };
            if command == ReplCommand::Quit {
                break;
            }

            let slow = command.is_slow();
            let session = session.clone();
            let run = async move {
                match repl::execute(&session, command).await {
                    Ok(out) if !out.is_empty() => println!("{out}"),
                    Ok(_) => {}
                    Err(e) => tracing::error!("Command failed: {:?}", e),
                }
            };
            // Slow commands run in the background so the prompt stays usable.
            if slow {
                tokio::spawn(run);
            } else {
                run.await;
            }
        }
        session.mute().await?;
        anyhow::Ok(())
    });

    tokio::select! {
        result = input => {
            result.context("Input task panicked")??;
        },
        _ = command_handler => {},
        _ = event_handler => {},
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received Ctrl-C, shutting down...");
        }
    }
    tracing::info!("Shutting down...");
    Ok(())
}
