use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use voice_overlay::overlay::{OverlayEvent, OverlayService, PointerEvent};
use voice_overlay::{HistoryLog, Settings, SettingsProvider};

#[derive(Parser)]
#[command(name = "voice-overlay")]
#[command(about = "Voice capture, transcription and history engine")]
struct Args {
    /// Path to the settings file (TOML), without extension
    #[arg(short, long, default_value = "config/voice-overlay")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a scripted capture session against the synthetic backend
    Demo {
        /// Seconds of synthetic audio to capture
        #[arg(short, long, default_value = "2")]
        duration: u64,
    },
    /// Inspect or edit the transcription history log
    History {
        #[command(subcommand)]
        command: HistoryCommand,
    },
}

#[derive(Subcommand)]
enum HistoryCommand {
    /// List entries, newest first
    List {
        /// Case-insensitive substring filter
        #[arg(short, long)]
        search: Option<String>,
    },
    /// Delete the entry at the given position (0 = newest)
    Delete {
        index: usize,
    },
    /// Remove every entry from the log
    Clear,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    let settings = match Settings::load(&args.config) {
        Ok(settings) => settings,
        Err(e) => {
            warn!("Falling back to default settings: {}", e);
            Settings::default()
        }
    };
    info!("voice-overlay v{}", env!("CARGO_PKG_VERSION"));
    info!("Transcription mode: {}", settings.transcription.mode);
    info!("History log: {}", settings.history.log_path.display());

    let history = HistoryLog::new(&settings.history)?;

    match args.command {
        Command::Demo { duration } => run_demo(settings, history, duration).await,
        Command::History { command } => run_history(history, command),
    }
}

/// Drives the overlay actor through an open / record / close round trip
/// with synthetic audio, then prints what landed in history.
async fn run_demo(settings: Settings, history: HistoryLog, duration: u64) -> Result<()> {
    let provider = SettingsProvider::new(settings);
    let handle = OverlayService::spawn(provider, history.clone());

    let (x, y) = handle.snapshot().await.control_position;
    handle.send(OverlayEvent::Pointer(PointerEvent::Down { x, y }));
    handle.send(OverlayEvent::Pointer(PointerEvent::Up));

    let snapshot = handle.snapshot().await;
    info!("Editor open: {}", snapshot.editor.is_editor_open);
    info!("Status: {}", snapshot.editor.status);

    tokio::time::sleep(std::time::Duration::from_secs(duration)).await;
    let snapshot = handle.snapshot().await;
    info!("Status: {}", snapshot.editor.status);

    // No endpoint is configured in the demo, so stop-and-transcribe will
    // settle with a pipeline error instead of a transcript.
    handle.send(OverlayEvent::StopRecording);
    tokio::time::sleep(std::time::Duration::from_millis(250)).await;
    let snapshot = handle.snapshot().await;
    info!("Status: {}", snapshot.editor.status);

    handle.send(OverlayEvent::SetText("demo transcript".to_string()));
    handle.send(OverlayEvent::CloseEditor);
    handle.shutdown().await;

    for entry in history.list(None) {
        println!("{}  {}", entry.timestamp, entry.text);
    }
    Ok(())
}

fn run_history(history: HistoryLog, command: HistoryCommand) -> Result<()> {
    match command {
        HistoryCommand::List { search } => {
            let entries = history.list(search.as_deref());
            if entries.is_empty() {
                println!("No history entries");
            }
            for (i, entry) in entries.iter().enumerate() {
                println!("[{}] {}  {}", i, entry.timestamp, entry.text);
                if !entry.audio_path.is_empty() {
                    println!("    audio: {}", entry.audio_path);
                }
            }
        }
        HistoryCommand::Delete { index } => {
            let entries = history.list(None);
            match entries.get(index) {
                Some(entry) => {
                    if history.delete(entry)? {
                        println!("Deleted entry {}", index);
                    } else {
                        println!("Entry {} no longer present", index);
                    }
                }
                None => println!("No entry at index {}", index),
            }
        }
        HistoryCommand::Clear => {
            history.clear()?;
            println!("History cleared");
        }
    }
    Ok(())
}
