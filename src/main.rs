use std::io::{self, IsTerminal};
use std::sync::Arc;

use fluxgen::logger::{self, LogLevel, LoggerConfig};
use fluxgen::{
    Config, DirectorySaver, GenerationStore, ImageClient, RecordId, StoreSnapshot, Studio,
    TerminalPreview,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;

#[derive(Debug, PartialEq)]
enum Command {
    Generate(String),
    List,
    Show(RecordId),
    Close,
    Save(RecordId),
    Status,
    Help,
    Quit,
    Unknown(String),
}

impl Command {
    fn parse(line: &str) -> Command {
        let trimmed = line.trim();
        let Some(rest) = trimmed.strip_prefix(':') else {
            return Command::Generate(line.to_string());
        };

        let mut parts = rest.split_whitespace();
        let name = parts.next().unwrap_or_default();
        let id = parts.next().and_then(|s| s.parse().ok()).map(RecordId);

        match (name, id) {
            ("list" | "ls", _) => Command::List,
            ("show", Some(id)) => Command::Show(id),
            ("close", _) => Command::Close,
            ("save", Some(id)) => Command::Save(id),
            ("status", _) => Command::Status,
            ("help" | "h", _) => Command::Help,
            ("quit" | "q" | "exit", _) => Command::Quit,
            _ => Command::Unknown(trimmed.to_string()),
        }
    }
}

fn print_help() {
    println!("Type a prompt and press enter to generate an image.");
    println!("  :list         show generated images, newest first");
    println!("  :show <id>    open the full-size preview");
    println!("  :close        close the preview");
    println!("  :save <id>    download an image as PNG");
    println!("  :status       show whether a generation is running");
    println!("  :quit         exit");
}

fn print_history(snapshot: &StoreSnapshot) {
    if snapshot.history.is_empty() {
        println!("(no images yet)");
        return;
    }
    for record in &snapshot.history {
        println!(
            "  #{:<4} {}  {}",
            record.id(),
            record.created_at().format("%H:%M:%S"),
            record.prompt()
        );
    }
}

fn print_status(snapshot: &StoreSnapshot) {
    match &snapshot.pending_prompt {
        Some(prompt) => println!("⏳ Generating: {}", prompt),
        None => println!("Idle, {} image(s) in history", snapshot.history.len()),
    }
    if let Some(error) = &snapshot.last_error {
        println!("Last error: {}", error);
    }
}

/// Prints a line whenever a generation starts, finishes or fails.
async fn report_updates(mut updates: watch::Receiver<StoreSnapshot>) {
    let mut was_busy = false;
    let mut seen = 0;

    while updates.changed().await.is_ok() {
        let snapshot = updates.borrow_and_update().clone();

        if snapshot.busy && !was_busy {
            println!("⏳ Generating...");
        } else if !snapshot.busy && was_busy {
            if snapshot.history.len() > seen {
                if let Some(record) = snapshot.history.first() {
                    println!(
                        "🖼️  #{} ready ({}); :show {} or :save {}",
                        record.id(),
                        record.image().mime_type(),
                        record.id(),
                        record.id()
                    );
                }
            } else if let Some(error) = &snapshot.last_error {
                println!("❌ {}", error.notice());
            } else {
                println!("Generation cancelled");
            }
        }

        was_busy = snapshot.busy;
        seen = snapshot.history.len();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let dotenv_loaded = dotenv::dotenv().is_ok();
    let config = Config::from_env();

    let mut logger_config = LoggerConfig::new()
        .with_level(config.log_level.unwrap_or(LogLevel::Warn))
        .with_colors(io::stderr().is_terminal())
        .with_json_output(config.log_json);
    if let Some(path) = &config.log_file {
        logger_config = logger_config.with_file_output(path);
    }
    logger::init_with_config(logger_config)?;

    if dotenv_loaded {
        log::info!("✅ .env file loaded successfully");
    } else {
        log::warn!("⚠️  No .env file found, using system environment variables");
    }
    logger::log_startup_info(env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
    logger::log_config_info(&config);

    if config.together.api_key.is_none() {
        log::warn!("⚠️  TOGETHER_API_KEY is not set; generations will fail until it is");
    }

    let client = ImageClient::new(config.together.clone())?;
    let store = GenerationStore::new(Arc::new(client));
    let mut studio = Studio::new(
        store.clone(),
        DirectorySaver::new(config.download_dir()),
        TerminalPreview,
    );

    tokio::spawn(report_updates(store.subscribe()));
    print_help();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match Command::parse(&line) {
            Command::Generate(prompt) => {
                if studio.store().is_busy() {
                    println!("A generation is already running, please wait.");
                } else {
                    studio.on_submit(&prompt);
                }
            }
            Command::List => print_history(&studio.store().snapshot()),
            Command::Show(id) => {
                if studio.on_select_for_preview(Some(id)).is_none() {
                    println!("No image #{}", id);
                }
            }
            Command::Close => {
                studio.on_select_for_preview(None);
            }
            Command::Save(id) => match studio.on_download(id) {
                Ok(path) => println!("💾 Saved to {}", path.display()),
                Err(e) => println!("❌ {}", e),
            },
            Command::Status => print_status(&studio.store().snapshot()),
            Command::Help => print_help(),
            Command::Quit => break,
            Command::Unknown(input) => println!("Unknown command {:?}, try :help", input),
        }
    }

    if store.is_busy() {
        log::info!("Exiting with a generation still running; it will be dropped");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(
            Command::parse("  a red fox in snow "),
            Command::Generate("  a red fox in snow ".into())
        );
        assert_eq!(Command::parse(":list"), Command::List);
        assert_eq!(Command::parse(" :show 3"), Command::Show(RecordId(3)));
        assert_eq!(Command::parse(":save 12"), Command::Save(RecordId(12)));
        assert_eq!(Command::parse(":close"), Command::Close);
        assert_eq!(Command::parse(":q"), Command::Quit);
        assert_eq!(Command::parse(":save"), Command::Unknown(":save".into()));
        assert_eq!(Command::parse(":show x"), Command::Unknown(":show x".into()));
        assert_eq!(Command::parse(":dance"), Command::Unknown(":dance".into()));
    }
}
