use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;

use artfolio::api::ApiClient;
use artfolio::audio::{AudioPollOptions, PollOutcome};
use artfolio::{CollectionService, Config, Database, MediaStore};

struct Args {
    config_path: Option<PathBuf>,
    command: Command,
}

enum Command {
    Add { image: PathBuf },
    List,
    Show { id: String },
    Ask { id: String, question: String },
    Like { id: String },
    Delete { id: String },
    WaitAudio { id: String },
}

fn parse_args() -> Args {
    let args: Vec<String> = std::env::args().collect();
    let mut config_path = None;
    let mut positional: Vec<String> = Vec::new();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("artfolio {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                } else {
                    eprintln!("Error: --config requires a path argument");
                    std::process::exit(1);
                }
            }
            other => positional.push(other.to_string()),
        }
        i += 1;
    }

    let command = match parse_command(&positional) {
        Some(cmd) => cmd,
        None => {
            print_help();
            std::process::exit(1);
        }
    };

    Args {
        config_path,
        command,
    }
}

fn parse_command(positional: &[String]) -> Option<Command> {
    let (name, rest) = positional.split_first()?;
    match (name.as_str(), rest) {
        ("add", [image]) => Some(Command::Add {
            image: PathBuf::from(image),
        }),
        ("list", []) => Some(Command::List),
        ("show", [id]) => Some(Command::Show { id: id.clone() }),
        ("ask", [id, question @ ..]) if !question.is_empty() => Some(Command::Ask {
            id: id.clone(),
            question: question.join(" "),
        }),
        ("like", [id]) => Some(Command::Like { id: id.clone() }),
        ("delete", [id]) => Some(Command::Delete { id: id.clone() }),
        ("wait-audio", [id]) => Some(Command::WaitAudio { id: id.clone() }),
        _ => None,
    }
}

fn print_help() {
    println!(
        r#"artfolio - local art collection companion

USAGE:
    artfolio [OPTIONS] <COMMAND>

COMMANDS:
    add <image>          Recognize a captured image and add it to the collection
    list                 List the collection, newest first
    show <id>            Show one artwork and its chat history
    ask <id> <question>  Ask a follow-up question about an artwork
    like <id>            Toggle the liked flag
    delete <id>          Delete an artwork, its chat history and media copies
    wait-audio <id>      Wait for the description audio and store it locally

OPTIONS:
    --config, -c PATH   Path to config file
    --version, -V       Show version
    --help, -h          Show this help message

ENVIRONMENT:
    ARTFOLIO_LOG        Log level (trace, debug, info, warn, error)

Config file location: $XDG_CONFIG_HOME/artfolio/config.toml"#
    );
}

fn main() -> Result<()> {
    let args = parse_args();

    let _ = artfolio::logging::init(Some(Config::config_dir().join("logs")));

    let config = match &args.config_path {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    let db = Database::open(&config.db_path)?;
    db.initialize()?;

    let api = Arc::new(ApiClient::new(&config.api)?);
    let store = MediaStore::new(&config.storage);
    let service = CollectionService::new(db, api, store);

    match args.command {
        Command::Add { image } => {
            let artwork = service.add_from_capture(&image)?;
            println!("{}  {} - {} ({})", artwork.id, artwork.title, artwork.artist, artwork.museum_name);
            if let Some(description) = &artwork.description {
                println!("\n{description}");
            }
        }
        Command::List => {
            for artwork in service.artworks()? {
                let liked = if artwork.liked { " *" } else { "" };
                println!("{}  {} - {}{}", artwork.id, artwork.title, artwork.artist, liked);
            }
        }
        Command::Show { id } => {
            let Some(artwork) = service.artwork(&id)? else {
                eprintln!("artwork not found: {id}");
                std::process::exit(1);
            };
            println!("{} - {} ({})", artwork.title, artwork.artist, artwork.museum_name);
            if let Some(description) = &artwork.description {
                println!("\n{description}\n");
            }
            for message in service.history(&id)? {
                println!("[{}] {}", message.role.as_str(), message.text);
            }
        }
        Command::Ask { id, question } => {
            let reply = service.ask(&id, &question)?;
            println!("{}", reply.text);
            if let Some(audio) = &reply.audio_path {
                println!("(audio saved to {audio})");
            }
        }
        Command::Like { id } => {
            let liked = service.toggle_liked(&id)?;
            println!("{}", if liked { "liked" } else { "unliked" });
        }
        Command::Delete { id } => {
            service.delete(&id)?;
            println!("deleted {id}");
        }
        Command::WaitAudio { id } => {
            let options = AudioPollOptions::from_config(&config.audio);
            match service.wait_for_audio(&id, options)? {
                PollOutcome::Succeeded(path) => println!("audio saved to {}", path.display()),
                PollOutcome::TimedOut => {
                    eprintln!("timed out waiting for audio");
                    std::process::exit(1);
                }
                PollOutcome::Cancelled => {
                    eprintln!("polling cancelled");
                    std::process::exit(1);
                }
            }
        }
    }

    Ok(())
}
