use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use reminder_chat::classification::{apply_classifications, parse_classifications, ClassificationRequest};
use reminder_chat::config::AppConfig;
use reminder_chat::logging::{init_logging, OperationTimer};
use reminder_chat::schema::{categories, DEFAULT_PROJECT};
use reminder_chat::validation::InputValidator;
use reminder_chat::{chunk_text, Database, Message, MessageFields};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Extra configuration file layered over config/default and config/local
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Database file, overriding the configured path
    #[arg(short, long, global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database
    Init,
    /// Post a message
    Send {
        /// Message text
        #[arg(default_value = "")]
        message: String,

        /// Sender identity
        #[arg(short, long, default_value = "You")]
        sender: String,

        /// Target project
        #[arg(short, long, default_value = DEFAULT_PROJECT)]
        project: String,

        /// File to attach
        #[arg(short, long)]
        attach: Option<PathBuf>,
    },
    /// List messages
    List {
        /// Project to show
        #[arg(short, long, default_value = DEFAULT_PROJECT, conflicts_with = "all")]
        project: String,

        /// Show messages from every project
        #[arg(long)]
        all: bool,

        /// Show only the first N messages
        #[arg(short, long)]
        limit: Option<u32>,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Search message bodies
    Search {
        /// Substring to look for
        term: String,

        /// Restrict to one project
        #[arg(short, long)]
        project: Option<String>,
    },
    /// Delete a message
    Delete {
        /// Message id
        id: i64,
    },
    /// Move a message to a project, creating it if needed
    Move {
        /// Message id
        id: i64,

        /// Target project
        project: String,
    },
    /// List projects
    Projects,
    /// Create a project
    NewProject {
        /// Project name
        name: String,
    },
    /// Split a text file into chunks ("-" reads stdin)
    Chunk {
        /// Input file
        file: PathBuf,

        /// Context reserved in every chunk
        #[arg(short, long, default_value = "")]
        extra: String,

        /// Maximum chunk size in characters, context included
        #[arg(short, long)]
        size: Option<usize>,
    },
    /// List messages awaiting classification
    Unprocessed,
    /// Print the classifier payloads as JSON
    ClassifyContext,
    /// Apply a classifier answer read from a JSON file ("-" reads stdin)
    Apply {
        /// Answer file
        file: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = AppConfig::load_from(cli.config.as_deref())?;
    if let Some(path) = &cli.database {
        config.database.path = path.to_string_lossy().into_owned();
    }

    // Initialize logging
    let _log_guard = init_logging(&config.logging)?;
    info!("Starting reminder-chat");

    let open_db = || {
        Database::from_config(&config.database)
            .with_context(|| format!("Failed to open database at {}", config.database.path))
    };

    match cli.command {
        Commands::Chunk { file, extra, size } => {
            chunk_file(&file, &extra, size.unwrap_or(config.classification.chunk_size))?;
        }
        Commands::Init => {
            open_db()?.initialize()?;
            println!("Database ready at {}", config.database.path);
        }
        Commands::Send {
            message,
            sender,
            project,
            attach,
        } => send_message(&open_db()?, &sender, &message, &project, attach.as_deref())?,
        Commands::List {
            project,
            all,
            limit,
            json,
        } => {
            let scope = if all { None } else { Some(project.as_str()) };
            let messages = open_db()?.get_messages(scope, limit)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&messages)?);
            } else {
                print_messages(&messages);
            }
        }
        Commands::Search { term, project } => {
            let results = open_db()?.search_messages(&term, project.as_deref())?;
            for message in &results {
                println!("Project: {}", message.project);
                println!("Sender: {}", message.sender);
                println!("Message: {}", message.message);
                println!("{}", "-".repeat(50));
            }
            info!(term = %term, matches = results.len(), "search finished");
        }
        Commands::Delete { id } => {
            if !open_db()?.delete_message(id)? {
                bail!("No message with id {id}");
            }
            println!("Deleted message {id}");
        }
        Commands::Move { id, project } => {
            InputValidator::validate_project_name(&project)?;
            if !open_db()?.update_message_project(id, project.trim())? {
                bail!("No message with id {id}");
            }
            println!("Moved message {id} to {}", project.trim());
        }
        Commands::Projects => {
            for name in open_db()?.get_projects()? {
                println!("{name}");
            }
        }
        Commands::NewProject { name } => {
            InputValidator::validate_project_name(&name)?;
            if !open_db()?.create_project(name.trim())? {
                bail!("Project {} already exists", name.trim());
            }
            println!("Created project {}", name.trim());
        }
        Commands::Unprocessed => {
            for (i, message) in open_db()?.get_unprocessed_messages()?.iter().enumerate() {
                println!("{}. Project: {}", i + 1, message.project);
                println!("   Sender: {}", message.sender);
                println!("   Message: {}", message.message);
                println!();
            }
        }
        Commands::ClassifyContext => {
            let timer = OperationTimer::new("classify_context");
            let request = ClassificationRequest::build(&open_db()?, &config.classification)?;
            timer.finish();
            println!("{}", serde_json::to_string_pretty(&request)?);
        }
        Commands::Apply { file } => {
            let raw = read_input(&file)?;
            let items = parse_classifications(&raw).context("Failed to parse classifier answer")?;
            let summary = apply_classifications(&open_db()?, &items)?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
    }

    Ok(())
}

/// Post a message, attaching a file when given
fn send_message(db: &Database, sender: &str, text: &str, project: &str, attach: Option<&Path>) -> Result<()> {
    InputValidator::validate_sender(sender)?;
    InputValidator::validate_project_name(project)?;
    InputValidator::validate_message(text, attach)?;

    let mut text = InputValidator::sanitize_text(text);
    let mut fields = MessageFields::new()
        .category(categories::USER_MESSAGE)
        .project(project.trim());

    if let Some(path) = attach {
        InputValidator::validate_attachment(path)?;
        let absolute = std::fs::canonicalize(path)
            .with_context(|| format!("Failed to resolve attachment {}", path.display()))?;
        fields = fields.attachment(&absolute);

        if text.is_empty() {
            let kind = fields.message_type.unwrap_or_default();
            let name = absolute
                .file_name()
                .map_or_else(String::new, |n| n.to_string_lossy().into_owned());
            text = format!("Sent a {kind}: {name}");
        }
    }

    let id = db.insert_message(sender, &text, &fields)?;
    println!("Saved message {id}");
    Ok(())
}

fn print_messages(messages: &[Message]) {
    for message in messages {
        let stamp = message
            .timestamp
            .map(|t| t.format("%b %d, %Y %r").to_string())
            .unwrap_or_default();
        println!("[{}] {} {}: {}", message.id, stamp, message.sender, message.message);
        if message.has_attachment() {
            println!("      ({} attachment: {})", message.message_type, message.file_path);
        }
    }
}

fn chunk_file(file: &Path, extra: &str, size: usize) -> Result<()> {
    let text = read_input(file)?;
    let chunks = chunk_text(&text, extra, size)?;
    info!(chunks = chunks.len(), "chunked {}", file.display());

    for (i, chunk) in chunks.iter().enumerate() {
        println!("--- chunk {} ({} chars) ---", i + 1, chunk.char_len());
        println!("{chunk}");
    }
    Ok(())
}

fn read_input(file: &Path) -> Result<String> {
    if file == Path::new("-") {
        let mut buffer = String::new();
        std::io::stdin().read_to_string(&mut buffer)?;
        return Ok(buffer);
    }
    std::fs::read_to_string(file).with_context(|| format!("Failed to read {}", file.display()))
}
