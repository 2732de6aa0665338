// SPDX-License-Identifier: MIT

//! Visor CLI: serve the catalog UI, bulk-rename to canonical filenames, and
//! manage the store and the rename history.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use visor::config::AppConfig;
use visor::db::Catalog;
use visor::history::{History, UndoOutcome};
use visor::naming::{canonical_base_name, commit_rename, extension_of, resolve_unique_name, RenameOutcome};
use visor::search::{prepare_image, suggest_or_empty, SuggestionProvider, VisualSearchClient};
use visor::web::AppState;
use visor::{Result, VisorError};

const HISTORY_FILE: &str = "visor_history.jsonl";

/// Visor CLI - image catalog with canonical renaming
#[derive(Parser, Debug)]
#[command(name = "visor")]
#[command(version)]
#[command(about = "Image catalog with canonical renaming and metadata suggestions", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (JSON format)
    #[arg(short, long, default_value = "config.json", global = true)]
    config: PathBuf,

    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress non-essential output (quiet mode)
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the gallery web UI
    Serve {
        /// Host to bind to (overrides config)
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Rename all files with complete metadata to their canonical form
    Rename {
        /// Show changes without moving files
        #[arg(long)]
        dry_run: bool,
    },

    /// Query the suggestion service for a single image
    Suggest {
        /// Image file to look up
        path: PathBuf,
    },

    /// Show catalog and configuration status
    Status,

    /// Database operations
    Db {
        #[command(subcommand)]
        action: DbCommands,
    },

    /// History and undo operations
    History {
        #[command(subcommand)]
        action: HistoryCommands,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },

    /// Initialize a new Visor project
    Init {
        /// Directory to initialize (default: current)
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// Force overwrite existing configuration
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand, Debug)]
enum DbCommands {
    /// Show catalog statistics
    Stats,

    /// Export all records to JSON
    Export {
        /// Output file
        output: PathBuf,
    },

    /// Vacuum database (reclaim space)
    Vacuum,
}

#[derive(Subcommand, Debug)]
enum HistoryCommands {
    /// List recent rename entries
    List {
        /// Number of entries to show
        #[arg(long, default_value = "10")]
        count: usize,
    },

    /// Undo recent renames (restores file and store key)
    Undo {
        /// Number of renames to undo
        #[arg(long, default_value = "1")]
        count: usize,

        /// Dry run (show what would be undone)
        #[arg(long)]
        dry_run: bool,
    },

    /// Clear all history
    Clear {
        /// Skip confirmation prompt
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Show current configuration
    Show,

    /// Generate default configuration file
    Generate {
        /// Output file path
        #[arg(short, long, default_value = "config.json")]
        output: PathBuf,
    },

    /// Validate configuration file
    Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "warn"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let config = AppConfig::load(&cli.config)?;

    match cli.command {
        Some(Commands::Serve { host, port }) => run_serve(config, host, port).await,
        Some(Commands::Rename { dry_run }) => run_rename(config, dry_run),
        Some(Commands::Suggest { path }) => run_suggest(config, path).await,
        Some(Commands::Status) => run_status(config),
        Some(Commands::Db { action }) => run_db_command(config, action),
        Some(Commands::History { action }) => run_history_command(config, action),
        Some(Commands::Config { action }) => run_config_command(config, action, &cli.config),
        Some(Commands::Init { dir, force }) => run_init(dir, force),
        None => run_serve(config, None, None).await,
    }
}

/// Start the web UI
async fn run_serve(mut config: AppConfig, host: Option<String>, port: Option<u16>) -> Result<()> {
    if let Some(host) = host {
        config.web.host = host;
    }
    if let Some(port) = port {
        config.web.port = port;
    }

    let images_dir = Path::new(&config.images_dir);
    if !images_dir.is_dir() {
        return Err(VisorError::Config(format!(
            "Image directory {:?} does not exist. Run: visor init",
            images_dir
        )));
    }

    let db = Catalog::open(&config.database.path)?;
    info!("Database: {}", config.database.path);

    let provider: Box<dyn SuggestionProvider> = Box::new(VisualSearchClient::from_config(&config.search));
    let history = History::new(PathBuf::from(HISTORY_FILE));

    let state = Arc::new(AppState {
        db,
        config,
        provider,
        history,
    });

    visor::web::start_server(state).await
}

/// Bulk rename: every record with title and author gets its canonical name
fn run_rename(config: AppConfig, dry_run: bool) -> Result<()> {
    let db = Catalog::open(&config.database.path)?;
    let history = History::new(PathBuf::from(HISTORY_FILE));
    let images_dir = Path::new(&config.images_dir);

    if dry_run {
        warn!("DRY RUN MODE - files will not be renamed");
    }

    let mut moved = 0usize;
    let mut skipped = 0usize;

    for record in db.list()? {
        if dry_run {
            let Some(base) = canonical_base_name(&record) else {
                skipped += 1;
                continue;
            };
            let ext = extension_of(&record.filename);
            let new_name = resolve_unique_name(&base, ext, images_dir, &record.filename);
            if new_name == record.filename {
                skipped += 1;
            } else {
                println!("DRY-RUN  {}  ->  {}", record.filename, new_name);
                moved += 1;
            }
            continue;
        }

        let old_name = record.filename.clone();
        match commit_rename(&db, images_dir, record) {
            Ok((RenameOutcome::Renamed { from, to }, saved)) => {
                let outcome = RenameOutcome::Renamed { from, to: to.clone() };
                if let Err(e) = history.record(images_dir, &outcome, &saved.title, &saved.author) {
                    warn!("Failed to write history entry: {}", e);
                }
                println!("{}  ->  {}", old_name, to);
                moved += 1;
            }
            Ok((RenameOutcome::Unchanged, _)) => skipped += 1,
            Err(VisorError::MissingSourceFile(path)) => {
                eprintln!("File missing: {}", path.display());
                skipped += 1;
            }
            Err(e) => return Err(e),
        }
    }

    println!("Finished. Moved {}, skipped {}.", moved, skipped);
    Ok(())
}

/// Query the suggestion service for one image and print the result
async fn run_suggest(config: AppConfig, path: PathBuf) -> Result<()> {
    let client = VisualSearchClient::from_config(&config.search);
    let image = prepare_image(&path)?;

    let suggestion = suggest_or_empty(&client, &image).await;
    if suggestion.is_empty() {
        println!("No suggestion available for {:?}", path);
    } else {
        println!("{}", serde_json::to_string_pretty(&suggestion)?);
    }
    Ok(())
}

/// Print catalog and configuration status
fn run_status(config: AppConfig) -> Result<()> {
    println!("Visor Status");
    println!("============");

    let images_dir = Path::new(&config.images_dir);
    match visor::gallery::list_images(images_dir, &config.extensions) {
        Ok(files) => println!("Images in {:?}: {}", images_dir, files.len()),
        Err(e) => println!("Images in {:?}: error - {}", images_dir, e),
    }

    match Catalog::open(&config.database.path) {
        Ok(db) => {
            let stats = db.stats()?;
            println!("\nDatabase ({}):", config.database.path);
            println!("  Records: {}", stats.record_count);
            println!("  Complete (title + author): {}", stats.complete_count);
            println!("  Tags: {}", stats.tag_count);
        }
        Err(e) => println!("\nDatabase: error - {}", e),
    }

    let key_set = std::env::var(&config.search.api_key_env)
        .map(|v| !v.is_empty())
        .unwrap_or(false);
    println!("\nSuggestion service:");
    println!("  Endpoint: {}", config.search.endpoint);
    println!(
        "  API key (${}): {}",
        config.search.api_key_env,
        if key_set { "set" } else { "not set" }
    );

    Ok(())
}

/// Run database commands
fn run_db_command(config: AppConfig, action: DbCommands) -> Result<()> {
    let db = Catalog::open(&config.database.path)?;

    match action {
        DbCommands::Stats => {
            let stats = db.stats()?;
            println!("Catalog Statistics:");
            println!("  Records: {}", stats.record_count);
            println!("  Complete: {}", stats.complete_count);
            println!("  Tags: {}", stats.tag_count);
        }
        DbCommands::Export { output } => {
            let records = db.list()?;
            let json = serde_json::to_string_pretty(&records)?;
            std::fs::write(&output, json)?;
            println!("Exported {} records to {:?}", records.len(), output);
        }
        DbCommands::Vacuum => {
            db.vacuum()?;
            println!("Database vacuumed successfully");
        }
    }

    Ok(())
}

/// Run history commands
fn run_history_command(config: AppConfig, action: HistoryCommands) -> Result<()> {
    let history = History::new(PathBuf::from(HISTORY_FILE));

    match action {
        HistoryCommands::List { count } => {
            let entries = history.get_recent(count)?;
            println!("Recent history ({} entries):", entries.len());
            for entry in entries {
                let status = if entry.undone { "[UNDONE]" } else { "" };
                println!(
                    "  {} {} -> {} {}",
                    entry.timestamp.format("%Y-%m-%d %H:%M"),
                    entry.old_name,
                    entry.new_name,
                    status
                );
            }
        }
        HistoryCommands::Undo { count, dry_run } => {
            let db = Catalog::open(&config.database.path)?;
            let entries = history.get_undoable()?;
            let to_undo: Vec<_> = entries.into_iter().rev().take(count).collect();

            if to_undo.is_empty() {
                println!("No renames to undo");
                return Ok(());
            }

            for entry in to_undo {
                if dry_run {
                    if entry.directory.join(&entry.new_name).exists() {
                        println!("Would undo: {} -> {}", entry.new_name, entry.old_name);
                    }
                    continue;
                }

                match history.undo(&db, &entry)? {
                    UndoOutcome::Restored => {
                        println!("Undone: {} -> {}", entry.new_name, entry.old_name);
                    }
                    UndoOutcome::SourceMissing => {
                        warn!(
                            "File not found (may have been moved or deleted): {:?}",
                            entry.directory.join(&entry.new_name)
                        );
                    }
                    UndoOutcome::DestinationOccupied => {
                        eprintln!(
                            "Skipped {}: {} already exists",
                            entry.new_name, entry.old_name
                        );
                    }
                }
            }
        }
        HistoryCommands::Clear { force } => {
            if !force {
                eprintln!("Use --force to confirm clearing history");
                return Ok(());
            }
            history.clear()?;
            println!("History cleared");
        }
    }

    Ok(())
}

/// Run config commands
fn run_config_command(config: AppConfig, action: ConfigCommands, config_path: &Path) -> Result<()> {
    match action {
        ConfigCommands::Show => {
            let json = serde_json::to_string_pretty(&config)?;
            println!("{}", json);
        }
        ConfigCommands::Generate { output } => {
            let default_config = AppConfig::default();
            default_config.save(&output)?;
            println!("Generated config at {:?}", output);
        }
        ConfigCommands::Validate => {
            println!("Configuration at {:?} is valid", config_path);
            println!("  Images: {}", config.images_dir);
            println!("  Database: {}", config.database.path);
            println!("  Web: {}:{}", config.web.host, config.web.port);
        }
    }

    Ok(())
}

/// Initialize a new Visor project
fn run_init(dir: Option<PathBuf>, force: bool) -> Result<()> {
    let target = dir.unwrap_or_else(|| PathBuf::from("."));
    let config_path = target.join("config.json");

    if config_path.exists() && !force {
        return Err(VisorError::Config(
            "config.json already exists. Use --force to overwrite".to_string(),
        ));
    }

    let images_dir = target.join("images");
    std::fs::create_dir_all(&images_dir)?;

    let mut config = AppConfig::default();
    config.images_dir = images_dir.to_string_lossy().to_string();
    config.save(&config_path)?;

    println!("Visor initialized in {:?}", target);
    println!("\nCreated:");
    println!("  - config.json");
    println!("  - images/");
    println!("\nNext steps:");
    println!("  1. Copy images into images/");
    println!("  2. Start the UI: visor serve");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_defaults_parse() {
        let cli = Cli::try_parse_from(["visor"]).unwrap();
        assert!(!cli.verbose);
        assert!(cli.command.is_none());
    }

    #[test]
    fn cli_rename_command() {
        let cli = Cli::try_parse_from(["visor", "rename", "--dry-run"]).unwrap();
        match cli.command {
            Some(Commands::Rename { dry_run }) => assert!(dry_run),
            _ => panic!("Expected Rename command"),
        }
    }

    #[test]
    fn cli_serve_overrides() {
        let cli = Cli::try_parse_from(["visor", "serve", "--port", "9000"]).unwrap();
        match cli.command {
            Some(Commands::Serve { port, host }) => {
                assert_eq!(port, Some(9000));
                assert!(host.is_none());
            }
            _ => panic!("Expected Serve command"),
        }
    }

    #[test]
    fn cli_history_undo_count() {
        let cli = Cli::try_parse_from(["visor", "history", "undo", "--count", "3"]).unwrap();
        match cli.command {
            Some(Commands::History {
                action: HistoryCommands::Undo { count, dry_run },
            }) => {
                assert_eq!(count, 3);
                assert!(!dry_run);
            }
            _ => panic!("Expected History Undo command"),
        }
    }
}
