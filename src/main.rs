mod config;
mod db;
mod dialog;
mod error;
mod models;
mod scrape;
mod shell;
mod store;
mod tui;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use config::Config;
use db::Database;
use dialog::Field;
use error::SaveError;
use models::{format_date, Position};
use scrape::PositionScraper;
use shell::Shell;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "jobstack")]
#[command(about = "Track job applications - positions, contacts, answers")]
struct Cli {
    /// Path to the config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Path to the positions database (overrides the config)
    #[arg(short, long, global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database
    Init,

    /// Open the interactive table (default)
    Tui,

    /// List positions
    List,

    /// Show position details
    Show {
        /// Position ID
        id: i64,
    },

    /// Scrape a job posting and add it as a new position
    Add {
        /// URL of the job posting
        url: String,
    },

    /// Delete a position
    Delete {
        /// Position ID
        id: i64,
    },

    /// Print all positions as JSON
    Export,

    /// Show what would be scraped from a job posting, without saving
    Scrape {
        /// URL of the job posting
        url: String,
    },
}

fn init_logging() -> Result<()> {
    let path = Config::log_path();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("Failed to open log file: {}", path.display()))?;

    // Log to a file so the terminal UI is left alone
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("jobstack=info".parse()?))
        .with_writer(std::sync::Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

fn open_shell(db: Database) -> Result<Shell<Database>> {
    let (shell, error) = Shell::start(db);
    match error {
        Some(e) => Err(e).context("Failed to load positions"),
        None => Ok(shell),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging()?;

    let config = Config::load(cli.config)?;
    let db_path = cli.database.unwrap_or_else(|| config.database_path());

    match cli.command.unwrap_or(Commands::Tui) {
        Commands::Init => {
            let db = Database::open(&db_path)?;
            println!("Database initialized at {}", db.path().display());
        }

        Commands::Tui => {
            let db = Database::open(&db_path)
                .with_context(|| format!("Failed to open database {}", db_path.display()))?;
            let scraper = PositionScraper::from_config(&config)?;
            let (shell, startup_error) = Shell::start(db);
            tui::run(shell, startup_error, scraper)?;
        }

        Commands::List => {
            let shell = open_shell(Database::open(&db_path)?)?;
            let positions = shell.store().positions();
            if positions.is_empty() {
                println!("No positions found.");
            } else {
                println!(
                    "{:<5} {:<12} {:<24} {:<28} {:<16} {:<10}",
                    "ID", "RESULT", "COMPANY", "JOB TITLE", "LOCATION", "SENT"
                );
                println!("{}", "-".repeat(100));
                for p in positions {
                    println!(
                        "{:<5} {:<12} {:<24} {:<28} {:<16} {:<10}",
                        p.id,
                        truncate(&p.result, 12),
                        truncate(&p.company, 24),
                        truncate(&p.job_title, 28),
                        truncate(&p.location, 16),
                        format_date(p.request_sent_date)
                    );
                }
            }
        }

        Commands::Show { id } => {
            let shell = open_shell(Database::open(&db_path)?)?;
            match shell.store().get(id) {
                Some(p) => print_position(p),
                None => println!("Position #{} not found.", id),
            }
        }

        Commands::Add { url } => {
            let mut shell = open_shell(Database::open(&db_path)?)?;
            let scraper = PositionScraper::from_config(&config)?;

            let mut dialog = shell.open_add();
            dialog.form_mut().set(Field::Web, url.as_str());
            dialog
                .handle_fill(shell.store(), &scraper)
                .context("Failed to fetch job posting, try again or add it in the TUI")?;

            match dialog.handle_save(shell.store_mut()) {
                Ok(position) => {
                    shell.save()?;
                    println!("Added position #{}", position.id);
                    print_position(&position);
                }
                Err(SaveError::Invalid(e)) => {
                    println!("Not added, these fields could not be filled from the page:");
                    println!("{}", e);
                    println!("\nAdd the position in the TUI to fill them manually.");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Commands::Delete { id } => {
            let mut shell = open_shell(Database::open(&db_path)?)?;
            shell
                .delete(id)
                .ok_or_else(|| anyhow!("Position #{} not found", id))?;
            shell.save()?;
            println!("Deleted position #{}", id);
        }

        Commands::Export => {
            let shell = open_shell(Database::open(&db_path)?)?;
            let json = serde_json::to_string_pretty(shell.store().positions())
                .context("Failed to serialize positions")?;
            println!("{}", json);
        }

        Commands::Scrape { url } => {
            let scraper = PositionScraper::from_config(&config)?;
            let position = scraper
                .fetch(0, &url)
                .with_context(|| format!("Failed to scrape {}", url))?;
            print_position(&position);
        }
    }

    Ok(())
}

fn print_position(p: &Position) {
    println!("Position #{}", p.id);
    let rows = [
        ("Result", p.result.clone()),
        ("Company", p.company.clone()),
        ("Job title", p.job_title.clone()),
        ("PDF", p.job_title_pdf.clone()),
        ("Location", p.location.clone()),
        ("Web", p.web.clone()),
        ("Person", p.person.clone()),
        ("Phone", p.phone.clone()),
        ("Email", p.email.clone()),
        ("Request sent", format_date(p.request_sent_date)),
        ("Answer", format_date(p.answer_date)),
    ];
    for (label, value) in rows {
        if !value.is_empty() {
            println!("{}: {}", label, value);
        }
    }
    if !p.conversation.is_empty() {
        println!("\n--- Conversation ---\n{}", p.conversation);
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
