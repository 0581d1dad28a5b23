//! PwVault CLI - Command line interface for password vaults.
//!
//! Every command opens the vault, performs one operation and locks it again.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;
use uuid::Uuid;
use zeroize::Zeroizing;

use pwvault_common::VaultPath;
use pwvault_storage::LocalProvider;
use pwvault_vault::{
    EntropyAnalyzer, PasswordAnalyzer, PasswordEntry, VaultConfig, VaultRepository,
};

#[derive(Parser)]
#[command(name = "pwvault")]
#[command(about = "PwVault - Encrypted password vault")]
#[command(version)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// JSON configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory holding vault files.
    #[arg(short, long, default_value = ".")]
    dir: PathBuf,

    /// Vault file name within the directory.
    #[arg(long, default_value = "vault.pwv")]
    vault: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Category {
    All,
    Favorites,
    Recent,
    Weak,
    Duplicates,
    Expiring,
    Notes,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new vault.
    Create {
        /// Database name.
        #[arg(short, long)]
        name: String,

        /// Free-form description.
        #[arg(long, default_value = "")]
        description: String,
    },

    /// Add an entry. The entry password is prompted for.
    Add {
        #[arg(short, long)]
        title: String,

        #[arg(short, long, default_value = "")]
        user: String,

        #[arg(long, default_value = "")]
        url: String,

        #[arg(long, default_value = "")]
        notes: String,

        /// Tag to attach; may be repeated.
        #[arg(long = "tag")]
        tags: Vec<String>,
    },

    /// List entries in a category.
    List {
        #[arg(value_enum, default_value = "all")]
        category: Category,
    },

    /// Search titles, user names, URLs, notes and tags.
    Search { query: String },

    /// Show one entry and record the access.
    Show {
        uuid: Uuid,

        /// Print the password instead of masking it.
        #[arg(long)]
        reveal: bool,
    },

    /// Change the master password.
    Passwd,

    /// Report weak, duplicate and expiring passwords.
    Audit,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = match &cli.config {
        Some(path) => VaultConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => VaultConfig::default(),
    };

    let provider = LocalProvider::new(&cli.dir).context("Failed to open vault directory")?;
    let repository = VaultRepository::new(Arc::new(provider), config);
    let path = VaultPath::parse(&cli.vault).context("Invalid vault name")?;

    match cli.command {
        Commands::Create { name, description } => {
            cmd_create(&repository, &path, &name, &description).await
        }

        Commands::Add {
            title,
            user,
            url,
            notes,
            tags,
        } => {
            let mut entry = PasswordEntry::new(title, chrono::Utc::now());
            entry.user_name = user;
            entry.url = url;
            entry.notes = notes;
            entry.tags = tags;
            cmd_add(&repository, &path, entry).await
        }

        Commands::List { category } => cmd_list(&repository, &path, category).await,

        Commands::Search { query } => cmd_search(&repository, &path, &query).await,

        Commands::Show { uuid, reveal } => cmd_show(&repository, &path, uuid, reveal).await,

        Commands::Passwd => cmd_passwd(&repository, &path).await,

        Commands::Audit => cmd_audit(&repository, &path).await,
    }
}

/// Prompt for password securely.
fn prompt_password(prompt: &str) -> Result<Zeroizing<String>> {
    let password = rpassword::prompt_password(prompt).context("Failed to read password")?;
    Ok(Zeroizing::new(password))
}

/// Prompt twice and require both answers to match.
fn prompt_new_password(prompt: &str) -> Result<Zeroizing<String>> {
    let password = prompt_password(prompt)?;
    let confirm = prompt_password("Confirm password: ")?;

    if *password != *confirm {
        anyhow::bail!("Passwords do not match");
    }

    if password.is_empty() {
        anyhow::bail!("Password cannot be empty");
    }

    Ok(password)
}

async fn unlock(repository: &VaultRepository, path: &VaultPath) -> Result<()> {
    let password = prompt_password("Master password: ")?;
    repository
        .open_vault(path, &password)
        .await
        .context("Failed to open vault")?;
    Ok(())
}

fn print_entry_line(entry: &PasswordEntry) {
    let star = if entry.is_favorite { "*" } else { " " };
    println!(
        "{} {}  {:<24} {}",
        star,
        entry.uuid(),
        entry.title,
        entry.user_name
    );
}

fn print_entries(entries: &[PasswordEntry]) {
    if entries.is_empty() {
        println!("No entries.");
        return;
    }
    for entry in entries {
        print_entry_line(entry);
    }
}

/// Create a new vault.
async fn cmd_create(
    repository: &VaultRepository,
    path: &VaultPath,
    name: &str,
    description: &str,
) -> Result<()> {
    info!("Creating new vault: {}", name);

    let password = prompt_new_password("Master password: ")?;
    let db = repository
        .create_vault(path, &password, name, description)
        .await
        .context("Failed to create vault")?;

    println!("Vault created successfully!");
    println!("  Name: {}", db.metadata().name);
    println!("  Location: {}", path);
    println!("  Generator: {}", db.metadata().generator);

    repository.lock().await?;
    Ok(())
}

/// Add an entry.
async fn cmd_add(
    repository: &VaultRepository,
    path: &VaultPath,
    mut entry: PasswordEntry,
) -> Result<()> {
    unlock(repository, path).await?;

    let mut password = prompt_password("Entry password (empty for none): ")?;
    entry.password = std::mem::take(&mut *password);

    if !entry.password.is_empty() {
        let analysis = EntropyAnalyzer.analyze(&entry.password);
        if analysis.strength.is_weak() {
            println!("Warning: password is {}", analysis.strength);
            for hint in &analysis.feedback {
                println!("  - {}", hint);
            }
        }
    }

    let uuid = entry.uuid();
    repository
        .add_entry(entry)
        .await
        .context("Failed to add entry")?;

    println!("Entry added: {}", uuid);

    repository.lock().await?;
    Ok(())
}

/// List entries in a category.
async fn cmd_list(
    repository: &VaultRepository,
    path: &VaultPath,
    category: Category,
) -> Result<()> {
    unlock(repository, path).await?;

    let days = repository.config().expiring_soon_days;
    let entries = match category {
        Category::All => repository.entries()?,
        Category::Favorites => repository.favorites()?,
        Category::Recent => repository.recently_used(10)?,
        Category::Weak => repository.weak_password_entries(&EntropyAnalyzer)?,
        Category::Duplicates => repository.duplicate_password_entries()?,
        Category::Expiring => repository.expiring_soon_entries(days)?,
        Category::Notes => repository.secure_notes()?,
    };
    print_entries(&entries);

    repository.lock().await?;
    Ok(())
}

/// Search entries.
async fn cmd_search(repository: &VaultRepository, path: &VaultPath, query: &str) -> Result<()> {
    unlock(repository, path).await?;

    let entries = repository.search(query)?;
    println!("{} match(es) for \"{}\":", entries.len(), query);
    print_entries(&entries);

    repository.lock().await?;
    Ok(())
}

/// Show an entry.
async fn cmd_show(
    repository: &VaultRepository,
    path: &VaultPath,
    uuid: Uuid,
    reveal: bool,
) -> Result<()> {
    unlock(repository, path).await?;

    let db = repository
        .mark_accessed(uuid)
        .await
        .context("Failed to read entry")?;
    let entry = db
        .entry(uuid)
        .with_context(|| format!("Entry {} not found", uuid))?;

    println!("{}", entry.title);
    println!("  UUID: {}", entry.uuid());
    println!("  User: {}", entry.user_name);
    if reveal {
        println!("  Password: {}", entry.password);
    } else {
        println!("  Password: {}", "*".repeat(entry.password.chars().count().min(12)));
    }
    if !entry.url.is_empty() {
        println!("  URL: {}", entry.url);
    }
    if !entry.tags.is_empty() {
        println!("  Tags: {}", entry.tags.join(", "));
    }
    for field in &entry.custom_fields {
        println!("  {}: {}", field.key, field.display_value());
    }
    if !entry.notes.is_empty() {
        println!("  Notes: {}", entry.notes);
    }
    println!("  Modified: {}", entry.times.last_modification_time);
    if let Some(expiry) = entry.times.expiry_time.filter(|_| entry.times.expires) {
        println!("  Expires: {}", expiry);
    }
    println!("  Previous passwords: {}", entry.history().len());

    repository.lock().await?;
    Ok(())
}

/// Change the master password.
async fn cmd_passwd(repository: &VaultRepository, path: &VaultPath) -> Result<()> {
    info!("Changing master password");

    let current = prompt_password("Current master password: ")?;
    repository
        .open_vault(path, &current)
        .await
        .context("Failed to open vault")?;

    let new_password = prompt_new_password("New master password: ")?;
    repository
        .change_master_password(&current, &new_password)
        .await
        .context("Failed to change password")?;

    println!("Password changed successfully!");

    repository.lock().await?;
    Ok(())
}

/// Audit password health.
async fn cmd_audit(repository: &VaultRepository, path: &VaultPath) -> Result<()> {
    unlock(repository, path).await?;

    let analyzer = EntropyAnalyzer;
    let counts = repository.category_counts(&analyzer)?;

    println!("Vault audit:");
    println!("  Entries: {}", counts.all);
    println!("  Favorites: {}", counts.favorites);
    println!("  Secure notes: {}", counts.secure_notes);
    println!("  Weak passwords: {}", counts.weak);
    println!("  Reused passwords: {}", counts.duplicates);
    println!("  Expiring soon: {}", counts.expiring_soon);
    println!("  Expired: {}", counts.expired);

    let weak = repository.weak_password_entries(&analyzer)?;
    if !weak.is_empty() {
        println!("\nWeak:");
        for entry in &weak {
            let analysis = analyzer.analyze(&entry.password);
            println!("  {} ({}, score {})", entry.title, analysis.strength, analysis.score);
        }
    }

    let duplicates = repository.duplicate_password_entries()?;
    if !duplicates.is_empty() {
        println!("\nReused:");
        for entry in &duplicates {
            println!("  {}", entry.title);
        }
    }

    repository.lock().await?;
    Ok(())
}
