//! CLI definition and command dispatch for kbpick.
//!
//! This module defines the command-line interface using `clap` and provides
//! the `run()` function that dispatches commands to `kbpick-core`.
//!
//! ## Configuration Precedence
//!
//! Configuration is resolved with the following precedence (highest to lowest):
//! 1. CLI flags (e.g., `--config`, `--verbose`)
//! 2. Environment variables (`KBPICK_CONFIG`, `KBPICK_EMAIL`, `KBPICK_PASSWORD`, ...)
//! 3. Config file (`~/.kbpick/config.yaml` or path from `--config`/`KBPICK_CONFIG`)
//! 4. Built-in defaults

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use crate::ui::color::terminal_width;
use crate::ui::format::count_noun;
use crate::ui::table::{self, ConnectionRow, ResourceRow};
use crate::ui::{ColorMode, MessageType, Progress, ProgressMode, Style};

use kbpick_core::{
    BulkOutcome, Config, ErrorKind, Explorer, HttpKnowledgeApi, KbError, KbResult,
    KnowledgeApi, ResourceController, ResourceId, SortDirection, SortKey, ROOT_PATH,
};

// ============================================================================
// CLI Definition
// ============================================================================

/// Version string including git commit hash
const VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("GIT_HASH"), ")");

/// Knowledge-base file picker – browse a connected drive and choose what gets indexed
#[derive(Parser, Debug)]
#[command(name = "kbpick")]
#[command(author, version = VERSION, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output (debug logging)
    #[arg(short, long, global = true, env = "KBPICK_VERBOSE")]
    pub verbose: bool,

    /// Suppress progress and informational messages
    #[arg(short, long, global = true, env = "KBPICK_QUIET")]
    pub quiet: bool,

    /// Path to configuration file (default: ~/.kbpick/config.yaml)
    #[arg(long, global = true, env = "KBPICK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Color output mode: always, never, or auto (default: auto)
    #[arg(long, global = true, env = "KBPICK_COLOR", default_value = "auto")]
    pub color: String,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// List a folder of the connected drive
    #[command(after_help = r#"EXAMPLES:
    # List the drive root
    kbpick ls

    # List a nested folder, newest first
    kbpick ls /papers/2024 --sort date --desc

    # Filter by path substring
    kbpick ls /papers --search report

    # Get the listing as JSON for scripting
    kbpick ls /papers --json | jq '.indexedItems'
"#)]
    Ls {
        /// Folder to list
        #[arg(default_value = ROOT_PATH)]
        path: String,

        /// Only show entries whose path contains this text (case-insensitive)
        #[arg(long, short = 's')]
        search: Option<String>,

        /// Sort key for entries within folders and files: name or date
        #[arg(long, default_value = "name")]
        sort: SortKey,

        /// Sort descending
        #[arg(long)]
        desc: bool,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Index files or folders into a knowledge base
    #[command(after_help = r#"EXAMPLES:
    # Index a file in the drive root
    kbpick index notes.txt

    # Index several entries of a folder
    kbpick index --dir /papers report.pdf 2024
"#)]
    Index {
        #[command(flatten)]
        target: TargetArgs,
    },

    /// Remove files or folders from their knowledge base
    #[command(after_help = r#"EXAMPLES:
    # De-index a file
    kbpick deindex --dir /papers report.pdf
"#)]
    Deindex {
        #[command(flatten)]
        target: TargetArgs,
    },

    /// De-index entries and refresh the folder listing
    #[command(after_help = r#"EXAMPLES:
    # Remove a file from its knowledge base
    kbpick remove --dir /papers report.pdf
"#)]
    Remove {
        #[command(flatten)]
        target: TargetArgs,
    },

    /// List drive connections of the account
    #[command(after_help = r#"EXAMPLES:
    # Show connections, the active one marked with *
    kbpick connections

    # Output as JSON
    kbpick connections --json
"#)]
    Connections {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Inspect kbpick configuration
    #[command(after_help = r#"EXAMPLES:
    # Show resolved configuration (secrets redacted)
    kbpick config show

    # Print the config file location
    kbpick config path
"#)]
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Entries targeted by a mutation command.
#[derive(clap::Args, Debug)]
pub struct TargetArgs {
    /// Folder containing the entries
    #[arg(long, default_value = ROOT_PATH)]
    pub dir: String,

    /// Entry names or resource ids
    #[arg(required = true, value_name = "NAME|ID")]
    pub targets: Vec<String>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show resolved configuration (file, environment and defaults merged)
    Show {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Print the configuration file path
    Path,
}

/// Mutation run by `index`, `deindex` and `remove`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Index,
    DeIndex,
    Remove,
}

impl Action {
    fn progress_verb(self) -> &'static str {
        match self {
            Self::Index => "Indexing",
            Self::DeIndex => "De-indexing",
            Self::Remove => "Removing",
        }
    }

    fn past_verb(self) -> &'static str {
        match self {
            Self::Index => "Indexed",
            Self::DeIndex => "De-indexed",
            Self::Remove => "Removed",
        }
    }
}

// ============================================================================
// Run function
// ============================================================================

/// Run the CLI application.
///
/// Parses command-line arguments, resolves the configuration and dispatches
/// to the appropriate command handler.
///
/// # Returns
///
/// Returns `ExitCode::SUCCESS` on success, or `ExitCode::FAILURE` on error.
pub fn run() -> ExitCode {
    let cli = Cli::parse();

    // Always show warnings (config issues, rollbacks); debug only with --verbose
    let log_level = if cli.verbose { "debug" } else { "warn" };
    let filter = format!("kbpick_core={},kbpick_cli={}", log_level, log_level);

    tracing_subscriber::fmt()
        .with_env_filter(&filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let color_mode = cli.color.parse().unwrap_or_else(|e| {
        tracing::warn!("{}, using auto", e);
        ColorMode::Auto
    });
    let style = Style::new(color_mode);

    // Priority: --config flag > KBPICK_CONFIG env > ~/.kbpick/config.yaml
    let loaded = match &cli.config {
        Some(path) => Config::from_path(path),
        None => Config::load_default(),
    };
    let config = match loaded {
        Ok(config) => config.with_env_overrides(),
        Err(e) => {
            let hint = match &cli.config {
                Some(path) => format!("Check your config at {}", path.display()),
                None => "Check your config at ~/.kbpick/config.yaml".to_string(),
            };
            eprintln!(
                "{}",
                style.error_with_context(
                    "Failed to load configuration",
                    Some(&e.to_string()),
                    Some(&hint),
                )
            );
            return ExitCode::FAILURE;
        }
    };

    let quiet = cli.quiet;
    let result = match cli.command {
        Command::Config { action } => handle_config(&style, &cli.config, &config, action),
        Command::Ls {
            path,
            search,
            sort,
            desc,
            json,
        } => Remote::connect(&config).and_then(|remote| {
            remote.block_on(handle_ls(
                &style,
                remote.controller(),
                &path,
                search,
                sort,
                desc,
                json,
            ))
        }),
        Command::Index { target } => Remote::connect(&config).and_then(|remote| {
            remote.block_on(handle_mutation(&style, remote.controller(), target, Action::Index, quiet))
        }),
        Command::Deindex { target } => Remote::connect(&config).and_then(|remote| {
            remote.block_on(handle_mutation(&style, remote.controller(), target, Action::DeIndex, quiet))
        }),
        Command::Remove { target } => Remote::connect(&config).and_then(|remote| {
            remote.block_on(handle_mutation(&style, remote.controller(), target, Action::Remove, quiet))
        }),
        Command::Connections { json } => Remote::connect(&config)
            .and_then(|remote| remote.block_on(handle_connections(&style, &remote.api, json))),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                style.error_with_context(&e.to_string(), None, error_hint(&e))
            );
            ExitCode::FAILURE
        }
    }
}

/// Actionable hint for an error, by kind.
fn error_hint(error: &KbError) -> Option<&'static str> {
    match error.kind() {
        ErrorKind::Configuration => {
            Some("Run `kbpick config show` to inspect the resolved configuration")
        }
        ErrorKind::Authentication => Some("Check KBPICK_EMAIL, KBPICK_PASSWORD and auth.anon_key"),
        ErrorKind::Listing => Some("The listing was not changed; run the command again"),
        ErrorKind::Mutation => Some("Local state was rolled back; run the command again"),
        ErrorKind::Precondition | ErrorKind::Cancelled | ErrorKind::Internal => None,
    }
}

/// HTTP client plus the runtime that drives it.
struct Remote {
    runtime: tokio::runtime::Runtime,
    api: Arc<HttpKnowledgeApi>,
}

impl Remote {
    /// Build the client from `config`.
    ///
    /// Credentials are checked here, so a missing email or password fails
    /// without any network traffic.
    fn connect(config: &Config) -> KbResult<Self> {
        let api = Arc::new(HttpKnowledgeApi::from_config(config)?);
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()?;
        Ok(Self { runtime, api })
    }

    fn controller(&self) -> Arc<ResourceController> {
        Arc::new(ResourceController::new(self.api.clone()))
    }

    fn block_on<F: std::future::Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }
}

// ============================================================================
// Command handlers
// ============================================================================

async fn handle_ls(
    style: &Style,
    controller: Arc<ResourceController>,
    path: &str,
    search: Option<String>,
    sort: SortKey,
    desc: bool,
    json: bool,
) -> KbResult<()> {
    let mut explorer = Explorer::new(controller);
    explorer.navigate_to(path).await?;
    if let Some(query) = search {
        explorer.set_search_query(query);
    }
    explorer.set_sort_key(sort);
    if desc {
        explorer.set_sort_direction(SortDirection::Desc);
    }

    let view = explorer.view();

    if json {
        println!("{}", serde_json::to_string_pretty(&view)?);
        return Ok(());
    }

    println!("{}", style.section(&style.file_path(&view.current_path)));

    if view.items.is_empty() {
        let text = if view.search_query.is_empty() {
            "This folder is empty.".to_string()
        } else {
            format!("No entries match '{}'.", view.search_query)
        };
        println!("{}", style.message(MessageType::Info, &text));
        return Ok(());
    }

    let statuses: HashMap<ResourceId, String> = explorer
        .resources()
        .into_iter()
        .filter_map(|r| r.status.map(|s| (r.resource_id, s.to_string())))
        .collect();

    let rows: Vec<ResourceRow> = view
        .items
        .iter()
        .map(|item| ResourceRow {
            id: item.id().to_string(),
            name: item.name().to_string(),
            is_folder: item.is_folder(),
            modified_at: item.modified_at(),
            status: statuses.get(item.id()).cloned(),
        })
        .collect();

    println!();
    println!("{}", table::render_resources_table(&rows, terminal_width()));

    let folders = view.items.iter().filter(|i| i.is_folder()).count();
    let indexed = view.indexed_items.values().filter(|&&v| v).count();
    println!();
    println!(
        "{}",
        style.message_detail(
            "Entries",
            &format!(
                "{}, {} ({} indexed)",
                count_noun(folders, "folder"),
                count_noun(view.items.len() - folders, "file"),
                indexed
            )
        )
    );
    Ok(())
}

async fn handle_mutation(
    style: &Style,
    controller: Arc<ResourceController>,
    target: TargetArgs,
    action: Action,
    quiet: bool,
) -> KbResult<()> {
    let mode = ProgressMode::detect(quiet, false);

    let mut explorer = Explorer::new(controller);
    explorer.navigate_to(&target.dir).await?;

    let mut names: HashMap<ResourceId, String> = HashMap::new();
    for needle in &target.targets {
        match explorer.find(needle) {
            Some(resource) => {
                names.insert(resource.resource_id.clone(), resource.name().to_string());
                explorer.select(resource.resource_id, true);
            }
            None => println!(
                "{}",
                style.message(
                    MessageType::Skip,
                    &format!("'{}' not found in {}", needle, explorer.current_path())
                )
            ),
        }
    }

    if explorer.selection().is_empty() {
        return Err(KbError::ResourceNotFound(target.targets.join(", ")));
    }

    let progress = Progress::spinner(
        &format!(
            "{} {}...",
            action.progress_verb(),
            count_noun(explorer.selection().len(), "item")
        ),
        mode,
    );

    let outcome = match action {
        Action::Index => explorer.index_selected().await,
        Action::DeIndex => explorer.de_index_selected().await,
        Action::Remove => explorer.remove_selected().await,
    };
    progress.finish_clear();

    report_outcome(style, &explorer, &names, action, outcome?)
}

fn report_outcome(
    style: &Style,
    explorer: &Explorer,
    names: &HashMap<ResourceId, String>,
    action: Action,
    outcome: BulkOutcome,
) -> KbResult<()> {
    let display = |id: &ResourceId| names.get(id).cloned().unwrap_or_else(|| id.to_string());

    if !outcome.succeeded.is_empty() {
        println!(
            "{}",
            style.message(
                MessageType::Ok,
                &format!(
                    "{} {}",
                    action.past_verb(),
                    count_noun(outcome.succeeded.len(), "item")
                )
            )
        );
        for id in &outcome.succeeded {
            println!("{}", style.list_item("+", &display(id)));
            if action == Action::Index {
                let knowledge_base = explorer
                    .controller()
                    .find(explorer.current_key(), id)
                    .and_then(|r| r.knowledge_base_id);
                if let Some(kb) = knowledge_base {
                    println!("{}", style.message_detail("Knowledge base", &kb.to_string()));
                }
            }
        }
    }

    for (id, error) in &outcome.failed {
        println!(
            "{}",
            style.error_with_context(&display(id), Some(&error.to_string()), error_hint(error))
        );
    }

    if outcome.all_succeeded() {
        Ok(())
    } else {
        Err(KbError::Other(anyhow::anyhow!(
            "{} of {} failed",
            count_noun(outcome.failed.len(), "item"),
            outcome.total()
        )))
    }
}

async fn handle_connections(style: &Style, api: &HttpKnowledgeApi, json: bool) -> KbResult<()> {
    let connections = api.list_connections().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&connections)?);
        return Ok(());
    }

    if connections.is_empty() {
        println!(
            "{}",
            style.message(MessageType::Info, "No drive connections found for this account.")
        );
        return Ok(());
    }

    let active = api
        .active_connection()
        .await
        .ok()
        .map(|c| c.connection_id.clone());

    let rows: Vec<ConnectionRow> = connections
        .into_iter()
        .map(|c| ConnectionRow {
            id: c.connection_id,
            name: c.name,
            provider: c.connection_provider,
            created_at: c.created_at,
        })
        .collect();

    println!("{}", style.section("CONNECTIONS"));
    println!();
    println!("{}", table::render_connections_table(&rows, active.as_deref()));
    Ok(())
}

// ============================================================================
// Config command handler
// ============================================================================

fn handle_config(
    style: &Style,
    config_flag: &Option<PathBuf>,
    config: &Config,
    action: ConfigAction,
) -> KbResult<()> {
    match action {
        ConfigAction::Show { json } => handle_config_show(style, config, json),
        ConfigAction::Path => {
            let path = config_flag.clone().or_else(Config::default_path).ok_or_else(|| {
                KbError::InvalidConfig("could not determine the home directory".to_string())
            })?;
            println!("{}", path.display());
            Ok(())
        }
    }
}

/// Show resolved configuration with secrets redacted.
fn handle_config_show(style: &Style, config: &Config, json: bool) -> KbResult<()> {
    let redacted = config.redacted();

    if json {
        println!("{}", serde_json::to_string_pretty(&redacted)?);
        return Ok(());
    }

    println!(
        "{}",
        style.message(MessageType::Info, "Resolved configuration:")
    );
    println!();
    println!("{}", serde_yaml::to_string(&redacted)?.trim_end());

    let warnings = config.validate()?;
    if !warnings.is_empty() {
        println!();
        for warning in &warnings {
            println!("{}", style.message(MessageType::Warn, warning));
        }
    }
    Ok(())
}
