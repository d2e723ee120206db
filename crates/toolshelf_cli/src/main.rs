//! TOOLSHELF CLI
//!
//! Operator command line for a category/tool tree. Records are printed as
//! JSON on stdout; logs go to stderr.

#![warn(missing_docs)]
#![warn(clippy::all)]

use clap::{Parser, Subcommand};
use color_eyre::Result;
use color_eyre::eyre::{WrapErr, bail};
use serde::Serialize;
use std::path::PathBuf;
use toolshelf_core::{NewCategory, NewTool};
use toolshelf_storage::{HierarchyManager, StoreConfig};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "toolshelf")]
#[command(about = "TOOLSHELF - category/tool registry kept on disk", long_about = None)]
struct Cli {
    /// Application root (holds the `tools/` tree)
    #[arg(short, long, env = "TOOLSHELF_ROOT", global = true)]
    root: Option<PathBuf>,

    /// JSON configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Give up waiting for a document lock after this many milliseconds
    #[arg(long, global = true)]
    lock_timeout_ms: Option<u64>,

    /// More log output (repeatable)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the tree skeleton and an empty registry
    Init,
    /// List categories with their tools
    List,
    /// Show one category with its tools
    Show {
        /// Category id
        category: String,
    },
    /// List the tools of one category
    Tools {
        /// Category id
        category: String,
    },
    /// Register a category
    AddCategory {
        /// Category id (directory name)
        #[arg(long)]
        id: String,
        /// Display name
        #[arg(long)]
        name: String,
        /// Icon identifier
        #[arg(long)]
        icon: Option<String>,
    },
    /// Add a tool to a category
    AddTool {
        /// Owning category id
        #[arg(long)]
        category: String,
        /// Tool id (directory name)
        #[arg(long)]
        id: String,
        /// Display name
        #[arg(long)]
        name: String,
        /// Free text
        #[arg(long)]
        description: Option<String>,
        /// Icon identifier
        #[arg(long)]
        icon: Option<String>,
    },
    /// Remove a tool and its directory
    DeleteTool {
        /// Category id
        category: String,
        /// Tool id
        tool: String,
    },
    /// Remove a category and its whole tree
    DeleteCategory {
        /// Category id
        category: String,
    },
    /// Compare metadata with the directory tree
    Audit,
    /// Overwrite the registry with an empty one
    ResetRegistry,
    /// Overwrite a category document with an empty one
    ResetCategory {
        /// Category id
        category: String,
    },
    /// Print the effective configuration
    Config,
}

impl Cli {
    fn store_config(&self) -> Result<StoreConfig> {
        let mut config = match &self.config {
            Some(path) => StoreConfig::from_json_file(path)
                .wrap_err_with(|| format!("loading {}", path.display()))?,
            None => StoreConfig::default(),
        };
        if let Some(root) = &self.root {
            config.root.clone_from(root);
        }
        if self.lock_timeout_ms.is_some() {
            config.lock_timeout_ms = self.lock_timeout_ms;
        }
        Ok(config)
    }

    fn default_directive(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}

fn init_tracing(cli: &Cli) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cli.default_directive()));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if cli.log_json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn print<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    let config = cli.store_config()?;
    let manager = HierarchyManager::open(&config);
    tracing::debug!(root = %config.root.display(), "store opened");

    match cli.command {
        Commands::Init => {
            manager.initialize()?;
            print(&manager.registry_document()?)
        }
        Commands::List => print(&manager.list_categories()?),
        Commands::Show { category } => print(&manager.get_category(&category)?),
        Commands::Tools { category } => print(&manager.list_tools(&category)?),
        Commands::AddCategory { id, name, icon } => {
            let mut request = NewCategory::new(id, name);
            if let Some(icon) = icon {
                request = request.with_icon(icon);
            }
            print(&manager.add_category(&request)?)
        }
        Commands::AddTool {
            category,
            id,
            name,
            description,
            icon,
        } => {
            let mut request = NewTool::new(id, name);
            if let Some(description) = description {
                request = request.with_description(description);
            }
            if let Some(icon) = icon {
                request = request.with_icon(icon);
            }
            print(&manager.add_tool(&category, &request)?)
        }
        Commands::DeleteTool { category, tool } => print(&manager.delete_tool(&category, &tool)?),
        Commands::DeleteCategory { category } => print(&manager.delete_category(&category)?),
        Commands::Audit => {
            let report = manager.audit()?;
            print(&report)?;
            if !report.is_consistent() {
                bail!("{} inconsistencies found", report.issue_count());
            }
            Ok(())
        }
        Commands::ResetRegistry => {
            manager.reset_registry()?;
            print(&manager.registry_document()?)
        }
        Commands::ResetCategory { category } => {
            manager.reset_category_document(&category)?;
            print(&manager.category_document(&category)?)
        }
        Commands::Config => print(&config),
    }
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    init_tracing(&cli);
    run(cli)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_flags_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("toolshelf.json");
        std::fs::write(&path, r#"{"root": "/srv/app", "lock_timeout_ms": 500}"#).unwrap();

        let cli = Cli::parse_from([
            "toolshelf",
            "--config",
            path.to_str().unwrap(),
            "--lock-timeout-ms",
            "50",
            "list",
        ]);
        let config = cli.store_config().unwrap();
        assert_eq!(config.root, PathBuf::from("/srv/app"));
        assert_eq!(config.lock_timeout_ms, Some(50));
        assert!(config.process_locks);
    }

    #[test]
    fn test_run_against_temp_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_str().unwrap();
        let invoke = |args: &[&str]| {
            let mut argv = vec!["toolshelf", "--root", root];
            argv.extend_from_slice(args);
            run(Cli::parse_from(argv))
        };

        invoke(&["init"]).unwrap();
        invoke(&["add-category", "--id", "math", "--name", "Math Tools"]).unwrap();
        invoke(&["add-tool", "--category", "math", "--id", "calc", "--name", "Calculator"]).unwrap();
        invoke(&["audit"]).unwrap();
        assert!(invoke(&["add-tool", "--category", "ghost", "--id", "x", "--name", "X"]).is_err());

        std::fs::create_dir_all(dir.path().join("tools/categories/stray")).unwrap();
        assert!(invoke(&["audit"]).is_err());
    }
}
