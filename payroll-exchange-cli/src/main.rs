//! pex: payroll exchange tool.
//!
//! Supports:
//! - Importing exchange documents into the payroll REST API
//! - Rewriting the tenant namespace of a document
//! - Inlining file references into a self-contained document
//! - Summarizing a document's contents
//!
//! # Usage
//!
//! ```bash
//! # Import one or more documents (files or archive directories)
//! pex import tenant.json regulation.yaml --url http://localhost:44354/api
//!
//! # Import lookups in bulk, leaving existing objects untouched
//! pex import lookups.json --bulk --update-mode ignore
//!
//! # Move a document to another tenant namespace
//! pex namespace tenant.json --target Globex --output globex.json
//!
//! # Inline scripts, expressions and report templates
//! pex inline tenant.json --output tenant.inline.json
//!
//! # Count the nodes of a document
//! pex summary tenant.json
//! ```

mod remote;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use payroll_exchange_core::{
    import_document, inline_files, read_document, rewrite_namespace, summarize, write_document, DataImportMode,
    ExchangeConfig, FsFileProvider, IdentityTransform, UpdateMode,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::remote::HttpStore;

#[derive(Parser, Debug)]
#[command(name = "pex")]
#[command(author = "Payroll Exchange Contributors")]
#[command(version = "0.1.0")]
#[command(about = "Payroll exchange import and transformation tool")]
struct Cli {
    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Import exchange documents into the remote payroll system
    Import {
        /// Document files or archive directories, imported in order
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Base URL of the payroll REST API
        #[arg(long)]
        url: Option<String>,
        /// Handling of objects that already exist remotely
        #[arg(long, value_enum)]
        update_mode: Option<UpdateModeArg>,
        /// Delete and recreate lookups in one batch per regulation
        #[arg(long)]
        bulk: bool,
        /// Drop file references once their content is inlined
        #[arg(long)]
        clear_files: bool,
        /// Directory holding pex.json (default: current directory)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Rewrite the tenant namespace of a document
    Namespace {
        /// Document file or archive directory
        file: PathBuf,
        /// New namespace
        #[arg(short, long)]
        target: String,
        /// Output file (default: overwrite the input file)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Inline all file references of a document
    Inline {
        /// Document file or archive directory
        file: PathBuf,
        /// Output file (default: overwrite the input file)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show node counts of a document
    Summary {
        /// Document file or archive directory
        file: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum UpdateModeArg {
    Ignore,
    Update,
}

impl From<UpdateModeArg> for UpdateMode {
    fn from(mode: UpdateModeArg) -> Self {
        match mode {
            UpdateModeArg::Ignore => UpdateMode::Ignore,
            UpdateModeArg::Update => UpdateMode::Update,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let env_filter = if cli.debug {
        tracing_subscriber::EnvFilter::new("debug")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("pex=info,payroll_exchange_core=info"))
    };
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    match cli.command {
        Commands::Import {
            files,
            url,
            update_mode,
            bulk,
            clear_files,
            config,
        } => {
            let config_dir = config.unwrap_or_else(|| PathBuf::from("."));
            let mut config = ExchangeConfig::load(&config_dir)
                .with_context(|| format!("Failed to load configuration from {}", config_dir.display()))?;
            apply_overrides(&mut config, url, update_mode, bulk, clear_files);
            cmd_import(&files, &config).await
        }

        Commands::Namespace { file, target, output } => cmd_namespace(&file, &target, output.as_deref()),

        Commands::Inline { file, output } => cmd_inline(&file, output.as_deref()),

        Commands::Summary { file } => cmd_summary(&file),
    }
}

/// Command line flags win over the configuration file.
fn apply_overrides(
    config: &mut ExchangeConfig,
    url: Option<String>,
    update_mode: Option<UpdateModeArg>,
    bulk: bool,
    clear_files: bool,
) {
    if let Some(url) = url {
        config.base_url = url;
    }
    if let Some(mode) = update_mode {
        config.update_mode = mode.into();
    }
    if bulk {
        config.data_import_mode = DataImportMode::Bulk;
    }
    if clear_files {
        config.clear_file_references = true;
    }
}

/// Directory file references of `path` are relative to.
fn document_root(path: &Path) -> PathBuf {
    if path.is_dir() {
        return path.to_path_buf();
    }
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Where a transformed document goes; archives need an explicit output file.
fn output_path(input: &Path, output: Option<&Path>) -> Result<PathBuf> {
    match output {
        Some(output) => Ok(output.to_path_buf()),
        None if input.is_dir() => Err(anyhow!(
            "{} is an archive directory, use --output to name the result file",
            input.display()
        )),
        None => Ok(input.to_path_buf()),
    }
}

async fn cmd_import(files: &[PathBuf], config: &ExchangeConfig) -> Result<()> {
    let store = HttpStore::new(&config.base_url, Duration::from_secs(config.timeout_secs))?;
    let options = config.import_options();

    println!("Importing into {}", config.base_url);
    for file in files {
        let mut document =
            read_document(file).with_context(|| format!("Failed to read {}", file.display()))?;
        let provider = Arc::new(FsFileProvider::new(document_root(file)));
        let report = import_document(&mut document, &store, provider, Arc::new(IdentityTransform), &options)
            .await
            .with_context(|| format!("Failed to import {}", file.display()))?;

        println!("\n{}:", file.display());
        println!("{}", report);
    }
    Ok(())
}

fn cmd_namespace(file: &Path, target: &str, output: Option<&Path>) -> Result<()> {
    let output = output_path(file, output)?;
    let mut document = read_document(file).with_context(|| format!("Failed to read {}", file.display()))?;
    rewrite_namespace(&mut document, target)?;
    write_document(&output, &document).with_context(|| format!("Failed to write {}", output.display()))?;
    println!("Namespace changed to {} in {}", target, output.display());
    Ok(())
}

fn cmd_inline(file: &Path, output: Option<&Path>) -> Result<()> {
    let output = output_path(file, output)?;
    let mut document = read_document(file).with_context(|| format!("Failed to read {}", file.display()))?;
    let files = Arc::new(FsFileProvider::new(document_root(file)));
    inline_files(&mut document, files, Arc::new(IdentityTransform))?;
    write_document(&output, &document).with_context(|| format!("Failed to write {}", output.display()))?;
    println!("Inlined document written to {}", output.display());
    Ok(())
}

fn cmd_summary(file: &Path) -> Result<()> {
    let document = read_document(file).with_context(|| format!("Failed to read {}", file.display()))?;
    let summary = summarize(&document)?;
    println!("Document: {}", file.display());
    println!("{}", summary);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_import_flags() {
        let cli = Cli::try_parse_from([
            "pex", "import", "a.json", "b.yaml", "--bulk", "--update-mode", "ignore", "--debug",
        ])
        .unwrap();
        assert!(cli.debug);
        let Commands::Import {
            files,
            update_mode,
            bulk,
            ..
        } = cli.command
        else {
            panic!("expected import command");
        };
        assert_eq!(files, vec![PathBuf::from("a.json"), PathBuf::from("b.yaml")]);
        assert_eq!(update_mode, Some(UpdateModeArg::Ignore));
        assert!(bulk);
    }

    #[test]
    fn test_import_requires_files() {
        assert!(Cli::try_parse_from(["pex", "import"]).is_err());
    }

    #[test]
    fn test_overrides_win_over_config() {
        let mut config = ExchangeConfig::default();
        apply_overrides(
            &mut config,
            Some("https://payroll.example.com/api".into()),
            Some(UpdateModeArg::Ignore),
            true,
            false,
        );
        assert_eq!(config.base_url, "https://payroll.example.com/api");
        assert_eq!(config.update_mode, UpdateMode::Ignore);
        assert_eq!(config.data_import_mode, DataImportMode::Bulk);
        assert!(!config.clear_file_references);
    }

    #[test]
    fn test_document_root() {
        assert_eq!(document_root(Path::new("tenant.json")), PathBuf::from("."));
        assert_eq!(document_root(Path::new("data/tenant.json")), PathBuf::from("data"));
        let tmp = TempDir::new().unwrap();
        assert_eq!(document_root(tmp.path()), tmp.path().to_path_buf());
    }

    #[test]
    fn test_namespace_and_inline_commands() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("scripts")).unwrap();
        std::fs::write(tmp.path().join("scripts/rules.cs"), "class Rules {}").unwrap();
        let input = tmp.path().join("tenant.json");
        std::fs::write(
            &input,
            r#"{"tenants": [{"identifier": "ACME", "regulations": [{
                "name": "ACME.Base",
                "scripts": [{"name": "ACME.Rules", "valueFile": "scripts/rules.cs"}]
            }]}]}"#,
        )
        .unwrap();

        let renamed = tmp.path().join("globex.yaml");
        cmd_namespace(&input, "Globex", Some(renamed.as_path())).unwrap();
        let document = read_document(&renamed).unwrap();
        assert_eq!(document.tenants[0].regulations[0].name, "Globex.Base");

        cmd_inline(&input, None).unwrap();
        let document = read_document(&input).unwrap();
        let script = &document.tenants[0].regulations[0].scripts[0];
        assert_eq!(script.value.as_deref(), Some("class Rules {}"));
    }

    #[test]
    fn test_archive_needs_output() {
        let tmp = TempDir::new().unwrap();
        assert!(output_path(tmp.path(), None).is_err());
        let file = tmp.path().join("out.json");
        assert_eq!(output_path(tmp.path(), Some(file.as_path())).unwrap(), file);
    }
}
