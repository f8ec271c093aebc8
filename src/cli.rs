//! Command line interface of the `dub-lsp` binary.
//!
//! Without a subcommand the binary runs the language server on stdio.
//! The other subcommands expose the same engines for scripts and CI.

use std::{
    env,
    path::{Path, PathBuf},
    process::ExitCode,
};

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use ropey::Rope;
use tower_lsp::{
    lsp_types::{Url, WorkspaceFolder},
    Server,
};

use crate::{
    config::Settings,
    diagnostics::{validate, SdlDiagnostic},
    range::lsp_position,
    registry::{DubRegistry, PackageIndex},
    schema::DUB_SCHEMA,
    sdl::{self, Severity},
    server::Backend,
    tasks::{discover_tasks, resolve_task, DubTaskDefinition},
};

#[derive(Parser, Debug)]
#[command(name = "dub-lsp", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Command {
    /// Run the language server on stdio
    Serve,
    /// Print diagnostics for a dub.sdl file
    Check { file: PathBuf },
    /// Print the dub command line for a JSON task definition
    ResolveTask {
        definition: String,
        /// dub executable, defaults to the configured `dub_path`
        #[arg(long)]
        dub_path: Option<String>,
    },
    /// Print the build tasks found under a directory as JSON
    Tasks {
        #[arg(default_value = ".")]
        dir: PathBuf,
    },
    /// Search the package registry
    Search { query: String },
}

pub async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let cwd = env::current_dir()?;
    let settings = Settings::new(&cwd).unwrap_or_else(|err| {
        tracing::warn!(error = %err, "failed to load settings, using defaults");
        Settings::default()
    });

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            let registry = DubRegistry::new(&settings)?;
            tracing::info!("starting dub-lsp {}", env!("CARGO_PKG_VERSION"));
            let (service, socket) = Backend::service(settings, registry);
            Server::new(tokio::io::stdin(), tokio::io::stdout(), socket)
                .serve(service)
                .await;
        }
        Command::Check { file } => {
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let (lines, has_errors) = check_report(&file, &text);
            for line in lines {
                println!("{line}");
            }
            if has_errors {
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::ResolveTask {
            definition,
            dub_path,
        } => {
            let dub_path = dub_path.unwrap_or(settings.dub_path);
            let argv = resolve_task_json(&definition, &dub_path)?;
            println!("{}", serde_json::to_string(&argv)?);
        }
        Command::Tasks { dir } => {
            println!("{}", tasks_json(&dir, &settings.dub_path)?);
        }
        Command::Search { query } => {
            let registry = DubRegistry::new(&settings)?;
            for package in registry.search(&query).await? {
                match package.description {
                    Some(description) => println!("{}\t{}", package.name, description),
                    None => println!("{}", package.name),
                }
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn format_diagnostic(path: &Path, rope: &Rope, diagnostic: &SdlDiagnostic) -> String {
    let severity = match diagnostic.severity {
        Severity::Error => "error",
        Severity::Warning => "warning",
    };
    match &diagnostic.range {
        Some(range) => {
            let position = lsp_position(rope, range.start);
            format!(
                "{}:{}:{}: {severity}: {}",
                path.display(),
                position.line + 1,
                position.character + 1,
                diagnostic.message
            )
        }
        None => format!("{}: {severity}: {}", path.display(), diagnostic.message),
    }
}

/// One line per diagnostic of `text`, and whether any of them is an error.
pub fn check_report(path: &Path, text: &str) -> (Vec<String>, bool) {
    let rope = Rope::from_str(text);
    let diagnostics = validate(&sdl::parse(text), &DUB_SCHEMA);
    let has_errors = diagnostics.iter().any(|d| d.severity == Severity::Error);
    let lines = diagnostics
        .iter()
        .map(|d| format_diagnostic(path, &rope, d))
        .collect();
    (lines, has_errors)
}

pub fn resolve_task_json(definition: &str, dub_path: &str) -> anyhow::Result<Vec<String>> {
    let definition: DubTaskDefinition =
        serde_json::from_str(definition).context("Invalid task definition")?;
    Ok(resolve_task(&definition, dub_path))
}

/// Discovered tasks under `dir`, pretty-printed as JSON.
pub fn tasks_json(dir: &Path, dub_path: &str) -> anyhow::Result<String> {
    let dir = dir
        .canonicalize()
        .with_context(|| format!("Failed to resolve {}", dir.display()))?;
    let uri = Url::from_directory_path(&dir)
        .map_err(|_| anyhow!("Can't convert {} to a URI", dir.display()))?;
    let folder = WorkspaceFolder {
        name: dir
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default()
            .to_string(),
        uri,
    };

    let tasks = discover_tasks(&[folder], dub_path);
    Ok(serde_json::to_string_pretty(&tasks)?)
}
