//! dub build tasks.
//!
//! ```text
//! discover_tasks()  → BuildTask (wire format)  → provide_tasks() → ResolvedTask
//! DubTaskDefinition → resolve_task()           → dub argv
//! ```
//!
//! [`BuildTask`] is the loosely typed shape tasks are exchanged in: a scope
//! string, a flat `exec` argv and a free-form definition. [`provide_tasks`]
//! turns those into [`ResolvedTask`]s bound to a workspace folder, and
//! [`resolve_task`] builds the `dub` command line for a definition.

use std::{
    collections::BTreeSet,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use tower_lsp::lsp_types::WorkspaceFolder;
use walkdir::WalkDir;

/// Recipe file names marking a dub package directory.
const RECIPE_FILES: &[&str] = &["dub.sdl", "dub.json"];

/// `source` of every discovered task.
pub const TASK_SOURCE: &str = "dub";
/// Problem matcher for D compiler output.
pub const PROBLEM_MATCHER: &str = "$dmd";

/// Editor task group a task belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskGroup {
    Clean,
    Build,
    Rebuild,
    Test,
}

/// A task before it is bound to a workspace folder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildTask {
    /// The task definition as the editor stores it (`"type": "dub"` plus
    /// the [`DubTaskDefinition`] fields).
    pub definition: serde_json::Value,
    /// `"global"`, `"workspace"`, or the URI of a workspace folder.
    pub scope: String,
    /// Command line; the first element is the program.
    #[serde(default)]
    pub exec: Vec<String>,
    pub name: String,
    #[serde(default)]
    pub is_background: bool,
    pub source: String,
    #[serde(default)]
    pub group: Option<TaskGroup>,
    #[serde(default)]
    pub problem_matchers: Vec<String>,
}

/// Where a resolved task applies.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskScope {
    Global,
    Workspace,
    Folder(WorkspaceFolder),
}

/// A program to spawn directly, without a shell.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProcessExecution {
    pub process: String,
    pub args: Vec<String>,
    /// Working directory; the editor's default when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,
}

/// A [`BuildTask`] bound to its scope, ready for the editor.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedTask {
    pub definition: serde_json::Value,
    pub scope: TaskScope,
    pub name: String,
    pub source: String,
    pub execution: ProcessExecution,
    pub problem_matchers: Vec<String>,
    pub is_background: bool,
    pub group: Option<TaskGroup>,
}

/// The `dub` task definition as written in an editor's task configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DubTaskDefinition {
    /// `dub run` instead of `dub build`.
    pub run: bool,
    /// `dub test`; wins over `run`.
    pub test: bool,
    /// `--root`, the package directory.
    pub root: Option<String>,
    /// Working directory of the spawned process.
    pub cwd: Option<String>,
    /// One `--override-config` per entry.
    pub overrides: Vec<String>,
    pub force: bool,
    /// `--compiler`
    pub compiler: Option<String>,
    /// `--arch`
    pub arch_type: Option<String>,
    /// `--build`
    pub build_type: Option<String>,
    /// `--config`
    pub configuration: Option<String>,
    /// Appended after every generated flag.
    pub args: Vec<String>,
}

/// Workspace folder containing `uri`; the innermost one when folders nest.
fn folder_for<'a>(uri: &str, folders: &'a [WorkspaceFolder]) -> Option<&'a WorkspaceFolder> {
    folders
        .iter()
        .filter(|folder| {
            let root = folder.uri.as_str().trim_end_matches('/');
            uri.strip_prefix(root)
                .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
        })
        .max_by_key(|folder| folder.uri.as_str().trim_end_matches('/').len())
}

/// Bind tasks to their scope. Tasks scoped to a URI outside every
/// workspace folder are dropped.
pub fn provide_tasks(tasks: Vec<BuildTask>, folders: &[WorkspaceFolder]) -> Vec<ResolvedTask> {
    tasks
        .into_iter()
        .filter_map(|task| {
            let scope = match task.scope.as_str() {
                "global" => TaskScope::Global,
                "workspace" => TaskScope::Workspace,
                uri => match folder_for(uri, folders) {
                    Some(folder) => TaskScope::Folder(folder.clone()),
                    None => {
                        tracing::debug!(task = %task.name, scope = %uri, "dropping task outside the workspace");
                        return None;
                    }
                },
            };

            let mut exec = task.exec.into_iter();
            let execution = ProcessExecution {
                process: exec.next().unwrap_or_default(),
                args: exec.collect(),
                cwd: None,
            };

            Some(ResolvedTask {
                definition: task.definition,
                scope,
                name: task.name,
                source: task.source,
                execution,
                problem_matchers: task.problem_matchers,
                is_background: task.is_background,
                group: task.group,
            })
        })
        .collect()
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// Command line running `definition` with the dub executable at `dub_path`.
pub fn resolve_task(definition: &DubTaskDefinition, dub_path: &str) -> Vec<String> {
    let command = if definition.test {
        "test"
    } else if definition.run {
        "run"
    } else {
        "build"
    };
    let mut args = vec![dub_path.to_string(), command.to_string()];

    if let Some(root) = non_empty(&definition.root) {
        args.push(format!("--root={root}"));
    }
    args.extend(
        definition
            .overrides
            .iter()
            .map(|o| format!("--override-config={o}")),
    );
    if definition.force {
        args.push("--force".to_string());
    }
    let flags = [
        ("--compiler", &definition.compiler),
        ("--arch", &definition.arch_type),
        ("--build", &definition.build_type),
        ("--config", &definition.configuration),
    ];
    for (flag, value) in flags {
        if let Some(value) = non_empty(value) {
            args.push(format!("{flag}={value}"));
        }
    }
    args.extend(definition.args.iter().cloned());

    args
}

/// [`resolve_task`] as a process to spawn, run from the definition's `cwd`.
pub fn resolve_execution(definition: &DubTaskDefinition, dub_path: &str) -> ProcessExecution {
    let mut argv = resolve_task(definition, dub_path).into_iter();
    ProcessExecution {
        process: argv.next().unwrap_or_default(),
        args: argv.collect(),
        cwd: non_empty(&definition.cwd).map(str::to_string),
    }
}

/// Directories directly holding a dub recipe, at most one level below `root`.
fn package_dirs(root: &Path) -> BTreeSet<PathBuf> {
    WalkDir::new(root)
        .max_depth(2)
        .into_iter()
        .filter_entry(|e| {
            e.depth() == 0
                || !e
                    .file_name()
                    .to_str()
                    .map(|s| s.starts_with('.'))
                    .unwrap_or(false)
        })
        .flatten()
        .filter(|e| {
            e.file_type().is_file()
                && e.file_name()
                    .to_str()
                    .is_some_and(|name| RECIPE_FILES.contains(&name))
        })
        .filter_map(|e| e.path().parent().map(Path::to_path_buf))
        .collect()
}

/// Build, rebuild, test and run tasks for every dub package in the
/// workspace folders.
pub fn discover_tasks(folders: &[WorkspaceFolder], dub_path: &str) -> Vec<BuildTask> {
    let mut tasks = vec![];

    for folder in folders {
        let Ok(root) = folder.uri.to_file_path() else {
            tracing::debug!(uri = %folder.uri, "skipping non-file workspace folder");
            continue;
        };

        for dir in package_dirs(&root) {
            let suffix = match dir.strip_prefix(&root) {
                Ok(relative) if !relative.as_os_str().is_empty() => {
                    format!(" ({})", relative.display())
                }
                _ => String::new(),
            };
            let base = DubTaskDefinition {
                root: Some(dir.display().to_string()),
                ..Default::default()
            };

            let variants = [
                ("build", Some(TaskGroup::Build), base.clone()),
                (
                    "rebuild",
                    Some(TaskGroup::Rebuild),
                    DubTaskDefinition {
                        force: true,
                        ..base.clone()
                    },
                ),
                (
                    "test",
                    Some(TaskGroup::Test),
                    DubTaskDefinition {
                        test: true,
                        ..base.clone()
                    },
                ),
                (
                    "run",
                    None,
                    DubTaskDefinition {
                        run: true,
                        ..base.clone()
                    },
                ),
            ];

            for (action, group, definition) in variants {
                let mut json = serde_json::to_value(&definition).unwrap_or_default();
                if let Some(object) = json.as_object_mut() {
                    object.insert("type".to_string(), TASK_SOURCE.into());
                }
                tasks.push(BuildTask {
                    exec: resolve_task(&definition, dub_path),
                    definition: json,
                    scope: folder.uri.to_string(),
                    name: format!("{action}{suffix}"),
                    is_background: false,
                    source: TASK_SOURCE.to_string(),
                    group,
                    problem_matchers: vec![PROBLEM_MATCHER.to_string()],
                });
            }
        }
    }

    tracing::debug!(count = tasks.len(), "discovered dub tasks");
    tasks
}
