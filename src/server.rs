//! The LSP backend.
//!
//! Open documents are kept as text plus a [`Rope`] for position mapping.
//! Only files named `dub.sdl` get diagnostics, completion and hover.
//! Diagnostics are published `lint_delay_ms` after the last edit; an edit
//! arriving in the meantime bumps the document version and the stale
//! publish is dropped.
//!
//! Besides the standard requests the server answers two custom ones:
//!
//! | Method | Params | Result |
//! |--------|--------|--------|
//! | `dub/buildTasks` | none | [`ResolvedTask`] list for the workspace |
//! | `dub/resolveTask` | [`DubTaskDefinition`] | [`ProcessExecution`] |

use std::{collections::HashMap, path::PathBuf, sync::Arc, time::Duration};

use ropey::Rope;
use tokio::sync::RwLock;
use tower_lsp::{
    jsonrpc::Result,
    lsp_types::{
        CompletionItem, CompletionOptions, CompletionParams, CompletionResponse, Diagnostic,
        DidChangeTextDocumentParams, DidChangeWorkspaceFoldersParams, DidCloseTextDocumentParams,
        DidOpenTextDocumentParams, DocumentSymbolParams, DocumentSymbolResponse, Hover,
        HoverParams, HoverProviderCapability, InitializeParams, InitializeResult,
        InitializedParams, MessageType, OneOf, ServerCapabilities, ServerInfo,
        TextDocumentSyncCapability, TextDocumentSyncKind, Url, WorkspaceFolder,
        WorkspaceFoldersServerCapabilities, WorkspaceServerCapabilities,
    },
    Client, LanguageServer, LspService,
};

use crate::{
    completion::{completion_response, get_completions, resolve_completion, Context},
    config::Settings,
    diagnostics::diagnostics,
    hover::hover,
    location::location_info,
    range::byte_offset,
    registry::DubRegistry,
    schema::DUB_SCHEMA,
    sdl,
    symbol::document_symbol,
    tasks::{
        discover_tasks, provide_tasks, resolve_execution, DubTaskDefinition, ProcessExecution,
        ResolvedTask,
    },
};

pub const RECIPE_FILE_NAME: &str = "dub.sdl";

/// Whether `uri` names an SDL dub recipe.
pub fn is_dub_sdl(uri: &Url) -> bool {
    uri.path_segments()
        .and_then(|mut segments| segments.next_back())
        .is_some_and(|name| name == RECIPE_FILE_NAME)
}

#[derive(Debug, Clone)]
struct OpenDocument {
    text: String,
    rope: Rope,
    version: i32,
}

impl OpenDocument {
    fn new(text: String, version: i32) -> Self {
        OpenDocument {
            rope: Rope::from_str(&text),
            text,
            version,
        }
    }
}

/// Diagnostics for `uri` as of `version`. `None` once the document is
/// closed or has moved past `version`.
fn current_diagnostics(
    documents: &HashMap<Url, OpenDocument>,
    uri: &Url,
    version: i32,
    settings: &Settings,
) -> Option<Vec<Diagnostic>> {
    let document = documents.get(uri)?;
    if document.version != version {
        return None;
    }
    Some(diagnostics(&document.text, &document.rope, &DUB_SCHEMA, settings).unwrap_or_default())
}

pub struct Backend {
    client: Client,
    settings: Arc<RwLock<Settings>>,
    documents: Arc<RwLock<HashMap<Url, OpenDocument>>>,
    folders: RwLock<Vec<WorkspaceFolder>>,
    registry: RwLock<Arc<DubRegistry>>,
}

impl Backend {
    pub fn new(client: Client, settings: Settings, registry: DubRegistry) -> Self {
        Backend {
            client,
            settings: Arc::new(RwLock::new(settings)),
            documents: Arc::new(RwLock::new(HashMap::new())),
            folders: RwLock::new(vec![]),
            registry: RwLock::new(Arc::new(registry)),
        }
    }

    /// Build the service with the custom `dub/*` requests registered.
    pub fn service(
        settings: Settings,
        registry: DubRegistry,
    ) -> (LspService<Backend>, tower_lsp::ClientSocket) {
        LspService::build(move |client| Backend::new(client, settings, registry))
            .custom_method("dub/buildTasks", Backend::build_tasks)
            .custom_method("dub/resolveTask", Backend::resolve_task)
            .finish()
    }

    async fn build_tasks(&self) -> Result<Vec<ResolvedTask>> {
        let folders = self.folders.read().await.clone();
        let dub_path = self.settings.read().await.dub_path.clone();
        let tasks = tokio::task::spawn_blocking({
            let folders = folders.clone();
            move || discover_tasks(&folders, &dub_path)
        })
        .await
        .map_err(|err| {
            tracing::error!(error = %err, "task discovery panicked");
            tower_lsp::jsonrpc::Error::internal_error()
        })?;
        Ok(provide_tasks(tasks, &folders))
    }

    async fn resolve_task(&self, definition: DubTaskDefinition) -> Result<ProcessExecution> {
        let settings = self.settings.read().await;
        Ok(resolve_execution(&definition, &settings.dub_path))
    }

    async fn update_document(&self, uri: Url, text: String, version: i32) {
        self.documents
            .write()
            .await
            .insert(uri.clone(), OpenDocument::new(text, version));
        if is_dub_sdl(&uri) {
            self.schedule_diagnostics(uri, version);
        }
    }

    fn schedule_diagnostics(&self, uri: Url, version: i32) {
        let client = self.client.clone();
        let documents = self.documents.clone();
        let settings = self.settings.clone();

        tokio::spawn(async move {
            let delay = settings.read().await.lint_delay_ms;
            tokio::time::sleep(Duration::from_millis(delay)).await;

            let diags = {
                let documents = documents.read().await;
                let settings = settings.read().await;
                match current_diagnostics(&documents, &uri, version, &settings) {
                    Some(diags) => diags,
                    // Closed, or a newer edit scheduled its own publish.
                    None => return,
                }
            };

            tracing::debug!(%uri, version, count = diags.len(), "publishing diagnostics");
            client.publish_diagnostics(uri, diags, Some(version)).await;
        });
    }

    /// Text and byte offset of `position` in an open `dub.sdl`.
    async fn recipe_at(
        &self,
        uri: &Url,
        position: tower_lsp::lsp_types::Position,
    ) -> Option<(String, Rope, usize)> {
        if !is_dub_sdl(uri) {
            return None;
        }
        let documents = self.documents.read().await;
        let document = documents.get(uri)?;
        let offset = byte_offset(&document.rope, position)?;
        Some((document.text.clone(), document.rope.clone(), offset))
    }

    async fn reload_settings(&self, root: Option<PathBuf>) {
        let settings = match root.as_deref().map(Settings::new) {
            Some(Ok(settings)) => settings,
            Some(Err(err)) => {
                self.client
                    .log_message(
                        MessageType::WARNING,
                        format!("Failed to load dub-lsp settings, using defaults: {err}"),
                    )
                    .await;
                Settings::default()
            }
            None => return,
        };

        match DubRegistry::new(&settings) {
            Ok(registry) => *self.registry.write().await = Arc::new(registry),
            Err(err) => tracing::warn!(error = %err, "keeping previous registry client"),
        }
        *self.settings.write().await = settings;
    }
}

#[tower_lsp::async_trait]
impl LanguageServer for Backend {
    async fn initialize(&self, params: InitializeParams) -> Result<InitializeResult> {
        #[allow(deprecated)]
        let folders = params.workspace_folders.clone().unwrap_or_else(|| {
            params
                .root_uri
                .clone()
                .map(|uri| {
                    vec![WorkspaceFolder {
                        name: uri
                            .path_segments()
                            .and_then(|mut s| s.next_back())
                            .unwrap_or_default()
                            .to_string(),
                        uri,
                    }]
                })
                .unwrap_or_default()
        });

        let root = folders
            .first()
            .and_then(|folder| folder.uri.to_file_path().ok());
        self.reload_settings(root).await;
        *self.folders.write().await = folders;

        Ok(InitializeResult {
            server_info: Some(ServerInfo {
                name: env!("CARGO_PKG_NAME").to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
            capabilities: ServerCapabilities {
                text_document_sync: Some(TextDocumentSyncCapability::Kind(
                    TextDocumentSyncKind::FULL,
                )),
                completion_provider: Some(CompletionOptions {
                    resolve_provider: Some(true),
                    trigger_characters: Some(vec![
                        "\"".to_string(),
                        "`".to_string(),
                        "=".to_string(),
                    ]),
                    ..Default::default()
                }),
                hover_provider: Some(HoverProviderCapability::Simple(true)),
                document_symbol_provider: Some(OneOf::Left(true)),
                workspace: Some(WorkspaceServerCapabilities {
                    workspace_folders: Some(WorkspaceFoldersServerCapabilities {
                        supported: Some(true),
                        change_notifications: Some(OneOf::Left(true)),
                    }),
                    file_operations: None,
                }),
                ..Default::default()
            },
        })
    }

    async fn initialized(&self, _: InitializedParams) {
        tracing::info!("dub-lsp initialized");
    }

    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let document = params.text_document;
        self.update_document(document.uri, document.text, document.version)
            .await;
    }

    async fn did_change(&self, mut params: DidChangeTextDocumentParams) {
        // Full sync: the last change carries the whole text.
        let Some(change) = params.content_changes.pop() else {
            return;
        };
        self.update_document(
            params.text_document.uri,
            change.text,
            params.text_document.version,
        )
        .await;
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        let uri = params.text_document.uri;
        self.documents.write().await.remove(&uri);
        if is_dub_sdl(&uri) {
            self.client.publish_diagnostics(uri, vec![], None).await;
        }
    }

    async fn did_change_workspace_folders(&self, params: DidChangeWorkspaceFoldersParams) {
        let mut folders = self.folders.write().await;
        folders.retain(|folder| !params.event.removed.contains(folder));
        folders.extend(params.event.added);
    }

    async fn completion(&self, params: CompletionParams) -> Result<Option<CompletionResponse>> {
        let position = params.text_document_position;
        let Some((text, _, offset)) = self
            .recipe_at(&position.text_document.uri, position.position)
            .await
        else {
            return Ok(None);
        };

        let info = location_info(&text, offset);
        let settings = self.settings.read().await.clone();
        let registry = self.registry.read().await.clone();
        let context = Context {
            schema: &DUB_SCHEMA,
            index: registry.as_ref(),
            settings: &settings,
        };

        let items = get_completions(context, &info).await;
        Ok(Some(completion_response(items)))
    }

    async fn completion_resolve(&self, item: CompletionItem) -> Result<CompletionItem> {
        let registry = self.registry.read().await.clone();
        Ok(resolve_completion(registry.as_ref(), item).await)
    }

    async fn hover(&self, params: HoverParams) -> Result<Option<Hover>> {
        let position = params.text_document_position_params;
        let Some((text, rope, offset)) = self
            .recipe_at(&position.text_document.uri, position.position)
            .await
        else {
            return Ok(None);
        };

        let settings = self.settings.read().await;
        Ok(hover(&sdl::parse(&text), &DUB_SCHEMA, &rope, offset, &settings))
    }

    async fn document_symbol(
        &self,
        params: DocumentSymbolParams,
    ) -> Result<Option<DocumentSymbolResponse>> {
        let uri = params.text_document.uri;
        if !is_dub_sdl(&uri) {
            return Ok(None);
        }
        let documents = self.documents.read().await;
        Ok(documents
            .get(&uri)
            .and_then(|document| document_symbol(&sdl::parse(&document.text), &document.rope)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        tasks::TaskScope,
        test_utils::create_dub_workspace_fixture,
    };
    use tower_lsp::lsp_types::{
        TextDocumentContentChangeEvent, TextDocumentIdentifier, TextDocumentItem,
        VersionedTextDocumentIdentifier,
    };

    fn test_service() -> (LspService<Backend>, tower_lsp::ClientSocket) {
        let settings = Settings::default();
        let registry = DubRegistry::new(&settings).expect("Failed to build registry client");
        Backend::service(settings, registry)
    }

    fn recipe_uri() -> Url {
        Url::parse("file:///work/app/dub.sdl").unwrap()
    }

    async fn open(backend: &Backend, uri: &Url, version: i32, text: &str) {
        backend
            .did_open(DidOpenTextDocumentParams {
                text_document: TextDocumentItem {
                    uri: uri.clone(),
                    language_id: "sdl".to_string(),
                    version,
                    text: text.to_string(),
                },
            })
            .await;
    }

    async fn change(backend: &Backend, uri: &Url, version: i32, text: &str) {
        backend
            .did_change(DidChangeTextDocumentParams {
                text_document: VersionedTextDocumentIdentifier {
                    uri: uri.clone(),
                    version,
                },
                content_changes: vec![TextDocumentContentChangeEvent {
                    range: None,
                    range_length: None,
                    text: text.to_string(),
                }],
            })
            .await;
    }

    #[test]
    fn test_only_dub_sdl_is_a_recipe() {
        assert!(is_dub_sdl(&Url::parse("file:///work/app/dub.sdl").unwrap()));
        assert!(!is_dub_sdl(&Url::parse("file:///work/app/dub.json").unwrap()));
        assert!(!is_dub_sdl(&Url::parse("file:///work/app/my-dub.sdl").unwrap()));
        assert!(!is_dub_sdl(&Url::parse("untitled:Untitled-1").unwrap()));
    }

    #[test]
    fn test_open_document_keeps_rope_in_sync() {
        let document = OpenDocument::new("name \"a\"\nlibs \"b\"".to_string(), 3);
        assert_eq!(document.rope.len_lines(), 2);
        assert_eq!(document.version, 3);
    }

    #[tokio::test]
    async fn test_only_latest_version_publishes() {
        let (service, _socket) = test_service();
        let backend = service.inner();
        let uri = recipe_uri();

        open(backend, &uri, 1, "description \"x\"").await;
        change(backend, &uri, 2, "name \"a\"\ntargetType \"program\"").await;

        let documents = backend.documents.read().await;
        let settings = Settings::default();
        assert!(current_diagnostics(&documents, &uri, 1, &settings).is_none());

        let latest = current_diagnostics(&documents, &uri, 2, &settings).unwrap();
        assert_eq!(latest.len(), 1);
        assert_eq!(latest[0].message, "This is not a valid value");
    }

    #[tokio::test]
    async fn test_close_drops_pending_diagnostics() {
        let (service, _socket) = test_service();
        let backend = service.inner();
        let uri = recipe_uri();

        open(backend, &uri, 1, "description \"x\"").await;
        backend
            .did_close(DidCloseTextDocumentParams {
                text_document: TextDocumentIdentifier { uri: uri.clone() },
            })
            .await;

        let documents = backend.documents.read().await;
        assert!(!documents.contains_key(&uri));
        assert!(current_diagnostics(&documents, &uri, 1, &Settings::default()).is_none());
    }

    #[tokio::test]
    async fn test_resolve_task_request() {
        let (service, _socket) = test_service();
        let definition = DubTaskDefinition {
            test: true,
            cwd: Some("/work/app".to_string()),
            configuration: Some("unittest".to_string()),
            ..Default::default()
        };

        let execution = service.inner().resolve_task(definition).await.unwrap();
        assert_eq!(
            execution,
            ProcessExecution {
                process: "dub".to_string(),
                args: vec!["test".to_string(), "--config=unittest".to_string()],
                cwd: Some("/work/app".to_string()),
            }
        );
    }

    #[tokio::test]
    async fn test_build_tasks_request_uses_workspace_folders() {
        let (_temp_dir, workspace_dir) = create_dub_workspace_fixture();
        let folder = WorkspaceFolder {
            uri: Url::from_directory_path(&workspace_dir).unwrap(),
            name: "workspace".to_string(),
        };

        let (service, _socket) = test_service();
        let backend = service.inner();
        backend
            .initialize(InitializeParams {
                workspace_folders: Some(vec![folder.clone()]),
                ..Default::default()
            })
            .await
            .unwrap();

        let tasks = backend.build_tasks().await.unwrap();
        assert_eq!(tasks.len(), 8);
        assert!(tasks
            .iter()
            .all(|task| task.scope == TaskScope::Folder(folder.clone())));
        assert!(tasks.iter().any(|task| task.name == "test (app)"));
        assert!(tasks.iter().any(|task| task.name == "run (lib)"));
    }
}
