//! # gbz80 Language Server (gbz80lsp)
//!
//! A Language Server Protocol (LSP) implementation for Game Boy (gbz80)
//! assembly written for RGBDS. It documents whatever is under the cursor:
//! user symbols, numeric literals in every base, and CPU instructions with
//! their timing, size and flag effects.
//!
//! ## Key Features
//! - Hover documentation for symbols, numbers and instructions
//! - Completion for instruction mnemonics and user symbols
//! - Go-to-definition for labels, constants and macros
//! - Document and workspace symbol listings
//!
//! ## Architecture
//! This LSP uses the Tower LSP framework. The main components are:
//! - Document management (full-text sync, one snapshot per URL)
//! - Symbol indexing (`gbz80lsp::symbols`)
//! - Instruction resolution (`gbz80lsp::hover`, `operands`, `instructions`)

use gbz80lsp::hover::{hover_markdown, resolve_hover, word_at, HoverOptions};
use gbz80lsp::instructions::InstructionTable;
use gbz80lsp::symbols::{SymbolIndex, SymbolInfo, SymbolKind as AsmSymbolKind};
use std::fs;
use std::{
    borrow::Cow,
    collections::{HashMap, HashSet},
    net::Ipv4Addr,
    sync::Arc,
};
use tower_lsp::{LanguageServer, LspService, Server};

/// Command-line interface handling
mod cli;

use serde_json::Value;
use tokio::{
    net::{TcpListener, TcpStream},
    sync::RwLock,
};
use tower_lsp::{async_trait, jsonrpc::Result, lsp_types::*, Client};

struct DocumentData {
    content: String,
}

impl DocumentData {
    fn line(&self, line: u32) -> &str {
        self.content.lines().nth(line as usize).unwrap_or("")
    }
}

#[derive(Clone, Debug)]
struct Configuration {
    hover: HoverOptions,
    complete_symbols: bool,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            hover: HoverOptions::default(),
            complete_symbols: true,
        }
    }
}

impl Configuration {
    /// Applies client settings. Missing or non-boolean keys keep their
    /// current value.
    fn update(&mut self, value: &Value) {
        if let Some(hover) = value.get("hover").and_then(Value::as_object) {
            self.hover.numeric_literals = hover
                .get("numeric_literals")
                .and_then(Value::as_bool)
                .unwrap_or(self.hover.numeric_literals);

            self.hover.instructions = hover
                .get("instructions")
                .and_then(Value::as_bool)
                .unwrap_or(self.hover.instructions);
        }

        if let Some(completion) = value.get("completion").and_then(Value::as_object) {
            self.complete_symbols = completion
                .get("symbols")
                .and_then(Value::as_bool)
                .unwrap_or(self.complete_symbols);
        }
    }
}

struct Backend {
    client: Client,
    files: Arc<RwLock<HashMap<Url, DocumentData>>>,
    symbols: Arc<RwLock<SymbolIndex>>,
    instructions: Arc<InstructionTable>,
    config: Arc<RwLock<Configuration>>,
}

fn unknown_document(uri: &Url) -> tower_lsp::jsonrpc::Error {
    tower_lsp::jsonrpc::Error::invalid_params(format!("Unknown document {}", uri))
}

fn lsp_symbol_kind(kind: AsmSymbolKind) -> SymbolKind {
    match kind {
        AsmSymbolKind::Constant => SymbolKind::CONSTANT,
        AsmSymbolKind::Label => SymbolKind::FUNCTION,
        AsmSymbolKind::Macro => SymbolKind::METHOD,
    }
}

#[allow(deprecated)]
fn symbol_information(url: &Url, symbol: &SymbolInfo) -> SymbolInformation {
    SymbolInformation {
        name: symbol.name.clone(),
        kind: lsp_symbol_kind(symbol.kind),
        tags: None,
        deprecated: None,
        location: Location::new(url.clone(), symbol.range),
        container_name: None,
    }
}

fn completion_kind(kind: AsmSymbolKind) -> CompletionItemKind {
    match kind {
        AsmSymbolKind::Constant => CompletionItemKind::CONSTANT,
        AsmSymbolKind::Label => CompletionItemKind::FUNCTION,
        AsmSymbolKind::Macro => CompletionItemKind::METHOD,
    }
}

/// Identifier characters before byte column `character`.
fn completion_prefix(line: &str, character: usize) -> &str {
    let mut end = character.min(line.len());
    while !line.is_char_boundary(end) {
        end -= 1;
    }
    let before = &line[..end];
    let start = before
        .rfind(|c: char| !(c.is_ascii_alphanumeric() || c == '_' || c == '.'))
        .map(|idx| idx + 1)
        .unwrap_or(0);
    &before[start..]
}

#[async_trait]
impl LanguageServer for Backend {
    async fn initialize(&self, params: InitializeParams) -> Result<InitializeResult> {
        let mut utf8_supported = false;
        if let Some(encodings) = params
            .capabilities
            .general
            .and_then(|x| x.position_encodings)
        {
            for encoding in encodings {
                if encoding == PositionEncodingKind::UTF8 {
                    utf8_supported = true;
                }
            }
            if !utf8_supported {
                self.client
                    .show_message(
                        MessageType::WARNING,
                        "Client does not support UTF-8. Non-ASCII characters will cause problems.",
                    )
                    .await;
            }
        }
        if self.instructions.is_empty() {
            self.client
                .show_message(
                    MessageType::WARNING,
                    "Instruction table is empty. Instruction hovers will be unavailable.",
                )
                .await;
        }
        self.client
            .log_message(
                MessageType::INFO,
                format!(
                    "gbz80lsp init: instructions={} mnemonics={}",
                    self.instructions.len(),
                    self.instructions.mnemonics().len()
                ),
            )
            .await;
        Ok(InitializeResult {
            capabilities: ServerCapabilities {
                text_document_sync: Some(TextDocumentSyncCapability::Kind(
                    TextDocumentSyncKind::FULL,
                )),
                execute_command_provider: Some(ExecuteCommandOptions {
                    commands: vec!["version".to_string()],
                    work_done_progress_options: WorkDoneProgressOptions {
                        work_done_progress: None,
                    },
                }),
                hover_provider: Some(HoverProviderCapability::Simple(true)),
                definition_provider: Some(OneOf::Left(true)),
                position_encoding: utf8_supported.then_some(PositionEncodingKind::UTF8),
                document_symbol_provider: Some(OneOf::Left(true)),
                workspace_symbol_provider: Some(OneOf::Left(true)),
                completion_provider: Some(CompletionOptions {
                    resolve_provider: Some(false),
                    trigger_characters: Some(vec![".".to_string()]),
                    ..Default::default()
                }),
                ..Default::default()
            },
            server_info: Some(ServerInfo {
                name: "gbz80lsp".to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
        })
    }

    async fn initialized(&self, _params: InitializedParams) {}

    async fn execute_command(&self, params: ExecuteCommandParams) -> Result<Option<Value>> {
        if params.command == "version" {
            self.client
                .show_message(
                    MessageType::INFO,
                    concat!("gbz80lsp Version: ", env!("CARGO_PKG_VERSION")),
                )
                .await;
        }
        Ok(None)
    }

    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        self.update_content(params.text_document.uri, params.text_document.text)
            .await;
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        for change in params.content_changes {
            // Should only ever be one, because we are getting full updates
            self.update_content(params.text_document.uri.clone(), change.text)
                .await;
        }
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        let uri = params.text_document.uri;
        self.files.write().await.remove(&uri);
        self.symbols.write().await.remove(&uri);
    }

    async fn did_change_configuration(&self, params: DidChangeConfigurationParams) {
        let summary = {
            let mut config = self.config.write().await;
            config.update(&params.settings);
            format!("Configuration updated: {:?}", *config)
        };
        self.client.log_message(MessageType::INFO, summary).await;
    }

    async fn hover(&self, params: HoverParams) -> Result<Option<Hover>> {
        let uri = params.text_document_position_params.text_document.uri;
        let position = params.text_document_position_params.position;

        let files = self.files.read().await;
        let Some(document) = files.get(&uri) else {
            return Err(unknown_document(&uri));
        };
        let options = self.config.read().await.hover;
        let symbols = self.symbols.read().await;

        resolve_hover(
            &self.instructions,
            &*symbols,
            &options,
            &uri,
            &document.content,
            position,
        )
        .await
    }

    async fn completion(&self, params: CompletionParams) -> Result<Option<CompletionResponse>> {
        let uri = params.text_document_position.text_document.uri;
        let position = params.text_document_position.position;

        let files = self.files.read().await;
        let Some(document) = files.get(&uri) else {
            return Err(unknown_document(&uri));
        };
        let line = document.line(position.line);
        let prefix = completion_prefix(line, position.character as usize);
        let lower_prefix = prefix.to_ascii_lowercase();

        let mut items = Vec::new();
        if !prefix.starts_with('.') {
            for mnemonic in self.instructions.mnemonics() {
                if !mnemonic.starts_with(&lower_prefix) {
                    continue;
                }
                let forms: Vec<String> = self
                    .instructions
                    .forms(mnemonic)
                    .iter()
                    .map(|record| format!("- `{}`", record.name))
                    .collect();
                items.push(CompletionItem {
                    label: mnemonic.to_string(),
                    kind: Some(CompletionItemKind::KEYWORD),
                    documentation: Some(Documentation::MarkupContent(MarkupContent {
                        kind: MarkupKind::Markdown,
                        value: forms.join("\n"),
                    })),
                    ..Default::default()
                });
            }
        }

        if self.config.read().await.complete_symbols {
            let symbols = self.symbols.read().await;
            let mut seen = HashSet::new();
            for (_, symbol) in symbols.iter() {
                if !symbol.name.starts_with(prefix) || !seen.insert(symbol.name.as_str()) {
                    continue;
                }
                items.push(CompletionItem {
                    label: symbol.name.clone(),
                    kind: Some(completion_kind(symbol.kind)),
                    documentation: symbol.documentation.clone().map(|value| {
                        Documentation::MarkupContent(MarkupContent {
                            kind: MarkupKind::Markdown,
                            value,
                        })
                    }),
                    ..Default::default()
                });
            }
        }

        Ok(Some(CompletionResponse::Array(items)))
    }

    async fn goto_definition(
        &self,
        params: GotoDefinitionParams,
    ) -> Result<Option<GotoDefinitionResponse>> {
        let uri = params.text_document_position_params.text_document.uri;
        let position = params.text_document_position_params.position;

        let files = self.files.read().await;
        let Some(document) = files.get(&uri) else {
            return Err(unknown_document(&uri));
        };
        let Some((_, _, word)) = word_at(document.line(position.line), position.character as usize)
        else {
            return Ok(None);
        };

        let symbols = self.symbols.read().await;
        Ok(symbols.find_with_url(word, &uri).map(|(url, symbol)| {
            GotoDefinitionResponse::Scalar(Location::new(url.clone(), symbol.range))
        }))
    }

    async fn document_symbol(
        &self,
        params: DocumentSymbolParams,
    ) -> Result<Option<DocumentSymbolResponse>> {
        let uri = params.text_document.uri;
        if !self.files.read().await.contains_key(&uri) {
            return Err(unknown_document(&uri));
        }

        let symbols = self.symbols.read().await;
        let ret = symbols
            .document_symbols(&uri)
            .iter()
            .map(|symbol| symbol_information(&uri, symbol))
            .collect();
        Ok(Some(DocumentSymbolResponse::Flat(ret)))
    }

    async fn symbol(
        &self,
        params: WorkspaceSymbolParams,
    ) -> Result<Option<Vec<SymbolInformation>>> {
        let query = params.query.to_lowercase();
        let symbols = self.symbols.read().await;
        let ret = symbols
            .iter()
            .filter(|(_, symbol)| symbol.name.to_lowercase().contains(&query))
            .map(|(url, symbol)| symbol_information(url, symbol))
            .collect();
        Ok(Some(ret))
    }
}

impl Backend {
    async fn update_content(&self, uri: Url, text: String) {
        self.symbols.write().await.update(uri.clone(), &text);
        self.files
            .write()
            .await
            .insert(uri, DocumentData { content: text });
    }
}

/// One-shot `--hover FILE:LINE:COLUMN`: index the file alone and print the
/// hover markdown.
async fn print_hover(instructions: &InstructionTable, target: &str) {
    let Some((path, line, column)) = cli::parse_hover_target(target) else {
        eprintln!("Invalid hover target {}, expected FILE:LINE:COLUMN", target);
        return;
    };
    let content = match fs::read_to_string(&path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Could not read {}: {}", path.display(), e);
            return;
        }
    };
    let url = match fs::canonicalize(&path).ok().and_then(|p| Url::from_file_path(p).ok()) {
        Some(url) => url,
        None => {
            eprintln!("Could not build a file URL for {}", path.display());
            return;
        }
    };

    let mut symbols = SymbolIndex::new();
    symbols.update(url.clone(), &content);

    println!("Hover for {}:", target);
    match resolve_hover(
        instructions,
        &symbols,
        &HoverOptions::default(),
        &url,
        &content,
        Position::new(line, column),
    )
    .await
    {
        Ok(Some(hover)) => println!("{}", hover_markdown(&hover).unwrap_or_default()),
        Ok(None) => println!("  (no hover)"),
        Err(e) => eprintln!("  error: {}", e),
    }
    println!();
}

#[tokio::main]
async fn main() {
    use clap::Parser as _;
    let cli = cli::Cli::parse();

    let table = match &cli.instructions {
        Some(path) => InstructionTable::load(path),
        None => InstructionTable::bundled(),
    };
    let instructions = match table {
        Ok(table) => Arc::new(table),
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    if !cli.hover.is_empty() {
        for target in &cli.hover {
            print_hover(&instructions, target).await;
        }
        return;
    }

    let (service, socket) = LspService::new(|client| Backend {
        client,
        files: Arc::new(RwLock::new(HashMap::new())),
        symbols: Arc::new(RwLock::new(SymbolIndex::new())),
        instructions,
        config: Arc::new(RwLock::new(Configuration::default())),
    });

    if !cli.listen && cli.host.is_none() {
        // stdin/stdout
        Server::new(tokio::io::stdin(), tokio::io::stdout(), socket)
            .serve(service)
            .await;
    } else if cli.listen {
        // listen

        let host = cli
            .host
            .map(Cow::Owned)
            .unwrap_or(Cow::Borrowed("127.0.0.1"))
            .parse::<Ipv4Addr>()
            .expect("Could not parse IP address");

        let port = cli.port.unwrap_or(9257);

        let stream = {
            let listener = TcpListener::bind((host, port))
                .await
                .expect("Could not bind TCP listener");
            let (stream, _) = listener
                .accept()
                .await
                .expect("Could not accept TCP connection");
            stream
        };

        let (input, output) = tokio::io::split(stream);
        Server::new(input, output, socket).serve(service).await;
    } else {
        let host = cli.host.expect("No host given");
        let port = cli.port.expect("No port given");

        let stream = TcpStream::connect((host, port))
            .await
            .expect("Could not open TCP stream");

        let (input, output) = tokio::io::split(stream);
        Server::new(input, output, socket).serve(service).await;
    }
}
