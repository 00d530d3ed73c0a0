//! User-defined symbols: labels, constants and macros.
//!
//! [`SymbolIndex`] scans each open document for RGBDS definitions and keeps
//! them per URL. Hover, completion, go-to-definition and the symbol
//! listings all read from it through [`SymbolLookup`] or its accessors.

use std::collections::{BTreeMap, HashMap};

use tower_lsp::async_trait;
use tower_lsp::jsonrpc::Result;
use tower_lsp::lsp_types::{Position, Range, Url};

use crate::line::split_comment;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Constant,
    Label,
    Macro,
}

/// How a constant was defined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefineType {
    /// `=` or `SET`, may be reassigned.
    Variable,
    /// `EQU`
    NumericConstant,
    /// `RB`, `RW` or `RL`
    OffsetConstant,
    /// `EQUS`
    StringConstant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolInfo {
    pub name: String,
    pub kind: SymbolKind,
    pub define_type: Option<DefineType>,
    pub documentation: Option<String>,
    /// Range of the name in its defining line.
    pub range: Range,
}

/// Read-only access to the symbols visible from a document.
#[async_trait]
pub trait SymbolLookup: Send + Sync {
    async fn symbol(&self, name: &str, document: &Url) -> Result<Option<SymbolInfo>>;
}

/// A lookup that never knows any symbol.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSymbols;

#[async_trait]
impl SymbolLookup for NoSymbols {
    async fn symbol(&self, _name: &str, _document: &Url) -> Result<Option<SymbolInfo>> {
        Ok(None)
    }
}

#[derive(Debug, Default, Clone)]
struct DocumentSymbols {
    symbols: Vec<SymbolInfo>,
    by_name: HashMap<String, usize>,
}

impl DocumentSymbols {
    fn new(symbols: Vec<SymbolInfo>) -> Self {
        let mut by_name = HashMap::new();
        for (idx, symbol) in symbols.iter().enumerate() {
            by_name.entry(symbol.name.clone()).or_insert(idx);
        }
        Self { symbols, by_name }
    }

    fn get(&self, name: &str) -> Option<&SymbolInfo> {
        self.by_name.get(name).map(|&idx| &self.symbols[idx])
    }
}

#[derive(Debug, Default)]
pub struct SymbolIndex {
    documents: BTreeMap<Url, DocumentSymbols>,
}

impl SymbolIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Re-scans `text` and replaces everything previously indexed for `url`.
    pub fn update(&mut self, url: Url, text: &str) {
        self.documents
            .insert(url, DocumentSymbols::new(scan_document(text)));
    }

    pub fn remove(&mut self, url: &Url) {
        self.documents.remove(url);
    }

    /// Finds `name` in `document` first, then in every other indexed document.
    /// Trailing colons are ignored, so `Main::` finds `Main`.
    pub fn find(&self, name: &str, document: &Url) -> Option<&SymbolInfo> {
        let name = name.trim_end_matches(':');
        if name.is_empty() {
            return None;
        }
        if let Some(symbol) = self.documents.get(document).and_then(|d| d.get(name)) {
            return Some(symbol);
        }
        self.documents
            .iter()
            .filter(|(url, _)| *url != document)
            .find_map(|(_, symbols)| symbols.get(name))
    }

    /// Like [`SymbolIndex::find`], also returning the defining document.
    pub fn find_with_url(&self, name: &str, document: &Url) -> Option<(&Url, &SymbolInfo)> {
        let symbol = self.find(name, document)?;
        self.documents
            .iter()
            .find(|(_, symbols)| symbols.symbols.iter().any(|s| std::ptr::eq(s, symbol)))
            .map(|(url, _)| (url, symbol))
    }

    pub fn document_symbols(&self, url: &Url) -> &[SymbolInfo] {
        self.documents
            .get(url)
            .map(|d| d.symbols.as_slice())
            .unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Url, &SymbolInfo)> {
        self.documents
            .iter()
            .flat_map(|(url, d)| d.symbols.iter().map(move |s| (url, s)))
    }
}

#[async_trait]
impl SymbolLookup for SymbolIndex {
    async fn symbol(&self, name: &str, document: &Url) -> Result<Option<SymbolInfo>> {
        Ok(self.find(name, document).cloned())
    }
}

fn define_type(keyword: &str) -> Option<DefineType> {
    match keyword.to_ascii_lowercase().as_str() {
        "equ" => Some(DefineType::NumericConstant),
        "equs" => Some(DefineType::StringConstant),
        "=" | "set" => Some(DefineType::Variable),
        "rb" | "rw" | "rl" => Some(DefineType::OffsetConstant),
        _ => None,
    }
}

fn is_symbol_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '.' => chars
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '#' | '@')),
        _ => false,
    }
}

/// Recognizes the definition on one line of code, if any.
fn definition(code: &str) -> Option<(&str, SymbolKind, Option<DefineType>)> {
    let tokens: Vec<&str> = code.split_whitespace().collect();
    let first = *tokens.first()?;

    let (name, kind, define) = if first.eq_ignore_ascii_case("def") && tokens.len() >= 3 {
        (tokens[1], SymbolKind::Constant, Some(define_type(tokens[2])?))
    } else if first.eq_ignore_ascii_case("macro") && tokens.len() >= 2 {
        (tokens[1].trim_end_matches(','), SymbolKind::Macro, None)
    } else if let Some(label) = first.strip_suffix(':') {
        let label = label.trim_end_matches(':');
        match tokens.get(1) {
            Some(keyword) if keyword.eq_ignore_ascii_case("macro") => {
                (label, SymbolKind::Macro, None)
            }
            _ => (label, SymbolKind::Label, None),
        }
    } else if let Some(define) = tokens.get(1).and_then(|keyword| define_type(keyword)) {
        (first, SymbolKind::Constant, Some(define))
    } else if first.starts_with('.') {
        (first, SymbolKind::Label, None)
    } else {
        return None;
    };

    is_symbol_name(name).then_some((name, kind, define))
}

fn documentation(code: &str, comments: &[&str], trailing: Option<&str>) -> String {
    let mut doc = format!("```gbz80\n{}\n```", code.trim());
    let notes: Vec<&str> = comments
        .iter()
        .copied()
        .chain(trailing)
        .filter(|c| !c.is_empty())
        .collect();
    if !notes.is_empty() {
        doc.push_str("\n\n");
        doc.push_str(&notes.join("\n"));
    }
    doc
}

/// Collects every definition in `text`, in source order.
///
/// Documentation is the defining line in a fenced block, followed by the
/// `;` comment lines directly above it and any comment on the line itself.
pub fn scan_document(text: &str) -> Vec<SymbolInfo> {
    let mut symbols = Vec::new();
    let mut comments: Vec<&str> = Vec::new();

    for (line_idx, line) in text.lines().enumerate() {
        let trimmed = line.trim_start();
        if let Some(comment) = trimmed.strip_prefix(';') {
            comments.push(comment.trim_start_matches(';').trim());
            continue;
        }
        if trimmed.is_empty() {
            comments.clear();
            continue;
        }

        let (code, trailing) = split_comment(line);
        if let Some((name, kind, define_type)) = definition(code) {
            // `name` is a subslice of `line`.
            let start = name.as_ptr() as usize - line.as_ptr() as usize;
            symbols.push(SymbolInfo {
                name: name.to_string(),
                kind,
                define_type,
                documentation: Some(documentation(code, &comments, trailing)),
                range: Range::new(
                    Position::new(line_idx as u32, start as u32),
                    Position::new(line_idx as u32, (start + name.len()) as u32),
                ),
            });
        }
        comments.clear();
    }

    symbols
}
