//! Hover resolution: symbol documentation, numeric literals and instructions.

use tower_lsp::jsonrpc::Result;
use tower_lsp::lsp_types::{Hover, HoverContents, MarkupContent, MarkupKind, Position, Range, Url};

use crate::instructions::{not_found_markdown, InstructionTable, Lookup};
use crate::line::split_statement;
use crate::numbers::NumericLiteral;
use crate::operands::{classify_operand, enumerate_signatures};
use crate::symbols::SymbolLookup;

/// Which interpretations besides symbol documentation are offered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HoverOptions {
    pub numeric_literals: bool,
    pub instructions: bool,
}

impl Default for HoverOptions {
    fn default() -> Self {
        Self {
            numeric_literals: true,
            instructions: true,
        }
    }
}

fn scan_while(bytes: &[u8], mut idx: usize, pred: impl Fn(u8) -> bool) -> usize {
    while idx < bytes.len() && pred(bytes[idx]) {
        idx += 1;
    }
    idx
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// End of the token starting at `start`, if one starts there.
fn token_end(bytes: &[u8], start: usize) -> Option<usize> {
    let at = |idx: usize| bytes.get(idx).copied();
    let first = at(start)?;

    let prefixed = |digit: fn(u8) -> bool| -> Option<usize> {
        let d = at(start + 1)?;
        digit(d).then(|| scan_while(bytes, start + 2, |b| b == b'_' || digit(b)))
    };
    match first {
        b'$' => return prefixed(|b| b.is_ascii_hexdigit()),
        b'%' => return prefixed(|b| matches!(b, b'0' | b'1')),
        b'&' => return prefixed(|b| matches!(b, b'0'..=b'7')),
        b'`' => return prefixed(|b| matches!(b, b'0'..=b'3')),
        _ => {}
    }

    if first.is_ascii_digit() {
        let end = scan_while(bytes, start + 1, |b| b == b'_' || b.is_ascii_digit());
        if at(end) == Some(b'.') && at(end + 1).map_or(false, |b| b.is_ascii_digit()) {
            return Some(scan_while(bytes, end + 1, |b| b.is_ascii_digit()));
        }
        return Some(end);
    }

    let name_start = if first == b'.' { start + 1 } else { start };
    let name_first = at(name_start)?;
    if !(name_first.is_ascii_alphabetic() || name_first == b'_') {
        return None;
    }
    let end = scan_while(bytes, name_start + 1, is_word_byte);
    if at(end) == Some(b'\\') && at(end + 1) == Some(b'@') {
        return Some(end + 2);
    }
    Some(scan_while(bytes, end, |b| b == b':'))
}

/// The token touching byte column `character`, with its span.
///
/// Tokens are numeric literals (`$1F`, `%101`, `&17`, `` `0123 ``, `12`,
/// `1.5`) and identifiers, including local labels, trailing colons and the
/// `\@` macro suffix. A cursor just past the end still counts as touching.
pub fn word_at(line: &str, character: usize) -> Option<(usize, usize, &str)> {
    let bytes = line.as_bytes();
    let mut idx = 0;
    while idx < bytes.len() {
        match token_end(bytes, idx) {
            Some(end) => {
                if idx <= character && character <= end {
                    return Some((idx, end, &line[idx..end]));
                }
                idx = end;
            }
            None => idx += 1,
        }
        if idx > character {
            break;
        }
    }
    None
}

fn markdown_hover(markdown: String, line: u32, start: usize, end: usize) -> Hover {
    Hover {
        contents: HoverContents::Markup(MarkupContent {
            kind: MarkupKind::Markdown,
            value: markdown,
        }),
        range: Some(Range::new(
            Position::new(line, start as u32),
            Position::new(line, end as u32),
        )),
    }
}

/// Resolves the hover for `position` in `text`, the content of `document`.
///
/// In order: documented symbol, numeric literal, then the instruction when
/// the cursor is on the mnemonic of the statement on that line. Anything
/// else, including an operand of a statement, has no hover.
pub async fn resolve_hover<S>(
    instructions: &InstructionTable,
    symbols: &S,
    options: &HoverOptions,
    document: &Url,
    text: &str,
    position: Position,
) -> Result<Option<Hover>>
where
    S: SymbolLookup + ?Sized,
{
    let Some(line) = text.lines().nth(position.line as usize) else {
        return Ok(None);
    };
    let Some((start, end, word)) = word_at(line, position.character as usize) else {
        return Ok(None);
    };
    let hover = |markdown: String| Some(markdown_hover(markdown, position.line, start, end));

    if let Some(symbol) = symbols.symbol(word, document).await? {
        if let Some(documentation) = symbol.documentation.filter(|d| !d.is_empty()) {
            return Ok(hover(documentation));
        }
    }

    if options.numeric_literals {
        if let Some(literal) = NumericLiteral::parse(word) {
            return Ok(hover(literal.to_markdown()));
        }
    }

    if !options.instructions {
        return Ok(None);
    }
    let Some(statement) = split_statement(line) else {
        return Ok(None);
    };
    // `mnemonic` is a subslice of `line`.
    let mnemonic_start = statement.mnemonic.as_ptr() as usize - line.as_ptr() as usize;
    if statement.mnemonic != word || mnemonic_start != start {
        return Ok(None);
    }

    let mut operand_sets = Vec::new();
    for operand in statement.operands.to_vec() {
        operand_sets.push(classify_operand(operand, symbols, document).await?);
    }
    let candidates = enumerate_signatures(statement.mnemonic, &operand_sets);

    let markdown = match instructions.lookup(&candidates) {
        Lookup::Found(record) => record.to_markdown(),
        Lookup::NotFound(tried) => not_found_markdown(word, &tried),
    };
    Ok(hover(markdown))
}

/// Plain markdown of a hover produced by [`resolve_hover`].
pub fn hover_markdown(hover: &Hover) -> Option<&str> {
    match &hover.contents {
        HoverContents::Markup(markup) => Some(markup.value.as_str()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbols::{DefineType, NoSymbols, SymbolIndex, SymbolInfo, SymbolKind};
    use tower_lsp::async_trait;

    fn document() -> Url {
        Url::parse("file:///project/main.asm").unwrap()
    }

    async fn hover_with<S: SymbolLookup>(
        symbols: &S,
        text: &str,
        line: u32,
        character: u32,
    ) -> Option<String> {
        let table = InstructionTable::bundled().unwrap();
        resolve_hover(
            &table,
            symbols,
            &HoverOptions::default(),
            &document(),
            text,
            Position::new(line, character),
        )
        .await
        .unwrap()
        .and_then(|h| hover_markdown(&h).map(str::to_string))
    }

    async fn hover_at(text: &str, line: u32, character: u32) -> Option<String> {
        hover_with(&NoSymbols, text, line, character).await
    }

    #[test]
    fn words() {
        let line = "    ld a, [$FF00] ; 12.5 %10 &7 `01 .loop\\@ Main::";
        assert_eq!(word_at(line, 5).map(|w| w.2), Some("ld"));
        assert_eq!(word_at(line, 6).map(|w| w.2), Some("ld"));
        assert_eq!(word_at(line, 8).map(|w| w.2), Some("a"));
        assert_eq!(word_at(line, 12).map(|w| w.2), Some("$FF00"));
        assert_eq!(word_at(line, 22).map(|w| w.2), Some("12.5"));
        assert_eq!(word_at(line, 27).map(|w| w.2), Some("%10"));
        assert_eq!(word_at(line, 31).map(|w| w.2), Some("&7"));
        assert_eq!(word_at(line, 34).map(|w| w.2), Some("`01"));
        assert_eq!(word_at(line, 40).map(|w| w.2), Some(".loop\\@"));
        assert_eq!(word_at(line, 46).map(|w| w.2), Some("Main::"));
        assert_eq!(word_at(line, 1), None);
        assert_eq!(word_at("", 0), None);
    }

    #[tokio::test]
    async fn instruction_on_mnemonic() {
        let markdown = hover_at("    ld a, $05 ; comment", 0, 5).await.unwrap();
        let table = InstructionTable::bundled().unwrap();
        assert_eq!(markdown, table.get("ld r8, n8").unwrap().to_markdown());
        assert_eq!(
            markdown,
            "`ld r8, n8`  \\\nLoad value n8 into register r8.  \\\n  \\\n**Cycles:** 2 **Bytes:** 2"
        );
    }

    #[tokio::test]
    async fn instruction_with_flags() {
        let markdown = hover_at("inc b", 0, 1).await.unwrap();
        assert!(markdown.starts_with("`inc r8`"));
        assert!(markdown.contains("**Flags:**  \\\n\\- Z: Set if result is 0."));
        assert!(!markdown.contains("\\- C:"));
    }

    #[tokio::test]
    async fn conditional_jump_tries_condition_codes_in_order() {
        let markdown = hover_at("    jp c, label", 0, 4).await.unwrap();
        assert!(markdown.starts_with("`jp cc, n16`"), "{}", markdown);

        let candidates = enumerate_signatures(
            "jp",
            &[
                classify_operand("c", &NoSymbols, &document()).await.unwrap(),
                classify_operand("label", &NoSymbols, &document()).await.unwrap(),
            ],
        );
        let cc: Vec<&str> = candidates
            .iter()
            .map(String::as_str)
            .filter(|c| c.starts_with("jp cc"))
            .collect();
        assert_eq!(cc, vec!["jp cc, n8", "jp cc, n16", "jp cc, e8", "jp cc, u3"]);
    }

    #[tokio::test]
    async fn miss_lists_every_attempt() {
        let markdown = hover_at("ld a, [hl]", 0, 0).await.unwrap();
        assert_eq!(
            markdown,
            "*No information found for `ld`.*  \nTried searching for:  \n- `ld r8, [r16]`  \n- `ld r8, r16`"
        );
    }

    #[tokio::test]
    async fn operands_do_not_trigger_lookup() {
        assert_eq!(hover_at("ld a, b", 0, 3).await, None);
        assert_eq!(hover_at("jp c, label", 0, 8).await, None);
    }

    #[tokio::test]
    async fn mnemonic_text_in_comment_is_not_the_mnemonic() {
        let line = "    inc b ; inc the counter";
        assert!(hover_at(line, 0, 5).await.is_some());
        assert_eq!(hover_at(line, 0, 13).await, None);
    }

    #[tokio::test]
    async fn numeric_literals() {
        assert_eq!(
            hover_at("ld a, $1A", 0, 7).await.as_deref(),
            Some("`26`\n\n`$1a`\n\n`%11010`")
        );
        assert_eq!(hover_at("db 1.5", 0, 4).await, None);
    }

    #[tokio::test]
    async fn symbols_documentation_comes_first() {
        let mut index = SymbolIndex::new();
        let text = "; Player speed\nSPEED EQU 3\n    ld a, SPEED\n";
        index.update(document(), text);
        assert_eq!(
            hover_with(&index, text, 2, 12).await.as_deref(),
            Some("```gbz80\nSPEED EQU 3\n```\n\nPlayer speed")
        );
        // Constant operands are immediates.
        let markdown = hover_with(&index, text, 2, 5).await.unwrap();
        assert!(markdown.starts_with("`ld r8, n8`"));
    }

    struct NumberNamedSymbol;

    #[async_trait]
    impl SymbolLookup for NumberNamedSymbol {
        async fn symbol(&self, name: &str, _document: &Url) -> Result<Option<SymbolInfo>> {
            Ok((name == "42").then(|| SymbolInfo {
                name: name.to_string(),
                kind: SymbolKind::Constant,
                define_type: Some(DefineType::NumericConstant),
                documentation: Some("The answer.".to_string()),
                range: Range::default(),
            }))
        }
    }

    #[tokio::test]
    async fn documented_symbol_wins_over_number() {
        assert_eq!(
            hover_with(&NumberNamedSymbol, "db 42", 0, 4).await.as_deref(),
            Some("The answer.")
        );
    }

    struct FailingSymbols;

    #[async_trait]
    impl SymbolLookup for FailingSymbols {
        async fn symbol(&self, _name: &str, _document: &Url) -> Result<Option<SymbolInfo>> {
            Err(tower_lsp::jsonrpc::Error::internal_error())
        }
    }

    #[tokio::test]
    async fn lookup_failures_propagate() {
        let table = InstructionTable::bundled().unwrap();
        let result = resolve_hover(
            &table,
            &FailingSymbols,
            &HoverOptions::default(),
            &document(),
            "nop",
            Position::new(0, 1),
        )
        .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn options_disable_interpretations() {
        let table = InstructionTable::bundled().unwrap();
        let options = HoverOptions {
            numeric_literals: false,
            instructions: false,
        };
        for (text, character) in [("ld a, $05", 7), ("ld a, $05", 0)] {
            let hover = resolve_hover(
                &table,
                &NoSymbols,
                &options,
                &document(),
                text,
                Position::new(0, character),
            )
            .await
            .unwrap();
            assert!(hover.is_none());
        }
    }

    #[tokio::test]
    async fn hover_range_covers_token() {
        let table = InstructionTable::bundled().unwrap();
        let hover = resolve_hover(
            &table,
            &NoSymbols,
            &HoverOptions::default(),
            &document(),
            "\n  halt\n",
            Position::new(1, 3),
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(
            hover.range,
            Some(Range::new(Position::new(1, 2), Position::new(1, 6)))
        );
        assert!(hover_markdown(&hover).unwrap().starts_with("`halt`"));
    }

    #[tokio::test]
    async fn non_statements_have_no_hover() {
        assert_eq!(hover_at("nop :: halt", 0, 1).await, None);
        assert_eq!(hover_at("; just words", 0, 3).await, None);
    }
}
