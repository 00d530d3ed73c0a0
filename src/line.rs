//! Splitting a single source line into an instruction statement.
//!
//! Only one statement per line is understood. Lines that chain statements
//! (`nop :: halt`), carry more than two operands, or otherwise do not look
//! like `mnemonic [operand[, operand]]` are reported as not being a
//! statement at all.

/// Operands of a statement, in source order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operands<'a> {
    None,
    One(&'a str),
    Two(&'a str, &'a str),
}

impl<'a> Operands<'a> {
    pub fn first(&self) -> Option<&'a str> {
        match *self {
            Operands::None => None,
            Operands::One(first) | Operands::Two(first, _) => Some(first),
        }
    }

    pub fn second(&self) -> Option<&'a str> {
        match *self {
            Operands::Two(_, second) => Some(second),
            _ => None,
        }
    }

    pub fn to_vec(&self) -> Vec<&'a str> {
        self.first().into_iter().chain(self.second()).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Statement<'a> {
    pub mnemonic: &'a str,
    pub operands: Operands<'a>,
    /// Comment text after the `;`, with surrounding whitespace removed.
    pub comment: Option<&'a str>,
}

/// Splits `line` into code and the comment following the first `;` that is
/// not inside a string.
pub fn split_comment(line: &str) -> (&str, Option<&str>) {
    let mut in_string = false;
    let mut escaped = false;
    for (idx, c) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            ';' if !in_string => return (&line[..idx], Some(line[idx + 1..].trim())),
            _ => {}
        }
    }
    (line, None)
}

/// Parses a line into its mnemonic and up to two operands.
pub fn split_statement(line: &str) -> Option<Statement<'_>> {
    let (code, comment) = split_comment(line);
    let code = code.trim();
    if code.is_empty() {
        return None;
    }

    let (mnemonic, rest) = match code.find(char::is_whitespace) {
        Some(idx) => (&code[..idx], code[idx..].trim()),
        None => (code, ""),
    };

    let operands = if rest.is_empty() {
        Operands::None
    } else {
        let parts = split_operands(rest)?;
        match parts.as_slice() {
            [first] => Operands::One(*first),
            [first, second] => Operands::Two(*first, *second),
            _ => return None,
        }
    };

    Some(Statement {
        mnemonic,
        operands,
        comment,
    })
}

/// Splits on commas outside brackets and strings, validating each operand.
fn split_operands(text: &str) -> Option<Vec<&str>> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    let mut start = 0;

    for (idx, c) in text.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '[' if !in_string => depth += 1,
            ']' if !in_string => depth = depth.saturating_sub(1),
            ',' if !in_string && depth == 0 => {
                parts.push(operand(&text[start..idx])?);
                start = idx + 1;
            }
            _ => {}
        }
    }
    parts.push(operand(&text[start..])?);

    Some(parts)
}

fn operand(raw: &str) -> Option<&str> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let bracketed = raw.starts_with('[') && raw.ends_with(']');
    if !bracketed && raw.contains(char::is_whitespace) {
        return None;
    }
    Some(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_operands_with_comment() {
        let statement = split_statement("    ld a, $05 ; comment").unwrap();
        assert_eq!(statement.mnemonic, "ld");
        assert_eq!(statement.operands, Operands::Two("a", "$05"));
        assert_eq!(statement.comment, Some("comment"));
    }

    #[test]
    fn bare_mnemonic() {
        let statement = split_statement("\tnop").unwrap();
        assert_eq!(statement.mnemonic, "nop");
        assert_eq!(statement.operands, Operands::None);
        assert_eq!(statement.comment, None);
    }

    #[test]
    fn bracketed_operands() {
        let statement = split_statement("ld [hl], a").unwrap();
        assert_eq!(statement.operands, Operands::Two("[hl]", "a"));

        let statement = split_statement("ld a, [hl + 1]").unwrap();
        assert_eq!(statement.operands, Operands::Two("a", "[hl + 1]"));

        let statement = split_statement("inc [hl]").unwrap();
        assert_eq!(statement.operands, Operands::One("[hl]"));
    }

    #[test]
    fn comma_without_space() {
        let statement = split_statement("ld b,c").unwrap();
        assert_eq!(statement.operands, Operands::Two("b", "c"));
    }

    #[test]
    fn semicolon_inside_string_is_not_a_comment() {
        let (code, comment) = split_comment("db \"a;b\" ; trailing");
        assert_eq!(code, "db \"a;b\" ");
        assert_eq!(comment, Some("trailing"));
    }

    #[test]
    fn escaped_quote_stays_inside_string() {
        let (code, comment) = split_comment(r#"db "a\";b" ; c"#);
        assert_eq!(code, r#"db "a\";b" "#);
        assert_eq!(comment, Some("c"));

        let statement = split_statement(r#"db "x\",y", 1"#).unwrap();
        assert_eq!(statement.operands, Operands::Two(r#""x\",y""#, "1"));
    }

    #[test]
    fn not_a_statement() {
        assert_eq!(split_statement(""), None);
        assert_eq!(split_statement("   ; only a comment"), None);
        assert_eq!(split_statement("nop :: halt"), None);
        assert_eq!(split_statement("ld a, b, c"), None);
        assert_eq!(split_statement("ld a,"), None);
        assert_eq!(split_statement("ld , b"), None);
    }

    #[test]
    fn label_lines_split_as_bare_mnemonic() {
        let statement = split_statement("Main:").unwrap();
        assert_eq!(statement.mnemonic, "Main:");
        assert_eq!(statement.operands.to_vec(), Vec::<&str>::new());
    }

    #[test]
    fn operand_accessors() {
        let operands = Operands::Two("a", "b");
        assert_eq!(operands.first(), Some("a"));
        assert_eq!(operands.second(), Some("b"));
        assert_eq!(Operands::One("a").second(), None);
        assert_eq!(operands.to_vec(), vec!["a", "b"]);
    }
}
