//! Operand classification and instruction signature enumeration.
//!
//! Raw operand text is ambiguous: `c` is both a register and a condition
//! code, and `$05` fits every immediate width. Each operand is therefore
//! mapped to an ordered set of every class it could be, and the candidate
//! signatures are the cartesian product of those sets.

use std::fmt;
use std::str::FromStr;

use phf::phf_set;
use tower_lsp::jsonrpc::Result;
use tower_lsp::lsp_types::Url;

use crate::numbers::looks_numeric;
use crate::symbols::{DefineType, SymbolKind, SymbolLookup};

/// Operand classes used by the canonical instruction signatures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperandClass {
    /// 8-bit register: A, B, C, D, E, H, L
    R8,
    /// General purpose 16-bit register: BC, DE, HL
    R16,
    /// 8-bit immediate
    N8,
    /// 16-bit immediate
    N16,
    /// 8-bit signed offset, -128 to 127
    E8,
    /// 3-bit unsigned immediate, 0 to 7
    U3,
    /// Condition code: Z, NZ, C, NC
    Cc,
    /// RST vector
    Vec,
}

/// Every immediate class, offered whenever an operand could be a number.
pub const LITERAL_CLASSES: [OperandClass; 4] = [
    OperandClass::N8,
    OperandClass::N16,
    OperandClass::E8,
    OperandClass::U3,
];

const R8_REGISTERS: phf::Set<&'static str> = phf_set! {"a", "b", "c", "d", "e", "h", "l"};
const R16_REGISTERS: phf::Set<&'static str> = phf_set! {"bc", "de", "hl"};
const CONDITION_CODES: phf::Set<&'static str> = phf_set! {"z", "nz", "c", "nc"};

impl OperandClass {
    pub fn as_str(self) -> &'static str {
        match self {
            OperandClass::R8 => "r8",
            OperandClass::R16 => "r16",
            OperandClass::N8 => "n8",
            OperandClass::N16 => "n16",
            OperandClass::E8 => "e8",
            OperandClass::U3 => "u3",
            OperandClass::Cc => "cc",
            OperandClass::Vec => "vec",
        }
    }
}

impl fmt::Display for OperandClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperandClass {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "r8" => Ok(OperandClass::R8),
            "r16" => Ok(OperandClass::R16),
            "n8" => Ok(OperandClass::N8),
            "n16" => Ok(OperandClass::N16),
            "e8" => Ok(OperandClass::E8),
            "u3" => Ok(OperandClass::U3),
            "cc" => Ok(OperandClass::Cc),
            "vec" => Ok(OperandClass::Vec),
            _ => Err(()),
        }
    }
}

/// An operand class, possibly as a memory reference (`[r16]`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OperandTag {
    pub class: OperandClass,
    pub bracketed: bool,
}

impl OperandTag {
    pub fn plain(class: OperandClass) -> Self {
        Self {
            class,
            bracketed: false,
        }
    }

    pub fn bracketed(class: OperandClass) -> Self {
        Self {
            class,
            bracketed: true,
        }
    }
}

impl fmt::Display for OperandTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.bracketed {
            write!(f, "[{}]", self.class)
        } else {
            write!(f, "{}", self.class)
        }
    }
}

impl FromStr for OperandTag {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
            Some(inner) => inner.parse().map(OperandTag::bracketed),
            None => s.parse().map(OperandTag::plain),
        }
    }
}

/// Insertion-ordered set of tags an operand could stand for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandidateSet(Vec<OperandTag>);

impl CandidateSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// The full immediate superset, n8, n16, e8, u3.
    pub fn literal() -> Self {
        let mut set = Self::new();
        set.extend_classes(LITERAL_CLASSES);
        set
    }

    pub fn insert(&mut self, tag: OperandTag) {
        if !self.0.contains(&tag) {
            self.0.push(tag);
        }
    }

    fn extend_classes(&mut self, classes: impl IntoIterator<Item = OperandClass>) {
        for class in classes {
            self.insert(OperandTag::plain(class));
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &OperandTag> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Bracketed copies of every tag, then the tags as they are.
    fn wrap_in_brackets(self) -> Self {
        let mut wrapped = Self::new();
        for tag in self.0.iter() {
            wrapped.insert(OperandTag::bracketed(tag.class));
        }
        for tag in self.0 {
            wrapped.insert(tag);
        }
        wrapped
    }
}

impl<'a> IntoIterator for &'a CandidateSet {
    type Item = &'a OperandTag;
    type IntoIter = std::slice::Iter<'a, OperandTag>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Classifies one raw operand as written in the source.
///
/// Memory references (`[hl]`) are classified on their inner text and offered
/// both bracketed and plain, bracketed first. The result is never empty.
pub async fn classify_operand<S>(raw: &str, symbols: &S, document: &Url) -> Result<CandidateSet>
where
    S: SymbolLookup + ?Sized,
{
    match raw.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
        Some(inner) => Ok(classify_inner(inner.trim(), symbols, document)
            .await?
            .wrap_in_brackets()),
        None => classify_inner(raw, symbols, document).await,
    }
}

async fn classify_inner<S>(operand: &str, symbols: &S, document: &Url) -> Result<CandidateSet>
where
    S: SymbolLookup + ?Sized,
{
    let mut candidates = CandidateSet::new();

    if let Some(symbol) = symbols.symbol(operand, document).await? {
        if symbol.kind == SymbolKind::Constant {
            // Every kind of constant could be any immediate for now.
            match symbol.define_type {
                Some(DefineType::Variable)
                | Some(DefineType::NumericConstant)
                | Some(DefineType::OffsetConstant)
                | Some(DefineType::StringConstant)
                | None => candidates.extend_classes(LITERAL_CLASSES),
            }
        }
    }

    let lower = operand.to_ascii_lowercase();
    if R8_REGISTERS.contains(lower.as_str()) {
        candidates.insert(OperandTag::plain(OperandClass::R8));
    }
    if R16_REGISTERS.contains(lower.as_str()) {
        candidates.insert(OperandTag::plain(OperandClass::R16));
    }
    if CONDITION_CODES.contains(lower.as_str()) {
        candidates.insert(OperandTag::plain(OperandClass::Cc));
    }
    if looks_numeric(operand) {
        candidates.extend_classes(LITERAL_CLASSES);
    }

    if candidates.is_empty() {
        return Ok(CandidateSet::literal());
    }
    Ok(candidates)
}

/// Builds every candidate signature for `mnemonic` with the given operand
/// sets, earlier operands varying slowest.
///
/// `ld` with `{r8}` and `{n8, n16}` gives `ld r8, n8` then `ld r8, n16`.
pub fn enumerate_signatures(mnemonic: &str, operands: &[CandidateSet]) -> Vec<String> {
    let mnemonic = mnemonic.to_lowercase();
    let mut combinations: Vec<Vec<OperandTag>> = vec![Vec::new()];
    for set in operands {
        combinations = combinations
            .iter()
            .flat_map(move |prefix| {
                set.iter().map(move |tag| {
                    let mut next = prefix.clone();
                    next.push(*tag);
                    next
                })
            })
            .collect();
    }

    combinations
        .into_iter()
        .map(|tags| {
            if tags.is_empty() {
                mnemonic.clone()
            } else {
                let tags: Vec<String> = tags.iter().map(ToString::to_string).collect();
                format!("{} {}", mnemonic, tags.join(", "))
            }
        })
        .collect()
}
