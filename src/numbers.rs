//! Numeric literal recognition for RGBDS-style gbz80 source.
//!
//! Four integer forms are understood: `$1A` (hex), `%1010` (binary), `&17`
//! (octal) and plain decimal `26`. Every form accepts `_` as a digit group
//! separator after its first digit. Fixed-point literals such as `1.5` are
//! recognized so they can be excluded from integer handling.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Radix {
    Binary,
    Octal,
    Decimal,
    Hexadecimal,
}

impl Radix {
    pub fn base(self) -> u32 {
        match self {
            Radix::Binary => 2,
            Radix::Octal => 8,
            Radix::Decimal => 10,
            Radix::Hexadecimal => 16,
        }
    }

    fn prefix(self) -> Option<char> {
        match self {
            Radix::Binary => Some('%'),
            Radix::Octal => Some('&'),
            Radix::Decimal => None,
            Radix::Hexadecimal => Some('$'),
        }
    }
}

/// An integer literal together with the base it was written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NumericLiteral {
    pub value: u64,
    pub radix: Radix,
}

impl NumericLiteral {
    /// Parses a whole token as an integer literal.
    ///
    /// Returns `None` for anything that is not exactly one of the integer
    /// forms, including fixed-point literals and values wider than 64 bits.
    pub fn parse(text: &str) -> Option<Self> {
        if is_fixed_point(text) {
            return None;
        }
        for radix in [Radix::Hexadecimal, Radix::Binary, Radix::Octal] {
            if let Some(digits) = radix.prefix().and_then(|p| text.strip_prefix(p)) {
                return Self::from_digits(digits, radix);
            }
        }
        Self::from_digits(text, Radix::Decimal)
    }

    fn from_digits(digits: &str, radix: Radix) -> Option<Self> {
        if !is_digit_run(digits, radix.base()) {
            return None;
        }
        let cleaned: String = digits.chars().filter(|&c| c != '_').collect();
        u64::from_str_radix(&cleaned, radix.base())
            .ok()
            .map(|value| NumericLiteral { value, radix })
    }

    pub fn to_decimal(&self) -> String {
        self.value.to_string()
    }

    /// Lower-case hexadecimal digits without a prefix.
    pub fn to_hex(&self) -> String {
        format!("{:x}", self.value)
    }

    pub fn to_binary(&self) -> String {
        format!("{:b}", self.value)
    }

    /// Hover payload showing the value in decimal, hex and binary.
    pub fn to_markdown(&self) -> String {
        format!(
            "`{}`\n\n`${}`\n\n`%{}`",
            self.to_decimal(),
            self.to_hex(),
            self.to_binary()
        )
    }
}

/// A digit of `base` first, then digits or `_` separators.
fn is_digit_run(text: &str, base: u32) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) if first.is_digit(base) => chars.all(|c| c == '_' || c.is_digit(base)),
        _ => false,
    }
}

/// Decimal digits, a `.`, then at least one more decimal digit (`12.5`, `1_000.25`).
pub fn is_fixed_point(text: &str) -> bool {
    match text.split_once('.') {
        Some((whole, fraction)) => {
            is_digit_run(whole, 10)
                && !fraction.is_empty()
                && fraction.chars().all(|c| c.is_ascii_digit())
        }
        None => false,
    }
}

/// Loose "is this a number at all" test used when classifying operands.
///
/// Accepts every integer literal form, fixed-point literals, signed decimal
/// integers and floats (`-5`, `1e3`) and `0x`/`0o`/`0b` prefixed integers.
pub fn looks_numeric(text: &str) -> bool {
    let text = text.trim();
    if text.is_empty() {
        return false;
    }
    if NumericLiteral::parse(text).is_some() || is_fixed_point(text) {
        return true;
    }

    let unsigned = text
        .strip_prefix('-')
        .or_else(|| text.strip_prefix('+'))
        .unwrap_or(text);
    let lower = unsigned.to_ascii_lowercase();
    for (prefix, base) in [("0x", 16), ("0o", 8), ("0b", 2)] {
        if let Some(digits) = lower.strip_prefix(prefix) {
            return !digits.is_empty() && u64::from_str_radix(digits, base).is_ok();
        }
    }

    // `f64::from_str` also takes "inf" and "nan", which are not numbers here.
    let starts_like_number = unsigned
        .chars()
        .next()
        .map_or(false, |c| c.is_ascii_digit() || c == '.');
    starts_like_number && unsigned.parse::<f64>().is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex() {
        let literal = NumericLiteral::parse("$1A").unwrap();
        assert_eq!(literal.value, 26);
        assert_eq!(literal.radix, Radix::Hexadecimal);
        assert_eq!(literal.to_decimal(), "26");
        assert_eq!(literal.to_hex(), "1a");
        assert_eq!(NumericLiteral::parse("$FF_FF").map(|l| l.value), Some(0xffff));
    }

    #[test]
    fn test_decimal_rendering_round_trips_to_hex() {
        let decimal = NumericLiteral::parse("$1A").unwrap().to_decimal();
        let again = NumericLiteral::parse(&decimal).unwrap();
        assert!(again.to_hex().eq_ignore_ascii_case("1A"));
    }

    #[test]
    fn test_parse_binary_and_octal() {
        assert_eq!(NumericLiteral::parse("%1010").map(|l| l.value), Some(10));
        assert_eq!(NumericLiteral::parse("%1111_0000").map(|l| l.value), Some(0xf0));
        assert_eq!(NumericLiteral::parse("&17").map(|l| l.value), Some(15));
        assert_eq!(NumericLiteral::parse("&1_7").unwrap().radix, Radix::Octal);
    }

    #[test]
    fn test_parse_decimal_strips_every_separator() {
        assert_eq!(NumericLiteral::parse("1_000_000").map(|l| l.value), Some(1_000_000));
        assert_eq!(NumericLiteral::parse("0").map(|l| l.value), Some(0));
    }

    #[test]
    fn test_rejects_non_literals() {
        for text in [
            "", "$", "%", "&", "$G1", "%102", "&8", "_12", "$_1", "12a", "hl", "-5", "1.5",
            "12.", "0x10", "99999999999999999999999",
        ] {
            assert_eq!(NumericLiteral::parse(text), None, "{:?}", text);
        }
    }

    #[test]
    fn test_fixed_point() {
        assert!(is_fixed_point("1.5"));
        assert!(is_fixed_point("1_000.25"));
        assert!(!is_fixed_point("1."));
        assert!(!is_fixed_point(".5"));
        assert!(!is_fixed_point("15"));
        assert!(!is_fixed_point("1.2.3"));
    }

    #[test]
    fn test_markdown() {
        let literal = NumericLiteral::parse("%11010").unwrap();
        assert_eq!(literal.to_markdown(), "`26`\n\n`$1a`\n\n`%11010`");
    }

    #[test]
    fn test_looks_numeric() {
        for text in ["$05", "%1", "&7", "42", "1.5", "-5", "+3", "1e3", "0x1F", "0b101", ".5"] {
            assert!(looks_numeric(text), "{:?}", text);
        }
        for text in ["", "a", "hl", "label", "inf", "NaN", "0x", "$", "0xZZ", "1.2.3"] {
            assert!(!looks_numeric(text), "{:?}", text);
        }
    }
}
