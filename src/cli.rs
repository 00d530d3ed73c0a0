use std::path::PathBuf;

use clap::Parser;

/// Language server for RGBDS gbz80 assembly.
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub(crate) struct Cli {
    /// Listen for a TCP connection instead of using stdin/stdout
    #[arg(short, long)]
    pub listen: bool,

    /// Host to listen on, or to connect to when not listening
    #[arg(long)]
    pub host: Option<String>,

    /// TCP port (defaults to 9257 when listening)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Instruction metadata JSON to use instead of the bundled table
    #[arg(long, value_name = "PATH")]
    pub instructions: Option<PathBuf>,

    /// Print the hover at FILE:LINE:COLUMN (zero-based, byte column) and exit
    #[arg(long, value_name = "FILE:LINE:COLUMN")]
    pub hover: Vec<String>,
}

/// Splits `FILE:LINE:COLUMN`, taking the last two fields so the path may
/// itself contain colons.
pub(crate) fn parse_hover_target(target: &str) -> Option<(PathBuf, u32, u32)> {
    let mut parts = target.rsplitn(3, ':');
    let column = parts.next()?.parse().ok()?;
    let line = parts.next()?.parse().ok()?;
    let path = parts.next().filter(|p| !p.is_empty())?;
    Some((PathBuf::from(path), line, column))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hover_target() {
        assert_eq!(
            parse_hover_target("src/main.asm:12:4"),
            Some((PathBuf::from("src/main.asm"), 12, 4))
        );
        assert_eq!(
            parse_hover_target("C:/game/main.asm:0:0"),
            Some((PathBuf::from("C:/game/main.asm"), 0, 0))
        );
        assert_eq!(parse_hover_target("main.asm:12"), None);
        assert_eq!(parse_hover_target(":1:2"), None);
        assert_eq!(parse_hover_target("main.asm:x:2"), None);
    }

    #[test]
    fn test_cli_flags() {
        let cli = Cli::parse_from([
            "gbz80lsp",
            "--hover",
            "a.asm:0:1",
            "--hover",
            "b.asm:2:3",
            "--instructions",
            "table.json",
        ]);
        assert_eq!(cli.hover.len(), 2);
        assert_eq!(cli.instructions, Some(PathBuf::from("table.json")));
        assert!(!cli.listen);
    }
}
