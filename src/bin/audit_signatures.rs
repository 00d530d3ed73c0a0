use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::Path;

use gbz80lsp::instructions::{InstructionTable, Lookup};
use gbz80lsp::line::split_statement;
use gbz80lsp::operands::{classify_operand, enumerate_signatures, OperandTag};
use gbz80lsp::symbols::SymbolIndex;
use tower_lsp::lsp_types::Url;

// Resolves every statement of an assembly file against the instruction table
// and reports the lines nothing matched. Also lists table entries whose
// operands the classifier can never produce (e.g. literal register names).
#[tokio::main]
async fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!(
            "Usage: audit_signatures <file.asm> [instructions.json]\n\nExample: audit_signatures src/main.asm"
        );
        std::process::exit(2);
    }

    let path = Path::new(&args[1]);
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Could not read {}: {}", path.display(), e);
            std::process::exit(1);
        }
    };
    let table = match args.get(2) {
        Some(json) => InstructionTable::load(Path::new(json)),
        None => InstructionTable::bundled(),
    };
    let table = match table {
        Ok(t) => t,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    let Some(url) = fs::canonicalize(path)
        .ok()
        .and_then(|p| Url::from_file_path(p).ok())
    else {
        eprintln!("Could not build a file URL for {}", path.display());
        std::process::exit(1);
    };
    let mut symbols = SymbolIndex::new();
    symbols.update(url.clone(), &content);

    let mut statements = 0usize;
    let mut unresolved = 0usize;
    let mut used: BTreeSet<String> = BTreeSet::new();

    for (number, line) in content.lines().enumerate() {
        let Some(statement) = split_statement(line) else {
            continue;
        };
        // Labels and directives are statements too; skip what the table has never heard of
        let mnemonic = statement.mnemonic.to_lowercase();
        if table.forms(&mnemonic).is_empty() {
            continue;
        }
        statements += 1;

        let mut operand_sets = Vec::new();
        for operand in statement.operands.to_vec() {
            match classify_operand(operand, &symbols, &url).await {
                Ok(set) => operand_sets.push(set),
                Err(e) => {
                    eprintln!("{}:{}: {}", path.display(), number + 1, e);
                    std::process::exit(1);
                }
            }
        }
        let candidates = enumerate_signatures(statement.mnemonic, &operand_sets);
        match table.lookup(&candidates) {
            Lookup::Found(record) => {
                used.insert(record.name.clone());
            }
            Lookup::NotFound(tried) => {
                unresolved += 1;
                println!("{}:{}: {}", path.display(), number + 1, line.trim());
                for signature in tried {
                    println!("    tried {}", signature);
                }
            }
        }
    }

    let unreachable: BTreeSet<&str> = table
        .records()
        .filter(|record| {
            record
                .name
                .split_once(' ')
                .map(|(_, operands)| {
                    operands
                        .split(", ")
                        .any(|operand| operand.parse::<OperandTag>().is_err())
                })
                .unwrap_or(false)
        })
        .map(|record| record.name.as_str())
        .collect();

    println!("\nInstructions checked: {}", statements);
    println!("Unresolved: {}", unresolved);
    println!("Distinct signatures used: {}", used.len());

    if unreachable.is_empty() {
        println!("\nEvery table entry is reachable by the classifier.");
    } else {
        println!("\nTable entries the classifier never produces:");
        for name in unreachable {
            println!("  - {}", name);
        }
    }
}
