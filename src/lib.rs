//! Hover, completion and navigation support for RGBDS gbz80 assembly.
//!
//! The binary in `main.rs` wires these modules into a tower-lsp server. The
//! modules are usable on their own, `src/bin/audit_signatures.rs` drives the
//! same resolution code over whole files.

pub mod hover;
pub mod instructions;
pub mod line;
pub mod numbers;
pub mod operands;
pub mod symbols;
