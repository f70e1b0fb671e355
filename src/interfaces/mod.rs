//! File-based adapters used by the command-line replay tool.

pub mod catalog_file;
pub mod csv;
pub mod jsonl;
