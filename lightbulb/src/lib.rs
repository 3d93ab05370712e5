pub mod block;
pub mod parser;
pub mod source;

pub use block::{Action, Block};

/// A parsed lightbulb document: every annotated block, in source order.
#[derive(Debug, Clone)]
pub struct Runbook {
    pub blocks: Vec<Block>,
    /// The source file ID (for error reporting with codespan-reporting).
    pub source_id: usize,
}
