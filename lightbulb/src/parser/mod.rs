mod annotation;
pub mod error;
mod extract;
mod fence;

pub use annotation::compile;
pub use error::{ParseError, ParseErrorKind};
pub use extract::{ANNOTATION_SIGIL, RawBlock, extract};

use tracing::{debug, info};

use crate::Runbook;

/// Parser entry point.
pub struct Parser {
    source: String,
    file_id: usize,
}

impl Parser {
    pub fn new(source: String, file_id: usize) -> Self {
        Parser { source, file_id }
    }

    /// Parse the whole document before anything runs. The first malformed
    /// block aborts the parse.
    pub fn parse(&self) -> Result<Runbook, ParseError> {
        info!("parsing markdown");
        debug!("markdown:\n{}", self.source);

        let raw_blocks = extract(&self.source);
        debug!(count = raw_blocks.len(), "found blocks");

        let blocks = raw_blocks
            .iter()
            .map(|raw| compile(raw, self.file_id))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Runbook {
            blocks,
            source_id: self.file_id,
        })
    }
}
