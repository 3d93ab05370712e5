use std::ops::Range;

use pulldown_cmark::{CodeBlockKind, Event, Parser as CmarkParser, Tag};
use tracing::warn;

use crate::parser::fence::find_fence;

/// The comment sigil and namespace that open every annotation.
pub const ANNOTATION_SIGIL: &str = "<!-- lightbulb:";

/// An annotation and the fenced code after it, isolated from the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawBlock<'a> {
    /// From `<!--` through the closing fence.
    pub text: &'a str,
    /// Byte span of `text` in the document.
    pub span: Range<usize>,
}

/// Find every annotation+fence unit in document order.
///
/// An annotation is an HTML block starting with [`ANNOTATION_SIGIL`]. It pairs
/// with the backtick fence that immediately follows it; any other block in
/// between orphans the annotation, which is dropped. Never fails.
pub fn extract(source: &str) -> Vec<RawBlock<'_>> {
    let mut blocks = Vec::new();
    // Start offset of an annotation still waiting for its fence.
    let mut pending: Option<usize> = None;

    for (event, range) in CmarkParser::new(source).into_offset_iter() {
        match event {
            Event::Start(Tag::HtmlBlock) => {
                let html = &source[range.clone()];
                let trimmed = html.trim_start();
                let annotation = trimmed
                    .starts_with(ANNOTATION_SIGIL)
                    .then(|| range.start + (html.len() - trimmed.len()));
                orphan(&mut pending);
                pending = annotation;
            }
            Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(_))) => {
                let Some(start) = pending.take() else {
                    continue;
                };
                // The opener must be the block's own first line; a backtick
                // run further down is content of a `~~~` block.
                match find_fence(&source[range.clone()], 0) {
                    Some(fence) if fence.start == 0 => {
                        let end = range.start + fence.end;
                        blocks.push(RawBlock {
                            text: &source[start..end],
                            span: start..end,
                        });
                    }
                    _ => warn!(offset = start, "annotation is not followed by a closed backtick fence, dropping"),
                }
            }
            Event::Start(_) | Event::Rule => orphan(&mut pending),
            _ => {}
        }
    }
    orphan(&mut pending);

    blocks
}

fn orphan(pending: &mut Option<usize>) {
    if let Some(offset) = pending.take() {
        warn!(offset, "annotation is not followed by a fenced code block, dropping");
    }
}
