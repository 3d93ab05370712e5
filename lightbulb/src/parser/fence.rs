use std::ops::Range;

const FENCE_CHAR: char = '`';
const MIN_FENCE_LEN: usize = 3;
const MAX_INDENT: usize = 3;

/// A backtick-fenced code region. Offsets are relative to the scanned text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Fence {
    /// Start of the opening fence line.
    pub start: usize,
    /// Info string after the opening backticks, trimmed.
    pub language: String,
    /// Everything between the opening line and the closing fence line.
    pub body: Range<usize>,
    /// Just past the closing backticks.
    pub end: usize,
}

/// Find the first fenced region at or after `from`.
///
/// A closing fence is the first later line of at least as many backticks as
/// the opener, followed by nothing but whitespace. Returns `None` when no
/// opener exists or the opener is never closed.
pub(crate) fn find_fence(text: &str, from: usize) -> Option<Fence> {
    let mut lines = lines_from(text, from);

    let (start, indent, width) = lines.find_map(|(offset, line)| {
        fence_marker(line).map(|(indent, width)| (offset, indent, width))
    })?;
    let opener = &text[start..];
    let opener_end = opener.find('\n').map(|p| start + p + 1).unwrap_or(text.len());
    let language = text[start + indent + width..opener_end].trim().to_string();

    for (offset, line) in lines {
        let Some((indent, count)) = fence_marker(line) else {
            continue;
        };
        if count >= width && line[indent + count..].trim().is_empty() {
            return Some(Fence {
                start,
                language,
                body: opener_end..offset,
                end: offset + indent + count,
            });
        }
    }

    None
}

/// Lines of `text[from..]` (newline included) paired with their offsets.
fn lines_from(text: &str, from: usize) -> impl Iterator<Item = (usize, &str)> {
    let mut offset = from;
    text[from..].split_inclusive('\n').map(move |line| {
        let start = offset;
        offset += line.len();
        (start, line)
    })
}

/// Leading indentation and backtick run of a fence line.
fn fence_marker(line: &str) -> Option<(usize, usize)> {
    let trimmed = line.trim_start_matches(' ');
    let indent = line.len() - trimmed.len();
    if indent > MAX_INDENT {
        return None;
    }
    let width = trimmed.chars().take_while(|c| *c == FENCE_CHAR).count();
    (width >= MIN_FENCE_LEN).then_some((indent, width))
}
