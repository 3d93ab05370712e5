use std::collections::BTreeSet;
use std::ops::Range;

use tracing::debug;

use crate::block::{Action, Block, Parameter, default_tags};
use crate::parser::error::{ParseError, ParseErrorKind};
use crate::parser::extract::RawBlock;
use crate::parser::fence::find_fence;

const COMMENT_OPEN: &str = "<!--";
const COMMENT_CLOSE: &str = "-->";
const NAMESPACE: &str = "lightbulb:";

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Compile one raw unit into a [`Block`].
///
/// Unknown keys are rejected. Required parameters are checked once every
/// pair has been read, in declaration order, so the first missing one in
/// that order is reported.
pub fn compile(raw: &RawBlock<'_>, file_id: usize) -> Result<Block, ParseError> {
    debug!("compiling block:\n{}", raw.text);
    let cx = Context { raw, file_id };

    let annotation = cx.locate_annotation()?;
    let action = cx.action(&annotation)?;

    let mut block = Block::new(action, raw.span.clone());
    let mut seen = BTreeSet::new();
    let mut command = None;

    for (offset, token) in tokenize(annotation.parameters(raw.text)) {
        let offset = annotation.parameters.start + offset;
        let span = cx.span(offset..offset + token.len());

        let Some((key, value)) = token
            .split_once(':')
            .filter(|(key, value)| !key.is_empty() && !value.is_empty())
        else {
            return Err(cx.error(
                ParseErrorKind::MalformedAnnotation,
                format!("expected a `key:value` parameter, found `{}`", token),
                span,
            ));
        };

        let Some(parameter) = Parameter::from_key(key) else {
            return Err(cx
                .error(
                    ParseErrorKind::UnknownParameter,
                    format!("`{}` is not a lightbulb parameter", key),
                    span,
                )
                .with_note(format!("recognized parameters: {}", parameter_list())));
        };

        apply(&mut block, &mut command, parameter, value).map_err(|kind| {
            cx.error(
                kind,
                format!("`{}` expects `true` or `false`, found `{}`", parameter, value),
                span.clone(),
            )
        })?;
        seen.insert(parameter);
    }

    if let Some(missing) = action
        .required_parameters()
        .iter()
        .find(|parameter| is_missing(&block, &seen, **parameter))
    {
        let name = if block.name.is_empty() {
            String::new()
        } else {
            format!(" `{}`", block.name)
        };
        return Err(cx.error(
            ParseErrorKind::MissingRequiredParameter,
            format!("`{}` block{} requires `{}`", action, name, missing),
            cx.span(annotation.whole.clone()),
        ));
    }

    let fence = find_fence(raw.text, annotation.whole.end).ok_or_else(|| {
        cx.error(
            ParseErrorKind::MalformedAnnotation,
            "annotation is not followed by a fenced code block",
            cx.span(annotation.whole.clone()),
        )
    })?;
    debug!(language = %fence.language, start = fence.start, "found fence");

    block.code = match command {
        Some(command) => command,
        None => raw.text[fence.body].to_string(),
    };

    debug!(?block, "compiled block");
    Ok(block)
}

// ---------------------------------------------------------------------------
// Annotation structure
// ---------------------------------------------------------------------------

/// Offsets (relative to the raw unit) of the pieces of one annotation.
struct Annotation {
    /// `<!--` through `-->`.
    whole: Range<usize>,
    /// The action tag right after `lightbulb:`.
    tag: Range<usize>,
    /// Everything after the tag up to `-->`.
    parameters: Range<usize>,
}

impl Annotation {
    fn parameters<'t>(&self, text: &'t str) -> &'t str {
        &text[self.parameters.clone()]
    }
}

struct Context<'r, 'a> {
    raw: &'r RawBlock<'a>,
    file_id: usize,
}

impl Context<'_, '_> {
    fn locate_annotation(&self) -> Result<Annotation, ParseError> {
        let text = self.raw.text;
        let whole_unit = 0..text.len();

        let open = text.find(COMMENT_OPEN).ok_or_else(|| {
            self.error(
                ParseErrorKind::MalformedAnnotation,
                "expected an HTML comment (`<!--`)",
                self.span(whole_unit.clone()),
            )
        })?;
        let inner_start = open + COMMENT_OPEN.len();
        let close = text[inner_start..]
            .find(COMMENT_CLOSE)
            .map(|p| inner_start + p)
            .ok_or_else(|| {
                self.error(
                    ParseErrorKind::MalformedAnnotation,
                    "annotation comment is never closed with `-->`",
                    self.span(open..text.len()),
                )
            })?;
        let whole = open..close + COMMENT_CLOSE.len();

        let inner = &text[inner_start..close];
        let body_start = inner_start + (inner.len() - inner.trim_start().len());
        if !text[body_start..close].starts_with(NAMESPACE) {
            return Err(self.error(
                ParseErrorKind::MalformedAnnotation,
                format!("annotation must start with `{}`", NAMESPACE),
                self.span(whole),
            ));
        }

        let tag_start = body_start + NAMESPACE.len();
        let tag_len = text[tag_start..close]
            .find(char::is_whitespace)
            .unwrap_or(close - tag_start);
        let tag = tag_start..tag_start + tag_len;

        Ok(Annotation {
            parameters: tag.end..close,
            tag,
            whole,
        })
    }

    fn action(&self, annotation: &Annotation) -> Result<Action, ParseError> {
        let tag = &self.raw.text[annotation.tag.clone()];
        if tag.is_empty() {
            return Err(self.error(
                ParseErrorKind::MalformedAnnotation,
                format!("missing action after `{}`", NAMESPACE),
                self.span(annotation.whole.clone()),
            ));
        }
        Action::from_tag(tag).ok_or_else(|| {
            let known: Vec<&str> = Action::ALL.iter().map(|a| a.tag()).collect();
            self.error(
                ParseErrorKind::MalformedAnnotation,
                format!("unknown action `{}`", tag),
                self.span(annotation.tag.clone()),
            )
            .with_note(format!("expected one of: {}", known.join(", ")))
        })
    }

    /// Translate a range inside the raw unit into a document span.
    fn span(&self, local: Range<usize>) -> Range<usize> {
        let base = self.raw.span.start;
        base + local.start..base + local.end
    }

    fn error(
        &self,
        kind: ParseErrorKind,
        message: impl Into<String>,
        span: Range<usize>,
    ) -> ParseError {
        ParseError::new(kind, message, span, self.file_id)
    }
}

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

/// Whitespace-separated tokens paired with their byte offsets.
fn tokenize(text: &str) -> Vec<(usize, &str)> {
    let mut tokens = Vec::new();
    let mut start = None;

    for (i, c) in text.char_indices() {
        match (c.is_whitespace(), start) {
            (true, Some(s)) => {
                tokens.push((s, &text[s..i]));
                start = None;
            }
            (false, None) => start = Some(i),
            _ => {}
        }
    }
    if let Some(s) = start {
        tokens.push((s, &text[s..]));
    }

    tokens
}

fn apply(
    block: &mut Block,
    command: &mut Option<String>,
    parameter: Parameter,
    value: &str,
) -> Result<(), ParseErrorKind> {
    match parameter {
        Parameter::Name => block.name = value.to_string(),
        Parameter::Tags => {
            let tags = split_list(value);
            block.tags = if tags.is_empty() { default_tags() } else { tags };
        }
        Parameter::Path => block.path = Some(value.to_string()),
        Parameter::Mode => block.mode = value.to_string(),
        Parameter::Command => *command = Some(value.to_string()),
        Parameter::Shell => block.shell = value.to_string(),
        Parameter::Set => block.set = Some(value.to_string()),
        Parameter::Keys => block.keys = split_list(value),
        Parameter::ExitOnError => block.exit_on_error = parse_bool(value)?,
        Parameter::Prompt => block.prompt = parse_bool(value)?,
        Parameter::Secret => block.secret = parse_bool(value)?,
        Parameter::Persist => block.persist = parse_bool(value)?,
        Parameter::Sensitive => block.sensitive = parse_bool(value)?,
    }
    Ok(())
}

fn is_missing(block: &Block, seen: &BTreeSet<Parameter>, parameter: Parameter) -> bool {
    match parameter {
        Parameter::Keys => block.keys.is_empty(),
        _ => !seen.contains(&parameter),
    }
}

fn split_list(value: &str) -> BTreeSet<String> {
    value
        .split(',')
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_bool(value: &str) -> Result<bool, ParseErrorKind> {
    match value {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(ParseErrorKind::InvalidBooleanValue),
    }
}

fn parameter_list() -> String {
    Parameter::ALL
        .iter()
        .map(|p| p.key())
        .collect::<Vec<_>>()
        .join(", ")
}
