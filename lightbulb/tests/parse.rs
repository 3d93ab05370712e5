use std::collections::BTreeSet;

use lightbulb::Action;
use lightbulb::parser::{ParseError, ParseErrorKind, Parser, RawBlock, compile, extract};

const GOOD: &str = r#"# Telling the time

First, create a script:

<!-- lightbulb:createFile name:dateFile path:./date.sh tags:one,two,three mode:0700 -->
```shell
#!/bin/bash

echo "The current date in UTC is $(date -u)."
```

Then run it:

<!-- lightbulb:runShell name:runDate shell:bash -->
```console
./date.sh
```
"#;

fn parse(source: &str) -> Result<lightbulb::Runbook, ParseError> {
    Parser::new(source.to_string(), 0).parse()
}

fn parse_err(source: &str) -> ParseError {
    parse(source).expect_err("expected a parse error")
}

fn raw(text: &str) -> RawBlock<'_> {
    RawBlock {
        text,
        span: 0..text.len(),
    }
}

fn tags(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[test]
fn extract_finds_blocks_in_order() {
    let blocks = extract(GOOD);
    assert_eq!(blocks.len(), 2);

    let expected = [
        "<!-- lightbulb:createFile name:dateFile path:./date.sh tags:one,two,three mode:0700 -->\n```shell\n#!/bin/bash\n\necho \"The current date in UTC is $(date -u).\"\n```",
        "<!-- lightbulb:runShell name:runDate shell:bash -->\n```console\n./date.sh\n```",
    ];
    for (block, expected) in blocks.iter().zip(expected) {
        assert_eq!(block.text, expected);
        assert_eq!(&GOOD[block.span.clone()], expected);
    }
}

#[test]
fn extract_ignores_unannotated_content() {
    let source = "# Title\n\n<!-- just a comment -->\n```bash\nls\n```\n\n```bash\npwd\n```\n";
    assert!(extract(source).is_empty());
    assert!(extract("").is_empty());
}

#[test]
fn extract_drops_annotation_separated_from_fence() {
    let source = "<!-- lightbulb:runShell name:a -->\nSome prose.\n\n```bash\nls\n```\n";
    assert!(extract(source).is_empty());
}

#[test]
fn extract_drops_unterminated_fence() {
    let source = "<!-- lightbulb:runShell name:a -->\n```bash\nls\n";
    assert!(extract(source).is_empty());
}

#[test]
fn extract_drops_annotation_before_tilde_fence() {
    let source = "<!-- lightbulb:runShell name:t -->\n~~~\n```\necho inner\n```\n~~~\n";
    assert!(extract(source).is_empty());
    assert!(parse(source).unwrap().blocks.is_empty());
}

#[test]
fn extract_accepts_indented_backtick_fence() {
    let source = "<!-- lightbulb:runShell name:a -->\n  ```bash\n  ls\n  ```\n";
    let blocks = extract(source);
    assert_eq!(blocks.len(), 1);
    assert!(blocks[0].text.ends_with("```"));
}

#[test]
fn extract_tolerates_blank_line_before_fence() {
    let source = "<!-- lightbulb:runShell name:a -->\n\n```bash\nls\n```\n";
    let blocks = extract(source);
    assert_eq!(blocks.len(), 1);
    assert!(blocks[0].text.ends_with("ls\n```"));
}

#[test]
fn prose_between_blocks_keeps_order() {
    let source = "<!-- lightbulb:runShell name:first -->\n```\necho 1\n```\n\nLots of\n\nprose *here*.\n\n- a list\n- too\n\n<!-- lightbulb:runShell name:second -->\n```\necho 2\n```\n";
    let runbook = parse(source).unwrap();
    let names: Vec<&str> = runbook.blocks.iter().map(|b| b.name.as_str()).collect();
    assert_eq!(names, ["first", "second"]);
}

#[test]
fn parse_create_file_block() {
    let runbook = parse(GOOD).unwrap();
    assert_eq!(runbook.blocks.len(), 2);

    let block = &runbook.blocks[0];
    assert_eq!(block.action, Action::CreateFile);
    assert_eq!(block.name, "dateFile");
    assert_eq!(block.path.as_deref(), Some("./date.sh"));
    assert_eq!(block.tags, tags(&["one", "two", "three"]));
    assert_eq!(block.mode, "0700");
    assert_eq!(
        block.code,
        "#!/bin/bash\n\necho \"The current date in UTC is $(date -u).\"\n"
    );
}

#[test]
fn parse_run_shell_block_with_defaults() {
    let runbook = parse(GOOD).unwrap();
    let block = &runbook.blocks[1];
    assert_eq!(block.action, Action::RunShell);
    assert_eq!(block.name, "runDate");
    assert_eq!(block.shell, "bash");
    assert_eq!(block.code, "./date.sh\n");
    assert_eq!(block.tags, tags(&["all"]));
    assert_eq!(block.mode, "0700");
    assert_eq!(block.path, None);
    assert!(block.exit_on_error);
    assert!(block.persist);
    assert!(!block.prompt && !block.secret && !block.sensitive);
}

#[test]
fn compile_is_idempotent() {
    for unit in extract(GOOD) {
        assert_eq!(compile(&unit, 0).unwrap(), compile(&unit, 0).unwrap());
    }
}

#[test]
fn missing_action_is_malformed() {
    let err = compile(&raw("<!-- lightbulb: name:runDate shell:bash -->\n```\nx\n```"), 0)
        .unwrap_err();
    assert_eq!(err.kind, ParseErrorKind::MalformedAnnotation);
    assert!(err.message.contains("missing action"));
}

#[test]
fn unknown_action_is_malformed() {
    let err = compile(&raw("<!-- lightbulb:deleteFile name:x -->\n```\nx\n```"), 0).unwrap_err();
    assert_eq!(err.kind, ParseErrorKind::MalformedAnnotation);
    assert!(err.message.contains("deleteFile"));
    assert!(!err.notes.is_empty());
}

#[test]
fn parameter_without_colon_is_malformed() {
    let err = compile(&raw("<!-- lightbulb:runShell name:x verbose -->\n```\nx\n```"), 0)
        .unwrap_err();
    assert_eq!(err.kind, ParseErrorKind::MalformedAnnotation);
}

#[test]
fn unknown_parameter_points_at_token() {
    let source = "intro\n\n<!-- lightbulb:runShell name:x colour:red -->\n```\nx\n```\n";
    let err = parse_err(source);
    assert_eq!(err.kind, ParseErrorKind::UnknownParameter);
    assert_eq!(&source[err.span.clone()], "colour:red");
}

#[test]
fn create_file_without_path_is_rejected() {
    let err = parse_err("<!-- lightbulb:createFile name:dateFile -->\n```\necho hi\n```\n");
    assert_eq!(err.kind, ParseErrorKind::MissingRequiredParameter);
    assert!(err.message.contains("`path`"));
}

#[test]
fn required_parameters_checked_in_declared_order() {
    let err = parse_err("<!-- lightbulb:createFile mode:0644 -->\n```\nhi\n```\n");
    assert_eq!(err.kind, ParseErrorKind::MissingRequiredParameter);
    assert!(err.message.ends_with("requires `name`"));
}

#[test]
fn set_environment_vars_requires_keys() {
    let err = parse_err("<!-- lightbulb:setEnvironmentVars name:creds -->\n```\n```\n");
    assert_eq!(err.kind, ParseErrorKind::MissingRequiredParameter);
    assert!(err.message.contains("`keys`"));

    let runbook = parse(
        "<!-- lightbulb:setEnvironmentVars name:creds keys:TOKEN,USER prompt:true secret:true -->\n```\n```\n",
    )
    .unwrap();
    let block = &runbook.blocks[0];
    assert_eq!(block.keys, tags(&["TOKEN", "USER"]));
    assert!(block.prompt && block.secret);
}

#[test]
fn booleans_accept_only_literals() {
    let err = parse_err("<!-- lightbulb:runShell name:x secret:yes -->\n```\nx\n```\n");
    assert_eq!(err.kind, ParseErrorKind::InvalidBooleanValue);

    let runbook =
        parse("<!-- lightbulb:runShell name:x persist:false sensitive:true -->\n```\nx\n```\n")
            .unwrap();
    assert!(!runbook.blocks[0].persist);
    assert!(runbook.blocks[0].sensitive);
}

#[test]
fn exit_on_error_spellings() {
    for key in ["exitOnError", "exit_on_error"] {
        let source = format!("<!-- lightbulb:runShell name:x {}:false -->\n```\nx\n```\n", key);
        assert!(!parse(&source).unwrap().blocks[0].exit_on_error);
    }
}

#[test]
fn duplicate_keys_last_wins() {
    let runbook =
        parse("<!-- lightbulb:runShell name:first name:second shell:sh -->\n```\nx\n```\n").unwrap();
    assert_eq!(runbook.blocks[0].name, "second");
    assert_eq!(runbook.blocks[0].shell, "sh");
}

#[test]
fn empty_tag_list_falls_back_to_default() {
    let runbook = parse("<!-- lightbulb:runShell name:x tags:,, -->\n```\nx\n```\n").unwrap();
    assert_eq!(runbook.blocks[0].tags, tags(&["all"]));
}

#[test]
fn command_replaces_fence_body() {
    let runbook =
        parse("<!-- lightbulb:runShell name:x command:./date.sh -->\n```\nignored\n```\n").unwrap();
    assert_eq!(runbook.blocks[0].code, "./date.sh");
}

#[test]
fn code_keeps_inner_whitespace() {
    let runbook =
        parse("<!-- lightbulb:createFile name:x path:a.txt -->\n```text\n\n  indented\n\n```\n")
            .unwrap();
    assert_eq!(runbook.blocks[0].code, "\n  indented\n\n");
}

#[test]
fn one_bad_block_fails_the_document() {
    let source = "<!-- lightbulb:runShell name:ok -->\n```\nx\n```\n\n<!-- lightbulb:runShell -->\n```\ny\n```\n";
    let err = parse_err(source);
    assert_eq!(err.kind, ParseErrorKind::MissingRequiredParameter);
    assert!(err.span.start > 0);
}

#[test]
fn errors_render_as_diagnostics() {
    let err = parse_err("<!-- lightbulb:runShell name:x colour:red -->\n```\nx\n```\n");
    let diagnostic = err.to_diagnostic();
    assert!(diagnostic.message.starts_with("unknown parameter"));
    assert_eq!(diagnostic.labels.len(), 1);
    assert_eq!(diagnostic.notes.len(), 1);
}

#[test]
fn remote_documents_are_not_fetched() {
    let err = lightbulb::source::load("https://example.com/tutorial.md").unwrap_err();
    assert!(matches!(err, lightbulb::source::LoadError::RemoteUnsupported(_)));
}

#[test]
fn missing_local_document() {
    let err = lightbulb::source::load("definitely/not/here.md").unwrap_err();
    assert!(matches!(err, lightbulb::source::LoadError::Io { .. }));
}
