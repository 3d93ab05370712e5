//! `lightbulb test`: documents with their expected outcome in TOML
//! frontmatter.
//!
//! ```text
//! ---
//! description = "prints the date"
//! expect_output = "hello"
//! ---
//! <!-- lightbulb:runShell name:greet -->
//! ...
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use runner::RunConfig;

const TEST_SUFFIX: &str = ".test.md";
const DELIMITER: &str = "---";

/// Expectations declared in a test's frontmatter.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Expectation {
    pub description: Option<String>,
    /// Compared with the relayed script output, both trimmed.
    pub expect_output: Option<String>,
    /// Substring of the run error's message.
    pub expect_error: Option<String>,
    pub expect_parse_error: bool,
    /// `None` keeps the default selection (`all`).
    pub include_tags: Option<Vec<String>>,
    pub skip_tags: Vec<String>,
}

/// Split a test file into its expectation and the document after the
/// closing delimiter line.
fn split_frontmatter(content: &str) -> Result<(Expectation, &str), String> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);

    let mut offset = 0;
    let mut lines = content.split_inclusive('\n');
    match lines.next() {
        Some(line) if line.trim_end() == DELIMITER => offset += line.len(),
        _ => return Err("missing opening --- frontmatter delimiter".into()),
    }

    let header_start = offset;
    for line in lines {
        if line.trim_end() == DELIMITER {
            let header = &content[header_start..offset];
            let expectation: Expectation =
                toml::from_str(header).map_err(|e| format!("TOML parse error: {}", e))?;
            return Ok((expectation, &content[offset + line.len()..]));
        }
        offset += line.len();
    }
    Err("missing closing --- frontmatter delimiter".into())
}

pub enum TestOutcome {
    Pass,
    Fail(String),
}

pub struct TestResult {
    pub path: PathBuf,
    pub description: Option<String>,
    pub outcome: TestOutcome,
}

impl TestResult {
    fn label(&self) -> &str {
        if let Some(description) = &self.description {
            return description;
        }
        self.path
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(|name| name.strip_suffix(TEST_SUFFIX))
            .unwrap_or("?")
    }
}

fn run_single_test(path: &Path) -> TestResult {
    let mut description = None;
    let outcome = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read file: {}", e))
        .and_then(|content| {
            let (expectation, document) =
                split_frontmatter(&content).map_err(|e| format!("frontmatter error: {}", e))?;
            description = expectation.description.clone();
            check(&expectation, document)
        });

    TestResult {
        path: path.to_path_buf(),
        description,
        outcome: match outcome {
            Ok(()) => TestOutcome::Pass,
            Err(reason) => TestOutcome::Fail(reason),
        },
    }
}

/// Parse `document` and run it in a scratch directory, comparing what
/// happens with `expectation`.
fn check(expectation: &Expectation, document: &str) -> Result<(), String> {
    let parsed = lightbulb::parser::Parser::new(document.to_string(), 0).parse();
    let runbook = match (parsed, expectation.expect_parse_error) {
        (Err(_), true) => return Ok(()),
        (Ok(_), true) => return Err("expected parse error, but parsing succeeded".into()),
        (Err(err), false) => return Err(format!("unexpected parse error: {}", err)),
        (Ok(runbook), false) => runbook,
    };

    let scratch =
        tempfile::tempdir().map_err(|e| format!("cannot create scratch directory: {}", e))?;
    let mut config = RunConfig::default().with_work_dir(scratch.path());
    if let Some(include) = &expectation.include_tags {
        config.include_tags = include.iter().cloned().collect();
    }
    config.skip_tags = expectation.skip_tags.iter().cloned().collect();

    let mut output = Vec::new();
    let result = runner::run(&runbook, &config, &mut output);

    if let Some(wanted) = &expectation.expect_error {
        return match result {
            Err(err) if err.to_string().contains(wanted.as_str()) => Ok(()),
            Err(err) => Err(format!("expected error containing \"{}\", got: {}", wanted, err)),
            Ok(_) => Err(format!(
                "expected error containing \"{}\", but the run succeeded",
                wanted
            )),
        };
    }
    result.map_err(|err| format!("unexpected run error: {}", err))?;

    if let Some(wanted) = &expectation.expect_output {
        let actual = String::from_utf8_lossy(&output);
        if actual.trim() != wanted.trim() {
            return Err(format!(
                "output mismatch\n  expected: {}\n  actual:   {}",
                wanted.trim(),
                actual.trim()
            ));
        }
    }
    Ok(())
}

// ----------------------------------------------------------------------------
// Discovery
// ----------------------------------------------------------------------------

/// Test files keyed by category: the subfolder path relative to the root,
/// `""` for files directly inside it.
type Suite = BTreeMap<String, Vec<PathBuf>>;

fn discover(path: &Path) -> Suite {
    let mut suite = Suite::new();
    if path.is_file() {
        suite.insert(String::new(), vec![path.to_path_buf()]);
        return suite;
    }
    walk(path, path, &mut suite);
    suite.values_mut().for_each(|files| files.sort());
    suite
}

fn walk(dir: &Path, root: &Path, suite: &mut Suite) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for path in entries.flatten().map(|entry| entry.path()) {
        if path.is_dir() {
            walk(&path, root, suite);
            continue;
        }
        let is_test = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.ends_with(TEST_SUFFIX));
        if !is_test {
            continue;
        }
        let category = dir
            .strip_prefix(root)
            .map(|rel| rel.to_string_lossy().replace('\\', "/"))
            .unwrap_or_default();
        suite.entry(category).or_default().push(path);
    }
}

fn category_name(category: &str) -> &str {
    if category.is_empty() { "(root)" } else { category }
}

/// `wanted` names `category` itself or one of its parent folders.
fn within(category: &str, wanted: &str) -> bool {
    let wanted = wanted.trim_matches('/');
    category == wanted
        || category
            .strip_prefix(wanted)
            .is_some_and(|rest| rest.starts_with('/'))
}

/// Keep the categories named in `wanted` and their subcategories.
fn select<'a>(suite: &'a Suite, wanted: &[String]) -> Vec<(&'a str, &'a [PathBuf])> {
    for w in wanted {
        if !suite.keys().any(|category| within(category, w)) {
            let known: Vec<&str> = suite.keys().map(|c| category_name(c)).collect();
            eprintln!(
                "warning: category '{}' not found (available: {})",
                w.trim_matches('/'),
                known.join(", ")
            );
        }
    }

    suite
        .iter()
        .filter(|(category, _)| wanted.is_empty() || wanted.iter().any(|w| within(category, w)))
        .map(|(category, files)| (category.as_str(), files.as_slice()))
        .collect()
}

/// Print the categories found under `path`.
pub fn list_categories(path: &Path) {
    if path.is_file() {
        eprintln!("(single file, no categories)");
        return;
    }
    let suite = discover(path);
    if suite.is_empty() {
        eprintln!("no {} files found in {}", TEST_SUFFIX, path.display());
        return;
    }
    eprintln!("available categories:");
    for (category, files) in &suite {
        eprintln!("  {} ({} tests)", category_name(category), files.len());
    }
}

// ----------------------------------------------------------------------------
// Reporting
// ----------------------------------------------------------------------------

struct Palette {
    color: bool,
}

impl Palette {
    fn paint(&self, code: &str, text: &str) -> String {
        if self.color {
            format!("\x1b[{}m{}\x1b[0m", code, text)
        } else {
            text.to_string()
        }
    }

    fn pass(&self) -> String {
        self.paint("32", "PASS")
    }

    fn fail(&self) -> String {
        self.paint("31", "FAIL")
    }

    fn heading(&self, text: &str) -> String {
        self.paint("1", text)
    }
}

/// Run the `.test.md` files under `path` (or `path` itself), optionally
/// limited to `categories`. Returns the process exit code.
pub fn run_tests(path: &Path, no_color: bool, categories: &[String]) -> i32 {
    let palette = Palette { color: !no_color };
    let suite = discover(path);
    if suite.is_empty() {
        eprintln!("no {} files found in {}", TEST_SUFFIX, path.display());
        return 1;
    }

    let wanted = if path.is_file() { &[][..] } else { categories };
    let selected = select(&suite, wanted);
    if selected.is_empty() {
        eprintln!("no matching categories found");
        return 1;
    }

    let mut passed = 0usize;
    let mut failures = Vec::new();
    for (category, files) in selected {
        if !path.is_file() {
            eprintln!("\n{}", palette.heading(category_name(category)));
        }
        for file in files {
            let result = run_single_test(file);
            match &result.outcome {
                TestOutcome::Pass => {
                    passed += 1;
                    eprintln!("  {}  {}", palette.pass(), result.label());
                }
                TestOutcome::Fail(_) => {
                    eprintln!("  {}  {}", palette.fail(), result.label());
                    failures.push(result);
                }
            }
        }
    }

    if !failures.is_empty() {
        eprintln!("\nfailures:");
        for failure in &failures {
            eprintln!("\n  --- {} ---", failure.path.display());
            if let TestOutcome::Fail(reason) = &failure.outcome {
                reason.lines().for_each(|line| eprintln!("  {}", line));
            }
        }
    }

    let failed = failures.len();
    if failed == 0 {
        eprintln!("\ntest result: {}. {} passed, 0 failed", palette.paint("32", "ok"), passed);
        0
    } else {
        eprintln!(
            "\ntest result: {}. {} passed, {} failed (of {})",
            palette.paint("31", "FAILED"),
            passed,
            failed,
            passed + failed
        );
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expect(frontmatter: &str) -> Expectation {
        toml::from_str(frontmatter).unwrap()
    }

    #[test]
    fn splits_frontmatter_from_document() {
        let content = "---\ndescription = \"hello\"\nexpect_output = \"hi\"\n---\n<!-- lightbulb:runShell name:x -->\n```\necho hi\n```\n";
        let (expectation, source) = split_frontmatter(content).unwrap();
        assert_eq!(expectation.description.as_deref(), Some("hello"));
        assert_eq!(expectation.expect_output.as_deref(), Some("hi"));
        assert!(source.starts_with("<!-- lightbulb:runShell"));
    }

    #[test]
    fn frontmatter_is_required() {
        assert!(split_frontmatter("# no frontmatter\n").is_err());
        assert!(split_frontmatter("---\ndescription = \"x\"\n").is_err());
    }

    #[test]
    fn output_expectation() {
        let source = "<!-- lightbulb:runShell name:x -->\n```\necho hi\n```\n";
        assert_eq!(check(&expect("expect_output = \"hi\""), source), Ok(()));
        assert!(check(&expect("expect_output = \"bye\""), source).is_err());
    }

    #[test]
    fn error_expectation() {
        let source = "<!-- lightbulb:runShell name:boom -->\n```\nexit 2\n```\n";
        assert_eq!(check(&expect("expect_error = \"'boom'\""), source), Ok(()));
        assert!(check(&expect(""), source).is_err());
    }

    #[test]
    fn parse_error_expectation() {
        let source = "<!-- lightbulb:createFile name:x -->\n```\nx\n```\n";
        assert_eq!(check(&expect("expect_parse_error = true"), source), Ok(()));
        assert!(check(&expect(""), source).is_err());
    }

    #[test]
    fn files_are_created_in_a_scratch_directory() {
        let source = "<!-- lightbulb:createFile name:f path:out.txt -->\n```\ncontent\n```\n\n<!-- lightbulb:runShell name:show shell:sh -->\n```\ncat out.txt\n```\n";
        assert_eq!(check(&expect("expect_output = \"content\""), source), Ok(()));
    }

    #[test]
    fn categories_include_subfolders() {
        assert!(within("parse", "parse"));
        assert!(within("parse/errors", "parse/"));
        assert!(!within("parser", "parse"));
    }

    #[test]
    fn tag_filters_apply() {
        let source = "<!-- lightbulb:runShell name:a tags:fast -->\n```\necho a\n```\n\n<!-- lightbulb:runShell name:b tags:slow -->\n```\necho b\n```\n";
        let frontmatter = "expect_output = \"a\"\nskip_tags = [\"slow\"]";
        assert_eq!(check(&expect(frontmatter), source), Ok(()));
    }
}
