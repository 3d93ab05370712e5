mod config;
mod test_runner;

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use codespan_reporting::diagnostic::{Diagnostic, Label, Severity};
use codespan_reporting::files::SimpleFiles;
use codespan_reporting::term;
use codespan_reporting::term::termcolor::{ColorChoice, StandardStream};
use tracing::level_filters::LevelFilter;
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use lightbulb::Runbook;
use runner::{RunConfig, RunError};

use crate::config::FileConfig;

const SUBCOMMANDS: &[&str] = &["run", "test", "help"];
const TOP_LEVEL_FLAGS: &[&str] = &["-h", "--help", "-V", "--version"];
const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Parser)]
#[command(
    name = "lightbulb",
    version,
    about = "Execute annotated Markdown files",
    long_about = "Lightbulb executes annotated Markdown files. Leveraging HTML comments in \
                  Markdown, it can create files and run code blocks, which makes tutorial-style \
                  documentation testable."
)]
struct Cli {
    /// Disable colored error output
    #[arg(long, global = true)]
    no_color: bool,

    /// Log level (trace, debug, info, warn, error); RUST_LOG overrides it
    #[arg(long, global = true, env = "LIGHTBULB_LOG_LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run an annotated Markdown document
    Run(RunArgs),

    /// Run .test.md documents with expectations in TOML frontmatter
    Test(TestArgs),
}

#[derive(clap::Args)]
struct RunArgs {
    /// Markdown document to execute (URLs are not supported yet)
    file: String,

    /// Config file (default is $HOME/.lightbulb.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Tags to include (default: all)
    #[arg(short = 't', long = "include-tag", value_delimiter = ',', env = "LIGHTBULB_INCLUDE_TAGS")]
    include_tags: Vec<String>,

    /// Tags to skip
    #[arg(short = 'x', long = "skip-tag", value_delimiter = ',', env = "LIGHTBULB_SKIP_TAGS")]
    skip_tags: Vec<String>,

    /// Interactive mode
    #[arg(short, long, env = "LIGHTBULB_INTERACTIVE")]
    interactive: bool,

    /// Directory files are created and scripts run in
    #[arg(short = 'C', long)]
    work_dir: Option<PathBuf>,

    /// Validate the document without running anything
    #[arg(long)]
    check: bool,

    /// List the blocks in the document
    #[arg(long)]
    list: bool,

    /// Dump the parsed blocks
    #[arg(long)]
    dump: bool,

    /// Discard script output
    #[arg(short, long)]
    quiet: bool,
}

#[derive(clap::Args)]
struct TestArgs {
    /// A .test.md file, or a directory searched recursively for them
    path: String,

    /// Limit the run to a category (subfolder); may be given more than once
    #[arg(long)]
    category: Vec<String>,

    /// Print the categories found and exit
    #[arg(long)]
    list_categories: bool,
}

fn main() {
    let cli = Cli::parse_from(with_implicit_run(std::env::args().collect()));

    match cli.command {
        Command::Run(run_args) => do_run(run_args, cli.log_level, cli.no_color),
        Command::Test(test_args) => {
            let level = cli.log_level.as_deref().unwrap_or("warn");
            if let Err(e) = init_logging(level) {
                eprintln!("error: {}", e);
                process::exit(1);
            }
            let path = Path::new(&test_args.path);
            if test_args.list_categories {
                test_runner::list_categories(path);
                return;
            }
            let exit_code = test_runner::run_tests(path, cli.no_color, &test_args.category);
            process::exit(exit_code);
        }
    }
}

/// Insert `run` after the leading global flags unless a subcommand (or a
/// top-level help/version flag) comes first, so `lightbulb -x slow doc.md`
/// means `lightbulb run -x slow doc.md`.
fn with_implicit_run(mut args: Vec<String>) -> Vec<String> {
    let mut i = 1;
    while i < args.len() {
        let arg = args[i].as_str();
        let global = match arg {
            "--no-color" => 1,
            "--log-level" => 2,
            a if a.starts_with("--log-level=") => 1,
            _ => 0,
        };
        if global > 0 {
            i += global;
            continue;
        }
        if !SUBCOMMANDS.contains(&arg) && !TOP_LEVEL_FLAGS.contains(&arg) {
            args.insert(i, "run".to_string());
        }
        return args;
    }
    args
}

/// Parse a log level name. Anything else would be read by `EnvFilter` as a
/// target directive and silence every other target.
fn parse_level(level: &str) -> Result<LevelFilter, String> {
    level.parse::<LevelFilter>().map_err(|_| {
        format!(
            "invalid log level '{}': expected one of trace, debug, info, warn, error, off",
            level
        )
    })
}

/// `RUST_LOG` wins over `level`.
fn init_logging(level: &str) -> Result<(), String> {
    let filter = EnvFilter::builder()
        .with_default_directive(parse_level(level)?.into())
        .from_env_lossy();
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
    Ok(())
}

fn do_run(args: RunArgs, log_level: Option<String>, no_color: bool) {
    let color_choice = if no_color {
        ColorChoice::Never
    } else {
        ColorChoice::Auto
    };

    let (file_config, config_path) = match config::load(args.config.as_deref()) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("error: {}", e);
            process::exit(1);
        }
    };

    let level = log_level
        .or_else(|| file_config.log_level.clone())
        .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string());
    if let Err(e) = init_logging(&level) {
        eprintln!("error: {}", e);
        process::exit(1);
    }
    if let Some(path) = &config_path {
        debug!(path = %path.display(), "using config file");
    }

    let run_config = run_config(&args, file_config);
    debug!(include = ?run_config.include_tags, skip = ?run_config.skip_tags, "tag filters");

    // Load
    let source = match lightbulb::source::load(&args.file) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: {}", e);
            process::exit(1);
        }
    };

    let mut files = SimpleFiles::new();
    let file_id = files.add(args.file.clone(), source.clone());

    let writer = StandardStream::stderr(color_choice);
    let term_config = term::Config::default();

    let parser = lightbulb::parser::Parser::new(source, file_id);
    let runbook = match parser.parse() {
        Ok(r) => r,
        Err(error) => {
            let diagnostic = error.to_diagnostic();
            let _ = term::emit_to_write_style(&mut writer.lock(), &term_config, &files, &diagnostic);
            process::exit(1);
        }
    };

    if args.check {
        eprintln!("ok: {} parsed successfully ({} blocks)", args.file, runbook.blocks.len());
        return;
    }

    if args.dump {
        println!("{:#?}", runbook.blocks);
        return;
    }

    if args.list {
        print_blocks(&runbook, &run_config);
        return;
    }

    // Run
    let result = if args.quiet {
        let mut sink = std::io::sink();
        runner::run(&runbook, &run_config, &mut sink)
    } else {
        let mut stdout = std::io::stdout();
        runner::run(&runbook, &run_config, &mut stdout)
    };

    match result {
        Ok(summary) => {
            for failure in &summary.tolerated {
                emit_run_error(&writer, &term_config, &files, failure, Severity::Warning);
            }
            info!(
                completed = summary.completed,
                skipped = summary.skipped,
                tolerated = summary.tolerated.len(),
                "run finished"
            );
        }
        Err(error) => {
            emit_run_error(&writer, &term_config, &files, &error, Severity::Error);
            process::exit(1);
        }
    }
}

/// Flags and environment win over the config file, which wins over defaults.
fn run_config(args: &RunArgs, file: FileConfig) -> RunConfig {
    let mut config = RunConfig::default();

    let include = Some(args.include_tags.clone())
        .filter(|tags| !tags.is_empty())
        .or(file.include_tags);
    if let Some(tags) = include {
        config.include_tags = tags.into_iter().collect();
    }

    let skip = Some(args.skip_tags.clone())
        .filter(|tags| !tags.is_empty())
        .or(file.skip_tags);
    if let Some(tags) = skip {
        config.skip_tags = tags.into_iter().collect::<BTreeSet<_>>();
    }

    config.interactive = args.interactive || file.interactive.unwrap_or(false);
    if let Some(dir) = args.work_dir.clone().or(file.work_dir) {
        config.work_dir = dir;
    }
    config
}

fn print_blocks(runbook: &Runbook, config: &RunConfig) {
    for (index, block) in runbook.blocks.iter().enumerate() {
        let tags: Vec<&str> = block.tags.iter().map(String::as_str).collect();
        let skipped = if config.selects(block) { "" } else { " (skipped)" };
        println!(
            "{:>3}. {:<18} {} [{}]{}",
            index + 1,
            block.action,
            block.name,
            tags.join(","),
            skipped
        );
    }
}

fn emit_run_error(
    writer: &StandardStream,
    config: &term::Config,
    files: &SimpleFiles<String, String>,
    error: &RunError,
    severity: Severity,
) {
    let diagnostic = Diagnostic::new(severity)
        .with_message(error.to_string())
        .with_labels(vec![
            Label::primary(error.source_id, error.span.clone())
                .with_message(format!("while running `{}`", error.name)),
        ]);
    let _ = term::emit_to_write_style(&mut writer.lock(), config, files, &diagnostic);
}
