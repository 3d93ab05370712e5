use std::fs::Permissions;
use std::io::{self, BufRead, BufReader, Write};
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::mpsc;
use std::thread;

use lightbulb::Block;
use tempfile::TempPath;
use tracing::{debug, info};

use crate::config::RunConfig;
use crate::error::{ExecutionError, ShellFailure};
use crate::file::parse_mode;

const SCRIPT_MODE: &str = "0700";
const DEFAULT_INTERPRETER: &str = "/bin/bash";
const SCRIPT_PREFIX: &str = "shell-";
/// Lines buffered between the relay thread and the writer.
const RELAY_CAPACITY: usize = 64;

pub(crate) fn run_shell(
    block: &Block,
    config: &RunConfig,
    output: &mut dyn Write,
) -> Result<(), ExecutionError> {
    let block = normalize(block);
    let mode = parse_mode(&block.mode)?;
    let script = compose_script(&block.shell, &block.code);

    let work_dir = config
        .work_dir
        .canonicalize()
        .map_err(ExecutionError::io(&config.work_dir))?;
    let script_path = write_script(&work_dir, &script, mode)?;

    // `script_path` removes the file when dropped, whatever the outcome.
    execute_script(&script_path, &work_dir, output).map_err(ExecutionError::from)
}

/// A copy of `block` ready to run: executable mode, absolute interpreter.
fn normalize(block: &Block) -> Block {
    let mut block = block.clone();
    block.mode = SCRIPT_MODE.to_string();
    block.shell = resolve_shell(&block.shell);
    block
}

pub(crate) fn resolve_shell(shell: &str) -> String {
    if shell.is_empty() {
        DEFAULT_INTERPRETER.to_string()
    } else if shell.contains('/') {
        shell.to_string()
    } else {
        format!("/bin/{}", shell)
    }
}

/// Prefix `code` with an interpreter line unless it declares its own.
pub(crate) fn compose_script(shell: &str, code: &str) -> String {
    if code.starts_with("#!") {
        code.to_string()
    } else {
        format!("#!{}\n\n{}", shell, code)
    }
}

fn write_script(dir: &Path, script: &str, mode: u32) -> Result<TempPath, ExecutionError> {
    let mut file = tempfile::Builder::new()
        .prefix(SCRIPT_PREFIX)
        .tempfile_in(dir)
        .map_err(ExecutionError::io(dir))?;
    let path = file.path().to_path_buf();

    debug!(path = %path.display(), "script contents:\n{}", script);
    file.write_all(script.as_bytes())
        .and_then(|()| file.flush())
        .and_then(|()| file.as_file().set_permissions(Permissions::from_mode(mode)))
        .map_err(ExecutionError::io(&path))?;

    // Close the handle so the kernel will exec the file.
    Ok(file.into_temp_path())
}

/// Spawn `script`, relay its stdout line by line into `output`, and wait.
fn execute_script(script: &Path, work_dir: &Path, output: &mut dyn Write) -> Result<(), ShellFailure> {
    info!(script = %script.display(), "executing file");

    let mut child = Command::new(script)
        .current_dir(work_dir)
        .stdin(Stdio::inherit())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .spawn()
        .map_err(|source| ShellFailure::Spawn {
            script: script.to_path_buf(),
            source,
        })?;

    let mut relay_error = None;
    if let Some(stdout) = child.stdout.take() {
        let (sender, receiver) = mpsc::sync_channel::<io::Result<String>>(RELAY_CAPACITY);
        let relay = thread::spawn(move || relay_lines(stdout, sender));

        for line in receiver {
            // Keep draining after a failure so the relay never blocks.
            if relay_error.is_some() {
                continue;
            }
            if let Err(err) = line.and_then(|line| writeln!(output, "{}", line)) {
                relay_error = Some(err);
            }
        }
        if relay.join().is_err() {
            relay_error.get_or_insert_with(|| io::Error::other("output relay panicked"));
        }
    }
    if let Err(err) = output.flush() {
        relay_error.get_or_insert(err);
    }

    let status = child.wait().map_err(ShellFailure::Output)?;
    debug!(%status, "script finished");
    if !status.success() {
        return Err(ShellFailure::Exit(status));
    }
    match relay_error {
        Some(err) => Err(ShellFailure::Output(err)),
        None => Ok(()),
    }
}

/// Read `source` a line at a time, without the line terminator.
fn relay_lines(source: impl io::Read, sender: mpsc::SyncSender<io::Result<String>>) {
    let mut reader = BufReader::new(source);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        let line = match reader.read_until(b'\n', &mut buf) {
            Ok(0) => return,
            Ok(_) => {
                let text = String::from_utf8_lossy(&buf);
                Ok(text.trim_end_matches(['\n', '\r']).to_string())
            }
            Err(err) => Err(err),
        };
        let failed = line.is_err();
        if sender.send(line).is_err() || failed {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_shell_names_resolve_under_bin() {
        assert_eq!(resolve_shell("bash"), "/bin/bash");
        assert_eq!(resolve_shell("sh"), "/bin/sh");
        assert_eq!(resolve_shell("/usr/bin/env"), "/usr/bin/env");
        assert_eq!(resolve_shell(""), "/bin/bash");
    }

    #[test]
    fn script_gets_interpreter_line() {
        assert_eq!(
            compose_script("/bin/bash", "./date.sh\n"),
            "#!/bin/bash\n\n./date.sh\n"
        );
    }

    #[test]
    fn existing_interpreter_line_is_kept() {
        let code = "#!/bin/sh\necho hi\n";
        assert_eq!(compose_script("/bin/bash", code), code);
    }

    #[test]
    fn normalize_forces_executable_mode() {
        let mut block = Block::new(lightbulb::Action::RunShell, 0..0);
        block.mode = "0644".to_string();
        block.shell = "zsh".to_string();
        let normalized = normalize(&block);
        assert_eq!(normalized.mode, "0700");
        assert_eq!(normalized.shell, "/bin/zsh");
        assert_eq!(block.mode, "0644");
    }

    #[test]
    fn relay_strips_terminators_and_keeps_order() {
        let (sender, receiver) = mpsc::sync_channel(RELAY_CAPACITY);
        relay_lines(&b"one\r\ntwo\nthree"[..], sender);
        let lines: Vec<String> = receiver.into_iter().map(Result::unwrap).collect();
        assert_eq!(lines, ["one", "two", "three"]);
    }
}
