use std::fs::OpenOptions;
use std::io::Write;
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;

use lightbulb::Block;
use tracing::{debug, info};

use crate::error::ExecutionError;

const MAX_MODE: u32 = 0o7777;

/// Parse an octal permission string such as `"0700"`.
pub(crate) fn parse_mode(mode: &str) -> Result<u32, ExecutionError> {
    u32::from_str_radix(mode, 8)
        .ok()
        .filter(|bits| *bits <= MAX_MODE && !mode.starts_with('+'))
        .ok_or_else(|| ExecutionError::InvalidMode(mode.to_string()))
}

/// Create or truncate `path` and write `contents`. `mode` applies when the
/// file is created.
pub(crate) fn write_file(path: &Path, contents: &[u8], mode: u32) -> Result<(), ExecutionError> {
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(mode)
        .open(path)
        .map_err(ExecutionError::io(path))?;
    file.write_all(contents).map_err(ExecutionError::io(path))
}

/// Write `block`'s code to `path`, resolved against `work_dir`.
pub(crate) fn create_file(block: &Block, path: &str, work_dir: &Path) -> Result<(), ExecutionError> {
    let mode = parse_mode(&block.mode)?;
    let path = work_dir.join(path);

    info!(path = %path.display(), mode = %block.mode, "saving file");
    debug!("file contents:\n{}", block.code);
    write_file(&path, block.code.as_bytes(), mode)
}
