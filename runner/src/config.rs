use std::collections::BTreeSet;
use std::path::PathBuf;

use lightbulb::Block;
use lightbulb::block::DEFAULT_TAG;

/// Per-run settings threaded through [`crate::run`].
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Blocks run only if they carry one of these tags (`all` matches everything).
    pub include_tags: BTreeSet<String>,
    /// Blocks carrying any of these tags are skipped.
    pub skip_tags: BTreeSet<String>,
    pub interactive: bool,
    /// Where relative `createFile` paths resolve, temporary scripts are
    /// written, and scripts run.
    pub work_dir: PathBuf,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            include_tags: BTreeSet::from([DEFAULT_TAG.to_string()]),
            skip_tags: BTreeSet::new(),
            interactive: false,
            work_dir: PathBuf::from("."),
        }
    }
}

impl RunConfig {
    pub fn with_work_dir(mut self, work_dir: impl Into<PathBuf>) -> Self {
        self.work_dir = work_dir.into();
        self
    }

    /// Whether the tag filters let `block` run.
    pub fn selects(&self, block: &Block) -> bool {
        let included =
            self.include_tags.contains(DEFAULT_TAG) || block.has_any_tag(&self.include_tags);
        included && !block.has_any_tag(&self.skip_tags)
    }
}
