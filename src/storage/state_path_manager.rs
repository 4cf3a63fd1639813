use std::path::PathBuf;

use crate::constants::STATE_FILE_NEW_SUFFIX;
use crate::constants::STATE_FILE_OLD_SUFFIX;

/// Centralized path construction for the persistence directory, keeping the
/// `<name>` / `<name>.old` / `<name>.new` rotation convention in one place.
#[derive(Debug)]
pub(crate) struct StatePathManager {
    /// Directory holding the persisted files
    pub(crate) base_dir: PathBuf,
}

impl StatePathManager {
    pub(crate) fn new(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// The live file readers open.
    pub(crate) fn current(
        &self,
        name: &str,
    ) -> PathBuf {
        self.base_dir.join(name)
    }

    /// The previous generation, kept as a manual fallback.
    pub(crate) fn old(
        &self,
        name: &str,
    ) -> PathBuf {
        self.base_dir.join(format!("{name}.{STATE_FILE_OLD_SUFFIX}"))
    }

    /// The in-flight write target swapped in by the rotation.
    pub(crate) fn new_file(
        &self,
        name: &str,
    ) -> PathBuf {
        self.base_dir.join(format!("{name}.{STATE_FILE_NEW_SUFFIX}"))
    }
}
