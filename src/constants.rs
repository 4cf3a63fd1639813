// -
// Snapshot files

/// File names inside the persistence directory
pub(crate) const STATE_FILE_NAME: &str = "assoc_mgr_state";
pub(crate) const USAGE_FILE_NAME: &str = "assoc_mgr_usage";

/// Suffixes used by the hard-link based atomic rotation
pub(crate) const STATE_FILE_OLD_SUFFIX: &str = "old";
pub(crate) const STATE_FILE_NEW_SUFFIX: &str = "new";

/// Inclusive version range accepted when reading `assoc_mgr_state`
pub(crate) const STATE_FILE_VERSION: u16 = 2;
pub(crate) const STATE_FILE_MIN_VERSION: u16 = 1;

/// The usage checkpoint has its own, smaller versioning domain
pub(crate) const USAGE_FILE_VERSION: u16 = 1;
pub(crate) const USAGE_FILE_MIN_VERSION: u16 = 1;

/// Block type tags inside `assoc_mgr_state`
pub(crate) const BLOCK_TAG_ASSOCS: u16 = 1;
pub(crate) const BLOCK_TAG_USERS: u16 = 2;
pub(crate) const BLOCK_TAG_QOS: u16 = 3;
pub(crate) const BLOCK_TAG_WCKEYS: u16 = 4;

// -
// Tree

/// Parent id carried by a tree root
pub(crate) const ROOT_PARENT_ID: u32 = 0;

/// Share weight assumed when an added record carries none
pub(crate) const DEFAULT_RAW_SHARES: u32 = 1;
