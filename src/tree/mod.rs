//! Association tree linkage.
//!
//! Rebuilds parent/child references and fair-share weights over a freshly
//! installed (or structurally changed) association table. Linkage is stored
//! as id references resolved through a per-pass lookup index, never as
//! pointers into the table, so a cache swap cannot leave a stale reference
//! behind.

mod resolver;
pub(crate) use resolver::*;
