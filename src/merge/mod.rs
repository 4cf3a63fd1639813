//! Incremental cache mutation: the QOS-list edit mini-language and the
//! delta merger that applies add/modify/remove update envelopes from the
//! accounting database.

mod delta;
mod qos_instr;

pub(crate) use qos_instr::*;
