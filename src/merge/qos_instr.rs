//! The `+name` / `-name` / `=name` mini-language used to incrementally edit
//! an association's allowed-QOS list.
//!
//! Instructions are parsed into a tagged variant before anything is
//! applied, so the merge operates on structured data instead of raw
//! strings.

/// One parsed edit instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum QosInstr {
    /// `+name`: append if not already present
    Append(String),
    /// `-name`: remove the first occurrence
    Remove(String),
    /// `=name` or a bare `name`: flush the list once per batch, then append
    Replace(String),
}

pub(crate) fn parse_qos_instrs(raw: &[String]) -> Vec<QosInstr> {
    raw.iter()
        .filter(|s| !s.is_empty())
        .map(|s| {
            if let Some(rest) = s.strip_prefix('+') {
                QosInstr::Append(rest.to_string())
            } else if let Some(rest) = s.strip_prefix('-') {
                QosInstr::Remove(rest.to_string())
            } else if let Some(rest) = s.strip_prefix('=') {
                QosInstr::Replace(rest.to_string())
            } else {
                QosInstr::Replace(s.clone())
            }
        })
        .collect()
}

/// Apply a parsed batch to a QOS list.
///
/// The flush triggered by the first `Replace` happens at most once per
/// call; subsequent `Replace` instructions in the same batch append.
pub(crate) fn apply_qos_instrs(
    target: &mut Vec<String>,
    instrs: &[QosInstr],
) {
    let mut flushed = false;
    for instr in instrs {
        match instr {
            QosInstr::Append(name) => {
                if !target.iter().any(|t| t == name) {
                    target.push(name.clone());
                }
            }
            QosInstr::Remove(name) => {
                if let Some(pos) = target.iter().position(|t| t == name) {
                    target.remove(pos);
                }
            }
            QosInstr::Replace(name) => {
                if !flushed {
                    target.clear();
                    flushed = true;
                }
                if !target.iter().any(|t| t == name) {
                    target.push(name.clone());
                }
            }
        }
    }
}
