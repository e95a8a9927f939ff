//! Hierarchical code allocation for chart-of-accounts nodes
//!
//! Codes are dash-joined paths: a top-level category is a bare integer
//! (`"1"`), a child category appends a two-digit segment (`"1-01"`), a
//! sub-account appends four digits (`"1-0001"`) and a detail account two
//! more (`"1-0001-01"`). Allocation here is pure; the chart store runs it
//! inside the same transaction as the insert that consumes the code.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::types::*;

/// Widest top-level category code, in digits
pub const TOP_LEVEL_MAX_DIGITS: usize = 9;

/// The three levels of the chart of accounts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NodeKind {
    Category,
    SubAccount,
    DetailAccount,
}

impl NodeKind {
    /// Zero-padded width of the segment appended under a parent
    pub fn segment_width(&self) -> usize {
        match self {
            NodeKind::Category | NodeKind::DetailAccount => 2,
            NodeKind::SubAccount => 4,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            NodeKind::Category => "category",
            NodeKind::SubAccount => "sub-account",
            NodeKind::DetailAccount => "detail account",
        }
    }
}

/// Compute the next free code for a new node.
///
/// `existing_sibling_codes` may contain any codes of the same kind; only
/// direct children of `parent_code` (or top-level codes when there is no
/// parent) are considered. A trailing segment that is not numeric counts
/// as zero.
pub fn next_code<S: AsRef<str>>(
    kind: NodeKind,
    parent_code: Option<&str>,
    existing_sibling_codes: &[S],
) -> LedgerResult<String> {
    match parent_code {
        None => {
            if kind != NodeKind::Category {
                return Err(LedgerError::Validation(format!(
                    "a {} code needs a parent code",
                    kind.label()
                )));
            }
            let max = existing_sibling_codes
                .iter()
                .map(|code| code.as_ref())
                .filter(|code| !code.contains('-'))
                .map(segment_value)
                .max()
                .unwrap_or(0);
            let next = successor(max, TOP_LEVEL_MAX_DIGITS)
                .ok_or_else(|| no_codes_left(kind, "the chart root"))?;
            Ok(next.to_string())
        }
        Some(parent) => {
            let max = existing_sibling_codes
                .iter()
                .filter_map(|code| child_segment(parent, code.as_ref()))
                .map(segment_value)
                .max()
                .unwrap_or(0);
            let width = kind.segment_width();
            let next = successor(max, width).ok_or_else(|| no_codes_left(kind, parent))?;
            Ok(format!("{}-{:0width$}", parent, next, width = width))
        }
    }
}

/// Check the shape of a caller-supplied code against its parent.
///
/// A top-level category code is at most [`TOP_LEVEL_MAX_DIGITS`] digits; a
/// child code is its parent's code plus one segment of exactly
/// [`NodeKind::segment_width`] digits.
pub fn check_code(kind: NodeKind, parent_code: Option<&str>, code: &str) -> LedgerResult<()> {
    match parent_code {
        None => {
            if kind != NodeKind::Category {
                return Err(LedgerError::Validation(format!(
                    "a {} code needs a parent code",
                    kind.label()
                )));
            }
            if !is_digits(code) || code.len() > TOP_LEVEL_MAX_DIGITS {
                return Err(LedgerError::Validation(format!(
                    "top-level category code '{}' must be 1 to {} digits",
                    code, TOP_LEVEL_MAX_DIGITS
                )));
            }
        }
        Some(parent) => {
            let width = kind.segment_width();
            match child_segment(parent, code) {
                None => {
                    return Err(LedgerError::Validation(format!(
                        "{} code '{}' must extend its parent code '{}'",
                        kind.label(),
                        code,
                        parent
                    )))
                }
                Some(segment) if !is_digits(segment) || segment.len() != width => {
                    return Err(LedgerError::Validation(format!(
                        "{} code '{}' must end in a {}-digit segment",
                        kind.label(),
                        code,
                        width
                    )))
                }
                Some(_) => {}
            }
        }
    }
    Ok(())
}

/// True when `code` is a direct child of `parent_code`
pub fn is_child_code(parent_code: &str, code: &str) -> bool {
    child_segment(parent_code, code).is_some()
}

/// The code of the direct parent, if any
pub fn parent_code(code: &str) -> Option<&str> {
    code.rsplit_once('-').map(|(parent, _)| parent)
}

/// Order codes segment by segment, numerically where both segments are numbers
pub fn compare_codes(a: &str, b: &str) -> Ordering {
    let mut left = a.split('-');
    let mut right = b.split('-');
    loop {
        match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(l), Some(r)) => {
                let ordering = match (l.parse::<u64>(), r.parse::<u64>()) {
                    (Ok(l), Ok(r)) => l.cmp(&r),
                    _ => l.cmp(r),
                };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
        }
    }
}

fn child_segment<'a>(parent_code: &str, code: &'a str) -> Option<&'a str> {
    let rest = code.strip_prefix(parent_code)?.strip_prefix('-')?;
    if rest.is_empty() || rest.contains('-') {
        None
    } else {
        Some(rest)
    }
}

fn segment_value(segment: &str) -> u64 {
    segment.parse().unwrap_or(0)
}

fn is_digits(segment: &str) -> bool {
    !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit())
}

/// `value + 1` when it still fits in `digits` decimal digits
fn successor(value: u64, digits: usize) -> Option<u64> {
    let next = value.checked_add(1)?;
    let limit = 10u64.checked_pow(digits as u32)?;
    (next < limit).then_some(next)
}

fn no_codes_left(kind: NodeKind, parent: &str) -> LedgerError {
    LedgerError::Validation(format!("no {} codes left under '{}'", kind.label(), parent))
}
