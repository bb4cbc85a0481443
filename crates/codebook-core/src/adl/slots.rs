//! Slot include-assertion parsing.
//!
//! Slot inclusions arrive as regex-flavoured expression text, e.g.
//! `archetype_id/value matches {/openEHR-EHR-CLUSTER\.address(-a-z)*\.v1/}`.
//! The candidates are extracted by stripping the regex noise (escapes,
//! optional groups, anchors), then grouped per archetype name with their
//! version lists sorted newest first.

use std::collections::BTreeMap;

use codebook_ingest::ArchetypeSlot;

/// One candidate target archetype with its versions, newest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SlotCandidate {
    pub name: String,
    pub versions: Vec<String>,
}

/// What a slot allows: anything, or specific archetypes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SlotTarget {
    /// Wildcard inclusion; expansion needs a manual pick.
    Any,
    Archetype(SlotCandidate),
}

/// Candidates of one slot, in declaration order.
///
/// An empty include list means "anything fits", same as an explicit
/// wildcard pattern.
pub(crate) fn slot_targets(slot: &ArchetypeSlot) -> Vec<SlotTarget> {
    let mut any = slot.includes.is_empty();
    let mut order = Vec::new();
    let mut versions: BTreeMap<String, Vec<String>> = BTreeMap::new();

    for assertion in &slot.includes {
        for raw in alternatives(&assertion.string_expression) {
            let cleaned = strip_regex_noise(&raw);
            if cleaned.is_empty() || cleaned == ".*" {
                any = true;
                continue;
            }
            let (name, version) = split_version(&cleaned);
            let entry = versions.entry(name.clone()).or_insert_with(|| {
                order.push(name.clone());
                Vec::new()
            });
            if !version.is_empty() && !entry.contains(&version) {
                entry.push(version);
            }
        }
    }

    let mut targets = Vec::new();
    if any {
        targets.push(SlotTarget::Any);
    }
    for name in order {
        let mut list = versions.remove(&name).unwrap_or_default();
        list.sort_by_key(|v| std::cmp::Reverse(version_rank(v)));
        targets.push(SlotTarget::Archetype(SlotCandidate {
            name,
            versions: list,
        }));
    }
    targets
}

/// The `|`-separated alternatives of one expression, taken from between
/// the outer braces when present.
fn alternatives(expression: &str) -> Vec<String> {
    let inner = match (expression.find('{'), expression.rfind('}')) {
        (Some(open), Some(close)) if close > open => &expression[open + 1..close],
        _ => expression,
    };
    inner
        .trim()
        .trim_matches('/')
        .split('|')
        .map(|s| s.trim().to_string())
        .collect()
}

/// Drop regex escapes, anchors, and parenthesized optional groups with
/// their quantifier.
fn strip_regex_noise(raw: &str) -> String {
    let mut cleaned = String::new();
    let mut depth = 0usize;
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if depth == 0
                    && let Some(next) = chars.next()
                {
                    cleaned.push(next);
                }
            }
            '(' => depth += 1,
            ')' => {
                depth = depth.saturating_sub(1);
                // Swallow the quantifier that follows a group.
                if matches!(chars.peek(), Some('*' | '?' | '+')) {
                    chars.next();
                }
            }
            '^' | '$' => {}
            _ if depth > 0 => {}
            _ => cleaned.push(c),
        }
    }
    cleaned.trim().to_string()
}

/// Split `name.vN` into name and version; version is empty when the
/// candidate carries none.
fn split_version(candidate: &str) -> (String, String) {
    if let Some(position) = candidate.rfind(".v") {
        let version = &candidate[position + 1..];
        if version.len() > 1 && version[1..].chars().all(|c| c.is_ascii_digit()) {
            return (candidate[..position].to_string(), version.to_string());
        }
    }
    (candidate.to_string(), String::new())
}

fn version_rank(version: &str) -> u64 {
    version
        .trim_start_matches('v')
        .parse()
        .unwrap_or(0)
}
