//! Logo-key inference for search index entries

use crate::graph::{GraphSnapshot, Node, SnapshotView};
use regex::Regex;
use std::sync::LazyLock;

static TOKEN_LIKE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9.]+$").expect("static token pattern"));

static UPPER_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z0-9.]+$").expect("static token pattern"));

/// Short alphanumeric symbol such as `USDC` or `wstETH` (2 to 10 chars, dots allowed).
pub fn is_token_like(value: &str) -> bool {
    let v = value.trim();
    (2..=10).contains(&v.len()) && TOKEN_LIKE.is_match(v)
}

fn is_upper_token(value: &str) -> bool {
    UPPER_TOKEN.is_match(value.trim())
}

/// Symbol a leaf name stands for: the base of a `BASE/QUOTE` or upper-case
/// `BASE-QUOTE` market, or the name itself when it is a plain symbol.
fn leaf_symbol(name: &str) -> Option<&str> {
    let parts: Vec<&str> = name.split('/').collect();
    if let [base, quote] = parts.as_slice() {
        if is_token_like(base) && is_token_like(quote) {
            return Some(*base);
        }
    }

    let parts: Vec<&str> = name.split('-').collect();
    if let [base, quote] = parts.as_slice() {
        if is_token_like(base) && is_token_like(quote) && is_upper_token(base) && is_upper_token(quote) {
            return Some(*base);
        }
    }

    is_token_like(name).then_some(name)
}

/// Ordered symbol hints for a snapshot root.
///
/// Explicit `logoKeys` win, then a token-like `underlyingSymbol`, then a
/// token-like root name. Failing those, the root's outgoing edges vote with
/// their `|allocationUsd|` for the symbol each leaf stands for, and the
/// heaviest symbol is returned (earliest wins a tie).
pub fn infer_logo_keys(snapshot: &GraphSnapshot, root: &Node) -> Vec<String> {
    if let Some(keys) = root.logo_keys.as_ref().filter(|k| !k.is_empty()) {
        return keys.clone();
    }

    let underlying = root
        .details
        .as_ref()
        .and_then(|d| d.underlying_symbol.as_deref())
        .map(str::trim)
        .unwrap_or("");
    if !underlying.is_empty() && is_token_like(underlying) {
        return vec![underlying.to_string()];
    }

    let name = root.name.trim();
    if is_token_like(name) {
        return vec![name.to_string()];
    }

    let view = SnapshotView::new(snapshot);
    let mut weights: Vec<(&str, f64)> = Vec::new();

    for edge in view.outgoing(root.id.as_str()) {
        let weight = edge.weight();
        if !weight.is_finite() || weight <= 0.0 {
            continue;
        }
        let Some(leaf) = view.node(edge.to.as_str()) else {
            continue;
        };
        let leaf_name = leaf.name.trim();
        if leaf_name.is_empty() {
            continue;
        }
        let Some(symbol) = leaf_symbol(leaf_name) else {
            continue;
        };
        match weights.iter_mut().find(|(s, _)| *s == symbol) {
            Some((_, total)) => *total += weight,
            None => weights.push((symbol, weight)),
        }
    }

    let mut best: Option<(&str, f64)> = None;
    for (symbol, weight) in weights {
        if best.map_or(true, |(_, w)| weight > w) {
            best = Some((symbol, weight));
        }
    }
    best.map(|(symbol, _)| vec![symbol.to_string()]).unwrap_or_default()
}

/// Canonical protocol key: lowercase, with multi-version families collapsed
/// (`midas-*` → `midas`, `morpho-v1` → `morpho`).
pub fn normalize_protocol_key(protocol: &str) -> String {
    let key = protocol.trim().to_lowercase();
    for family in ["midas", "morpho"] {
        if key.starts_with(family) {
            return family.to_string();
        }
    }
    key
}
