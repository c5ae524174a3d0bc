//! Layer lists: declared in config, or discovered from the asset hierarchy.

use std::collections::HashSet;

use shared::LayerSpec;

use super::cache::LayerInfo;
use crate::platform::SceneNode;

/// Layers from an explicit config list
pub fn declared_layers(specs: &[LayerSpec]) -> Vec<LayerInfo> {
    specs
        .iter()
        .map(|s| LayerInfo {
            name: s.name.clone(),
            label: s.label.clone().unwrap_or_else(|| format_label(&s.name)),
            visible: true,
        })
        .collect()
}

/// Best-effort discovery of toggleable top-level groups.
///
/// Looks at the top level, and one level below when the top level is a
/// single wrapper node. Unnamed nodes and nodes without geometry (lights,
/// cameras) are skipped. Fewer than two candidates means no layers.
pub fn discover_layers(nodes: &[SceneNode]) -> Vec<LayerInfo> {
    let mut level = nodes;

    for depth in 0..2 {
        let layers = named_geometry(level);
        if layers.len() >= 2 {
            return layers;
        }

        let mut geometric = level.iter().filter(|n| n.has_geometry());
        match (geometric.next(), geometric.next()) {
            (Some(only), None) if depth == 0 => level = &only.children,
            _ => break,
        }
    }

    Vec::new()
}

fn named_geometry(level: &[SceneNode]) -> Vec<LayerInfo> {
    let mut seen = HashSet::new();
    level
        .iter()
        .filter(|n| n.has_geometry())
        .filter_map(|n| n.label_name())
        .filter(|name| seen.insert(name.to_string()))
        .map(|name| LayerInfo {
            name: name.to_string(),
            label: format_label(name),
            visible: true,
        })
        .collect()
}

/// Turn a node name into a label: `floor1` → `Floor 1`,
/// `first_floor` → `First Floor`, `Roof.001` → `Roof`
pub fn format_label(name: &str) -> String {
    let base = match name.rsplit_once('.') {
        Some((head, tail))
            if !head.is_empty() && !tail.is_empty() && tail.chars().all(|c| c.is_ascii_digit()) =>
        {
            head
        }
        _ => name,
    };

    let mut words: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut prev: Option<char> = None;

    for c in base.chars() {
        if c == '_' || c == '-' || c == '.' || c.is_whitespace() {
            flush(&mut words, &mut current);
            prev = None;
            continue;
        }
        if let Some(p) = prev {
            let boundary = (p.is_lowercase() && c.is_uppercase())
                || (p.is_alphabetic() && c.is_ascii_digit())
                || (p.is_ascii_digit() && c.is_alphabetic());
            if boundary {
                flush(&mut words, &mut current);
            }
        }
        current.push(c);
        prev = Some(c);
    }
    flush(&mut words, &mut current);

    if words.is_empty() {
        return name.trim().to_string();
    }
    words
        .iter()
        .map(|w| capitalize(w))
        .collect::<Vec<_>>()
        .join(" ")
}

fn flush(words: &mut Vec<String>, current: &mut String) {
    if !current.is_empty() {
        words.push(std::mem::take(current));
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
