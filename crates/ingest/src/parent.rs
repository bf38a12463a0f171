//! Parent-child grouping — contiguous leaves under one top-level header
//! share a parent, which is what retrieval returns after dedup.

use sha2::{Digest, Sha256};

use crate::chunk::{estimate_tokens, LeafChunk, SectionSpan};

/// Deterministic parent id: truncated hex SHA-256 of the parent text.
fn parent_id(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    hex[..12].to_string()
}

/// Group contiguous leaf sections into parents bounded by
/// `parent_max_tokens`. Grouping key is the top-level header (first
/// element of the header path); oversized groups split at leaf
/// boundaries.
pub fn build_parents(sections: Vec<SectionSpan>, parent_max_tokens: usize) -> Vec<LeafChunk> {
    if sections.is_empty() {
        return Vec::new();
    }

    // Group contiguous sections by their top-level header.
    let mut groups: Vec<Vec<SectionSpan>> = Vec::new();
    let mut current: Vec<SectionSpan> = Vec::new();
    let mut current_top: Option<String> = None;

    for section in sections {
        let top = section.header_path.first().cloned().unwrap_or_default();
        match &current_top {
            Some(t) if *t == top => current.push(section),
            Some(_) => {
                groups.push(std::mem::take(&mut current));
                current_top = Some(top);
                current.push(section);
            }
            None => {
                current_top = Some(top);
                current.push(section);
            }
        }
    }
    if !current.is_empty() {
        groups.push(current);
    }

    let mut result = Vec::new();
    for group in groups {
        let total: usize = group.iter().map(|s| estimate_tokens(&s.text)).sum();
        if total <= parent_max_tokens {
            emit_parent(&group, &mut result);
        } else {
            for sub in split_group(group, parent_max_tokens) {
                emit_parent(&sub, &mut result);
            }
        }
    }
    result
}

fn emit_parent(group: &[SectionSpan], out: &mut Vec<LeafChunk>) {
    let parent_text: String = group.iter().map(|s| s.text.as_str()).collect::<Vec<_>>().join("\n\n");
    let pid = parent_id(&parent_text);
    for (idx, section) in group.iter().enumerate() {
        out.push(LeafChunk {
            text: section.text.clone(),
            header_path: section.header_path.clone(),
            level: section.level,
            context_header: section.context_header.clone(),
            parent_text: parent_text.clone(),
            parent_id: pid.clone(),
            leaf_index: idx,
        });
    }
}

/// Split a group of sections into sub-groups within `max_tokens` each.
fn split_group(group: Vec<SectionSpan>, max_tokens: usize) -> Vec<Vec<SectionSpan>> {
    let mut sub_groups: Vec<Vec<SectionSpan>> = Vec::new();
    let mut current: Vec<SectionSpan> = Vec::new();
    let mut current_tokens = 0usize;

    for section in group {
        let tokens = estimate_tokens(&section.text);
        if !current.is_empty() && current_tokens + tokens > max_tokens {
            sub_groups.push(std::mem::take(&mut current));
            current_tokens = 0;
        }
        current_tokens += tokens;
        current.push(section);
    }
    if !current.is_empty() {
        sub_groups.push(current);
    }
    sub_groups
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(text: &str, top: &str, level: u8) -> SectionSpan {
        SectionSpan {
            text: text.into(),
            header_path: vec![top.into()],
            level,
            context_header: format!("[Source: doc.md > {top}]"),
        }
    }

    fn words(n: usize) -> String {
        (0..n).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn contiguous_same_top_header_share_a_parent() {
        let chunks = build_parents(
            vec![span("alpha", "One", 1), span("beta", "One", 2), span("gamma", "Two", 1)],
            2000,
        );
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].parent_id, chunks[1].parent_id);
        assert_ne!(chunks[0].parent_id, chunks[2].parent_id);
        assert_eq!(chunks[0].leaf_index, 0);
        assert_eq!(chunks[1].leaf_index, 1);
        assert_eq!(chunks[2].leaf_index, 0);
    }

    #[test]
    fn parent_text_contains_children_in_order() {
        let chunks = build_parents(vec![span("alpha", "One", 1), span("beta", "One", 2)], 2000);
        assert_eq!(chunks[0].parent_text, "alpha\n\nbeta");
        assert_eq!(chunks[1].parent_text, "alpha\n\nbeta");
    }

    #[test]
    fn leaf_concat_reproduces_parent_text() {
        // Round-trip property: joining a parent's leaves in leaf-index
        // order reproduces the parent text exactly.
        let chunks = build_parents(
            vec![span(&words(80), "One", 1), span(&words(90), "One", 2), span(&words(70), "One", 2)],
            2000,
        );
        let parent = chunks[0].parent_text.clone();
        let mut leaves: Vec<&LeafChunk> = chunks.iter().filter(|c| c.parent_text == parent).collect();
        leaves.sort_by_key(|c| c.leaf_index);
        let rebuilt: String = leaves.iter().map(|c| c.text.as_str()).collect::<Vec<_>>().join("\n\n");
        assert_eq!(rebuilt, parent);
    }

    #[test]
    fn oversized_group_splits_into_sub_parents() {
        let chunks = build_parents(
            vec![
                span(&format!("one {}", words(400)), "Big", 1),
                span(&format!("two {}", words(400)), "Big", 2),
                span(&format!("three {}", words(400)), "Big", 2),
            ],
            600,
        );
        let mut parent_ids: Vec<&str> = chunks.iter().map(|c| c.parent_id.as_str()).collect();
        parent_ids.dedup();
        assert!(parent_ids.len() >= 2);
        // Leaf indexes restart within each sub-parent.
        assert_eq!(chunks[0].leaf_index, 0);
    }

    #[test]
    fn parent_ids_are_deterministic() {
        let make = || build_parents(vec![span("alpha", "One", 1), span("beta", "One", 2)], 2000);
        assert_eq!(make()[0].parent_id, make()[0].parent_id);
        assert_eq!(make(), make());
    }

    #[test]
    fn empty_input_yields_no_chunks() {
        assert!(build_parents(Vec::new(), 2000).is_empty());
    }
}
