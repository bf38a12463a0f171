//! Size enforcement — oversized sections split at paragraph then sentence
//! boundaries, undersized sections merged with the next same-level sibling.
//! Never splits mid-sentence.

use crate::chunk::{estimate_tokens, ChunkLimits, SectionSpan};

/// Enforce token size limits on sections.
///
/// A single sentence larger than `max_tokens` is left intact: it is the
/// smallest un-splittable unit.
pub fn enforce_sizes(sections: Vec<SectionSpan>, limits: &ChunkLimits) -> Vec<SectionSpan> {
    let mut sized: Vec<SectionSpan> = Vec::new();
    for section in sections {
        if estimate_tokens(&section.text) > limits.max_tokens {
            sized.extend(split_large(section, limits.max_tokens));
        } else {
            sized.push(section);
        }
    }

    // Second pass: merge undersized sections with the next same-level sibling.
    let mut merged: Vec<SectionSpan> = Vec::new();
    let mut iter = sized.into_iter().peekable();
    while let Some(current) = iter.next() {
        if estimate_tokens(&current.text) < limits.min_tokens {
            if let Some(next) = iter.peek() {
                if next.level == current.level {
                    let next = iter.next().expect("peeked");
                    merged.push(SectionSpan {
                        text: format!("{}\n\n{}", current.text, next.text),
                        header_path: current.header_path,
                        level: current.level,
                        context_header: current.context_header,
                    });
                    continue;
                }
            }
        }
        merged.push(current);
    }
    merged
}

/// Split an oversized section at paragraph boundaries, then sentence
/// boundaries for any paragraph group still over the limit.
fn split_large(section: SectionSpan, max_tokens: usize) -> Vec<SectionSpan> {
    let paragraphs: Vec<&str> = section
        .text
        .split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();
    let para_groups = group_segments(&paragraphs, max_tokens, "\n\n");

    let mut final_texts: Vec<String> = Vec::new();
    for group in para_groups {
        if estimate_tokens(&group) > max_tokens {
            let sentences: Vec<&str> = group.split_inclusive(". ").collect();
            final_texts.extend(group_segments(&sentences, max_tokens, ""));
        } else {
            final_texts.push(group);
        }
    }

    let multi = final_texts.len() > 1;
    final_texts
        .into_iter()
        .enumerate()
        .map(|(idx, text)| {
            let suffix = if multi { format!(" (part {})", idx + 1) } else { String::new() };
            SectionSpan {
                text: text.trim().to_string(),
                header_path: section.header_path.clone(),
                level: section.level,
                context_header: format!("{}{}", section.context_header, suffix),
            }
        })
        .collect()
}

/// Greedily pack segments into groups that stay under `max_tokens`.
/// A single segment over the limit becomes its own group.
fn group_segments(segments: &[&str], max_tokens: usize, separator: &str) -> Vec<String> {
    let mut groups: Vec<String> = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for seg in segments {
        let candidate = if current.is_empty() {
            (*seg).to_string()
        } else {
            format!("{}{}{}", current.join(separator), separator, seg)
        };
        if estimate_tokens(&candidate) > max_tokens && !current.is_empty() {
            groups.push(current.join(separator));
            current = vec![seg];
        } else {
            current.push(seg);
        }
    }
    if !current.is_empty() {
        groups.push(current.join(separator));
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(text: &str, level: u8) -> SectionSpan {
        SectionSpan {
            text: text.into(),
            header_path: vec!["Top".into()],
            level,
            context_header: "[Source: doc.md > Top]".into(),
        }
    }

    fn words(n: usize) -> String {
        (0..n).map(|i| format!("word{i}")).collect::<Vec<_>>().join(" ")
    }

    fn sentences(n: usize) -> String {
        (0..n).map(|i| format!("{} end{i}. ", words(18))).collect::<String>().trim_end().to_string()
    }

    #[test]
    fn small_sections_pass_through() {
        let limits = ChunkLimits::default();
        let out = enforce_sizes(vec![span(&words(200), 1)], &limits);
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn oversized_section_splits_at_paragraphs() {
        let limits = ChunkLimits::default();
        let text = format!("{}\n\n{}\n\n{}", words(300), words(300), words(300));
        let out = enforce_sizes(vec![span(&text, 1)], &limits);

        assert!(out.len() >= 2);
        for piece in &out {
            assert!(estimate_tokens(&piece.text) <= limits.max_tokens);
            assert_eq!(piece.header_path, vec!["Top".to_string()]);
        }
        assert!(out[0].context_header.contains("(part 1)"));
    }

    #[test]
    fn giant_paragraph_splits_at_sentences() {
        let limits = ChunkLimits::default();
        let sentence = format!("{}. ", words(50));
        let text = sentence.repeat(20); // ~1300 tokens, one paragraph
        let out = enforce_sizes(vec![span(&text, 2)], &limits);

        assert!(out.len() >= 2);
        for piece in &out {
            assert!(estimate_tokens(&piece.text) <= limits.max_tokens);
        }
    }

    #[test]
    fn single_oversized_sentence_stays_intact() {
        let limits = ChunkLimits::default();
        let text = words(700); // no sentence boundary anywhere
        let out = enforce_sizes(vec![span(&text, 1)], &limits);
        assert_eq!(out.len(), 1);
        assert!(estimate_tokens(&out[0].text) > limits.max_tokens);
    }

    #[test]
    fn undersized_merges_with_next_same_level_sibling() {
        let limits = ChunkLimits::default();
        let out = enforce_sizes(vec![span(&words(20), 2), span(&words(200), 2)], &limits);
        assert_eq!(out.len(), 1);
        assert!(out[0].text.contains("word0"));
        assert!(out[0].text.contains("word199"));
    }

    #[test]
    fn undersized_does_not_merge_across_levels() {
        let limits = ChunkLimits::default();
        let out = enforce_sizes(vec![span(&words(20), 1), span(&words(200), 2)], &limits);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn size_bounds_hold_for_all_outputs() {
        let limits = ChunkLimits::default();
        let text = format!(
            "{}\n\n{}\n\n{}\n\n{}",
            words(150),
            sentences(16),
            words(30),
            sentences(24)
        );
        let out = enforce_sizes(vec![span(&text, 1)], &limits);
        for piece in out {
            let tokens = estimate_tokens(&piece.text);
            assert!(tokens <= limits.max_tokens, "chunk over max: {tokens}");
        }
    }
}
