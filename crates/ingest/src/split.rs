//! Header-based splitting of markdown into hierarchical sections.
//!
//! Headings are detected with pulldown-cmark rather than line regexes, so
//! `#` lines inside fenced code blocks are not mistaken for headers.
//! Sections are sliced from the raw source by byte offset, which keeps the
//! original text byte-for-byte and makes the split reproducible.

use pulldown_cmark::{Event, HeadingLevel, Parser, Tag, TagEnd};

use crate::chunk::SectionSpan;

/// Only H1..H3 act as split points; deeper headings stay inside their
/// enclosing section.
const MAX_SPLIT_DEPTH: u8 = 3;

fn heading_depth(level: HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

/// Split markdown into sections at header boundaries, preserving the
/// header path per section. Content before the first header lands in an
/// "Introduction" section; a header-less document becomes one section.
pub fn split_by_headers(markdown: &str, source_id: &str) -> Vec<SectionSpan> {
    // Pass 1: locate split-point headings (byte offset, depth, title).
    let mut headings: Vec<(usize, u8, String)> = Vec::new();
    let mut pending: Option<(usize, u8, String)> = None;

    for (event, range) in Parser::new(markdown).into_offset_iter() {
        match event {
            Event::Start(Tag::Heading { level, .. }) => {
                let depth = heading_depth(level);
                if depth <= MAX_SPLIT_DEPTH {
                    pending = Some((range.start, depth, String::new()));
                }
            }
            Event::Text(text) | Event::Code(text) => {
                if let Some((_, _, title)) = pending.as_mut() {
                    title.push_str(&text);
                }
            }
            Event::End(TagEnd::Heading(_)) => {
                if let Some((offset, depth, title)) = pending.take() {
                    headings.push((offset, depth, title.trim().to_string()));
                }
            }
            _ => {}
        }
    }

    if headings.is_empty() {
        return vec![SectionSpan {
            text: markdown.trim().to_string(),
            header_path: vec!["Introduction".into()],
            level: 0,
            context_header: format!("[Source: {source_id}]"),
        }];
    }

    let mut sections = Vec::new();

    // Content before the first header.
    let pre_header = markdown[..headings[0].0].trim();
    if !pre_header.is_empty() {
        sections.push(SectionSpan {
            text: pre_header.to_string(),
            header_path: vec!["Introduction".into()],
            level: 0,
            context_header: format!("[Source: {source_id} > Introduction]"),
        });
    }

    // Pass 2: slice sections and maintain the header stack.
    let mut stack: Vec<(u8, String)> = Vec::new();
    for (i, (offset, depth, title)) in headings.iter().enumerate() {
        let end = headings.get(i + 1).map_or(markdown.len(), |next| next.0);
        let text = markdown[*offset..end].trim().to_string();

        while stack.last().is_some_and(|(d, _)| *d >= *depth) {
            stack.pop();
        }
        stack.push((*depth, title.clone()));

        let header_path: Vec<String> = stack.iter().map(|(_, t)| t.clone()).collect();
        let path_str = header_path.join(" > ");

        sections.push(SectionSpan {
            text,
            header_path,
            level: *depth,
            context_header: format!("[Source: {source_id} > {path_str}]"),
        });
    }

    sections
}
