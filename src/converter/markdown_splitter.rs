//! Re-split already produced Markdown at its level-1 heading lines.

use crate::converter::errors::{ConverterResult, InputError};
use crate::converter::filename;
use crate::converter::markdown_normalizer::Fence;
use crate::converter::section_splitter::INDEX_TITLE;
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;

static H1_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^#[ \t]+(\S.*?)\s*$").unwrap());

pub const MARKDOWN_EXTENSION: &str = "md";

/// One piece of a flat Markdown document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkdownSection {
    pub title: String,
    /// Normalized slug plus extension. Not yet de-duplicated against other
    /// sections or the target directory.
    pub file_name: String,
    pub content: String,
}

/// Byte offset and title of every level-1 heading line outside code fences
fn heading_positions(content: &str) -> Vec<(usize, String)> {
    let mut positions = Vec::new();
    let mut open_fence: Option<Fence> = None;
    let mut offset = 0;

    for raw_line in content.split_inclusive('\n') {
        let line = raw_line.trim_end_matches(['\n', '\r']);
        let state = open_fence;
        match state {
            Some(fence) if fence.closes(line) => open_fence = None,
            Some(_) => {}
            None => {
                if let Some(fence) = Fence::open(line) {
                    open_fence = Some(fence);
                } else if let Some(caps) = H1_LINE.captures(line) {
                    positions.push((offset, caps[1].to_string()));
                }
            }
        }
        offset += raw_line.len();
    }
    positions
}

/// Split flat Markdown into one section per level-1 heading, in document order.
///
/// Each section runs from its heading line to the next heading (or the end),
/// with trailing whitespace removed. Non-blank text ahead of the first heading
/// becomes an `index` section.
pub fn split_flat_markdown(content: &str) -> ConverterResult<Vec<MarkdownSection>> {
    if content.trim().is_empty() {
        return Err(InputError::EmptyContent.into());
    }

    let positions = heading_positions(content);
    if positions.is_empty() {
        return Err(InputError::NoSections.into());
    }

    let mut sections = Vec::with_capacity(positions.len() + 1);
    let preamble = content[..positions[0].0].trim();
    if !preamble.is_empty() {
        sections.push(section(INDEX_TITLE, preamble));
    }

    for (i, (start, title)) in positions.iter().enumerate() {
        let end = positions
            .get(i + 1)
            .map(|(next, _)| *next)
            .unwrap_or(content.len());
        sections.push(section(title, content[*start..end].trim_end()));
    }

    debug!("Split flat Markdown into {} section(s)", sections.len());
    Ok(sections)
}

fn section(title: &str, content: &str) -> MarkdownSection {
    MarkdownSection {
        title: title.to_string(),
        file_name: format!("{}.{}", filename::normalize(title), MARKDOWN_EXTENSION),
        content: content.to_string(),
    }
}

/// Count level-1 heading lines outside code fences
pub fn count_top_level_headings(content: &str) -> usize {
    heading_positions(content).len()
}
