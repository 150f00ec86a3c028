//! Optional Markdown style pass over written files.
//!
//! Documents are parsed and re-emitted with comrak, so wrapping and fence
//! style always produce valid CommonMark. Line endings are applied last.

use crate::converter::config::{CodeStyle, EndOfLine, FormattingConfig, WrapKeyword, WrapMode};
use crate::converter::errors::{ConverterResult, FileOperationError};
use crate::converter::markdown_normalizer::Fence;
use comrak::nodes::{AstNode, NodeValue};
use comrak::{format_commonmark, parse_document, Arena, ComrakOptions};
use log::{debug, info, trace, warn};
use std::fs;
use std::mem::Discriminant;
use std::path::{Path, PathBuf};

/// Render width that never wraps but still joins soft line breaks
const UNWRAPPED: usize = u32::MAX as usize;

pub struct MarkdownFormatter {
    options: FormattingConfig,
}

impl MarkdownFormatter {
    pub fn new(options: FormattingConfig) -> Self {
        Self { options }
    }

    /// Format every `*.md` file below `dir`. Returns the files whose content changed.
    pub fn format_directory(&self, dir: &Path) -> ConverterResult<Vec<PathBuf>> {
        let mut files = Vec::new();
        collect_markdown_files(dir, &mut files)?;
        files.sort();

        let mut changed = Vec::new();
        for file in files {
            if self.format_file(&file)? {
                changed.push(file);
            }
        }
        info!("Formatted {} of the Markdown files under {:?}", changed.len(), dir);
        Ok(changed)
    }

    /// Rewrite one file in place. Returns whether its content changed.
    pub fn format_file(&self, path: &Path) -> ConverterResult<bool> {
        let original = fs::read_to_string(path).map_err(|source| FileOperationError::FileReadFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let formatted = self.format_text(&original);
        if formatted == original {
            trace!("{:?} already formatted", path);
            return Ok(false);
        }

        fs::write(path, &formatted).map_err(|source| FileOperationError::FileWriteFailed {
            path: path.to_path_buf(),
            source,
        })?;
        debug!("Formatted {:?}", path);
        Ok(true)
    }

    pub fn format_text(&self, text: &str) -> String {
        let uses_crlf = text.contains("\r\n");
        let unified = text.replace("\r\n", "\n");

        let out = if self.options.code_style == CodeStyle::Keep && has_tilde_fence(&unified) {
            trace!("Document keeps its ~~~ fences, only line endings change");
            unified
        } else {
            self.render(&unified)
        };

        let crlf = match self.options.end_of_line {
            EndOfLine::Lf => false,
            EndOfLine::Crlf => true,
            EndOfLine::Keep => uses_crlf,
        };
        if crlf {
            out.replace('\n', "\r\n")
        } else {
            out
        }
    }

    fn render(&self, text: &str) -> String {
        let width = match self.options.wrap {
            WrapMode::Keyword(WrapKeyword::Keep) => 0,
            WrapMode::Keyword(WrapKeyword::No) => UNWRAPPED,
            WrapMode::Width(width) => width,
        };
        let Some(formatted) = render_commonmark(text, width) else {
            return text.to_string();
        };
        if matches!(self.options.wrap, WrapMode::Keyword(_)) || same_blocks(text, &formatted) {
            return formatted;
        }

        // a wrapped line starting with a list or heading marker changes the document
        debug!("Wrapping at {} would restructure the document, leaving paragraphs unwrapped", width);
        render_commonmark(text, UNWRAPPED).unwrap_or_else(|| text.to_string())
    }
}

fn comrak_options(width: usize) -> ComrakOptions<'static> {
    let mut options = ComrakOptions::default();
    options.extension.table = true;
    options.extension.strikethrough = true;
    options.render.width = width;
    options.render.prefer_fenced = true;
    options
}

fn render_commonmark(text: &str, width: usize) -> Option<String> {
    let arena = Arena::new();
    let options = comrak_options(width);
    let root = parse_document(&arena, text, &options);

    let mut output = Vec::new();
    if let Err(e) = format_commonmark(root, &options, &mut output) {
        warn!("Markdown rendering failed, leaving the text as is: {}", e);
        return None;
    }
    let markdown = String::from_utf8(output).ok()?;
    // comrak separates adjacent lists with this comment
    Some(markdown.replace("<!-- end list -->\n\n", ""))
}

/// Kinds of the block nodes in document order
fn block_kinds<'a>(root: &'a AstNode<'a>) -> Vec<Discriminant<NodeValue>> {
    root.descendants()
        .filter_map(|node| {
            let data = node.data.borrow();
            data.value.block().then(|| std::mem::discriminant(&data.value))
        })
        .collect()
}

fn same_blocks(before: &str, after: &str) -> bool {
    let arena = Arena::new();
    let options = comrak_options(0);
    let before = block_kinds(parse_document(&arena, before, &options));
    let after = block_kinds(parse_document(&arena, after, &options));
    before == after
}

fn has_tilde_fence(text: &str) -> bool {
    text.lines()
        .filter_map(Fence::open)
        .any(|fence| fence.marker() == '~')
}

fn collect_markdown_files(dir: &Path, files: &mut Vec<PathBuf>) -> ConverterResult<()> {
    let entries = fs::read_dir(dir).map_err(|source| FileOperationError::FileReadFailed {
        path: dir.to_path_buf(),
        source,
    })?;
    for entry in entries {
        let path = entry
            .map_err(|source| FileOperationError::FileReadFailed {
                path: dir.to_path_buf(),
                source,
            })?
            .path();
        if path.is_dir() {
            collect_markdown_files(&path, files)?;
        } else if path.extension().is_some_and(|ext| ext == "md") {
            files.push(path);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn formatter(wrap: WrapMode, end_of_line: EndOfLine, code_style: CodeStyle) -> MarkdownFormatter {
        MarkdownFormatter::new(FormattingConfig {
            wrap,
            end_of_line,
            code_style,
        })
    }

    fn words(text: &str) -> Vec<String> {
        text.replace('\\', "")
            .split_whitespace()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn test_keep_leaves_line_breaks_alone() {
        let f = MarkdownFormatter::new(FormattingConfig::default());
        let text = "# Title\n\nline one\nline two\n";
        assert_eq!(f.format_text(text), text);
    }

    #[test]
    fn test_no_wrap_joins_paragraph_lines() {
        let f = formatter(WrapMode::Keyword(WrapKeyword::No), EndOfLine::Lf, CodeStyle::Keep);
        let text = "# Title\n\nline one\nline two\n\n- item\n- item two\n";
        assert_eq!(f.format_text(text), "# Title\n\nline one line two\n\n- item\n- item two\n");
    }

    #[test]
    fn test_width_wrap() {
        let f = formatter(WrapMode::Width(20), EndOfLine::Lf, CodeStyle::Keep);
        let text = "the quick brown fox jumps over the lazy dog\n";
        let formatted = f.format_text(text);
        assert!(formatted.lines().count() > 1);
        assert!(formatted.lines().all(|line| line.chars().count() <= 20), "{:?}", formatted);
        assert_eq!(words(&formatted), words(text));
    }

    #[test]
    fn test_wrapping_never_creates_lists_or_headings() {
        let f = formatter(WrapMode::Width(10), EndOfLine::Lf, CodeStyle::Keep);
        let text = "abc defgh - item # not heading\n";
        let formatted = f.format_text(text);

        assert!(
            !formatted
                .lines()
                .any(|line| line.starts_with("- ") || line.starts_with("# ")),
            "{:?}",
            formatted
        );
        assert!(same_blocks(text, &formatted));
        assert_eq!(words(&formatted), words(text));
    }

    #[test]
    fn test_fenced_code_is_never_wrapped() {
        let f = formatter(WrapMode::Width(10), EndOfLine::Lf, CodeStyle::Keep);
        let text = "```\na very long line of code that stays\nsecond\n```\n";
        assert_eq!(f.format_text(text), text);
    }

    #[test]
    fn test_hard_breaks_are_kept() {
        let f = formatter(WrapMode::Keyword(WrapKeyword::No), EndOfLine::Lf, CodeStyle::Keep);
        let formatted = f.format_text("first  \nsecond\n");
        let lines: Vec<&str> = formatted.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("first"));
        assert_eq!(lines[1], "second");
    }

    #[test]
    fn test_end_of_line() {
        let crlf = formatter(WrapMode::Keyword(WrapKeyword::Keep), EndOfLine::Crlf, CodeStyle::Keep);
        assert_eq!(crlf.format_text("a\nb\n"), "a\r\nb\r\n");

        let lf = formatter(WrapMode::Keyword(WrapKeyword::Keep), EndOfLine::Lf, CodeStyle::Keep);
        assert_eq!(lf.format_text("a\r\nb\r\n"), "a\nb\n");

        let keep = formatter(WrapMode::Keyword(WrapKeyword::Keep), EndOfLine::Keep, CodeStyle::Keep);
        assert_eq!(keep.format_text("a\r\nb\r\n"), "a\r\nb\r\n");
        assert_eq!(keep.format_text("a\nb\n"), "a\nb\n");
    }

    #[test]
    fn test_consistent_code_style() {
        let f = formatter(WrapMode::Keyword(WrapKeyword::Keep), EndOfLine::Lf, CodeStyle::Consistent);
        assert_eq!(f.format_text("~~~rust\nlet x = 1;\n~~~\n"), "```rust\nlet x = 1;\n```\n");

        let nested = f.format_text("~~~\n```\ninner\n```\n~~~\n");
        assert!(nested.starts_with("````\n"), "{:?}", nested);
        assert!(nested.contains("\n```\ninner\n```\n"));
    }

    #[test]
    fn test_keep_code_style_leaves_tilde_documents() {
        let f = formatter(WrapMode::Keyword(WrapKeyword::No), EndOfLine::Crlf, CodeStyle::Keep);
        assert_eq!(
            f.format_text("~~~rust\nlet x = 1;\n~~~\n"),
            "~~~rust\r\nlet x = 1;\r\n~~~\r\n"
        );
    }

    #[test]
    fn test_format_directory_recurses_and_reports_changes() {
        let temp_dir = TempDir::new().unwrap();
        let nested = temp_dir.path().join("sub");
        fs::create_dir_all(&nested).unwrap();
        fs::write(temp_dir.path().join("a.md"), "~~~\ncode\n~~~\n").unwrap();
        fs::write(nested.join("b.md"), "```\nalready\n```\n").unwrap();
        fs::write(nested.join("notes.txt"), "~~~\nignored\n~~~\n").unwrap();

        let f = formatter(WrapMode::Keyword(WrapKeyword::Keep), EndOfLine::Lf, CodeStyle::Consistent);
        let changed = f.format_directory(temp_dir.path()).unwrap();

        assert_eq!(changed, vec![temp_dir.path().join("a.md")]);
        assert_eq!(fs::read_to_string(temp_dir.path().join("a.md")).unwrap(), "```\ncode\n```\n");
        assert_eq!(
            fs::read_to_string(nested.join("notes.txt")).unwrap(),
            "~~~\nignored\n~~~\n"
        );
    }
}
