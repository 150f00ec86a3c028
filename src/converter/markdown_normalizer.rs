//! Spacing clean-up for converted Markdown.
//!
//! Every heading and list-item line gets a blank line after it, fenced code
//! blocks are separated from their surroundings by exactly one blank line, and
//! blank-line runs collapse to one. Fence bodies pass through byte for byte.

use once_cell::sync::Lazy;
use regex::Regex;

static HEADING_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s{0,3}#{1,6}(\s|$)").unwrap());
static LIST_ITEM_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*([-*+]|\d+[.)])\s+\S").unwrap());

/// An opening code fence: its indent, marker character and run length
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Fence {
    indent: usize,
    marker: char,
    len: usize,
}

fn indent_of(line: &str) -> usize {
    line.len() - line.trim_start_matches(' ').len()
}

impl Fence {
    pub(crate) fn open(line: &str) -> Option<Self> {
        let trimmed = line.trim_start();
        let marker = trimmed.chars().next().filter(|c| *c == '`' || *c == '~')?;
        let len = trimmed.chars().take_while(|c| *c == marker).count();
        (len >= 3).then_some(Fence {
            indent: indent_of(line),
            marker,
            len,
        })
    }

    pub(crate) fn marker(&self) -> char {
        self.marker
    }

    /// A closer may sit at most three spaces deeper than its opener
    pub(crate) fn closes(&self, line: &str) -> bool {
        if indent_of(line) > self.indent + 3 {
            return false;
        }
        let trimmed = line.trim();
        let run = trimmed.chars().take_while(|c| *c == self.marker).count();
        run >= self.len && run == trimmed.chars().count()
    }
}

#[derive(Default)]
struct Output {
    lines: Vec<String>,
    last_blank: bool,
    needs_blank: bool,
}

impl Output {
    fn push_blank(&mut self) {
        if !self.lines.is_empty() && !self.last_blank {
            self.lines.push(String::new());
            self.last_blank = true;
        }
        self.needs_blank = false;
    }

    fn push_line(&mut self, line: &str, needs_blank_after: bool) {
        if self.needs_blank {
            self.push_blank();
        }
        self.lines.push(line.to_string());
        self.last_blank = false;
        self.needs_blank = needs_blank_after;
    }

    /// Fence body lines go in untouched and never trigger spacing rules
    fn push_verbatim(&mut self, line: &str) {
        self.lines.push(line.to_string());
        self.last_blank = false;
        self.needs_blank = false;
    }
}

/// Normalize Markdown spacing. Idempotent, and never changes a fence body.
pub fn normalize(raw: &str) -> String {
    let mut out = Output::default();
    let mut open_fence: Option<Fence> = None;

    for line in raw.split('\n') {
        if let Some(fence) = open_fence {
            if fence.closes(line) {
                out.push_line(line, true);
                open_fence = None;
            } else {
                out.push_verbatim(line);
            }
            continue;
        }

        if line.trim().is_empty() {
            out.push_blank();
        } else if let Some(fence) = Fence::open(line) {
            out.push_blank();
            out.push_line(line, false);
            open_fence = Some(fence);
        } else {
            let spaced = HEADING_LINE.is_match(line) || LIST_ITEM_LINE.is_match(line);
            out.push_line(line, spaced);
        }
    }

    out.lines.join("\n").trim().to_string()
}
