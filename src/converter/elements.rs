//! Element-by-element HTML to Markdown conversion.
//!
//! Each tag maps to a [`ConversionRule`]. Children are converted first and the
//! rule receives the element together with its converted child text. Rules are
//! plain function pointers with no shared state, so the same tree always yields
//! the same Markdown. A rule that rejects its element falls back to pass-through
//! and the failure is reported alongside the output instead of aborting.

use crate::converter::config::TableStyle;
use crate::converter::dom::{Element, Node};
use crate::converter::errors::ElementError;
use crate::converter::tables;
use log::trace;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static MARKDOWN_SPECIAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\\*_`\[\]]").unwrap());
static BACKTICK_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"`+").unwrap());

/// Signature shared by all conversion rules
pub type RuleFn =
    fn(&mut ConversionPass<'_>, &Element, &str, &RuleContext) -> Result<String, ElementError>;

/// How an element's children are converted before its rule runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildMode {
    /// Same context as the element itself
    Inherit,
    /// Children are block content
    Block,
    /// Children are inline content
    Inline,
    /// Children are not pre-converted; the rule reads the subtree itself
    Raw,
}

#[derive(Clone, Copy)]
pub struct ConversionRule {
    pub convert: RuleFn,
    pub children: ChildMode,
}

impl ConversionRule {
    pub const fn new(convert: RuleFn, children: ChildMode) -> Self {
        Self { convert, children }
    }
}

/// Context a rule is invoked in
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RuleContext {
    /// Inside inline content (paragraph, heading, link, table cell)
    pub inline: bool,
    /// Position of a list item inside an ordered list
    pub ordinal: Option<usize>,
}

impl RuleContext {
    pub const BLOCK: RuleContext = RuleContext {
        inline: false,
        ordinal: None,
    };
    pub const INLINE: RuleContext = RuleContext {
        inline: true,
        ordinal: None,
    };
}

/// Output of converting one subtree
#[derive(Debug, Clone, PartialEq)]
pub struct Conversion {
    pub markdown: String,
    /// Elements whose rule failed and were passed through instead
    pub fallbacks: Vec<ElementError>,
}

/// Tag-indexed rule table
#[derive(Clone)]
pub struct MarkdownConverter {
    rules: HashMap<String, ConversionRule>,
    default_rule: ConversionRule,
    table_style: TableStyle,
}

const BLOCK_CONTAINERS: [&str; 18] = [
    "div", "section", "article", "main", "header", "footer", "aside", "nav", "figure",
    "figcaption", "details", "summary", "dl", "dt", "dd", "address", "form", "fieldset",
];

const DROPPED: [&str; 7] = ["script", "style", "noscript", "template", "head", "title", "iframe"];

/// Containers whose whitespace-only text children carry no content
const STRUCTURAL: [&str; 7] = ["ul", "ol", "table", "thead", "tbody", "tfoot", "tr"];

impl MarkdownConverter {
    pub fn new() -> Self {
        let mut rules = HashMap::new();
        let mut add = |tag: &str, convert: RuleFn, children: ChildMode| {
            rules.insert(tag.to_string(), ConversionRule::new(convert, children));
        };

        for level in 1..=6 {
            add(&format!("h{}", level), convert_heading, ChildMode::Inline);
        }
        add("p", convert_paragraph, ChildMode::Inline);
        add("br", convert_line_break, ChildMode::Inline);
        add("hr", convert_rule_line, ChildMode::Raw);
        add("a", convert_link, ChildMode::Inline);
        add("img", convert_image, ChildMode::Raw);
        add("em", convert_emphasis, ChildMode::Inline);
        add("i", convert_emphasis, ChildMode::Inline);
        add("strong", convert_strong, ChildMode::Inline);
        add("b", convert_strong, ChildMode::Inline);
        add("code", convert_inline_code, ChildMode::Raw);
        add("pre", convert_code_block, ChildMode::Raw);
        add("ul", convert_list, ChildMode::Block);
        add("ol", convert_list, ChildMode::Block);
        add("li", convert_list_item, ChildMode::Block);
        add("blockquote", convert_blockquote, ChildMode::Block);
        add("table", tables::convert_table, ChildMode::Raw);
        for tag in BLOCK_CONTAINERS {
            add(tag, convert_block, ChildMode::Block);
        }
        for tag in DROPPED {
            add(tag, convert_dropped, ChildMode::Raw);
        }

        Self {
            rules,
            default_rule: ConversionRule::new(convert_passthrough, ChildMode::Inherit),
            table_style: TableStyle::default(),
        }
    }

    pub fn with_table_style(mut self, style: TableStyle) -> Self {
        self.table_style = style;
        self
    }

    /// Register or replace the rule for a tag
    pub fn with_rule(mut self, tag: &str, rule: ConversionRule) -> Self {
        self.rules.insert(tag.to_ascii_lowercase(), rule);
        self
    }

    pub fn table_style(&self) -> TableStyle {
        self.table_style
    }

    /// Rule for a tag, case-insensitive, falling back to pass-through
    pub fn rule_for(&self, tag: &str) -> ConversionRule {
        self.rules
            .get(tag)
            .or_else(|| self.rules.get(&tag.to_ascii_lowercase()))
            .copied()
            .unwrap_or(self.default_rule)
    }

    /// Convert an element subtree in block context
    pub fn convert(&self, element: &Element) -> Conversion {
        let mut pass = ConversionPass::new(self);
        let markdown = pass.convert_element(element, &RuleContext::BLOCK);
        Conversion {
            markdown,
            fallbacks: pass.fallbacks,
        }
    }
}

impl Default for MarkdownConverter {
    fn default() -> Self {
        Self::new()
    }
}

/// State of one conversion walk: the rule table and the fallbacks seen so far
pub struct ConversionPass<'c> {
    converter: &'c MarkdownConverter,
    fallbacks: Vec<ElementError>,
}

impl<'c> ConversionPass<'c> {
    fn new(converter: &'c MarkdownConverter) -> Self {
        Self {
            converter,
            fallbacks: Vec::new(),
        }
    }

    pub fn converter(&self) -> &'c MarkdownConverter {
        self.converter
    }

    pub fn convert_node(&mut self, node: &Node, ctx: &RuleContext) -> String {
        match node {
            Node::Text(text) => escape_markdown(&WHITESPACE.replace_all(text, " ")),
            Node::Element(element) => self.convert_element(element, ctx),
        }
    }

    pub fn convert_element(&mut self, element: &Element, ctx: &RuleContext) -> String {
        let rule = self.converter.rule_for(&element.tag);
        let child_ctx = match rule.children {
            ChildMode::Inherit | ChildMode::Raw => RuleContext {
                ordinal: None,
                ..*ctx
            },
            ChildMode::Block => RuleContext::BLOCK,
            ChildMode::Inline => RuleContext::INLINE,
        };
        let child_text = if rule.children == ChildMode::Raw {
            String::new()
        } else {
            self.convert_children(element, &child_ctx)
        };

        match (rule.convert)(self, element, &child_text, ctx) {
            Ok(markdown) => markdown,
            Err(error) => {
                trace!("Rule for <{}> failed, passing children through: {}", element.tag, error);
                self.fallbacks.push(error);
                if rule.children == ChildMode::Raw {
                    self.convert_children(element, &child_ctx)
                } else {
                    child_text
                }
            }
        }
    }

    /// Convert all children of `element` in order and concatenate the results
    pub fn convert_children(&mut self, element: &Element, ctx: &RuleContext) -> String {
        let structural = STRUCTURAL.iter().any(|tag| element.is(tag));
        let mut ordinal = element.is("ol").then(|| list_start(element));
        let mut out = String::new();

        for child in &element.children {
            if structural && child.is_blank_text() {
                continue;
            }
            let mut child_ctx = *ctx;
            if let (Some(n), Node::Element(child_element)) = (ordinal.as_mut(), child) {
                if child_element.is("li") {
                    child_ctx.ordinal = Some(*n);
                    *n += 1;
                }
            }
            out.push_str(&self.convert_node(child, &child_ctx));
        }
        out
    }
}

fn list_start(element: &Element) -> usize {
    element
        .attr("start")
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(1)
}

/// Collapse all whitespace runs to single spaces and trim
pub fn collapse_whitespace(text: &str) -> String {
    WHITESPACE.replace_all(text, " ").trim().to_string()
}

/// Backslash-escape characters that would otherwise read as Markdown syntax
pub fn escape_markdown(text: &str) -> String {
    MARKDOWN_SPECIAL.replace_all(text, "\\$0").into_owned()
}

/// Code fence that cannot be closed by anything inside `code`
fn fence_for(code: &str) -> String {
    let longest = BACKTICK_RUN
        .find_iter(code)
        .map(|run| run.len())
        .max()
        .unwrap_or(0);
    "`".repeat((longest + 1).max(3))
}

/// Wrap inline text in a marker, keeping the surrounding whitespace outside it
fn wrap_inline(text: &str, marker: &str) -> String {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    let leading = if text.starts_with(char::is_whitespace) { " " } else { "" };
    let trailing = if text.ends_with(char::is_whitespace) { " " } else { "" };
    format!("{}{}{}{}{}", leading, marker, trimmed, marker, trailing)
}

fn convert_passthrough(
    _: &mut ConversionPass<'_>,
    _: &Element,
    child_text: &str,
    _: &RuleContext,
) -> Result<String, ElementError> {
    Ok(child_text.to_string())
}

fn convert_dropped(
    _: &mut ConversionPass<'_>,
    _: &Element,
    _: &str,
    _: &RuleContext,
) -> Result<String, ElementError> {
    Ok(String::new())
}

fn convert_block(
    _: &mut ConversionPass<'_>,
    _: &Element,
    child_text: &str,
    ctx: &RuleContext,
) -> Result<String, ElementError> {
    if ctx.inline {
        return Ok(child_text.to_string());
    }
    let text = child_text.trim_matches('\n');
    if text.trim().is_empty() {
        return Ok(String::new());
    }
    Ok(format!("\n\n{}\n\n", text))
}

fn convert_heading(
    _: &mut ConversionPass<'_>,
    element: &Element,
    child_text: &str,
    ctx: &RuleContext,
) -> Result<String, ElementError> {
    let text = collapse_whitespace(child_text);
    if text.is_empty() {
        return Ok(String::new());
    }
    if ctx.inline {
        return Ok(text);
    }
    let level = element.tag[1..].parse::<usize>().unwrap_or(1).clamp(1, 6);
    Ok(format!("\n\n{} {}\n\n", "#".repeat(level), text))
}

fn convert_paragraph(
    _: &mut ConversionPass<'_>,
    _: &Element,
    child_text: &str,
    ctx: &RuleContext,
) -> Result<String, ElementError> {
    let text = child_text.trim();
    if text.is_empty() {
        return Ok(String::new());
    }
    if ctx.inline {
        return Ok(format!("{} ", text));
    }
    Ok(format!("\n\n{}\n\n", text))
}

fn convert_line_break(
    _: &mut ConversionPass<'_>,
    _: &Element,
    _: &str,
    _: &RuleContext,
) -> Result<String, ElementError> {
    Ok("  \n".to_string())
}

fn convert_rule_line(
    _: &mut ConversionPass<'_>,
    _: &Element,
    _: &str,
    ctx: &RuleContext,
) -> Result<String, ElementError> {
    if ctx.inline {
        return Ok(" ".to_string());
    }
    Ok("\n\n---\n\n".to_string())
}

fn convert_link(
    _: &mut ConversionPass<'_>,
    element: &Element,
    child_text: &str,
    _: &RuleContext,
) -> Result<String, ElementError> {
    let text = collapse_whitespace(child_text);
    if text.is_empty() {
        return Ok(String::new());
    }
    match element.attr("href").map(str::trim) {
        Some(href) if !href.is_empty() => match element.attr("title") {
            Some(title) if !title.is_empty() => Ok(format!("[{}]({} \"{}\")", text, href, title)),
            _ => Ok(format!("[{}]({})", text, href)),
        },
        _ => Ok(text),
    }
}

fn convert_image(
    _: &mut ConversionPass<'_>,
    element: &Element,
    _: &str,
    _: &RuleContext,
) -> Result<String, ElementError> {
    let alt = element.attr("alt").unwrap_or_default();
    let src = element.attr("src").unwrap_or_default();
    match element.attr("title") {
        Some(title) if !title.is_empty() => Ok(format!("![{}]({} \"{}\")", alt, src, title)),
        _ => Ok(format!("![{}]({})", alt, src)),
    }
}

fn convert_emphasis(
    _: &mut ConversionPass<'_>,
    _: &Element,
    child_text: &str,
    _: &RuleContext,
) -> Result<String, ElementError> {
    Ok(wrap_inline(child_text, "*"))
}

fn convert_strong(
    _: &mut ConversionPass<'_>,
    _: &Element,
    child_text: &str,
    _: &RuleContext,
) -> Result<String, ElementError> {
    Ok(wrap_inline(child_text, "**"))
}

fn convert_inline_code(
    _: &mut ConversionPass<'_>,
    element: &Element,
    _: &str,
    _: &RuleContext,
) -> Result<String, ElementError> {
    let code = collapse_whitespace(&element.text_content());
    if code.is_empty() {
        return Ok(String::new());
    }
    if code.contains('`') {
        Ok(format!("`` {} ``", code))
    } else {
        Ok(format!("`{}`", code))
    }
}

/// Language hint from a `language-*` or `lang-*` class
fn class_language(element: &Element) -> Option<String> {
    element.classes().find_map(|class| {
        class
            .strip_prefix("language-")
            .or_else(|| class.strip_prefix("lang-"))
            .filter(|lang| !lang.is_empty())
            .map(str::to_string)
    })
}

/// Best-effort guess from the code itself
fn sniff_language(code: &str) -> Option<&'static str> {
    if code.split_whitespace().any(|token| token == "curl") {
        Some("curl")
    } else if code.contains('{') || code.contains('}') || code.contains("JSON") {
        Some("json")
    } else {
        None
    }
}

/// Language for a `pre` block: the inner `code` element's class first, then the
/// `pre` element's own class, then content sniffing
pub fn detect_language(pre: &Element, code: &str) -> String {
    pre.find_descendant("code")
        .and_then(class_language)
        .or_else(|| class_language(pre))
        .or_else(|| sniff_language(code).map(str::to_string))
        .unwrap_or_default()
}

fn convert_code_block(
    _: &mut ConversionPass<'_>,
    element: &Element,
    _: &str,
    ctx: &RuleContext,
) -> Result<String, ElementError> {
    let raw = element.text_content();
    let code = raw.trim().trim_matches('`');
    if ctx.inline {
        let flattened = collapse_whitespace(code);
        return Ok(if flattened.is_empty() {
            String::new()
        } else {
            format!("`{}`", flattened)
        });
    }
    let language = detect_language(element, code);
    let fence = fence_for(code);
    Ok(format!("\n\n{}{}\n{}\n{}\n\n", fence, language, code, fence))
}

fn convert_list(
    _: &mut ConversionPass<'_>,
    _: &Element,
    child_text: &str,
    _: &RuleContext,
) -> Result<String, ElementError> {
    let items = child_text.trim_end();
    if items.trim().is_empty() {
        return Ok(String::new());
    }
    Ok(format!("\n\n{}\n\n", items))
}

fn convert_list_item(
    _: &mut ConversionPass<'_>,
    _: &Element,
    child_text: &str,
    ctx: &RuleContext,
) -> Result<String, ElementError> {
    let content = child_text.trim();
    if content.is_empty() {
        return Ok(String::new());
    }
    let prefix = match ctx.ordinal {
        Some(n) => format!("{}. ", n),
        None => "- ".to_string(),
    };
    let indent = " ".repeat(prefix.len());

    let mut out = String::new();
    for (i, line) in content.lines().enumerate() {
        if i == 0 {
            out.push_str(&prefix);
            out.push_str(line.trim_start());
        } else if !line.trim().is_empty() {
            out.push_str(&indent);
            out.push_str(line);
        }
        out.push('\n');
    }
    Ok(out)
}

fn convert_blockquote(
    _: &mut ConversionPass<'_>,
    _: &Element,
    child_text: &str,
    _: &RuleContext,
) -> Result<String, ElementError> {
    let content = child_text.trim();
    if content.is_empty() {
        return Ok(String::new());
    }
    let quoted: Vec<String> = content
        .lines()
        .map(|line| {
            let line = line.trim();
            if line.is_empty() {
                ">".to_string()
            } else {
                format!("> {}", line)
            }
        })
        .collect();
    Ok(format!("\n\n{}\n\n", quoted.join("\n")))
}
