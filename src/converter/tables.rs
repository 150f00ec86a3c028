//! Table rendering: pipe tables for plain data, bullet blocks for tables whose
//! cells hold lists (pipe tables cannot carry block content).

use crate::converter::config::TableStyle;
use crate::converter::dom::{Element, Node};
use crate::converter::elements::{collapse_whitespace, ConversionPass, RuleContext};
use crate::converter::errors::ElementError;

const LIST_TAGS: [&str; 2] = ["ul", "ol"];

/// One row of cells as they appear in the document
struct Row<'a> {
    cells: Vec<&'a Element>,
}

struct TableShape<'a> {
    header: Row<'a>,
    body: Vec<Row<'a>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Alignment {
    Left,
    Center,
    Right,
}

impl Alignment {
    /// Column alignment chosen from the header's wording
    fn for_header(header: &str) -> Self {
        let lowered = header.to_lowercase();
        if lowered.contains("required") || lowered.contains("optional") {
            Alignment::Center
        } else if lowered.contains("country") || lowered.contains("channel") {
            Alignment::Left
        } else {
            Alignment::Right
        }
    }

    fn marker(self) -> &'static str {
        match self {
            Alignment::Left => ":---",
            Alignment::Center => ":---:",
            Alignment::Right => "---:",
        }
    }
}

pub fn convert_table(
    pass: &mut ConversionPass<'_>,
    table: &Element,
    _: &str,
    ctx: &RuleContext,
) -> Result<String, ElementError> {
    let shape = table_shape(table)?;

    let bullets = match pass.converter().table_style() {
        TableStyle::Bullets => true,
        TableStyle::Pipe => false,
        TableStyle::Auto => shape
            .body
            .iter()
            .chain(std::iter::once(&shape.header))
            .flat_map(|row| row.cells.iter())
            .any(|cell| cell.has_descendant(&LIST_TAGS)),
    };

    let rendered = if bullets {
        render_bullets(pass, &shape)
    } else {
        render_pipe(pass, &shape)
    };

    if ctx.inline {
        Ok(format!(" {} ", collapse_whitespace(&rendered)))
    } else {
        Ok(format!("\n\n{}\n\n", rendered))
    }
}

fn table_shape(table: &Element) -> Result<TableShape<'_>, ElementError> {
    let mut header_rows = Vec::new();
    let mut body_rows = Vec::new();

    for child in table.child_elements() {
        match child.tag.as_str() {
            "thead" => header_rows.extend(child.child_elements().filter(|e| e.is("tr"))),
            "tbody" | "tfoot" => body_rows.extend(child.child_elements().filter(|e| e.is("tr"))),
            "tr" => body_rows.push(child),
            _ => {}
        }
    }

    let mut rows: Vec<Row<'_>> = header_rows
        .into_iter()
        .chain(body_rows)
        .map(|tr| Row {
            cells: tr
                .child_elements()
                .filter(|cell| cell.is("th") || cell.is("td"))
                .collect(),
        })
        .filter(|row| !row.cells.is_empty())
        .collect();

    if rows.is_empty() {
        return Err(ElementError::MalformedElement {
            tag: "table".to_string(),
            reason: "table has no rows with cells".to_string(),
        });
    }
    let header = rows.remove(0);
    Ok(TableShape { header, body: rows })
}

fn cell_text(pass: &mut ConversionPass<'_>, cell: &Element) -> String {
    collapse_whitespace(&pass.convert_children(cell, &RuleContext::INLINE))
}

fn render_pipe(pass: &mut ConversionPass<'_>, shape: &TableShape<'_>) -> String {
    let header: Vec<String> = shape
        .header
        .cells
        .iter()
        .map(|cell| escape_pipes(&cell_text(pass, cell)))
        .collect();
    let body: Vec<Vec<String>> = shape
        .body
        .iter()
        .map(|row| {
            row.cells
                .iter()
                .map(|cell| escape_pipes(&cell_text(pass, cell)))
                .collect()
        })
        .collect();

    let columns = body
        .iter()
        .map(Vec::len)
        .chain(std::iter::once(header.len()))
        .max()
        .unwrap_or(0);

    let mut lines = Vec::with_capacity(body.len() + 2);
    lines.push(pipe_line(&header, columns));
    let separators: Vec<String> = (0..columns)
        .map(|i| {
            let label = header.get(i).map(String::as_str).unwrap_or_default();
            Alignment::for_header(label).marker().to_string()
        })
        .collect();
    lines.push(pipe_line(&separators, columns));
    for row in &body {
        lines.push(pipe_line(row, columns));
    }
    lines.join("\n")
}

fn pipe_line(cells: &[String], columns: usize) -> String {
    let padded: Vec<&str> = (0..columns)
        .map(|i| cells.get(i).map(String::as_str).unwrap_or_default())
        .collect();
    format!("| {} |", padded.join(" | "))
}

fn escape_pipes(text: &str) -> String {
    text.replace('|', "\\|")
}

fn render_bullets(pass: &mut ConversionPass<'_>, shape: &TableShape<'_>) -> String {
    let labels: Vec<String> = shape
        .header
        .cells
        .iter()
        .map(|cell| cell_text(pass, cell))
        .collect();

    let mut blocks = Vec::with_capacity(shape.body.len());
    for row in &shape.body {
        let mut block = String::new();
        for (i, cell) in row.cells.iter().enumerate() {
            let label = labels
                .get(i)
                .filter(|label| !label.is_empty())
                .cloned()
                .unwrap_or_else(|| format!("Column {}", i + 1));
            block.push_str(&render_bullet_cell(pass, &label, cell));
        }
        if !block.is_empty() {
            blocks.push(block.trim_end().to_string());
        }
    }
    blocks.join("\n\n")
}

/// `- **Label**: intro` followed by the cell's list items, flattened one level
fn render_bullet_cell(pass: &mut ConversionPass<'_>, label: &str, cell: &Element) -> String {
    let mut intro = Element::new("span");
    let mut lists = Vec::new();
    split_lists(cell, &mut intro, &mut lists);

    let intro_text = cell_text(pass, &intro);
    let mut out = if intro_text.is_empty() {
        format!("- **{}**:\n", label)
    } else {
        format!("- **{}**: {}\n", label, intro_text)
    };

    let items: Vec<String> = lists
        .iter()
        .flat_map(|list| list.child_elements().filter(|e| e.is("li")))
        .map(|item| cell_text(pass, item))
        .filter(|text| !text.is_empty())
        .collect();
    if !items.is_empty() {
        out.push('\n');
        for item in items {
            out.push_str("  - ");
            out.push_str(&item);
            out.push('\n');
        }
    }
    out
}

/// Separate a cell's outermost lists from the rest of its content
fn split_lists<'a>(element: &'a Element, intro: &mut Element, lists: &mut Vec<&'a Element>) {
    for child in &element.children {
        match child {
            Node::Element(e) if LIST_TAGS.iter().any(|tag| e.is(tag)) => lists.push(e),
            Node::Element(e) if e.has_descendant(&LIST_TAGS) => split_lists(e, intro, lists),
            other => intro.children.push(other.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::converter::config::TableStyle;
    use crate::converter::dom::parse_document;
    use crate::converter::elements::MarkdownConverter;

    fn convert_with(style: TableStyle, html: &str) -> String {
        let body = parse_document(html).into_body();
        MarkdownConverter::new()
            .with_table_style(style)
            .convert(&body)
            .markdown
            .trim()
            .to_string()
    }

    #[test]
    fn test_pipe_table_with_alignment() {
        let html = "<table>\
            <thead><tr><th>Parameter</th><th>Required</th><th>Country</th></tr></thead>\
            <tbody><tr><td><code>id</code></td><td>Yes</td><td>TH</td></tr></tbody>\
            </table>";
        let markdown = convert_with(TableStyle::Auto, html);
        assert_eq!(
            markdown,
            "| Parameter | Required | Country |\n| ---: | :---: | :--- |\n| `id` | Yes | TH |"
        );
    }

    #[test]
    fn test_rows_without_thead_use_first_row_as_header() {
        let html = "<table><tr><th>A</th><th>B</th></tr><tr><td>1</td></tr></table>";
        let markdown = convert_with(TableStyle::Pipe, html);
        assert_eq!(markdown, "| A | B |\n| ---: | ---: |\n| 1 |  |");
    }

    #[test]
    fn test_pipes_in_cells_are_escaped() {
        let html = "<table><tr><th>Expr</th></tr><tr><td>a | b</td></tr></table>";
        assert!(convert_with(TableStyle::Pipe, html).contains("| a \\| b |"));
    }

    #[test]
    fn test_lists_in_cells_switch_to_bullets() {
        let html = "<table>\
            <tr><th>Name</th><th>Values</th></tr>\
            <tr><td>status</td><td>One of:<ul><li>active</li><li>closed</li></ul></td></tr>\
            <tr><td>kind</td><td>Free text</td></tr>\
            </table>";
        let markdown = convert_with(TableStyle::Auto, html);
        assert_eq!(
            markdown,
            "- **Name**: status\n- **Values**: One of:\n\n  - active\n  - closed\n\n\
             - **Name**: kind\n- **Values**: Free text"
        );
    }

    #[test]
    fn test_forced_pipe_flattens_lists() {
        let html = "<table><tr><th>V</th></tr><tr><td><ul><li>a</li><li>b</li></ul></td></tr></table>";
        let markdown = convert_with(TableStyle::Pipe, html);
        assert!(markdown.starts_with("| V |"));
        assert!(markdown.contains("| - a - b |"));
    }

    #[test]
    fn test_forced_bullets_without_lists() {
        let html = "<table><tr><th>Key</th></tr><tr><td>v1</td></tr><tr><td>v2</td></tr></table>";
        assert_eq!(
            convert_with(TableStyle::Bullets, html),
            "- **Key**: v1\n\n- **Key**: v2"
        );
    }

    #[test]
    fn test_empty_table_falls_back_to_passthrough() {
        let body = parse_document("<div><table><caption>Only caption</caption></table></div>")
            .into_body();
        let conversion = MarkdownConverter::new().convert(&body);
        assert_eq!(conversion.markdown.trim(), "Only caption");
        assert_eq!(conversion.fallbacks.len(), 1);
    }
}
