//! Plain-text rendering of document subtrees, as used for `text/plain`
//! output and for rebuilding quotes from their `>` prefixes.

use unicode_width::UnicodeWidthStr;

use crate::document::{Document, NodeId, Role, attr, class};

const UL_MARKER: &str = " * ";
const UL_CONTINUATION: &str = "   ";
const RULE: &str = "---";

/// Accumulates finished lines plus the line currently being filled.
struct LineBuilder {
    width: Option<usize>,
    lines: Vec<String>,
    line: String,
    open: bool,
}

impl LineBuilder {
    fn new(width: Option<usize>) -> Self {
        Self {
            width: width.map(|width| width.max(1)),
            lines: Vec::new(),
            line: String::new(),
            open: false,
        }
    }

    fn nested(&self, indent: usize) -> Self {
        Self::new(self.width.map(|width| width.saturating_sub(indent)))
    }

    fn push_text(&mut self, text: &str, preformatted: bool) {
        for ch in text.chars() {
            if preformatted {
                if ch == '\n' {
                    self.break_line();
                    continue;
                }
                self.line.push(ch);
                self.open = true;
                continue;
            }

            let ch = match ch {
                '\n' | '\r' | '\u{a0}' => ' ',
                other => other,
            };
            self.line.push(ch);
            self.open = true;
            if let Some(width) = self.width {
                if self.line.width() > width {
                    self.wrap(width);
                }
            }
        }
    }

    /// Moves everything up to the last fitting space onto its own line.
    fn wrap(&mut self, width: usize) {
        let split = self
            .line
            .char_indices()
            .filter(|(index, ch)| *ch == ' ' && self.line[..*index].width() <= width)
            .map(|(index, _)| index)
            .last();
        let Some(split) = split.filter(|split| *split > 0) else {
            return;
        };
        let tail = self.line[split + 1..].to_string();
        let head = std::mem::replace(&mut self.line, tail);
        self.lines.push(head);
    }

    fn break_line(&mut self) {
        self.lines.push(std::mem::take(&mut self.line));
        self.open = false;
    }

    fn end_block(&mut self) {
        if self.open || !self.line.is_empty() {
            self.break_line();
        }
    }

    fn push_lines(&mut self, lines: Vec<String>, first_prefix: &str, prefix: &str) {
        self.end_block();
        for (index, line) in lines.into_iter().enumerate() {
            let lead = if index == 0 { first_prefix } else { prefix };
            self.lines.push(format!("{lead}{line}"));
        }
    }

    fn finish(mut self) -> Vec<String> {
        self.end_block();
        self.lines
    }
}

/// Renders the children of `node` as text, wrapped to `width` columns
/// when given. Every line, the last one included, ends in `\n`.
pub fn to_plain_text(document: &Document, node: NodeId, width: Option<usize>) -> String {
    let mut builder = LineBuilder::new(width);
    let preformatted = document.has_role(node, Role::Preformatted);
    render_children(document, node, &mut builder, preformatted);

    let mut text = String::new();
    for line in builder.finish() {
        text.push_str(&line);
        text.push('\n');
    }
    text
}

fn render_children(
    document: &Document,
    node: NodeId,
    builder: &mut LineBuilder,
    preformatted: bool,
) {
    for child in document.children(node) {
        render_node(document, *child, builder, preformatted);
    }
}

fn render_node(document: &Document, node: NodeId, builder: &mut LineBuilder, preformatted: bool) {
    if let Some(text) = document.text(node) {
        builder.push_text(text, preformatted);
        return;
    }
    let Some(role) = document.role(node) else {
        return;
    };

    match role {
        Role::LineBreak => builder.break_line(),
        Role::Image => {
            if let Some(alt) = document.attribute(node, attr::ALT) {
                builder.push_text(alt, preformatted);
            }
        }
        Role::Inline(_) if document.has_class(node, class::QUOTED) => {}
        Role::Inline(_) | Role::Anchor | Role::Body => {
            render_children(document, node, builder, preformatted);
        }
        Role::QuoteBlock => {
            let mut inner = builder.nested(2);
            render_children(document, node, &mut inner, preformatted);
            let lines = inner
                .finish()
                .into_iter()
                .map(|line| {
                    if line.is_empty() {
                        ">".to_string()
                    } else {
                        format!("> {line}")
                    }
                })
                .collect();
            builder.push_lines(lines, "", "");
        }
        Role::UnorderedList => {
            builder.end_block();
            for item in list_items(document, node) {
                let mut inner = builder.nested(UL_MARKER.len());
                render_children(document, item, &mut inner, preformatted);
                builder.push_lines(inner.finish(), UL_MARKER, UL_CONTINUATION);
            }
        }
        Role::OrderedList => {
            builder.end_block();
            let kind = document.attribute(node, attr::TYPE);
            let items = list_items(document, node);
            let letters = ol_max_letters(kind, items.len());
            let continuation = " ".repeat(letters + 2);
            for (index, item) in items.into_iter().enumerate() {
                let mut inner = builder.nested(letters + 2);
                render_children(document, item, &mut inner, preformatted);
                let marker = format!("{:>letters$}. ", ol_label(kind, index + 1));
                builder.push_lines(inner.finish(), &marker, &continuation);
            }
        }
        Role::Table => {
            builder.end_block();
            for row in document.descendants_with_role(node, Role::TableRow) {
                let cells: Vec<String> = document
                    .children(row)
                    .iter()
                    .filter(|cell| matches!(document.role(**cell), Some(Role::TableCell { .. })))
                    .map(|cell| document.text_content(*cell).replace('\n', " "))
                    .collect();
                builder.push_lines(vec![cells.join("\t")], "", "");
            }
        }
        Role::Rule => builder.push_lines(vec![RULE.to_string()], "", ""),
        Role::Preformatted => {
            builder.end_block();
            render_children(document, node, builder, true);
            builder.end_block();
        }
        _ => {
            builder.end_block();
            render_children(document, node, builder, preformatted);
            builder.end_block();
        }
    }
}

fn list_items(document: &Document, list: NodeId) -> Vec<NodeId> {
    document
        .children(list)
        .iter()
        .copied()
        .filter(|child| !document.is_text(*child))
        .collect()
}

// ============================================================================
// Ordered list labels
// ============================================================================

pub(crate) fn roman_numeral(mut value: usize) -> String {
    const NUMERALS: [(usize, &str); 13] = [
        (1000, "m"),
        (900, "cm"),
        (500, "d"),
        (400, "cd"),
        (100, "c"),
        (90, "xc"),
        (50, "l"),
        (40, "xl"),
        (10, "x"),
        (9, "ix"),
        (5, "v"),
        (4, "iv"),
        (1, "i"),
    ];
    let mut numeral = String::new();
    for (amount, letters) in NUMERALS {
        while value >= amount {
            numeral.push_str(letters);
            value -= amount;
        }
    }
    numeral
}

/// Bijective base-26: `a`..`z`, then `aa`.
fn alpha_label(mut value: usize) -> String {
    let mut letters = Vec::new();
    while value > 0 {
        value -= 1;
        letters.push(char::from(b'a' + (value % 26) as u8));
        value /= 26;
    }
    letters.iter().rev().collect()
}

fn ol_label(kind: Option<&str>, value: usize) -> String {
    match kind {
        Some("i") => roman_numeral(value),
        Some("I") => roman_numeral(value).to_uppercase(),
        Some("a") => alpha_label(value),
        Some("A") => alpha_label(value).to_uppercase(),
        _ => value.to_string(),
    }
}

/// Widest label among the first `count` items of an ordered list.
pub(crate) fn ol_max_letters(kind: Option<&str>, count: usize) -> usize {
    (1..=count.max(1))
        .map(|value| ol_label(kind, value).chars().count())
        .max()
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(markup: &str, width: Option<usize>) -> String {
        let document = Document::from_markup(markup).unwrap();
        to_plain_text(&document, document.body(), width)
    }

    #[test]
    fn paragraphs_end_in_newlines() {
        assert_eq!(render("<div>one</div><div><br></div><div>two</div>", None), "one\n\ntwo\n");
    }

    #[test]
    fn wraps_on_spaces() {
        assert_eq!(render("<div>aaaa bbbb cccc</div>", Some(9)), "aaaa bbbb\ncccc\n");
    }

    #[test]
    fn quotes_get_prefixes() {
        let text = render(
            "<blockquote type=\"cite\"><div>hi</div><div><br></div></blockquote>",
            None,
        );
        assert_eq!(text, "> hi\n>\n");
    }

    #[test]
    fn lists_are_marked() {
        assert_eq!(render("<ul><li>a</li><li>b</li></ul>", None), " * a\n * b\n");
        assert_eq!(
            render("<ol type=\"I\"><li>a</li><li>b</li><li>c</li></ol>", None),
            "  I. a\n II. b\nIII. c\n"
        );
    }

    #[test]
    fn preformatted_keeps_newlines() {
        assert_eq!(render("<pre>a  b\nc</pre>", Some(2)), "a  b\nc\n");
    }

    #[test]
    fn label_widths() {
        assert_eq!(roman_numeral(1994), "mcmxciv");
        assert_eq!(alpha_label(28), "ab");
        assert_eq!(ol_max_letters(None, 12), 2);
        assert_eq!(ol_max_letters(Some("i"), 8), 4);
    }
}
