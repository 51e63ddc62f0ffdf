//! Automatic links and smileys for typed and inserted plain text.

use crate::document::{Document, NodeId, Role, attr};
use crate::error::Result;

use super::claim::ClaimFlags;
use super::history::RecordKind;
use super::{Caret, Claim, EditorSession};

const LINK_PREFIXES: [&str; 5] = ["http://", "https://", "ftp://", "mailto:", "www."];
const TRAILING_PUNCTUATION: &[char] =
    &['.', ',', ';', ':', '!', '?', ')', ']', '}', '\'', '"', '>'];

const SMILEYS: [(&str, &str); 6] = [
    (":-)", "\u{1f642}"),
    (":-(", "\u{1f641}"),
    (";-)", "\u{1f609}"),
    (":-D", "\u{1f603}"),
    (":-P", "\u{1f61b}"),
    (":-O", "\u{1f62e}"),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TextPart {
    pub text: String,
    pub href: Option<String>,
}

fn link_target(word: &str) -> Option<(usize, String)> {
    let lower = word.to_ascii_lowercase();
    let prefix = LINK_PREFIXES.iter().find(|prefix| lower.starts_with(*prefix))?;
    let link = word.trim_end_matches(TRAILING_PUNCTUATION);
    if link.len() <= prefix.len() {
        return None;
    }
    let href = if *prefix == "www." {
        format!("http://{link}")
    } else {
        link.to_string()
    };
    Some((link.len(), href))
}

/// Cuts `text` into plain and link parts. `None` when it holds no link.
pub(crate) fn split_text_with_links(text: &str) -> Option<Vec<TextPart>> {
    let mut parts = Vec::new();
    let mut plain_start = 0;
    let mut found = false;

    let mut word_start: Option<usize> = None;
    let boundaries = text
        .char_indices()
        .map(|(index, ch)| (index, ch.is_whitespace()))
        .chain(std::iter::once((text.len(), true)));
    for (index, whitespace) in boundaries {
        match (word_start, whitespace) {
            (None, false) => word_start = Some(index),
            (Some(start), true) => {
                word_start = None;
                let Some((length, href)) = link_target(&text[start..index]) else {
                    continue;
                };
                if plain_start < start {
                    parts.push(TextPart {
                        text: text[plain_start..start].to_string(),
                        href: None,
                    });
                }
                parts.push(TextPart {
                    text: text[start..start + length].to_string(),
                    href: Some(href),
                });
                plain_start = start + length;
                found = true;
            }
            _ => {}
        }
    }

    if !found {
        return None;
    }
    if plain_start < text.len() {
        parts.push(TextPart {
            text: text[plain_start..].to_string(),
            href: None,
        });
    }
    Some(parts)
}

/// Replaces ASCII smileys with their Unicode characters. `None` when
/// nothing matched.
pub(crate) fn replace_smileys(text: &str) -> Option<String> {
    let mut replaced = text.to_string();
    for (ascii, unicode) in SMILEYS {
        replaced = replaced.replace(ascii, unicode);
    }
    (replaced != text).then_some(replaced)
}

fn inside_anchor(document: &Document, node: NodeId) -> bool {
    document
        .ancestors(node)
        .any(|ancestor| document.has_role(ancestor, Role::Anchor))
}

/// Replaces the text node `node` by its plain and link parts. Returns the
/// new nodes, or `None` when nothing was linked.
pub(crate) fn linkify_text(
    document: &mut Document,
    node: NodeId,
) -> Result<Option<Vec<(NodeId, usize)>>> {
    if inside_anchor(document, node) {
        return Ok(None);
    }
    let Some(parts) = document.text(node).and_then(split_text_with_links) else {
        return Ok(None);
    };
    let Some(parent) = document.parent(node) else {
        return Ok(None);
    };

    let mut created = Vec::new();
    for part in parts {
        let length = part.text.chars().count();
        let text = document.create_text(part.text);
        let placed = match part.href {
            Some(href) => {
                let anchor = document.create_element(Role::Anchor);
                document.set_attribute(anchor, attr::HREF, href)?;
                document.append_child(anchor, text)?;
                anchor
            }
            None => text,
        };
        document.insert_before(parent, placed, Some(node))?;
        created.push((text, length));
    }
    document.detach(node);
    Ok(Some(created))
}

/// Applies [`replace_smileys`] to every text node below `node`.
pub(crate) fn replace_smileys_below(document: &mut Document, node: NodeId) -> Result<bool> {
    let mut any = false;
    for descendant in document.descendants(node) {
        if let Some(replaced) = document.text(descendant).and_then(replace_smileys) {
            document.set_text(descendant, replaced)?;
            any = true;
        }
    }
    Ok(any)
}

impl EditorSession {
    /// Links the URLs of one text node, keeping carets on the same
    /// character.
    pub(crate) fn linkify_text_node(&mut self, node: NodeId) -> Result<bool> {
        let Some(created) = linkify_text(&mut self.document, node)? else {
            return Ok(false);
        };
        for caret in [&mut self.anchor, &mut self.focus] {
            if caret.node != node {
                continue;
            }
            let mut offset = caret.offset;
            for (index, (text, length)) in created.iter().enumerate() {
                if offset <= *length || index + 1 == created.len() {
                    *caret = Caret {
                        node: *text,
                        offset: offset.min(*length),
                    };
                    break;
                }
                offset -= length;
            }
        }
        Ok(true)
    }

    /// Links the URLs of every text node below `node`.
    pub(crate) fn linkify_subtree(&mut self, node: NodeId) -> Result<bool> {
        let mut any = false;
        for descendant in self.document.descendants(node) {
            if self.document.is_text(descendant) {
                any |= self.linkify_text_node(descendant)?;
            }
        }
        Ok(any)
    }

    /// Runs after a word delimiter was typed: links the word before the
    /// caret and replaces smileys, each merged into the typing step.
    pub(crate) fn apply_magic_after_delimiter(&mut self) -> Result<()> {
        let caret = self.anchor.node;
        if !self.document.is_text(caret) {
            return Ok(());
        }
        let Some(parent) = self.document.parent(caret) else {
            return Ok(());
        };

        let linkable = self.config.magic_links
            && self
                .document
                .text(caret)
                .and_then(split_text_with_links)
                .is_some()
            && !inside_anchor(&self.document, caret);
        if linkable {
            let claim = Claim::nodes(parent, parent, ClaimFlags::SAVE_MARKUP);
            self.record(RecordKind::Custom, "magicLink", Some(claim), |session| {
                session.linkify_text_node(caret)
            })?;
            self.group_top_records(2, None);
        }

        if self.config.magic_smileys && self.config.unicode_smileys {
            let caret = self.anchor;
            let Some(text) = self.document.text(caret.node).map(str::to_string) else {
                return Ok(());
            };
            let Some(replaced) = replace_smileys(&text) else {
                return Ok(());
            };
            let head: String = text.chars().take(caret.offset).collect();
            let offset = replace_smileys(&head)
                .unwrap_or(head)
                .chars()
                .count();
            let Some(parent) = self.document.parent(caret.node) else {
                return Ok(());
            };
            let claim = Claim::nodes(parent, parent, ClaimFlags::SAVE_MARKUP);
            self.record(RecordKind::Custom, "magicSmiley", Some(claim), |session| {
                session.document.set_text(caret.node, replaced)?;
                session.set_caret(caret.node, offset);
                Ok(())
            })?;
            self.group_top_records(2, None);
        }
        Ok(())
    }
}
