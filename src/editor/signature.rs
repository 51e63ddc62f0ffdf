use crate::document::{NodeId, Role, attr, class};
use crate::error::Result;

use super::claim::ClaimFlags;
use super::history::RecordKind;
use super::plain_text::to_plain_text;
use super::{Claim, EditorSession, Mode};

/// The usenet signature separator, a line holding `"-- "`.
const SIGNATURE_DELIMITER: &str = "-- ";

fn has_delimiter(content: &str, is_html: bool) -> bool {
    if is_html {
        let lower = content.to_ascii_lowercase();
        lower.starts_with("-- <br") || lower.contains("\n-- <br")
    } else {
        content.starts_with("-- \n") || content.contains("\n-- \n")
    }
}

impl EditorSession {
    /// Replaces the signature with `content`, or removes it when `content`
    /// is empty. A top signature goes in front of everything, followed by
    /// an empty spacer paragraph; otherwise it is appended to the body.
    /// Undoes as one step.
    pub fn insert_signature(
        &mut self,
        content: &str,
        is_html: bool,
        top_signature: bool,
        add_delimiter: bool,
    ) -> Result<()> {
        self.record(RecordKind::Group, "InsertSignature", None, |session| {
            session.remove_signatures()?;

            let wrapper = if content.is_empty() {
                None
            } else {
                Some(session.signature_wrapper(content, is_html, add_delimiter)?)
            };
            let body = session.document.body();
            let claim = Claim::nodes(body, body, ClaimFlags::SAVE_MARKUP);
            session.record(
                RecordKind::Custom,
                "InsertSignature::new-changes",
                Some(claim),
                |session| {
                    if let Some(wrapper) = wrapper {
                        session.place_signature(wrapper, top_signature)?;
                    }
                    if session.document.child_count(body) == 0 {
                        let paragraph = session.empty_paragraph()?;
                        session.document.append_child(body, paragraph)?;
                        session.set_caret(paragraph, 0);
                    }
                    Ok(())
                },
            )
        })
    }

    /// Takes out every signature wrapper and every spacer left empty, one
    /// record each.
    fn remove_signatures(&mut self) -> Result<()> {
        let body = self.document.body();
        let mut doomed: Vec<NodeId> = self
            .document
            .descendants(body)
            .into_iter()
            .filter(|node| self.document.has_class(*node, class::SIGNATURE_WRAPPER))
            .collect();
        doomed.extend(self.document.children(body).iter().copied().filter(|node| {
            self.document.has_class(*node, class::TOP_SIGNATURE_SPACER)
                && self.document.is_empty_paragraph(*node)
        }));

        for node in doomed.into_iter().rev() {
            if !self.document.is_attached(node) {
                continue;
            }
            let claim = Claim::nodes(node, node, ClaimFlags::SAVE_MARKUP);
            self.record(
                RecordKind::Custom,
                "InsertSignature::old-changes",
                Some(claim),
                |session| {
                    session.document.detach(node);
                    Ok(())
                },
            )?;
        }
        Ok(())
    }

    /// Builds the detached wrapper paragraph. Markup turns into plain lines
    /// while editing plain text.
    fn signature_wrapper(
        &mut self,
        content: &str,
        is_html: bool,
        add_delimiter: bool,
    ) -> Result<NodeId> {
        let wrapper = self.document.create_element(Role::Paragraph);
        self.document.set_attribute(wrapper, attr::CLASS, class::SIGNATURE_WRAPPER)?;

        let mut content = content.to_string();
        let mut is_html = is_html;
        if is_html && self.mode == Mode::PlainText {
            self.document.set_inner_markup(wrapper, &content)?;
            content = to_plain_text(&self.document, wrapper, Some(self.config.paragraph_width));
            for child in self.document.children(wrapper).to_vec() {
                self.document.release(child);
            }
            is_html = false;
        }

        if is_html {
            self.document.set_inner_markup(wrapper, &content)?;
        } else {
            self.set_inner_text(wrapper, &content)?;
        }

        if add_delimiter && !has_delimiter(&content, is_html) {
            let line_break = self.document.create_element(Role::LineBreak);
            self.document.prepend_child(wrapper, line_break)?;
            let dashes = self.document.create_text(SIGNATURE_DELIMITER);
            self.document.prepend_child(wrapper, dashes)?;
        }
        self.maybe_update_paragraph_width(wrapper)?;
        Ok(wrapper)
    }

    fn place_signature(&mut self, wrapper: NodeId, top_signature: bool) -> Result<()> {
        let body = self.document.body();
        if top_signature {
            self.document.prepend_child(body, wrapper)?;
            let spacer = self.empty_paragraph()?;
            self.document.set_attribute(spacer, attr::CLASS, class::TOP_SIGNATURE_SPACER)?;
            self.document.insert_after(wrapper, spacer)?;
        } else {
            self.document.append_child(body, wrapper)?;
        }

        if self.config.start_bottom {
            let target = if top_signature {
                self.document.last_child(body)
            } else {
                self.document.previous_sibling(wrapper)
            };
            self.set_caret(target.unwrap_or(wrapper), 0);
        }
        Ok(())
    }
}
