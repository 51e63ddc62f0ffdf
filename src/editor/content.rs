use bitflags::bitflags;

use crate::document::{Document, Role, class};
use crate::error::Result;

use super::reflow::remove_quote_marks;
use super::plain_text::to_plain_text;
use super::{DRAFT_MODE_ATTR, DRAFT_SELECTION_ATTR, EditorSession};

bitflags! {
    /// Which renditions [`EditorSession::get_content`] produces.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ContentFlags: u32 {
        /// Body markup as edited.
        const RAW_BODY_HTML = 1 << 0;
        /// Body as plain text, unwrapped.
        const RAW_BODY_PLAIN = 1 << 1;
        /// Plain text without quotes and signature.
        const RAW_BODY_STRIPPED = 1 << 2;
        /// Body markup carrying the mode and selection, for saving drafts.
        const RAW_DRAFT = 1 << 3;
        const TO_SEND_HTML = 1 << 4;
        const TO_SEND_PLAIN = 1 << 5;
    }
}

/// One rendition per requested flag; the others stay `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentOutputs {
    pub raw_body_html: Option<String>,
    pub raw_body_plain: Option<String>,
    pub raw_body_stripped: Option<String>,
    pub raw_draft: Option<String>,
    pub to_send_html: Option<String>,
    pub to_send_plain: Option<String>,
}

/// A copy of `document` without quotation prefixes and soft-wrap breaks.
fn unquoted(document: &Document) -> Result<Document> {
    let mut copy = document.clone();
    let body = copy.body();
    remove_quote_marks(&mut copy, body)?;
    Ok(copy)
}

impl EditorSession {
    /// Renders the document for every flag in `flags`. Works on copies, so
    /// neither the document nor the history changes.
    pub fn get_content(&self, flags: ContentFlags) -> Result<ContentOutputs> {
        let mut outputs = ContentOutputs::default();
        let body = self.document.body();

        if flags.contains(ContentFlags::RAW_BODY_HTML) {
            outputs.raw_body_html = Some(self.document.inner_markup(body));
        }
        if flags.contains(ContentFlags::RAW_BODY_PLAIN) {
            outputs.raw_body_plain = Some(to_plain_text(&self.document, body, None));
        }
        if flags.contains(ContentFlags::RAW_BODY_STRIPPED) {
            let mut copy = unquoted(&self.document)?;
            let body = copy.body();
            for node in copy.descendants(body) {
                let signature = copy.has_class(node, class::SIGNATURE_WRAPPER);
                if signature || copy.has_role(node, Role::QuoteBlock) {
                    copy.detach(node);
                }
            }
            outputs.raw_body_stripped = Some(to_plain_text(&copy, body, None));
        }
        if flags.contains(ContentFlags::RAW_DRAFT) {
            let mut copy = self.document.clone();
            let body = copy.body();
            let selection = self.stored_selection.clone().unwrap_or_else(|| self.selection());
            copy.set_attribute(body, DRAFT_MODE_ATTR, self.mode.as_str())?;
            copy.set_attribute(body, DRAFT_SELECTION_ATTR, selection.to_string())?;
            outputs.raw_draft = Some(copy.to_markup(body));
        }
        if flags.contains(ContentFlags::TO_SEND_HTML) {
            let copy = unquoted(&self.document)?;
            outputs.to_send_html = Some(copy.inner_markup(copy.body()));
        }
        if flags.contains(ContentFlags::TO_SEND_PLAIN) {
            let copy = unquoted(&self.document)?;
            let width = self.config.paragraph_width;
            outputs.to_send_plain = Some(to_plain_text(&copy, copy.body(), Some(width)));
        }

        tracing::trace!(?flags, "content rendered");
        Ok(outputs)
    }
}
