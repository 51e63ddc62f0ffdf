use crate::error::{EditorError, Result};

/// Indentation step, in character cells, applied by indent and outdent.
pub const TEXT_INDENT_SIZE: i64 = 3;
/// Narrowest width reflow will wrap a paragraph to.
pub const MIN_PARAGRAPH_WIDTH: usize = 5;
/// Narrowest marker column reserved for ordered list numbering.
pub const MIN_OL_WIDTH: usize = 6;
pub const DEFAULT_PARAGRAPH_WIDTH: usize = 71;

/// Options steering reflow, quoting and content insertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposerConfig {
    pub paragraph_width: usize,
    pub wrap_quoted_text_in_replies: bool,
    pub magic_links: bool,
    pub magic_smileys: bool,
    pub unicode_smileys: bool,
    pub start_bottom: bool,
    pub top_signature: bool,
    /// Upper bound on committed undo steps; `0` keeps everything.
    pub max_undo_levels: usize,
}

impl Default for ComposerConfig {
    fn default() -> Self {
        Self {
            paragraph_width: DEFAULT_PARAGRAPH_WIDTH,
            wrap_quoted_text_in_replies: true,
            magic_links: true,
            magic_smileys: false,
            unicode_smileys: false,
            start_bottom: false,
            top_signature: false,
            max_undo_levels: 0,
        }
    }
}

impl ComposerConfig {
    pub fn with_paragraph_width(mut self, width: usize) -> Result<Self> {
        validate_width(width)?;
        self.paragraph_width = width;
        Ok(self)
    }

    pub fn with_wrap_quoted_text_in_replies(mut self, enabled: bool) -> Self {
        self.wrap_quoted_text_in_replies = enabled;
        self
    }

    pub fn with_magic_links(mut self, enabled: bool) -> Self {
        self.magic_links = enabled;
        self
    }

    pub fn with_magic_smileys(mut self, enabled: bool) -> Self {
        self.magic_smileys = enabled;
        self
    }

    pub fn with_unicode_smileys(mut self, enabled: bool) -> Self {
        self.unicode_smileys = enabled;
        self
    }

    pub fn with_start_bottom(mut self, enabled: bool) -> Self {
        self.start_bottom = enabled;
        self
    }

    pub fn with_top_signature(mut self, enabled: bool) -> Self {
        self.top_signature = enabled;
        self
    }

    pub fn with_max_undo_levels(mut self, levels: usize) -> Self {
        self.max_undo_levels = levels;
        self
    }
}

pub(crate) fn validate_width(width: usize) -> Result<()> {
    if width == 0 {
        return Err(EditorError::invalid("paragraph width must be positive"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_composer_conventions() {
        let config = ComposerConfig::default();
        assert_eq!(config.paragraph_width, 71);
        assert!(config.wrap_quoted_text_in_replies);
        assert!(config.magic_links);
        assert!(!config.magic_smileys);
    }

    #[test]
    fn zero_width_is_rejected() {
        assert!(matches!(
            ComposerConfig::default().with_paragraph_width(0),
            Err(EditorError::InvalidArgument(_))
        ));
    }
}
