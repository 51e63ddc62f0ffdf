use super::*;

fn session(markup: &str) -> EditorSession {
    EditorSession::from_markup(markup, ComposerConfig::default()).unwrap()
}

fn path(indices: &[usize]) -> Path {
    Path::new(indices.to_vec())
}

// ============================================================================
// Session setup
// ============================================================================

#[test]
fn new_session_holds_one_empty_paragraph() {
    let session = EditorSession::new(ComposerConfig::default());
    assert_eq!(session.markup(), "<div><br></div>");
    assert_eq!(session.mode(), Mode::Html);
    let first = session.document().first_child(session.document().body()).unwrap();
    assert_eq!(session.anchor(), Caret { node: first, offset: 0 });
    assert!(!session.history().can_undo());
}

#[test]
fn loading_empty_markup_initializes_content() {
    let session = session("");
    assert_eq!(session.markup(), "<div><br></div>");
}

#[test]
fn start_bottom_appends_a_paragraph_for_the_caret() {
    let config = ComposerConfig::default().with_start_bottom(true);
    let session = EditorSession::from_markup("<div>x</div>", config).unwrap();
    assert_eq!(session.markup(), "<div>x</div><div><br></div>");
    assert_eq!(session.selection(), Selection::collapsed(path(&[1]), 0));
}

#[test]
fn loose_quote_content_is_wrapped_into_paragraphs() {
    let session = session("<blockquote style=\"x\" type=\"cite\">loose <b>text</b><div>kept</div></blockquote>");
    assert_eq!(
        session.markup(),
        "<blockquote type=\"cite\"><div>loose <b>text</b></div><div>kept</div></blockquote>"
    );
}

#[test]
fn loading_clears_history() {
    let mut session = session("<div>a</div>");
    session.set_body_attribute(attr::TEXT_COLOR, Some("red")).unwrap();
    assert!(session.history().can_undo());
    session.load_markup("<div>b</div>").unwrap();
    assert!(!session.history().can_undo());
    assert_eq!(session.markup(), "<div>b</div>");
}

// ============================================================================
// Host enumerations and selections
// ============================================================================

#[test]
fn host_values_convert() {
    assert_eq!(Mode::try_from(0).unwrap(), Mode::PlainText);
    assert_eq!("html".parse::<Mode>().unwrap(), Mode::Html);
    assert!(Mode::try_from(7).is_err());
    assert_eq!(Alignment::try_from(-1).unwrap(), Alignment::None);
    assert_eq!(Alignment::try_from(3).unwrap().css_value(), "justify");
    assert_eq!(BlockFormat::try_from(4).unwrap(), BlockFormat::Heading(1));
    assert_eq!(BlockFormat::try_from(13).unwrap(), BlockFormat::OrderedListAlpha);
    assert!(BlockFormat::try_from(14).is_err());
    assert!(BlockFormat::OrderedListRoman.is_list());
}

#[test]
fn selection_text_form_round_trips() {
    let selection: Selection = "/0/1:2;/3:0".parse().unwrap();
    assert_eq!(selection.anchor.path, path(&[0, 1]));
    assert_eq!(selection.focus.offset, 0);
    assert_eq!(selection.to_string(), "/0/1:2;/3:0");
    assert!(!selection.is_collapsed());
    assert!("/0:1".parse::<Selection>().is_err());
    assert!("/0:x;/0:1".parse::<Selection>().is_err());
}

#[test]
fn selection_offsets_are_clamped() {
    let mut session = session("<div>abc</div>");
    session.collapse_to(&path(&[0, 0]), 99).unwrap();
    assert_eq!(session.selection(), Selection::collapsed(path(&[0, 0]), 3));
    assert!(matches!(
        session.collapse_to(&path(&[4]), 0),
        Err(EditorError::NotFound { .. })
    ));
}

#[test]
fn select_node_contents_spans_children() {
    let mut session = session("<div>a<b>b</b>c</div>");
    session.select_node_contents(&path(&[0])).unwrap();
    assert_eq!(session.anchor().offset, 0);
    assert_eq!(session.focus().offset, 3);
    assert!(!session.is_collapsed());
}

#[test]
fn stored_selection_is_restored_once() {
    let mut session = session("<div>abc</div>");
    session.collapse_to(&path(&[0, 0]), 2).unwrap();
    session.store_selection();
    session.collapse_to(&path(&[0, 0]), 0).unwrap();

    session.restore_selection().unwrap();
    assert_eq!(session.selection(), Selection::collapsed(path(&[0, 0]), 2));

    session.collapse_to(&path(&[0, 0]), 1).unwrap();
    session.restore_selection().unwrap();
    assert_eq!(session.selection(), Selection::collapsed(path(&[0, 0]), 1));
}

// ============================================================================
// Undo and redo
// ============================================================================

#[test]
fn list_then_indent_undoes_in_two_steps() {
    let mut session = EditorSession::new(ComposerConfig::default());
    session.set_block_format(BlockFormat::UnorderedList).unwrap();
    assert_eq!(session.markup(), "<ul><li><br></li></ul>");

    session.indent(1).unwrap();
    assert_eq!(session.markup(), "<ul><ul><li><br></li></ul></ul>");
    assert_eq!(session.history().undo_depth(), 2);

    assert!(session.undo().unwrap());
    assert_eq!(session.markup(), "<ul><li><br></li></ul>");
    assert!(session.undo().unwrap());
    assert_eq!(session.markup(), "<div><br></div>");
    assert!(!session.undo().unwrap());

    assert!(session.redo().unwrap());
    assert!(session.redo().unwrap());
    assert_eq!(session.markup(), "<ul><ul><li><br></li></ul></ul>");
    assert!(!session.redo().unwrap());
}

#[test]
fn mode_switch_is_one_undo_step() {
    let mut session = session("<div>hello world</div>");
    session.set_mode(Mode::PlainText).unwrap();
    assert_eq!(session.mode(), Mode::PlainText);
    assert_eq!(session.markup(), "<div width=\"71ch\">hello world</div>");

    session.undo().unwrap();
    assert_eq!(session.mode(), Mode::Html);
    assert_eq!(session.markup(), "<div>hello world</div>");

    session.redo().unwrap();
    assert_eq!(session.mode(), Mode::PlainText);
    assert_eq!(session.markup(), "<div width=\"71ch\">hello world</div>");
}

#[test]
fn switching_to_the_current_mode_records_nothing() {
    let mut session = session("<div>x</div>");
    session.set_mode(Mode::Html).unwrap();
    assert!(!session.history().can_undo());
}

#[test]
fn new_record_clears_redo() {
    let mut session = session("<div>a</div>");
    session.set_body_attribute(attr::TEXT_COLOR, Some("red")).unwrap();
    session.undo().unwrap();
    assert!(session.history().can_redo());
    session.set_body_attribute(attr::LINK_COLOR, Some("blue")).unwrap();
    assert!(!session.history().can_redo());
}

#[test]
fn undo_levels_are_capped() {
    let config = ComposerConfig::default().with_max_undo_levels(2);
    let mut session = EditorSession::from_markup("<div>a</div>", config).unwrap();
    session.set_body_attribute(attr::TEXT_COLOR, Some("red")).unwrap();
    session.set_body_attribute(attr::LINK_COLOR, Some("blue")).unwrap();
    session.set_body_attribute(attr::BG_COLOR, Some("white")).unwrap();
    assert_eq!(session.history().undo_depth(), 2);

    session.undo().unwrap();
    session.undo().unwrap();
    assert!(!session.undo().unwrap());
    let body = session.document().body();
    assert_eq!(session.document().attribute(body, attr::TEXT_COLOR), Some("red"));
    assert_eq!(session.document().attribute(body, attr::LINK_COLOR), None);
}

#[test]
fn reconfigured_undo_cap_applies_to_new_records() {
    let mut session = session("<div>a</div>");
    let config = session.config().clone().with_max_undo_levels(2);
    session.set_config(config).unwrap();
    for _ in 0..5 {
        session.indent(1).unwrap();
    }
    assert!(session.history().undo_depth() <= 2);
}

#[test]
fn reconfigured_undo_cap_trims_existing_records() {
    let mut session = session("<div>a</div>");
    session.set_body_attribute(attr::TEXT_COLOR, Some("red")).unwrap();
    session.set_body_attribute(attr::LINK_COLOR, Some("blue")).unwrap();
    session.set_body_attribute(attr::BG_COLOR, Some("white")).unwrap();
    let config = session.config().clone().with_max_undo_levels(1);
    session.set_config(config).unwrap();
    assert_eq!(session.history().undo_depth(), 1);
}

#[test]
fn grouped_records_undo_together() {
    let mut session = session("<div>a</div>");
    session.set_body_attribute(attr::TEXT_COLOR, Some("red")).unwrap();
    session.set_body_attribute(attr::LINK_COLOR, Some("blue")).unwrap();
    session.group_top_records(2, Some("colors"));
    assert_eq!(session.history().undo_depth(), 1);
    assert_eq!(session.history().last_record().unwrap().name(), "colors");

    session.undo().unwrap();
    let body = session.document().body();
    assert_eq!(session.document().attribute(body, attr::TEXT_COLOR), None);
    assert_eq!(session.document().attribute(body, attr::LINK_COLOR), None);
}

#[test]
fn replaying_history_reuses_arena_slots() {
    let mut session = session(
        "<div>aaaa bbbb cccc</div><blockquote type=\"cite\"><div>quoted text</div></blockquote>",
    );
    session.set_mode(Mode::PlainText).unwrap();
    session.undo().unwrap();
    session.redo().unwrap();
    let settled = session.document().slot_count();

    for _ in 0..100 {
        assert!(session.undo().unwrap());
        assert!(session.redo().unwrap());
    }
    assert!(session.document().slot_count() <= settled);
    assert_eq!(session.mode(), Mode::PlainText);
}

#[test]
fn loading_merges_split_text() {
    let session = session("<div>a<!-- note -->b</div>");
    let paragraph = session.document().first_child(session.document().body()).unwrap();
    assert_eq!(session.document().child_count(paragraph), 1);
    assert_eq!(session.markup(), "<div>ab</div>");
}

#[test]
fn typing_coalesces_into_one_step() {
    let mut session = EditorSession::new(ComposerConfig::default());
    session.type_text("a").unwrap();
    session.type_text("b").unwrap();
    assert_eq!(session.markup(), "<div>ab</div>");
    assert_eq!(session.history().undo_depth(), 1);

    session.undo().unwrap();
    assert_eq!(session.markup(), "<div><br></div>");
    session.redo().unwrap();
    assert_eq!(session.markup(), "<div>ab</div>");
    assert_eq!(session.selection(), Selection::collapsed(path(&[0, 0]), 2));
}

#[test]
fn typed_link_is_linked_after_a_space() {
    let mut session = EditorSession::new(ComposerConfig::default());
    session.type_text("see www.example.org").unwrap();
    session.type_text(" ").unwrap();
    assert!(
        session
            .markup()
            .contains("<a href=\"http://www.example.org\">www.example.org</a>")
    );
    assert_eq!(session.history().undo_depth(), 1);

    session.undo().unwrap();
    assert_eq!(session.markup(), "<div><br></div>");
}

#[test]
fn typed_links_stay_plain_without_magic_links() {
    let config = ComposerConfig::default().with_magic_links(false);
    let mut session = EditorSession::new(config);
    session.type_text("www.example.org ").unwrap();
    assert_eq!(session.markup(), "<div>www.example.org </div>");
}

#[test]
fn typed_smileys_become_unicode_when_enabled() {
    let config = ComposerConfig::default()
        .with_magic_smileys(true)
        .with_unicode_smileys(true);
    let mut session = EditorSession::new(config);
    session.type_text("hi :-) ").unwrap();
    assert_eq!(session.markup(), "<div>hi \u{1f642} </div>");
    assert_eq!(session.anchor().offset, 5);
}

// ============================================================================
// Attributes and events
// ============================================================================

#[test]
fn unchanged_attribute_is_not_recorded() {
    let mut session = session("<div>a</div>");
    assert!(session.set_body_attribute(attr::TEXT_COLOR, Some("red")).unwrap());
    assert!(!session.set_body_attribute(attr::TEXT_COLOR, Some("red")).unwrap());
    assert_eq!(session.history().undo_depth(), 1);
    assert_eq!(
        session.history().last_record().unwrap().name(),
        "SetBodyAttribute::text"
    );

    session.undo().unwrap();
    let body = session.document().body();
    assert_eq!(session.document().attribute(body, attr::TEXT_COLOR), None);
}

#[test]
fn body_font_name_is_undoable() {
    let mut session = session("<div>a</div>");
    session.set_body_font_name(Some("serif")).unwrap();
    session.set_body_font_name(Some("serif")).unwrap();
    assert_eq!(session.history().undo_depth(), 1);
    let body = session.document().body();
    assert_eq!(session.document().attribute(body, attr::FONT_FAMILY), Some("serif"));

    session.set_body_font_name(Some("")).unwrap();
    assert_eq!(session.document().attribute(body, attr::FONT_FAMILY), None);
    session.undo().unwrap();
    assert_eq!(session.document().attribute(body, attr::FONT_FAMILY), Some("serif"));
}

#[test]
fn committed_records_announce_content_changes() {
    let mut session = session("<div>a</div>");
    session.drain_events();

    session.set_body_attribute(attr::TEXT_COLOR, Some("red")).unwrap();
    assert!(session.drain_events().contains(&EditorEvent::ContentChanged));

    session.set_body_attribute(attr::TEXT_COLOR, Some("red")).unwrap();
    assert!(!session.drain_events().contains(&EditorEvent::ContentChanged));

    session.undo().unwrap();
    assert!(session.drain_events().contains(&EditorEvent::ContentChanged));
}

#[test]
fn invalid_arguments_are_rejected() {
    let mut session = session("<div>a</div>");
    assert!(matches!(session.indent(0), Err(EditorError::InvalidArgument(_))));
    assert!(matches!(
        session.set_block_format(BlockFormat::None),
        Err(EditorError::InvalidArgument(_))
    ));
    assert!(matches!(
        session.set_block_format(BlockFormat::Heading(7)),
        Err(EditorError::InvalidArgument(_))
    ));
    assert!(matches!(
        session.set_paragraph_width(0),
        Err(EditorError::InvalidArgument(_))
    ));
    assert_eq!(session.markup(), "<div>a</div>");
    assert!(!session.history().can_undo());
}

// ============================================================================
// Indentation
// ============================================================================

#[test]
fn paragraph_indent_moves_the_start_margin() {
    let mut session = session("<div>a</div>");
    session.indent(1).unwrap();
    assert_eq!(session.markup(), "<div margin-left=\"3ch\">a</div>");
    session.indent(1).unwrap();
    assert_eq!(session.markup(), "<div margin-left=\"6ch\">a</div>");
    session.indent(-1).unwrap();
    session.indent(-1).unwrap();
    assert_eq!(session.markup(), "<div>a</div>");
    assert_eq!(session.history().undo_depth(), 4);
}

#[test]
fn right_to_left_paragraphs_indent_on_the_right() {
    let mut session = session("<div dir=\"rtl\" width=\"40ch\">a</div>");
    session.indent(1).unwrap();
    let paragraph = session.document().first_child(session.document().body()).unwrap();
    assert_eq!(session.document().attribute(paragraph, attr::MARGIN_RIGHT), Some("3ch"));
    assert_eq!(session.document().attribute(paragraph, attr::WIDTH), Some("37ch"));

    session.undo().unwrap();
    assert_eq!(session.markup(), "<div dir=\"rtl\" width=\"40ch\">a</div>");
}

#[test]
fn outdent_of_a_nested_item_joins_the_outer_list() {
    let mut session = session("<ul><li>a</li><ul><li>b</li></ul></ul>");
    session.collapse_to(&path(&[0, 1, 0, 0]), 0).unwrap();
    session.indent(-1).unwrap();
    assert_eq!(session.markup(), "<ul><li>a</li><li>b</li></ul>");

    session.undo().unwrap();
    assert_eq!(session.markup(), "<ul><li>a</li><ul><li>b</li></ul></ul>");
}

#[test]
fn outdent_of_a_top_level_list_makes_paragraphs() {
    let mut session = session("<ul><li>a</li></ul>");
    session.collapse_to(&path(&[0, 0, 0]), 0).unwrap();
    session.indent(-1).unwrap();
    assert_eq!(session.markup(), "<div>a</div>");

    session.undo().unwrap();
    assert_eq!(session.markup(), "<ul><li>a</li></ul>");
}

// ============================================================================
// Configuration
// ============================================================================

#[test]
fn paragraph_width_reflows_plain_text_without_history() {
    let mut session = session("<div>x</div>");
    session.set_mode(Mode::PlainText).unwrap();
    session.set_paragraph_width(40).unwrap();
    assert_eq!(session.markup(), "<div width=\"40ch\">x</div>");
    assert_eq!(session.history().undo_depth(), 1);
    assert_eq!(session.config().paragraph_width, 40);
}

#[test]
fn set_config_applies_a_new_width() {
    let mut session = session("<div>x</div>");
    session.set_mode(Mode::PlainText).unwrap();
    let config = ComposerConfig::default()
        .with_paragraph_width(30)
        .unwrap()
        .with_magic_links(false);
    session.set_config(config).unwrap();
    assert!(!session.config().magic_links);
    assert_eq!(session.markup(), "<div width=\"30ch\">x</div>");
}
