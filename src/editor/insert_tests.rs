use super::*;

fn session(markup: &str) -> EditorSession {
    EditorSession::from_markup(markup, ComposerConfig::default()).unwrap()
}

fn at_text(session: &mut EditorSession, indices: &[usize], offset: usize) {
    session.collapse_to(&Path::new(indices.to_vec()), offset).unwrap();
}

#[test]
fn text_is_inserted_at_the_caret() {
    let mut session = session("<div>hello</div>");
    at_text(&mut session, &[0, 0], 5);
    session.insert_text("Paste", " world").unwrap();
    assert_eq!(session.markup(), "<div>hello world</div>");
    assert_eq!(session.history().undo_depth(), 1);
    assert_eq!(session.history().last_record().unwrap().name(), "Paste");

    session.undo().unwrap();
    assert_eq!(session.markup(), "<div>hello</div>");
    assert_eq!(session.selection(), Selection::collapsed(Path::new(vec![0, 0]), 5));
}

#[test]
fn newlines_split_the_block() {
    let mut session = session("<div>ab</div>");
    at_text(&mut session, &[0, 0], 1);
    session.insert_text("Paste", "x\ny").unwrap();
    assert_eq!(session.markup(), "<div>ax</div><div>yb</div>");

    session.undo().unwrap();
    assert_eq!(session.markup(), "<div>ab</div>");
}

#[test]
fn text_replaces_an_empty_paragraph_break() {
    let mut session = EditorSession::new(ComposerConfig::default());
    session.insert_text("Paste", "hi").unwrap();
    assert_eq!(session.markup(), "<div>hi</div>");
}

#[test]
fn deleting_across_blocks_joins_them() {
    let mut session = session("<div>abc</div><div>def</div>");
    let selection: Selection = "/0/0:1;/1/0:2".parse().unwrap();
    session.set_selection(&selection).unwrap();
    session.delete_selection().unwrap();
    assert_eq!(session.markup(), "<div>af</div>");
    assert!(session.is_collapsed());

    session.undo().unwrap();
    assert_eq!(session.markup(), "<div>abc</div><div>def</div>");
}

#[test]
fn deleting_inside_one_text_node() {
    let mut session = session("<div>abcdef</div>");
    let selection: Selection = "/0/0:4;/0/0:1".parse().unwrap();
    session.set_selection(&selection).unwrap();
    session.delete_selection().unwrap();
    assert_eq!(session.markup(), "<div>aef</div>");
    assert_eq!(session.selection(), Selection::collapsed(Path::new(vec![0, 0]), 1));
}

fn node_count(session: &EditorSession) -> usize {
    session.document().descendants(session.document().body()).len()
}

#[test]
fn replayed_ranges_keep_their_node_structure() {
    let mut session = session("<div>abcdef</div>");
    let selection: Selection = "/0/0:2;/0/0:4".parse().unwrap();
    session.set_selection(&selection).unwrap();
    session.insert_html("Paste", "x<b>y</b>z").unwrap();
    let edited = session.markup();
    assert_eq!(edited, "<div>abx<b>y</b>zef</div>");
    let paragraph = session.document().first_child(session.document().body()).unwrap();
    assert_eq!(session.document().child_count(paragraph), 3);
    let nodes = node_count(&session);

    session.undo().unwrap();
    assert_eq!(session.markup(), "<div>abcdef</div>");
    session.redo().unwrap();
    assert_eq!(session.markup(), edited);
    assert_eq!(node_count(&session), nodes);
    session.undo().unwrap();
    assert_eq!(session.markup(), "<div>abcdef</div>");
}

#[test]
fn undo_keeps_spaces_between_nested_blocks() {
    let original = "<div><div>ab</div> <div>cd</div></div>";
    let mut session = session(original);
    let selection: Selection = "/0/0/0:1;/0/2/0:1".parse().unwrap();
    session.set_selection(&selection).unwrap();
    session.delete_selection().unwrap();
    let edited = session.markup();
    assert_eq!(edited, "<div><div>ad</div></div>");
    assert_eq!(session.selection(), Selection::collapsed(Path::new(vec![0, 0, 0]), 1));

    session.undo().unwrap();
    assert_eq!(session.markup(), original);
    session.redo().unwrap();
    assert_eq!(session.markup(), edited);
    session.undo().unwrap();
    assert_eq!(session.markup(), original);
}

#[test]
fn collapsed_delete_records_nothing() {
    let mut session = session("<div>abc</div>");
    session.delete_selection().unwrap();
    assert!(!session.history().can_undo());
}

#[test]
fn inline_markup_is_inserted_inside_the_text() {
    let mut session = session("<div>ab</div>");
    at_text(&mut session, &[0, 0], 1);
    session.insert_html("Paste", "<b>X</b>").unwrap();
    assert_eq!(session.markup(), "<div>a<b>X</b>b</div>");

    session.undo().unwrap();
    assert_eq!(session.markup(), "<div>ab</div>");
}

#[test]
fn block_markup_splits_the_current_block() {
    let mut session = session("<div>ab</div>");
    at_text(&mut session, &[0, 0], 1);
    session
        .insert_html("Paste", "<blockquote class=\"x\" type=\"cite\"><div>q</div></blockquote>")
        .unwrap();
    assert_eq!(
        session.markup(),
        "<div>a</div><blockquote type=\"cite\"><div>q</div></blockquote><div>b</div>"
    );
    assert_eq!(session.history().undo_depth(), 1);

    session.undo().unwrap();
    assert_eq!(session.markup(), "<div>ab</div>");
}

#[test]
fn plain_text_is_quoted_into_a_cite_block() {
    let mut session = EditorSession::new(ComposerConfig::default());
    session.insert_content("line one\nline two", false, true).unwrap();
    assert_eq!(
        session.markup(),
        "<blockquote type=\"cite\"><div>line one</div><div>line two</div></blockquote>"
    );
    assert_eq!(session.history().undo_depth(), 1);

    session.undo().unwrap();
    assert_eq!(session.markup(), "<div><br></div>");
}

#[test]
fn quoted_content_in_plain_mode_gets_prefixes() {
    let mut session = EditorSession::new(ComposerConfig::default());
    session.set_mode(Mode::PlainText).unwrap();
    session.insert_content("<div>original</div>", true, true).unwrap();
    let markup = session.markup();
    assert!(markup.starts_with("<blockquote type=\"cite\">"));
    assert!(markup.contains("quote-character"));

    let text = session
        .get_content(crate::editor::content::ContentFlags::TO_SEND_PLAIN)
        .unwrap()
        .to_send_plain
        .unwrap();
    assert_eq!(text, "> original\n");
}

#[test]
fn single_line_content_is_inserted_as_text() {
    let mut session = session("<div>ab</div>");
    at_text(&mut session, &[0, 0], 2);
    session.insert_content("cd", false, false).unwrap();
    assert_eq!(session.markup(), "<div>abcd</div>");
}

#[test]
fn inserted_content_links_urls() {
    let mut session = EditorSession::new(ComposerConfig::default());
    session.insert_content("see https://example.org", false, false).unwrap();
    assert!(
        session
            .markup()
            .contains("<a href=\"https://example.org\">https://example.org</a>")
    );
}

#[test]
fn smileys_are_replaced_in_inserted_content() {
    let config = ComposerConfig::default()
        .with_magic_smileys(true)
        .with_unicode_smileys(true);
    let mut session = EditorSession::new(config);
    session.insert_content("ok ;-)", false, false).unwrap();
    assert_eq!(session.markup(), "<div>ok \u{1f609}</div>");
}

#[test]
fn images_are_inserted_with_pixel_sizes() {
    let mut session = session("<div>ab</div>");
    at_text(&mut session, &[0, 0], 1);
    session.insert_image("cid:logo", Some((16, 8))).unwrap();
    assert_eq!(
        session.markup(),
        "<div>a<img height=\"8px\" src=\"cid:logo\" width=\"16px\">b</div>"
    );
    assert_eq!(session.history().last_record().unwrap().name(), "InsertImage");

    session.undo().unwrap();
    assert_eq!(session.markup(), "<div>ab</div>");
}

#[test]
fn emoticons_are_pictures_only_in_rich_text() {
    let mut session = session("<div>a</div>");
    at_text(&mut session, &[0, 0], 1);
    session.insert_emoticon(":->", Some("cid:smile"), (16, 16)).unwrap();
    assert_eq!(
        session.markup(),
        "<div>a<img alt=\":-&gt;\" height=\"16px\" src=\"cid:smile\" width=\"16px\"></div>"
    );

    let mut plain = EditorSession::new(ComposerConfig::default());
    plain.set_mode(Mode::PlainText).unwrap();
    plain.insert_emoticon(":-)", Some("cid:smile"), (16, 16)).unwrap();
    let markup = plain.markup();
    assert!(markup.contains(":-)"));
    assert!(!markup.contains("<img"));
}

#[test]
fn bottom_signature_follows_the_body() {
    let mut session = session("<div>reply</div>");
    session.insert_signature("Jane", false, false, true).unwrap();
    assert_eq!(
        session.markup(),
        "<div>reply</div><div class=\"signature-wrapper\">-- <br>Jane</div>"
    );
    assert_eq!(session.history().undo_depth(), 1);
    assert_eq!(session.history().last_record().unwrap().name(), "InsertSignature");

    session.undo().unwrap();
    assert_eq!(session.markup(), "<div>reply</div>");
}

#[test]
fn top_signature_is_followed_by_a_spacer() {
    let mut session = session("<div>reply</div>");
    session.insert_signature("<b>Jane</b>", true, true, true).unwrap();
    assert_eq!(
        session.markup(),
        "<div class=\"signature-wrapper\">-- <br><b>Jane</b></div>\
         <div class=\"top-signature-spacer\"><br></div><div>reply</div>"
    );

    session.undo().unwrap();
    assert_eq!(session.markup(), "<div>reply</div>");
}

#[test]
fn replacing_a_signature_keeps_one_wrapper() {
    let mut session = session("<div>reply</div>");
    session.insert_signature("Jane", false, true, true).unwrap();
    session.insert_signature("-- \nJohn", false, false, true).unwrap();
    assert_eq!(
        session.markup(),
        "<div>reply</div><div class=\"signature-wrapper\">-- <br>John</div>"
    );
    assert_eq!(session.history().undo_depth(), 2);

    session.undo().unwrap();
    assert_eq!(
        session.markup(),
        "<div class=\"signature-wrapper\">-- <br>Jane</div>\
         <div class=\"top-signature-spacer\"><br></div><div>reply</div>"
    );
}

#[test]
fn empty_signature_removes_the_old_one() {
    let mut session = session("<div>reply</div>");
    session.insert_signature("Jane", false, false, false).unwrap();
    assert_eq!(
        session.markup(),
        "<div>reply</div><div class=\"signature-wrapper\">Jane</div>"
    );
    session.insert_signature("", false, false, true).unwrap();
    assert_eq!(session.markup(), "<div>reply</div>");
}
