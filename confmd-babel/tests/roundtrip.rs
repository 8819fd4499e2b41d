//! Cross-format properties: storage → Markdown → storage must keep the document.

use confmd_babel::{parse_markdown, parse_storage, serialize_markdown, serialize_storage, Document};
use proptest::prelude::*;

/// Checks that a page survives both directions and that each serializer is a fixed point.
fn assert_round_trip(storage: &str) -> Document {
    let doc = parse_storage(storage).expect("Failed to parse storage markup");

    let markdown = serialize_markdown(&doc).expect("Failed to write markdown");
    let from_markdown = parse_markdown(&markdown).expect("Failed to read markdown back");
    assert_eq!(from_markdown, doc, "markdown round trip changed:\n{markdown}");
    let again = serialize_markdown(&from_markdown).unwrap();
    assert_eq!(again, markdown, "markdown output is not stable");

    let written = serialize_storage(&doc).expect("Failed to write storage markup");
    let reparsed = parse_storage(&written).expect("Failed to read storage back");
    assert_eq!(reparsed, doc, "storage round trip changed:\n{written}");
    assert_eq!(serialize_storage(&reparsed).unwrap(), written);

    doc
}

#[test]
fn test_basic_inline_formatting() {
    assert_round_trip(concat!(
        "<h2>Notes</h2>",
        r#"<p>Plain <strong>bold</strong>, <em>italic</em>, <code>code</code> and <a href="https://example.com">a link</a>.</p>"#,
        "<p>Line one<br />line two</p>",
        "<hr />"
    ));
}

#[test]
fn test_warning_panel() {
    assert_round_trip(concat!(
        r#"<ac:structured-macro ac:name="warning"><ac:parameter ac:name="title">Careful</ac:parameter>"#,
        "<ac:rich-text-body><p>Hot</p><p>Very hot</p></ac:rich-text-body></ac:structured-macro>"
    ));
}

#[test]
fn test_task_list() {
    assert_round_trip(concat!(
        "<ac:task-list>",
        "<ac:task><ac:task-id>1</ac:task-id><ac:task-status>incomplete</ac:task-status><ac:task-body>Buy milk</ac:task-body></ac:task>",
        "<ac:task><ac:task-id>2</ac:task-id><ac:task-status>complete</ac:task-status><ac:task-body>Pay; rent</ac:task-body></ac:task>",
        "</ac:task-list>"
    ));
}

#[test]
fn test_mention_and_status() {
    assert_round_trip(concat!(
        r#"<p>Owner: <ac:link><ri:user ri:account-id="abc123" /></ac:link> "#,
        r#"<ac:structured-macro ac:name="status"><ac:parameter ac:name="colour">Green</ac:parameter><ac:parameter ac:name="title">DONE</ac:parameter></ac:structured-macro>"#,
        "</p>"
    ));
}

#[test]
fn test_table_with_header() {
    assert_round_trip(
        "<table><tbody><tr><th>Name</th><th>Role</th></tr><tr><td>Ada</td><td><strong>Admin</strong></td></tr></tbody></table>",
    );
}

#[test]
fn test_lists() {
    assert_round_trip(concat!(
        "<ul><li>one</li><li>two</li></ul>",
        r#"<ol start="3"><li>three</li><li>four</li></ol>"#
    ));
}

#[test]
fn test_code_macro() {
    assert_round_trip(concat!(
        r#"<ac:structured-macro ac:name="code"><ac:parameter ac:name="language">rust</ac:parameter>"#,
        "<ac:plain-text-body><![CDATA[fn main() {\n    println!(\"a < b\");\n}]]></ac:plain-text-body></ac:structured-macro>"
    ));
}

#[test]
fn test_unknown_macro() {
    let doc = assert_round_trip(
        r#"<ac:structured-macro ac:name="jira"><ac:parameter ac:name="key">ABC-1</ac:parameter></ac:structured-macro>"#,
    );
    assert_eq!(doc.children.len(), 1);
}

#[test]
fn test_expand() {
    assert_round_trip(concat!(
        r#"<ac:structured-macro ac:name="expand"><ac:parameter ac:name="title">More</ac:parameter>"#,
        "<ac:rich-text-body><p>Hidden</p></ac:rich-text-body></ac:structured-macro>"
    ));
}

#[test]
fn test_colored_text() {
    assert_round_trip(r#"<p>A <span style="color: #ff0000;">warning</span> word</p>"#);
}

#[test]
fn test_layout() {
    assert_round_trip(concat!(
        r#"<ac:layout><ac:layout-section ac:type="two_equal">"#,
        "<ac:layout-cell><p>Left</p></ac:layout-cell>",
        "<ac:layout-cell><p>Right</p></ac:layout-cell>",
        "</ac:layout-section></ac:layout>"
    ));
}

#[test]
fn test_smart_link_with_own_title() {
    let doc = assert_round_trip(
        r#"<p>See <a href="https://x.test/p" data-card-appearance="inline">Custom title</a></p>"#,
    );
    let markdown = serialize_markdown(&doc).unwrap();
    assert!(markdown.contains("Custom title"), "title lost:\n{markdown}");
    let storage = serialize_storage(&doc).unwrap();
    assert!(storage.contains(r#"data-card-appearance="inline">Custom title</a>"#));
}

#[test]
fn test_code_with_markup_inside() {
    assert_round_trip("<p>Run <code>make <strong>all</strong></code> first</p>");
}

proptest! {
    #[test]
    fn plain_paragraphs_round_trip(words in prop::collection::vec("[a-z]{1,8}", 1..12)) {
        let storage = format!("<p>{}</p>", words.join(" "));
        let doc = parse_storage(&storage).unwrap();
        let markdown = serialize_markdown(&doc).unwrap();
        prop_assert_eq!(parse_markdown(&markdown).unwrap(), doc.clone());
        prop_assert_eq!(serialize_storage(&doc).unwrap(), storage);
    }
}
