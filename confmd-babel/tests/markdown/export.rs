use confmd_babel::ast::{
    Document, DocumentNode, Inline, Paragraph, SourceFormat, Table, TableCell, TableRow,
    UnsupportedBlock,
};
use confmd_babel::format::Format;
use confmd_babel::formats::markdown::MarkdownFormat;
use confmd_babel::{storage_to_markdown, FormatRegistry};
use insta::assert_snapshot;
use std::collections::HashMap;

#[test]
fn test_page_export() {
    let storage = concat!(
        "<h1>Title</h1>",
        "<p>Some <strong>bold</strong> text.</p>",
        "<ul><li>one</li><li>two</li></ul>",
        r#"<ac:structured-macro ac:name="info"><ac:rich-text-body><p>Inside</p></ac:rich-text-body></ac:structured-macro>"#,
    );
    let markdown = storage_to_markdown(storage).expect("Failed to convert");
    assert_snapshot!(markdown, @r###"
    # Title

    Some **bold** text.

    - one
    - two

    :::info
    Inside
    :::
    "###);
}

#[test]
fn test_gfm_table() {
    let storage = "<table><tbody><tr><th>Name</th><th>Role</th></tr><tr><td>Ada</td><td>Admin</td></tr></tbody></table>";
    let markdown = storage_to_markdown(storage).unwrap();
    assert!(markdown.contains("| Name | Role |"));
    assert!(markdown.contains("| Ada | Admin |"));
}

#[test]
fn test_table_with_pipe_falls_back_to_markup() {
    let table = Table {
        header: Some(TableRow {
            cells: vec![TableCell {
                is_header: true,
                children: vec![Inline::text("a | b")],
            }],
        }),
        rows: vec![],
    };
    let markdown = MarkdownFormat::default()
        .serialize(&Document::new(vec![DocumentNode::Table(table)]))
        .unwrap();
    assert_eq!(
        markdown.trim_end(),
        "<table><tbody><tr><th>a | b</th></tr></tbody></table>"
    );
}

#[test]
fn test_unknown_macro_travels_as_comment() {
    let storage = r#"<ac:structured-macro ac:name="jira"><ac:parameter ac:name="key">ABC-1</ac:parameter></ac:structured-macro>"#;
    let markdown = storage_to_markdown(storage).unwrap();
    assert_eq!(
        markdown.trim_end(),
        format!("<!-- html-block:{storage} -->")
    );
}

#[test]
fn test_layout_markers_are_verbatim() {
    let storage = concat!(
        r#"<ac:layout><ac:layout-section ac:type="two_equal">"#,
        "<ac:layout-cell><p>Left</p></ac:layout-cell>",
        "<ac:layout-cell><p>Right</p></ac:layout-cell>",
        "</ac:layout-section></ac:layout>"
    );
    let markdown = storage_to_markdown(storage).unwrap();
    let lines: Vec<&str> = markdown.lines().filter(|l| !l.is_empty()).collect();
    assert_eq!(
        lines,
        vec![
            "<!-- layout-start -->",
            "<!-- layout-section:0;two_equal;;;2 -->",
            "<!-- layout-cell:0;0 -->",
            "Left",
            "<!-- layout-cell:0;1 -->",
            "Right",
            "<!-- layout-section-end:0 -->",
            "<!-- layout-end -->",
        ]
    );
}

#[test]
fn test_comment_panel_syntax_option() {
    let registry = FormatRegistry::default();
    let doc = registry
        .parse(
            r#"<ac:structured-macro ac:name="note"><ac:rich-text-body><p>Read me</p></ac:rich-text-body></ac:structured-macro>"#,
            "confluence",
        )
        .unwrap();
    let mut options = HashMap::new();
    options.insert("panel-syntax".to_string(), "comment".to_string());
    let markdown = registry
        .serialize_with_options(&doc, "markdown", &options)
        .unwrap();
    assert_eq!(markdown.trim_end(), "<!-- panel:note;;Read me -->");

    options.insert("panel-syntax".to_string(), "boxed".to_string());
    assert!(registry
        .serialize_with_options(&doc, "markdown", &options)
        .is_err());
}

#[test]
fn test_roundtrip_payload_is_appended() {
    let doc = Document::new(vec![DocumentNode::Paragraph(Paragraph {
        children: vec![Inline::text("Hello")],
    })])
    .with_raw_confluence("<p>hi</p>");

    let format = MarkdownFormat::default();
    let markdown = format.serialize(&doc).unwrap();
    assert_eq!(
        markdown,
        "Hello\n\n<!-- confluence-roundtrip:PHA+aGk8L3A+ -->\n"
    );

    let mut options = HashMap::new();
    options.insert("embed-roundtrip".to_string(), "false".to_string());
    assert_eq!(
        format.serialize_with_options(&doc, &options).unwrap(),
        "Hello\n"
    );
}

#[test]
fn test_unsupported_markdown_is_written_back_verbatim() {
    let doc = Document::new(vec![DocumentNode::UnsupportedBlock(UnsupportedBlock::markdown(
        "- deep",
    ))]);
    let markdown = MarkdownFormat::default().serialize(&doc).unwrap();
    assert_eq!(markdown.trim_end(), "- deep");
}

#[test]
fn test_safe_html_block_stays_markup() {
    let doc = Document::new(vec![DocumentNode::UnsupportedBlock(UnsupportedBlock::html(
        r#"<div class="note"><p>hi</p></div>"#,
        SourceFormat::Confluence,
    ))]);
    let markdown = MarkdownFormat::default().serialize(&doc).unwrap();
    assert_eq!(markdown.trim_end(), r#"<div class="note"><p>hi</p></div>"#);
}
