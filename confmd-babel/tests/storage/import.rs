use confmd_babel::ast::{
    DocumentNode, InfoPanel, Inline, Paragraph, SimpleBlock, SourceFormat, TaskStatus,
    UnsupportedBlock,
};
use confmd_babel::format::Format;
use confmd_babel::formats::storage::ConfluenceFormat;
use confmd_babel::FormatError;

fn parse(storage: &str) -> Vec<DocumentNode> {
    ConfluenceFormat::default()
        .parse(storage)
        .expect("Failed to parse storage markup")
        .children
}

fn text_paragraph(value: &str) -> SimpleBlock {
    SimpleBlock::Paragraph(Paragraph {
        children: vec![Inline::text(value)],
    })
}

#[test]
fn test_mention_inside_task_body_is_flattened() {
    let nodes = parse(concat!(
        "<ac:task-list><ac:task>",
        "<ac:task-id>7</ac:task-id><ac:task-status>complete</ac:task-status>",
        r#"<ac:task-body>Ask <ac:link><ri:user ri:account-id="u1" /></ac:link> today</ac:task-body>"#,
        "</ac:task></ac:task-list>"
    ));
    let DocumentNode::TaskList(list) = &nodes[0] else {
        panic!("Expected a task list, got {nodes:?}");
    };
    assert_eq!(list.children.len(), 1);
    assert_eq!(list.children[0].id, "7");
    assert_eq!(list.children[0].status, TaskStatus::Complete);
    assert_eq!(list.children[0].body, vec![Inline::text("Ask today")]);
}

#[test]
fn test_self_closing_nested_macro_keeps_outer_open() {
    let nodes = parse(concat!(
        r#"<ac:structured-macro ac:name="info"><ac:rich-text-body>"#,
        "<p>A</p>",
        r#"<ac:structured-macro ac:name="info" />"#,
        "<p>B</p>",
        "</ac:rich-text-body></ac:structured-macro>"
    ));
    assert_eq!(nodes.len(), 1);
    let DocumentNode::InfoPanel(panel) = &nodes[0] else {
        panic!("Expected a panel, got {nodes:?}");
    };
    assert_eq!(panel.children.len(), 3);
    assert_eq!(panel.children[0], text_paragraph("A"));
    let SimpleBlock::UnsupportedBlock(nested) = &panel.children[1] else {
        panic!("Expected kept markup, got {:?}", panel.children[1]);
    };
    assert!(nested
        .raw_html
        .as_deref()
        .is_some_and(|raw| raw.contains(r#"ac:name="info""#)));
    assert_eq!(panel.children[2], text_paragraph("B"));
}

#[test]
fn test_unclosed_macro_is_an_error() {
    let err = ConfluenceFormat::default()
        .parse(r#"<p>x</p><ac:structured-macro ac:name="info"><ac:rich-text-body><p>y</p>"#)
        .unwrap_err();
    match err {
        FormatError::Parse(parse) => {
            assert_eq!(parse.format, SourceFormat::Confluence);
            assert!(parse.position.is_some());
        }
        other => panic!("Expected a parse error, got {other:?}"),
    }
}

#[test]
fn test_page_link_is_kept_as_markup() {
    let link = r#"<ac:link><ri:page ri:content-title="Home" /></ac:link>"#;
    let nodes = parse(&format!("<p>See {link}</p>"));
    assert_eq!(
        nodes,
        vec![DocumentNode::Paragraph(Paragraph {
            children: vec![
                Inline::text("See "),
                Inline::unsupported(link, SourceFormat::Confluence),
            ],
        })]
    );
}

#[test]
fn test_unknown_element_is_kept_as_markup() {
    let nodes = parse(r#"<div class="x"><p>hi</p></div>"#);
    assert_eq!(
        nodes,
        vec![DocumentNode::UnsupportedBlock(UnsupportedBlock::html(
            r#"<div class="x"><p>hi</p></div>"#,
            SourceFormat::Confluence,
        ))]
    );
}

#[test]
fn test_adf_panel_and_decisions() {
    let nodes = parse(concat!(
        r#"<ac:adf-extension><ac:adf-node type="panel">"#,
        r#"<ac:adf-attribute key="panel-type">success</ac:adf-attribute>"#,
        "<ac:adf-content><p>Shipped</p></ac:adf-content>",
        "</ac:adf-node></ac:adf-extension>",
        r#"<ac:adf-extension><ac:adf-node type="decision-list">"#,
        r#"<ac:adf-node type="decision-item">"#,
        r#"<ac:adf-attribute key="local-id">d1</ac:adf-attribute>"#,
        r#"<ac:adf-attribute key="state">DECIDED</ac:adf-attribute>"#,
        "<ac:adf-content>Use Rust</ac:adf-content>",
        "</ac:adf-node></ac:adf-node></ac:adf-extension>"
    ));
    assert_eq!(
        nodes,
        vec![
            DocumentNode::InfoPanel(InfoPanel {
                panel_type: "success".into(),
                title: None,
                children: vec![text_paragraph("Shipped")],
            }),
            DocumentNode::UnsupportedBlock(UnsupportedBlock::html(
                "<!-- decisions:d1;DECIDED;Use Rust -->",
                SourceFormat::Confluence,
            )),
        ]
    );
}

#[test]
fn test_merged_cells_keep_table_markup() {
    let table = r#"<table><tbody><tr><td colspan="2">wide</td></tr></tbody></table>"#;
    let nodes = parse(table);
    assert_eq!(
        nodes,
        vec![DocumentNode::UnsupportedBlock(UnsupportedBlock::html(
            table,
            SourceFormat::Confluence,
        ))]
    );
}

#[test]
fn test_smart_link_title_is_carried() {
    let nodes = parse(concat!(
        r#"<p><a href="https://x.test/p" data-card-appearance="block">Release notes</a> and "#,
        r#"<a href="https://x.test/q" data-card-appearance="inline">https://x.test/q</a></p>"#
    ));
    assert_eq!(
        nodes,
        vec![DocumentNode::Paragraph(Paragraph {
            children: vec![
                Inline::unsupported(
                    "<!-- smartlink:https://x.test/p;block;Release notes -->",
                    SourceFormat::Confluence,
                ),
                Inline::text(" and "),
                Inline::unsupported(
                    "<!-- smartlink:https://x.test/q;inline -->",
                    SourceFormat::Confluence,
                ),
            ],
        })]
    );
}
