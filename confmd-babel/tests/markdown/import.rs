use confmd_babel::ast::{
    BaseInline, BlockQuote, CodeBlock, DocumentNode, Heading, InfoPanel, Inline, List, ListItem,
    Paragraph, SimpleBlock, SourceFormat, TaskItem, TaskList, TaskStatus,
};
use confmd_babel::format::Format;
use confmd_babel::formats::markdown::MarkdownFormat;
use confmd_babel::{parse_markdown, FormatError};

fn parse(md: &str) -> Vec<DocumentNode> {
    MarkdownFormat::default()
        .parse(md)
        .expect("Failed to parse markdown")
        .children
}

fn paragraph(children: Vec<Inline>) -> DocumentNode {
    DocumentNode::Paragraph(Paragraph { children })
}

#[test]
fn test_paired_color_span() {
    let nodes = parse(r#"<span style="color: #ff0000;">A</span>B"#);
    assert_eq!(
        nodes,
        vec![paragraph(vec![
            Inline::ColoredText {
                color: "#ff0000".into(),
                children: vec![BaseInline::text("A")],
            },
            Inline::text("B"),
        ])]
    );
}

#[test]
fn test_unterminated_underline_is_kept() {
    let nodes = parse("<u>open");
    assert_eq!(
        nodes,
        vec![paragraph(vec![
            Inline::unsupported("<u>", SourceFormat::Markdown),
            Inline::text("open"),
        ])]
    );
}

#[test]
fn test_status_lozenges_share_a_line() {
    let nodes = parse("<!-- status:Done;Green --> and <!-- status:Late;Red -->\n");
    assert_eq!(
        nodes,
        vec![paragraph(vec![
            Inline::Status {
                title: "Done".into(),
                color: "Green".into(),
            },
            Inline::text(" and "),
            Inline::Status {
                title: "Late".into(),
                color: "Red".into(),
            },
        ])]
    );
}

#[test]
fn test_task_list_comment() {
    let nodes = parse("<!-- tasklist:1;;incomplete;Buy milk -->\n");
    assert_eq!(
        nodes,
        vec![DocumentNode::TaskList(TaskList {
            children: vec![TaskItem {
                id: "1".into(),
                uuid: String::new(),
                status: TaskStatus::Incomplete,
                body: vec![Inline::text("Buy milk")],
            }],
        })]
    );
}

#[test]
fn test_roundtrip_escape_is_split_off() {
    let doc = parse_markdown("Hello\n\n<!-- confluence-roundtrip:PHA+aGk8L3A+ -->\n").unwrap();
    assert_eq!(doc.raw_confluence.as_deref(), Some("<p>hi</p>"));
    assert_eq!(doc.children, vec![paragraph(vec![Inline::text("Hello")])]);
}

#[test]
fn test_corrupt_roundtrip_escape_is_an_error() {
    let err = MarkdownFormat::default()
        .parse("Hello\n\n<!-- confluence-roundtrip:%%% -->\n")
        .unwrap_err();
    match err {
        FormatError::Parse(parse) => {
            assert_eq!(parse.format, SourceFormat::Markdown);
            assert!(parse.raw_content.is_some());
        }
        other => panic!("Expected a parse error, got {other:?}"),
    }
}

#[test]
fn test_common_blocks() {
    let md = "## Setup\n\n3. first\n4. second\n\n> quoted\n\n```sh\nmake\n```\n";
    let text = |value: &str| {
        SimpleBlock::Paragraph(Paragraph {
            children: vec![Inline::text(value)],
        })
    };
    assert_eq!(
        parse(md),
        vec![
            DocumentNode::Heading(Heading {
                level: 2,
                children: vec![Inline::text("Setup")],
            }),
            DocumentNode::List(List {
                ordered: true,
                start: Some(3),
                children: vec![
                    ListItem {
                        checked: None,
                        children: vec![text("first")],
                    },
                    ListItem {
                        checked: None,
                        children: vec![text("second")],
                    },
                ],
            }),
            DocumentNode::BlockQuote(BlockQuote {
                children: vec![text("quoted")],
            }),
            DocumentNode::CodeBlock(CodeBlock {
                code: "make".into(),
                language: Some("sh".into()),
            }),
        ]
    );
}

#[test]
fn test_container_holding_fenced_code() {
    let md = ":::tip Remember\n```\n:::\n```\n:::\n";
    assert_eq!(
        parse(md),
        vec![DocumentNode::InfoPanel(InfoPanel {
            panel_type: "tip".into(),
            title: Some("Remember".into()),
            children: vec![SimpleBlock::CodeBlock(CodeBlock {
                code: ":::".into(),
                language: None,
            })],
        })]
    );
}

#[test]
fn test_soft_breaks_read_as_spaces() {
    assert_eq!(
        parse("one\ntwo<br />three"),
        vec![paragraph(vec![
            Inline::text("one two"),
            Inline::LineBreak,
            Inline::text("three"),
        ])]
    );
}
