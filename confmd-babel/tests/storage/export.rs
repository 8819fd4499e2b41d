use confmd_babel::{markdown_to_storage, FormatRegistry};
use std::collections::HashMap;

#[test]
fn test_checkbox_list_becomes_task_list() {
    let storage = markdown_to_storage("- [ ] Buy milk\n- [x] Call home\n").unwrap();
    assert_eq!(
        storage,
        concat!(
            "<ac:task-list>",
            "<ac:task><ac:task-id>1</ac:task-id><ac:task-status>incomplete</ac:task-status><ac:task-body>Buy milk</ac:task-body></ac:task>",
            "<ac:task><ac:task-id>2</ac:task-id><ac:task-status>complete</ac:task-status><ac:task-body>Call home</ac:task-body></ac:task>",
            "</ac:task-list>"
        )
    );
}

#[test]
fn test_fenced_panel_becomes_macro() {
    let storage = markdown_to_storage(":::warning Careful\nHot\n:::\n").unwrap();
    assert_eq!(
        storage,
        r#"<ac:structured-macro ac:name="warning"><ac:parameter ac:name="title">Careful</ac:parameter><ac:rich-text-body><p>Hot</p></ac:rich-text-body></ac:structured-macro>"#
    );
}

#[test]
fn test_embedded_page_markup_wins() {
    let storage =
        markdown_to_storage("# Edited\n\n<!-- confluence-roundtrip:PHA+aGk8L3A+ -->\n").unwrap();
    assert_eq!(storage, "<p>hi</p>");
}

#[test]
fn test_inline_carriers() {
    let storage = markdown_to_storage(
        "Ping <!-- mention:abc123 --> about <!-- status:Done;Green --> on <!-- date:2024-05-01 -->\n",
    )
    .unwrap();
    assert!(storage.starts_with("<p>Ping "));
    assert!(storage.contains(r#"<ac:link><ri:user ri:account-id="abc123" /></ac:link>"#));
    assert!(storage.contains(r#"<ac:parameter ac:name="title">Done</ac:parameter>"#));
    assert!(storage.contains(r#"<time datetime="2024-05-01" />"#));
}

#[test]
fn test_custom_panel_type_follows_option() {
    let registry = FormatRegistry::default();
    let doc = registry.parse(":::success\nShipped\n:::\n", "markdown").unwrap();

    let adf = registry.serialize(&doc, "confluence").unwrap();
    assert!(adf.starts_with(r#"<ac:adf-extension><ac:adf-node type="panel">"#));

    let mut options = HashMap::new();
    options.insert("adf-panels".to_string(), "no".to_string());
    let classic = registry
        .serialize_with_options(&doc, "confluence", &options)
        .unwrap();
    assert_eq!(
        classic,
        r#"<ac:structured-macro ac:name="info"><ac:rich-text-body><p>Shipped</p></ac:rich-text-body></ac:structured-macro>"#
    );

    options.insert("adf-panels".to_string(), "maybe".to_string());
    assert!(registry
        .serialize_with_options(&doc, "confluence", &options)
        .is_err());
}

#[test]
fn test_unknown_macro_comment_is_restored() {
    let jira = r#"<ac:structured-macro ac:name="jira"><ac:parameter ac:name="key">ABC-1</ac:parameter></ac:structured-macro>"#;
    let storage = markdown_to_storage(&format!("<!-- html-block:{jira} -->\n")).unwrap();
    assert_eq!(storage, jira);
}

#[test]
fn test_checkbox_body_keeps_formatting() {
    let storage =
        markdown_to_storage("- [ ] **buy** [milk](https://shop.test)\n- [x] done\n").unwrap();
    assert!(storage.starts_with("<ac:task-list>"));
    assert!(storage.contains(concat!(
        "<ac:task-status>incomplete</ac:task-status>",
        r#"<ac:task-body><strong>buy</strong> <a href="https://shop.test">milk</a></ac:task-body>"#
    )));
    assert!(storage.contains("<ac:task-body>done</ac:task-body>"));
}

#[test]
fn test_checkbox_item_with_code_stays_a_list() {
    let storage =
        markdown_to_storage("- [ ] buy\n\n  ```\n  code here\n  ```\n- [x] done\n").unwrap();
    assert!(!storage.contains("<ac:task-list>"));
    assert!(storage.starts_with("<ul><li>[ ] "));
    assert!(storage.contains("<![CDATA[code here]]>"));
    assert!(storage.ends_with("<li>[x] done</li></ul>"));
}
