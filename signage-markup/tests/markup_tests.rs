use pretty_assertions::assert_eq;
use signage_markup::{
    computed_styles, inline_style, parse_html, select_all, select_first, set_style_property,
    to_document_html, Document, MarkupError, NodeId,
};
use std::fs;
use std::path::PathBuf;

fn get_fixture_path(filename: &str) -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(filename);
    path
}

fn load_fixture(filename: &str) -> Document {
    let html = fs::read_to_string(get_fixture_path(filename)).unwrap();
    parse_html(&html)
}

fn first(doc: &Document, selector: &str) -> NodeId {
    select_first(doc, selector).unwrap().unwrap()
}

// Parsing

#[test]
fn test_full_document_structure() {
    let doc = load_fixture("promo-board.html");
    let html = doc.document_element().unwrap();
    assert_eq!(doc.attr(html, "lang"), Some("en"));

    let head = doc.head().unwrap();
    let head_tags: Vec<&str> = doc
        .element_children(head)
        .filter_map(|n| doc.tag_name(n))
        .collect();
    assert_eq!(head_tags, vec!["meta", "title", "style"]);
    assert_eq!(doc.text_content(first(&doc, "title")), "Promo & Deals");

    assert_eq!(select_all(&doc, "[data-editable]").unwrap().len(), 4);
    assert_eq!(select_all(&doc, "ul li").unwrap().len(), 2);
}

#[test]
fn test_unclosed_paragraph_is_closed_by_list() {
    let doc = load_fixture("promo-board.html");
    let p = first(&doc, "p");
    let ul = first(&doc, "ul");
    assert_eq!(doc.parent(p), doc.parent(ul));
    assert!(select_first(&doc, "p img").unwrap().is_some());
    assert!(doc.text_content(p).contains("off\u{a0}everything"));
}

#[test]
fn test_broken_markup_never_fails() {
    let doc = load_fixture("broken.html");
    let h2 = first(&doc, "h2");
    assert_eq!(doc.attr(h2, "class"), Some("title"));
    assert_eq!(select_all(&doc, "p").unwrap().len(), 2);

    let script = first(&doc, "script");
    assert_eq!(
        doc.text_content(script),
        "if (a < b && c > d) { run(); }"
    );
}

#[test]
fn test_serialization_is_a_fixed_point() {
    for fixture in ["promo-board.html", "broken.html"] {
        let doc = load_fixture(fixture);
        let once = to_document_html(&doc);
        let twice = to_document_html(&parse_html(&once));
        assert_eq!(once, twice, "{} should re-serialize identically", fixture);
        assert!(once.starts_with("<!DOCTYPE html>\n<html"));
    }
}

#[test]
fn test_empty_input_yields_empty_skeleton() {
    let doc = parse_html("");
    assert_eq!(
        to_document_html(&doc),
        "<!DOCTYPE html>\n<html><head></head><body></body></html>"
    );
}

// Styles

#[test]
fn test_stylesheet_cascade_through_fixture() {
    let doc = load_fixture("promo-board.html");
    let h1 = first(&doc, "h1");
    let styles = computed_styles(&doc, h1);
    // The @media and :hover rules are skipped.
    assert_eq!(styles["color"], "rgb(250, 250, 250)");
    assert_eq!(styles["fontSize"], "32px");

    let board = first(&doc, ".board");
    let styles = computed_styles(&doc, board);
    assert_eq!(styles["padding"], "24px");
    assert_eq!(styles["backgroundColor"], "rgb(17, 17, 17)");
    assert_eq!(styles["backgroundImage"], "url(\"bg/grid.png\")");
}

#[test]
fn test_set_style_property_then_compute() {
    let mut doc = parse_html(r#"<body><h1 data-editable="true">Title</h1></body>"#);
    let h1 = first(&doc, "h1");
    set_style_property(&mut doc, h1, "color", "#ff0000").unwrap();
    set_style_property(&mut doc, h1, "fontSize", "48px").unwrap();
    assert_eq!(doc.attr(h1, "style"), Some("color: #ff0000; font-size: 48px;"));

    let styles = computed_styles(&doc, h1);
    assert_eq!(styles["color"], "rgb(255, 0, 0)");
    assert_eq!(styles["fontSize"], "48px");
}

#[test]
fn test_rejected_values_leave_style_untouched() {
    let mut doc = parse_html(r#"<p style="color: blue">x</p>"#);
    let p = first(&doc, "p");
    let err = set_style_property(&mut doc, p, "color", "not-a-colour").unwrap_err();
    assert!(matches!(err, MarkupError::InvalidStyle { .. }));
    let err = set_style_property(&mut doc, p, "bogusProperty", "1").unwrap_err();
    assert!(matches!(err, MarkupError::UnknownProperty { .. }));
    assert_eq!(inline_style(&doc, p).get("color"), Some("blue"));
}

#[test]
fn test_removing_last_declaration_keeps_empty_attribute() {
    let mut doc = parse_html(r#"<p style="color: blue">x</p>"#);
    let p = first(&doc, "p");
    set_style_property(&mut doc, p, "color", "").unwrap();
    assert_eq!(doc.attr(p, "style"), Some(""));
}
