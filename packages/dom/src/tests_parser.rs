//! Fragment parser coverage.

use crate::error::ParseError;
use crate::parser::{parse_fragment, ParsedNode};

#[test]
fn test_nested_structure() {
    let nodes = parse_fragment("<div id=\"a\"><span>one</span>two</div>").unwrap();
    assert_eq!(nodes.len(), 1);
    let div = &nodes[0];
    assert_eq!(div.tag(), Some("div"));
    assert_eq!(div.attr("id"), Some("a"));
    assert_eq!(div.children().len(), 2);
    assert_eq!(div.children()[0].tag(), Some("span"));
    assert_eq!(div.children()[1], ParsedNode::Text("two".into()));
}

#[test]
fn test_multiple_top_level_nodes() {
    let nodes = parse_fragment("<p>a</p><p>b</p>trailing").unwrap();
    assert_eq!(nodes.len(), 3);
}

#[test]
fn test_void_elements_do_not_nest() {
    let nodes = parse_fragment("<div><input value=\"x\"><br>text</div>").unwrap();
    let div = &nodes[0];
    assert_eq!(div.children().len(), 3);
    assert_eq!(div.children()[0].tag(), Some("input"));
    assert_eq!(div.children()[1].tag(), Some("br"));
}

#[test]
fn test_self_closing_tag() {
    let nodes = parse_fragment("<div><svg/></div>").unwrap();
    assert_eq!(nodes[0].children()[0].tag(), Some("svg"));
}

#[test]
fn test_mismatched_close_is_fatal() {
    let err = parse_fragment("<div><span></div></span>").unwrap_err();
    assert!(matches!(err, ParseError::MismatchedClose { expected, found, .. }
        if expected == "span" && found == "div"));
}

#[test]
fn test_unexpected_close_is_fatal() {
    let err = parse_fragment("</div>").unwrap_err();
    assert!(matches!(err, ParseError::UnexpectedClose { found, .. } if found == "div"));
}

#[test]
fn test_unclosed_element_is_fatal() {
    let err = parse_fragment("<div><p>text").unwrap_err();
    assert!(matches!(err, ParseError::MalformedTag { .. }));
}

#[test]
fn test_markup_round_trip() {
    let source = "<ul data-key=\"x\"><li>a &amp; b</li><li><input value=\"q\"></li></ul>";
    let nodes = parse_fragment(source).unwrap();
    assert_eq!(nodes[0].to_markup(), source);
}

#[test]
fn test_entities_in_attribute_values() {
    let nodes = parse_fragment("<a title=\"a &quot;b&quot;\"></a>").unwrap();
    assert_eq!(nodes[0].attr("title"), Some("a \"b\""));
}
