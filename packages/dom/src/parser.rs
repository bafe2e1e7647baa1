//! Markup fragment parser.
//!
//! Builds a detached node tree from a markup string. The reconciler walks
//! this tree against the live document; it is never attached directly.

use crate::document::{escape_attr, escape_text, is_void_element};
use crate::error::{ParseError, ParseResult};
use crate::tokenizer::{Token, Tokenizer};
use std::fmt::Write as _;

/// A node parsed out of a markup fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedNode {
    Element {
        tag: String,
        attrs: Vec<(String, String)>,
        children: Vec<ParsedNode>,
    },
    Text(String),
}

impl ParsedNode {
    pub fn tag(&self) -> Option<&str> {
        match self {
            ParsedNode::Element { tag, .. } => Some(tag.as_str()),
            ParsedNode::Text(_) => None,
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        match self {
            ParsedNode::Element { attrs, .. } => attrs
                .iter()
                .find(|(attr, _)| attr == name)
                .map(|(_, value)| value.as_str()),
            ParsedNode::Text(_) => None,
        }
    }

    pub fn children(&self) -> &[ParsedNode] {
        match self {
            ParsedNode::Element { children, .. } => children,
            ParsedNode::Text(_) => &[],
        }
    }

    pub fn is_element(&self) -> bool {
        matches!(self, ParsedNode::Element { .. })
    }

    /// Serialize this node back to markup (used to buffer subtrees that
    /// arrive for a locked element).
    pub fn to_markup(&self) -> String {
        let mut out = String::new();
        self.write_markup(&mut out);
        out
    }

    fn write_markup(&self, out: &mut String) {
        match self {
            ParsedNode::Text(text) => out.push_str(&escape_text(text)),
            ParsedNode::Element { tag, attrs, children } => {
                let _ = write!(out, "<{}", tag);
                for (name, value) in attrs {
                    let _ = write!(out, " {}=\"{}\"", name, escape_attr(value));
                }
                out.push('>');
                if is_void_element(tag) {
                    return;
                }
                for child in children {
                    child.write_markup(out);
                }
                let _ = write!(out, "</{}>", tag);
            }
        }
    }
}

/// Parse a markup fragment into its top-level nodes.
pub fn parse_fragment(src: &str) -> ParseResult<Vec<ParsedNode>> {
    let mut tokenizer = Tokenizer::new(src);

    // Stack of open elements; the bottom entry collects the fragment's
    // top-level nodes.
    let mut stack: Vec<(String, Vec<(String, String)>, Vec<ParsedNode>)> =
        vec![(String::new(), Vec::new(), Vec::new())];

    while let Some((token, pos)) = tokenizer.next_token()? {
        match token {
            Token::Text(text) => {
                if let Some(top) = stack.last_mut() {
                    top.2.push(ParsedNode::Text(text));
                }
            }
            Token::StartTag {
                name,
                attrs,
                self_closing,
            } => {
                if self_closing || is_void_element(&name) {
                    if let Some(top) = stack.last_mut() {
                        top.2.push(ParsedNode::Element {
                            tag: name,
                            attrs,
                            children: Vec::new(),
                        });
                    }
                } else {
                    stack.push((name, attrs, Vec::new()));
                }
            }
            Token::EndTag { name } => {
                if stack.len() == 1 {
                    return Err(ParseError::UnexpectedClose { pos, found: name });
                }
                let Some((tag, attrs, children)) = stack.pop() else {
                    return Err(ParseError::UnexpectedClose { pos, found: name });
                };
                if tag != name {
                    return Err(ParseError::MismatchedClose {
                        pos,
                        expected: tag,
                        found: name,
                    });
                }
                if let Some(top) = stack.last_mut() {
                    top.2.push(ParsedNode::Element {
                        tag,
                        attrs,
                        children,
                    });
                }
            }
        }
    }

    if stack.len() != 1 {
        let (tag, _, _) = stack.pop().unwrap_or_default();
        return Err(ParseError::MalformedTag {
            pos: tokenizer.pos(),
            detail: format!("<{}> is never closed", tag),
        });
    }
    Ok(stack.pop().map(|(_, _, nodes)| nodes).unwrap_or_default())
}
