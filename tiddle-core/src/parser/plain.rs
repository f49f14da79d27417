//! Plain-text parser: the fallback for every unknown content type.

use super::Parser;
use crate::tree::{Attributes, Node, ParseTree};

/// Wraps the raw text in a single `pre` element, interpreting nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextParser;

impl Parser for PlainTextParser {
    fn parse(&self, text: &str) -> ParseTree {
        ParseTree::new(vec![Node::element(
            "pre",
            Attributes::new(),
            vec![Node::text(text)],
        )])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_is_verbatim() {
        let tree = PlainTextParser.parse("''not bold''");
        let pre = tree.nodes[0].as_element().unwrap();

        assert_eq!(pre.tag, "pre");
        assert_eq!(pre.children, vec![Node::text("''not bold''")]);
    }
}
