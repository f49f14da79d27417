//! Minimal wikitext parser
//!
//! Recognises just enough markup for macro-driven pages:
//!
//! - `<<name param name:value "quoted" [[bracketed]] {{nested call}}>>`
//! - `''bold''` and `//italic//`
//! - line breaks
//!
//! Everything else is literal text. Unterminated markup is literal text too.

use super::Parser;
use crate::tree::{Attributes, MacroCall, Node, Param, ParamValue, ParseTree};

#[derive(Debug, Clone, Copy, Default)]
pub struct WikiTextParser;

impl Parser for WikiTextParser {
    fn parse(&self, text: &str) -> ParseTree {
        ParseTree::new(parse_inline(text))
    }
}

fn parse_inline(text: &str) -> Vec<Node> {
    let mut nodes = Vec::new();
    let mut plain = String::new();
    let mut rest = text;

    while let Some(c) = rest.chars().next() {
        if rest.starts_with("<<") {
            if let Some((call, after)) = parse_macro_call(rest) {
                flush_text(&mut plain, &mut nodes);
                nodes.push(Node::Macro(call.into()));
                rest = after;
                continue;
            }
        } else if let Some((tag, inner, after)) = delimited(rest, "''", "strong")
            .or_else(|| delimited(rest, "//", "em"))
        {
            flush_text(&mut plain, &mut nodes);
            nodes.push(Node::element(tag, Attributes::new(), parse_inline(inner)));
            rest = after;
            continue;
        } else if c == '\n' {
            flush_text(&mut plain, &mut nodes);
            nodes.push(Node::element("br", Attributes::new(), vec![]));
            rest = &rest[1..];
            continue;
        }

        plain.push(c);
        rest = &rest[c.len_utf8()..];
    }

    flush_text(&mut plain, &mut nodes);
    nodes
}

fn flush_text(plain: &mut String, nodes: &mut Vec<Node>) {
    if !plain.is_empty() {
        nodes.push(Node::text(std::mem::take(plain)));
    }
}

fn delimited<'a>(
    input: &'a str,
    marker: &str,
    tag: &'static str,
) -> Option<(&'static str, &'a str, &'a str)> {
    let body = input.strip_prefix(marker)?;
    let end = body.find(marker)?;
    Some((tag, &body[..end], &body[end + marker.len()..]))
}

/// Parse `<<name params>>` at the start of `input`
fn parse_macro_call(input: &str) -> Option<(MacroCall, &str)> {
    let body = input.strip_prefix("<<")?;
    let end = find_closing(body, ">>")?;
    let call = parse_call_body(&body[..end])?;
    Some((call, &body[end + 2..]))
}

fn parse_call_body(body: &str) -> Option<MacroCall> {
    let body = body.trim();
    let name_end = body.find(char::is_whitespace).unwrap_or(body.len());
    let name = &body[..name_end];
    if name.is_empty() {
        return None;
    }
    Some(MacroCall::new(name, parse_params(&body[name_end..])))
}

/// Find `close`, skipping over quoted, bracketed and nested-call values
fn find_closing(s: &str, close: &str) -> Option<usize> {
    let mut i = 0;
    while i < s.len() {
        let rest = &s[i..];
        if rest.starts_with(close) {
            return Some(i);
        }
        let skip = if let Some(quoted) = rest.strip_prefix('"') {
            quoted.find('"').map(|n| n + 2)
        } else if rest.starts_with("[[") {
            rest.find("]]").map(|n| n + 2)
        } else if rest.starts_with("{{") {
            rest.find("}}").map(|n| n + 2)
        } else {
            None
        };
        i += skip.unwrap_or_else(|| rest.chars().next().map_or(1, char::len_utf8));
    }
    None
}

/// Parse a macro parameter string
pub fn parse_params(input: &str) -> Vec<Param> {
    let mut params = Vec::new();
    let mut rest = input.trim_start();

    while !rest.is_empty() {
        let (name, after_name) = match split_name(rest) {
            Some((name, after)) => (Some(name.to_string()), after),
            None => (None, rest),
        };
        let (value, after) = parse_value(after_name);
        params.push(Param { name, value });
        rest = after.trim_start();
    }

    params
}

fn split_name(input: &str) -> Option<(&str, &str)> {
    let end = input
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_' || c == '-'))
        .unwrap_or(input.len());
    if end == 0 {
        return None;
    }
    let after = input[end..].strip_prefix(':')?;
    Some((&input[..end], after))
}

fn parse_value(input: &str) -> (ParamValue, &str) {
    if let Some(quoted) = input.strip_prefix('"') {
        return match quoted.find('"') {
            Some(end) => (ParamValue::Literal(quoted[..end].to_string()), &quoted[end + 1..]),
            None => (ParamValue::Literal(quoted.to_string()), ""),
        };
    }

    if let Some(bracketed) = input.strip_prefix("[[") {
        return match bracketed.find("]]") {
            Some(end) => (ParamValue::Literal(bracketed[..end].to_string()), &bracketed[end + 2..]),
            None => (ParamValue::Literal(bracketed.to_string()), ""),
        };
    }

    if let Some(nested) = input.strip_prefix("{{") {
        let (body, after) = match nested.find("}}") {
            Some(end) => (&nested[..end], &nested[end + 2..]),
            None => (nested, ""),
        };
        return match parse_call_body(body) {
            Some(call) => (ParamValue::Call(call), after),
            None => (ParamValue::Literal(String::new()), after),
        };
    }

    let end = input.find(char::is_whitespace).unwrap_or(input.len());
    (ParamValue::Literal(input[..end].to_string()), &input[end..])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::render_text;

    fn parse(text: &str) -> Vec<Node> {
        WikiTextParser.parse(text).nodes
    }

    #[test]
    fn test_plain_text() {
        assert_eq!(parse("Just text"), vec![Node::text("Just text")]);
    }

    #[test]
    fn test_bold_and_italic() {
        let nodes = parse("a ''b //c//'' d");

        assert_eq!(nodes.len(), 3);
        let strong = nodes[1].as_element().unwrap();
        assert_eq!(strong.tag, "strong");
        assert_eq!(strong.children[1].as_element().unwrap().tag, "em");
        assert_eq!(render_text(&nodes), "a b c d");
    }

    #[test]
    fn test_unterminated_markup_is_literal() {
        assert_eq!(parse("''open <<macro"), vec![Node::text("''open <<macro")]);
    }

    #[test]
    fn test_line_breaks() {
        let nodes = parse("one\ntwo");
        assert_eq!(nodes[1].as_element().unwrap().tag, "br");
        assert_eq!(render_text(&nodes), "one\ntwo");
    }

    #[test]
    fn test_macro_call_params() {
        let nodes = parse("<<tiddler Foo template:[[My Template]] with:\"a >> b\">>!");

        let mac = nodes[0].as_macro().unwrap();
        assert_eq!(mac.name, "tiddler");
        assert_eq!(
            mac.params,
            vec![
                Param::positional("Foo"),
                Param::named("template", "My Template"),
                Param::named("with", "a >> b"),
            ]
        );
        assert_eq!(nodes[1], Node::text("!"));
    }

    #[test]
    fn test_nested_call_param() {
        let nodes = parse("<<tiddler {{echo Target}}>>");
        let mac = nodes[0].as_macro().unwrap();

        assert_eq!(
            mac.params,
            vec![Param::call(
                None,
                MacroCall::new("echo", vec![Param::positional("Target")])
            )]
        );
    }

    #[test]
    fn test_empty_macro_is_literal() {
        assert_eq!(parse("<< >>"), vec![Node::text("<< >>")]);
    }

    #[test]
    fn test_parse_params_bare_values() {
        let params = parse_params("  one two:2  three ");
        assert_eq!(
            params,
            vec![
                Param::positional("one"),
                Param::named("two", "2"),
                Param::positional("three"),
            ]
        );
    }
}
