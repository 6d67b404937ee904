//! Syntax tree helpers and Python string literal decoding

use std::iter::Peekable;
use std::str::Chars;

use tree_sitter::Node;

/// Named children of a node, skipping comments.
pub fn named_children(node: Node<'_>) -> Vec<Node<'_>> {
    let mut cursor = node.walk();
    let children: Vec<Node<'_>> = node
        .named_children(&mut cursor)
        .filter(|n| n.kind() != "comment")
        .collect();
    children
}

/// Source text covered by a node
pub fn text<'s>(node: Node<'_>, src: &'s str) -> &'s str {
    src.get(node.byte_range()).unwrap_or_default()
}

/// 1-based line of a node
pub fn line_of(node: Node<'_>) -> usize {
    node.start_position().row + 1
}

/// Literal string value of an expression node, if it is one.
///
/// Accepts single strings, implicit concatenation (`"a" "b"`) and
/// parenthesised literals. f-strings and bytes are not literals.
pub fn literal_str(node: Node<'_>, src: &str) -> Option<String> {
    match node.kind() {
        "string" => decode_string(text(node, src)),
        "concatenated_string" => {
            let parts = named_children(node)
                .into_iter()
                .map(|part| literal_str(part, src))
                .collect::<Option<Vec<_>>>()?;
            Some(parts.concat())
        }
        "parenthesized_expression" => match named_children(node).as_slice() {
            [inner] => literal_str(*inner, src),
            _ => None,
        },
        _ => None,
    }
}

/// Literal strings held by a tuple or list display, e.g. `("MIT", "Zlib")`
pub fn literal_str_seq(node: Node<'_>, src: &str) -> Option<Vec<String>> {
    match node.kind() {
        "tuple" | "list" => named_children(node)
            .into_iter()
            .map(|item| literal_str(item, src))
            .collect(),
        "parenthesized_expression" => match named_children(node).as_slice() {
            [inner] => literal_str_seq(*inner, src),
            _ => None,
        },
        _ => None,
    }
}

/// Decode the source text of one Python string token.
pub fn decode_string(token: &str) -> Option<String> {
    let quote_at = token.find(|c: char| c == '"' || c == '\'')?;
    let (prefix, quoted) = token.split_at(quote_at);
    let prefix = prefix.to_ascii_lowercase();
    if !prefix.chars().all(|c| matches!(c, 'r' | 'u')) {
        return None;
    }

    let body = ["\"\"\"", "'''", "\"", "'"]
        .iter()
        .find_map(|q| quoted.strip_prefix(q)?.strip_suffix(q))?;

    if prefix.contains('r') {
        Some(body.to_string())
    } else {
        Some(unescape(body))
    }
}

fn unescape(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            // line continuation
            Some('\n') => {}
            Some('\r') => {
                chars.next_if_eq(&'\n');
            }
            Some('\\') => out.push('\\'),
            Some('\'') => out.push('\''),
            Some('"') => out.push('"'),
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('a') => out.push('\u{07}'),
            Some('b') => out.push('\u{08}'),
            Some('f') => out.push('\u{0C}'),
            Some('v') => out.push('\u{0B}'),
            Some('x') => push_code_point(&mut out, &mut chars, 2, "\\x"),
            Some('u') => push_code_point(&mut out, &mut chars, 4, "\\u"),
            Some('U') => push_code_point(&mut out, &mut chars, 8, "\\U"),
            Some(first @ '0'..='7') => {
                let mut value = first.to_digit(8).unwrap_or(0);
                for _ in 0..2 {
                    match chars.next_if(|c| ('0'..='7').contains(c)) {
                        Some(digit) => value = value * 8 + digit.to_digit(8).unwrap_or(0),
                        None => break,
                    }
                }
                if let Some(ch) = char::from_u32(value) {
                    out.push(ch);
                }
            }
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }

    out
}

fn push_code_point(out: &mut String, chars: &mut Peekable<Chars<'_>>, width: usize, raw: &str) {
    let mut digits = String::with_capacity(width);
    while digits.len() < width {
        match chars.next_if(|c| c.is_ascii_hexdigit()) {
            Some(c) => digits.push(c),
            None => break,
        }
    }

    let decoded = (digits.len() == width)
        .then(|| u32::from_str_radix(&digits, 16).ok())
        .flatten()
        .and_then(char::from_u32);

    match decoded {
        Some(ch) => out.push(ch),
        None => {
            out.push_str(raw);
            out.push_str(&digits);
        }
    }
}
