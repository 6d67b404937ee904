//! Recognised statement shapes
//!
//! Every statement the extractor understands is first matched into a
//! [`Shape`]; metadata is only ever derived from shapes, never from raw
//! syntax nodes.

use std::fmt;

use tree_sitter::Node;

use crate::error::{ExtractError, Result};
use crate::syntax::{line_of, literal_str, literal_str_seq, named_children, text};

/// An argument or assigned value, classified by whether it is a literal
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Arg {
    /// A string literal (after escape decoding)
    Str(String),
    /// A tuple or list of string literals
    StrSeq(Vec<String>),
    /// Anything else, kept as source text for diagnostics
    Expr(String),
}

impl Arg {
    fn from_node(node: Node<'_>, src: &str) -> Self {
        if let Some(s) = literal_str(node, src) {
            Arg::Str(s)
        } else if let Some(seq) = literal_str_seq(node, src) {
            Arg::StrSeq(seq)
        } else {
            Arg::Expr(text(node, src).to_string())
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Arg::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arg::Str(s) => write!(f, "{:?}", s),
            Arg::StrSeq(seq) => write!(f, "{:?}", seq),
            Arg::Expr(expr) => f.write_str(expr),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shape {
    /// `target = value` directly in a class body
    Assignment {
        line: usize,
        target: String,
        value: Arg,
    },
    /// `self.cpp_info.set_property(property, value)`
    GlobalProperty {
        line: usize,
        property: Arg,
        value: Arg,
    },
    /// `self.cpp_info.components[component].set_property(property, value)`
    ComponentProperty {
        line: usize,
        component: Arg,
        property: Arg,
        value: Arg,
    },
}

impl Shape {
    /// Match a class-body statement of the form `name = value`.
    pub fn match_assignment(stmt: Node<'_>, src: &str) -> Option<Shape> {
        if stmt.kind() != "expression_statement" {
            return None;
        }
        let assignment = named_children(stmt)
            .into_iter()
            .next()
            .filter(|n| n.kind() == "assignment")?;

        let left = assignment
            .child_by_field_name("left")
            .filter(|n| n.kind() == "identifier")?;
        let right = assignment.child_by_field_name("right")?;

        Some(Shape::Assignment {
            line: line_of(stmt),
            target: text(left, src).to_string(),
            value: Arg::from_node(right, src),
        })
    }

    /// Match a `package_info` statement calling `set_property`.
    ///
    /// `Ok(None)` means the statement is not a property declaration. A call
    /// that reaches into `cpp_info.components` through a receiver we cannot
    /// follow is an error, so the caller can fall back to the engine.
    pub fn match_property_call(stmt: Node<'_>, src: &str) -> Result<Option<Shape>> {
        if stmt.kind() != "expression_statement" {
            return Ok(None);
        }
        let Some(call) = named_children(stmt)
            .into_iter()
            .next()
            .filter(|n| n.kind() == "call")
        else {
            return Ok(None);
        };
        let Some(function) = call
            .child_by_field_name("function")
            .filter(|f| f.kind() == "attribute")
        else {
            return Ok(None);
        };
        let calls_set_property = function
            .child_by_field_name("attribute")
            .is_some_and(|a| text(a, src) == "set_property");
        let Some(receiver) = function.child_by_field_name("object") else {
            return Ok(None);
        };
        if !calls_set_property {
            return Ok(None);
        }

        let line = line_of(stmt);
        let positional: Vec<Node<'_>> = call
            .child_by_field_name("arguments")
            .filter(|a| a.kind() == "argument_list")
            .map(named_children)
            .unwrap_or_default()
            .into_iter()
            .filter(|a| a.kind() != "keyword_argument")
            .collect();

        if is_attribute_chain(receiver, src, &["self", "cpp_info"]) {
            let [property, value] = positional.as_slice() else {
                return Ok(None);
            };
            return Ok(Some(Shape::GlobalProperty {
                line,
                property: Arg::from_node(*property, src),
                value: Arg::from_node(*value, src),
            }));
        }

        if let Some(component) = component_key(receiver, src) {
            let [property, value] = positional.as_slice() else {
                return Ok(None);
            };
            return Ok(Some(Shape::ComponentProperty {
                line,
                component: Arg::from_node(component, src),
                property: Arg::from_node(*property, src),
                value: Arg::from_node(*value, src),
            }));
        }

        if text(receiver, src).contains("cpp_info.components") {
            return Err(ExtractError::UnrecognizedShape {
                line,
                snippet: text(stmt, src).trim().to_string(),
            });
        }

        Ok(None)
    }
}

/// Whether `node` is exactly the dotted chain, e.g. `self.cpp_info`
fn is_attribute_chain(node: Node<'_>, src: &str, chain: &[&str]) -> bool {
    match chain.split_last() {
        Some((last, [])) => node.kind() == "identifier" && text(node, src) == *last,
        Some((last, rest)) => {
            node.kind() == "attribute"
                && node
                    .child_by_field_name("attribute")
                    .is_some_and(|a| text(a, src) == *last)
                && node
                    .child_by_field_name("object")
                    .is_some_and(|o| is_attribute_chain(o, src, rest))
        }
        None => false,
    }
}

/// Whether `node` ends with the dotted suffix, whatever its base
fn has_attribute_suffix(node: Node<'_>, src: &str, suffix: &[&str]) -> bool {
    let Some((last, rest)) = suffix.split_last() else {
        return true;
    };
    node.kind() == "attribute"
        && node
            .child_by_field_name("attribute")
            .is_some_and(|a| text(a, src) == *last)
        && node
            .child_by_field_name("object")
            .is_some_and(|o| has_attribute_suffix(o, src, rest))
}

/// The key node of `<...>.cpp_info.components[key]`
fn component_key<'t>(node: Node<'t>, src: &str) -> Option<Node<'t>> {
    if node.kind() != "subscript" {
        return None;
    }
    let value = node.child_by_field_name("value")?;
    if !has_attribute_suffix(value, src, &["cpp_info", "components"]) {
        return None;
    }

    let mut cursor = node.walk();
    let keys: Vec<Node<'t>> = node
        .children_by_field_name("subscript", &mut cursor)
        .collect();
    match keys.as_slice() {
        [key] => Some(*key),
        _ => None,
    }
}
