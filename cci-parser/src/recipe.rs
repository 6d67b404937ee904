//! Recipe source parsing and metadata scraping

use indexmap::IndexMap;
use serde::Serialize;
use tree_sitter::{Node, Parser, Tree};

use crate::error::{ExtractError, Result};
use crate::shape::{Arg, Shape};
use crate::syntax::{line_of, named_children, text};

/// Base class every recipe derives from
pub const RECIPE_BASE_CLASS: &str = "ConanFile";
/// Method holding the property declarations
pub const PACKAGE_INFO_METHOD: &str = "package_info";
pub const CMAKE_FILE_NAME: &str = "cmake_file_name";
pub const CMAKE_TARGET_NAME: &str = "cmake_target_name";
/// Components and scopes starting with this are internal to the recipe
pub const INTERNAL_PREFIX: char = '_';

/// Collapse a description to a single line.
///
/// Newlines and runs of whitespace become one space; ends are trimmed.
/// Words on both sides of a line break stay separated, so `"does\n  many"`
/// reads `"does many"` rather than gluing into `"doesmany"` the way plain
/// newline deletion would.
pub fn normalize_description(description: &str) -> String {
    description.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Description and license as declared by the recipe class
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BasicInfo {
    pub description: String,
    pub license: Vec<String>,
}

/// Build-system properties declared in `package_info`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RecipeProperties {
    #[serde(flatten)]
    pub global: IndexMap<String, String>,

    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub components: IndexMap<String, IndexMap<String, String>>,
}

impl RecipeProperties {
    pub fn is_empty(&self) -> bool {
        self.global.is_empty() && self.components.is_empty()
    }

    fn apply(&mut self, shape: Shape) -> Result<()> {
        match shape {
            Shape::GlobalProperty {
                line,
                property,
                value,
            } => {
                let Some(name) = property.as_str() else {
                    return Err(ExtractError::UnrecognizedShape {
                        line,
                        snippet: format!("self.cpp_info.set_property({}, {})", property, value),
                    });
                };
                if name != CMAKE_FILE_NAME && name != CMAKE_TARGET_NAME {
                    return Ok(());
                }
                match value {
                    Arg::Str(value) => {
                        self.global.insert(name.to_string(), value);
                        Ok(())
                    }
                    other => Err(ExtractError::NonLiteral {
                        property: name.to_string(),
                        expr: other.to_string(),
                        line,
                    }),
                }
            }
            Shape::ComponentProperty {
                line,
                component,
                property,
                value,
            } => {
                if property.as_str() != Some(CMAKE_TARGET_NAME) {
                    return Ok(());
                }
                // A computed component key or target is an error, not a
                // silent skip: the package goes on to install-based
                // resolution instead of losing the component.
                let component = match component {
                    Arg::Str(component) => component,
                    other => {
                        return Err(ExtractError::NonLiteral {
                            property: format!("components[{}].{}", other, CMAKE_TARGET_NAME),
                            expr: other.to_string(),
                            line,
                        })
                    }
                };
                if component.starts_with(INTERNAL_PREFIX) {
                    return Ok(());
                }
                match value {
                    Arg::Str(value) => {
                        self.components
                            .entry(component)
                            .or_default()
                            .insert(CMAKE_TARGET_NAME.to_string(), value);
                        Ok(())
                    }
                    other => Err(ExtractError::NonLiteral {
                        property: format!("components[{:?}].{}", component, CMAKE_TARGET_NAME),
                        expr: other.to_string(),
                        line,
                    }),
                }
            }
            Shape::Assignment { .. } => Ok(()),
        }
    }
}

/// A recipe parsed into a syntax tree, ready to be scraped
pub struct RecipeSource {
    text: String,
    tree: Tree,
}

impl RecipeSource {
    /// Parse recipe text. Syntax errors do not fail here; the tree keeps
    /// error nodes and [`RecipeSource::properties`] refuses to read it.
    pub fn parse(text: impl Into<String>) -> Result<Self> {
        let text = text.into();
        let mut parser = Parser::new();
        parser.set_language(&tree_sitter_python::LANGUAGE.into())?;
        let tree = parser
            .parse(&text, None)
            .ok_or_else(|| ExtractError::Parse("parser produced no syntax tree".to_string()))?;
        Ok(Self { text, tree })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn has_syntax_errors(&self) -> bool {
        self.tree.root_node().has_error()
    }

    /// Scrape literal `description` and `license` class attributes.
    ///
    /// Best-effort: works on trees with syntax errors and defaults to empty
    /// values. When several classes declare them the last one wins.
    pub fn basic_info(&self) -> BasicInfo {
        let mut info = BasicInfo::default();

        for class in self.classes() {
            for stmt in class_body(class) {
                let Some(Shape::Assignment { target, value, .. }) =
                    Shape::match_assignment(stmt, &self.text)
                else {
                    continue;
                };
                match (target.as_str(), value) {
                    ("description", Arg::Str(description)) => {
                        info.description = normalize_description(&description);
                    }
                    // An empty license string means "no license declared"
                    // and reads as `[]`, never `[""]`.
                    ("license", Arg::Str(license)) => {
                        info.license = if license.is_empty() {
                            Vec::new()
                        } else {
                            vec![license]
                        };
                    }
                    ("license", Arg::StrSeq(licenses)) => info.license = licenses,
                    _ => {}
                }
            }
        }

        info
    }

    /// Scrape `set_property` declarations from `package_info` of every
    /// class deriving from `ConanFile`.
    ///
    /// An empty result is a success: the recipe simply declares nothing.
    pub fn properties(&self) -> Result<RecipeProperties> {
        if let Some(bad) = first_error(self.tree.root_node()) {
            return Err(ExtractError::Parse(format!(
                "syntax error at line {}: {}",
                line_of(bad),
                text(bad, &self.text).lines().next().unwrap_or_default().trim()
            )));
        }

        let mut properties = RecipeProperties::default();
        for class in self
            .classes()
            .into_iter()
            .filter(|c| derives_from(*c, &self.text, RECIPE_BASE_CLASS))
        {
            for method in methods(class, &self.text, PACKAGE_INFO_METHOD) {
                let Some(body) = method.child_by_field_name("body") else {
                    continue;
                };
                for stmt in named_children(body) {
                    if let Some(shape) = Shape::match_property_call(stmt, &self.text)? {
                        properties.apply(shape)?;
                    }
                }
            }
        }

        Ok(properties)
    }

    fn classes(&self) -> Vec<Node<'_>> {
        let mut classes = Vec::new();
        collect_classes(self.tree.root_node(), &mut classes);
        classes
    }
}

fn collect_classes<'t>(node: Node<'t>, out: &mut Vec<Node<'t>>) {
    if node.kind() == "class_definition" {
        out.push(node);
    }
    for child in named_children(node) {
        collect_classes(child, out);
    }
}

fn class_body(class: Node<'_>) -> Vec<Node<'_>> {
    class
        .child_by_field_name("body")
        .map(named_children)
        .unwrap_or_default()
}

fn derives_from(class: Node<'_>, src: &str, base: &str) -> bool {
    let Some(bases) = class.child_by_field_name("superclasses") else {
        return false;
    };
    named_children(bases).into_iter().any(|b| match b.kind() {
        "identifier" => text(b, src) == base,
        "attribute" => b
            .child_by_field_name("attribute")
            .is_some_and(|a| text(a, src) == base),
        _ => false,
    })
}

fn methods<'t>(class: Node<'t>, src: &str, name: &str) -> Vec<Node<'t>> {
    class_body(class)
        .into_iter()
        .filter_map(|stmt| match stmt.kind() {
            "function_definition" => Some(stmt),
            "decorated_definition" => stmt
                .child_by_field_name("definition")
                .filter(|d| d.kind() == "function_definition"),
            _ => None,
        })
        .filter(|f| {
            f.child_by_field_name("name")
                .is_some_and(|n| text(n, src) == name)
        })
        .collect()
}

fn first_error(node: Node<'_>) -> Option<Node<'_>> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    if !node.has_error() {
        return None;
    }
    let mut cursor = node.walk();
    let children: Vec<Node<'_>> = node.children(&mut cursor).collect();
    children.into_iter().find_map(first_error)
}
