//! cci-parser: Static metadata extraction for ConanCenter recipes
//!
//! Recipes are parsed with the tree-sitter Python grammar and never executed.
//! Only a small vocabulary of statements is recognised:
//! - literal `description` / `license` class attributes
//! - `self.cpp_info.set_property(...)` calls in `package_info`
//! - `self.cpp_info.components[...].set_property(...)` calls in `package_info`

pub mod error;
pub mod recipe;
pub mod shape;
pub mod syntax;

pub use error::{ExtractError, Result};
pub use recipe::{normalize_description, BasicInfo, RecipeProperties, RecipeSource};
pub use shape::{Arg, Shape};
