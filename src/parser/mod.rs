//! Parser for the VRML97 classic scene syntax subset

pub mod ast;
mod grammar;
pub mod lexer;

pub use ast::*;
pub use grammar::{parse, parse_value};
