//! Syntax module for the host dialect
//!
//! This module provides the syntax tree, the token scanner, the PEG-based
//! parser, the printer and the traversal driver used by every later stage.

use serde::{Deserialize, Serialize};

pub mod ast;
pub mod parser;
pub mod printer;
pub mod scanner;
pub mod walk;

pub use ast::*;

/// Represents a byte span in the source code.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Span of nodes synthesized by the expansion engine.
    pub fn synthetic() -> Self {
        Self::default()
    }
}

/// Identity of one syntax node, unique within a compilation unit.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u32);

/// Allocator of fresh node ids for one compilation unit.
#[derive(Debug, Default, Clone)]
pub struct NodeIds {
    next: u32,
}

impl NodeIds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fresh(&mut self) -> NodeId {
        let id = NodeId(self.next);
        self.next += 1;
        id
    }
}
