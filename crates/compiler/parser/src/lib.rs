//! # Osiris Front End
//!
//! Lexer, syntax tree and recursive-descent parsers for Osiris goals and for the
//! shared story header. Parsing is total: every entry point returns a tree and
//! a list of diagnostics, never an error.

pub mod ast;
pub mod guid;
pub mod header;
pub mod lexer;
pub mod parser;
pub mod position;
mod tokens;

pub use ast::{Ast, Caller, CallerRole, Node, NodeId, NodeKind, NodeRange};
pub use header::{parse_header, HeaderGoal, HeaderSourceMap, ParsedHeader, SystemDeclaration};
pub use lexer::{Lexer, Token, TokenKind};
pub use parser::{parse_goal, ParsedGoal};
pub use position::{pack_position, unpack_position, LineIndex, PackedPosition};
