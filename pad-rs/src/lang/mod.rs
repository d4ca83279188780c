//! The Pad language core.
//!
//! Source text flows through [`lexer`] → [`parser`] → [`eval`]:
//!
//! ```text
//! "{@ a = 1 @}{: a :}"  --tokenize-->  [CodeOpen, Ident, Assign, ...]
//!                       --compile--->  Program { stmts }
//!                       --run------->  Context.stdout_buf == "1"
//! ```

pub mod ast;
pub mod builtins;
pub mod context;
pub mod error;
pub mod eval;
pub mod import;
mod inherit;
pub mod lexer;
pub mod methods;
pub mod opts;
pub mod parser;
pub mod token;
pub mod value;

pub use context::{Context, LineEncoding};
pub use error::{Error, ErrorKind, Result};
pub use eval::Interpreter;
pub use import::Importer;
pub use value::Value;
