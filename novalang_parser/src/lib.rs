//! novalang_parser
//!
//! Lexer and Pratt parser for NovaLang, producing an arena-allocated AST
//! (§3.3). String interpolation is handled as a sub-lexer so the parser
//! sees `"...${expr}..."` segments as ordinary tokens (§4.1).
//!
//! # Example
//!
//! ```
//! use novalang_parser::parse;
//!
//! let (program, errors) = parse("fun main() { println(1 + 2) }");
//! assert!(errors.is_empty());
//! assert_eq!(program.declarations.len(), 1);
//! ```

pub mod ast;
pub mod error;
pub mod lexer;
pub mod modifiers;
pub mod parser;
pub mod span;
pub mod token;

// Re-exports
pub use ast::{Declaration, Program};
pub use error::{LexicalError, ParseError, ParseErrors, ParseResult};
pub use lexer::{Lexer, LiteralPayload, SpannedToken};
pub use modifiers::{Modifier, ModifierSet};
pub use parser::Parser;
pub use span::{FileId, SourceMap, Span};
pub use token::{Associativity, Precedence, Token};

/// `parse_program` (§4.2, §6.3 `compile_file`'s first stage): parse a whole
/// file, recovering from errors at sync points and returning a best-effort
/// AST alongside every diagnostic collected along the way.
pub fn parse(source: &str) -> (Program, ParseErrors) {
    parser::parse(source)
}

/// `parse_repl_input` (§4.2, §6.3): parse a single top-level construct or
/// expression. Never recovers from an error; returns `Ok(None)` for blank
/// input.
pub fn parse_repl_input(source: &str) -> ParseResult<Option<Declaration>> {
    Parser::new(source).parse_repl_input()
}

/// Tokenize NovaLang source code, exposing every lexical error rather than
/// stopping at the first one (§8.1: lexer totality).
pub fn tokenize(source: &str) -> Vec<Result<SpannedToken<'_>, LexicalError>> {
    lexer::tokenize(source)
}

/// Get version information.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_program() {
        let (program, errors) = parse("fun main() { println(1) }");
        assert!(errors.is_empty(), "{:?}", errors.errors());
        assert_eq!(program.declarations.len(), 1);
    }

    #[test]
    fn tokenizes_without_panicking_on_empty_input() {
        assert!(tokenize("").is_empty());
    }

    #[test]
    fn repl_input_parses_single_expression() {
        let decl = parse_repl_input("1 + 2").unwrap();
        assert!(decl.is_some());
    }

    #[test]
    fn version_is_nonempty() {
        assert!(!version().is_empty());
    }
}
