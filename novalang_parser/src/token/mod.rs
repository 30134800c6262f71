//! Token definitions for the NovaLang lexer.

mod precedence;

use logos::Logos;

pub use precedence::{Associativity, Precedence};

/// NovaLang's closed set of lexical tokens.
///
/// String literals with interpolation do not appear as a single token:
/// the lexer expands `"...${expr}..."` into a bracketed sub-stream of
/// `StringStart`, `StringPart`, `InterpStart`, the interpolated expression's
/// own tokens, `InterpEnd`, ... `StringEnd` (§1, §4.1) so the parser can
/// treat interpolated segments as ordinary expressions.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\f]+")]
pub enum Token {
    // ==================== Keywords ====================
    #[token("val")]
    KwVal,
    #[token("var")]
    KwVar,
    #[token("fun")]
    KwFun,
    #[token("class")]
    KwClass,
    #[token("interface")]
    KwInterface,
    #[token("object")]
    KwObject,
    #[token("enum")]
    KwEnum,
    #[token("when")]
    KwWhen,
    #[token("if")]
    KwIf,
    #[token("else")]
    KwElse,
    #[token("for")]
    KwFor,
    #[token("while")]
    KwWhile,
    #[token("do")]
    KwDo,
    #[token("return")]
    KwReturn,
    #[token("break")]
    KwBreak,
    #[token("continue")]
    KwContinue,
    #[token("throw")]
    KwThrow,
    #[token("try")]
    KwTry,
    #[token("catch")]
    KwCatch,
    #[token("finally")]
    KwFinally,
    #[token("import")]
    KwImport,
    #[token("static")]
    KwStatic,
    #[token("public")]
    KwPublic,
    #[token("private")]
    KwPrivate,
    #[token("protected")]
    KwProtected,
    #[token("internal")]
    KwInternal,
    #[token("abstract")]
    KwAbstract,
    #[token("open")]
    KwOpen,
    #[token("final")]
    KwFinal,
    #[token("override")]
    KwOverride,
    #[token("inline")]
    KwInline,
    #[token("is")]
    KwIs,
    #[token("as")]
    KwAs,
    #[token("in")]
    KwIn,
    #[token("out")]
    KwOut,
    #[token("by")]
    KwBy,
    #[token("init")]
    KwInit,
    #[token("this")]
    KwThis,
    #[token("super")]
    KwSuper,
    #[token("true")]
    True,
    #[token("false")]
    False,
    #[token("null")]
    Null,
    #[token("Unit")]
    KwUnit,
    #[token("Nothing")]
    KwNothing,
    #[token("use")]
    KwUse,

    // ==================== Delimiters ====================
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    // `#{` opens a collection literal (set/map disambiguation, §4.2).
    #[token("#{")]
    HashBrace,

    // ==================== Punctuation ====================
    #[token(",")]
    Comma,
    #[token(";")]
    Semicolon,
    #[token("::")]
    DoubleColon,
    #[token(":")]
    Colon,
    #[token(".")]
    Dot,
    #[token("?.")]
    SafeDot,
    #[token("?:")]
    Elvis,
    #[token("!!")]
    NotNullAssert,
    #[token("@")]
    At,
    #[token("$")]
    Dollar,
    #[token("?")]
    Question,
    #[token("->")]
    Arrow,
    #[token("=>")]
    FatArrow,

    // ==================== Assignment ====================
    #[token("=")]
    Eq,
    #[token("+=")]
    PlusEq,
    #[token("-=")]
    MinusEq,
    #[token("*=")]
    StarEq,
    #[token("/=")]
    SlashEq,
    #[token("%=")]
    PercentEq,

    // ==================== Comparison ====================
    #[token("==")]
    EqEq,
    #[token("!=")]
    NotEq,
    #[token("===")]
    RefEq,
    #[token("!==")]
    NotRefEq,
    #[token("<")]
    Lt,
    #[token("<=")]
    LtEq,
    #[token(">")]
    Gt,
    #[token(">=")]
    GtEq,

    // ==================== Logical ====================
    #[token("&&")]
    AndAnd,
    #[token("||")]
    OrOr,
    #[token("!")]
    Not,

    // ==================== Bitwise (named, not symbolic) ====================
    #[token("and")]
    KwAnd,
    #[token("or")]
    KwOr,
    #[token("xor")]
    KwXor,
    #[token("shl")]
    KwShl,
    #[token("shr")]
    KwShr,

    // ==================== Range ====================
    #[token("..<")]
    DotDotLt,
    #[token("..")]
    DotDot,

    // ==================== Arithmetic ====================
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,

    // ==================== Newline ====================
    // Newlines are not significant except inside property-accessor context
    // (§4.2); the parser decides when to treat one as a statement separator.
    #[regex(r"\r?\n")]
    Newline,

    // ==================== Comments ====================
    #[regex(r"//[^\n]*")]
    LineComment,
    #[token("/*", priority = 3)]
    BlockCommentStart,

    // ==================== Numeric literals ====================
    #[regex(r"0[xX][0-9a-fA-F]([0-9a-fA-F]|_[0-9a-fA-F])*[Ll]?")]
    HexLiteral,
    #[regex(r"0[bB][01]([01]|_[01])*[Ll]?")]
    BinaryLiteral,
    #[regex(r"[0-9]([0-9]|_[0-9])*[Ll]?")]
    DecimalLiteral,
    #[regex(r"[0-9]([0-9]|_[0-9])*\.[0-9]([0-9]|_[0-9])*([eE][+-]?[0-9]+)?[fF]?")]
    FloatLiteral,
    #[regex(r"[0-9]([0-9]|_[0-9])*[eE][+-]?[0-9]+[fF]?")]
    FloatExponent,

    // ==================== String/char literals ====================
    // Scanned manually by the lexer once the opening quote is seen (see
    // `lexer.rs`); these tokens mark the raw delimiter so the outer logos
    // scan can hand off control.
    #[token("\"")]
    DoubleQuote,
    #[token("\"\"\"")]
    TripleDoubleQuote,
    #[regex(r"'([^'\\]|\\.)'")]
    CharLiteral,

    // Emitted only by the manual string scan, never by `Token::lexer` directly.
    StringPart,
    InterpStart,
    InterpEnd,
    StringEnd,

    // ==================== Identifiers ====================
    #[regex(r"[\p{XID_Start}_][\p{XID_Continue}]*")]
    Identifier,

    Error,
}

impl Token {
    pub fn is_keyword(&self) -> bool {
        matches!(
            self,
            Token::KwVal
                | Token::KwVar
                | Token::KwFun
                | Token::KwClass
                | Token::KwInterface
                | Token::KwObject
                | Token::KwEnum
                | Token::KwWhen
                | Token::KwIf
                | Token::KwElse
                | Token::KwFor
                | Token::KwWhile
                | Token::KwDo
                | Token::KwReturn
                | Token::KwBreak
                | Token::KwContinue
                | Token::KwThrow
                | Token::KwTry
                | Token::KwCatch
                | Token::KwFinally
                | Token::KwImport
                | Token::KwStatic
                | Token::KwPublic
                | Token::KwPrivate
                | Token::KwProtected
                | Token::KwInternal
                | Token::KwAbstract
                | Token::KwOpen
                | Token::KwFinal
                | Token::KwOverride
                | Token::KwInline
                | Token::KwIs
                | Token::KwAs
                | Token::KwIn
                | Token::KwOut
                | Token::KwBy
                | Token::KwInit
                | Token::KwThis
                | Token::KwSuper
                | Token::True
                | Token::False
                | Token::Null
                | Token::KwUnit
                | Token::KwNothing
                | Token::KwUse
        )
    }

    /// Visibility modifiers form one exclusivity group (§4.2).
    pub fn is_visibility_modifier(&self) -> bool {
        matches!(
            self,
            Token::KwPublic | Token::KwPrivate | Token::KwProtected | Token::KwInternal
        )
    }

    /// Inheritance modifiers form another exclusivity group (§4.2).
    pub fn is_inheritance_modifier(&self) -> bool {
        matches!(self, Token::KwAbstract | Token::KwOpen | Token::KwFinal)
    }

    pub fn is_modifier(&self) -> bool {
        self.is_visibility_modifier()
            || self.is_inheritance_modifier()
            || matches!(
                self,
                Token::KwOverride | Token::KwInline | Token::KwStatic
            )
    }

    pub fn is_literal(&self) -> bool {
        matches!(
            self,
            Token::True
                | Token::False
                | Token::Null
                | Token::HexLiteral
                | Token::BinaryLiteral
                | Token::DecimalLiteral
                | Token::FloatLiteral
                | Token::FloatExponent
                | Token::CharLiteral
        )
    }
}
