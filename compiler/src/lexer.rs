// Lexer for the textual IR.
//
// Tokenizes the MLIR generic-form subset accepted by the parser. Uses the
// `logos` crate for DFA-based lexing. `tensor<...>` types are lexed as a
// single token since their body (`2x?xf32`) does not split into ordinary
// tokens.
//
// Preconditions: input is valid UTF-8.
// Postconditions: returns all tokens with byte-offset spans, plus any lex errors.
// Failure modes: unrecognized input produces `LexError`; lexing continues.
// Side effects: none.

use logos::Logos;
use std::fmt;

use crate::types::TensorType;

/// Byte-offset span in source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

/// A lexer error with location.
#[derive(Debug, Clone, PartialEq)]
pub struct LexError {
    pub span: Span,
    pub message: String,
}

/// Result of lexing: tokens plus any errors (non-fatal).
#[derive(Debug)]
pub struct LexResult {
    pub tokens: Vec<(Token, Span)>,
    pub errors: Vec<LexError>,
}

/// IR token types.
///
/// Keywords and symbols are matched as fixed strings. Literals carry parsed
/// values. Names (`%v`, `@f`, `#attr`, `!type`, `^bb`, bare words) carry no
/// value; use the span to retrieve the text from the source.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n]+|//[^\n]*")]
pub enum Token {
    // ── Keywords ──
    #[token("module")]
    Module,
    #[token("func.func")]
    FuncFunc,
    #[token("return")]
    #[token("func.return")]
    Return,
    #[token("dense")]
    Dense,
    #[token("array")]
    Array,
    #[token("true")]
    True,
    #[token("false")]
    False,
    #[token("unit")]
    Unit,

    // ── Symbols ──
    #[token("->")]
    Arrow,
    #[token(":")]
    Colon,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token(",")]
    Comma,
    #[token("=")]
    Equals,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,

    // ── Literals ──
    /// Float literal; requires a `.` as MLIR does.
    #[regex(r"-?[0-9]+\.[0-9]*([eE][+-]?[0-9]+)?", parse_float)]
    Float(f64),

    /// Hexadecimal literal, used for float bit patterns.
    #[regex(r"0x[0-9a-fA-F]+", parse_hex)]
    Hex(u64),

    #[regex(r"-?[0-9]+", parse_int)]
    Int(i64),

    /// String literal with `\"`, `\\`, `\n`, `\t` and `\XX` hex escapes.
    #[regex(r#""([^"\\]|\\.)*""#, parse_string)]
    StringLit(String),

    /// `tensor<2x?xf32>`
    #[regex(r"tensor<[^<>]*>", parse_tensor)]
    TensorType(TensorType),

    // ── Names ──
    //
    // Fixed `#[token]` matches win over these regexes at equal length, so
    // `dense` lexes as Dense, not Ident.
    /// SSA value: `%name` or `%name#index`.
    #[regex(r"%[a-zA-Z0-9_$.]+(#[0-9]+)?")]
    ValueId,

    /// Symbol reference: `@name`.
    #[regex(r"@[a-zA-Z_][a-zA-Z0-9_$.]*")]
    SymbolRef,

    /// Attribute alias or dialect attribute prefix: `#stablehlo`, `#stablehlo.conv`.
    #[regex(r"#[a-zA-Z_][a-zA-Z0-9_$.]*")]
    HashIdent,

    /// Dialect type: `!stablehlo.token`.
    #[regex(r"![a-zA-Z_][a-zA-Z0-9_$.]*")]
    BangIdent,

    /// Block label: `^bb0`.
    #[regex(r"\^[a-zA-Z0-9_$.]+")]
    Caret,

    /// Bare identifier: `[a-zA-Z_][a-zA-Z0-9_$.]*`
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_$.]*")]
    Ident,
}

impl Token {
    /// True for tokens that spell a bare word (identifiers and keywords).
    /// Attribute keys and enum values accept any of them.
    pub fn is_word(&self) -> bool {
        matches!(
            self,
            Token::Ident
                | Token::Module
                | Token::Return
                | Token::Dense
                | Token::Array
                | Token::True
                | Token::False
                | Token::Unit
        )
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Module => write!(f, "module"),
            Token::FuncFunc => write!(f, "func.func"),
            Token::Return => write!(f, "return"),
            Token::Dense => write!(f, "dense"),
            Token::Array => write!(f, "array"),
            Token::True => write!(f, "true"),
            Token::False => write!(f, "false"),
            Token::Unit => write!(f, "unit"),
            Token::Arrow => write!(f, "->"),
            Token::Colon => write!(f, ":"),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::LBrace => write!(f, "{{"),
            Token::RBrace => write!(f, "}}"),
            Token::LBracket => write!(f, "["),
            Token::RBracket => write!(f, "]"),
            Token::Comma => write!(f, ","),
            Token::Equals => write!(f, "="),
            Token::Lt => write!(f, "<"),
            Token::Gt => write!(f, ">"),
            Token::Float(v) => write!(f, "{v:?}"),
            Token::Hex(v) => write!(f, "0x{v:X}"),
            Token::Int(v) => write!(f, "{v}"),
            Token::StringLit(s) => write!(f, "{s:?}"),
            Token::TensorType(t) => write!(f, "{t}"),
            Token::ValueId => write!(f, "<value>"),
            Token::SymbolRef => write!(f, "<symbol>"),
            Token::HashIdent => write!(f, "<attribute>"),
            Token::BangIdent => write!(f, "<type>"),
            Token::Caret => write!(f, "<block label>"),
            Token::Ident => write!(f, "<identifier>"),
        }
    }
}

// ── Callbacks ──

fn parse_float(lex: &mut logos::Lexer<'_, Token>) -> Option<f64> {
    lex.slice().parse().ok()
}

fn parse_int(lex: &mut logos::Lexer<'_, Token>) -> Option<i64> {
    lex.slice().parse().ok()
}

fn parse_hex(lex: &mut logos::Lexer<'_, Token>) -> Option<u64> {
    u64::from_str_radix(&lex.slice()[2..], 16).ok()
}

fn parse_tensor(lex: &mut logos::Lexer<'_, Token>) -> Option<TensorType> {
    let slice = lex.slice();
    slice["tensor<".len()..slice.len() - 1].parse().ok()
}

fn parse_string(lex: &mut logos::Lexer<'_, Token>) -> Option<String> {
    let slice = lex.slice();
    let inner = &slice[1..slice.len() - 1]; // strip quotes
    let mut bytes = Vec::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next()? {
                '"' => bytes.push(b'"'),
                '\\' => bytes.push(b'\\'),
                'n' => bytes.push(b'\n'),
                't' => bytes.push(b'\t'),
                hi => {
                    let lo = chars.next()?;
                    let byte = (hi.to_digit(16)? << 4) | lo.to_digit(16)?;
                    bytes.push(byte as u8);
                }
            }
        } else {
            let mut buf = [0u8; 4];
            bytes.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
        }
    }
    String::from_utf8(bytes).ok()
}

// ── Public API ──

/// Lex an IR source string into tokens.
///
/// Returns all successfully parsed tokens together with any errors for
/// unrecognised input. Lexing is non-fatal: errors are collected and the
/// lexer continues past bad characters.
pub fn lex(source: &str) -> LexResult {
    let lexer = Token::lexer(source);
    let mut tokens = Vec::new();
    let mut errors = Vec::new();

    for (result, range) in lexer.spanned() {
        let span = Span {
            start: range.start,
            end: range.end,
        };
        match result {
            Ok(token) => tokens.push((token, span)),
            Err(()) => errors.push(LexError {
                span,
                message: format!("unexpected input: {:?}", &source[span.start..span.end]),
            }),
        }
    }

    LexResult { tokens, errors }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ElementType;

    /// Helper: lex and assert no errors, return token list.
    fn lex_ok(source: &str) -> Vec<Token> {
        let result = lex(source);
        assert!(
            result.errors.is_empty(),
            "unexpected lex errors: {:?}",
            result.errors
        );
        result.tokens.into_iter().map(|(t, _)| t).collect()
    }

    #[test]
    fn keywords_and_words() {
        assert_eq!(
            lex_ok("module func.func return func.return dense array true false unit axis"),
            vec![
                Token::Module,
                Token::FuncFunc,
                Token::Return,
                Token::Return,
                Token::Dense,
                Token::Array,
                Token::True,
                Token::False,
                Token::Unit,
                Token::Ident,
            ]
        );
    }

    #[test]
    fn keyword_prefix_is_an_identifier() {
        assert_eq!(lex_ok("densely units"), vec![Token::Ident, Token::Ident]);
    }

    #[test]
    fn symbols() {
        assert_eq!(
            lex_ok("-> : ( ) { } [ ] , = < >"),
            vec![
                Token::Arrow,
                Token::Colon,
                Token::LParen,
                Token::RParen,
                Token::LBrace,
                Token::RBrace,
                Token::LBracket,
                Token::RBracket,
                Token::Comma,
                Token::Equals,
                Token::Lt,
                Token::Gt,
            ]
        );
    }

    #[test]
    fn numbers() {
        assert_eq!(
            lex_ok("2 -7 0.001 1.5e-3 -2.0 0x7FC00000"),
            vec![
                Token::Int(2),
                Token::Int(-7),
                Token::Float(0.001),
                Token::Float(1.5e-3),
                Token::Float(-2.0),
                Token::Hex(0x7FC0_0000),
            ]
        );
    }

    #[test]
    fn string_escapes() {
        assert_eq!(
            lex_ok(r#""a\"b\\c\n\41""#),
            vec![Token::StringLit("a\"b\\c\nA".into())]
        );
    }

    #[test]
    fn string_with_invalid_utf8_escape_is_an_error() {
        let result = lex(r#""\FF""#);
        assert_eq!(result.errors.len(), 1);
    }

    #[test]
    fn tensor_type_is_one_token() {
        let tokens = lex_ok("tensor<2x?xf32>");
        let [Token::TensorType(t)] = tokens.as_slice() else {
            panic!("expected a tensor token, got {tokens:?}")
        };
        assert_eq!(t.dims, vec![Some(2), None]);
        assert_eq!(t.element, "f32".parse::<ElementType>().unwrap());
    }

    #[test]
    fn names() {
        assert_eq!(
            lex_ok("%0 %arg1 %3#1 @main #stablehlo.conv !stablehlo.token ^bb0 stablehlo.abs"),
            vec![
                Token::ValueId,
                Token::ValueId,
                Token::ValueId,
                Token::SymbolRef,
                Token::HashIdent,
                Token::BangIdent,
                Token::Caret,
                Token::Ident,
            ]
        );
    }

    #[test]
    fn multi_result_binding() {
        assert_eq!(
            lex_ok("%1:2 ="),
            vec![Token::ValueId, Token::Colon, Token::Int(2), Token::Equals]
        );
    }

    #[test]
    fn compact_conv_layout() {
        let tokens = lex_ok("[b, 0, f]x[0, i, o]->[b, 0, f]");
        assert_eq!(tokens[6], Token::RBracket);
        assert_eq!(tokens[7], Token::Ident);
        assert!(tokens.contains(&Token::Arrow));
    }

    #[test]
    fn comments_and_newlines_skipped() {
        assert_eq!(lex_ok("// header\nunit // trailing\n"), vec![Token::Unit]);
    }

    #[test]
    fn spans_correct() {
        let result = lex("%0 = \"x\"");
        let spans: Vec<Span> = result.tokens.iter().map(|(_, s)| *s).collect();
        assert_eq!(
            spans,
            vec![
                Span { start: 0, end: 2 },
                Span { start: 3, end: 4 },
                Span { start: 5, end: 8 },
            ]
        );
    }

    #[test]
    fn unexpected_character_is_non_fatal() {
        let result = lex("unit ` unit");
        assert_eq!(result.tokens.len(), 2);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].span, Span { start: 5, end: 6 });
    }
}
