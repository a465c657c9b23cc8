//! Lexer for the scene description syntax using logos

use logos::Logos;

use crate::node::Access;

/// Byte range in source text
pub type Span = std::ops::Range<usize>;

fn unescape(lex: &mut logos::Lexer<Token>) -> String {
    let s = lex.slice();
    let inner = &s[1..s.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(escaped) = chars.next() {
                out.push(escaped);
            }
        } else {
            out.push(c);
        }
    }
    out
}

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\n\r,]+")]
pub enum Token {
    // Statement keywords
    #[token("DEF")]
    Def,
    #[token("USE")]
    Use,
    #[token("PROTO")]
    Proto,
    #[token("IS")]
    Is,
    #[token("ROUTE")]
    Route,
    #[token("TO")]
    To,
    #[token("NULL")]
    Null,

    #[token("TRUE", |_| true)]
    #[token("FALSE", |_| false)]
    Bool(bool),

    // Interface declaration keywords, VRML97 and X3D spellings
    #[token("eventIn", |_| Access::EventIn)]
    #[token("inputOnly", |_| Access::EventIn)]
    #[token("eventOut", |_| Access::EventOut)]
    #[token("outputOnly", |_| Access::EventOut)]
    #[token("exposedField", |_| Access::ExposedField)]
    #[token("inputOutput", |_| Access::ExposedField)]
    #[token("field", |_| Access::Field)]
    #[token("initializeOnly", |_| Access::Field)]
    Access(Access),

    // Delimiters
    #[token("{")]
    BraceOpen,
    #[token("}")]
    BraceClose,
    #[token("[")]
    BracketOpen,
    #[token("]")]
    BracketClose,
    #[token(".")]
    Dot,

    // Literals - identifiers must come after keywords
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_\-]*", |lex| lex.slice().to_string(), priority = 1)]
    Ident(String),

    #[regex(r#""([^"\\]|\\.)*""#, unescape)]
    String(String),

    #[regex(r"[+-]?([0-9]+(\.[0-9]*)?|\.[0-9]+)([eE][+-]?[0-9]+)?", |lex| lex.slice().parse::<f64>().ok())]
    #[regex(r"0[xX][0-9a-fA-F]+", |lex| i64::from_str_radix(&lex.slice()[2..], 16).ok().map(|n| n as f64))]
    Number(f64),

    // Comments (skip), including the `#VRML V2.0 utf8` header
    #[regex(r"#[^\n]*", logos::skip)]
    Comment,

    /// Input the lexer does not recognize
    Error,
}

pub fn lex(input: &str) -> impl Iterator<Item = (Token, Span)> + '_ {
    Token::lexer(input)
        .spanned()
        .map(|(tok, span)| (tok.unwrap_or(Token::Error), span))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(input: &str) -> Vec<Token> {
        lex(input).map(|(t, _)| t).collect()
    }

    #[test]
    fn test_statement_keywords() {
        assert_eq!(
            tokens("DEF USE PROTO IS ROUTE TO NULL"),
            vec![
                Token::Def,
                Token::Use,
                Token::Proto,
                Token::Is,
                Token::Route,
                Token::To,
                Token::Null
            ]
        );
    }

    #[test]
    fn test_access_keywords() {
        assert_eq!(
            tokens("eventIn inputOutput field"),
            vec![
                Token::Access(Access::EventIn),
                Token::Access(Access::ExposedField),
                Token::Access(Access::Field)
            ]
        );
    }

    #[test]
    fn test_numbers() {
        assert_eq!(
            tokens("1 -2.5 .5 1e3 0x1F +4"),
            vec![
                Token::Number(1.0),
                Token::Number(-2.5),
                Token::Number(0.5),
                Token::Number(1000.0),
                Token::Number(31.0),
                Token::Number(4.0)
            ]
        );
    }

    #[test]
    fn test_commas_and_comments_are_whitespace() {
        assert_eq!(
            tokens("#VRML V2.0 utf8\n1, 2,3 # trailing\nTRUE"),
            vec![
                Token::Number(1.0),
                Token::Number(2.0),
                Token::Number(3.0),
                Token::Bool(true)
            ]
        );
    }

    #[test]
    fn test_route_endpoints() {
        assert_eq!(
            tokens("ROUTE T.set_translation TO Light-1.on"),
            vec![
                Token::Route,
                Token::Ident("T".into()),
                Token::Dot,
                Token::Ident("set_translation".into()),
                Token::To,
                Token::Ident("Light-1".into()),
                Token::Dot,
                Token::Ident("on".into())
            ]
        );
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(
            tokens(r#""say \"hi\"""#),
            vec![Token::String(r#"say "hi""#.into())]
        );
    }

    #[test]
    fn test_keyword_prefix_is_identifier() {
        assert_eq!(tokens("DEFAULT"), vec![Token::Ident("DEFAULT".into())]);
        assert_eq!(tokens("fields"), vec![Token::Ident("fields".into())]);
    }

    #[test]
    fn test_unknown_input() {
        assert_eq!(tokens("@"), vec![Token::Error]);
    }
}
