//! Tokenizer for configuration scripts, built on logos.
//!
//! Comments (`#` to end of line) and whitespace are skipped. String tokens
//! keep their raw body; escapes and interpolation are handled by the parser.

use crate::ast::{Locator, Span};
use crate::error::SyntaxError;
use logos::Logos;
use std::fmt;

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n]+")]
#[logos(skip r"#[^\n]*")]
pub enum Token {
    // Keywords
    #[token("node")]
    Node,
    #[token("class")]
    Class,
    #[token("include")]
    Include,
    #[token("contain")]
    Contain,
    #[token("if")]
    If,
    #[token("elsif")]
    Elsif,
    #[token("else")]
    Else,
    #[token("unless")]
    Unless,
    #[token("default")]
    Default,
    #[token("true")]
    True,
    #[token("false")]
    False,
    #[token("undef")]
    Undef,
    #[token("and")]
    And,
    #[token("or")]
    Or,

    // Delimiters
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token(",")]
    Comma,
    #[token(";")]
    Semicolon,
    #[token(":")]
    Colon,

    // Operators
    #[token("=>")]
    FatArrow,
    #[token("=")]
    Assign,
    #[token("==")]
    Equal,
    #[token("!=")]
    NotEqual,
    #[token("=~")]
    Match,
    #[token("!~")]
    NotMatch,
    #[token("!")]
    Bang,
    #[token("->")]
    InEdge,
    #[token("~>")]
    InEdgeSub,
    #[token("-")]
    Minus,

    // Literals
    #[regex(r"\$(::)?[a-z_][A-Za-z0-9_]*(::[a-z_][A-Za-z0-9_]*)*", |lex| lex.slice()[1..].to_string())]
    Variable(String),
    #[regex(r"[a-z_][a-z0-9_]*(::[a-z_][a-z0-9_]*)*", |lex| lex.slice().to_string())]
    Name(String),
    #[regex(r"(::)?[A-Z][A-Za-z0-9_]*(::[A-Z][A-Za-z0-9_]*)*", |lex| lex.slice().trim_start_matches("::").to_string())]
    TypeName(String),
    #[regex(r"'([^'\\]|\\.)*'", |lex| { let s = lex.slice(); s[1..s.len() - 1].to_string() })]
    SqString(String),
    #[regex(r#""([^"\\]|\\.)*""#, |lex| { let s = lex.slice(); s[1..s.len() - 1].to_string() })]
    DqString(String),
    #[regex(r"/([^/\n\\]|\\.)+/", |lex| { let s = lex.slice(); s[1..s.len() - 1].to_string() })]
    Regex(String),
    #[regex(r"[0-9]+", |lex| lex.slice().parse::<i64>().ok())]
    Integer(i64),
    #[regex(r"[0-9]+\.[0-9]+", |lex| lex.slice().parse::<f64>().ok())]
    Float(f64),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Node => f.write_str("'node'"),
            Token::Class => f.write_str("'class'"),
            Token::Include => f.write_str("'include'"),
            Token::Contain => f.write_str("'contain'"),
            Token::If => f.write_str("'if'"),
            Token::Elsif => f.write_str("'elsif'"),
            Token::Else => f.write_str("'else'"),
            Token::Unless => f.write_str("'unless'"),
            Token::Default => f.write_str("'default'"),
            Token::True => f.write_str("'true'"),
            Token::False => f.write_str("'false'"),
            Token::Undef => f.write_str("'undef'"),
            Token::And => f.write_str("'and'"),
            Token::Or => f.write_str("'or'"),
            Token::LBrace => f.write_str("'{'"),
            Token::RBrace => f.write_str("'}'"),
            Token::LBracket => f.write_str("'['"),
            Token::RBracket => f.write_str("']'"),
            Token::LParen => f.write_str("'('"),
            Token::RParen => f.write_str("')'"),
            Token::Comma => f.write_str("','"),
            Token::Semicolon => f.write_str("';'"),
            Token::Colon => f.write_str("':'"),
            Token::FatArrow => f.write_str("'=>'"),
            Token::Assign => f.write_str("'='"),
            Token::Equal => f.write_str("'=='"),
            Token::NotEqual => f.write_str("'!='"),
            Token::Match => f.write_str("'=~'"),
            Token::NotMatch => f.write_str("'!~'"),
            Token::Bang => f.write_str("'!'"),
            Token::InEdge => f.write_str("'->'"),
            Token::InEdgeSub => f.write_str("'~>'"),
            Token::Minus => f.write_str("'-'"),
            Token::Variable(name) => write!(f, "variable '${name}'"),
            Token::Name(name) => write!(f, "name '{name}'"),
            Token::TypeName(name) => write!(f, "type name '{name}'"),
            Token::SqString(_) | Token::DqString(_) => f.write_str("string"),
            Token::Regex(_) => f.write_str("regex"),
            Token::Integer(n) => write!(f, "integer {n}"),
            Token::Float(n) => write!(f, "float {n}"),
        }
    }
}

/// Tokenize `text`, tagging each span with `source`.
///
/// `offset` shifts every span; it is used when re-lexing an interpolated
/// expression embedded in a larger string.
pub fn tokenize(
    text: &str,
    source: usize,
    offset: usize,
    locator: &Locator,
) -> Result<Vec<(Token, Span)>, SyntaxError> {
    let mut tokens = Vec::new();
    let mut lexer = Token::lexer(text);

    while let Some(result) = lexer.next() {
        let range = lexer.span();
        let span = Span::new(source, range.start + offset, range.end + offset);
        match result {
            Ok(token) => tokens.push((token, span)),
            Err(()) => {
                return Err(SyntaxError {
                    message: format!("unexpected character sequence '{}'", lexer.slice()),
                    location: locator.location(span.start),
                });
            }
        }
    }

    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(text: &str) -> Vec<Token> {
        let locator = Locator::new("<test>", text);
        tokenize(text, 0, 0, &locator)
            .unwrap()
            .into_iter()
            .map(|(t, _)| t)
            .collect()
    }

    #[test]
    fn test_resource_declaration_tokens() {
        let tokens = lex("file { '/tmp/x': ensure => present }");
        assert_eq!(
            tokens,
            vec![
                Token::Name("file".into()),
                Token::LBrace,
                Token::SqString("/tmp/x".into()),
                Token::Colon,
                Token::Name("ensure".into()),
                Token::FatArrow,
                Token::Name("present".into()),
                Token::RBrace,
            ]
        );
    }

    #[test]
    fn test_keywords_win_over_names() {
        assert_eq!(lex("node nodes"), vec![Token::Node, Token::Name("nodes".into())]);
    }

    #[test]
    fn test_variables_and_references() {
        let tokens = lex("$facts['os'] File['/a'] -> Class['x::y'] ~> $::top");
        assert_eq!(tokens[0], Token::Variable("facts".into()));
        assert_eq!(tokens[4], Token::TypeName("File".into()));
        assert!(tokens.contains(&Token::InEdge));
        assert!(tokens.contains(&Token::InEdgeSub));
        assert_eq!(tokens.last(), Some(&Token::Variable("::top".into())));
    }

    #[test]
    fn test_comments_are_skipped() {
        let tokens = lex("# leading\nnotice('x') # trailing");
        assert_eq!(tokens.len(), 4);
    }

    #[test]
    fn test_numbers() {
        assert_eq!(lex("42 3.5"), vec![Token::Integer(42), Token::Float(3.5)]);
    }

    #[test]
    fn test_double_quoted_keeps_raw_body() {
        assert_eq!(
            lex(r#""hello ${name}\n""#),
            vec![Token::DqString(r"hello ${name}\n".into())]
        );
    }

    #[test]
    fn test_invalid_character_reports_location() {
        let text = "file {\n  @bad }";
        let locator = Locator::new("<test>", text);
        let err = tokenize(text, 0, 0, &locator).unwrap_err();
        assert_eq!(err.location.line, 2);
        assert_eq!(err.location.column, 3);
    }
}
