//! Recursive-descent parser for configuration scripts.
//!
//! A script is usually a fragment: a list of statements without any
//! enclosing program wrapper. The parser returns the lone statement when the
//! script holds exactly one, otherwise a [`AstKind::Block`].
//!
//! ```text
//! node 'web01' { include base }
//! class base($motd = 'hello') {
//!   file { '/etc/motd': ensure => file, content => "${motd}\n" }
//! }
//! File['/etc/motd'] ~> Exec['reload']
//! ```

use crate::ast::{
    Arrow, Ast, AstKind, Attribute, BinaryOp, ClassDefinition, ClassParameter, Expr, ExprKind,
    Locator, NodeDefinition, NodeMatcher, ResourceBody, ResourceDeclaration, Span, StringPart,
};
use crate::error::SyntaxError;
use crate::lexer::{Token, tokenize};

type Result<T> = std::result::Result<T, SyntaxError>;

/// Deepest nesting of blocks and expressions accepted in one script
pub const MAX_NESTING: usize = 100;

/// A parsed source text together with its locator
#[derive(Debug, Clone)]
pub struct ParsedSource {
    pub ast: Ast,
    pub locator: Locator,
}

/// Parse the script supplied by the caller (source id 0).
pub fn parse_script(text: &str) -> Result<ParsedSource> {
    parse_source("<script>", text, 0)
}

/// Parse a named source text, tagging spans with `source`.
pub fn parse_source(name: &str, text: &str, source: usize) -> Result<ParsedSource> {
    let locator = Locator::new(name, text);
    let tokens = tokenize(text, source, 0, &locator)?;
    let mut parser = Parser::new(&tokens, &locator, source, text.len());
    let mut statements = parser.statements_until(None)?;

    let ast = if statements.len() == 1 {
        statements.remove(0)
    } else {
        Ast::new(AstKind::Block(statements), Span::new(source, 0, text.len()))
    };

    Ok(ParsedSource { ast, locator })
}

struct Parser<'a> {
    tokens: &'a [(Token, Span)],
    pos: usize,
    locator: &'a Locator,
    source: usize,
    end: usize,
    /// Current nesting of blocks and expressions
    depth: usize,
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [(Token, Span)], locator: &'a Locator, source: usize, end: usize) -> Self {
        Self {
            tokens,
            pos: 0,
            locator,
            source,
            end,
            depth: 0,
        }
    }

    /// Run `parse` one nesting level deeper, failing past [`MAX_NESTING`]
    fn nested<T>(&mut self, parse: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        self.check_depth(1)?;
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    /// Fail when `extra` more levels on top of the current nesting are too many.
    /// Left-associative chains grow the tree without recursing here, so each
    /// link counts as a level.
    fn check_depth(&self, extra: usize) -> Result<()> {
        if self.depth + extra > MAX_NESTING {
            return Err(self.error_at(
                self.current_span(),
                format!("nesting too deep (more than {MAX_NESTING} levels)"),
            ));
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Token stream helpers
    // ------------------------------------------------------------------

    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn peek_nth(&self, n: usize) -> Option<&'a Token> {
        self.tokens.get(self.pos + n).map(|(t, _)| t)
    }

    fn advance(&mut self) -> Option<&'a (Token, Span)> {
        let item = self.tokens.get(self.pos);
        if item.is_some() {
            self.pos += 1;
        }
        item
    }

    fn check(&self, expected: &Token) -> bool {
        matches!(self.peek(), Some(t) if std::mem::discriminant(t) == std::mem::discriminant(expected))
    }

    fn eat(&mut self, expected: &Token) -> Option<Span> {
        if self.check(expected) {
            self.advance().map(|(_, span)| *span)
        } else {
            None
        }
    }

    fn expect(&mut self, expected: &Token) -> Result<Span> {
        match self.eat(expected) {
            Some(span) => Ok(span),
            None => Err(self.error_here(&format!("expected {expected}"))),
        }
    }

    fn current_span(&self) -> Span {
        match self.tokens.get(self.pos) {
            Some((_, span)) => *span,
            None => Span::new(self.source, self.end, self.end),
        }
    }

    fn previous_span(&self) -> Span {
        self.pos
            .checked_sub(1)
            .and_then(|i| self.tokens.get(i))
            .map(|(_, span)| *span)
            .unwrap_or_else(|| self.current_span())
    }

    fn error_at(&self, span: Span, message: impl Into<String>) -> SyntaxError {
        SyntaxError {
            message: message.into(),
            location: self.locator.location(span.start),
        }
    }

    fn error_here(&self, expectation: &str) -> SyntaxError {
        let found = match self.peek() {
            Some(token) => token.to_string(),
            None => "end of input".to_string(),
        };
        self.error_at(self.current_span(), format!("{expectation}, found {found}"))
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    /// Parse statements until `terminator` (or end of input when `None`).
    fn statements_until(&mut self, terminator: Option<&Token>) -> Result<Vec<Ast>> {
        let mut statements = Vec::new();
        loop {
            while self.eat(&Token::Semicolon).is_some() {}
            match (self.peek(), terminator) {
                (None, None) => break,
                (None, Some(t)) => return Err(self.error_here(&format!("expected {t}"))),
                (Some(_), Some(t)) if self.check(t) => break,
                _ => statements.push(self.statement()?),
            }
        }
        Ok(statements)
    }

    fn block(&mut self) -> Result<(Vec<Ast>, Span)> {
        let open = self.expect(&Token::LBrace)?;
        let body = self.nested(|p| p.statements_until(Some(&Token::RBrace)))?;
        let close = self.expect(&Token::RBrace)?;
        Ok((body, open.to(close)))
    }

    fn statement(&mut self) -> Result<Ast> {
        match self.peek() {
            Some(Token::Node) => self.node_definition(),
            Some(Token::Class) if matches!(self.peek_nth(1), Some(Token::LBrace)) => {
                self.resource_declaration()
            }
            Some(Token::Class) => self.class_definition(),
            Some(Token::Include | Token::Contain) => self.include(),
            Some(Token::If) => self.if_statement(),
            Some(Token::Unless) => self.unless_statement(),
            Some(Token::Variable(_)) if matches!(self.peek_nth(1), Some(Token::Assign)) => {
                self.assignment()
            }
            Some(Token::Name(_)) if matches!(self.peek_nth(1), Some(Token::LBrace)) => {
                self.resource_declaration()
            }
            _ => self.expression_statement(),
        }
    }

    fn node_definition(&mut self) -> Result<Ast> {
        let start = self.expect(&Token::Node)?;
        let mut matchers = Vec::new();
        loop {
            let span = self.current_span();
            let matcher = match self.peek() {
                Some(Token::Default) => NodeMatcher::Default,
                Some(Token::Name(name)) => NodeMatcher::Name(name.clone()),
                Some(Token::SqString(raw)) => NodeMatcher::Name(unescape_single(raw)),
                Some(Token::DqString(raw)) => match self.interpolate(raw, span)?.kind {
                    ExprKind::String(name) => NodeMatcher::Name(name),
                    _ => {
                        return Err(
                            self.error_at(span, "interpolation is not allowed in node names")
                        );
                    }
                },
                _ => return Err(self.error_here("expected a node name")),
            };
            self.pos += 1;
            matchers.push(matcher);
            if self.eat(&Token::Comma).is_none() {
                break;
            }
        }
        let (body, body_span) = self.block()?;
        Ok(Ast::new(
            AstKind::NodeDefinition(NodeDefinition { matchers, body }),
            start.to(body_span),
        ))
    }

    fn class_definition(&mut self) -> Result<Ast> {
        let start = self.expect(&Token::Class)?;
        let name = match self.peek() {
            Some(Token::Name(name)) => name.clone(),
            _ => return Err(self.error_here("expected a class name")),
        };
        self.pos += 1;

        let mut parameters = Vec::new();
        if self.eat(&Token::LParen).is_some() {
            while !self.check(&Token::RParen) {
                let param = match self.peek() {
                    Some(Token::Variable(name)) => name.clone(),
                    _ => return Err(self.error_here("expected a parameter variable")),
                };
                self.pos += 1;
                let default = if self.eat(&Token::Assign).is_some() {
                    Some(self.expression()?)
                } else {
                    None
                };
                parameters.push(ClassParameter {
                    name: param,
                    default,
                });
                if self.eat(&Token::Comma).is_none() {
                    break;
                }
            }
            self.expect(&Token::RParen)?;
        }

        let (body, body_span) = self.block()?;
        Ok(Ast::new(
            AstKind::ClassDefinition(ClassDefinition {
                name,
                parameters,
                body,
            }),
            start.to(body_span),
        ))
    }

    fn resource_declaration(&mut self) -> Result<Ast> {
        let start = self.current_span();
        let type_name = match self.peek() {
            Some(Token::Name(name)) => name.clone(),
            Some(Token::Class) => "class".to_string(),
            _ => return Err(self.error_here("expected a resource type")),
        };
        self.pos += 1;
        self.expect(&Token::LBrace)?;

        let mut bodies = Vec::new();
        while !self.check(&Token::RBrace) {
            let title = self.expression()?;
            self.expect(&Token::Colon)?;

            let mut attributes = Vec::new();
            while !self.check(&Token::RBrace) && !self.check(&Token::Semicolon) {
                let (name, name_span) = self.attribute_name()?;
                self.expect(&Token::FatArrow)?;
                let value = self.expression()?;
                let span = name_span.to(value.span);
                attributes.push(Attribute { name, value, span });
                if self.eat(&Token::Comma).is_none() {
                    break;
                }
            }

            let span = title.span.to(self.previous_span());
            bodies.push(ResourceBody {
                title,
                attributes,
                span,
            });
            if self.eat(&Token::Semicolon).is_none() {
                break;
            }
        }
        let end = self.expect(&Token::RBrace)?;

        Ok(Ast::new(
            AstKind::ResourceDeclaration(ResourceDeclaration { type_name, bodies }),
            start.to(end),
        ))
    }

    /// Attribute names may collide with keywords (`unless` on exec, for one).
    fn attribute_name(&mut self) -> Result<(String, Span)> {
        let name = match self.peek() {
            Some(Token::Name(name)) => name.clone(),
            Some(Token::Unless) => "unless".to_string(),
            Some(Token::Node) => "node".to_string(),
            Some(Token::Class) => "class".to_string(),
            Some(Token::Include) => "include".to_string(),
            Some(Token::Contain) => "contain".to_string(),
            Some(Token::Default) => "default".to_string(),
            Some(Token::If) => "if".to_string(),
            _ => return Err(self.error_here("expected an attribute name")),
        };
        let span = self.current_span();
        self.pos += 1;
        Ok((name, span))
    }

    fn include(&mut self) -> Result<Ast> {
        let (contain, start) = match self.advance() {
            Some((Token::Contain, span)) => (true, *span),
            Some((_, span)) => (false, *span),
            None => return Err(self.error_here("expected 'include'")),
        };
        let mut classes = vec![self.expression()?];
        while self.eat(&Token::Comma).is_some() {
            classes.push(self.expression()?);
        }
        let span = start.to(self.previous_span());
        Ok(Ast::new(AstKind::Include { classes, contain }, span))
    }

    fn if_statement(&mut self) -> Result<Ast> {
        let start = self.expect(&Token::If)?;
        let mut branches = Vec::new();
        let condition = self.expression()?;
        let (body, mut end) = self.block()?;
        branches.push((condition, body));

        while self.eat(&Token::Elsif).is_some() {
            let condition = self.expression()?;
            let (body, span) = self.block()?;
            branches.push((condition, body));
            end = span;
        }

        let otherwise = if self.eat(&Token::Else).is_some() {
            let (body, span) = self.block()?;
            end = span;
            Some(body)
        } else {
            None
        };

        Ok(Ast::new(
            AstKind::If {
                branches,
                otherwise,
            },
            start.to(end),
        ))
    }

    fn unless_statement(&mut self) -> Result<Ast> {
        let start = self.expect(&Token::Unless)?;
        let condition = self.expression()?;
        let (body, mut end) = self.block()?;
        let otherwise = if self.eat(&Token::Else).is_some() {
            let (body, span) = self.block()?;
            end = span;
            Some(body)
        } else {
            None
        };

        let span = condition.span;
        let negated = Expr::new(ExprKind::Not(Box::new(condition)), span);
        Ok(Ast::new(
            AstKind::If {
                branches: vec![(negated, body)],
                otherwise,
            },
            start.to(end),
        ))
    }

    fn assignment(&mut self) -> Result<Ast> {
        let (name, start) = match self.advance() {
            Some((Token::Variable(name), span)) => (name.clone(), *span),
            _ => return Err(self.error_here("expected a variable")),
        };
        if name.contains("::") {
            return Err(self.error_at(start, format!("cannot assign to qualified variable '${name}'")));
        }
        self.expect(&Token::Assign)?;
        let value = self.expression()?;
        let span = start.to(value.span);
        Ok(Ast::new(AstKind::Assignment { name, value }, span))
    }

    fn expression_statement(&mut self) -> Result<Ast> {
        let first = self.expression()?;
        if !self.check(&Token::InEdge) && !self.check(&Token::InEdgeSub) {
            let span = first.span;
            return Ok(Ast::new(AstKind::Expression(first), span));
        }

        let mut operands = vec![first];
        let mut arrows = Vec::new();
        loop {
            let arrow = if self.eat(&Token::InEdge).is_some() {
                Arrow::Before
            } else if self.eat(&Token::InEdgeSub).is_some() {
                Arrow::Notify
            } else {
                break;
            };
            arrows.push(arrow);
            operands.push(self.expression()?);
        }

        let span = operands[0].span.to(operands[operands.len() - 1].span);
        Ok(Ast::new(AstKind::Relationship { operands, arrows }, span))
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    fn expression(&mut self) -> Result<Expr> {
        self.nested(Self::or_expression)
    }

    fn or_expression(&mut self) -> Result<Expr> {
        let mut left = self.and_expression()?;
        let mut links = 0;
        while self.eat(&Token::Or).is_some() {
            links += 1;
            self.check_depth(links)?;
            let right = self.and_expression()?;
            left = binary(BinaryOp::Or, left, right);
        }
        Ok(left)
    }

    fn and_expression(&mut self) -> Result<Expr> {
        let mut left = self.comparison()?;
        let mut links = 0;
        while self.eat(&Token::And).is_some() {
            links += 1;
            self.check_depth(links)?;
            let right = self.comparison()?;
            left = binary(BinaryOp::And, left, right);
        }
        Ok(left)
    }

    fn comparison(&mut self) -> Result<Expr> {
        let left = self.unary()?;
        let op = match self.peek() {
            Some(Token::Equal) => BinaryOp::Equal,
            Some(Token::NotEqual) => BinaryOp::NotEqual,
            Some(Token::Match) => BinaryOp::Match,
            Some(Token::NotMatch) => BinaryOp::NotMatch,
            _ => return Ok(left),
        };
        self.pos += 1;
        let right = self.unary()?;
        Ok(binary(op, left, right))
    }

    fn unary(&mut self) -> Result<Expr> {
        if let Some(start) = self.eat(&Token::Bang) {
            let operand = self.nested(Self::unary)?;
            let span = start.to(operand.span);
            return Ok(Expr::new(ExprKind::Not(Box::new(operand)), span));
        }
        self.postfix()
    }

    fn postfix(&mut self) -> Result<Expr> {
        let mut expr = self.primary()?;
        let mut links = 0;
        while self.check(&Token::LBracket) {
            links += 1;
            self.check_depth(links)?;
            let (keys, end) = self.bracketed_list()?;
            let span = expr.span.to(end);
            expr = Expr::new(
                ExprKind::Access {
                    target: Box::new(expr),
                    keys,
                },
                span,
            );
        }
        Ok(expr)
    }

    /// `[a, b, ...]` returning the items and the closing span
    fn bracketed_list(&mut self) -> Result<(Vec<Expr>, Span)> {
        self.expect(&Token::LBracket)?;
        let items = self.comma_separated(&Token::RBracket)?;
        let end = self.expect(&Token::RBracket)?;
        Ok((items, end))
    }

    fn comma_separated(&mut self, close: &Token) -> Result<Vec<Expr>> {
        let mut items = Vec::new();
        while !self.check(close) {
            items.push(self.expression()?);
            if self.eat(&Token::Comma).is_none() {
                break;
            }
        }
        Ok(items)
    }

    fn primary(&mut self) -> Result<Expr> {
        let Some((token, span)) = self.tokens.get(self.pos) else {
            return Err(self.error_here("expected an expression"));
        };
        let span = *span;

        let simple = |kind| Ok(Expr::new(kind, span));
        match token {
            Token::SqString(raw) => {
                self.pos += 1;
                simple(ExprKind::String(unescape_single(raw)))
            }
            Token::DqString(raw) => {
                self.pos += 1;
                self.interpolate(raw, span)
            }
            Token::Integer(n) => {
                self.pos += 1;
                simple(ExprKind::Integer(*n))
            }
            Token::Float(n) => {
                self.pos += 1;
                simple(ExprKind::Float(*n))
            }
            Token::Minus => {
                self.pos += 1;
                let kind = match self.peek() {
                    Some(Token::Integer(n)) => ExprKind::Integer(-n),
                    Some(Token::Float(n)) => ExprKind::Float(-n),
                    _ => return Err(self.error_here("expected a number after '-'")),
                };
                let end = self.current_span();
                self.pos += 1;
                Ok(Expr::new(kind, span.to(end)))
            }
            Token::True => {
                self.pos += 1;
                simple(ExprKind::Boolean(true))
            }
            Token::False => {
                self.pos += 1;
                simple(ExprKind::Boolean(false))
            }
            Token::Undef => {
                self.pos += 1;
                simple(ExprKind::Undef)
            }
            Token::Regex(pattern) => {
                self.pos += 1;
                simple(ExprKind::Regex(pattern.clone()))
            }
            Token::Variable(name) => {
                self.pos += 1;
                simple(ExprKind::Variable(name.clone()))
            }
            Token::LBracket => {
                let (items, end) = self.bracketed_list()?;
                Ok(Expr::new(ExprKind::Array(items), span.to(end)))
            }
            Token::LBrace => self.hash_literal(),
            Token::LParen => {
                self.pos += 1;
                let inner = self.expression()?;
                self.expect(&Token::RParen)?;
                Ok(inner)
            }
            Token::TypeName(name) => {
                self.pos += 1;
                if self.check(&Token::LParen) {
                    return self.call(name.clone(), span);
                }
                if !self.check(&Token::LBracket) {
                    return Err(self.error_at(
                        span,
                        format!("type '{name}' must be followed by a title, as in {name}['title']"),
                    ));
                }
                let (titles, end) = self.bracketed_list()?;
                if titles.is_empty() {
                    return Err(self.error_at(span, "resource reference needs at least one title"));
                }
                Ok(Expr::new(
                    ExprKind::ResourceReference {
                        type_name: name.to_lowercase(),
                        titles,
                    },
                    span.to(end),
                ))
            }
            Token::Name(name) => {
                self.pos += 1;
                if self.check(&Token::LParen) {
                    return self.call(name.clone(), span);
                }
                simple(ExprKind::String(name.clone()))
            }
            _ => Err(self.error_here("expected an expression")),
        }
    }

    fn call(&mut self, name: String, start: Span) -> Result<Expr> {
        self.expect(&Token::LParen)?;
        let arguments = self.comma_separated(&Token::RParen)?;
        let end = self.expect(&Token::RParen)?;
        Ok(Expr::new(ExprKind::Call { name, arguments }, start.to(end)))
    }

    fn hash_literal(&mut self) -> Result<Expr> {
        let start = self.expect(&Token::LBrace)?;
        let mut entries = Vec::new();
        while !self.check(&Token::RBrace) {
            let key = self.expression()?;
            self.expect(&Token::FatArrow)?;
            let value = self.expression()?;
            entries.push((key, value));
            if self.eat(&Token::Comma).is_none() {
                break;
            }
        }
        let end = self.expect(&Token::RBrace)?;
        Ok(Expr::new(ExprKind::Hash(entries), start.to(end)))
    }

    // ------------------------------------------------------------------
    // String interpolation
    // ------------------------------------------------------------------

    /// Expand escapes and `$var` / `${expr}` segments of a double-quoted body.
    ///
    /// `span` is the span of the whole string token, quotes included.
    fn interpolate(&self, raw: &str, span: Span) -> Result<Expr> {
        let base = span.start + 1;
        let bytes = raw.as_bytes();
        let mut parts = Vec::new();
        let mut literal = String::new();
        let mut chars = raw.char_indices().peekable();

        while let Some((i, c)) = chars.next() {
            match c {
                '\\' => match chars.next() {
                    Some((_, 'n')) => literal.push('\n'),
                    Some((_, 't')) => literal.push('\t'),
                    Some((_, 'r')) => literal.push('\r'),
                    Some((_, '\\')) => literal.push('\\'),
                    Some((_, '"')) => literal.push('"'),
                    Some((_, '$')) => literal.push('$'),
                    Some((_, other)) => {
                        literal.push('\\');
                        literal.push(other);
                    }
                    None => literal.push('\\'),
                },
                '$' if matches!(chars.peek(), Some((_, '{'))) => {
                    chars.next();
                    let inner_start = i + 2;
                    let mut depth = 1;
                    let mut inner_end = None;
                    for (j, c) in chars.by_ref() {
                        match c {
                            '{' => depth += 1,
                            '}' => {
                                depth -= 1;
                                if depth == 0 {
                                    inner_end = Some(j);
                                    break;
                                }
                            }
                            _ => {}
                        }
                    }
                    let Some(inner_end) = inner_end else {
                        return Err(self.error_at(
                            Span::new(span.source, base + i, base + i),
                            "unterminated '${' in string",
                        ));
                    };
                    if !literal.is_empty() {
                        parts.push(StringPart::Literal(std::mem::take(&mut literal)));
                    }
                    let expr = self.embedded_expression(&raw[inner_start..inner_end], base + inner_start)?;
                    parts.push(StringPart::Expr(expr));
                }
                '$' if matches!(chars.peek(), Some((_, n)) if n.is_ascii_lowercase() || *n == '_' || *n == ':') =>
                {
                    let mut end = i + 1;
                    while end < bytes.len() {
                        let b = bytes[end];
                        if b.is_ascii_alphanumeric() || b == b'_' {
                            end += 1;
                        } else if b == b':'
                            && bytes.get(end + 1) == Some(&b':')
                            && bytes
                                .get(end + 2)
                                .is_some_and(|n| n.is_ascii_lowercase() || *n == b'_')
                        {
                            end += 2;
                        } else {
                            break;
                        }
                    }
                    if end == i + 1 {
                        literal.push('$');
                        continue;
                    }
                    while chars.peek().is_some_and(|(j, _)| *j < end) {
                        chars.next();
                    }
                    if !literal.is_empty() {
                        parts.push(StringPart::Literal(std::mem::take(&mut literal)));
                    }
                    parts.push(StringPart::Expr(Expr::new(
                        ExprKind::Variable(raw[i + 1..end].to_string()),
                        Span::new(span.source, base + i, base + end),
                    )));
                }
                _ => literal.push(c),
            }
        }

        if parts.is_empty() {
            return Ok(Expr::new(ExprKind::String(literal), span));
        }
        if !literal.is_empty() {
            parts.push(StringPart::Literal(literal));
        }
        Ok(Expr::new(ExprKind::Interpolated(parts), span))
    }

    /// Parse the text inside `${...}`; a leading bare name is a variable.
    fn embedded_expression(&self, text: &str, offset: usize) -> Result<Expr> {
        let mut tokens = tokenize(text, self.source, offset, self.locator)?;
        if let Some((Token::Name(name), _)) = tokens.first()
            && !matches!(tokens.get(1), Some((Token::LParen, _)))
        {
            tokens[0].0 = Token::Variable(name.clone());
        }
        if tokens.is_empty() {
            return Err(self.error_at(
                Span::new(self.source, offset, offset),
                "empty interpolation '${}'",
            ));
        }

        let mut parser = Parser::new(&tokens, self.locator, self.source, offset + text.len());
        parser.depth = self.depth;
        let expr = parser.expression()?;
        if parser.peek().is_some() {
            return Err(parser.error_here("expected '}' to close interpolation"));
        }
        Ok(expr)
    }
}

fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    let span = left.span.to(right.span);
    Expr::new(
        ExprKind::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        },
        span,
    )
}

fn unescape_single(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' && matches!(chars.peek(), Some('\\' | '\'')) {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}
