//! Abstract syntax tree for configuration scripts
//!
//! Every node carries a [`Span`] so compilation errors can point back at the
//! script (or module file) that produced them. Spans are byte offsets; a
//! [`Locator`] turns them into line and column numbers.

use serde::Serialize;
use std::fmt;

/// Byte range within one source text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    /// Index of the source this span belongs to (0 is the script itself)
    pub source: usize,
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(source: usize, start: usize, end: usize) -> Self {
        Self { source, start, end }
    }

    /// Span covering both `self` and `other`
    pub fn to(self, other: Span) -> Span {
        Span {
            source: self.source,
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

/// Human-readable position in a named source
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Location {
    pub file: String,
    pub line: usize,
    pub column: usize,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

/// Maps byte offsets of one source text to lines and columns
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locator {
    name: String,
    line_starts: Vec<usize>,
    len: usize,
}

impl Locator {
    pub fn new(name: impl Into<String>, text: &str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(
            text.char_indices()
                .filter(|(_, c)| *c == '\n')
                .map(|(i, _)| i + 1),
        );
        Self {
            name: name.into(),
            line_starts,
            len: text.len(),
        }
    }

    /// Name of the source (`<script>` or a manifest path)
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 1-based line and column for a byte offset
    pub fn location(&self, offset: usize) -> Location {
        let offset = offset.min(self.len);
        let line = match self.line_starts.binary_search(&offset) {
            Ok(idx) => idx,
            Err(idx) => idx - 1,
        };
        Location {
            file: self.name.clone(),
            line: line + 1,
            column: offset - self.line_starts[line] + 1,
        }
    }
}

/// A statement-level syntax node
#[derive(Debug, Clone, PartialEq)]
pub struct Ast {
    pub kind: AstKind,
    pub span: Span,
}

impl Ast {
    pub fn new(kind: AstKind, span: Span) -> Self {
        Self { kind, span }
    }

    pub fn is_node_definition(&self) -> bool {
        matches!(self.kind, AstKind::NodeDefinition(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AstKind {
    /// Sequence of statements
    Block(Vec<Ast>),
    NodeDefinition(NodeDefinition),
    ClassDefinition(ClassDefinition),
    ResourceDeclaration(ResourceDeclaration),
    /// `$name = value`
    Assignment { name: String, value: Expr },
    /// `include a, b` / `contain c`
    Include { classes: Vec<Expr>, contain: bool },
    /// `if` / `elsif` / `else`; `unless` is desugared into a negated branch
    If {
        branches: Vec<(Expr, Vec<Ast>)>,
        otherwise: Option<Vec<Ast>>,
    },
    /// `A -> B ~> C`
    Relationship {
        operands: Vec<Expr>,
        arrows: Vec<Arrow>,
    },
    Expression(Expr),
}

/// Relationship arrow between references
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arrow {
    /// `->`
    Before,
    /// `~>`
    Notify,
}

/// Which node a node definition applies to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeMatcher {
    Name(String),
    Default,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NodeDefinition {
    pub matchers: Vec<NodeMatcher>,
    pub body: Vec<Ast>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassParameter {
    pub name: String,
    pub default: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassDefinition {
    pub name: String,
    pub parameters: Vec<ClassParameter>,
    pub body: Vec<Ast>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResourceDeclaration {
    /// Lowercase type name (`file`, `exec`, `class`, ...)
    pub type_name: String,
    pub bodies: Vec<ResourceBody>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResourceBody {
    pub title: Expr,
    pub attributes: Vec<Attribute>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub name: String,
    pub value: Expr,
    pub span: Span,
}

/// An expression node
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self { kind, span }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Undef,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
    /// Double-quoted string with interpolation
    Interpolated(Vec<StringPart>),
    Regex(String),
    Variable(String),
    Array(Vec<Expr>),
    Hash(Vec<(Expr, Expr)>),
    /// `$value[key, ...]`
    Access { target: Box<Expr>, keys: Vec<Expr> },
    /// `File['/tmp/x']`
    ResourceReference { type_name: String, titles: Vec<Expr> },
    Call { name: String, arguments: Vec<Expr> },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Not(Box<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum StringPart {
    Literal(String),
    Expr(Expr),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Equal,
    NotEqual,
    Match,
    NotMatch,
    And,
    Or,
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self {
            Self::Equal => "==",
            Self::NotEqual => "!=",
            Self::Match => "=~",
            Self::NotMatch => "!~",
            Self::And => "and",
            Self::Or => "or",
        };
        f.write_str(op)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locator_lines_and_columns() {
        let locator = Locator::new("<script>", "a\nbc\n\nd");
        assert_eq!(locator.location(0).line, 1);
        assert_eq!(locator.location(3).line, 2);
        assert_eq!(locator.location(3).column, 2);
        assert_eq!(locator.location(6).line, 4);
        assert_eq!(locator.location(6).column, 1);
    }

    #[test]
    fn test_location_display() {
        let locator = Locator::new("site.pp", "x\ny");
        assert_eq!(locator.location(2).to_string(), "site.pp:2:1");
    }
}
