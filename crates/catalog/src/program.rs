//! Program normalization: lift node definitions out of a parsed script

use crate::ast::{Ast, AstKind, Locator};

/// A parsed script with node definitions separated from the main body
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub body: Ast,
    /// `NodeDefinition` statements, in source order
    pub definitions: Vec<Ast>,
    pub locator: Locator,
}

/// Build a program from a parse tree.
///
/// A block root has its node definitions extracted; the remaining statements
/// keep their order. A lone node definition is both the body and the single
/// definition. Any other root is the body as-is.
pub fn build_program(root: Ast, locator: Locator) -> Program {
    match root.kind {
        AstKind::Block(statements) if statements.iter().any(Ast::is_node_definition) => {
            let span = root.span;
            let (definitions, mut remaining): (Vec<Ast>, Vec<Ast>) =
                statements.into_iter().partition(Ast::is_node_definition);
            let body = match remaining.len() {
                1 => remaining.remove(0),
                _ => Ast::new(AstKind::Block(remaining), span),
            };
            Program {
                body,
                definitions,
                locator,
            }
        }
        AstKind::NodeDefinition(_) => Program {
            body: root.clone(),
            definitions: vec![root],
            locator,
        },
        _ => Program {
            body: root,
            definitions: Vec::new(),
            locator,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_script;

    fn program(text: &str) -> Program {
        let parsed = parse_script(text).unwrap();
        build_program(parsed.ast, parsed.locator)
    }

    #[test]
    fn test_block_without_nodes_is_unchanged() {
        let text = "notice('a')\nnotice('b')";
        let parsed = parse_script(text).unwrap();
        let original = parsed.ast.clone();
        let program = build_program(parsed.ast, parsed.locator);
        assert!(program.definitions.is_empty());
        assert_eq!(program.body, original);
    }

    #[test]
    fn test_lone_node_definition_is_body_and_definition() {
        let program = program("node 'web01' { notice('x') }");
        assert_eq!(program.definitions.len(), 1);
        assert_eq!(program.body, program.definitions[0]);
    }

    #[test]
    fn test_node_definitions_are_extracted_in_order() {
        let program = program(
            "notice('first')\nnode 'a' { }\n$x = 1\nnode default { }\nnotice('last')",
        );
        assert_eq!(program.definitions.len(), 2);
        assert!(program.definitions.iter().all(Ast::is_node_definition));

        let AstKind::Block(body) = &program.body.kind else {
            panic!("expected block body");
        };
        assert_eq!(body.len(), 3);
        assert!(matches!(body[1].kind, AstKind::Assignment { .. }));
        assert!(!body.iter().any(Ast::is_node_definition));
    }

    #[test]
    fn test_single_remaining_statement_becomes_body() {
        let program = program("node 'a' { }\n$x = 1");
        assert!(matches!(program.body.kind, AstKind::Assignment { .. }));
    }

    #[test]
    fn test_only_node_definitions_leave_empty_block() {
        let program = program("node 'a' { }\nnode 'b' { }");
        assert_eq!(program.definitions.len(), 2);
        assert!(matches!(&program.body.kind, AstKind::Block(s) if s.is_empty()));
    }

    #[test]
    fn test_non_block_root_is_body() {
        let program = program("file { '/tmp/x': ensure => file }");
        assert!(program.definitions.is_empty());
        assert!(matches!(program.body.kind, AstKind::ResourceDeclaration(_)));
    }
}
