//! Catalog compiler: evaluate a program into resources and edges
//!
//! Evaluation order is the source order of the main body, followed by the
//! matching node definition. Classes are evaluated when first declared, so a
//! class body sees the variables of its own scope and the top scope only.
//!
//! Every compilation owns its scopes, class table and loaded module files;
//! nothing is shared between two calls to [`compile`].

use crate::ast::{
    Arrow, Ast, AstKind, Attribute, BinaryOp, ClassDefinition, Expr, ExprKind, Location,
    Locator, NodeDefinition, NodeMatcher, ResourceDeclaration, Span, StringPart,
};
use crate::catalog::{AbstractResource, Catalog, Edge, EdgeKind};
use crate::env::EnvironmentContext;
use crate::error::CompilationError;
use crate::functions;
use crate::parser::parse_source;
use crate::program::Program;
use crate::value::{Deferred, ResourceKey, Value};
use log::{debug, error, info, warn};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

type Result<T> = std::result::Result<T, CompilationError>;

const TOP_SCOPE: usize = 0;

/// Compile `program` for the node described by `env`.
pub fn compile(program: &Program, env: &EnvironmentContext) -> Result<Catalog> {
    Compiler::new(env).run(program)
}

struct ClassEntry {
    definition: Rc<ClassDefinition>,
    span: Span,
}

#[derive(Default)]
struct Scope {
    parent: Option<usize>,
    variables: HashMap<String, Value>,
}

struct Compiler<'env> {
    env: &'env EnvironmentContext,
    locators: Vec<Locator>,
    catalog: Catalog,
    classes: HashMap<String, ClassEntry>,
    loaded: HashSet<PathBuf>,
    scopes: Vec<Scope>,
    class_scopes: HashMap<String, usize>,
    containers: Vec<ResourceKey>,
    relationships: Vec<(Edge, Span)>,
    warned: HashSet<String>,
}

fn main_class() -> ResourceKey {
    ResourceKey::new("class", "main")
}

/// Class names are case-insensitive and may be written fully qualified
fn class_name(name: &str) -> String {
    name.trim_start_matches("::").to_lowercase()
}

impl<'env> Compiler<'env> {
    fn new(env: &'env EnvironmentContext) -> Self {
        Self {
            env,
            locators: Vec::new(),
            catalog: Catalog::new(env.node()),
            classes: HashMap::new(),
            loaded: HashSet::new(),
            scopes: Vec::new(),
            class_scopes: HashMap::new(),
            containers: Vec::new(),
            relationships: Vec::new(),
            warned: HashSet::new(),
        }
    }

    fn run(mut self, program: &Program) -> Result<Catalog> {
        self.locators.push(program.locator.clone());
        self.init_top_scope();

        let main = main_class();
        let _ = self
            .catalog
            .add_resource(AbstractResource::new(main.clone(), BTreeMap::new()));
        self.class_scopes.insert("main".to_string(), TOP_SCOPE);
        self.containers.push(main);

        self.hoist(&program.body)?;
        self.statement(&program.body, TOP_SCOPE)?;
        self.node(&program.definitions)?;
        self.finish()
    }

    fn init_top_scope(&mut self) {
        let mut top = Scope::default();
        let facts = self.env.facts();
        for (name, value) in facts.iter() {
            top.variables.insert(name.clone(), value.clone());
        }
        top.variables.insert("facts".to_string(), facts.to_value());
        top.variables.insert(
            "trusted".to_string(),
            Value::Hash(BTreeMap::from([(
                "certname".to_string(),
                Value::String(self.env.node().to_string()),
            )])),
        );
        self.scopes.push(top);
    }

    fn push_scope(&mut self, parent: Option<usize>) -> usize {
        self.scopes.push(Scope {
            parent,
            variables: HashMap::new(),
        });
        self.scopes.len() - 1
    }

    fn location(&self, span: Span) -> Location {
        match self.locators.get(span.source) {
            Some(locator) => locator.location(span.start),
            None => Location {
                file: "<unknown>".to_string(),
                line: 0,
                column: 0,
            },
        }
    }

    fn current_container(&self) -> ResourceKey {
        self.containers.last().cloned().unwrap_or_else(main_class)
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    fn statements(&mut self, statements: &[Ast], scope: usize) -> Result<()> {
        for statement in statements {
            self.statement(statement, scope)?;
        }
        Ok(())
    }

    fn statement(&mut self, ast: &Ast, scope: usize) -> Result<()> {
        match &ast.kind {
            AstKind::Block(statements) => self.statements(statements, scope),
            // Node bodies run after the main body, see `node`
            AstKind::NodeDefinition(_) => Ok(()),
            AstKind::ClassDefinition(definition) => self.define_class(definition, ast.span),
            AstKind::ResourceDeclaration(declaration) => self.declare(declaration, scope),
            AstKind::Assignment { name, value } => {
                let value = self.evaluate(value, scope)?;
                self.assign(scope, name, value, ast.span)
            }
            AstKind::Include { classes, contain } => {
                for expr in classes {
                    let value = self.evaluate(expr, scope)?;
                    let mut names = Vec::new();
                    self.class_names(&value, expr.span, &mut names)?;
                    for name in names {
                        self.declare_class(&name, None, *contain, expr.span)?;
                    }
                }
                Ok(())
            }
            AstKind::If {
                branches,
                otherwise,
            } => {
                for (condition, body) in branches {
                    if self.evaluate(condition, scope)?.is_truthy() {
                        return self.statements(body, scope);
                    }
                }
                match otherwise {
                    Some(body) => self.statements(body, scope),
                    None => Ok(()),
                }
            }
            AstKind::Relationship { operands, arrows } => {
                self.relationship(operands, arrows, scope)
            }
            AstKind::Expression(expr) => self.evaluate(expr, scope).map(drop),
        }
    }

    fn assign(&mut self, scope: usize, name: &str, value: Value, span: Span) -> Result<()> {
        if name.contains("::") || self.scopes[scope].variables.contains_key(name) {
            return Err(CompilationError::Reassignment {
                name: name.to_string(),
                location: self.location(span),
            });
        }
        self.scopes[scope].variables.insert(name.to_string(), value);
        Ok(())
    }

    fn relationship(&mut self, operands: &[Expr], arrows: &[Arrow], scope: usize) -> Result<()> {
        let mut sides = Vec::with_capacity(operands.len());
        for operand in operands {
            let value = self.evaluate(operand, scope)?;
            let mut keys = Vec::new();
            collect_references(&value, &mut keys).map_err(|found| CompilationError::Type {
                message: format!("relationship operand must be a resource reference, got {found}"),
                location: self.location(operand.span),
            })?;
            sides.push((keys, operand.span));
        }

        for (i, arrow) in arrows.iter().enumerate() {
            let kind = match arrow {
                Arrow::Before => EdgeKind::Before,
                Arrow::Notify => EdgeKind::Notify,
            };
            let (sources, span) = &sides[i];
            let (targets, _) = &sides[i + 1];
            for source in sources {
                for target in targets {
                    self.relationships
                        .push((Edge::new(source.clone(), target.clone(), kind), *span));
                }
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Resources
    // ------------------------------------------------------------------

    fn declare(&mut self, declaration: &ResourceDeclaration, scope: usize) -> Result<()> {
        for body in &declaration.bodies {
            let title = self.evaluate(&body.title, scope)?;
            let mut titles = Vec::new();
            self.titles(&title, body.title.span, &mut titles)?;

            let mut attributes: Vec<(&Attribute, Value)> = Vec::with_capacity(body.attributes.len());
            for attribute in &body.attributes {
                if attributes.iter().any(|(a, _)| a.name == attribute.name) {
                    return Err(CompilationError::InvalidParameter {
                        resource: ResourceKey::new(&declaration.type_name, title.to_string()).to_string(),
                        parameter: attribute.name.clone(),
                        message: "specified more than once".to_string(),
                        location: self.location(attribute.span),
                    });
                }
                let value = self.evaluate(&attribute.value, scope)?;
                attributes.push((attribute, value));
            }

            if declaration.type_name == "class" {
                for title in titles {
                    let parameters = attributes
                        .iter()
                        .filter(|(_, value)| !value.is_undef())
                        .map(|(attribute, value)| (attribute.name.clone(), value.clone()))
                        .collect();
                    self.declare_class(&title, Some(parameters), false, body.span)?;
                }
                continue;
            }

            for title in titles {
                self.declare_resource(&declaration.type_name, title, &attributes, body.span)?;
            }
        }
        Ok(())
    }

    fn declare_resource(
        &mut self,
        type_name: &str,
        title: String,
        attributes: &[(&Attribute, Value)],
        span: Span,
    ) -> Result<()> {
        let key = ResourceKey::new(type_name, title);
        let mut parameters = BTreeMap::new();
        let mut noop = false;

        for (attribute, value) in attributes {
            let name = attribute.name.as_str();
            match name {
                "require" | "before" | "notify" | "subscribe" => {
                    let mut others = Vec::new();
                    collect_references(value, &mut others).map_err(|found| {
                        CompilationError::InvalidParameter {
                            resource: key.to_string(),
                            parameter: name.to_string(),
                            message: format!("expects resource references, got {found}"),
                            location: self.location(attribute.span),
                        }
                    })?;
                    for other in others {
                        let edge = match name {
                            "require" => Edge::new(other, key.clone(), EdgeKind::Before),
                            "before" => Edge::new(key.clone(), other, EdgeKind::Before),
                            "notify" => Edge::new(key.clone(), other, EdgeKind::Notify),
                            _ => Edge::new(other, key.clone(), EdgeKind::Notify),
                        };
                        self.relationships.push((edge, attribute.span));
                    }
                }
                "noop" => match value {
                    Value::Boolean(b) => noop = *b,
                    Value::Undef => {}
                    other => {
                        return Err(CompilationError::InvalidParameter {
                            resource: key.to_string(),
                            parameter: name.to_string(),
                            message: format!("expects a Boolean, got {}", other.type_name()),
                            location: self.location(attribute.span),
                        });
                    }
                },
                _ if value.is_undef() => {}
                _ => {
                    parameters.insert(name.to_string(), value.clone());
                }
            }
        }

        let resource = AbstractResource::new(key.clone(), parameters)
            .with_noop(noop)
            .with_location(self.location(span));
        self.add(resource, span)?;
        let container = self.current_container();
        self.catalog
            .add_edge(Edge::new(container, key, EdgeKind::Contains));
        Ok(())
    }

    fn add(&mut self, resource: AbstractResource, span: Span) -> Result<()> {
        let second = self.location(span);
        if let Err(existing) = self.catalog.add_resource(resource) {
            return Err(CompilationError::DuplicateResource {
                resource: existing.key.to_string(),
                first: existing.declared_at.clone().unwrap_or_else(|| second.clone()),
                second,
            });
        }
        Ok(())
    }

    fn titles(&self, value: &Value, span: Span, out: &mut Vec<String>) -> Result<()> {
        match value {
            Value::String(title) if !title.is_empty() => {
                out.push(title.clone());
                Ok(())
            }
            Value::String(_) => Err(CompilationError::Type {
                message: "resource title cannot be empty".to_string(),
                location: self.location(span),
            }),
            Value::Array(items) => {
                for item in items {
                    self.titles(item, span, out)?;
                }
                Ok(())
            }
            other => Err(CompilationError::Type {
                message: format!(
                    "resource title must be a String or an Array of Strings, got {}",
                    other.type_name()
                ),
                location: self.location(span),
            }),
        }
    }

    // ------------------------------------------------------------------
    // Classes
    // ------------------------------------------------------------------

    /// Register the class definitions found at the top level of `ast`
    fn hoist(&mut self, ast: &Ast) -> Result<()> {
        match &ast.kind {
            AstKind::Block(statements) => {
                for statement in statements {
                    if let AstKind::ClassDefinition(definition) = &statement.kind {
                        self.define_class(definition, statement.span)?;
                    }
                }
                Ok(())
            }
            AstKind::ClassDefinition(definition) => self.define_class(definition, ast.span),
            _ => Ok(()),
        }
    }

    fn define_class(&mut self, definition: &ClassDefinition, span: Span) -> Result<()> {
        let name = class_name(&definition.name);
        if let Some(existing) = self.classes.get(&name) {
            if existing.span == span {
                return Ok(());
            }
            return Err(CompilationError::DuplicateResource {
                resource: format!("class definition '{name}'"),
                first: self.location(existing.span),
                second: self.location(span),
            });
        }
        self.classes.insert(
            name,
            ClassEntry {
                definition: Rc::new(definition.clone()),
                span,
            },
        );
        Ok(())
    }

    fn class_names(&self, value: &Value, span: Span, out: &mut Vec<String>) -> Result<()> {
        match value {
            Value::String(name) => out.push(class_name(name)),
            Value::Reference(key) if key.type_name == "class" => out.push(class_name(&key.title)),
            Value::Array(items) => {
                for item in items {
                    self.class_names(item, span, out)?;
                }
            }
            other => {
                return Err(CompilationError::Type {
                    message: format!("expected a class name, got {}", other.type_name()),
                    location: self.location(span),
                });
            }
        }
        Ok(())
    }

    /// Declare a class once. `parameters` is `Some` for resource-like
    /// declarations; `contain` ties the class to the current container.
    fn declare_class(
        &mut self,
        name: &str,
        parameters: Option<BTreeMap<String, Value>>,
        contain: bool,
        span: Span,
    ) -> Result<()> {
        let name = class_name(name);
        let key = ResourceKey::new("class", name.clone());
        let container = if contain {
            self.current_container()
        } else {
            main_class()
        };

        if let Some(existing) = self.catalog.resource(&key) {
            if parameters.is_some() {
                return Err(CompilationError::DuplicateResource {
                    resource: key.to_string(),
                    first: existing
                        .declared_at
                        .clone()
                        .unwrap_or_else(|| self.location(span)),
                    second: self.location(span),
                });
            }
            if contain {
                self.add_containment(container, key, span)?;
            }
            return Ok(());
        }

        let definition = self.find_class(&name, span)?;
        let given = parameters.unwrap_or_default();
        if let Some(unknown) = given
            .keys()
            .find(|given| !definition.parameters.iter().any(|p| &p.name == *given))
        {
            return Err(CompilationError::InvalidParameter {
                resource: key.to_string(),
                parameter: unknown.clone(),
                message: "class has no parameter with this name".to_string(),
                location: self.location(span),
            });
        }

        let scope = self.push_scope(Some(TOP_SCOPE));
        let mut bound = BTreeMap::new();
        for parameter in &definition.parameters {
            let value = match (given.get(&parameter.name), &parameter.default) {
                (Some(value), _) => value.clone(),
                (None, Some(default)) => self.evaluate(default, scope)?,
                (None, None) => {
                    return Err(CompilationError::InvalidParameter {
                        resource: key.to_string(),
                        parameter: parameter.name.clone(),
                        message: "expects a value".to_string(),
                        location: self.location(span),
                    });
                }
            };
            self.scopes[scope]
                .variables
                .insert(parameter.name.clone(), value.clone());
            if !value.is_undef() {
                bound.insert(parameter.name.clone(), value);
            }
        }
        for variable in ["title", "name"] {
            self.scopes[scope]
                .variables
                .entry(variable.to_string())
                .or_insert_with(|| Value::String(name.clone()));
        }
        self.class_scopes.insert(name, scope);

        let resource = AbstractResource::new(key.clone(), bound).with_location(self.location(span));
        self.add(resource, span)?;
        self.add_containment(container, key.clone(), span)?;

        self.containers.push(key);
        let result = self.statements(&definition.body, scope);
        self.containers.pop();
        result
    }

    fn add_containment(&mut self, container: ResourceKey, member: ResourceKey, span: Span) -> Result<()> {
        if container == member || self.catalog.contains_transitively(&member, &container) {
            return Err(CompilationError::CyclicContainment {
                container: container.to_string(),
                class: member.to_string(),
                location: self.location(span),
            });
        }
        self.catalog
            .add_edge(Edge::new(container, member, EdgeKind::Contains));
        Ok(())
    }

    fn find_class(&mut self, name: &str, span: Span) -> Result<Rc<ClassDefinition>> {
        if let Some(entry) = self.classes.get(name) {
            return Ok(Rc::clone(&entry.definition));
        }
        if let Some(path) = self.env.find_manifest(name)
            && self.loaded.insert(path.clone())
        {
            self.load_manifest(&path)?;
            if let Some(entry) = self.classes.get(name) {
                return Ok(Rc::clone(&entry.definition));
            }
        }
        Err(CompilationError::UnresolvedReference {
            message: format!("could not find class '{name}'"),
            location: self.location(span),
        })
    }

    fn load_manifest(&mut self, path: &Path) -> Result<()> {
        let display = path.display().to_string();
        let text = fs::read_to_string(path).map_err(|e| CompilationError::ModuleLoad {
            path: display.clone(),
            message: e.to_string(),
        })?;
        let parsed = parse_source(&display, &text, self.locators.len()).map_err(|e| {
            CompilationError::ModuleLoad {
                path: display.clone(),
                message: e.to_string(),
            }
        })?;
        debug!("Loaded module manifest {display}");
        self.locators.push(parsed.locator);
        self.hoist(&parsed.ast)
    }

    // ------------------------------------------------------------------
    // Nodes
    // ------------------------------------------------------------------

    fn node(&mut self, definitions: &[Ast]) -> Result<()> {
        if definitions.is_empty() {
            return Ok(());
        }
        let env = self.env;
        let node = env.node();

        let nodes: Vec<(&NodeDefinition, Span)> = definitions
            .iter()
            .filter_map(|ast| match &ast.kind {
                AstKind::NodeDefinition(definition) => Some((definition, ast.span)),
                _ => None,
            })
            .collect();

        let mut seen: HashMap<String, Span> = HashMap::new();
        for (definition, span) in &nodes {
            for matcher in &definition.matchers {
                let title = match matcher {
                    NodeMatcher::Name(name) => name.to_lowercase(),
                    NodeMatcher::Default => "default".to_string(),
                };
                if let Some(first) = seen.get(&title) {
                    return Err(CompilationError::DuplicateResource {
                        resource: ResourceKey::new("node", title).to_string(),
                        first: self.location(*first),
                        second: self.location(*span),
                    });
                }
                seen.insert(title, *span);
            }
        }

        let by_name = nodes.iter().find_map(|(definition, span)| {
            definition.matchers.iter().find_map(|matcher| match matcher {
                NodeMatcher::Name(name) if name.eq_ignore_ascii_case(node) => {
                    Some((*definition, *span, name.clone()))
                }
                _ => None,
            })
        });
        let matched = by_name.or_else(|| {
            nodes
                .iter()
                .find(|(definition, _)| definition.matchers.contains(&NodeMatcher::Default))
                .map(|(definition, span)| (*definition, *span, "default".to_string()))
        });
        let Some((definition, span, title)) = matched else {
            return Err(CompilationError::NodeNotFound {
                node: node.to_string(),
            });
        };

        debug!("Node '{node}' matched node definition '{title}'");
        let key = ResourceKey::new("node", title);
        let resource = AbstractResource::new(key.clone(), BTreeMap::new()).with_location(self.location(span));
        self.add(resource, span)?;
        self.add_containment(main_class(), key.clone(), span)?;

        let scope = self.push_scope(Some(TOP_SCOPE));
        self.containers.push(key);
        let result = self.statements(&definition.body, scope);
        self.containers.pop();
        result
    }

    fn finish(mut self) -> Result<Catalog> {
        for (edge, span) in std::mem::take(&mut self.relationships) {
            for endpoint in [&edge.source, &edge.target] {
                if !self.catalog.contains(endpoint) {
                    return Err(CompilationError::UnresolvedReference {
                        message: format!("could not find resource '{endpoint}' for relationship"),
                        location: self.location(span),
                    });
                }
            }
            self.catalog.add_edge(edge);
        }
        Ok(self.catalog)
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    fn evaluate(&mut self, expr: &Expr, scope: usize) -> Result<Value> {
        match &expr.kind {
            ExprKind::Undef => Ok(Value::Undef),
            ExprKind::Boolean(b) => Ok(Value::Boolean(*b)),
            ExprKind::Integer(n) => Ok(Value::Integer(*n)),
            ExprKind::Float(n) => Ok(Value::Float(*n)),
            ExprKind::String(s) => Ok(Value::String(s.clone())),
            ExprKind::Regex(pattern) => Ok(Value::Regex(pattern.clone())),
            ExprKind::Interpolated(parts) => {
                let mut out = String::new();
                for part in parts {
                    match part {
                        StringPart::Literal(text) => out.push_str(text),
                        StringPart::Expr(inner) => {
                            let value = self.evaluate(inner, scope)?;
                            if value.contains_deferred() {
                                return Err(CompilationError::Type {
                                    message: "a Deferred value cannot be interpolated".to_string(),
                                    location: self.location(inner.span),
                                });
                            }
                            out.push_str(&value.to_string());
                        }
                    }
                }
                Ok(Value::String(out))
            }
            ExprKind::Variable(name) => Ok(self.lookup(name, scope, expr.span)),
            ExprKind::Array(items) => items
                .iter()
                .map(|item| self.evaluate(item, scope))
                .collect::<Result<Vec<_>>>()
                .map(Value::Array),
            ExprKind::Hash(entries) => {
                let mut hash = BTreeMap::new();
                for (key_expr, value_expr) in entries {
                    let key = match self.evaluate(key_expr, scope)? {
                        Value::String(s) => s,
                        Value::Integer(n) => n.to_string(),
                        Value::Boolean(b) => b.to_string(),
                        other => {
                            return Err(CompilationError::Type {
                                message: format!("hash keys must be scalar, got {}", other.type_name()),
                                location: self.location(key_expr.span),
                            });
                        }
                    };
                    let value = self.evaluate(value_expr, scope)?;
                    hash.insert(key, value);
                }
                Ok(Value::Hash(hash))
            }
            ExprKind::Access { target, keys } => {
                let target = self.evaluate(target, scope)?;
                let keys = keys
                    .iter()
                    .map(|key| self.evaluate(key, scope))
                    .collect::<Result<Vec<_>>>()?;
                self.access(&target, &keys, expr.span)
            }
            ExprKind::ResourceReference { type_name, titles } => {
                let mut keys = Vec::new();
                for title_expr in titles {
                    let value = self.evaluate(title_expr, scope)?;
                    let mut expanded = Vec::new();
                    self.titles(&value, title_expr.span, &mut expanded)?;
                    for title in expanded {
                        let title = if type_name == "class" {
                            class_name(&title)
                        } else {
                            title
                        };
                        keys.push(ResourceKey::new(type_name.clone(), title));
                    }
                }
                if keys.len() == 1 {
                    Ok(Value::Reference(keys.remove(0)))
                } else {
                    Ok(Value::Array(keys.into_iter().map(Value::Reference).collect()))
                }
            }
            ExprKind::Call { name, arguments } => self.call(name, arguments, scope, expr.span),
            ExprKind::Binary { op, left, right } => self.binary(*op, left, right, scope),
            ExprKind::Not(inner) => Ok(Value::Boolean(!self.evaluate(inner, scope)?.is_truthy())),
        }
    }

    fn lookup(&mut self, name: &str, scope: usize, span: Span) -> Value {
        let found = match name.strip_prefix("::") {
            Some(top) if !top.contains("::") => self.scopes[TOP_SCOPE].variables.get(top),
            _ => {
                let name = name.trim_start_matches("::");
                match name.rsplit_once("::") {
                    Some((class, variable)) => self
                        .class_scopes
                        .get(class)
                        .and_then(|&index| self.scopes[index].variables.get(variable)),
                    None => self.lookup_chain(name, scope),
                }
            }
        };
        if let Some(value) = found {
            return value.clone();
        }
        if self.warned.insert(name.to_string()) {
            warn!("Unknown variable '${}' at {}", name, self.location(span));
        }
        Value::Undef
    }

    fn lookup_chain(&self, name: &str, scope: usize) -> Option<&Value> {
        let mut current = Some(scope);
        while let Some(index) = current {
            let scope = &self.scopes[index];
            if let Some(value) = scope.variables.get(name) {
                return Some(value);
            }
            current = scope.parent;
        }
        None
    }

    fn access(&self, target: &Value, keys: &[Value], span: Span) -> Result<Value> {
        let [key] = keys else {
            return Err(CompilationError::Type {
                message: format!("access expects exactly one key, got {}", keys.len()),
                location: self.location(span),
            });
        };
        match (target, key) {
            (Value::Hash(entries), Value::String(k)) => {
                Ok(entries.get(k).cloned().unwrap_or(Value::Undef))
            }
            (Value::Array(items), Value::Integer(i)) => {
                let index = if *i < 0 { items.len() as i64 + i } else { *i };
                Ok(usize::try_from(index)
                    .ok()
                    .and_then(|index| items.get(index))
                    .cloned()
                    .unwrap_or(Value::Undef))
            }
            (target, key) => Err(CompilationError::Type {
                message: format!(
                    "cannot access a value of type {} with a {} key",
                    target.type_name(),
                    key.type_name()
                ),
                location: self.location(span),
            }),
        }
    }

    fn binary(&mut self, op: BinaryOp, left: &Expr, right: &Expr, scope: usize) -> Result<Value> {
        match op {
            BinaryOp::And => {
                if !self.evaluate(left, scope)?.is_truthy() {
                    return Ok(Value::Boolean(false));
                }
                Ok(Value::Boolean(self.evaluate(right, scope)?.is_truthy()))
            }
            BinaryOp::Or => {
                if self.evaluate(left, scope)?.is_truthy() {
                    return Ok(Value::Boolean(true));
                }
                Ok(Value::Boolean(self.evaluate(right, scope)?.is_truthy()))
            }
            BinaryOp::Equal | BinaryOp::NotEqual => {
                let l = self.evaluate(left, scope)?;
                let r = self.evaluate(right, scope)?;
                let equal = l.loosely_equals(&r);
                Ok(Value::Boolean(if op == BinaryOp::Equal { equal } else { !equal }))
            }
            BinaryOp::Match | BinaryOp::NotMatch => {
                let l = self.evaluate(left, scope)?;
                let r = self.evaluate(right, scope)?;
                let Value::String(subject) = &l else {
                    return Err(CompilationError::Type {
                        message: format!("left operand of '{op}' must be a String, got {}", l.type_name()),
                        location: self.location(left.span),
                    });
                };
                let pattern = match &r {
                    Value::Regex(p) | Value::String(p) => p,
                    other => {
                        return Err(CompilationError::Type {
                            message: format!(
                                "right operand of '{op}' must be a Regexp, got {}",
                                other.type_name()
                            ),
                            location: self.location(right.span),
                        });
                    }
                };
                let regex = regex::Regex::new(pattern).map_err(|e| CompilationError::Type {
                    message: format!("invalid regular expression /{pattern}/: {e}"),
                    location: self.location(right.span),
                })?;
                let matched = regex.is_match(subject);
                Ok(Value::Boolean(if op == BinaryOp::Match { matched } else { !matched }))
            }
        }
    }

    fn call(&mut self, name: &str, arguments: &[Expr], scope: usize, span: Span) -> Result<Value> {
        let mut values = Vec::with_capacity(arguments.len());
        for argument in arguments {
            values.push(self.evaluate(argument, scope)?);
        }

        let message = || {
            values
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(" ")
        };
        let container = self.current_container();
        match name {
            "notice" | "info" => {
                info!("{container}: {}", message());
                Ok(Value::Undef)
            }
            "warning" => {
                warn!("{container}: {}", message());
                Ok(Value::Undef)
            }
            "debug" => {
                debug!("{container}: {}", message());
                Ok(Value::Undef)
            }
            "err" => {
                error!("{container}: {}", message());
                Ok(Value::Undef)
            }
            "fail" => Err(CompilationError::Failed {
                message: message(),
                location: self.location(span),
            }),
            "Deferred" => match values.as_slice() {
                [Value::String(function)] => Ok(Value::Deferred(Deferred {
                    function: function.clone(),
                    arguments: Vec::new(),
                })),
                [Value::String(function), Value::Array(arguments)] => Ok(Value::Deferred(Deferred {
                    function: function.clone(),
                    arguments: arguments.clone(),
                })),
                _ => Err(CompilationError::Type {
                    message: "Deferred expects a function name and an optional Array of arguments"
                        .to_string(),
                    location: self.location(span),
                }),
            },
            // Missing facts are undef at compile time; only deferred lookups fail
            "fact" if matches!(values.as_slice(), [Value::String(_)]) => {
                let path = values[0].as_str().unwrap_or_default();
                Ok(self.env.facts().get(path).cloned().unwrap_or(Value::Undef))
            }
            _ if functions::is_pure(name) => functions::call(name, &values, self.env.facts())
                .map_err(|message| CompilationError::Type {
                    message,
                    location: self.location(span),
                }),
            _ => Err(CompilationError::UnresolvedReference {
                message: format!("unknown function '{name}'"),
                location: self.location(span),
            }),
        }
    }
}

/// Flatten references (and arrays of them) into `out`; `undef` adds nothing.
/// Returns the offending type name otherwise.
fn collect_references(value: &Value, out: &mut Vec<ResourceKey>) -> std::result::Result<(), &'static str> {
    match value {
        Value::Reference(key) => out.push(key.clone()),
        Value::Array(items) => {
            for item in items {
                collect_references(item, out)?;
            }
        }
        Value::Undef => {}
        other => return Err(other.type_name()),
    }
    Ok(())
}
