//! Lexical scope annotation.
//!
//! A pre-order walk builds a scope tree keyed by the owning node's span:
//! functions and arrows open function scopes seeded with their parameters
//! (rest parameters included), while blocks, `for` heads and catch clauses
//! open block scopes. `var` and function declarations attach to the nearest
//! function scope; `let`/`const`/class declarations to the innermost scope.
//! The rewriter's fact-collection walk re-enters the same scopes by span.

use std::collections::HashMap;

use oxc_ast::ast::*;
use oxc_ast_visit::{walk, Visit};
use oxc_syntax::scope::ScopeFlags;

pub const ROOT_SCOPE: usize = 0;

#[derive(Debug)]
pub struct ScopeData {
    pub parent: Option<usize>,
    pub function: bool,
    pub names: Vec<String>,
}

#[derive(Debug)]
pub struct ScopeTree {
    scopes: Vec<ScopeData>,
    by_span: HashMap<(u32, u32), usize>,
}

impl ScopeTree {
    fn new() -> Self {
        ScopeTree {
            scopes: vec![ScopeData {
                parent: None,
                function: true,
                names: Vec::new(),
            }],
            by_span: HashMap::new(),
        }
    }

    pub fn lookup(&self, start: u32, end: u32) -> Option<usize> {
        self.by_span.get(&(start, end)).copied()
    }

    /// Walk `scope` and its ancestors for `name`. With `ignore_top_level`
    /// the root scope reports a miss, which lets callers distinguish
    /// shadowing locals from top-level declarations.
    pub fn contains(&self, scope: usize, name: &str, ignore_top_level: bool) -> bool {
        let mut current = Some(scope);
        while let Some(index) = current {
            let data = &self.scopes[index];
            if data.parent.is_none() && ignore_top_level {
                return false;
            }
            if data.names.iter().any(|n| n == name) {
                return true;
            }
            current = data.parent;
        }
        false
    }

    pub fn root_names(&self) -> &[String] {
        &self.scopes[ROOT_SCOPE].names
    }

    pub fn is_function(&self, scope: usize) -> bool {
        self.scopes[scope].function
    }
}

/// Innermost function scope on a walk stack.
pub fn function_scope(tree: &ScopeTree, stack: &[usize]) -> usize {
    stack
        .iter()
        .rev()
        .copied()
        .find(|&i| tree.is_function(i))
        .unwrap_or(ROOT_SCOPE)
}

// ═══════════════════════════════════════════════════════════════════════════════
// PATTERN HELPERS
// ═══════════════════════════════════════════════════════════════════════════════

/// Collect every bound name in a binding pattern.
pub fn collect_pattern_names(pattern: &BindingPattern, names: &mut Vec<String>) {
    match &pattern.kind {
        BindingPatternKind::BindingIdentifier(id) => names.push(id.name.to_string()),
        BindingPatternKind::ObjectPattern(obj) => {
            for prop in &obj.properties {
                collect_pattern_names(&prop.value, names);
            }
            if let Some(rest) = &obj.rest {
                collect_pattern_names(&rest.argument, names);
            }
        }
        BindingPatternKind::ArrayPattern(arr) => {
            for element in arr.elements.iter().flatten() {
                collect_pattern_names(element, names);
            }
            if let Some(rest) = &arr.rest {
                collect_pattern_names(&rest.argument, names);
            }
        }
        BindingPatternKind::AssignmentPattern(assign) => {
            collect_pattern_names(&assign.left, names);
        }
    }
}

/// Collect every bound identifier with its span, for rename sites.
pub fn collect_pattern_identifiers(pattern: &BindingPattern, out: &mut Vec<(String, u32, u32)>) {
    match &pattern.kind {
        BindingPatternKind::BindingIdentifier(id) => {
            out.push((id.name.to_string(), id.span.start, id.span.end));
        }
        BindingPatternKind::ObjectPattern(obj) => {
            for prop in &obj.properties {
                collect_pattern_identifiers(&prop.value, out);
            }
            if let Some(rest) = &obj.rest {
                collect_pattern_identifiers(&rest.argument, out);
            }
        }
        BindingPatternKind::ArrayPattern(arr) => {
            for element in arr.elements.iter().flatten() {
                collect_pattern_identifiers(element, out);
            }
            if let Some(rest) = &arr.rest {
                collect_pattern_identifiers(&rest.argument, out);
            }
        }
        BindingPatternKind::AssignmentPattern(assign) => {
            collect_pattern_identifiers(&assign.left, out);
        }
    }
}

fn parameter_names(params: &FormalParameters) -> Vec<String> {
    let mut names = Vec::new();
    for param in &params.items {
        collect_pattern_names(&param.pattern, &mut names);
    }
    if let Some(rest) = &params.rest {
        collect_pattern_names(&rest.argument, &mut names);
    }
    names
}

// ═══════════════════════════════════════════════════════════════════════════════
// BUILDER
// ═══════════════════════════════════════════════════════════════════════════════

pub struct ScopeBuilder {
    tree: ScopeTree,
    stack: Vec<usize>,
    top_level_functions: Vec<String>,
}

impl ScopeBuilder {
    pub fn new() -> Self {
        ScopeBuilder {
            tree: ScopeTree::new(),
            stack: vec![ROOT_SCOPE],
            top_level_functions: Vec::new(),
        }
    }

    pub fn finish(self) -> (ScopeTree, Vec<String>) {
        (self.tree, self.top_level_functions)
    }

    fn current(&self) -> usize {
        *self.stack.last().unwrap_or(&ROOT_SCOPE)
    }

    fn push_scope(&mut self, start: u32, end: u32, function: bool, names: Vec<String>) {
        let index = self.tree.scopes.len();
        self.tree.scopes.push(ScopeData {
            parent: Some(self.current()),
            function,
            names,
        });
        self.tree.by_span.insert((start, end), index);
        self.stack.push(index);
    }

    fn pop_scope(&mut self) {
        self.stack.pop();
    }

    fn declare_in(&mut self, scope: usize, name: String) {
        let names = &mut self.tree.scopes[scope].names;
        if !names.iter().any(|n| n == &name) {
            names.push(name);
        }
    }
}

impl Default for ScopeBuilder {
    fn default() -> Self {
        ScopeBuilder::new()
    }
}

impl<'a> Visit<'a> for ScopeBuilder {
    fn visit_variable_declaration(&mut self, decl: &VariableDeclaration<'a>) {
        let mut names = Vec::new();
        for declarator in &decl.declarations {
            collect_pattern_names(&declarator.id, &mut names);
        }
        let target = if decl.kind == VariableDeclarationKind::Var {
            function_scope(&self.tree, &self.stack)
        } else {
            self.current()
        };
        for name in names {
            self.declare_in(target, name);
        }
        walk::walk_variable_declaration(self, decl);
    }

    fn visit_function(&mut self, func: &Function<'a>, flags: ScopeFlags) {
        let mut own = Vec::new();
        if let Some(id) = &func.id {
            if matches!(func.r#type, FunctionType::FunctionDeclaration) {
                let target = function_scope(&self.tree, &self.stack);
                self.declare_in(target, id.name.to_string());
                if target == ROOT_SCOPE {
                    self.top_level_functions.push(id.name.to_string());
                }
            } else {
                // A function expression's name is only visible inside it.
                own.push(id.name.to_string());
            }
        }
        own.extend(parameter_names(&func.params));
        self.push_scope(func.span.start, func.span.end, true, own);
        walk::walk_function(self, func, flags);
        self.pop_scope();
    }

    fn visit_arrow_function_expression(&mut self, func: &ArrowFunctionExpression<'a>) {
        let names = parameter_names(&func.params);
        self.push_scope(func.span.start, func.span.end, true, names);
        walk::walk_arrow_function_expression(self, func);
        self.pop_scope();
    }

    fn visit_class(&mut self, class: &Class<'a>) {
        if let Some(id) = &class.id {
            if matches!(class.r#type, ClassType::ClassDeclaration) {
                let current = self.current();
                self.declare_in(current, id.name.to_string());
            }
        }
        walk::walk_class(self, class);
    }

    fn visit_block_statement(&mut self, block: &BlockStatement<'a>) {
        self.push_scope(block.span.start, block.span.end, false, Vec::new());
        walk::walk_block_statement(self, block);
        self.pop_scope();
    }

    fn visit_for_statement(&mut self, stmt: &ForStatement<'a>) {
        self.push_scope(stmt.span.start, stmt.span.end, false, Vec::new());
        walk::walk_for_statement(self, stmt);
        self.pop_scope();
    }

    fn visit_for_in_statement(&mut self, stmt: &ForInStatement<'a>) {
        self.push_scope(stmt.span.start, stmt.span.end, false, Vec::new());
        walk::walk_for_in_statement(self, stmt);
        self.pop_scope();
    }

    fn visit_for_of_statement(&mut self, stmt: &ForOfStatement<'a>) {
        self.push_scope(stmt.span.start, stmt.span.end, false, Vec::new());
        walk::walk_for_of_statement(self, stmt);
        self.pop_scope();
    }

    fn visit_catch_clause(&mut self, clause: &CatchClause<'a>) {
        let mut names = Vec::new();
        if let Some(param) = &clause.param {
            collect_pattern_names(&param.pattern, &mut names);
        }
        self.push_scope(clause.span.start, clause.span.end, false, names);
        walk::walk_catch_clause(self, clause);
        self.pop_scope();
    }

    fn visit_import_declaration(&mut self, _decl: &ImportDeclaration<'a>) {
        // Import bindings are replaced away by the rewriter, never declared.
    }

    fn visit_export_all_declaration(&mut self, _decl: &ExportAllDeclaration<'a>) {}

    fn visit_export_named_declaration(&mut self, decl: &ExportNamedDeclaration<'a>) {
        if decl.declaration.is_some() {
            walk::walk_export_named_declaration(self, decl);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse_program;
    use oxc_allocator::Allocator;

    fn build(source: &str) -> (ScopeTree, Vec<String>) {
        let allocator = Allocator::default();
        let program = parse_program(&allocator, source, "test.js").unwrap();
        let mut builder = ScopeBuilder::new();
        builder.visit_program(&program);
        builder.finish()
    }

    #[test]
    fn test_top_level_names() {
        let (tree, functions) = build("var a = 1;\nlet b = 2;\nfunction f(x) {}\nclass C {}\n");
        assert_eq!(tree.root_names(), ["a", "b", "f", "C"]);
        assert_eq!(functions, ["f"]);
    }

    #[test]
    fn test_var_hoists_out_of_blocks() {
        let (tree, _) = build("if (x) { var a = 1; let b = 2; }\n");
        assert_eq!(tree.root_names(), ["a"]);
    }

    #[test]
    fn test_contains_ignore_top_level() {
        let (tree, _) = build("var a = 1;\nfunction f(a) { return a; }\n");
        assert!(tree.contains(ROOT_SCOPE, "a", false));
        assert!(!tree.contains(ROOT_SCOPE, "a", true));
    }

    #[test]
    fn test_rest_parameters_are_scoped() {
        let source = "function f(...rest) { return rest; }\n";
        let (tree, _) = build(source);
        let f_start = source.find("function").unwrap() as u32;
        let f_end = source.rfind('}').unwrap() as u32 + 1;
        let scope = tree.lookup(f_start, f_end).expect("function scope");
        assert!(tree.contains(scope, "rest", true));
    }

    #[test]
    fn test_destructured_params() {
        let source = "function f({ a, b: c }, [d]) {}\n";
        let (tree, _) = build(source);
        let f_start = source.find("function").unwrap() as u32;
        let f_end = source.rfind('}').unwrap() as u32 + 1;
        let scope = tree.lookup(f_start, f_end).expect("function scope");
        for name in ["a", "c", "d"] {
            assert!(tree.contains(scope, name, true), "missing {name}");
        }
        assert!(!tree.contains(scope, "b", true));
    }
}
