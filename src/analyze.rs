//! Fact collection for the body rewriter.
//!
//! A second walk over the tree, re-entering the scopes the annotator built,
//! distils everything the rewriter needs into plain data keyed by original
//! offsets: reference sites (with shadowing precomputed), top-level binding
//! sites, assignment and update sites, namespace-member assignment targets,
//! top-level `this`, and template-literal ranges. After this pass the tree
//! is discarded.

use oxc_ast::ast::*;
use oxc_ast_visit::{walk, Visit};
use oxc_span::GetSpan;
use oxc_syntax::scope::ScopeFlags;

use crate::scope::{
    collect_pattern_identifiers, function_scope, ScopeTree, ROOT_SCOPE,
};

// ═══════════════════════════════════════════════════════════════════════════════
// FACTS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
pub struct Reference {
    pub name: String,
    pub start: u32,
    pub end: u32,
    pub shadowed: bool,
    pub shorthand: bool,
}

#[derive(Debug, Clone)]
pub struct BindingSite {
    pub name: String,
    pub start: u32,
    pub end: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignKind {
    Assign,
    UpdatePrefix,
    UpdatePostfix,
}

#[derive(Debug, Clone)]
pub struct Assignment {
    pub name: String,
    pub start: u32,
    pub end: u32,
    pub kind: AssignKind,
    pub shadowed: bool,
    /// End offset of the enclosing variable declaration, when the site sits
    /// inside a declarator initializer.
    pub declaration_end: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct NamespaceTarget {
    pub object: String,
    pub shadowed: bool,
}

#[derive(Debug, Clone, Default)]
pub struct Analysis {
    pub references: Vec<Reference>,
    pub top_level_bindings: Vec<BindingSite>,
    pub assignments: Vec<Assignment>,
    pub namespace_targets: Vec<NamespaceTarget>,
    pub this_spans: Vec<(u32, u32)>,
    pub this_member: Option<(u32, u32)>,
    pub template_ranges: Vec<(u32, u32)>,
    pub sourcemap_comments: Vec<(u32, u32)>,
    pub top_level_names: Vec<String>,
    pub top_level_functions: Vec<String>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// COLLECTOR
// ═══════════════════════════════════════════════════════════════════════════════

pub struct FactCollector<'t> {
    tree: &'t ScopeTree,
    stack: Vec<usize>,
    /// Nesting depth of real functions; arrows keep the module-level `this`.
    this_depth: u32,
    declaration_end: Option<u32>,
    /// Spans of declarations sitting in a `for` head rather than statement
    /// position; captured updates must never target those.
    for_head_declarations: Vec<(u32, u32)>,
    facts: Analysis,
}

impl<'t> FactCollector<'t> {
    pub fn new(tree: &'t ScopeTree) -> Self {
        FactCollector {
            tree,
            stack: vec![ROOT_SCOPE],
            this_depth: 0,
            declaration_end: None,
            for_head_declarations: Vec::new(),
            facts: Analysis::default(),
        }
    }

    pub fn finish(self) -> Analysis {
        self.facts
    }

    fn current(&self) -> usize {
        *self.stack.last().unwrap_or(&ROOT_SCOPE)
    }

    fn shadowed(&self, name: &str) -> bool {
        self.tree.contains(self.current(), name, true)
    }

    fn enter(&mut self, start: u32, end: u32) -> bool {
        match self.tree.lookup(start, end) {
            Some(index) => {
                self.stack.push(index);
                true
            }
            None => false,
        }
    }

    fn exit(&mut self, entered: bool) {
        if entered {
            self.stack.pop();
        }
    }
}

impl<'t, 'a> Visit<'a> for FactCollector<'t> {
    fn visit_identifier_reference(&mut self, ident: &IdentifierReference<'a>) {
        self.facts.references.push(Reference {
            name: ident.name.to_string(),
            start: ident.span.start,
            end: ident.span.end,
            shadowed: self.shadowed(&ident.name),
            shorthand: false,
        });
    }

    fn visit_object_property(&mut self, prop: &ObjectProperty<'a>) {
        if prop.shorthand {
            if let Expression::Identifier(ident) = &prop.value {
                self.facts.references.push(Reference {
                    name: ident.name.to_string(),
                    start: ident.span.start,
                    end: ident.span.end,
                    shadowed: self.shadowed(&ident.name),
                    shorthand: true,
                });
                return;
            }
        }
        walk::walk_object_property(self, prop);
    }

    fn visit_variable_declaration(&mut self, decl: &VariableDeclaration<'a>) {
        let target = if decl.kind == VariableDeclarationKind::Var {
            function_scope(self.tree, &self.stack)
        } else {
            self.current()
        };
        if target == ROOT_SCOPE {
            let mut sites = Vec::new();
            for declarator in &decl.declarations {
                collect_pattern_identifiers(&declarator.id, &mut sites);
            }
            for (name, start, end) in sites {
                self.facts.top_level_bindings.push(BindingSite { name, start, end });
            }
        }
        let statement_position = !self
            .for_head_declarations
            .contains(&(decl.span.start, decl.span.end));
        let previous = self.declaration_end;
        self.declaration_end = if statement_position {
            Some(decl.span.end)
        } else {
            None
        };
        walk::walk_variable_declaration(self, decl);
        self.declaration_end = previous;
    }

    fn visit_function(&mut self, func: &Function<'a>, flags: ScopeFlags) {
        if let Some(id) = &func.id {
            if matches!(func.r#type, FunctionType::FunctionDeclaration)
                && function_scope(self.tree, &self.stack) == ROOT_SCOPE
            {
                self.facts.top_level_bindings.push(BindingSite {
                    name: id.name.to_string(),
                    start: id.span.start,
                    end: id.span.end,
                });
            }
        }
        let previous = self.declaration_end.take();
        self.this_depth += 1;
        let entered = self.enter(func.span.start, func.span.end);
        walk::walk_function(self, func, flags);
        self.exit(entered);
        self.this_depth -= 1;
        self.declaration_end = previous;
    }

    fn visit_arrow_function_expression(&mut self, func: &ArrowFunctionExpression<'a>) {
        let previous = self.declaration_end.take();
        let entered = self.enter(func.span.start, func.span.end);
        walk::walk_arrow_function_expression(self, func);
        self.exit(entered);
        self.declaration_end = previous;
    }

    fn visit_class(&mut self, class: &Class<'a>) {
        if let Some(id) = &class.id {
            if matches!(class.r#type, ClassType::ClassDeclaration) && self.current() == ROOT_SCOPE {
                self.facts.top_level_bindings.push(BindingSite {
                    name: id.name.to_string(),
                    start: id.span.start,
                    end: id.span.end,
                });
            }
        }
        walk::walk_class(self, class);
    }

    fn visit_block_statement(&mut self, block: &BlockStatement<'a>) {
        let entered = self.enter(block.span.start, block.span.end);
        walk::walk_block_statement(self, block);
        self.exit(entered);
    }

    fn visit_for_statement(&mut self, stmt: &ForStatement<'a>) {
        let entered = self.enter(stmt.span.start, stmt.span.end);
        let head = match &stmt.init {
            Some(ForStatementInit::VariableDeclaration(decl)) => {
                self.for_head_declarations.push((decl.span.start, decl.span.end));
                true
            }
            _ => false,
        };
        walk::walk_for_statement(self, stmt);
        if head {
            self.for_head_declarations.pop();
        }
        self.exit(entered);
    }

    fn visit_for_in_statement(&mut self, stmt: &ForInStatement<'a>) {
        let entered = self.enter(stmt.span.start, stmt.span.end);
        let head = self.enter_for_head(&stmt.left);
        walk::walk_for_in_statement(self, stmt);
        if head {
            self.for_head_declarations.pop();
        }
        self.exit(entered);
    }

    fn visit_for_of_statement(&mut self, stmt: &ForOfStatement<'a>) {
        let entered = self.enter(stmt.span.start, stmt.span.end);
        let head = self.enter_for_head(&stmt.left);
        walk::walk_for_of_statement(self, stmt);
        if head {
            self.for_head_declarations.pop();
        }
        self.exit(entered);
    }

    fn visit_catch_clause(&mut self, clause: &CatchClause<'a>) {
        let entered = self.enter(clause.span.start, clause.span.end);
        walk::walk_catch_clause(self, clause);
        self.exit(entered);
    }

    fn visit_assignment_expression(&mut self, assign: &AssignmentExpression<'a>) {
        match &assign.left {
            AssignmentTarget::AssignmentTargetIdentifier(target) => {
                self.facts.assignments.push(Assignment {
                    name: target.name.to_string(),
                    start: assign.span.start,
                    end: assign.span.end,
                    kind: AssignKind::Assign,
                    shadowed: self.shadowed(&target.name),
                    declaration_end: self.declaration_end,
                });
            }
            AssignmentTarget::StaticMemberExpression(member) => {
                self.record_namespace_target(&member.object);
            }
            AssignmentTarget::ComputedMemberExpression(member) => {
                self.record_namespace_target(&member.object);
            }
            _ => {}
        }
        walk::walk_assignment_expression(self, assign);
    }

    fn visit_update_expression(&mut self, update: &UpdateExpression<'a>) {
        if let SimpleAssignmentTarget::AssignmentTargetIdentifier(target) = &update.argument {
            self.facts.assignments.push(Assignment {
                name: target.name.to_string(),
                start: update.span.start,
                end: update.span.end,
                kind: if update.prefix {
                    AssignKind::UpdatePrefix
                } else {
                    AssignKind::UpdatePostfix
                },
                shadowed: self.shadowed(&target.name),
                declaration_end: self.declaration_end,
            });
        }
        walk::walk_update_expression(self, update);
    }

    fn visit_this_expression(&mut self, this: &ThisExpression) {
        if self.this_depth == 0 {
            self.facts.this_spans.push((this.span.start, this.span.end));
        }
    }

    fn visit_static_member_expression(&mut self, member: &StaticMemberExpression<'a>) {
        self.check_this_member(&member.object, member.span());
        walk::walk_static_member_expression(self, member);
    }

    fn visit_computed_member_expression(&mut self, member: &ComputedMemberExpression<'a>) {
        self.check_this_member(&member.object, member.span());
        walk::walk_computed_member_expression(self, member);
    }

    fn visit_template_literal(&mut self, template: &TemplateLiteral<'a>) {
        self.facts
            .template_ranges
            .push((template.span.start, template.span.end));
        walk::walk_template_literal(self, template);
    }

    fn visit_import_declaration(&mut self, _decl: &ImportDeclaration<'a>) {
        // Deleted wholesale by the rewriter; nothing inside is a rewrite site.
    }

    fn visit_export_all_declaration(&mut self, _decl: &ExportAllDeclaration<'a>) {}

    fn visit_export_named_declaration(&mut self, decl: &ExportNamedDeclaration<'a>) {
        if decl.declaration.is_some() {
            walk::walk_export_named_declaration(self, decl);
        }
    }
}

impl<'t> FactCollector<'t> {
    fn enter_for_head(&mut self, left: &ForStatementLeft<'_>) -> bool {
        if let ForStatementLeft::VariableDeclaration(decl) = left {
            self.for_head_declarations.push((decl.span.start, decl.span.end));
            true
        } else {
            false
        }
    }

    fn record_namespace_target(&mut self, object: &Expression<'_>) {
        if let Expression::Identifier(ident) = object {
            self.facts.namespace_targets.push(NamespaceTarget {
                object: ident.name.to_string(),
                shadowed: self.shadowed(&ident.name),
            });
        }
    }

    fn check_this_member(&mut self, object: &Expression<'_>, span: oxc_span::Span) {
        if self.this_depth == 0
            && matches!(object, Expression::ThisExpression(_))
            && self.facts.this_member.is_none()
        {
            self.facts.this_member = Some((span.start, span.end));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse_program;
    use crate::scope::ScopeBuilder;
    use oxc_allocator::Allocator;

    fn analyze(source: &str) -> Analysis {
        let allocator = Allocator::default();
        let program = parse_program(&allocator, source, "test.js").unwrap();
        let mut builder = ScopeBuilder::new();
        builder.visit_program(&program);
        let (tree, functions) = builder.finish();
        let mut collector = FactCollector::new(&tree);
        collector.visit_program(&program);
        let mut facts = collector.finish();
        facts.top_level_names = tree.root_names().to_vec();
        facts.top_level_functions = functions;
        facts
    }

    #[test]
    fn test_shadowed_references() {
        let facts = analyze("var a = 1;\nfunction f(a) { return a; }\nf(a);\n");
        let refs: Vec<(&str, bool)> = facts
            .references
            .iter()
            .map(|r| (r.name.as_str(), r.shadowed))
            .collect();
        assert!(refs.contains(&("a", true)), "param use is shadowed");
        assert!(refs.contains(&("a", false)), "top-level use is not");
    }

    #[test]
    fn test_shorthand_property() {
        let facts = analyze("var x = 1;\nvar o = { x };\n");
        assert!(facts.references.iter().any(|r| r.name == "x" && r.shorthand));
    }

    #[test]
    fn test_assignment_in_declarator() {
        let facts = analyze("var a = b++;\nb++;\n");
        let in_decl: Vec<bool> = facts
            .assignments
            .iter()
            .map(|a| a.declaration_end.is_some())
            .collect();
        assert_eq!(in_decl, [true, false]);
    }

    #[test]
    fn test_for_head_declarators_are_not_statement_position() {
        let facts = analyze("for (var i = 0, j = i++; i < 10; i++) { j = i; }\n");
        assert!(
            facts.assignments.iter().all(|a| a.declaration_end.is_none()),
            "{:?}",
            facts.assignments
        );
    }

    #[test]
    fn test_for_body_declarators_keep_statement_position() {
        let facts = analyze("for (var i = 0; i < 2; i++) { var j = i++; }\n");
        assert!(facts
            .assignments
            .iter()
            .any(|a| a.declaration_end.is_some()));
    }

    #[test]
    fn test_for_of_head_declaration_suspended() {
        let facts = analyze("for (var [a = b++] of list) { a; }\n");
        assert!(facts.assignments.iter().all(|a| a.declaration_end.is_none()));
    }

    #[test]
    fn test_top_level_this() {
        let facts = analyze("var self = this;\nfunction f() { return this; }\n");
        assert_eq!(facts.this_spans.len(), 1);
        assert!(facts.this_member.is_none());
    }

    #[test]
    fn test_arrow_keeps_module_this() {
        let facts = analyze("var f = () => this;\n");
        assert_eq!(facts.this_spans.len(), 1);
    }

    #[test]
    fn test_top_level_this_member_flagged() {
        let facts = analyze("this.x = 1;\n");
        assert!(facts.this_member.is_some());
    }

    #[test]
    fn test_template_ranges() {
        let facts = analyze("var t = `a\n${x}\nb`;\n");
        assert_eq!(facts.template_ranges.len(), 1);
        assert!(facts.references.iter().any(|r| r.name == "x"));
    }

    #[test]
    fn test_import_sites_are_skipped() {
        let facts = analyze("import { x } from './a';\nx();\n");
        assert_eq!(
            facts.references.iter().filter(|r| r.name == "x").count(),
            1
        );
    }
}
