/// Static liveness: which names a shader's entry point can reach
///
/// Each function is scanned once for variable references, member accesses
/// and calls. Parameters and local declarations shadow globals of the same
/// name for the rest of their block. `Usage::reachable` then follows calls
/// from the entry point; overloads share a name and are merged.

use glsl::syntax::{
    CaseLabel, CompoundStatement, Condition, Declaration, Expr, ForInitStatement, FunIdentifier,
    FunctionDefinition, FunctionParameterDeclaration, Initializer, IterationStatement,
    JumpStatement, SelectionRestStatement, SimpleStatement, Statement,
};
use glsl::visitor::{Host, Visit, Visitor};
use rustc_hash::{FxHashMap, FxHashSet};

/// Names referenced by one or more function bodies
#[derive(Debug, Default, Clone)]
pub struct Usage {
    /// Every `Expr::Variable` occurrence
    uses: FxHashMap<String, u32>,
    /// Occurrences that are the root of a member access (`v.x`, `v[i].x`)
    dotted: FxHashMap<String, u32>,
    /// `(root, member)` pairs
    members: FxHashSet<(String, String)>,
    calls: FxHashSet<String>,
}

impl Usage {
    /// References made by a function, parameters excluded
    pub fn of_function(def: &FunctionDefinition) -> Self {
        let mut usage = Self::default();
        let mut scan = Scan::new(&mut usage);

        for parameter in &def.prototype.parameters {
            if let FunctionParameterDeclaration::Named(_, declarator) = parameter {
                scan.declare(&declarator.ident.ident.0);
            }
        }
        scan.compound(&def.statement);

        usage
    }

    /// Add the references of a global initializer
    pub fn add_initializer(&mut self, initializer: &Initializer) {
        Scan::new(self).initializer(initializer);
    }

    pub fn merge(&mut self, other: &Usage) {
        for (name, count) in &other.uses {
            *self.uses.entry(name.clone()).or_default() += count;
        }
        for (name, count) in &other.dotted {
            *self.dotted.entry(name.clone()).or_default() += count;
        }
        self.members.extend(other.members.iter().cloned());
        self.calls.extend(other.calls.iter().cloned());
    }

    /// Union of `entry` and every function it transitively calls
    ///
    /// Returns `None` when `entry` is not defined.
    pub fn reachable(functions: &FxHashMap<String, Usage>, entry: &str) -> Option<Usage> {
        let mut live = functions.get(entry)?.clone();
        let mut visited: FxHashSet<String> = FxHashSet::default();
        visited.insert(entry.to_string());
        let mut pending: Vec<String> = live.calls.iter().cloned().collect();

        while let Some(callee) = pending.pop() {
            if !visited.insert(callee.clone()) {
                continue;
            }
            // Builtins and constructors have no body
            let Some(usage) = functions.get(&callee) else {
                continue;
            };
            pending.extend(usage.calls.iter().filter(|c| !visited.contains(*c)).cloned());
            live.merge(usage);
        }

        Some(live)
    }

    /// `name` appears anywhere, with or without a member access
    pub fn references(&self, name: &str) -> bool {
        self.uses.contains_key(name)
    }

    /// `name` appears at least once without a member access
    pub fn bare(&self, name: &str) -> bool {
        let uses = self.uses.get(name).copied().unwrap_or(0);
        let dotted = self.dotted.get(name).copied().unwrap_or(0);
        uses > dotted
    }

    /// `root.member` (or `root[i].member`) appears
    pub fn accesses(&self, root: &str, member: &str) -> bool {
        self.members.contains(&(root.to_string(), member.to_string()))
    }
}

// ===== SCAN =====

/// Statement walk with a stack of local scopes
///
/// Statements are walked by hand so that scopes can be popped; expressions
/// go through the `glsl` visitor.
struct Scan<'a> {
    usage: &'a mut Usage,
    scopes: Vec<FxHashSet<String>>,
}

impl<'a> Scan<'a> {
    fn new(usage: &'a mut Usage) -> Self {
        Self {
            usage,
            scopes: vec![FxHashSet::default()],
        }
    }

    fn declare(&mut self, name: &str) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string());
        }
    }

    fn is_local(&self, name: &str) -> bool {
        self.scopes.iter().any(|scope| scope.contains(name))
    }

    fn scoped<F: FnOnce(&mut Self)>(&mut self, walk: F) {
        self.scopes.push(FxHashSet::default());
        walk(self);
        self.scopes.pop();
    }

    fn expr(&mut self, expr: &Expr) {
        expr.visit(self);
    }

    fn initializer(&mut self, initializer: &Initializer) {
        match initializer {
            Initializer::Simple(expr) => self.expr(expr),
            Initializer::List(items) => {
                for item in items.0.iter() {
                    self.initializer(item);
                }
            }
        }
    }

    fn compound(&mut self, compound: &CompoundStatement) {
        self.scoped(|scan| {
            for statement in &compound.statement_list {
                scan.statement(statement);
            }
        });
    }

    /// Body of a selection or loop: a new scope even without braces
    fn nested(&mut self, statement: &Statement) {
        self.scoped(|scan| scan.statement(statement));
    }

    fn statement(&mut self, statement: &Statement) {
        match statement {
            Statement::Compound(compound) => self.compound(compound),
            Statement::Simple(simple) => self.simple(simple),
        }
    }

    fn simple(&mut self, simple: &SimpleStatement) {
        match simple {
            SimpleStatement::Declaration(declaration) => self.declaration(declaration),
            SimpleStatement::Expression(expr) => {
                if let Some(expr) = expr {
                    self.expr(expr);
                }
            }
            SimpleStatement::Selection(selection) => {
                self.expr(&selection.cond);
                match &selection.rest {
                    SelectionRestStatement::Statement(then) => self.nested(then),
                    SelectionRestStatement::Else(then, otherwise) => {
                        self.nested(then);
                        self.nested(otherwise);
                    }
                }
            }
            SimpleStatement::Switch(switch) => {
                self.expr(&switch.head);
                self.scoped(|scan| {
                    for statement in &switch.body {
                        scan.statement(statement);
                    }
                });
            }
            SimpleStatement::CaseLabel(CaseLabel::Case(expr)) => self.expr(expr),
            SimpleStatement::CaseLabel(CaseLabel::Def) => {}
            SimpleStatement::Iteration(iteration) => self.iteration(iteration),
            SimpleStatement::Jump(JumpStatement::Return(Some(expr))) => self.expr(expr),
            SimpleStatement::Jump(_) => {}
        }
    }

    fn iteration(&mut self, iteration: &IterationStatement) {
        match iteration {
            IterationStatement::While(condition, body) => self.scoped(|scan| {
                scan.condition(condition);
                scan.nested(body);
            }),
            IterationStatement::DoWhile(body, cond) => {
                self.nested(body);
                self.expr(cond);
            }
            IterationStatement::For(init, rest, body) => self.scoped(|scan| {
                match init {
                    ForInitStatement::Expression(Some(expr)) => scan.expr(expr),
                    ForInitStatement::Expression(None) => {}
                    ForInitStatement::Declaration(declaration) => scan.declaration(declaration),
                }
                if let Some(condition) = &rest.condition {
                    scan.condition(condition);
                }
                if let Some(post) = &rest.post_expr {
                    scan.expr(post);
                }
                scan.nested(body);
            }),
        }
    }

    fn condition(&mut self, condition: &Condition) {
        match condition {
            Condition::Expr(expr) => self.expr(expr),
            Condition::Assignment(_, name, initializer) => {
                self.initializer(initializer);
                self.declare(&name.0);
            }
        }
    }

    /// A local is in scope after its own initializer
    fn declaration(&mut self, declaration: &Declaration) {
        let Declaration::InitDeclaratorList(list) = declaration else {
            return;
        };

        if let Some(initializer) = &list.head.initializer {
            self.initializer(initializer);
        }
        if let Some(name) = &list.head.name {
            self.declare(&name.0);
        }
        for tail in &list.tail {
            if let Some(initializer) = &tail.initializer {
                self.initializer(initializer);
            }
            self.declare(&tail.ident.ident.0);
        }
    }
}

impl Visitor for Scan<'_> {
    fn visit_expr(&mut self, expr: &Expr) -> Visit {
        match expr {
            Expr::Variable(name) if !self.is_local(&name.0) => {
                *self.usage.uses.entry(name.0.clone()).or_default() += 1;
            }
            Expr::Dot(base, member) => {
                if let Some(root) = root_variable(base).filter(|root| !self.is_local(root)) {
                    *self.usage.dotted.entry(root.to_string()).or_default() += 1;
                    self.usage.members.insert((root.to_string(), member.0.clone()));
                }
            }
            Expr::FunCall(FunIdentifier::Identifier(name), _) => {
                self.usage.calls.insert(name.0.clone());
            }
            _ => {}
        }
        Visit::Children
    }
}

/// Variable at the root of `v`, `v[i]`, `v[i][j]`
fn root_variable(expr: &Expr) -> Option<&str> {
    match expr {
        Expr::Variable(name) => Some(&name.0),
        Expr::Bracket(base, _) => root_variable(base),
        _ => None,
    }
}

#[cfg(test)]
#[path = "usage_tests.rs"]
mod tests;
