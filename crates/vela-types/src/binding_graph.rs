//! Dependency graph between top-level functions.
//!
//! Functions that reference each other form a binding group (a strongly
//! connected component). Groups are checked together and generalized
//! together; groups on the same level do not depend on each other.

use indexmap::IndexSet;
use rustc_hash::FxHashMap;
use smol_str::SmolStr;
use vela_ast::{Block, Expr, ExprKind, StmtKind};

/// Directed graph of references between bindings, keyed by position.
#[derive(Debug, Clone, Default)]
pub struct BindingGraph {
    /// Adjacency list: binding -> bindings it references
    dependencies: Vec<Vec<usize>>,
}

/// Strongly connected bindings, sorted by position.
pub type BindingGroup = Vec<usize>;

impl BindingGraph {
    pub fn new(len: usize) -> Self {
        Self {
            dependencies: vec![Vec::new(); len],
        }
    }

    pub fn len(&self) -> usize {
        self.dependencies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dependencies.is_empty()
    }

    /// Add a dependency edge
    pub fn add_dependency(&mut self, from: usize, to: usize) {
        if let Some(deps) = self.dependencies.get_mut(from) {
            if !deps.contains(&to) {
                deps.push(to);
            }
        }
    }

    /// Get direct dependencies of a binding
    pub fn get_dependencies(&self, id: usize) -> &[usize] {
        self.dependencies.get(id).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Tarjan's algorithm. Groups come out dependencies first.
    pub fn groups(&self) -> Vec<BindingGroup> {
        let mut state = Tarjan {
            graph: self,
            index: vec![None; self.len()],
            lowlink: vec![0; self.len()],
            on_stack: vec![false; self.len()],
            stack: Vec::new(),
            next_index: 0,
            groups: Vec::new(),
        };
        for node in 0..self.len() {
            if state.index[node].is_none() {
                state.visit(node);
            }
        }
        state.groups
    }

    /// Groups arranged in levels: every group depends only on groups of
    /// earlier levels.
    pub fn levels(&self) -> Vec<Vec<BindingGroup>> {
        let groups = self.groups();
        let mut group_of = vec![0; self.len()];
        for (g, members) in groups.iter().enumerate() {
            for &m in members {
                group_of[m] = g;
            }
        }

        let mut level_of: Vec<usize> = Vec::with_capacity(groups.len());
        let mut levels: Vec<Vec<BindingGroup>> = Vec::new();
        for (g, members) in groups.iter().enumerate() {
            // Dependencies of a group always precede it in Tarjan order.
            let level = members
                .iter()
                .flat_map(|&m| self.get_dependencies(m))
                .map(|&d| group_of[d])
                .filter(|&dg| dg != g)
                .map(|dg| level_of[dg] + 1)
                .max()
                .unwrap_or(0);
            level_of.push(level);
            if levels.len() <= level {
                levels.resize_with(level + 1, Vec::new);
            }
            levels[level].push(members.clone());
        }
        for level in &mut levels {
            level.sort_by_key(|group| group[0]);
        }
        levels
    }
}

struct Tarjan<'g> {
    graph: &'g BindingGraph,
    index: Vec<Option<usize>>,
    lowlink: Vec<usize>,
    on_stack: Vec<bool>,
    stack: Vec<usize>,
    next_index: usize,
    groups: Vec<BindingGroup>,
}

impl Tarjan<'_> {
    fn visit(&mut self, node: usize) {
        self.index[node] = Some(self.next_index);
        self.lowlink[node] = self.next_index;
        self.next_index += 1;
        self.stack.push(node);
        self.on_stack[node] = true;

        for &dep in self.graph.get_dependencies(node) {
            match self.index[dep] {
                None => {
                    self.visit(dep);
                    self.lowlink[node] = self.lowlink[node].min(self.lowlink[dep]);
                }
                Some(dep_index) if self.on_stack[dep] => {
                    self.lowlink[node] = self.lowlink[node].min(dep_index);
                }
                Some(_) => {}
            }
        }

        if Some(self.lowlink[node]) == self.index[node] {
            let mut group = Vec::new();
            while let Some(member) = self.stack.pop() {
                self.on_stack[member] = false;
                group.push(member);
                if member == node {
                    break;
                }
            }
            group.sort_unstable();
            self.groups.push(group);
        }
    }
}

/// Builds the graph for `names` (binding i is `names[i]` with body
/// `bodies[i]`) from the free names each body references.
pub fn build_graph<'a>(names: &[SmolStr], bodies: impl IntoIterator<Item = (usize, &'a Expr)>) -> BindingGraph {
    let position: FxHashMap<&SmolStr, usize> = names.iter().enumerate().map(|(i, n)| (n, i)).collect();
    let mut graph = BindingGraph::new(names.len());
    for (from, body) in bodies {
        for name in free_names(body) {
            if let Some(&to) = position.get(&name) {
                graph.add_dependency(from, to);
            }
        }
    }
    graph
}

/// Names referenced by `expr` that are not bound inside it.
pub fn free_names(expr: &Expr) -> IndexSet<SmolStr> {
    let mut walker = FreeNames::default();
    walker.expr(expr);
    walker.free
}

#[derive(Default)]
struct FreeNames {
    bound: Vec<SmolStr>,
    free: IndexSet<SmolStr>,
}

impl FreeNames {
    fn reference(&mut self, name: &SmolStr) {
        if !self.bound.contains(name) {
            self.free.insert(name.clone());
        }
    }

    fn scoped(&mut self, names: impl IntoIterator<Item = SmolStr>, f: impl FnOnce(&mut Self)) {
        let mark = self.bound.len();
        self.bound.extend(names);
        f(self);
        self.bound.truncate(mark);
    }

    fn block(&mut self, block: &Block) {
        let mark = self.bound.len();
        for stmt in &block.stmts {
            match &stmt.kind {
                StmtKind::Expr(e) => self.expr(e),
                StmtKind::Let { name, value, .. } => {
                    self.expr(value);
                    self.bound.push(name.node.clone());
                }
                StmtKind::Assign { target, value } => {
                    self.expr(target);
                    self.expr(value);
                }
            }
        }
        if let Some(result) = &block.result {
            self.expr(result);
        }
        self.bound.truncate(mark);
    }

    fn expr(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::Integer(_)
            | ExprKind::Float(_)
            | ExprKind::String(_)
            | ExprKind::Bool(_)
            | ExprKind::Unit
            | ExprKind::Error => {}
            ExprKind::Ident(name) => self.reference(name),
            ExprKind::Tuple(es) | ExprKind::Array(es) => es.iter().for_each(|e| self.expr(e)),
            ExprKind::Record(fields) | ExprKind::StructInit { fields, .. } | ExprKind::Ai { fields, .. } => {
                fields.iter().for_each(|f| self.expr(&f.value))
            }
            ExprKind::Field { object, .. } => self.expr(object),
            ExprKind::Index { object, index } => {
                self.expr(object);
                self.expr(index);
            }
            ExprKind::Binary { left, right, .. } => {
                self.expr(left);
                self.expr(right);
            }
            ExprKind::Unary { operand, .. } => self.expr(operand),
            ExprKind::Call { func, args } => {
                self.expr(func);
                args.iter().for_each(|a| self.expr(a));
            }
            ExprKind::Lambda { params, body, .. } => {
                self.scoped(params.iter().map(|p| p.name.node.clone()), |w| w.expr(body))
            }
            ExprKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.expr(condition);
                self.expr(then_branch);
                if let Some(e) = else_branch {
                    self.expr(e);
                }
            }
            ExprKind::Block(block) => self.block(block),
            ExprKind::Annotated { expr, .. } | ExprKind::AiInline(expr) => self.expr(expr),
            ExprKind::Handle {
                body,
                handlers,
                return_clause,
            } => {
                self.expr(body);
                for clause in handlers {
                    let names = clause
                        .params
                        .iter()
                        .map(|p| p.node.clone())
                        .chain(std::iter::once(SmolStr::new("resume")));
                    self.scoped(names, |w| w.expr(&clause.body));
                }
                if let Some(ret) = return_clause {
                    self.scoped([ret.param.node.clone()], |w| w.expr(&ret.body));
                }
            }
            ExprKind::PromptCall { args, .. } => args.iter().for_each(|a| self.expr(a)),
        }
    }
}
