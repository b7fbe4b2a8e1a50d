//! Lexical type environment (Γ).

use indexmap::{IndexMap, IndexSet};
use smol_str::SmolStr;

use crate::effect::EffectVar;
use crate::scheme::Scheme;
use crate::subst::{Substitution, Types};
use crate::ty::TypeVar;

/// A variable binding.
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub scheme: Scheme,
    pub mutable: bool,
}

/// A stack of scopes. Inner scopes shadow outer ones.
#[derive(Debug, Clone)]
pub struct TypeEnv {
    scopes: Vec<IndexMap<SmolStr, Binding>>,
}

impl Default for TypeEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeEnv {
    pub fn new() -> Self {
        Self {
            scopes: vec![IndexMap::new()],
        }
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(IndexMap::new());
    }

    pub fn pop_scope(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    pub fn define(&mut self, name: impl Into<SmolStr>, scheme: Scheme) {
        self.insert(name.into(), scheme, false);
    }

    pub fn define_mut(&mut self, name: impl Into<SmolStr>, scheme: Scheme) {
        self.insert(name.into(), scheme, true);
    }

    fn insert(&mut self, name: SmolStr, scheme: Scheme, mutable: bool) {
        if let Some(scope) = self.scopes.last_mut() {
            // Re-binding in the same scope moves the name to the end.
            scope.shift_remove(&name);
            scope.insert(name, Binding { scheme, mutable });
        }
    }

    /// Nearest binding of `name`.
    pub fn lookup(&self, name: &str) -> Option<&Binding> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }

    /// Free variables of every binding after applying `subst`.
    pub fn free_vars_under(&self, subst: &Substitution) -> (IndexSet<TypeVar>, IndexSet<EffectVar>) {
        let mut types = IndexSet::new();
        let mut effects = IndexSet::new();
        for binding in self.scopes.iter().flat_map(|s| s.values()) {
            let scheme = binding.scheme.apply(subst);
            scheme.collect_type_vars(&mut types);
            scheme.collect_effect_vars(&mut effects);
        }
        (types, effects)
    }

    /// Every visible name, innermost first, without duplicates.
    pub fn names(&self) -> impl Iterator<Item = &SmolStr> {
        let mut seen = IndexSet::new();
        self.scopes
            .iter()
            .rev()
            .flat_map(|s| s.keys())
            .filter(move |name| seen.insert(*name))
    }
}

/// Names within `max_distance` edits of `target`, closest first.
pub fn similar_names<'a>(
    target: &str,
    candidates: impl IntoIterator<Item = &'a str>,
    max_distance: usize,
) -> Vec<SmolStr> {
    let mut matches: Vec<(usize, &str)> = candidates
        .into_iter()
        .filter(|name| *name != target)
        .map(|name| (levenshtein_distance(target, name), name))
        .filter(|(dist, _)| *dist <= max_distance)
        .collect();
    matches.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(b.1)));
    matches.dedup_by(|a, b| a.1 == b.1);
    matches.into_iter().map(|(_, name)| SmolStr::new(name)).collect()
}

fn levenshtein_distance(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != *cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}
