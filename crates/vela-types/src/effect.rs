//! Effect labels, effect rows and the effect algebra.
//!
//! An [`EffectRow`] is an insertion-ordered set of effects plus an optional
//! open tail variable. Rows form a join-semilattice under [`EffectRow::union`]
//! with the pure row as identity.

use std::fmt;
use std::hash::{Hash, Hasher};

use indexmap::IndexSet;
use smol_str::SmolStr;

use crate::ty::{fmt_effect, fmt_row, Type, VarNames};

// ============================================================================
// Effect variables
// ============================================================================

/// Effect row variable for effect polymorphism
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EffectVar(pub u32);

impl fmt::Display for EffectVar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "?e{}", self.0)
    }
}

// ============================================================================
// Effects
// ============================================================================

/// A single effect label.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Effect {
    Io,
    Ai,
    Network,
    Async,
    State(Box<Type>),
    Exception(Box<Type>),
    /// A user-declared effect.
    Custom { name: SmolStr, args: Vec<Type> },
}

impl Effect {
    pub fn state(ty: Type) -> Effect {
        Effect::State(Box::new(ty))
    }

    pub fn exception(ty: Type) -> Effect {
        Effect::Exception(Box::new(ty))
    }

    /// The label, which identifies the effect regardless of its type arguments.
    pub fn label(&self) -> &str {
        match self {
            Effect::Io => "IO",
            Effect::Ai => "AI",
            Effect::Network => "Network",
            Effect::Async => "Async",
            Effect::State(_) => "State",
            Effect::Exception(_) => "Exception",
            Effect::Custom { name, .. } => name,
        }
    }

    pub fn type_args(&self) -> Vec<&Type> {
        match self {
            Effect::State(t) | Effect::Exception(t) => vec![t],
            Effect::Custom { args, .. } => args.iter().collect(),
            _ => vec![],
        }
    }

    /// Builds a builtin effect from its label, or `None` for user labels.
    /// Missing type arguments default to `Unknown`.
    pub fn builtin(label: &str, mut args: Vec<Type>) -> Option<Effect> {
        let mut payload = || Box::new(if args.is_empty() { Type::Unknown } else { args.remove(0) });
        Some(match label {
            "IO" => Effect::Io,
            "AI" => Effect::Ai,
            "Network" => Effect::Network,
            "Async" => Effect::Async,
            "State" => Effect::State(payload()),
            "Exception" => Effect::Exception(payload()),
            _ => return None,
        })
    }

    /// Number of type arguments a builtin label takes.
    pub fn builtin_arity(label: &str) -> Option<usize> {
        match label {
            "IO" | "AI" | "Network" | "Async" => Some(0),
            "State" | "Exception" => Some(1),
            _ => None,
        }
    }

    pub fn map_types(&self, mut f: impl FnMut(&Type) -> Type) -> Effect {
        match self {
            Effect::State(t) => Effect::State(Box::new(f(t))),
            Effect::Exception(t) => Effect::Exception(Box::new(f(t))),
            Effect::Custom { name, args } => Effect::Custom {
                name: name.clone(),
                args: args.iter().map(f).collect(),
            },
            other => other.clone(),
        }
    }
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_effect(self, &VarNames::default(), f)
    }
}

// ============================================================================
// Effect rows
// ============================================================================

/// A set of effects with an optional open tail.
#[derive(Debug, Clone, Default)]
pub struct EffectRow {
    effects: IndexSet<Effect>,
    tail: Option<EffectVar>,
}

impl PartialEq for EffectRow {
    /// Set equality; insertion order is not significant.
    fn eq(&self, other: &Self) -> bool {
        self.tail == other.tail && self.effects == other.effects
    }
}

impl Eq for EffectRow {}

impl Hash for EffectRow {
    // Order-insensitive, consistent with `eq`.
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.effects.len().hash(state);
        self.tail.hash(state);
    }
}

impl EffectRow {
    /// The empty row (∅).
    pub fn pure() -> Self {
        Self::default()
    }

    pub fn single(effect: Effect) -> Self {
        Self::closed([effect])
    }

    pub fn closed(effects: impl IntoIterator<Item = Effect>) -> Self {
        Self {
            effects: effects.into_iter().collect(),
            tail: None,
        }
    }

    pub fn open(effects: impl IntoIterator<Item = Effect>, tail: EffectVar) -> Self {
        Self {
            effects: effects.into_iter().collect(),
            tail: Some(tail),
        }
    }

    /// A row that is nothing but a variable.
    pub fn var(tail: EffectVar) -> Self {
        Self::open([], tail)
    }

    pub fn is_pure(&self) -> bool {
        self.effects.is_empty() && self.tail.is_none()
    }

    /// True when no concrete effects are listed (a tail may still be present).
    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    pub fn is_closed(&self) -> bool {
        self.tail.is_none()
    }

    pub fn tail(&self) -> Option<EffectVar> {
        self.tail
    }

    pub fn iter(&self) -> impl Iterator<Item = &Effect> {
        self.effects.iter()
    }

    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn labels(&self) -> Vec<&str> {
        self.effects.iter().map(Effect::label).collect()
    }

    pub fn contains(&self, effect: &Effect) -> bool {
        self.effects.contains(effect)
    }

    pub fn contains_label(&self, label: &str) -> bool {
        self.effects.iter().any(|e| e.label() == label)
    }

    /// First effect carrying `label`.
    pub fn find_label(&self, label: &str) -> Option<&Effect> {
        self.effects.iter().find(|e| e.label() == label)
    }

    pub fn insert(&mut self, effect: Effect) -> bool {
        self.effects.insert(effect)
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.insert(effect);
        self
    }

    pub fn with_tail(mut self, tail: Option<EffectVar>) -> Self {
        self.tail = tail;
        self
    }

    /// The same effects without a tail.
    pub fn closed_part(&self) -> Self {
        Self {
            effects: self.effects.clone(),
            tail: None,
        }
    }

    /// Join. Effects keep left-to-right first-occurrence order. When both
    /// rows have distinct tails the smaller variable is kept; callers that
    /// need both tails unify them first.
    pub fn union(&self, other: &EffectRow) -> EffectRow {
        let mut effects = self.effects.clone();
        effects.extend(other.effects.iter().cloned());
        let tail = match (self.tail, other.tail) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        EffectRow { effects, tail }
    }

    /// `self ≤ other`: every effect of `self` appears in `other`, and an open
    /// `self` shares `other`'s tail.
    pub fn is_subset_of(&self, other: &EffectRow) -> bool {
        self.effects.iter().all(|e| other.effects.contains(e))
            && (self.tail.is_none() || self.tail == other.tail)
    }

    /// Removes every effect labelled `label` (a fully handled effect).
    pub fn mask(&self, label: &str) -> EffectRow {
        EffectRow {
            effects: self
                .effects
                .iter()
                .filter(|e| e.label() != label)
                .cloned()
                .collect(),
            tail: self.tail,
        }
    }

    pub fn map_effects(&self, mut f: impl FnMut(&Effect) -> Effect) -> EffectRow {
        EffectRow {
            effects: self.effects.iter().map(&mut f).collect(),
            tail: self.tail,
        }
    }
}

impl fmt::Display for EffectRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_row(self, &VarNames::default(), f)
    }
}

// ============================================================================
// Primitive effect table
// ============================================================================

/// Intrinsic effect of a primitive operation. `payload` is the state or
/// exception type for `get`/`put`/`throw` and defaults to `Unknown`.
pub fn infer_primitive_effect(op: &str, payload: Option<&Type>) -> Option<EffectRow> {
    let payload = || payload.cloned().unwrap_or(Type::Unknown);
    let effect = match op {
        "print" | "println" | "read_line" => Effect::Io,
        "query" | "verify" | "generate" | "embed" | "classify" => Effect::Ai,
        "fetch" => Effect::Network,
        "sleep" | "spawn" => Effect::Async,
        "get" | "put" => Effect::state(payload()),
        "throw" => Effect::exception(payload()),
        _ => return None,
    };
    Some(EffectRow::single(effect))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    // ------------------------------------------------------------------------
    // Row algebra
    // ------------------------------------------------------------------------

    #[test]
    fn test_union_keeps_first_occurrence_order() {
        let a = EffectRow::closed([Effect::Io, Effect::Ai]);
        let b = EffectRow::closed([Effect::Network, Effect::Io]);
        let joined = a.union(&b);
        assert_eq!(joined.labels(), vec!["IO", "AI", "Network"]);
    }

    #[test]
    fn test_equality_ignores_order() {
        let a = EffectRow::closed([Effect::Io, Effect::Ai]);
        let b = EffectRow::closed([Effect::Ai, Effect::Io]);
        assert_eq!(a, b);
        assert_ne!(a, b.clone().with_tail(Some(EffectVar(0))));
    }

    #[test]
    fn test_subset() {
        let io = EffectRow::single(Effect::Io);
        let io_ai = EffectRow::closed([Effect::Io, Effect::Ai]);
        assert!(EffectRow::pure().is_subset_of(&io));
        assert!(io.is_subset_of(&io_ai));
        assert!(!io_ai.is_subset_of(&io));
        // An open row is only below rows sharing its tail.
        let open = EffectRow::open([Effect::Io], EffectVar(1));
        assert!(!open.is_subset_of(&io_ai));
        assert!(open.is_subset_of(&EffectRow::open([Effect::Io, Effect::Ai], EffectVar(1))));
    }

    #[test]
    fn test_mask_removes_every_instance_of_label() {
        let row = EffectRow::closed([
            Effect::exception(Type::String),
            Effect::Io,
            Effect::exception(Type::Int),
        ]);
        let masked = row.mask("Exception");
        assert_eq!(masked, EffectRow::single(Effect::Io));
        assert_eq!(row.mask("AI"), row);
    }

    #[test]
    fn test_payload_distinguishes_effects() {
        let mut row = EffectRow::single(Effect::state(Type::Int));
        assert!(row.insert(Effect::state(Type::String)));
        assert!(!row.insert(Effect::state(Type::Int)));
        assert_eq!(row.len(), 2);
        assert!(row.contains_label("State"));
    }

    #[test]
    fn test_display() {
        assert_eq!(EffectRow::pure().to_string(), "{}");
        assert_eq!(
            EffectRow::closed([Effect::Io, Effect::exception(Type::String)]).to_string(),
            "{IO, Exception<String>}"
        );
        assert_eq!(EffectRow::open([Effect::Ai], EffectVar(2)).to_string(), "{AI | ?e2}");
        assert_eq!(EffectRow::var(EffectVar(0)).to_string(), "{?e0}");
    }

    // ------------------------------------------------------------------------
    // Primitive table
    // ------------------------------------------------------------------------

    #[test]
    fn test_primitive_effects() {
        assert_eq!(infer_primitive_effect("print", None), Some(EffectRow::single(Effect::Io)));
        for op in ["query", "verify", "generate", "embed", "classify"] {
            assert_eq!(infer_primitive_effect(op, None), Some(EffectRow::single(Effect::Ai)));
        }
        assert_eq!(
            infer_primitive_effect("put", Some(&Type::Int)),
            Some(EffectRow::single(Effect::state(Type::Int)))
        );
        assert_eq!(
            infer_primitive_effect("throw", None),
            Some(EffectRow::single(Effect::exception(Type::Unknown)))
        );
        assert_eq!(infer_primitive_effect("to_string", None), None);
    }

    #[test]
    fn test_builtin_labels() {
        assert_eq!(Effect::builtin("IO", vec![]), Some(Effect::Io));
        assert_eq!(Effect::builtin("State", vec![Type::Int]), Some(Effect::state(Type::Int)));
        assert_eq!(Effect::builtin("Log", vec![]), None);
        assert_eq!(Effect::builtin_arity("Exception"), Some(1));
    }
}
