//! Types, type variables and the named-type arena (Δ).

use std::fmt;

use rustc_hash::FxHashMap;
use smol_str::SmolStr;
use vela_ast::Span;

use crate::effect::{Effect, EffectRow, EffectVar};
use crate::subst::{Substitution, Types};

// ============================================================================
// Type variables
// ============================================================================

/// Type variable for inference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeVar(pub u32);

impl fmt::Display for TypeVar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "?{}", self.0)
    }
}

// ============================================================================
// Records
// ============================================================================

/// Ordered label -> type mapping with unique labels.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct RecordType {
    fields: Vec<(SmolStr, Type)>,
}

impl RecordType {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a field. Returns false (and leaves the record unchanged)
    /// when the label is already present.
    pub fn insert(&mut self, label: impl Into<SmolStr>, ty: Type) -> bool {
        let label = label.into();
        if self.get(&label).is_some() {
            return false;
        }
        self.fields.push((label, ty));
        true
    }

    pub fn get(&self, label: &str) -> Option<&Type> {
        self.fields.iter().find(|(l, _)| l == label).map(|(_, t)| t)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SmolStr, &Type)> {
        self.fields.iter().map(|(l, t)| (l, t))
    }

    pub fn labels(&self) -> impl Iterator<Item = &SmolStr> {
        self.fields.iter().map(|(l, _)| l)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn map_types(&self, mut f: impl FnMut(&Type) -> Type) -> RecordType {
        RecordType {
            fields: self.fields.iter().map(|(l, t)| (l.clone(), f(t))).collect(),
        }
    }
}

impl<L: Into<SmolStr>> FromIterator<(L, Type)> for RecordType {
    /// Later duplicates of a label are dropped.
    fn from_iter<I: IntoIterator<Item = (L, Type)>>(iter: I) -> Self {
        let mut record = RecordType::new();
        for (label, ty) in iter {
            record.insert(label, ty);
        }
        record
    }
}

// ============================================================================
// Types
// ============================================================================

/// Vela types
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    // Primitive types
    Int,
    Float,
    String,
    Bool,
    Unit,

    /// Function type with its latent effect row.
    Function {
        params: Vec<Type>,
        ret: Box<Type>,
        effects: EffectRow,
    },
    Tuple(Vec<Type>),
    Array(Box<Type>),
    Record(RecordType),
    Reference {
        mutable: bool,
        inner: Box<Type>,
    },
    /// `AI<T>`: the result of an AI operation.
    Ai(Box<Type>),
    /// `Effect<T>`: a suspended effectful computation.
    Effect(Box<Type>),

    /// `∀vars. body`
    Forall {
        vars: Vec<TypeVar>,
        effect_vars: Vec<EffectVar>,
        body: Box<Type>,
    },

    /// Reference into the named-type arena. `name` is kept for display only.
    Named {
        id: TypeDefId,
        name: SmolStr,
        args: Vec<Type>,
    },

    // Type variable (for inference)
    Var(TypeVar),

    /// Result of a failed subexpression. Compatible with everything.
    Error,
    /// Type of a reference to a declaration that failed collection.
    Unknown,
}

impl Type {
    /// A pure function type.
    pub fn function(params: Vec<Type>, ret: Type) -> Type {
        Type::function_with(params, ret, EffectRow::pure())
    }

    pub fn function_with(params: Vec<Type>, ret: Type, effects: EffectRow) -> Type {
        Type::Function {
            params,
            ret: Box::new(ret),
            effects,
        }
    }

    pub fn array(element: Type) -> Type {
        Type::Array(Box::new(element))
    }

    pub fn ai(inner: Type) -> Type {
        Type::Ai(Box::new(inner))
    }

    pub fn reference(mutable: bool, inner: Type) -> Type {
        Type::Reference {
            mutable,
            inner: Box::new(inner),
        }
    }

    pub fn record<L: Into<SmolStr>>(fields: impl IntoIterator<Item = (L, Type)>) -> Type {
        Type::Record(fields.into_iter().collect())
    }

    /// `Error` or `Unknown`.
    pub fn is_sentinel(&self) -> bool {
        matches!(self, Type::Error | Type::Unknown)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Type::Int | Type::Float)
    }

    pub fn is_var(&self) -> bool {
        matches!(self, Type::Var(_))
    }

    /// True if any unification variable occurs in the type.
    pub fn has_vars(&self) -> bool {
        !self.free_type_vars().is_empty() || !self.free_effect_vars().is_empty()
    }
}

// ============================================================================
// Display
// ============================================================================

/// Display names for quantified variables.
#[derive(Debug, Clone, Default)]
pub(crate) struct VarNames {
    types: FxHashMap<TypeVar, String>,
    effects: FxHashMap<EffectVar, String>,
}

impl VarNames {
    /// Names quantified variables `a, b, c, ...` (skipping `e`) and effect
    /// variables `e, e1, e2, ...`, continuing after any names already bound.
    pub(crate) fn bind(&self, vars: &[TypeVar], effect_vars: &[EffectVar]) -> VarNames {
        let mut names = self.clone();
        let letters: Vec<char> = ('a'..='z').filter(|c| *c != 'e').collect();
        for var in vars {
            let i = names.types.len();
            let suffix = i / letters.len();
            let mut name = letters[i % letters.len()].to_string();
            if suffix > 0 {
                name.push_str(&suffix.to_string());
            }
            names.types.insert(*var, name);
        }
        for var in effect_vars {
            let i = names.effects.len();
            let name = if i == 0 { "e".to_string() } else { format!("e{}", i) };
            names.effects.insert(*var, name);
        }
        names
    }

    /// `a b e`: the display names of a binder list, type variables first.
    pub(crate) fn binders(&self, vars: &[TypeVar], effect_vars: &[EffectVar]) -> String {
        let types = vars.iter().filter_map(|v| self.types.get(v));
        let effects = effect_vars.iter().filter_map(|v| self.effects.get(v));
        types.chain(effects).map(String::as_str).collect::<Vec<_>>().join(" ")
    }
}

pub(crate) fn fmt_type(ty: &Type, names: &VarNames, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match ty {
        Type::Int => write!(f, "Int"),
        Type::Float => write!(f, "Float"),
        Type::String => write!(f, "String"),
        Type::Bool => write!(f, "Bool"),
        Type::Unit => write!(f, "Unit"),
        Type::Function {
            params,
            ret,
            effects,
        } => {
            match params.as_slice() {
                [single] if !matches!(single, Type::Function { .. } | Type::Tuple(_) | Type::Forall { .. }) => {
                    fmt_type(single, names, f)?;
                }
                _ => {
                    write!(f, "(")?;
                    for (i, p) in params.iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        fmt_type(p, names, f)?;
                    }
                    write!(f, ")")?;
                }
            }
            write!(f, " -> ")?;
            fmt_type(ret, names, f)?;
            if !effects.is_pure() {
                write!(f, " ! ")?;
                fmt_row(effects, names, f)?;
            }
            Ok(())
        }
        Type::Tuple(elements) => {
            write!(f, "(")?;
            for (i, t) in elements.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                fmt_type(t, names, f)?;
            }
            write!(f, ")")
        }
        Type::Array(element) => {
            write!(f, "[")?;
            fmt_type(element, names, f)?;
            write!(f, "]")
        }
        Type::Record(record) => {
            write!(f, "{{")?;
            for (i, (label, t)) in record.iter().enumerate() {
                if i > 0 {
                    write!(f, ",")?;
                }
                write!(f, " {}: ", label)?;
                fmt_type(t, names, f)?;
            }
            if record.is_empty() {
                write!(f, "}}")
            } else {
                write!(f, " }}")
            }
        }
        Type::Reference { mutable, inner } => {
            write!(f, "{}", if *mutable { "&mut " } else { "&" })?;
            fmt_type(inner, names, f)
        }
        Type::Ai(inner) => {
            write!(f, "AI<")?;
            fmt_type(inner, names, f)?;
            write!(f, ">")
        }
        Type::Effect(inner) => {
            write!(f, "Effect<")?;
            fmt_type(inner, names, f)?;
            write!(f, ">")
        }
        Type::Forall {
            vars,
            effect_vars,
            body,
        } => {
            let inner = names.bind(vars, effect_vars);
            write!(f, "∀{}. ", inner.binders(vars, effect_vars))?;
            fmt_type(body, &inner, f)
        }
        Type::Named { name, args, .. } => {
            write!(f, "{}", name)?;
            if !args.is_empty() {
                write!(f, "<")?;
                for (i, a) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    fmt_type(a, names, f)?;
                }
                write!(f, ">")?;
            }
            Ok(())
        }
        Type::Var(var) => match names.types.get(var) {
            Some(name) => write!(f, "{}", name),
            None => write!(f, "{}", var),
        },
        Type::Error => write!(f, "<error>"),
        Type::Unknown => write!(f, "<unknown>"),
    }
}

pub(crate) fn fmt_effect(effect: &Effect, names: &VarNames, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", effect.label())?;
    let args = effect.type_args();
    if !args.is_empty() {
        write!(f, "<")?;
        for (i, a) in args.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            fmt_type(a, names, f)?;
        }
        write!(f, ">")?;
    }
    Ok(())
}

pub(crate) fn fmt_row(row: &EffectRow, names: &VarNames, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{{")?;
    for (i, effect) in row.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        fmt_effect(effect, names, f)?;
    }
    if let Some(tail) = row.tail() {
        if !row.is_empty() {
            write!(f, " | ")?;
        }
        match names.effects.get(&tail) {
            Some(name) => write!(f, "{}", name)?,
            None => write!(f, "{}", tail)?,
        }
    }
    write!(f, "}}")
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_type(self, &VarNames::default(), f)
    }
}

// ============================================================================
// Named type arena (Δ)
// ============================================================================

/// Key into [`TypeDefs`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeDefId(pub u32);

/// A struct declaration: `struct Name<params> { fields }`.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeDef {
    pub name: SmolStr,
    pub params: Vec<TypeVar>,
    pub fields: RecordType,
    pub span: Span,
}

/// Append-only table of named types. Recursive types refer to themselves
/// through [`Type::Named`] keys, never by inlining.
#[derive(Debug, Clone, Default)]
pub struct TypeDefs {
    defs: Vec<TypeDef>,
    by_name: FxHashMap<SmolStr, TypeDefId>,
}

impl TypeDefs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a type name with its parameters; fields are filled in later
    /// so that declarations may refer to each other.
    pub fn declare(&mut self, name: SmolStr, params: Vec<TypeVar>, span: Span) -> TypeDefId {
        let id = TypeDefId(self.defs.len() as u32);
        self.by_name.insert(name.clone(), id);
        self.defs.push(TypeDef {
            name,
            params,
            fields: RecordType::new(),
            span,
        });
        id
    }

    pub fn set_fields(&mut self, id: TypeDefId, fields: RecordType) {
        if let Some(def) = self.defs.get_mut(id.0 as usize) {
            def.fields = fields;
        }
    }

    pub fn get(&self, id: TypeDefId) -> Option<&TypeDef> {
        self.defs.get(id.0 as usize)
    }

    pub fn lookup(&self, name: &str) -> Option<TypeDefId> {
        self.by_name.get(name).copied()
    }

    /// The named type applied to `args`, as a `Type::Named`.
    pub fn named(&self, id: TypeDefId, args: Vec<Type>) -> Option<Type> {
        let def = self.get(id)?;
        Some(Type::Named {
            id,
            name: def.name.clone(),
            args,
        })
    }

    /// One level of unfolding: the struct's record with `args` substituted
    /// for its parameters.
    pub fn unfold(&self, id: TypeDefId, args: &[Type]) -> Option<RecordType> {
        let def = self.get(id)?;
        if def.params.len() != args.len() {
            return None;
        }
        let mut subst = Substitution::new();
        for (param, arg) in def.params.iter().zip(args) {
            subst.bind_type(*param, arg.clone());
        }
        Some(def.fields.map_types(|t| t.apply(&subst)))
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (TypeDefId, &TypeDef)> {
        self.defs
            .iter()
            .enumerate()
            .map(|(i, d)| (TypeDefId(i as u32), d))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_record_rejects_duplicate_labels() {
        let mut record = RecordType::new();
        assert!(record.insert("x", Type::Int));
        assert!(!record.insert("x", Type::String));
        assert_eq!(record.get("x"), Some(&Type::Int));
        assert_eq!(record.len(), 1);
    }

    #[test]
    fn test_display_primitives_and_compounds() {
        assert_eq!(Type::array(Type::Float).to_string(), "[Float]");
        assert_eq!(Type::ai(Type::String).to_string(), "AI<String>");
        assert_eq!(Type::Tuple(vec![Type::Int, Type::Bool]).to_string(), "(Int, Bool)");
        assert_eq!(
            Type::record([("x", Type::Int), ("y", Type::Float)]).to_string(),
            "{ x: Int, y: Float }"
        );
        assert_eq!(Type::reference(true, Type::Int).to_string(), "&mut Int");
        assert_eq!(Type::Var(TypeVar(3)).to_string(), "?3");
        assert_eq!(Type::Error.to_string(), "<error>");
    }

    #[test]
    fn test_display_functions() {
        assert_eq!(Type::function(vec![Type::Int], Type::Unit).to_string(), "Int -> Unit");
        assert_eq!(Type::function(vec![], Type::Int).to_string(), "() -> Int");
        assert_eq!(
            Type::function(vec![Type::Int, Type::Int], Type::Int).to_string(),
            "(Int, Int) -> Int"
        );
        let higher = Type::function(vec![Type::function(vec![Type::Int], Type::Int)], Type::Int);
        assert_eq!(higher.to_string(), "(Int -> Int) -> Int");
        let effectful = Type::function_with(vec![Type::Int], Type::Unit, EffectRow::single(Effect::Io));
        assert_eq!(effectful.to_string(), "Int -> Unit ! {IO}");
    }

    #[test]
    fn test_unfold_substitutes_params() {
        let mut defs = TypeDefs::new();
        let t = TypeVar(0);
        let id = defs.declare("Box".into(), vec![t], Span::dummy());
        defs.set_fields(id, RecordType::from_iter([("value", Type::Var(t))]));

        let unfolded = defs.unfold(id, &[Type::Int]).unwrap();
        assert_eq!(unfolded.get("value"), Some(&Type::Int));
        assert_eq!(defs.unfold(id, &[]), None);
        assert_eq!(defs.lookup("Box"), Some(id));
        assert_eq!(defs.named(id, vec![Type::Int]).unwrap().to_string(), "Box<Int>");
    }
}
