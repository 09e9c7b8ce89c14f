//! Inference context: fresh type-variable allocation, the global struct
//! table, the function-return stack, and engineering limits.
//!
//! Everything here is owned by a single `Context` value created once per
//! compilation unit (see [`crate::infer::infer_program`]). Nothing in
//! this module is `Sync`; running two independent `Context`s on two
//! threads is fine, sharing one across threads is not supported.

use rustc_hash::FxHashMap;

use crate::ty::{MonoTy, PolyTy, TyVar};

/// The result of looking up a name against a struct, spanning both the
/// instance attribute namespace and the static-function namespace. Per
/// the spec's open question (b): static-function lookup on `Struct.name`
/// shares the row/attribute machinery with instance attribute lookup,
/// which can admit accidental mixing between the two namespaces. This is
/// kept as-is rather than "fixed", per the spec's explicit instruction
/// not to guess at intent here.
pub enum AnyMember<'a> {
    Attribute(&'a Attribute),
    Static(&'a PolyTy),
}

/// Engineering guardrails that protect the implementation against
/// pathological or malformed input. These never change which programs
/// type-check -- only how much work the engine is willing to do before
/// giving up and reporting an internal-invariant error.
#[derive(Debug, Clone, Copy)]
pub struct Limits {
    /// Hard cap on the attribute-access re-check loop (4.3/AttributeAccess,
    /// step 5 of the spec). The guard there already ensures at most one
    /// extra traversal is needed in practice; this is a backstop in case
    /// that guard is ever violated by a future change, not a tuning knob.
    pub max_recheck_iterations: u32,
    /// Hard cap on recursive descent depth through `infer`, guarding
    /// against stack overflow on deeply nested (e.g. machine-generated)
    /// expressions.
    pub max_recursion_depth: u32,
}

impl Default for Limits {
    fn default() -> Self {
        Limits { max_recheck_iterations: 64, max_recursion_depth: 4096 }
    }
}

/// One registered struct attribute. `method` is `Some` when the
/// attribute is actually an `impl`-installed method slot rather than a
/// data field -- the distinction matters for struct-literal checking
/// (4.3/Struct: only non-method attributes are required/accepted in a
/// literal) but not for attribute-access resolution (4.3/AttributeAccess
/// treats both uniformly).
#[derive(Debug, Clone)]
pub struct Attribute {
    pub name: String,
    pub ty: PolyTy,
    pub method: Option<MethodInfo>,
}

#[derive(Debug, Clone)]
pub struct MethodInfo {
    /// The codegen-facing name, `"{struct}_{method}"` (4.5/ImplDecl).
    pub func_name: String,
    pub self_mutable: bool,
}

/// A single registered struct declaration.
#[derive(Debug, Clone)]
pub struct StructDecl {
    pub name: String,
    pub attributes: Vec<Attribute>,
    /// Static functions installed via `impl` blocks without a `self`
    /// parameter, reachable only as `StructName.func`, paired with their
    /// generalized scheme.
    pub static_funcs: Vec<(String, PolyTy)>,
}

impl StructDecl {
    pub fn new(name: impl Into<String>) -> Self {
        StructDecl { name: name.into(), attributes: Vec::new(), static_funcs: Vec::new() }
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn static_func(&self, name: &str) -> Option<&PolyTy> {
        self.static_funcs.iter().find(|(n, _)| n == name).map(|(_, s)| s)
    }

    /// Looks a name up across both the attribute and static-function
    /// namespaces -- see [`AnyMember`].
    pub fn lookup_any(&self, name: &str) -> Option<AnyMember<'_>> {
        self.attribute(name)
            .map(AnyMember::Attribute)
            .or_else(|| self.static_func(name).map(AnyMember::Static))
    }

    /// Non-method data fields only -- what struct-literal checking (4.3)
    /// validates attributes against.
    pub fn fields(&self) -> impl Iterator<Item = &Attribute> {
        self.attributes.iter().filter(|a| a.method.is_none())
    }
}

/// The append-only global struct table (5/2: not safe for concurrent
/// modification, struct declarations are registered once during
/// desugaring and only gain `impl` entries afterward).
#[derive(Debug, Clone, Default)]
pub struct StructTable(FxHashMap<String, StructDecl>);

impl StructTable {
    pub fn new() -> Self {
        StructTable(FxHashMap::default())
    }

    pub fn register(&mut self, decl: StructDecl) {
        self.0.insert(decl.name.clone(), decl);
    }

    pub fn lookup(&self, name: &str) -> Option<&StructDecl> {
        self.0.get(name)
    }

    pub fn lookup_mut(&mut self, name: &str) -> Option<&mut StructDecl> {
        self.0.get_mut(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &StructDecl> {
        self.0.values()
    }
}

/// Owns every piece of shared mutable state the inference engine touches:
/// the fresh type-variable counter, the struct table, and the function
/// return-type stack (5/3: pushed on entry to a function body, popped on
/// normal exit; an error exit leaves it dirty, which is why
/// [`crate::infer::infer_program`] resets it at entry rather than relying
/// on callers to balance it after a failed pass).
pub struct Context {
    next_var: u32,
    pub structs: StructTable,
    return_stack: Vec<MonoTy>,
    pub limits: Limits,
}

impl Context {
    pub fn new() -> Self {
        Context::with_limits(Limits::default())
    }

    pub fn with_limits(limits: Limits) -> Self {
        Context { next_var: 0, structs: StructTable::new(), return_stack: Vec::new(), limits }
    }

    /// Allocate a fresh type variable. Indices are monotonically
    /// increasing and never recycled within a single `Context`.
    pub fn fresh_var(&mut self) -> TyVar {
        let var = TyVar(self.next_var);
        self.next_var += 1;
        var
    }

    pub fn fresh_ty(&mut self) -> MonoTy {
        MonoTy::Var(self.fresh_var())
    }

    pub fn push_return_type(&mut self, ty: MonoTy) {
        self.return_stack.push(ty);
    }

    pub fn pop_return_type(&mut self) {
        self.return_stack.pop();
    }

    pub fn current_return_type(&self) -> Option<&MonoTy> {
        self.return_stack.last()
    }

    pub fn return_stack_is_empty(&self) -> bool {
        self.return_stack.is_empty()
    }

    /// Reset the return stack. Called at the top of `infer_program` so a
    /// prior failed pass (which does not pop on error, per 5/3) can never
    /// leak into a later one sharing this `Context`.
    pub fn reset_return_stack(&mut self) {
        self.return_stack.clear();
    }

    /// `freshInstance(scheme)`: allocate a fresh variable for each of the
    /// scheme's quantifiers and substitute them through its body.
    pub fn instantiate(&mut self, scheme: &PolyTy) -> MonoTy {
        if scheme.quantified.is_empty() {
            return scheme.body.clone();
        }
        let mapping: FxHashMap<TyVar, TyVar> =
            scheme.quantified.iter().map(|v| (*v, self.fresh_var())).collect();
        remap_vars(&scheme.body, &mapping)
    }
}

impl Default for Context {
    fn default() -> Self {
        Context::new()
    }
}

/// Replace every `TyVar` in `ty` found in `mapping` by its image,
/// recursing structurally (including through an open row's tail, and
/// through its attribute values).
fn remap_vars(ty: &MonoTy, mapping: &FxHashMap<TyVar, TyVar>) -> MonoTy {
    use crate::ty::StructTy;
    match ty {
        MonoTy::Var(v) => MonoTy::Var(*mapping.get(v).unwrap_or(v)),
        MonoTy::Const(name, params) => {
            MonoTy::Const(name.clone(), params.iter().map(|p| remap_vars(p, mapping)).collect())
        }
        MonoTy::Fn(params, ret) => MonoTy::Fn(
            params.iter().map(|p| remap_vars(p, mapping)).collect(),
            Box::new(remap_vars(ret, mapping)),
        ),
        MonoTy::Tuple(elems) => MonoTy::Tuple(elems.iter().map(|e| remap_vars(e, mapping)).collect()),
        MonoTy::Array(elem, len) => MonoTy::Array(Box::new(remap_vars(elem, mapping)), *len),
        MonoTy::Struct(StructTy::NamedStruct(name)) => MonoTy::Struct(StructTy::NamedStruct(name.clone())),
        MonoTy::Struct(StructTy::PartialStruct(row)) => {
            let attrs = row.attrs.iter().map(|(k, v)| (k.clone(), remap_vars(v, mapping))).collect();
            let tail = *mapping.get(&row.tail).unwrap_or(&row.tail);
            MonoTy::Struct(StructTy::PartialStruct(crate::ty::Row { attrs, tail }))
        }
    }
}
