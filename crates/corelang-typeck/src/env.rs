//! The typing environment: a map from identifier name to polymorphic
//! scheme, plus generalization (closing a monotype over the variables
//! free in it but not free in the environment).

use std::collections::HashSet;

use rustc_hash::FxHashMap;

use crate::ty::{MonoTy, PolyTy, TyVar};

/// Maps identifier name -> scheme. Shadowing is "last binding wins":
/// inserting a name that is already bound replaces the old scheme, and
/// the old one is simply gone -- there is no scope stack here, because
/// the Core AST's identifiers are already uniquified upstream (every
/// binder gets a fresh name), so accidental capture cannot occur even
/// though this environment itself has no block structure.
#[derive(Debug, Clone, Default)]
pub struct Env(FxHashMap<String, PolyTy>);

impl Env {
    pub fn new() -> Self {
        Env(FxHashMap::default())
    }

    pub fn lookup(&self, name: &str) -> Option<&PolyTy> {
        self.0.get(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, scheme: PolyTy) {
        self.0.insert(name.into(), scheme);
    }

    pub fn remove(&mut self, name: &str) {
        self.0.remove(name);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Apply `f` to every scheme's body, keeping quantifiers intact.
    /// Used by [`crate::subst::Subst::apply_to_env`].
    pub fn map_schemes(&self, f: impl Fn(&PolyTy) -> PolyTy) -> Env {
        Env(self.0.iter().map(|(k, v)| (k.clone(), f(v))).collect())
    }

    /// Every type variable free anywhere in the environment's schemes,
    /// i.e. referenced in a scheme's body but not among that scheme's own
    /// quantifiers. This is the "what must NOT be generalized" set.
    pub fn free_vars(&self) -> HashSet<TyVar> {
        let mut out = HashSet::new();
        for scheme in self.0.values() {
            let mut vars = Vec::new();
            scheme.body.free_vars(&mut vars);
            let quantified: HashSet<TyVar> = scheme.quantified.iter().copied().collect();
            out.extend(vars.into_iter().filter(|v| !quantified.contains(v)));
        }
        out
    }
}

/// `generalize(env, ty)`: the free variables of `ty` minus the free
/// variables of `env` become the scheme's quantifiers. Variables are
/// quantified in order of first appearance in `ty`, deduplicated.
pub fn generalize(env: &Env, ty: &MonoTy) -> PolyTy {
    let env_free = env.free_vars();
    let mut ty_free = Vec::new();
    ty.free_vars(&mut ty_free);

    let mut seen = HashSet::new();
    let quantified: Vec<TyVar> = ty_free
        .into_iter()
        .filter(|v| !env_free.contains(v) && seen.insert(*v))
        .collect();

    PolyTy { quantified, body: ty.clone() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generalize_quantifies_vars_not_free_in_env() {
        let env = Env::new();
        let ty = MonoTy::Fn(vec![MonoTy::Var(TyVar(0))], Box::new(MonoTy::Var(TyVar(0))));
        let scheme = generalize(&env, &ty);
        assert_eq!(scheme.quantified, vec![TyVar(0)]);
    }

    #[test]
    fn generalize_excludes_vars_free_in_env() {
        let mut env = Env::new();
        env.insert("x", PolyTy::mono(MonoTy::Var(TyVar(0))));
        let ty = MonoTy::Fn(vec![MonoTy::Var(TyVar(0))], Box::new(MonoTy::Var(TyVar(1))));
        let scheme = generalize(&env, &ty);
        assert_eq!(scheme.quantified, vec![TyVar(1)]);
    }

    #[test]
    fn shadowing_replaces_binding() {
        let mut env = Env::new();
        env.insert("x", PolyTy::mono(MonoTy::u32_ty()));
        env.insert("x", PolyTy::mono(MonoTy::bool_ty()));
        assert_eq!(env.lookup("x").unwrap().body, MonoTy::bool_ty());
    }
}
