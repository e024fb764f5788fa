//! Per-test memoised variables.
//!
//! A [`Var`] is a typed handle. Specs bind initialisers to it; a leaf reads it
//! with [`Var::get`], which runs the innermost initialiser in scope the first
//! time and returns the cached value afterwards. Nothing is shared between
//! leaves: every leaf starts with an empty cache.
//!
//! ```no_run
//! use testcase::{let_var, Spec};
//!
//! # fn demo(s: &mut Spec<'_>) {
//! let name = let_var(s, |_| "root".to_string());
//!
//! s.context("with an override", |s| {
//!     name.let_value(s, "child".to_string());
//!     let name = name.clone();
//!     s.test("sees the override", move |t| assert_eq!(name.get(t), "child"));
//! });
//! # }
//! ```

use std::fmt;
use std::marker::PhantomData;
use std::panic::Location;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;

use crate::spec::Spec;
use crate::t::T;
use crate::tb::TB;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique variable identity. Labels are for humans; this is the key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct VarId(u64);

impl VarId {
    fn next() -> Self {
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for VarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "var#{}", self.0)
    }
}

pub type Init<V> = Arc<dyn Fn(&mut T<'_>) -> V + Send + Sync>;
pub type OnLet = Arc<dyn Fn(&mut Spec<'_>) + Send + Sync>;

pub struct Var<V> {
    pub id: VarId,
    pub label: Arc<str>,
    /// Fallback initialiser used when no spec in scope binds the variable.
    pub init: Option<Init<V>>,
    /// Called the first time the variable is bound in a given spec.
    pub on_let: Option<OnLet>,
    _marker: PhantomData<fn() -> V>,
}

impl<V> Clone for Var<V> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            label: Arc::clone(&self.label),
            init: self.init.clone(),
            on_let: self.on_let.clone(),
            _marker: PhantomData,
        }
    }
}

impl<V> fmt::Debug for Var<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Var")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("has_init", &self.init.is_some())
            .field("has_on_let", &self.on_let.is_some())
            .finish()
    }
}

impl<V: Clone + 'static> Var<V> {
    pub fn new(label: &str) -> Self {
        Self {
            id: VarId::next(),
            label: Arc::from(label),
            init: None,
            on_let: None,
            _marker: PhantomData,
        }
    }

    pub fn with_init<F>(mut self, init: F) -> Self
    where
        F: Fn(&mut T<'_>) -> V + Send + Sync + 'static,
    {
        self.init = Some(Arc::new(init));
        self
    }

    pub fn with_on_let<F>(mut self, on_let: F) -> Self
    where
        F: Fn(&mut Spec<'_>) + Send + Sync + 'static,
    {
        self.on_let = Some(Arc::new(on_let));
        self
    }

    fn initialiser(&self, t: &T<'_>) -> Option<Init<V>> {
        t.binding::<V>(self.id).or_else(|| self.init.clone())
    }

    fn compute(&self, t: &mut T<'_>, init: Init<V>) -> V {
        let value = init(t);
        t.store(self.id, value.clone());
        value
    }

    fn unbound_message(&self) -> String {
        format!(
            "variable {:?} is not bound in this scope; bind it with `let_init`/`let_value` \
             in an enclosing spec or give it a default with `with_init`",
            self.label
        )
    }

    /// The value for the current leaf, initialised on first use.
    ///
    /// An unbound variable without a default is a spec mistake: it is
    /// reported on the test and the leaf stops.
    pub fn get(&self, t: &mut T<'_>) -> V {
        if let Some(value) = t.cached::<V>(self.id) {
            return value;
        }
        match self.initialiser(t) {
            Some(init) => self.compute(t, init),
            None => t.fatal(&self.unbound_message()),
        }
    }

    /// Like [`Var::get`], but an unbound variable is reported and
    /// `V::default()` is returned so the leaf keeps going.
    pub fn get_or_default(&self, t: &mut T<'_>) -> V
    where
        V: Default,
    {
        if let Some(value) = t.cached::<V>(self.id) {
            return value;
        }
        match self.initialiser(t) {
            Some(init) => self.compute(t, init),
            None => {
                t.error(&self.unbound_message());
                V::default()
            }
        }
    }

    /// Replaces the value for the rest of the current leaf.
    pub fn set(&self, t: &mut T<'_>, value: V) {
        t.store(self.id, value);
    }

    /// Binds `init` for `s` and everything below it.
    pub fn let_init<F>(&self, s: &mut Spec<'_>, init: F) -> Self
    where
        F: Fn(&mut T<'_>) -> V + Send + Sync + 'static,
    {
        let init: Init<V> = Arc::new(init);
        let first = s.bind(self.id, &self.label, Arc::new(init));
        if first {
            if let Some(on_let) = &self.on_let {
                on_let(s);
            }
        }
        self.clone()
    }

    /// Binds a fixed value for `s` and everything below it. Each leaf gets
    /// its own clone.
    pub fn let_value(&self, s: &mut Spec<'_>, value: V) -> Self
    where
        V: Send + Sync,
    {
        self.let_init(s, move |_| value.clone())
    }

    /// Binds the variable's own default initialiser in `s`, so `on_let` fires
    /// there. Does nothing for variables without a default.
    pub fn bind(&self, s: &mut Spec<'_>) -> Self {
        if let Some(init) = self.init.clone() {
            return self.let_init(s, move |t| init(t));
        }
        self.clone()
    }

    /// Binds `init` and evaluates it before every leaf of `s`, even when the
    /// leaf never reads the variable.
    pub fn eager_let<F>(&self, s: &mut Spec<'_>, init: F) -> Self
    where
        F: Fn(&mut T<'_>) -> V + Send + Sync + 'static,
    {
        let var = self.let_init(s, init);
        let eager = var.clone();
        s.before(move |t| {
            eager.get(t);
        });
        var
    }
}

/// Declares a variable labelled with the caller's location and binds `init`
/// in `s`.
#[track_caller]
pub fn let_var<V, F>(s: &mut Spec<'_>, init: F) -> Var<V>
where
    V: Clone + 'static,
    F: Fn(&mut T<'_>) -> V + Send + Sync + 'static,
{
    let location = Location::caller();
    let label = format!("{}:{}", location.file(), location.line());
    Var::new(&label).let_init(s, init)
}

/// Declares a variable bound to a fixed value in `s`.
#[track_caller]
pub fn let_value<V>(s: &mut Spec<'_>, value: V) -> Var<V>
where
    V: Clone + Send + Sync + 'static,
{
    let location = Location::caller();
    let label = format!("{}:{}", location.file(), location.line());
    Var::new(&label).let_value(s, value)
}
