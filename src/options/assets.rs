//! Asset maps with parent-chain fallback.
//!
//! Registered components/directives/filters live in an [`Assets`] map.
//! Option merging layers the child's own registrations over an `Rc` of the
//! parent's map, so lookup falls back the way inheritance built the chain.

use std::rc::Rc;

use indexmap::IndexMap;

use crate::warn::warn;

#[derive(Clone)]
pub struct Assets<T: Clone> {
    own: IndexMap<String, T>,
    parent: Option<Rc<Assets<T>>>,
}

// Not derived: the asset type itself needs no Default.
impl<T: Clone> Default for Assets<T> {
    fn default() -> Self {
        Assets::new()
    }
}

impl<T: Clone> Assets<T> {
    pub fn new() -> Self {
        Assets {
            own: IndexMap::new(),
            parent: None,
        }
    }

    pub fn from_map(own: IndexMap<String, T>) -> Self {
        Assets { own, parent: None }
    }

    /// Layer `own` registrations over a parent chain.
    pub fn layered(own: IndexMap<String, T>, parent: Assets<T>) -> Self {
        Assets {
            own,
            parent: Some(Rc::new(parent)),
        }
    }

    pub fn insert(&mut self, id: impl Into<String>, asset: T) {
        self.own.insert(id.into(), asset);
    }

    pub fn own_entries(&self) -> impl Iterator<Item = (&String, &T)> {
        self.own.iter()
    }

    pub fn own_map(&self) -> IndexMap<String, T> {
        self.own.clone()
    }

    /// Rebuild the own layer through `f`, keeping the parent chain.
    pub fn map_own(&self, f: impl Fn(&T) -> T) -> Assets<T> {
        Assets {
            own: self.own.iter().map(|(k, v)| (k.clone(), f(v))).collect(),
            parent: self.parent.clone(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.own.is_empty() && self.parent.is_none()
    }

    /// Look up by id, then camelCase, then PascalCase, then the parent
    /// chain.
    pub fn resolve(&self, id: &str) -> Option<T> {
        if let Some(asset) = self.own.get(id) {
            return Some(asset.clone());
        }
        let camel = camelize(id);
        if let Some(asset) = self.own.get(&camel) {
            return Some(asset.clone());
        }
        let pascal = capitalize(&camel);
        if let Some(asset) = self.own.get(&pascal) {
            return Some(asset.clone());
        }
        self.parent.as_ref().and_then(|parent| parent.resolve(id))
    }

    /// Resolve, warning when the id cannot be found (directives, filters).
    pub fn resolve_or_warn(&self, id: &str, kind: &str) -> Option<T> {
        let asset = self.resolve(id);
        if asset.is_none() {
            warn(format!("Failed to resolve {kind}: {id}"));
        }
        asset
    }
}

/// `my-prop` / `my_prop` -> `myProp`.
pub fn camelize(id: &str) -> String {
    let mut out = String::with_capacity(id.len());
    let mut upper_next = false;
    for ch in id.chars() {
        if ch == '-' || ch == '_' {
            upper_next = true;
        } else if upper_next {
            out.extend(ch.to_uppercase());
            upper_next = false;
        } else {
            out.push(ch);
        }
    }
    out
}

/// `myProp` -> `MyProp`.
pub fn capitalize(id: &str) -> String {
    let mut chars = id.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// `myProp` -> `my-prop`.
pub fn hyphenate(id: &str) -> String {
    let mut out = String::with_capacity(id.len());
    for ch in id.chars() {
        if ch.is_ascii_uppercase() {
            if !out.is_empty() {
                out.push('-');
            }
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}
