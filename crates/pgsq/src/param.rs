//! Argument storage using Arc for clone-friendly expression trees.

use crate::error::{SqError, SqResult};
use std::collections::HashMap;
use std::sync::Arc;
use tokio_postgres::types::ToSql;

/// Shared handle to one bound literal.
///
/// Expression nodes hold their literal arguments as `Param`s so a tree can be
/// cloned and rendered repeatedly without copying the values.
#[derive(Clone)]
pub struct Param(pub(crate) Arc<dyn ToSql + Send + Sync>);

impl Param {
    /// Wrap any `ToSql` value.
    pub fn new<T: ToSql + Send + Sync + 'static>(value: T) -> Self {
        Param(Arc::new(value))
    }

    /// Borrow the wrapped value for binding.
    pub fn as_ref(&self) -> &(dyn ToSql + Sync) {
        &*self.0 as &(dyn ToSql + Sync)
    }
}

impl std::fmt::Debug for Param {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // `ToSql: Debug`, so the value itself knows how to print.
        std::fmt::Debug::fmt(&*self.0, f)
    }
}

/// Ordered, append-only argument list filled while rendering.
///
/// Its length and order match the neutral placeholders in the rendered text.
#[derive(Clone, Debug, Default)]
pub struct Args {
    params: Vec<Param>,
}

impl Args {
    /// Empty list.
    pub fn new() -> Self {
        Self { params: Vec::new() }
    }

    /// Add a value and return its 0-based position.
    pub fn push<T: ToSql + Send + Sync + 'static>(&mut self, value: T) -> usize {
        self.push_param(Param::new(value))
    }

    /// Append an existing [`Param`], returning its 0-based position.
    pub fn push_param(&mut self, param: Param) -> usize {
        self.params.push(param);
        self.params.len() - 1
    }

    /// Number of bound arguments.
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// True when nothing has been bound.
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Argument at a 0-based position, if any.
    pub fn get(&self, idx: usize) -> Option<&Param> {
        self.params.get(idx)
    }

    /// Arguments in placeholder order.
    pub fn iter(&self) -> impl Iterator<Item = &Param> {
        self.params.iter()
    }

    /// Borrow every argument in the slice shape `Client::query` takes.
    pub fn as_refs(&self) -> Vec<&(dyn ToSql + Sync)> {
        self.params.iter().map(|p| p.as_ref()).collect()
    }

    /// `Debug` renderings of every argument, in order.
    pub fn debug_values(&self) -> Vec<String> {
        self.params.iter().map(|p| format!("{p:?}")).collect()
    }

    /// Append all of `other` after the current arguments.
    pub fn extend(&mut self, other: &Args) {
        self.params.extend(other.params.iter().cloned());
    }
}

/// Named-parameter table consulted while rendering.
///
/// Maps a parameter name to the position in [`Args`] of its first binding.
#[derive(Clone, Debug, Default)]
pub struct ParamIndex {
    names: HashMap<String, usize>,
}

impl ParamIndex {
    /// Empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `name` as bound at argument position `idx`.
    ///
    /// The first binding wins; later bindings of the same name are ignored.
    pub fn bind(&mut self, name: &str, idx: usize) {
        self.names.entry(name.to_string()).or_insert(idx);
    }

    /// Argument position of `name`'s first binding.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.names.get(name).copied()
    }

    /// Resolve `name` to its bound argument.
    pub fn resolve(&self, name: &str, args: &Args) -> SqResult<Param> {
        self.position(name)
            .and_then(|idx| args.get(idx))
            .cloned()
            .ok_or_else(|| SqError::UnknownParam(name.to_string()))
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Bound names with their argument positions, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.names.iter().map(|(name, idx)| (name.as_str(), *idx))
    }
}
