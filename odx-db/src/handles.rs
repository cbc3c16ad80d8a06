//! Typed arena handles and resolvable links.
//!
//! The object graph is stored as flat arenas on [`crate::Database`];
//! objects point at each other through `Handle<T>` indices instead of
//! owned or counted pointers, which keeps the graph cycle-free even
//! though the data model is not (parent refs, table rows, mutual
//! fragment imports).

use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

use crate::error::CodecError;

/// Index of an object of type `T` in its arena.
pub struct Handle<T> {
    idx: u32,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Handle<T> {
    pub(crate) fn new(idx: usize) -> Self {
        Self {
            idx: u32::try_from(idx).unwrap_or(u32::MAX),
            _marker: PhantomData,
        }
    }

    pub fn index(self) -> usize {
        self.idx as usize
    }
}

// Manual impls: derives would add unwanted `T: Trait` bounds.
impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<T> Copy for Handle<T> {}
impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.idx == other.idx
    }
}
impl<T> Eq for Handle<T> {}
impl<T> Hash for Handle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.idx.hash(state);
    }
}
impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({})", self.idx)
    }
}

/// A reference field after resolution.
///
/// In strict mode every link is `Resolved` once loading completes. In
/// non-strict mode a reference that could not be resolved is retained as
/// `Broken`; dereferencing it later re-surfaces the original failure as
/// [`CodecError::UnresolvedReference`], so a strict operation against a
/// leniently loaded database still fails loudly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Link<T> {
    Resolved(Handle<T>),
    Broken(String),
}

impl<T> Link<T> {
    pub fn get(&self) -> Result<Handle<T>, CodecError> {
        match self {
            Self::Resolved(h) => Ok(*h),
            Self::Broken(id_ref) => Err(CodecError::UnresolvedReference {
                id_ref: id_ref.clone(),
            }),
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved(_))
    }
}
