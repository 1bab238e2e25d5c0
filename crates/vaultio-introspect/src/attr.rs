//! Attribute descriptors and accessors
//!
//! An attribute pairs a name and a permission mode with either a typed
//! show/store function pair or a counter selector that shares one
//! decimal formatter across all similarly-typed counters.

use crate::node::{Backing, Node};
use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use vaultio_common::{Error, Result};

bitflags::bitflags! {
    /// Permission mode of an attribute
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct AttrMode: u8 {
        const READ = 0b01;
        const WRITE = 0b10;
    }
}

/// Typed show accessor: formats the current value into `out`, returns
/// the number of bytes produced
pub type ShowFn = fn(&Node, &AttrDescriptor, &mut String) -> Result<usize>;

/// Typed store accessor: parses `input` and updates the backing object,
/// returns the number of bytes consumed
pub type StoreFn = fn(&Node, &AttrDescriptor, &str) -> Result<usize>;

/// Selects the counter field this attribute exposes out of a backing
/// object
///
/// Returns `None` when the backing object is of the wrong kind for the
/// attribute table it appears in. The selector and the table are
/// generated together, so a `None` here is a programming error and is
/// surfaced as an unsupported access rather than a wild read.
pub type CounterFn = fn(&Backing) -> Option<&AtomicU64>;

/// How an attribute access reaches its value
#[derive(Debug, Clone, Copy)]
pub enum AttrAccess {
    /// Dedicated show/store pair; either side may be unwired
    Typed {
        show: Option<ShowFn>,
        store: Option<StoreFn>,
    },
    /// Numeric field exposed through the shared decimal formatter
    Counter(CounterFn),
}

/// An immutable named, permissioned accessor bound into a node type's
/// attribute table
#[derive(Debug, Clone, Copy)]
pub struct AttrDescriptor {
    pub name: &'static str,
    pub mode: AttrMode,
    pub access: AttrAccess,
}

impl AttrDescriptor {
    /// A reserved attribute: present in the namespace, declared
    /// readable, but wired to no accessor. Reads fail like an I/O error.
    #[must_use]
    pub const fn placeholder(name: &'static str) -> Self {
        Self {
            name,
            mode: AttrMode::READ,
            access: AttrAccess::Typed {
                show: None,
                store: None,
            },
        }
    }

    #[must_use]
    pub fn readable(&self) -> bool {
        self.mode.contains(AttrMode::READ)
    }

    #[must_use]
    pub fn writable(&self) -> bool {
        self.mode.contains(AttrMode::WRITE)
    }

    /// Dispatch a read against this attribute
    pub(crate) fn show(&self, node: &Node, out: &mut String) -> Result<usize> {
        if !self.readable() {
            return Err(Error::no_show(self.name));
        }
        match self.access {
            AttrAccess::Typed { show: Some(f), .. } => f(node, self, out),
            AttrAccess::Typed { show: None, .. } => Err(Error::no_show(self.name)),
            AttrAccess::Counter(select) => {
                let counter = select(node.backing()).ok_or_else(|| Error::no_show(self.name))?;
                show_counter(counter, out)
            }
        }
    }

    /// Dispatch a write against this attribute
    pub(crate) fn store(&self, node: &Node, input: &str) -> Result<usize> {
        if !self.writable() {
            return Err(Error::no_store(self.name));
        }
        match self.access {
            AttrAccess::Typed {
                store: Some(f), ..
            } => f(node, self, input),
            AttrAccess::Typed { store: None, .. } => Err(Error::no_store(self.name)),
            AttrAccess::Counter(select) => {
                let counter = select(node.backing()).ok_or_else(|| Error::no_store(self.name))?;
                store_counter(counter, input)
            }
        }
    }
}

/// Shared formatter for every counter attribute: the current value as a
/// decimal integer followed by a newline
pub(crate) fn show_counter(counter: &AtomicU64, out: &mut String) -> Result<usize> {
    let start = out.len();
    writeln!(out, "{}", counter.load(Ordering::Relaxed)).unwrap();
    Ok(out.len() - start)
}

/// Shared parser for writable counter attributes
///
/// Accepts a decimal integer with optional surrounding ASCII
/// whitespace; reports the full input as consumed.
pub(crate) fn store_counter(counter: &AtomicU64, input: &str) -> Result<usize> {
    let value: u64 = input
        .trim()
        .parse()
        .map_err(|_| Error::InvalidValue(input.to_string()))?;
    counter.store(value, Ordering::Relaxed);
    Ok(input.len())
}
