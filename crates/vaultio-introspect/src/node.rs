//! Namespace nodes and attribute dispatch
//!
//! A node binds a node type descriptor (fixed attribute table plus
//! release callback) to one backing object and to a position in the
//! namespace tree. The shared reference count is the handle count: the
//! registry, the parent's children map, and every in-flight dispatch
//! each hold one handle, so a node is never torn down under a
//! concurrent reader.

use crate::attr::AttrDescriptor;
use crate::device::DeviceRecord;
use crate::teardown::Teardown;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::AtomicU64;
use std::sync::{Arc, Weak};
use tracing::{debug, info};
use vaultio_common::{Error, Result};

/// Maximum length of a single namespace entry name, in bytes
pub const MAX_NAME_LEN: usize = 64;

/// Registry-owned placeholder storage backing a directory node
///
/// Allocated zeroed with the node and freed with it. The value slot is
/// general purpose; fixed directory nodes leave it untouched.
#[derive(Debug, Default)]
pub struct DirSlot {
    pub value: AtomicU64,
}

/// Backing object of a node
///
/// Destruction branches on this tag: owned backing is freed by the
/// registry once the last handle drops, borrowed backing belongs to the
/// storage engine and outlives the namespace entry.
#[derive(Debug)]
pub enum Backing {
    /// Registry-owned placeholder (directory and fixed nodes)
    Dir(DirSlot),
    /// Engine-owned per-device record (device nodes)
    Device(Arc<DeviceRecord>),
}

impl Backing {
    /// True when the registry owns the backing storage
    #[must_use]
    pub fn is_owned(&self) -> bool {
        matches!(self, Self::Dir(_))
    }
}

/// Node type descriptor: one per entity kind
///
/// Defined once as a `static` and never mutated. The attribute table is
/// a fixed slice; the release callback runs exactly once, when the last
/// handle to a node of this type is released.
#[derive(Debug)]
pub struct NodeType {
    pub name: &'static str,
    pub attrs: &'static [AttrDescriptor],
    pub release: fn(&NodeType, &Backing),
}

struct NodeInner {
    name: String,
    ntype: &'static NodeType,
    backing: Backing,
    /// Weak back-reference, used only for path composition
    parent: Weak<NodeInner>,
    children: RwLock<HashMap<String, Node>>,
    teardown: Arc<Teardown>,
}

impl Drop for NodeInner {
    fn drop(&mut self) {
        (self.ntype.release)(self.ntype, &self.backing);
        self.teardown.complete();
    }
}

/// A live handle to a namespace node
///
/// Cheap to clone; every clone is one reference in the shared count.
#[derive(Clone)]
pub struct Node {
    inner: Arc<NodeInner>,
}

impl Node {
    /// Create a top-level node with no parent
    pub fn new_root(ntype: &'static NodeType, name: &str) -> Result<Self> {
        validate_entry_name(name)?;
        Ok(Self::alloc(ntype, name, Backing::Dir(DirSlot::default()), Weak::new()))
    }

    fn alloc(
        ntype: &'static NodeType,
        name: &str,
        backing: Backing,
        parent: Weak<NodeInner>,
    ) -> Self {
        Self {
            inner: Arc::new(NodeInner {
                name: name.to_string(),
                ntype,
                backing,
                parent,
                children: RwLock::new(HashMap::new()),
                teardown: Arc::new(Teardown::new()),
            }),
        }
    }

    /// Register a child node under this one
    ///
    /// Fails with `RegistrationConflict` on a duplicate name (the
    /// existing entry is left untouched) and with `AllocationFailure`
    /// once this node's teardown has begun. On failure the
    /// partially-built child is released; no handle escapes.
    pub fn create_child(
        &self,
        ntype: &'static NodeType,
        name: &str,
        backing: Backing,
    ) -> Result<Self> {
        validate_entry_name(name)?;
        let child = Self::alloc(ntype, name, backing, Arc::downgrade(&self.inner));

        let mut children = self.inner.children.write();
        if self.inner.teardown.is_releasing() {
            return Err(Error::AllocationFailure(format!(
                "parent {} is being torn down",
                self.inner.name
            )));
        }
        if children.contains_key(name) {
            return Err(Error::RegistrationConflict(name.to_string()));
        }
        children.insert(name.to_string(), child.clone());
        drop(children);

        info!(path = %child.path(), "registered introspection entry");
        Ok(child)
    }

    /// Node name (one path component)
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// The node's type descriptor
    #[must_use]
    pub fn node_type(&self) -> &'static NodeType {
        self.inner.ntype
    }

    /// The node's backing object
    #[must_use]
    pub fn backing(&self) -> &Backing {
        &self.inner.backing
    }

    /// Absolute path of this node, composed over the parent chain
    ///
    /// Takes no strong references; a detached node yields `/<name>`.
    #[must_use]
    pub fn path(&self) -> String {
        let mut parts = vec![self.inner.name.clone()];
        let mut cursor = self.inner.parent.clone();
        while let Some(parent) = cursor.upgrade() {
            parts.push(parent.name.clone());
            cursor = parent.parent.clone();
        }
        parts.reverse();
        format!("/{}", parts.join("/"))
    }

    /// Look up a child by name
    #[must_use]
    pub fn child(&self, name: &str) -> Option<Self> {
        self.inner.children.read().get(name).cloned()
    }

    /// Names of all current children, sorted
    #[must_use]
    pub fn child_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.children.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Current shared reference count (diagnostic)
    #[must_use]
    pub fn refcount(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    /// Two handles to the same node
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Read an attribute: resolve the name, check capability, invoke
    /// the accessor. Appends the formatted value to `out` and returns
    /// the number of bytes produced.
    pub fn attr_show(&self, name: &str, out: &mut String) -> Result<usize> {
        self.find_attr(name)?.show(self, out)
    }

    /// Write an attribute: symmetric to [`Node::attr_show`], returns
    /// the number of bytes consumed.
    pub fn attr_store(&self, name: &str, input: &str) -> Result<usize> {
        self.find_attr(name)?.store(self, input)
    }

    fn find_attr(&self, name: &str) -> Result<&'static AttrDescriptor> {
        // Attribute sets are small; a linear scan is fine.
        self.inner
            .ntype
            .attrs
            .iter()
            .find(|a| a.name == name)
            .ok_or_else(|| Error::AttrNotFound(name.to_string()))
    }

    /// Detach this node from its parent's children map
    ///
    /// Drops the namespace tree's reference; outstanding handles keep
    /// the node alive until they are released.
    pub(crate) fn detach(&self) {
        if let Some(parent) = self.inner.parent.upgrade() {
            let mut children = parent.children.write();
            let matches = children
                .get(&self.inner.name)
                .is_some_and(|n| Arc::ptr_eq(&n.inner, &self.inner));
            if matches {
                children.remove(&self.inner.name);
            }
        }
    }

    /// Tear this node down, consuming the caller's handle
    ///
    /// Detaches the node from the namespace so no new dispatch can
    /// reach it. For registry-owned backing the call then blocks until
    /// every outstanding handle (including in-flight dispatches) is
    /// gone and the release callback has run. For borrowed backing it
    /// returns after detachment; the engine-owned record outlives its
    /// presentation here.
    pub fn destroy(self) {
        let owned = self.inner.backing.is_owned();
        let teardown = Arc::clone(&self.inner.teardown);
        debug!(path = %self.path(), owned, "destroying introspection entry");

        teardown.begin_release();
        self.detach();
        drop(self);

        if owned {
            teardown.wait();
        }
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("name", &self.inner.name)
            .field("type", &self.inner.ntype.name)
            .finish_non_exhaustive()
    }
}

/// A namespace entry name is one non-empty path component of bounded
/// length
pub(crate) fn validate_entry_name(name: &str) -> Result<()> {
    if name.is_empty() || name.len() > MAX_NAME_LEN || name.contains('/') {
        return Err(Error::InvalidName(name.to_string()));
    }
    Ok(())
}
