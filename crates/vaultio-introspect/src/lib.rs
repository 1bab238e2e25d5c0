//! VaultIO Introspect - Live attribute registry
//!
//! A hierarchical, attribute-based introspection registry exposing live
//! internal counters and identifiers of a VaultIO filesystem instance
//! and its storage devices through a virtual, file-like namespace:
//! - Attribute descriptors: named, permissioned, typed accessors
//! - Node types: one fixed attribute table per entity kind
//! - Dispatch: read/write of plain-text values at fixed paths
//! - Lifecycle: reference-counted nodes with blocking teardown
//!
//! The registry is a pure live view: it persists nothing and reads the
//! backing objects owned and mutated by the storage engine.

pub mod attr;
pub mod device;
pub mod node;
pub mod registry;
pub mod teardown;

// Re-exports
pub use attr::{AttrAccess, AttrDescriptor, AttrMode, CounterFn, ShowFn, StoreFn};
pub use device::{device_entry_name, DeviceErrStats, DeviceRecord, FsDevices, DEVICE_TYPE};
pub use node::{Backing, DirSlot, Node, NodeType, MAX_NAME_LEN};
pub use registry::{Registry, RegistryConfig};
pub use teardown::Teardown;
