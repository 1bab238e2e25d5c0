//! Registry root and fixed namespace
//!
//! One `Registry` instance owns the top-level namespace node and its
//! three fixed children:
//!
//! ```text
//! /<root>/devices/              directory, no attributes
//! /<root>/devices/<name>/       one node per attached device
//! /<root>/health/               dummy (placeholder)
//! /<root>/info/                 num_devices (placeholder)
//! ```
//!
//! Instances are independent; embedders and tests construct as many as
//! they need instead of sharing process-wide state.

use crate::attr::AttrDescriptor;
use crate::device::{device_entry_name, DeviceRecord, DEVICE_TYPE};
use crate::node::{Backing, DirSlot, Node, NodeType};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};
use vaultio_common::Result;

/// Registry configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Name of the top-level namespace entry
    pub root_name: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            root_name: "vaultio".to_string(),
        }
    }
}

fn dir_release(ty: &NodeType, _backing: &Backing) {
    debug!(kind = ty.name, "released introspection directory");
}

static ROOT_TYPE: NodeType = NodeType {
    name: "root",
    attrs: &[],
    release: dir_release,
};

static DEVICES_DIR_TYPE: NodeType = NodeType {
    name: "devices-dir",
    attrs: &[],
    release: dir_release,
};

static HEALTH_TYPE: NodeType = NodeType {
    name: "health",
    attrs: &[AttrDescriptor::placeholder("dummy")],
    release: dir_release,
};

static INFO_TYPE: NodeType = NodeType {
    name: "info",
    attrs: &[AttrDescriptor::placeholder("num_devices")],
    release: dir_release,
};

/// The introspection registry for one filesystem instance
pub struct Registry {
    root: Node,
    devices: Node,
    health: Node,
    info: Node,
}

impl Registry {
    /// Initialize a registry with the default configuration
    ///
    /// Must complete before any device node is created.
    pub fn init() -> Result<Self> {
        Self::init_with_config(RegistryConfig::default())
    }

    /// Initialize a registry with an explicit configuration
    pub fn init_with_config(config: RegistryConfig) -> Result<Self> {
        let root = Node::new_root(&ROOT_TYPE, &config.root_name)?;
        let devices = root.create_child(
            &DEVICES_DIR_TYPE,
            "devices",
            Backing::Dir(DirSlot::default()),
        )?;
        let health = root.create_child(&HEALTH_TYPE, "health", Backing::Dir(DirSlot::default()))?;
        let info = root.create_child(&INFO_TYPE, "info", Backing::Dir(DirSlot::default()))?;

        info!(root = %root.path(), "introspection registry initialized");
        Ok(Self {
            root,
            devices,
            health,
            info,
        })
    }

    /// The top-level namespace node
    #[must_use]
    pub fn root(&self) -> &Node {
        &self.root
    }

    /// The fixed `devices` directory node
    #[must_use]
    pub fn devices_dir(&self) -> &Node {
        &self.devices
    }

    /// The fixed `health` node
    #[must_use]
    pub fn health(&self) -> &Node {
        &self.health
    }

    /// The fixed `info` node
    #[must_use]
    pub fn info(&self) -> &Node {
        &self.info
    }

    /// Present a device under `devices/`, deriving the entry name from
    /// the record's path
    ///
    /// Idempotent: if the record already has a live entry, the call
    /// hands out another reference to it without re-running
    /// registration.
    pub fn attach_device(&self, record: &Arc<DeviceRecord>) -> Result<Node> {
        let mut slot = record.node.lock();
        if let Some(existing) = slot.as_ref() {
            debug!(name = existing.name(), "device already presented; reusing entry");
            return Ok(existing.clone());
        }

        let name = device_entry_name(&record.path);
        let node = self
            .devices
            .create_child(&DEVICE_TYPE, name, Backing::Device(Arc::clone(record)))
            .map_err(|err| {
                warn!(name, %err, "failed to register device introspection entry");
                err
            })?;
        debug!(name, devid = %record.devid, "added device introspection entry");
        *slot = Some(node.clone());
        Ok(node)
    }

    /// Remove a device's namespace entry
    ///
    /// Returns after detachment; the engine-owned record is not freed
    /// here and final deallocation stays with the storage engine.
    pub fn detach_device(&self, record: &Arc<DeviceRecord>) {
        let node = record.node.lock().take();
        match node {
            Some(node) => node.destroy(),
            None => debug!(devid = %record.devid, "device has no introspection entry"),
        }
    }

    /// Tear down the fixed namespace
    ///
    /// Call once, after every device has been detached. Blocks until
    /// each fixed node is fully released, including any dispatch still
    /// in flight against it.
    pub fn shutdown(self) {
        let Self {
            root,
            devices,
            health,
            info,
        } = self;
        devices.destroy();
        health.destroy();
        info.destroy();
        root.destroy();
        debug!("introspection registry shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::{Duration, Instant};
    use uuid::Uuid;
    use vaultio_common::{DeviceId, Error, FsId};

    fn sample_record(devid: u64, path: &str) -> Arc<DeviceRecord> {
        DeviceRecord::new(DeviceId::new(devid), Uuid::new_v4(), FsId::new(), path)
    }

    #[test]
    fn test_init_builds_fixed_namespace() {
        let registry = Registry::init().unwrap();
        assert_eq!(registry.root().path(), "/vaultio");
        assert_eq!(
            registry.root().child_names(),
            vec!["devices".to_string(), "health".to_string(), "info".to_string()]
        );
        assert_eq!(registry.devices_dir().path(), "/vaultio/devices");
        registry.shutdown();
    }

    #[test]
    fn test_custom_root_name() {
        let registry = Registry::init_with_config(RegistryConfig {
            root_name: "testfs".to_string(),
        })
        .unwrap();
        assert_eq!(registry.info().path(), "/testfs/info");
        registry.shutdown();
    }

    #[test]
    fn test_fixed_placeholders_fail_like_io_errors() {
        let registry = Registry::init().unwrap();
        let mut out = String::new();

        let err = registry.health().attr_show("dummy", &mut out).unwrap_err();
        assert_eq!(err.errno(), -libc::EIO);

        let err = registry
            .info()
            .attr_show("num_devices", &mut out)
            .unwrap_err();
        assert_eq!(err.errno(), -libc::EIO);

        let err = registry.info().attr_show("nonexistent", &mut out).unwrap_err();
        assert_eq!(err.errno(), -libc::ENOENT);

        registry.shutdown();
    }

    #[test]
    fn test_attach_derives_entry_name() {
        let registry = Registry::init().unwrap();
        let record = sample_record(1, "/dev/sda1");

        let node = registry.attach_device(&record).unwrap();
        assert_eq!(node.name(), "sda1");
        assert_eq!(node.path(), "/vaultio/devices/sda1");
        assert!(registry.devices_dir().child("sda1").is_some());

        registry.detach_device(&record);
        registry.shutdown();
    }

    #[test]
    fn test_attach_is_idempotent() {
        let registry = Registry::init().unwrap();
        let record = sample_record(1, "sda1");

        let first = registry.attach_device(&record).unwrap();
        let count = first.refcount();

        let second = registry.attach_device(&record).unwrap();
        assert!(second.ptr_eq(&first));
        assert_eq!(second.refcount(), count + 1);
        assert_eq!(registry.devices_dir().child_names(), vec!["sda1"]);

        registry.detach_device(&record);
        registry.shutdown();
    }

    #[test]
    fn test_duplicate_entry_name_conflicts() {
        let registry = Registry::init().unwrap();
        let first = sample_record(1, "/dev/sda1");
        let clash = sample_record(2, "/dev/../sda1");

        let node = registry.attach_device(&first).unwrap();
        let err = registry.attach_device(&clash).unwrap_err();
        assert!(matches!(err, Error::RegistrationConflict(_)));
        assert!(!clash.is_presented());

        // The existing entry is untouched.
        let survivor = registry.devices_dir().child("sda1").unwrap();
        assert!(survivor.ptr_eq(&node));

        registry.detach_device(&first);
        registry.shutdown();
    }

    #[test]
    fn test_detach_then_reattach() {
        let registry = Registry::init().unwrap();
        let record = sample_record(1, "/dev/sdb");

        registry.attach_device(&record).unwrap();
        assert!(record.is_presented());

        registry.detach_device(&record);
        assert!(!record.is_presented());
        assert!(registry.devices_dir().child("sdb").is_none());

        // A detached record can be presented again.
        let node = registry.attach_device(&record).unwrap();
        assert_eq!(node.name(), "sdb");

        registry.detach_device(&record);
        registry.shutdown();
    }

    #[test]
    fn test_detach_without_attach_is_harmless() {
        let registry = Registry::init().unwrap();
        let record = sample_record(1, "/dev/sdc");
        registry.detach_device(&record);
        registry.shutdown();
    }

    #[test]
    fn test_shutdown_waits_for_outstanding_handles() {
        let registry = Registry::init().unwrap();
        let held = registry.info().clone();

        let releaser = thread::spawn(move || {
            thread::sleep(Duration::from_millis(40));
            drop(held);
        });

        let start = Instant::now();
        registry.shutdown();
        assert!(start.elapsed() >= Duration::from_millis(30));
        releaser.join().unwrap();
    }
}
