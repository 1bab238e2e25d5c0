//! Device records and the device node type
//!
//! The per-device record is owned by the storage engine; the registry
//! only borrows it for the lifetime of the namespace entry. Its error
//! counters are bumped by the engine with relaxed atomic increments and
//! read here with plain loads, so a reader may observe a stale but
//! never a torn value.

use crate::attr::{AttrAccess, AttrDescriptor, AttrMode};
use crate::node::{Backing, Node, NodeType};
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;
use vaultio_common::{DeviceId, FsId};

/// Per-device I/O and integrity error counters
#[derive(Debug, Default)]
pub struct DeviceErrStats {
    pub write_io_errs: AtomicU64,
    pub read_io_errs: AtomicU64,
    pub flush_io_errs: AtomicU64,
    pub corruption_errs: AtomicU64,
    pub generation_errs: AtomicU64,
}

/// Per-device record, owned by the storage engine
///
/// Detaching the namespace entry never frees this; the engine manages
/// its lifetime independently.
pub struct DeviceRecord {
    pub devid: DeviceId,
    pub uuid: Uuid,
    pub fsid: FsId,
    /// Raw device path as handed to the engine (e.g. `/dev/sda1`)
    pub path: String,
    pub errs: DeviceErrStats,
    /// Namespace presence, initialized lazily on first attach
    pub(crate) node: Mutex<Option<Node>>,
}

impl DeviceRecord {
    /// Create a fresh record for a device at `path`
    pub fn new(devid: DeviceId, uuid: Uuid, fsid: FsId, path: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            devid,
            uuid,
            fsid,
            path: path.into(),
            errs: DeviceErrStats::default(),
            node: Mutex::new(None),
        })
    }

    /// The namespace entry name this record presents under
    #[must_use]
    pub fn entry_name(&self) -> &str {
        device_entry_name(&self.path)
    }

    /// True while the record has a live namespace entry
    #[must_use]
    pub fn is_presented(&self) -> bool {
        self.node.lock().is_some()
    }
}

impl fmt::Debug for DeviceRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceRecord")
            .field("devid", &self.devid)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

/// Reduce a raw device path to its namespace entry name
///
/// `/dev/sda1` becomes `sda1`; input without a separator is used
/// verbatim.
#[must_use]
pub fn device_entry_name(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[idx + 1..],
        None => path,
    }
}

/// The filesystem's device set, as reachable from the superblock copy
///
/// Engine-side collaborator surface: the registry itself never walks
/// this, but attach/detach callers resolve records through it.
#[derive(Debug)]
pub struct FsDevices {
    pub fsid: FsId,
    devices: RwLock<Vec<Arc<DeviceRecord>>>,
}

impl FsDevices {
    /// Create an empty device set for one filesystem
    #[must_use]
    pub fn new(fsid: FsId) -> Self {
        Self {
            fsid,
            devices: RwLock::new(Vec::new()),
        }
    }

    /// Add a record to the set
    pub fn insert(&self, record: Arc<DeviceRecord>) {
        self.devices.write().push(record);
    }

    /// Look up a record by numeric device id
    #[must_use]
    pub fn find_by_devid(&self, devid: DeviceId) -> Option<Arc<DeviceRecord>> {
        self.devices
            .read()
            .iter()
            .find(|d| d.devid == devid)
            .cloned()
    }

    /// Look up a record by device UUID
    #[must_use]
    pub fn find_by_uuid(&self, uuid: &Uuid) -> Option<Arc<DeviceRecord>> {
        self.devices
            .read()
            .iter()
            .find(|d| d.uuid == *uuid)
            .cloned()
    }

    /// Number of devices in the set
    #[must_use]
    pub fn len(&self) -> usize {
        self.devices.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.devices.read().is_empty()
    }
}

fn device_release(_ty: &NodeType, backing: &Backing) {
    if let Backing::Device(record) = backing {
        debug!(devid = %record.devid, "released device introspection entry");
    }
}

/// Binds one read-only error counter to its field on the device record.
/// Table entry and field selector are generated together, so the
/// binding is fixed at compile time.
macro_rules! device_counter_attr {
    ($name:literal, $field:ident) => {
        AttrDescriptor {
            name: $name,
            mode: AttrMode::READ,
            access: AttrAccess::Counter(|backing| match backing {
                Backing::Device(record) => Some(&record.errs.$field),
                Backing::Dir(_) => None,
            }),
        }
    };
}

/// Node type for `/<root>/devices/<device-name>`
pub static DEVICE_TYPE: NodeType = NodeType {
    name: "device",
    attrs: &[
        AttrDescriptor::placeholder("uuid"),
        AttrDescriptor::placeholder("label"),
        device_counter_attr!("cnt_write_io_errs", write_io_errs),
        device_counter_attr!("cnt_read_io_errs", read_io_errs),
        device_counter_attr!("cnt_flush_io_errs", flush_io_errs),
        device_counter_attr!("cnt_corruption_errs", corruption_errs),
        device_counter_attr!("cnt_generation_errs", generation_errs),
    ],
    release: device_release,
};

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;
    use vaultio_common::Error;

    fn quiet_release(_ty: &NodeType, _backing: &Backing) {}

    static DIR_TYPE: NodeType = NodeType {
        name: "test-dir",
        attrs: &[],
        release: quiet_release,
    };

    fn sample_record(path: &str) -> Arc<DeviceRecord> {
        DeviceRecord::new(DeviceId::new(1), Uuid::new_v4(), FsId::new(), path)
    }

    fn device_node(record: &Arc<DeviceRecord>) -> (Node, Node) {
        let root = Node::new_root(&DIR_TYPE, "root").unwrap();
        let node = root
            .create_child(
                &DEVICE_TYPE,
                record.entry_name(),
                Backing::Device(Arc::clone(record)),
            )
            .unwrap();
        (root, node)
    }

    #[test]
    fn test_entry_name_derivation() {
        assert_eq!(device_entry_name("/dev/sda1"), "sda1");
        assert_eq!(device_entry_name("sda1"), "sda1");
        assert_eq!(device_entry_name("/dev/disk/by-id/wwn-0x5000"), "wwn-0x5000");
    }

    #[test]
    fn test_counter_attributes_read_exact_values() {
        let record = sample_record("/dev/sda1");
        let (_root, node) = device_node(&record);

        for value in [0, 1, u64::MAX] {
            record.errs.read_io_errs.store(value, Ordering::Relaxed);
            let mut out = String::new();
            let n = node.attr_show("cnt_read_io_errs", &mut out).unwrap();
            assert_eq!(out, format!("{value}\n"));
            assert_eq!(n, out.len());
        }
    }

    #[test]
    fn test_every_counter_is_wired() {
        let record = sample_record("/dev/sdb");
        record.errs.write_io_errs.store(1, Ordering::Relaxed);
        record.errs.read_io_errs.store(2, Ordering::Relaxed);
        record.errs.flush_io_errs.store(3, Ordering::Relaxed);
        record.errs.corruption_errs.store(4, Ordering::Relaxed);
        record.errs.generation_errs.store(5, Ordering::Relaxed);
        let (_root, node) = device_node(&record);

        let expected = [
            ("cnt_write_io_errs", "1\n"),
            ("cnt_read_io_errs", "2\n"),
            ("cnt_flush_io_errs", "3\n"),
            ("cnt_corruption_errs", "4\n"),
            ("cnt_generation_errs", "5\n"),
        ];
        for (name, want) in expected {
            let mut out = String::new();
            node.attr_show(name, &mut out).unwrap();
            assert_eq!(out, want, "attribute {name}");
        }
    }

    #[test]
    fn test_counters_are_read_only() {
        let record = sample_record("/dev/sda1");
        let (_root, node) = device_node(&record);
        assert!(matches!(
            node.attr_store("cnt_write_io_errs", "0"),
            Err(Error::Unsupported { .. })
        ));
    }

    #[test]
    fn test_uuid_and_label_are_placeholders() {
        let record = sample_record("/dev/sda1");
        let (_root, node) = device_node(&record);
        let mut out = String::new();
        assert!(matches!(
            node.attr_show("uuid", &mut out),
            Err(Error::Unsupported { .. })
        ));
        assert!(matches!(
            node.attr_show("label", &mut out),
            Err(Error::Unsupported { .. })
        ));
    }

    #[test]
    fn test_borrowed_destroy_does_not_block_on_outstanding_handles() {
        let record = sample_record("/dev/sda1");
        let (root, node) = device_node(&record);

        let outstanding = node.clone();
        // Returns immediately even though `outstanding` is still live.
        node.destroy();
        assert!(root.child("sda1").is_none());

        // The engine-owned record is untouched by the detachment.
        drop(outstanding);
        assert_eq!(record.errs.read_io_errs.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_fs_devices_lookup() {
        let fsid = FsId::new();
        let set = FsDevices::new(fsid);
        assert!(set.is_empty());

        let a = DeviceRecord::new(DeviceId::new(1), Uuid::new_v4(), fsid, "/dev/sda");
        let b = DeviceRecord::new(DeviceId::new(2), Uuid::new_v4(), fsid, "/dev/sdb");
        set.insert(Arc::clone(&a));
        set.insert(Arc::clone(&b));

        assert_eq!(set.len(), 2);
        assert!(Arc::ptr_eq(
            &set.find_by_devid(DeviceId::new(2)).unwrap(),
            &b
        ));
        assert!(Arc::ptr_eq(&set.find_by_uuid(&a.uuid).unwrap(), &a));
        assert!(set.find_by_devid(DeviceId::new(9)).is_none());
    }
}
