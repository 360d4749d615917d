//! Persistence across restarts through the file store.

use super::{TestNode, boot_with, config};
use spoke_node::drivers::FileStore;
use spoke_node::persistence::{
    LoadOutcome, PersistedRecord, RECORD_LEN, RecordError, SCHEMA_VERSION,
};
use std::path::Path;
use tempfile::tempdir;

fn boot_file(device_id: u8, path: &Path) -> TestNode {
    boot_with(&config(device_id), Box::new(FileStore::new(path)))
}

#[test]
fn window_and_slots_survive_restart() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("state").join("drum_4.bin");

    {
        let mut node = boot_file(4, &path);
        assert!(matches!(
            node.ctx.load_outcome(),
            LoadOutcome::Initialized(RecordError::Missing)
        ));
        node.request(&[0x01]);
        node.request(&[0x01]);
        node.request(&[0x04, 0x00, 0x0C, 0x80]);
    }

    let node = boot_file(4, &path);
    assert_eq!(node.ctx.load_outcome(), &LoadOutcome::Loaded);
    assert_eq!(node.slots(), vec![0, 0, 0, 1, 1]);
    assert_eq!(node.ctx.drum().window_index(), 2);
    assert_eq!(node.ctx.motion().steps_per_rev, 3200);
}

#[test]
fn corrupted_record_falls_back_to_defaults() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("drum_4.bin");

    {
        let mut node = boot_file(4, &path);
        node.request(&[0x01]);
    }

    let mut bytes = std::fs::read(&path).unwrap();
    assert_eq!(bytes.len(), RECORD_LEN);
    bytes[14] ^= 0x01;
    std::fs::write(&path, &bytes).unwrap();

    let node = boot_file(4, &path);
    assert!(matches!(
        node.ctx.load_outcome(),
        LoadOutcome::Initialized(RecordError::BadChecksum { .. })
    ));
    assert_eq!(node.slots(), vec![0, 1, 1, 1, 1]);
    assert_eq!(node.ctx.drum().window_index(), 0);

    // defaults were written back
    let rewritten = PersistedRecord::from_bytes(&std::fs::read(&path).unwrap()).unwrap();
    assert_eq!(rewritten, node.ctx.record());
}

#[test]
fn truncated_and_foreign_records_are_replaced() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("drum_4.bin");

    std::fs::write(&path, [0xA5, SCHEMA_VERSION, 4]).unwrap();
    let node = boot_file(4, &path);
    assert!(matches!(
        node.ctx.load_outcome(),
        LoadOutcome::Initialized(RecordError::Short(3))
    ));

    let mut bytes = std::fs::read(&path).unwrap();
    bytes[1] = 1;
    std::fs::write(&path, &bytes).unwrap();
    let node = boot_file(4, &path);
    assert!(matches!(
        node.ctx.load_outcome(),
        LoadOutcome::Initialized(RecordError::BadVersion(1))
    ));
}

#[test]
fn configured_device_id_wins() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("drum.bin");

    {
        let mut node = boot_file(4, &path);
        node.request(&[0x01]);
    }

    let node = boot_file(6, &path);
    assert_eq!(node.ctx.load_outcome(), &LoadOutcome::Loaded);
    assert_eq!(node.ctx.device_id(), 6);
    assert_eq!(node.ctx.drum().window_index(), 1);

    let stored = PersistedRecord::from_bytes(&std::fs::read(&path).unwrap()).unwrap();
    assert_eq!(stored.device_id, 6);
}
