//! Inventory scenarios driven through bus frames.

use super::boot;
use spoke_common::protocol::{Reply, StatusSnapshot};

// ── Dispense / return ───────────────────────────────────────────────

#[test]
fn first_dispense_takes_slot_one() {
    let (mut node, _store) = boot();
    assert_eq!(node.slots(), vec![0, 1, 1, 1, 1]);

    let reply = node.request(&[0x01]);

    assert_eq!(reply, Reply::DispenseNearest { ok: true, window: 1 });
    assert_eq!(node.slots(), vec![0, 0, 1, 1, 1]);
    assert_eq!(node.ctx.drum().window_index(), 1);
}

#[test]
fn fifth_dispense_fails_without_moving() {
    let (mut node, _store) = boot();

    for expected_window in 1..=4 {
        let reply = node.request(&[0x01]);
        assert_eq!(
            reply,
            Reply::DispenseNearest {
                ok: true,
                window: expected_window
            }
        );
    }
    assert_eq!(node.slots(), vec![0, 0, 0, 0, 0]);

    let steps_before = node.plant.steps_received();
    let revision_before = node.ctx.revision();
    let reply = node.request(&[0x01]);

    assert_eq!(reply, Reply::DispenseNearest { ok: false, window: 4 });
    assert_eq!(node.plant.steps_received(), steps_before);
    assert_eq!(node.ctx.revision(), revision_before);
}

#[test]
fn return_fills_the_emptied_slot() {
    let (mut node, _store) = boot();
    node.request(&[0x01]);
    node.request(&[0x01]);
    assert_eq!(node.slots(), vec![0, 0, 0, 1, 1]);

    // window is at 2, which is empty and needs no travel
    let steps_before = node.plant.steps_received();
    let reply = node.request(&[0x02]);
    assert_eq!(reply, Reply::ReturnNearest { ok: true, window: 2 });
    assert_eq!(node.plant.steps_received(), steps_before);
    assert_eq!(node.slots(), vec![0, 0, 1, 1, 1]);

    let reply = node.request(&[0x02]);
    assert_eq!(reply, Reply::ReturnNearest { ok: true, window: 1 });
    assert_eq!(node.slots(), vec![0, 1, 1, 1, 1]);

    let reply = node.request(&[0x02]);
    assert_eq!(reply, Reply::ReturnNearest { ok: false, window: 1 });
}

#[test]
fn dispense_to_slot_validation() {
    let (mut node, _store) = boot();

    assert_eq!(
        node.request(&[0x07, 0]),
        Reply::DispenseToSlot { ok: false, window: 0 }
    );
    assert_eq!(
        node.request(&[0x07, 5]),
        Reply::DispenseToSlot { ok: false, window: 0 }
    );
    assert_eq!(
        node.request(&[0x07, 3]),
        Reply::DispenseToSlot { ok: true, window: 3 }
    );
    assert_eq!(
        node.request(&[0x07, 3]),
        Reply::DispenseToSlot { ok: false, window: 3 }
    );
    assert_eq!(node.slots(), vec![0, 1, 1, 0, 1]);
}

#[test]
fn restocked_window_slot_is_not_dispensed_in_place() {
    let (mut node, _store) = boot();
    for index in [1, 2, 4] {
        assert_eq!(node.request(&[0x05, index, 0]), Reply::Slot { index, ok: true });
    }
    assert_eq!(
        node.request(&[0x07, 3]),
        Reply::DispenseToSlot { ok: true, window: 3 }
    );
    assert_eq!(node.request(&[0x05, 3, 1]), Reply::Slot { index: 3, ok: true });
    let steps_before = node.plant.steps_received();

    assert_eq!(
        node.request(&[0x01]),
        Reply::DispenseNearest { ok: false, window: 3 }
    );
    assert_eq!(node.slots(), vec![0, 0, 0, 1, 0]);
    assert_eq!(node.plant.steps_received(), steps_before);
}

// ── Configuration over the bus ──────────────────────────────────────

#[test]
fn spoke_count_change_resets_drum() {
    let (mut node, _store) = boot();
    node.request(&[0x01]);
    node.request(&[0x01]);

    let reply = node.request(&[0x04, 0x03, 3]);

    assert_eq!(reply, Reply::Param { sub: 0x03, ok: true });
    assert_eq!(node.ctx.drum().spoke_count(), 3);
    assert_eq!(node.slots(), vec![0, 1, 1]);
    assert_eq!(node.ctx.drum().window_index(), 0);
}

#[test]
fn steps_per_rev_range_is_enforced() {
    let (mut node, _store) = boot();

    let reply = node.request(&[0x04, 0x00, 0x00, 0xFA]);
    assert_eq!(reply, Reply::Param { sub: 0x00, ok: true });
    assert_eq!(node.ctx.motion().steps_per_rev, 250);

    let reply = node.request(&[0x04, 0x00, 0x00, 0x32]);
    assert_eq!(reply, Reply::Param { sub: 0x00, ok: false });
    assert_eq!(node.ctx.motion().steps_per_rev, 250);
}

#[test]
fn speed_and_polarity_parameters() {
    let (mut node, _store) = boot();

    let mut frame = vec![0x04, 0x01];
    frame.extend_from_slice(&180.0f32.to_ne_bytes());
    assert_eq!(node.request(&frame), Reply::Param { sub: 0x01, ok: true });
    assert_eq!(node.ctx.motion().deg_per_sec, 180.0);

    let mut frame = vec![0x04, 0x01];
    frame.extend_from_slice(&721.0f32.to_ne_bytes());
    assert_eq!(node.request(&frame), Reply::Param { sub: 0x01, ok: false });

    assert_eq!(node.request(&[0x04, 0x02, 0]), Reply::Param { sub: 0x02, ok: true });
    assert!(!node.ctx.motion().dir_cw_high);
    assert_eq!(node.request(&[0x04, 0x02, 7]), Reply::Param { sub: 0x02, ok: false });

    // the simulated motor is wired clockwise-high, so the flipped pin runs it backwards
    assert_eq!(node.request(&[0x01]), Reply::DispenseNearest { ok: false, window: 0 });
    node.request(&[0x04, 0x02, 1]);
    assert_eq!(node.request(&[0x01]), Reply::DispenseNearest { ok: true, window: 1 });
}

#[test]
fn set_slot_and_status() {
    let (mut node, _store) = boot();

    assert_eq!(node.request(&[0x05, 2, 0]), Reply::Slot { index: 2, ok: true });
    assert_eq!(node.request(&[0x05, 0, 1]), Reply::Slot { index: 0, ok: false });
    assert_eq!(node.request(&[0x05, 9, 0]), Reply::Slot { index: 9, ok: false });

    let reply = node.request(&[0x06]);
    assert_eq!(
        reply,
        Reply::Status(StatusSnapshot {
            window_index: 0,
            slot_bitmap: 0b1_1010,
            spoke_count: 5,
            steps_per_rev: 1600,
            dir_cw_high: true,
            device_id: 4,
        })
    );
}

#[test]
fn zero_reply_carries_raw_reading() {
    let (mut node, _store) = boot();
    node.plant.rotate_by_hand(1234.0);

    assert_eq!(node.request(&[0x03]), Reply::Zero(1234));
    assert_eq!(node.ctx.encoder().zero_raw(), 1234);
}
