//! Routing properties of the drum model for every drum size.

use proptest::collection::vec;
use proptest::prelude::*;
use spoke_node::OperationError;
use spoke_node::drum::{Direction, Drum, Leg, OPEN_INDEX};

fn landing(window: u8, n: u8, leg: &Leg) -> u8 {
    match leg.direction {
        Direction::Clockwise => (window + n - leg.steps % n) % n,
        Direction::CounterClockwise => (window + leg.steps) % n,
    }
}

fn drum_strategy() -> impl Strategy<Value = Drum> {
    (3u8..=8)
        .prop_flat_map(|n| (Just(n), vec(any::<bool>(), usize::from(n)), 0..n))
        .prop_map(|(n, slots, window)| Drum::from_parts(n, &slots, window).unwrap())
}

proptest! {
    #[test]
    fn bidirectional_legs_take_at_most_half_a_turn(drum in drum_strategy(), target in 0u8..8) {
        let n = drum.spoke_count();
        let target = target % n;
        let leg = drum.shortest_path(target, false);

        prop_assert!(leg.steps <= n / 2);
        prop_assert_eq!(landing(drum.window_index(), n, &leg), target);

        let cw = (drum.window_index() + n - target) % n;
        let ccw = (target + n - drum.window_index()) % n;
        if cw == ccw {
            prop_assert_eq!(leg.direction, Direction::CounterClockwise);
        }
    }

    #[test]
    fn clockwise_only_always_turns_clockwise(drum in drum_strategy(), target in 0u8..8) {
        let n = drum.spoke_count();
        let target = target % n;
        let leg = drum.shortest_path(target, true);

        prop_assert_eq!(leg.direction, Direction::Clockwise);
        prop_assert!(leg.steps < n);
        prop_assert_eq!(landing(drum.window_index(), n, &leg), target);
    }

    #[test]
    fn dispense_never_targets_the_open_slot(drum in drum_strategy(), cw_only in any::<bool>()) {
        let window = drum.window_index();
        let has_item = (1..drum.spoke_count()).any(|i| i != window && drum.is_filled(i));

        match drum.plan_dispense_nearest(cw_only) {
            Ok(leg) => {
                prop_assert!(has_item);
                prop_assert_ne!(leg.target, OPEN_INDEX);
                prop_assert_ne!(leg.target, window);
                prop_assert!(leg.steps > 0);
                prop_assert!(drum.is_filled(leg.target));

                let mut after = drum.clone();
                after.commit_dispense(leg.target);
                prop_assert_eq!(after.filled_count() + 1, drum.filled_count());
                prop_assert_eq!(after.window_index(), leg.target);
            }
            Err(e) => {
                prop_assert!(!has_item);
                prop_assert_eq!(e, OperationError::NothingToDispense);
            }
        }
    }

    #[test]
    fn return_fills_exactly_one_slot(drum in drum_strategy(), cw_only in any::<bool>()) {
        let has_gap = drum.slots().iter().skip(1).any(|s| !*s);

        match drum.plan_return_nearest(cw_only) {
            Ok(leg) => {
                prop_assert!(has_gap);
                prop_assert_ne!(leg.target, OPEN_INDEX);
                prop_assert!(!drum.is_filled(leg.target));

                let mut after = drum.clone();
                after.commit_return(leg.target);
                prop_assert_eq!(after.filled_count(), drum.filled_count() + 1);
                prop_assert!(after.is_filled(leg.target));
                prop_assert!(!after.is_filled(OPEN_INDEX));
            }
            Err(e) => {
                prop_assert!(!has_gap);
                prop_assert_eq!(e, OperationError::NoEmptySlot);
            }
        }
    }

    #[test]
    fn return_picks_a_minimal_leg(drum in drum_strategy()) {
        if let Ok(leg) = drum.plan_return_nearest(false) {
            let best = (1..drum.spoke_count())
                .filter(|i| !drum.is_filled(*i))
                .map(|i| drum.shortest_path(i, false).steps)
                .min();
            prop_assert_eq!(Some(leg.steps), best);
        }
    }
}

#[test]
fn nearest_filled_follows_scan_order_not_distance() {
    // slot 1 is one pitch clockwise of the window, slot 6 is four pitches
    // counter-clockwise, but the scan from window+1 reaches 6 first
    let mut slots = [false; 8];
    slots[1] = true;
    slots[6] = true;
    let drum = Drum::from_parts(8, &slots, 2).unwrap();

    let leg = drum.plan_dispense_nearest(false).unwrap();
    assert_eq!(leg.target, 6);
    assert_eq!(leg.steps, 4);
    assert_eq!(leg.direction, Direction::CounterClockwise);
    assert_eq!(drum.shortest_path(1, false).steps, 1);
}
