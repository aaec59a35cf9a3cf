//! Unit tests for cosim-sim

use cosim_types::{NodeId, SimTime};
use proptest::prelude::*;

use crate::{Priority, Scheduler, SimConfig, SimError, Simulation};

fn ns(nanos: u64) -> SimTime {
    SimTime::from_nanos(nanos)
}

#[test]
fn simulation_basic_lifecycle() {
    let mut sim = Simulation::new(SimConfig::default());

    sim.schedule_at(ns(1_000), Priority::Normal, 1);
    sim.schedule_at(ns(2_000), Priority::Normal, 2);
    sim.schedule_at(ns(500), Priority::Normal, 0);

    let e1 = sim.step().expect("should have event");
    assert_eq!(e1.time, ns(500));
    assert_eq!(sim.now(), ns(500));

    let e2 = sim.step().expect("should have event");
    assert_eq!(e2.payload, 1);

    let e3 = sim.step().expect("should have event");
    assert_eq!(e3.time, ns(2_000));

    assert!(sim.step().is_none());
    assert_eq!(sim.events_processed(), 3);
}

#[test]
fn simulation_respects_time_limit() {
    let mut sim = Simulation::new(SimConfig::default().with_max_time(ns(1_000)));

    sim.schedule_at(ns(500), Priority::Normal, ());
    sim.schedule_at(ns(2_000), Priority::Normal, ());

    assert!(sim.step().is_some());
    assert!(sim.step().is_none());
    assert_eq!(sim.events().len(), 1, "late event stays queued");
}

#[test]
fn simulation_respects_event_limit() {
    let mut sim = Simulation::new(SimConfig::default().with_max_events(2));

    for i in 1..=3 {
        sim.schedule_at(ns(i), Priority::Normal, i);
    }

    assert!(sim.step().is_some());
    assert!(sim.step().is_some());
    assert!(sim.step().is_none());
    assert!(sim.limit_reached());
}

#[test]
fn step_until_stops_at_deadline() {
    let mut sim = Simulation::new(SimConfig::default());
    sim.schedule_at(ns(10), Priority::Normal, 'a');
    sim.schedule_at(ns(20), Priority::Normal, 'b');

    assert_eq!(sim.step_until(ns(15)).map(|e| e.payload), Some('a'));
    assert!(sim.step_until(ns(15)).is_none());

    sim.advance_to(ns(15)).unwrap();
    assert_eq!(sim.now(), ns(15));
    assert_eq!(sim.step_until(ns(20)).map(|e| e.payload), Some('b'));
}

#[test]
fn advance_to_rejects_past() {
    let mut sim: Simulation<()> = Simulation::default();
    sim.advance_to(ns(100)).unwrap();
    assert_eq!(
        sim.advance_to(ns(50)),
        Err(SimError::DeadlineInPast {
            deadline: ns(50),
            now: ns(100)
        })
    );
}

#[test]
fn schedule_after_uses_current_time() {
    let mut sim = Simulation::new(SimConfig::default());

    sim.schedule_at(ns(1_000), Priority::Normal, 1);
    sim.step();

    sim.schedule_after(ns(500), Priority::Normal, 2);

    let event = sim.step().expect("should have event");
    assert_eq!(event.time, ns(1_500));
}

#[test]
fn events_inherit_scheduling_context() {
    let mut sim = Simulation::new(SimConfig::default());
    sim.enter_context(NodeId::new(3));
    sim.schedule_after(ns(1), Priority::Normal, ());

    let event = sim.step().unwrap();
    assert_eq!(event.context, NodeId::new(3));
    assert_eq!(sim.current_context(), NodeId::new(3));
}

#[test]
fn schedule_with_context_switches_slot() {
    let mut sim = Simulation::new(SimConfig::default());
    sim.enter_context(NodeId::new(1));
    sim.schedule_with_context(NodeId::new(2), SimTime::ZERO, Priority::Normal, ());

    let event = sim.step().unwrap();
    assert_eq!(event.time, SimTime::ZERO);
    assert_eq!(sim.current_context(), NodeId::new(2));
}

#[test]
fn cancelled_events_never_fire() {
    let mut sim = Simulation::new(SimConfig::default());
    let id = sim.schedule_at(ns(5), Priority::Normal, "cancelled");
    sim.schedule_at(ns(6), Priority::Normal, "kept");

    assert!(sim.cancel(id));
    assert_eq!(sim.step().map(|e| e.payload), Some("kept"));
    assert!(sim.step().is_none());
}

#[test]
#[should_panic(expected = "cannot schedule in the past")]
fn scheduling_in_the_past_panics() {
    let mut sim = Simulation::new(SimConfig::default());
    sim.schedule_at(ns(10), Priority::Normal, ());
    sim.step();
    sim.schedule_at(ns(5), Priority::Normal, ());
}

#[test]
fn trait_object_works() {
    let mut sim: Simulation<u8> = Simulation::default();
    let scheduler: &mut dyn Scheduler<u8> = &mut sim;
    scheduler.schedule_after(ns(7), Priority::Receive, 9);
    assert_eq!(scheduler.now(), SimTime::ZERO);
    assert_eq!(sim.events().next_time(), Some(ns(7)));
}

proptest! {
    /// Property: dispatch times never decrease, whatever the scheduling order
    #[test]
    fn prop_dispatch_is_time_ordered(times in prop::collection::vec(0u64..10_000, 1..64)) {
        let mut sim = Simulation::new(SimConfig::default());
        for (i, t) in times.iter().enumerate() {
            let priority = match i % 3 {
                0 => Priority::Transmit,
                1 => Priority::Normal,
                _ => Priority::Receive,
            };
            sim.schedule_at(ns(*t), priority, i);
        }

        let mut last = (SimTime::ZERO, Priority::Transmit);
        let mut count = 0;
        while let Some(event) = sim.step() {
            prop_assert!((event.time, event.priority) >= last);
            last = (event.time, event.priority);
            count += 1;
        }
        prop_assert_eq!(count, times.len());
    }
}
