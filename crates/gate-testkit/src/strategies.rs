//! Proptest strategies for campus wall-clock types

use gate_core::{ClockTime, DayOfWeek, LocalMoment, TimeRestriction};
use proptest::prelude::*;

pub use proptest;

/// Any minute of the day
pub fn arb_clock_time() -> impl Strategy<Value = ClockTime> {
    (0u8..24, 0u8..60).prop_map(|(h, m)| ClockTime::new(h, m).unwrap())
}

/// Any weekday
pub fn arb_day() -> impl Strategy<Value = DayOfWeek> {
    prop::sample::select(DayOfWeek::ALL.to_vec())
}

/// Any local moment
pub fn arb_moment() -> impl Strategy<Value = LocalMoment> {
    (arb_day(), arb_clock_time()).prop_map(|(day, time)| LocalMoment { day, time })
}

/// Restriction over an arbitrary (possibly empty) weekday set
pub fn arb_restriction() -> impl Strategy<Value = TimeRestriction> {
    (
        arb_clock_time(),
        arb_clock_time(),
        prop::collection::btree_set(arb_day(), 0..7),
    )
        .prop_map(|(start, end, days)| TimeRestriction { start, end, days })
}
