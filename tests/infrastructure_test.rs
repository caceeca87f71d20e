//! Test to verify test infrastructure works correctly

mod common;

use chart_recorder::SeriesKey;
use common::builders::{FrameBuilder, RecordingBuilder};

#[test]
fn test_infrastructure_setup() {
    let frame = FrameBuilder::new().channel(2, 1.25).build();
    assert_eq!(frame, vec!["CH2 1.250V".to_string(), String::new()]);

    let rec = RecordingBuilder::new(&[2]).rows(4).period(0.5).build();
    assert_eq!(rec.len(), 4);
    assert_eq!(rec.series(SeriesKey::Time), Some(&[0.0, 0.5, 1.0, 1.5][..]));
}

#[test]
fn test_wait_until() {
    assert!(common::wait_until(|| true));
}

#[test]
fn test_float_comparison() {
    common::assert_float_eq(1.0, 1.0000001, 0.001);
}

#[test]
#[should_panic]
fn test_float_comparison_fails() {
    common::assert_float_eq(1.0, 2.0, 0.001);
}
