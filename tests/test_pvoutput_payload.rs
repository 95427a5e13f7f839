mod common;
use common::*;

use chrono::{Local, TimeZone};
use growatt_bridge::pvoutput::{PvOutput, RateLimitSnapshot, StatusParams};
use std::time::Duration;

fn params() -> StatusParams {
    let date = Local.with_ymd_and_hms(2024, 6, 1, 12, 5, 0).unwrap();
    StatusParams::new(date)
}

fn value<'a>(payload: &'a [(String, String)], key: &str) -> Option<&'a str> {
    payload
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

#[test]
fn date_and_time_use_fixed_formats() {
    let mut pvo = PvOutput::new(Factory::config()).unwrap();
    let payload = pvo.build_status_payload(&params());

    assert_eq!(value(&payload, "d"), Some("20240601"));
    assert_eq!(value(&payload, "t"), Some("12:05"));
}

#[test]
fn absent_inputs_are_omitted_not_zeroed() {
    let mut pvo = PvOutput::new(Factory::config()).unwrap();
    let payload = pvo.build_status_payload(&params());

    // only the date, time and cumulative flag remain
    assert_eq!(payload.len(), 3);
    assert_eq!(value(&payload, "c1"), Some("0"));
    assert_eq!(value(&payload, "v2"), None);
    assert_eq!(value(&payload, "v5"), None);
}

#[test]
fn field_codes_match_the_api() {
    let mut pvo = PvOutput::new(Factory::config()).unwrap();
    let payload = pvo.build_status_payload(&StatusParams {
        energy_gen: Some(5800),
        power_gen: Some(1200.0),
        energy_imp: Some(10),
        power_imp: Some(20.0),
        temp: Some(21.5),
        vdc: Some(240.5),
        vac: Some(231.0),
        temp_inv: Some(45.3),
        energy_life: Some(6_553_600),
        comment: Some("Status: 1".to_string()),
        power_vdc: Some(1234.5),
        cumulative: true,
        ..params()
    });

    assert_eq!(value(&payload, "v1"), Some("5800"));
    assert_eq!(value(&payload, "v2"), Some("1200"));
    assert_eq!(value(&payload, "v3"), Some("10"));
    assert_eq!(value(&payload, "v4"), Some("20"));
    assert_eq!(value(&payload, "v5"), Some("21.5"));
    assert_eq!(value(&payload, "v6"), Some("231"));
    assert_eq!(value(&payload, "v8"), Some("240.5"));
    assert_eq!(value(&payload, "v9"), Some("45.3"));
    assert_eq!(value(&payload, "v10"), Some("6553600"));
    assert_eq!(value(&payload, "m1"), Some("Status: 1"));
    assert_eq!(value(&payload, "c1"), Some("1"));
}

#[test]
fn repeated_energy_is_deduplicated() {
    let mut pvo = PvOutput::new(Factory::config()).unwrap();

    let first = pvo.build_status_payload(&StatusParams {
        energy_gen: Some(5800),
        ..params()
    });
    assert_eq!(value(&first, "v1"), Some("5800"));
    assert_eq!(pvo.last_uploaded_energy(), 5800);

    let second = pvo.build_status_payload(&StatusParams {
        energy_gen: Some(5800),
        ..params()
    });
    assert_eq!(value(&second, "v1"), None);

    let third = pvo.build_status_payload(&StatusParams {
        energy_gen: Some(5900),
        ..params()
    });
    assert_eq!(value(&third, "v1"), Some("5900"));
    assert_eq!(pvo.last_uploaded_energy(), 5900);
}

#[test]
fn efficiency_needs_positive_pv_power() {
    let mut pvo = PvOutput::new(Factory::config()).unwrap();

    let payload = pvo.build_status_payload(&StatusParams {
        power_gen: Some(450.0),
        power_vdc: Some(500.0),
        ..params()
    });
    assert_eq!(value(&payload, "v12"), Some("90"));

    let payload = pvo.build_status_payload(&StatusParams {
        power_gen: Some(450.0),
        power_vdc: Some(0.0),
        ..params()
    });
    assert_eq!(value(&payload, "v12"), None);

    let payload = pvo.build_status_payload(&StatusParams {
        power_gen: Some(450.0),
        ..params()
    });
    assert_eq!(value(&payload, "v12"), None);
}

#[test]
fn comment_is_truncated_to_thirty_chars() {
    let mut pvo = PvOutput::new(Factory::config()).unwrap();
    let payload = pvo.build_status_payload(&StatusParams {
        comment: Some("x".repeat(40)),
        ..params()
    });

    assert_eq!(value(&payload, "m1"), Some("x".repeat(30).as_str()));
}

#[test]
fn rate_limit_backoff_sleeps_past_the_reset_instant() {
    let now = 1_700_000_000.0;
    let snapshot = RateLimitSnapshot {
        remaining: Some(3),
        reset: Some(now + 30.0),
    };

    let backoff = snapshot.backoff_until_reset(now);
    assert_eq!(backoff, Duration::from_secs(31));
    assert!(backoff >= Duration::from_secs(31));
}

#[test]
fn rate_limit_backoff_never_goes_negative() {
    let now = 1_700_000_000.0;

    let expired = RateLimitSnapshot {
        remaining: Some(0),
        reset: Some(now - 10.0),
    };
    assert_eq!(expired.backoff_until_reset(now), Duration::from_secs(1));

    let missing = RateLimitSnapshot::default();
    assert_eq!(missing.backoff_until_reset(now), Duration::from_secs(1));
}
