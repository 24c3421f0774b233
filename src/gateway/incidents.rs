//! Input validation for traffic-incident queries.
//!
//! Invalid input yields `None` and the caller answers with an empty
//! incident list without touching the network.

use chrono::{DateTime, Local, TimeDelta, Utc};

use crate::types::BoundingBox;

/// Largest accepted span of a bounding box, in degrees, on either axis.
pub const MAX_SPAN_DEGREES: f64 = 5.0;

/// Whether `bounds` is a finite, non-degenerate box of at most
/// [`MAX_SPAN_DEGREES`] per axis.
pub fn valid_bounds(bounds: &BoundingBox) -> bool {
    let fields = [
        bounds.min_lat,
        bounds.min_lng,
        bounds.max_lat,
        bounds.max_lng,
    ];
    if !fields.iter().all(|v| v.is_finite()) {
        return false;
    }
    if bounds.min_lat >= bounds.max_lat || bounds.min_lng >= bounds.max_lng {
        return false;
    }
    bounds.max_lat - bounds.min_lat <= MAX_SPAN_DEGREES
        && bounds.max_lng - bounds.min_lng <= MAX_SPAN_DEGREES
}

/// Resolve the requested time window against `now`.
///
/// - `start` defaults to local midnight today, `end` to now.
/// - `end <= start` is rejected.
/// - If either bound lies in the future, the window becomes the last 24h.
pub fn resolve_window(
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    now: DateTime<Local>,
) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let now_utc = now.with_timezone(&Utc);
    let start = start.unwrap_or_else(|| start_of_day(now));
    let end = end.unwrap_or(now_utc);

    if end <= start {
        return None;
    }
    if start > now_utc || end > now_utc {
        return Some((now_utc - TimeDelta::hours(24), now_utc));
    }
    Some((start, end))
}

fn start_of_day(now: DateTime<Local>) -> DateTime<Utc> {
    now.date_naive()
        .and_hms_opt(0, 0, 0)
        .and_then(|midnight| midnight.and_local_timezone(Local).earliest())
        .map(|midnight| midnight.with_timezone(&Utc))
        .unwrap_or_else(|| now.with_timezone(&Utc) - TimeDelta::hours(24))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 5, 1, 15, 30, 0).unwrap()
    }

    #[test]
    fn metro_manila_box_is_valid() {
        assert!(valid_bounds(&BoundingBox::new(14.35, 120.90, 14.80, 121.15)));
    }

    #[test]
    fn degenerate_and_inverted_boxes_are_rejected() {
        assert!(!valid_bounds(&BoundingBox::new(14.6, 121.0, 14.6, 121.1)));
        assert!(!valid_bounds(&BoundingBox::new(14.7, 121.0, 14.6, 121.1)));
        assert!(!valid_bounds(&BoundingBox::new(14.5, 121.1, 14.6, 121.0)));
    }

    #[test]
    fn oversized_boxes_are_rejected() {
        assert!(!valid_bounds(&BoundingBox::new(10.0, 120.0, 15.1, 121.0)));
        assert!(!valid_bounds(&BoundingBox::new(14.0, 118.0, 15.0, 123.5)));
        assert!(valid_bounds(&BoundingBox::new(10.0, 120.0, 15.0, 125.0)));
    }

    #[test]
    fn non_finite_boxes_are_rejected() {
        assert!(!valid_bounds(&BoundingBox::new(f64::NAN, 121.0, 14.6, 121.1)));
        assert!(!valid_bounds(&BoundingBox::new(14.5, 121.0, f64::INFINITY, 121.1)));
    }

    #[test]
    fn default_window_is_today_so_far() {
        let (start, end) = resolve_window(None, None, now()).unwrap();
        assert_eq!(end, now().with_timezone(&Utc));
        let local_start = start.with_timezone(&Local);
        assert_eq!(local_start.date_naive(), now().date_naive());
        assert_eq!(local_start.time(), chrono::NaiveTime::MIN);
    }

    #[test]
    fn inverted_window_is_rejected() {
        let n = now().with_timezone(&Utc);
        assert!(resolve_window(Some(n - TimeDelta::hours(1)), Some(n - TimeDelta::hours(2)), now()).is_none());
        assert!(resolve_window(Some(n - TimeDelta::hours(1)), Some(n - TimeDelta::hours(1)), now()).is_none());
    }

    #[test]
    fn future_bounds_clamp_to_last_day() {
        let n = now().with_timezone(&Utc);
        let (start, end) =
            resolve_window(Some(n - TimeDelta::hours(1)), Some(n + TimeDelta::hours(3)), now()).unwrap();
        assert_eq!(end, n);
        assert_eq!(start, n - TimeDelta::hours(24));
    }

    #[test]
    fn explicit_past_window_is_kept() {
        let n = now().with_timezone(&Utc);
        let window = (n - TimeDelta::hours(5), n - TimeDelta::hours(2));
        assert_eq!(resolve_window(Some(window.0), Some(window.1), now()), Some(window));
    }
}
