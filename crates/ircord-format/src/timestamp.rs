//! Rendering of Discord `<t:stamp:style>` timestamps as plain text.

use chrono::{DateTime, FixedOffset, Utc};

/// Style used when the token has none.
pub const DEFAULT_STYLE: &str = "f";

/// Render a Unix timestamp in one of Discord's styles (`t T d D f F R`).
///
/// `now` is only consulted for the relative style. Returns `None` for an
/// unparseable stamp or an unknown style.
pub fn render(
    stamp: &str,
    style: Option<&str>,
    now: DateTime<Utc>,
    offset: FixedOffset,
) -> Option<String> {
    let secs: i64 = stamp.parse().ok()?;
    let at = DateTime::from_timestamp(secs, 0)?;
    let local = at.with_timezone(&offset);
    let zone = zone_label(offset);

    let layout = match style.unwrap_or(DEFAULT_STYLE) {
        "t" => "%H:%M",
        "T" => "%H:%M:%S",
        "d" => "%Y/%m/%d",
        "D" => "%B %d, %Y",
        "f" => "%B %d, %Y at %H:%M",
        "F" => "%A, %B %d, %Y at %H:%M",
        "R" => return Some(relative(now.timestamp() - secs)),
        _ => return None,
    };
    Some(format!("{} {zone}", local.format(layout)))
}

fn zone_label(offset: FixedOffset) -> String {
    let secs = offset.local_minus_utc();
    if secs == 0 {
        return "UTC".into();
    }
    let sign = if secs < 0 { '-' } else { '+' };
    let secs = secs.unsigned_abs();
    format!("{sign}{:02}:{:02}", secs / 3600, secs % 3600 / 60)
}

/// `elapsed` seconds since the stamp; negative means in the future.
fn relative(elapsed: i64) -> String {
    let span = format_duration(elapsed.unsigned_abs());
    if elapsed > 0 {
        format!("{span} ago")
    } else {
        format!("in {span}")
    }
}

/// Compact duration such as `1h2m3s`; leading zero units are omitted.
pub fn format_duration(secs: u64) -> String {
    let (h, m, s) = (secs / 3600, secs % 3600 / 60, secs % 60);
    if h > 0 {
        format!("{h}h{m}m{s}s")
    } else if m > 0 {
        format!("{m}m{s}s")
    } else {
        format!("{s}s")
    }
}
