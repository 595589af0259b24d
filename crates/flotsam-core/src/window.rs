//! Reporting windows — ISO weeks and calendar months.
//!
//! A window is a half-open UTC range `[start, end)` with a stable string
//! id: `"2026-01"` for months, `"2026-W05"` for ISO weeks. Month ids are
//! also the unit of archival.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc, Weekday};

use crate::{Error, Result};

// ─── WindowKind ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WindowKind {
  Week,
  Month,
}

impl WindowKind {
  pub fn as_str(self) -> &'static str {
    match self {
      WindowKind::Week => "week",
      WindowKind::Month => "month",
    }
  }

  pub fn parse(s: &str) -> Result<Self> {
    match s {
      "week" => Ok(WindowKind::Week),
      "month" => Ok(WindowKind::Month),
      other => Err(Error::WindowKind(other.to_owned())),
    }
  }
}

// ─── Window ──────────────────────────────────────────────────────────────────

/// A bounded reporting period identified by a stable string id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Window {
  pub kind:  WindowKind,
  pub id:    String,
  /// Inclusive start of the range.
  pub start: DateTime<Utc>,
  /// Exclusive end of the range.
  pub end:   DateTime<Utc>,
}

fn utc_midnight(d: NaiveDate) -> DateTime<Utc> {
  d.and_time(NaiveTime::MIN).and_utc()
}

fn first_of_month(year: i32, month: u32) -> DateTime<Utc> {
  utc_midnight(NaiveDate::from_ymd_opt(year, month, 1).expect("first of a real month"))
}

impl Window {
  /// The window of `kind` containing `ts`.
  pub fn of(kind: WindowKind, ts: DateTime<Utc>) -> Window {
    match kind {
      WindowKind::Week => Window::week_of(ts),
      WindowKind::Month => Window::month_of(ts),
    }
  }

  /// The calendar month containing `ts`.
  pub fn month_of(ts: DateTime<Utc>) -> Window {
    let (year, month) = (ts.year(), ts.month());
    let end = if month == 12 {
      first_of_month(year + 1, 1)
    } else {
      first_of_month(year, month + 1)
    };
    Window {
      kind:  WindowKind::Month,
      id:    format!("{year:04}-{month:02}"),
      start: first_of_month(year, month),
      end,
    }
  }

  /// The ISO week containing `ts`. The id uses the ISO week-year, which
  /// can differ from the calendar year near January 1st.
  pub fn week_of(ts: DateTime<Utc>) -> Window {
    let iso = ts.iso_week();
    let monday = NaiveDate::from_isoywd_opt(iso.year(), iso.week(), Weekday::Mon)
      .expect("start of a real ISO week");
    Window {
      kind:  WindowKind::Week,
      id:    format!("{:04}-W{:02}", iso.year(), iso.week()),
      start: utc_midnight(monday),
      end:   utc_midnight(monday + Duration::days(7)),
    }
  }

  /// Parse a `"YYYY-MM"` month id back into its window.
  pub fn from_month_id(id: &str) -> Result<Window> {
    let parse_err = || Error::WindowParse(id.to_owned());
    let (y, m) = id.split_once('-').ok_or_else(parse_err)?;
    let year: i32 = y.parse().map_err(|_| parse_err())?;
    let month: u32 = m.parse().map_err(|_| parse_err())?;
    let first = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(parse_err)?;
    Ok(Window::month_of(utc_midnight(first)))
  }

  pub fn contains(&self, ts: DateTime<Utc>) -> bool {
    self.start <= ts && ts < self.end
  }
}

/// Every window of `kind` touching `[min, max]`, in chronological order.
pub fn windows_spanning(
  kind: WindowKind,
  min: DateTime<Utc>,
  max: DateTime<Utc>,
) -> Vec<Window> {
  let mut out = Vec::new();
  if min > max {
    return out;
  }
  let mut window = Window::of(kind, min);
  loop {
    let next_start = window.end;
    out.push(window);
    if next_start > max {
      break;
    }
    window = Window::of(kind, next_start);
  }
  out
}

// ─── Tests ───────────────────────────────────────────────────────────────────
