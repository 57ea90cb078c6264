//! Day-granularity unlock gate and the clock seam used to evaluate it.

use chrono::{Local, NaiveDate};

/// Date format accepted for unlock dates.
pub const GATE_DATE_FORMAT: &str = "%Y-%m-%d";

/// Source of "today" for gate evaluation.
pub trait Clock: Send + Sync {
    /// Returns the current local calendar date.
    fn today(&self) -> NaiveDate;
}

/// Clock backed by the host's local time zone.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// Clock pinned to a fixed date, for tests and replays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}

/// Calendar-date gate that opens once today reaches the configured date.
///
/// An unparseable date yields a gate that never opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnlockGate {
    date: Option<NaiveDate>,
}

impl UnlockGate {
    /// Parses a decoded `YYYY-MM-DD` date into a gate.
    pub fn parse(decoded: &str) -> Self {
        Self {
            date: parse_gate_date(decoded),
        }
    }

    /// Returns the unlock date, or `None` for a permanently closed gate.
    pub fn date(&self) -> Option<NaiveDate> {
        self.date
    }

    /// Returns `true` when `today` is on or after the unlock date.
    pub fn is_open(&self, today: NaiveDate) -> bool {
        self.date.is_some_and(|date| today >= date)
    }
}

fn parse_gate_date(raw: &str) -> Option<NaiveDate> {
    // chrono accepts single-digit months and signed years; the gate does not.
    let shaped = raw.len() == 10
        && raw.bytes().enumerate().all(|(index, byte)| match index {
            4 | 7 => byte == b'-',
            _ => byte.is_ascii_digit(),
        });
    if !shaped {
        return None;
    }

    NaiveDate::parse_from_str(raw, GATE_DATE_FORMAT).ok()
}
