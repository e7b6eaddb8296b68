use axum::http::HeaderMap;
use chrono::{Local, NaiveDate};
use dashmap::DashMap;

/// Generations allowed per client key per calendar day.
pub const DAILY_LIMIT: u32 = 5;

/// Client key shared by every request we cannot attribute to an address.
/// All such clients draw from a single quota bucket.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// One client's generation activity for a single calendar day.
///
/// Records are never deleted; a stale entry is overwritten in place the
/// next time its client shows up on a later day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct UsageRecord {
    count: u32,
    day: NaiveDate,
}

/// The outcome of a quota check, computed before any increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaDecision {
    pub allowed: bool,
    /// Generations left after the current one. `None` means unbounded (PRO).
    pub remaining: Option<u32>,
}

impl QuotaDecision {
    fn unbounded() -> Self {
        QuotaDecision {
            allowed: true,
            remaining: None,
        }
    }
}

/// In-process, volatile per-client daily quota table.
///
/// The table is shared by all concurrent requests in one gateway process
/// and is lost on restart. The check/increment pair is not atomic
/// across a request: two concurrent requests from one client can both
/// pass `check` before either increments, so the daily limit is a soft
/// ceiling under concurrency. See DESIGN.md.
#[derive(Debug, Default)]
pub struct QuotaGate {
    records: DashMap<String, UsageRecord>,
}

impl QuotaGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decides whether a generation may proceed for `client_key` today.
    ///
    /// PRO requests short-circuit to an unbounded allowance without
    /// touching the table.
    pub fn check(&self, client_key: &str, pro: bool) -> QuotaDecision {
        self.check_on_day(client_key, pro, Local::now().date_naive())
    }

    /// Records one accepted, non-PRO generation for `client_key`.
    ///
    /// Must be called exactly once per accepted non-exempt generation:
    /// never for PRO requests, never for rejected requests.
    pub fn increment(&self, client_key: &str) {
        self.increment_on_day(client_key, Local::now().date_naive());
    }

    fn check_on_day(&self, client_key: &str, pro: bool, today: NaiveDate) -> QuotaDecision {
        if pro {
            return QuotaDecision::unbounded();
        }

        match self.records.get(client_key) {
            // Same-day record: enforce the ceiling
            Some(record) if record.day == today => {
                if record.count >= DAILY_LIMIT {
                    QuotaDecision {
                        allowed: false,
                        remaining: Some(0),
                    }
                } else {
                    QuotaDecision {
                        allowed: true,
                        remaining: Some(DAILY_LIMIT - record.count - 1),
                    }
                }
            }
            // New client, or a record left over from an earlier day
            _ => QuotaDecision {
                allowed: true,
                remaining: Some(DAILY_LIMIT - 1),
            },
        }
    }

    fn increment_on_day(&self, client_key: &str, today: NaiveDate) {
        self.records
            .entry(client_key.to_string())
            .and_modify(|record| {
                if record.day == today {
                    record.count += 1;
                } else {
                    // Lazy rollover: supersede the stale entry in place
                    *record = UsageRecord {
                        count: 1,
                        day: today,
                    };
                }
            })
            .or_insert(UsageRecord {
                count: 1,
                day: today,
            });
    }
}

/// Resolves the quota bucket identity for a request from its
/// network-origin headers.
///
/// Takes the first comma-separated `x-forwarded-for` entry if present,
/// then `x-real-ip`, then the shared [`UNKNOWN_CLIENT`] sentinel. The
/// forwarded header is client-controlled unless a trusted proxy
/// overwrites it; no stronger identity scheme exists in this gateway.
pub fn client_key(headers: &HeaderMap) -> String {
    if let Some(forwarded) = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
    {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }

    if let Some(real_ip) = headers
        .get("x-real-ip")
        .and_then(|value| value.to_str().ok())
    {
        let real_ip = real_ip.trim();
        if !real_ip.is_empty() {
            return real_ip.to_string();
        }
    }

    UNKNOWN_CLIENT.to_string()
}
