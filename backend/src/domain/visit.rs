//! Anonymous visit logging and the daily traffic report.
//!
//! Client addresses are never stored. Each hit keeps a short SHA-256
//! fingerprint of the address so unique visitors can still be counted.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use sha2::{Digest, Sha256};

use super::user::UserId;

/// Longest stored path, in characters.
pub const PATH_MAX_CHARS: usize = 250;
/// Longest stored user agent, in characters.
pub const USER_AGENT_MAX_CHARS: usize = 250;
/// Number of paths listed in the daily report.
pub const TOP_PATH_LIMIT: i64 = 10;

const IP_HASH_HEX_CHARS: usize = 16;
const SKIPPED_PREFIXES: [&str; 4] = ["/static/", "/health/", "/docs", "/api-docs/"];
const STATIC_SUFFIXES: [&str; 9] = [
    ".css", ".js", ".map", ".png", ".jpg", ".svg", ".ico", ".woff", ".woff2",
];

/// Originating client address: the first `X-Forwarded-For` hop, else the
/// peer address.
pub fn client_ip(forwarded_for: Option<&str>, peer: Option<&str>) -> Option<String> {
    forwarded_for
        .and_then(|header| header.split(',').next())
        .map(str::trim)
        .filter(|hop| !hop.is_empty())
        .or_else(|| peer.map(str::trim).filter(|addr| !addr.is_empty()))
        .map(str::to_owned)
}

/// Short fingerprint of a client address.
///
/// # Examples
/// ```
/// use ait_backend::domain::visit::ip_hash;
///
/// assert_eq!(ip_hash("203.0.113.7").len(), 16);
/// assert_eq!(ip_hash(""), "");
/// ```
pub fn ip_hash(ip: &str) -> String {
    if ip.is_empty() {
        return String::new();
    }
    let mut digest = hex::encode(Sha256::digest(ip.as_bytes()));
    digest.truncate(IP_HASH_HEX_CHARS);
    digest
}

/// Whether a request path is noise that should not be logged.
pub fn is_skipped_path(path: &str) -> bool {
    let lower = path.to_ascii_lowercase();
    lower == "/favicon.ico"
        || SKIPPED_PREFIXES.iter().any(|prefix| lower.starts_with(prefix))
        || STATIC_SUFFIXES.iter().any(|suffix| lower.ends_with(suffix))
}

fn truncate_chars(value: &str, max: usize) -> String {
    value.chars().take(max).collect()
}

/// A hit ready to be stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewVisit {
    pub ts: DateTime<Utc>,
    pub path: String,
    pub user_id: Option<UserId>,
    pub ip_hash: String,
    pub user_agent: Option<String>,
}

impl NewVisit {
    /// Build a visit from raw request data, hashing and truncating as needed.
    pub fn from_request(
        ts: DateTime<Utc>,
        path: &str,
        user_id: Option<UserId>,
        client_ip: Option<&str>,
        user_agent: Option<&str>,
    ) -> Self {
        Self {
            ts,
            path: truncate_chars(path, PATH_MAX_CHARS),
            user_id,
            ip_hash: client_ip.map(ip_hash).unwrap_or_default(),
            user_agent: user_agent
                .filter(|agent| !agent.is_empty())
                .map(|agent| truncate_chars(agent, USER_AGENT_MAX_CHARS)),
        }
    }
}

/// Hit count for one path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathHits {
    pub path: String,
    pub hits: i64,
}

/// Traffic summary for one UTC day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisitReport {
    pub date: NaiveDate,
    pub total_hits: i64,
    pub unique_visitors: i64,
    pub top_paths: Vec<PathHits>,
}

impl VisitReport {
    /// Plain-text rendering used by the admin CLI.
    pub fn render_text(&self) -> String {
        let mut out = format!(
            "Visitors for {}\nTotal hits: {}\nUnique IPs: {}\n\nTop paths:\n",
            self.date, self.total_hits, self.unique_visitors
        );
        for entry in &self.top_paths {
            out.push_str(&format!("  {:>4}  {}\n", entry.hits, entry.path));
        }
        out
    }
}

/// Half-open UTC window `[start, end)` covering `date`.
pub fn day_window(date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = date.and_time(chrono::NaiveTime::MIN).and_utc();
    (start, start + Duration::days(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;

    #[rstest]
    #[case(Some("203.0.113.7, 10.0.0.1"), Some("10.0.0.2"), Some("203.0.113.7"))]
    #[case(Some("  "), Some("10.0.0.2"), Some("10.0.0.2"))]
    #[case(None, Some("10.0.0.2"), Some("10.0.0.2"))]
    #[case(None, None, None)]
    fn picks_first_forwarded_hop(
        #[case] forwarded: Option<&str>,
        #[case] peer: Option<&str>,
        #[case] expected: Option<&str>,
    ) {
        assert_eq!(client_ip(forwarded, peer).as_deref(), expected);
    }

    #[rstest]
    fn ip_hash_is_a_sha256_prefix() {
        let full = hex::encode(Sha256::digest(b"203.0.113.7"));
        assert_eq!(ip_hash("203.0.113.7"), full.get(..16).unwrap_or_default());
    }

    #[rstest]
    #[case("/static/app.css", true)]
    #[case("/health/ready", true)]
    #[case("/favicon.ico", true)]
    #[case("/img/logo.PNG", true)]
    #[case("/api/v1/subjects", false)]
    #[case("/", false)]
    fn skips_static_and_probe_paths(#[case] path: &str, #[case] expected: bool) {
        assert_eq!(is_skipped_path(path), expected);
    }

    #[rstest]
    fn long_fields_are_truncated_by_characters() {
        let path = format!("/{}", "é".repeat(400));
        let visit = NewVisit::from_request(Utc::now(), &path, None, Some("1.2.3.4"), Some(""));
        assert_eq!(visit.path.chars().count(), PATH_MAX_CHARS);
        assert_eq!(visit.user_agent, None);
        assert_eq!(visit.ip_hash.len(), 16);
    }

    #[rstest]
    fn day_window_is_half_open() {
        let date = NaiveDate::from_ymd_opt(2025, 11, 3).expect("valid date");
        let (start, end) = day_window(date);
        assert_eq!(start, Utc.with_ymd_and_hms(2025, 11, 3, 0, 0, 0).single().expect("start"));
        assert_eq!(end - start, Duration::days(1));
    }

    #[rstest]
    fn renders_report_text() {
        let report = VisitReport {
            date: NaiveDate::from_ymd_opt(2025, 11, 3).expect("valid date"),
            total_hits: 12,
            unique_visitors: 4,
            top_paths: vec![PathHits {
                path: "/api/v1/subjects".to_owned(),
                hits: 7,
            }],
        };
        let text = report.render_text();
        assert!(text.starts_with("Visitors for 2025-11-03\nTotal hits: 12\nUnique IPs: 4\n"));
        assert!(text.ends_with("     7  /api/v1/subjects\n"));
    }
}
