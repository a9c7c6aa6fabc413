//! Regulatory audit trail
//!
//! Every scoring decision is recorded as one immutable [`AuditRecord`]:
//! - the application identifier is replaced by its SHA-256 digest
//! - monetary amounts are rounded before fingerprinting
//! - records are only ever appended, never updated or removed
//!
//! Retrieval supports inclusive date bounds and a capped result count.

pub mod masking;
pub mod record;
pub mod store;

pub use masking::{hash_identifier, round_monetary, MaskedApplication, DEFAULT_ROUNDING_UNIT};
pub use record::{round_score, summarize, AuditRecord, AUDIT_COLUMNS, NO_EXPLANATION};
pub use store::{AuditSink, CsvAuditSink, MemoryAuditSink};

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use std::sync::Arc;
use tracing::debug;

use crate::application::CreditApplication;
use crate::errors::{Result, ScoringError};
use crate::explain::Explanation;
use crate::scorer::ScoreResult;

pub const DEFAULT_QUERY_LIMIT: usize = 100;
pub const DEFAULT_MAX_QUERY_LIMIT: usize = 1000;
pub const DEFAULT_SUMMARY_MAX_CHARS: usize = 200;

/// Filter for audit retrieval. Bounds are inclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditQuery {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub limit: usize,
}

impl Default for AuditQuery {
    fn default() -> Self {
        Self {
            start: None,
            end: None,
            limit: DEFAULT_QUERY_LIMIT,
        }
    }
}

impl AuditQuery {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            ..Self::default()
        }
    }

    pub fn between(mut self, start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        self.start = start;
        self.end = end;
        self
    }

    /// Build a query from textual bounds.
    ///
    /// Accepts RFC 3339 timestamps or plain `YYYY-MM-DD` dates; a plain end
    /// date covers the whole day.
    pub fn parse(start: Option<&str>, end: Option<&str>, limit: usize) -> Result<Self> {
        let start = start.map(|s| parse_bound(s, false)).transpose()?;
        let end = end.map(|s| parse_bound(s, true)).transpose()?;
        Ok(Self { start, end, limit })
    }

    fn matches(&self, record: &AuditRecord) -> bool {
        self.start.map_or(true, |s| record.timestamp >= s)
            && self.end.map_or(true, |e| record.timestamp <= e)
    }
}

fn parse_bound(text: &str, end_of_day: bool) -> Result<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
        return Ok(ts.with_timezone(&Utc));
    }

    let date = NaiveDate::parse_from_str(text, "%Y-%m-%d").map_err(|_| {
        ScoringError::InvalidAuditQuery(format!(
            "'{text}' is neither an RFC 3339 timestamp nor a YYYY-MM-DD date"
        ))
    })?;
    let time = if end_of_day {
        NaiveTime::from_hms_nano_opt(23, 59, 59, 999_999_999)
    } else {
        NaiveTime::from_hms_opt(0, 0, 0)
    };
    let time = time.ok_or_else(|| ScoringError::InvalidAuditQuery(format!("bad time for '{text}'")))?;
    Ok(date.and_time(time).and_utc())
}

/// Masks, records and retrieves scoring decisions.
#[derive(Clone)]
pub struct AuditRecorder {
    sink: Arc<dyn AuditSink>,
    rounding_unit: u64,
    summary_max_chars: usize,
    max_query_limit: usize,
}

impl std::fmt::Debug for AuditRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditRecorder")
            .field("rounding_unit", &self.rounding_unit)
            .field("summary_max_chars", &self.summary_max_chars)
            .field("max_query_limit", &self.max_query_limit)
            .finish_non_exhaustive()
    }
}

impl AuditRecorder {
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self {
            sink,
            rounding_unit: DEFAULT_ROUNDING_UNIT,
            summary_max_chars: DEFAULT_SUMMARY_MAX_CHARS,
            max_query_limit: DEFAULT_MAX_QUERY_LIMIT,
        }
    }

    pub fn with_rounding_unit(mut self, unit: u64) -> Self {
        self.rounding_unit = unit;
        self
    }

    pub fn with_summary_max_chars(mut self, max_chars: usize) -> Self {
        self.summary_max_chars = max_chars;
        self
    }

    pub fn with_max_query_limit(mut self, limit: usize) -> Self {
        self.max_query_limit = limit;
        self
    }

    pub fn max_query_limit(&self) -> usize {
        self.max_query_limit
    }

    pub fn sink(&self) -> &Arc<dyn AuditSink> {
        &self.sink
    }

    /// SHA-256 fingerprint of the masked application
    pub fn masked_features_hash(&self, app: &CreditApplication) -> Result<String> {
        MaskedApplication::from_application(app, self.rounding_unit).fingerprint()
    }

    /// Append exactly one record for a decision.
    pub fn record(
        &self,
        request_id: &str,
        app: &CreditApplication,
        result: &ScoreResult,
        explanation: Option<&Explanation>,
        model_version: &str,
        user_id: Option<&str>,
    ) -> Result<AuditRecord> {
        let masked_features_hash = self
            .masked_features_hash(app)
            .map_err(|e| ScoringError::AuditWrite(format!("fingerprint failed: {e}")))?;

        let record = AuditRecord {
            request_id: request_id.to_string(),
            timestamp: Utc::now(),
            model_version: model_version.to_string(),
            prediction_score: round_score(result.probability),
            risk_category: result.risk_category,
            decision: result.decision,
            explanation_summary: summarize(
                explanation.map(|e| e.narrative.as_str()),
                self.summary_max_chars,
            ),
            masked_features_hash,
            user_id: user_id.filter(|u| !u.trim().is_empty()).map(str::to_string),
        };

        self.sink.append(&record).map_err(|e| match e {
            ScoringError::AuditWrite(_) => e,
            other => ScoringError::AuditWrite(other.to_string()),
        })?;
        debug!(request_id, hash = %record.masked_features_hash, "Audit record appended");
        Ok(record)
    }

    /// The most recent `limit` matching records, oldest first.
    ///
    /// Recency is by timestamp; appends with equal timestamps keep store order.
    pub fn query(&self, query: &AuditQuery) -> Result<Vec<AuditRecord>> {
        if query.limit > self.max_query_limit {
            return Err(ScoringError::AuditLimitExceeded {
                requested: query.limit,
                max: self.max_query_limit,
            });
        }
        if query.limit == 0 {
            return Err(ScoringError::InvalidAuditQuery(
                "limit must be at least 1".to_string(),
            ));
        }
        if let (Some(start), Some(end)) = (query.start, query.end) {
            if start > end {
                return Err(ScoringError::InvalidAuditQuery(format!(
                    "start {start} is after end {end}"
                )));
            }
        }

        let mut matching: Vec<AuditRecord> = self
            .sink
            .read_all()?
            .into_iter()
            .filter(|r| query.matches(r))
            .collect();
        matching.sort_by_key(|r| r.timestamp);
        let skip = matching.len().saturating_sub(query.limit);
        Ok(matching.split_off(skip))
    }

    /// CSV bytes (header included) for the records `query` selects.
    pub fn export(&self, query: &AuditQuery) -> Result<Vec<u8>> {
        let records = self.query(query)?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(Vec::new());
        writer.write_record(AUDIT_COLUMNS)?;
        for record in &records {
            writer.serialize(record)?;
        }
        writer
            .into_inner()
            .map_err(|e| ScoringError::Io(std::io::Error::other(e.to_string())))
    }
}
