//! Error reports for one page instance, with fatal notifications capped.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use formscout_core::{DetectionErrorReport, PageInstanceId};
use tracing::{error, warn};

/// Most recent records kept per instance; older ones are only counted.
pub const RECORD_LIMIT: usize = 32;

/// A report with the time the host raised it.
#[derive(Debug, Clone)]
pub struct ErrorRecord {
    pub report: DetectionErrorReport,
    pub raised_at: DateTime<Utc>,
    pub delivered: bool,
}

#[derive(Debug)]
pub struct ErrorReporter {
    page: PageInstanceId,
    fatal_cap: u32,
    fatal_sent: u32,
    suppressed: u32,
    total: u64,
    last_fatal: Option<DetectionErrorReport>,
    records: VecDeque<ErrorRecord>,
}

impl ErrorReporter {
    pub fn new(page: PageInstanceId, fatal_cap: u32) -> Self {
        Self {
            page,
            fatal_cap,
            fatal_sent: 0,
            suppressed: 0,
            total: 0,
            last_fatal: None,
            records: VecDeque::with_capacity(RECORD_LIMIT),
        }
    }

    /// Record a failure. Returns the report to send to consumers, or `None`
    /// when it is fatal and the cap for this page instance is reached.
    pub fn report(
        &mut self,
        message: impl Into<String>,
        context: impl Into<String>,
        is_fatal: bool,
    ) -> Option<DetectionErrorReport> {
        let report = DetectionErrorReport {
            message: message.into(),
            context: context.into(),
            is_fatal,
        };
        let delivered = !is_fatal || self.fatal_sent < self.fatal_cap;
        if is_fatal {
            if delivered {
                self.fatal_sent += 1;
                error!(page = %self.page, context = %report.context, "{}", report.message);
            } else {
                self.suppressed += 1;
                warn!(page = %self.page, suppressed = self.suppressed, "fatal report suppressed");
            }
        } else {
            warn!(page = %self.page, context = %report.context, "{}", report.message);
        }
        if is_fatal {
            self.last_fatal = Some(report.clone());
        }
        if self.records.len() == RECORD_LIMIT {
            self.records.pop_front();
        }
        self.records.push_back(ErrorRecord {
            report: report.clone(),
            raised_at: Utc::now(),
            delivered,
        });
        self.total += 1;
        delivered.then_some(report)
    }

    pub fn suppressed(&self) -> u32 {
        self.suppressed
    }

    /// Every report raised, including those no longer kept.
    pub fn total(&self) -> u64 {
        self.total
    }

    /// The latest fatal report, delivered or not.
    pub fn last_fatal(&self) -> Option<&DetectionErrorReport> {
        self.last_fatal.as_ref()
    }

    /// The most recent reports, oldest first.
    pub fn records(&self) -> &VecDeque<ErrorRecord> {
        &self.records
    }
}
