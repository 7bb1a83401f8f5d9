//! Human-facing document numbers (`PR-2026-00001`).
//!
//! Sequences are per prefix and year and live in memory alongside the store.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Datelike, Utc};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum NumberSeries {
    MaterialRequest,
    Rfq,
    Quote,
    QuoteApproval,
    PurchaseRequisition,
    PurchaseOrder,
}

impl NumberSeries {
    pub fn prefix(&self) -> &'static str {
        match self {
            NumberSeries::MaterialRequest => "MR",
            NumberSeries::Rfq => "RFQ",
            NumberSeries::Quote => "QT",
            NumberSeries::QuoteApproval => "QA",
            NumberSeries::PurchaseRequisition => "PR",
            NumberSeries::PurchaseOrder => "PO",
        }
    }
}

#[derive(Debug, Default)]
pub struct DocumentNumberer {
    counters: Mutex<HashMap<(NumberSeries, i32), u64>>,
}

impl DocumentNumberer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&self, series: NumberSeries, at: DateTime<Utc>) -> String {
        let year = at.year();
        // A poisoned counter map is still consistent: every update is a single insert.
        let mut counters = self.counters.lock().unwrap_or_else(PoisonError::into_inner);
        let seq = counters.entry((series, year)).or_insert(0);
        *seq += 1;
        format!("{}-{year}-{:05}", series.prefix(), *seq)
    }
}
