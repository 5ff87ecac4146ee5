use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::customer::Customer;
use crate::model::reservation::ReservationRecord;

/// A validated reservation plus the record it came from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProcessedReservation {
    #[serde(flatten)]
    pub reservation: ReservationRecord,
    pub original_data: Customer,
    pub source_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FailedItem {
    pub name: String,
    pub source_id: String,
    pub error: String,
}

/// Terminal result for exactly one customer.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemOutcome {
    Succeeded(Box<ProcessedReservation>),
    Failed(FailedItem),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReportMetadata {
    pub processed_at: DateTime<Utc>,
    pub input_file: String,
    pub total_processed: usize,
    pub successful: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProcessingReport {
    pub metadata: ReportMetadata,
    pub reservations: Vec<ProcessedReservation>,

    #[serde(default)]
    pub failures: Vec<FailedItem>,
}

impl ProcessingReport {
    pub fn new(input_file: impl Into<String>) -> Self {
        Self {
            metadata: ReportMetadata {
                processed_at: Utc::now(),
                input_file: input_file.into(),
                total_processed: 0,
                successful: 0,
                failed: 0,
            },
            reservations: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub fn record(&mut self, outcome: ItemOutcome) {
        self.metadata.total_processed += 1;
        match outcome {
            ItemOutcome::Succeeded(reservation) => {
                self.metadata.successful += 1;
                self.reservations.push(*reservation);
            }
            ItemOutcome::Failed(failure) => {
                self.metadata.failed += 1;
                self.failures.push(failure);
            }
        }
    }

    /// Stamps the completion time.
    pub fn finish(&mut self) {
        self.metadata.processed_at = Utc::now();
    }
}
