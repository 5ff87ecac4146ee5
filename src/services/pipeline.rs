use std::ops::ControlFlow;
use std::path::Path;

use tracing::{error, info, warn};

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::model::customer::Customer;
use crate::model::reservation::ReservationRecord;
use crate::services::{
    ai::RequestClient,
    ai_types::{FailedItem, ItemOutcome, ProcessedReservation, ProcessingReport},
    parser, prompt, reviews,
    scheduler::BatchScheduler,
    store,
};

/// Drives customers through the request client in batches and aggregates the outcomes.
pub struct Pipeline {
    client: RequestClient,
    scheduler: BatchScheduler,
}

impl Pipeline {
    pub fn new(client: RequestClient, config: &PipelineConfig) -> Self {
        Self {
            client,
            scheduler: BatchScheduler::new(config.batch_size, config.batch_delay),
        }
    }

    pub fn client(&self) -> &RequestClient {
        &self.client
    }

    pub fn scheduler(&self) -> &BatchScheduler {
        &self.scheduler
    }

    /// Per-item errors come back as `ItemOutcome::Failed`; only fatal ones are `Err`.
    pub async fn process_customer(&self, customer: &Customer) -> Result<ItemOutcome, PipelineError> {
        let source_id = customer.source_id();
        let insights = reviews::analyze(&customer.reviews);
        let prompt = prompt::reservation_prompt(customer, &insights);

        match self.request_reservation(&prompt).await {
            Ok(reservation) => {
                info!(client = %customer.name, "processed client");
                Ok(ItemOutcome::Succeeded(Box::new(ProcessedReservation {
                    reservation,
                    original_data: customer.clone(),
                    source_id,
                })))
            }
            Err(err) if err.is_fatal() => Err(err),
            Err(err) => {
                warn!(client = %customer.name, error = %err, "client failed");
                Ok(ItemOutcome::Failed(FailedItem {
                    name: customer.name.clone(),
                    source_id,
                    error: err.to_string(),
                }))
            }
        }
    }

    async fn request_reservation(&self, prompt: &str) -> Result<ReservationRecord, PipelineError> {
        let raw = self.client.complete(prompt).await?;
        Ok(parser::parse_reservation(&raw)?)
    }

    pub async fn run(
        &self,
        customers: &[Customer],
        input_file: &str,
    ) -> Result<ProcessingReport, PipelineError> {
        let mut report = ProcessingReport::new(input_file);
        let mut fatal: Option<PipelineError> = None;

        info!(
            provider = self.client.provider_name(),
            total = customers.len(),
            batch_size = self.scheduler.batch_size(),
            batches = self.scheduler.group_sizes(customers.len()).len(),
            "starting run"
        );

        self.scheduler
            .run(
                customers,
                |customer| self.process_customer(customer),
                |progress, outcomes| {
                    for outcome in outcomes {
                        match outcome {
                            Ok(outcome) => report.record(outcome),
                            Err(err) => {
                                fatal.get_or_insert(err);
                            }
                        }
                    }

                    info!(
                        batch = progress.index + 1,
                        of = progress.total_groups,
                        processed = report.metadata.total_processed,
                        successful = report.metadata.successful,
                        failed = report.metadata.failed,
                        "batch complete"
                    );

                    if fatal.is_some() {
                        ControlFlow::Break(())
                    } else {
                        ControlFlow::Continue(())
                    }
                },
            )
            .await;

        if let Some(err) = fatal {
            error!(error = %err, "aborting run");
            return Err(err);
        }

        report.finish();
        info!(
            total = report.metadata.total_processed,
            successful = report.metadata.successful,
            failed = report.metadata.failed,
            "run complete"
        );
        Ok(report)
    }

    /// Loads customers from `input`, runs them, and writes the report to `output`.
    pub async fn run_file(
        &self,
        input: &Path,
        output: &Path,
    ) -> Result<ProcessingReport, PipelineError> {
        let customers = store::load_customers(input)?;
        let report = self.run(&customers, &input.display().to_string()).await?;
        store::save_report(output, &report)?;
        info!(output = %output.display(), "report saved");
        Ok(report)
    }
}
