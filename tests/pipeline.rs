use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::time::Instant;

use reservation_core::model::customer::{Customer, Review};
use reservation_core::services::store;
use reservation_core::{
    LlmProvider, Pipeline, PipelineConfig, PipelineError, RequestClient, ServiceError,
};

/// Answers based on the client name embedded in the prompt.
///
/// `bad-*` clients get a reply without `number_of_guests`, `flaky-*` clients fail
/// transiently twice before answering, `down-*` clients always fail transiently.
#[derive(Default)]
struct NameAwareProvider {
    calls: Mutex<HashMap<String, usize>>,
}

impl NameAwareProvider {
    fn calls_for(&self, name: &str) -> usize {
        self.calls.lock().unwrap().get(name).copied().unwrap_or(0)
    }

    fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }
}

fn client_name(prompt: &str) -> String {
    prompt
        .lines()
        .find_map(|l| l.strip_prefix("CLIENT NAME: "))
        .unwrap_or_default()
        .trim()
        .to_string()
}

#[async_trait]
impl LlmProvider for NameAwareProvider {
    fn name(&self) -> &str {
        "name-aware"
    }

    async fn complete(&self, prompt: &str) -> Result<String, ServiceError> {
        let name = client_name(prompt);
        let call = {
            let mut calls = self.calls.lock().unwrap();
            let n = calls.entry(name.clone()).or_insert(0);
            *n += 1;
            *n
        };

        if name.starts_with("down-") {
            return Err(ServiceError::Transient("HTTP 503: overloaded".into()));
        }
        if name.starts_with("flaky-") && call <= 2 {
            return Err(ServiceError::Transient("HTTP 429: rate limited".into()));
        }

        let mut reply = json!({
            "client_name": name,
            "number_of_guests": 2,
            "date": "2024-06-10",
            "food_ordered": [
                { "item": "Wagyu Steak", "quantity": 2, "price": 120.5, "dietary_tags": [] }
            ],
            "is_vip": false,
            "special_requests": ["corner table"],
            "preferences": [format!("attempt {call}")]
        });
        if name.starts_with("bad-") {
            reply.as_object_mut().unwrap().remove("number_of_guests");
        }

        Ok(format!("```json\n{reply}\n```"))
    }
}

fn customer(name: &str) -> Customer {
    Customer {
        name: name.to_string(),
        reviews: vec![Review {
            restaurant_name: Some("French Laudure".into()),
            date: "2024-01-15".into(),
            rating: 5,
            content: format!("{name} loved the quiet corner table."),
        }],
        reservations: Vec::new(),
        emails: Vec::new(),
    }
}

fn config() -> PipelineConfig {
    PipelineConfig {
        batch_size: 5,
        batch_delay: Duration::from_secs(6),
        max_retries: 3,
        ..PipelineConfig::default()
    }
}

fn pipeline(provider: Arc<NameAwareProvider>) -> Pipeline {
    let config = config();
    Pipeline::new(RequestClient::from_config(provider, &config), &config)
}

#[tokio::test(start_paused = true)]
async fn twelve_customers_run_in_three_batches() {
    let provider = Arc::new(NameAwareProvider::default());
    let p = pipeline(provider.clone());
    let customers: Vec<Customer> = (0..12).map(|i| customer(&format!("client-{i}"))).collect();

    assert_eq!(p.scheduler().group_sizes(customers.len()), vec![5, 5, 2]);

    let started = Instant::now();
    let report = p.run(&customers, "in.json").await.unwrap();
    let elapsed = started.elapsed();

    // Two inter-batch delays, not three.
    assert!(elapsed >= Duration::from_secs(12));
    assert!(elapsed < Duration::from_secs(13));

    assert_eq!(report.metadata.total_processed, 12);
    assert_eq!(report.metadata.successful, 12);
    assert_eq!(report.metadata.failed, 0);
    assert_eq!(provider.total_calls(), 12);

    let names: Vec<_> = report
        .reservations
        .iter()
        .map(|r| r.original_data.name.clone())
        .collect();
    let expected: Vec<_> = customers.iter().map(|c| c.name.clone()).collect();
    assert_eq!(names, expected);
}

#[tokio::test(start_paused = true)]
async fn failures_are_isolated_and_counted() {
    let provider = Arc::new(NameAwareProvider::default());
    let p = pipeline(provider.clone());
    let customers = vec![
        customer("alice"),
        customer("bad-bob"),
        customer("flaky-carol"),
        customer("down-dave"),
        customer("erin"),
    ];

    let report = p.run(&customers, "in.json").await.unwrap();
    let meta = &report.metadata;

    assert_eq!(meta.total_processed, 5);
    assert_eq!(meta.successful + meta.failed, meta.total_processed);
    assert_eq!(meta.successful, 3);
    assert_eq!(meta.failed, 2);

    let failed: BTreeSet<_> = report.failures.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(failed, BTreeSet::from(["bad-bob", "down-dave"]));

    let bob = report.failures.iter().find(|f| f.name == "bad-bob").unwrap();
    assert!(bob.error.contains("number_of_guests"));
    assert_eq!(provider.calls_for("bad-bob"), 1);

    let dave = report.failures.iter().find(|f| f.name == "down-dave").unwrap();
    assert!(dave.error.contains("3 attempts"));
    assert_eq!(provider.calls_for("down-dave"), 3);

    // Third attempt's content is the one kept.
    let carol = report
        .reservations
        .iter()
        .find(|r| r.original_data.name == "flaky-carol")
        .unwrap();
    assert_eq!(carol.reservation.preferences, vec!["attempt 3"]);
    assert_eq!(provider.calls_for("flaky-carol"), 3);
}

#[tokio::test(start_paused = true)]
async fn fully_failed_run_still_writes_a_report() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.json");
    let output = dir.path().join("out/processed_output.json");
    std::fs::write(
        &input,
        json!({ "diners": [{ "name": "bad-one" }, { "name": "bad-two" }] }).to_string(),
    )
    .unwrap();

    let p = pipeline(Arc::new(NameAwareProvider::default()));
    let report = p.run_file(&input, &output).await.unwrap();

    assert_eq!(report.metadata.failed, 2);
    let written = store::load_report(&output).unwrap();
    assert_eq!(written.metadata.failed, 2);
    assert!(written.reservations.is_empty());
}

#[tokio::test(start_paused = true)]
async fn report_round_trips_through_json() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("report.json");
    let p = pipeline(Arc::new(NameAwareProvider::default()));
    let customers = vec![customer("alice"), customer("bad-bob"), customer("erin")];

    let report = p.run(&customers, "in.json").await.unwrap();
    store::save_report(&output, &report).unwrap();
    let back = store::load_report(&output).unwrap();

    assert_eq!(back.metadata, report.metadata);

    let ids = |r: &reservation_core::ProcessingReport| -> BTreeSet<String> {
        r.reservations
            .iter()
            .map(|x| x.source_id.clone())
            .chain(r.failures.iter().map(|f| f.source_id.clone()))
            .collect()
    };
    assert_eq!(ids(&back), ids(&report));
    assert_eq!(back.reservations, report.reservations);
    assert_eq!(back.reservations[0].source_id, customers[0].source_id());
}

#[tokio::test]
async fn missing_input_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let p = pipeline(Arc::new(NameAwareProvider::default()));

    let err = p
        .run_file(&dir.path().join("missing.json"), &dir.path().join("out.json"))
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Input { .. }));
    assert!(err.is_fatal());
}
