//! Line-delimited JSON command protocol: one `{ id, cmd, payload }` request per line in,
//! one `{ id, status, payload | message }` response per line out.

use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{debug, error};

use crate::model::customer::{Customer, Review};
use crate::services::ai_types::ProcessedReservation;
use crate::services::pipeline::Pipeline;
use crate::services::{parser, query, reply, reviews};

mod command;
use command::Command;

fn get_cmd(req: &Value) -> &str {
    req.get("cmd").and_then(|v| v.as_str()).unwrap_or("")
}

fn get_id(req: &Value) -> Value {
    req.get("id").cloned().unwrap_or(Value::Null)
}

fn get_payload(req: &Value) -> &Value {
    static EMPTY: Value = Value::Null;
    req.get("payload").unwrap_or(&EMPTY)
}

fn ok(id: Value, payload: Value) -> String {
    json!({
        "id": id,
        "status": "ok",
        "payload": payload
    })
    .to_string()
}

fn err(id: Value, message: impl Into<String>) -> String {
    json!({
        "id": id,
        "status": "error",
        "message": message.into()
    })
    .to_string()
}

fn field<T: DeserializeOwned>(payload: &Value, key: &str) -> Result<T, String> {
    let value = payload
        .get(key)
        .cloned()
        .ok_or_else(|| format!("payload.{key} is required"))?;
    serde_json::from_value(value).map_err(|e| format!("invalid payload.{key}: {e}"))
}

fn client_filter(payload: &Value) -> Option<&str> {
    payload
        .get("client_name")
        .and_then(|v| v.as_str())
        .filter(|s| !s.trim().is_empty())
}

/// Awaits one request, answering `internal core error` if it panics.
pub async fn shielded<F>(request: F) -> String
where
    F: Future<Output = String>,
{
    match AssertUnwindSafe(request).catch_unwind().await {
        Ok(response) => response,
        Err(_) => {
            error!("request handler panicked");
            json!({
                "status": "error",
                "message": "internal core error"
            })
            .to_string()
        }
    }
}

/// Answers protocol requests. Commands that talk to the model go through `pipeline`.
pub struct Handler {
    pipeline: Pipeline,
}

impl Handler {
    pub fn new(pipeline: Pipeline) -> Self {
        Self { pipeline }
    }

    /// Entry point for the line loop: [`Handler::handle`] behind [`shielded`].
    pub async fn handle_line(&self, input: &str) -> String {
        shielded(self.handle(input)).await
    }

    pub async fn handle(&self, input: &str) -> String {
        let req: Value = match serde_json::from_str(input) {
            Ok(v) => v,
            Err(_) => {
                return json!({
                    "status": "error",
                    "message": "invalid json"
                })
                .to_string();
            }
        };

        let id = get_id(&req);
        let cmd_str = get_cmd(&req);
        let payload = get_payload(&req);

        debug!(cmd = cmd_str, "handling request");

        match Command::from(cmd_str) {
            Command::Ping => ok(id, json!({ "message": "reservation-core alive" })),

            Command::AnalyzeReviews => match field::<Vec<Review>>(payload, "reviews") {
                Ok(list) => ok(id, json!({ "insights": reviews::analyze(&list) })),
                Err(e) => err(id, e),
            },

            Command::ParseResponse => {
                let text = payload.get("text").and_then(|v| v.as_str()).unwrap_or("");
                if text.trim().is_empty() {
                    return err(id, "payload.text is required");
                }
                match parser::parse_reservation(text) {
                    Ok(record) => ok(id, json!({ "reservation": record })),
                    Err(e) => err(id, e.to_string()),
                }
            }

            Command::ProcessCustomers => {
                let diners = match field::<Vec<Customer>>(payload, "diners") {
                    Ok(v) => v,
                    Err(e) => return err(id, e),
                };
                let input_file = payload
                    .get("input_file")
                    .and_then(|v| v.as_str())
                    .unwrap_or("<protocol>");

                match self.pipeline.run(&diners, input_file).await {
                    Ok(report) => ok(id, json!({ "report": report })),
                    Err(e) => err(id, e.to_string()),
                }
            }

            Command::SuggestReply => {
                let message = payload.get("message").and_then(|v| v.as_str()).unwrap_or("");
                if message.trim().is_empty() {
                    return err(id, "payload.message is required");
                }
                let context = match field::<ProcessedReservation>(payload, "reservation") {
                    Ok(v) => v,
                    Err(e) => return err(id, e),
                };

                match reply::suggest_reply(self.pipeline.client(), message, &context).await {
                    Ok(text) => ok(id, json!({ "reply": text })),
                    Err(e) => err(id, e.to_string()),
                }
            }

            Command::ClientReviews => match field::<Vec<Customer>>(payload, "diners") {
                Ok(diners) => {
                    let found = query::client_reviews(&diners, client_filter(payload));
                    ok(id, json!({ "reviews": found }))
                }
                Err(e) => err(id, e),
            },

            Command::ClientReservations => match field::<Vec<Customer>>(payload, "diners") {
                Ok(diners) => {
                    let found = query::client_reservations(&diners, client_filter(payload));
                    ok(id, json!({ "reservations": found }))
                }
                Err(e) => err(id, e),
            },

            Command::ReservationsByDate => {
                let diners = match field::<Vec<Customer>>(payload, "diners") {
                    Ok(v) => v,
                    Err(e) => return err(id, e),
                };
                let date = payload.get("date").and_then(|v| v.as_str()).unwrap_or("");

                match query::reservations_by_date(&diners, date) {
                    Ok(found) => ok(id, json!({ "reservations": found })),
                    Err(e) => err(id, e.to_string()),
                }
            }

            Command::Unknown => err(id, "unknown command"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::config::PipelineConfig;
    use crate::services::ai::{testing::ScriptedProvider, RequestClient};

    fn handler(reply: &str) -> Handler {
        let provider = Arc::new(ScriptedProvider::always(Ok(reply.to_string())));
        let config = PipelineConfig::default();
        Handler::new(Pipeline::new(
            RequestClient::from_config(provider, &config),
            &config,
        ))
    }

    async fn call(h: &Handler, req: Value) -> Value {
        let out = h.handle(&req.to_string()).await;
        serde_json::from_str(&out).unwrap()
    }

    #[tokio::test]
    async fn ping_echoes_id() {
        let h = handler("{}");
        let resp = call(&h, json!({ "id": 7, "cmd": "ping" })).await;
        assert_eq!(resp["id"], 7);
        assert_eq!(resp["status"], "ok");
    }

    #[tokio::test]
    async fn invalid_json_and_unknown_command_are_errors() {
        let h = handler("{}");
        let out: Value = serde_json::from_str(&h.handle("not json").await).unwrap();
        assert_eq!(out["message"], "invalid json");

        let resp = call(&h, json!({ "id": "x", "cmd": "nope" })).await;
        assert_eq!(resp["status"], "error");
        assert_eq!(resp["message"], "unknown command");
    }

    #[tokio::test]
    async fn parse_response_reports_schema_violation() {
        let h = handler("{}");
        let resp = call(
            &h,
            json!({ "id": 1, "cmd": "parse_response", "payload": { "text": "{\"client_name\": \"A\"}" } }),
        )
        .await;
        assert_eq!(resp["status"], "error");
        assert!(resp["message"].as_str().unwrap().contains("number_of_guests"));
    }

    #[tokio::test]
    async fn analyze_reviews_returns_insights() {
        let h = handler("{}");
        let resp = call(
            &h,
            json!({ "id": 2, "cmd": "analyze_reviews", "payload": {
                "reviews": [{ "date": "2024-01-01", "rating": 5, "content": "Wonderful window view" }]
            } }),
        )
        .await;
        assert_eq!(resp["status"], "ok");
        assert_eq!(
            resp["payload"]["insights"]["ambiance_preferences"][0],
            "prefers window seating"
        );
    }

    #[tokio::test]
    async fn process_customers_returns_report() {
        let reply = json!({
            "client_name": "Emily Chen",
            "number_of_guests": 2,
            "date": "2024-06-12",
            "food_ordered": [{ "item": "Truffle Risotto", "quantity": 1, "price": 38.0 }],
            "is_vip": false,
            "special_requests": [],
            "preferences": []
        });
        let h = handler(&reply.to_string());
        let resp = call(
            &h,
            json!({ "id": 3, "cmd": "process_customers", "payload": {
                "diners": [{ "name": "Emily Chen" }]
            } }),
        )
        .await;

        assert_eq!(resp["status"], "ok");
        let report = &resp["payload"]["report"];
        assert_eq!(report["metadata"]["successful"], 1);
        assert_eq!(report["metadata"]["input_file"], "<protocol>");
        assert_eq!(report["reservations"][0]["food_ordered"][0]["item"], "Truffle Risotto");
        assert_eq!(report["reservations"][0]["original_data"]["name"], "Emily Chen");
    }

    fn diners() -> Value {
        json!([
            {
                "name": "Emily Chen",
                "reviews": [{ "date": "2024-03-01", "rating": 5, "content": "Lovely" }],
                "reservations": [{ "date": "2024-06-12", "number_of_people": 2 }],
                "emails": [{ "date": "2024-06-01", "subject": "Booking", "combined_thread": "" }]
            },
            {
                "name": "Michael Chang",
                "reservations": [
                    { "date": "2024-06-12", "number_of_people": 6 },
                    { "date": "2024-07-01", "number_of_people": 3 }
                ]
            }
        ])
    }

    #[tokio::test]
    async fn client_queries_filter_by_name() {
        let h = handler("{}");
        let resp = call(
            &h,
            json!({ "id": 5, "cmd": "client_reservations", "payload": {
                "diners": diners(), "client_name": "Michael Chang"
            } }),
        )
        .await;
        assert_eq!(resp["status"], "ok");
        let found = resp["payload"]["reservations"].as_array().unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[1]["client_name"], "Michael Chang");
        assert_eq!(found[1]["number_of_people"], 3);

        let resp = call(
            &h,
            json!({ "id": 6, "cmd": "client_reviews", "payload": { "diners": diners() } }),
        )
        .await;
        assert_eq!(resp["payload"]["reviews"][0]["client_name"], "Emily Chen");
    }

    #[tokio::test]
    async fn reservations_by_date_validates_date() {
        let h = handler("{}");
        let resp = call(
            &h,
            json!({ "id": 7, "cmd": "reservations_by_date", "payload": {
                "diners": diners(), "date": "2024-06-12"
            } }),
        )
        .await;
        let found = resp["payload"]["reservations"].as_array().unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0]["client_emails"][0]["subject"], "Booking");

        let resp = call(
            &h,
            json!({ "id": 8, "cmd": "reservations_by_date", "payload": {
                "diners": diners(), "date": "June 12th"
            } }),
        )
        .await;
        assert_eq!(resp["status"], "error");
        assert!(resp["message"].as_str().unwrap().contains("YYYY-MM-DD"));
    }

    async fn explode() -> String {
        panic!("handler blew up")
    }

    #[tokio::test]
    async fn panicking_request_becomes_internal_error() {
        let out = shielded(explode()).await;
        let resp: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(resp["status"], "error");
        assert_eq!(resp["message"], "internal core error");

        let h = handler("{}");
        let resp: Value =
            serde_json::from_str(&h.handle_line(r#"{"id":1,"cmd":"ping"}"#).await).unwrap();
        assert_eq!(resp["status"], "ok");
    }

    #[tokio::test]
    async fn process_customers_requires_diners() {
        let h = handler("{}");
        let resp = call(&h, json!({ "id": 4, "cmd": "process_customers", "payload": {} })).await;
        assert_eq!(resp["message"], "payload.diners is required");
    }
}
