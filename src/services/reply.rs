use tracing::info;

use crate::error::{PipelineError, SchemaViolation};
use crate::services::ai::RequestClient;
use crate::services::ai_types::ProcessedReservation;
use crate::services::{parser, prompt};

/// Drafts a reply to `message` using the client's processed reservation as context.
pub async fn suggest_reply(
    client: &RequestClient,
    message: &str,
    context: &ProcessedReservation,
) -> Result<String, PipelineError> {
    if message.trim().is_empty() {
        return Err(SchemaViolation::new("message", "must not be empty").into());
    }

    let prompt = prompt::reply_prompt(message, context);
    let raw = client.complete(&prompt).await?;
    let reply = parse_reply(&raw)?;

    info!(client = %context.original_data.name, "drafted reply");
    Ok(reply)
}

pub fn parse_reply(raw: &str) -> Result<String, SchemaViolation> {
    let obj = parser::parse_object(raw)?;

    match obj.get("suggested_reply") {
        Some(serde_json::Value::String(s)) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        Some(serde_json::Value::String(_)) => Err(SchemaViolation::new(
            "suggested_reply",
            "must not be empty",
        )),
        Some(_) => Err(SchemaViolation::new("suggested_reply", "expected a string")),
        None => Err(SchemaViolation::new(
            "suggested_reply",
            "required field is missing",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::config::PipelineConfig;
    use crate::model::customer::Customer;
    use crate::model::reservation::ReservationRecord;
    use crate::services::ai::testing::ScriptedProvider;

    fn context() -> ProcessedReservation {
        ProcessedReservation {
            reservation: ReservationRecord {
                client_name: "Emily Chen".into(),
                number_of_guests: 2,
                date: "2024-06-12".into(),
                food_ordered: Vec::new(),
                is_vip: false,
                special_requests: vec!["window table".into()],
                preferences: Vec::new(),
            },
            original_data: Customer {
                name: "Emily Chen".into(),
                reviews: Vec::new(),
                reservations: Vec::new(),
                emails: Vec::new(),
            },
            source_id: "abc".into(),
        }
    }

    #[test]
    fn parse_reply_requires_text() {
        assert_eq!(
            parse_reply(r#"{"suggested_reply": " See you at 7. "}"#).unwrap(),
            "See you at 7."
        );
        assert!(parse_reply(r#"{"suggested_reply": ""}"#).is_err());
        assert!(parse_reply(r#"{"reply": "hi"}"#).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn drafts_reply_through_client() {
        let provider = Arc::new(ScriptedProvider::always(Ok(
            "```json\n{\"suggested_reply\": \"Your window table is confirmed.\"}\n```".into(),
        )));
        let client = RequestClient::from_config(provider.clone(), &PipelineConfig::default());

        let reply = suggest_reply(&client, "Can we keep the window table?", &context())
            .await
            .unwrap();

        assert_eq!(reply, "Your window table is confirmed.");
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn empty_message_is_rejected_without_a_request() {
        let provider = Arc::new(ScriptedProvider::always(Ok("{}".into())));
        let client = RequestClient::from_config(provider.clone(), &PipelineConfig::default());

        assert!(suggest_reply(&client, "  ", &context()).await.is_err());
        assert_eq!(provider.calls(), 0);
    }
}
