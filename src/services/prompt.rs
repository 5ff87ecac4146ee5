use std::fmt::Write;

use serde::Serialize;

use crate::model::customer::Customer;
use crate::services::ai_types::ProcessedReservation;
use crate::services::parser::format_instructions;
use crate::services::reviews::ReviewInsights;

fn pretty<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "[]".to_string())
}

/// Prompt asking the model for one customer's updated reservation.
pub fn reservation_prompt(customer: &Customer, insights: &ReviewInsights) -> String {
    let mut p = String::new();

    p.push_str(
        "Process this client's reservation information and provide updated details.\n\
         Pay special attention to any changes requested in recent emails.\n\n",
    );

    let _ = writeln!(p, "CLIENT NAME: {}\n", customer.name.trim());
    let _ = writeln!(p, "CURRENT RESERVATIONS:\n{}\n", pretty(&customer.reservations));
    let _ = writeln!(p, "RECENT EMAILS:\n{}\n", pretty(&customer.emails));
    let _ = writeln!(p, "PREVIOUS REVIEWS:\n{}\n", pretty(&customer.reviews));
    let _ = writeln!(p, "REVIEW ANALYSIS:\n{}\n", pretty(insights));

    p.push_str(
        "Based on this information:\n\
         1. Update the number of guests if changes were requested\n\
         2. Note any dietary restrictions mentioned\n\
         3. Track special requests from emails\n\
         4. Identify preferences from past reviews\n\
         5. Set is_vip to true only if VIP status is explicitly stated, otherwise false\n\
         6. Preserve all pricing information for food items exactly as in the original order\n\n",
    );

    p.push_str(format_instructions());
    p
}

/// Prompt asking for a short reply to a client message, grounded in their reservation.
pub fn reply_prompt(message: &str, context: &ProcessedReservation) -> String {
    let original = &context.original_data;
    let mut p = String::new();

    p.push_str(
        "Generate a concise, helpful response to a client's message. Use the full context \
         of their reservation to provide a personalized and relevant reply.\n\n",
    );

    p.push_str("RESERVATION CONTEXT:\n");
    let _ = writeln!(p, "- Client: {}", original.name);
    let _ = writeln!(p, "- Current reservation: {}", pretty(&context.reservation));
    let _ = writeln!(p, "- Previous reviews: {}", pretty(&original.reviews));
    let _ = writeln!(p, "- Previous communications: {}\n", pretty(&original.emails));

    let _ = writeln!(p, "CLIENT MESSAGE:\n{}\n", message.trim());

    p.push_str(
        "The reply must address their query, acknowledge relevant preferences or requests, \
         stay appropriately formal, and be at most 3 sentences.\n\
         Respond with a single JSON object: { \"suggested_reply\": string }",
    );
    p
}
