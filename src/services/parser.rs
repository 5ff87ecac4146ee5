use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;
use serde_json::{Map, Value};

use crate::error::SchemaViolation;
use crate::model::reservation::{FoodOrder, ReservationRecord};

const DATE_FORMAT: &str = "%Y-%m-%d";

fn fence_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)```(?:json|JSON)?\s*(?P<body>\{.*?\})\s*```").expect("valid fence pattern")
    })
}

/// Response-schema directive appended to every reservation prompt.
pub fn format_instructions() -> &'static str {
    r#"Respond with a single JSON object and nothing else. It must have exactly these fields:
{
  "client_name": string,
  "number_of_guests": positive integer,
  "date": string (YYYY-MM-DD),
  "food_ordered": [
    { "item": string, "quantity": positive integer, "price": number, "dietary_tags": [string] }
  ],
  "is_vip": boolean,
  "special_requests": [string],
  "preferences": [string]
}"#
}

/// Pulls the JSON object out of model text: bare, fenced, or embedded in prose.
pub(crate) fn extract_json(raw: &str) -> Result<&str, SchemaViolation> {
    let trimmed = raw.trim();

    if let Some(body) = fence_re().captures(trimmed).and_then(|c| c.name("body")) {
        return Ok(body.as_str());
    }

    match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if start < end => Ok(&trimmed[start..=end]),
        _ => Err(SchemaViolation::new("$", "no JSON object found in response")),
    }
}

pub(crate) fn parse_object(raw: &str) -> Result<Map<String, Value>, SchemaViolation> {
    let body = extract_json(raw)?;
    let value: Value = serde_json::from_str(body)
        .map_err(|e| SchemaViolation::new("$", format!("invalid JSON: {e}")))?;

    match value {
        Value::Object(obj) => Ok(obj),
        other => Err(SchemaViolation::new(
            "$",
            format!("expected an object, got {}", kind(&other)),
        )),
    }
}

/// Validates raw model output into a [`ReservationRecord`]. All-or-nothing.
pub fn parse_reservation(raw: &str) -> Result<ReservationRecord, SchemaViolation> {
    let obj = parse_object(raw)?;

    let client_name = required_str(&obj, "", "client_name")?;
    if client_name.trim().is_empty() {
        return Err(SchemaViolation::new("client_name", "must not be empty"));
    }

    let number_of_guests = positive_int(&obj, "", "number_of_guests")?;

    let date = required_str(&obj, "", "date")?;
    if NaiveDate::parse_from_str(&date, DATE_FORMAT).is_err() {
        return Err(SchemaViolation::new(
            "date",
            format!("`{date}` is not a valid YYYY-MM-DD calendar date"),
        ));
    }

    let orders = required(&obj, "", "food_ordered")?;
    let food_ordered = orders
        .as_array()
        .ok_or_else(|| wrong_type("food_ordered", "an array", orders))?
        .iter()
        .enumerate()
        .map(|(i, v)| food_order(i, v))
        .collect::<Result<Vec<_>, _>>()?;

    let is_vip = match required(&obj, "", "is_vip")? {
        Value::Bool(b) => *b,
        other => return Err(wrong_type("is_vip", "a boolean", other)),
    };

    let special_requests = string_list(&obj, "", "special_requests")?;
    let preferences = string_list(&obj, "", "preferences")?;

    Ok(ReservationRecord {
        client_name,
        number_of_guests,
        date,
        food_ordered,
        is_vip,
        special_requests,
        preferences,
    })
}

fn food_order(index: usize, value: &Value) -> Result<FoodOrder, SchemaViolation> {
    let prefix = format!("food_ordered[{index}]");
    let obj = value
        .as_object()
        .ok_or_else(|| wrong_type(&prefix, "an object", value))?;

    let item = required_str(obj, &prefix, "item")?;
    let quantity = positive_int(obj, &prefix, "quantity")?;

    let price_path = path(&prefix, "price");
    let price = required(obj, &prefix, "price")?;
    let price = match price.as_f64() {
        Some(p) if p.is_finite() && p >= 0.0 => p,
        Some(p) => {
            return Err(SchemaViolation::new(
                price_path,
                format!("must be a non-negative number, got {p}"),
            ))
        }
        None => return Err(wrong_type(&price_path, "a number", price)),
    };

    let dietary_tags = if obj.contains_key("dietary_tags") {
        string_list(obj, &prefix, "dietary_tags")?
    } else {
        Vec::new()
    };

    Ok(FoodOrder {
        item,
        quantity,
        price,
        dietary_tags,
    })
}

fn path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

fn required<'a>(
    obj: &'a Map<String, Value>,
    prefix: &str,
    key: &str,
) -> Result<&'a Value, SchemaViolation> {
    match obj.get(key) {
        None | Some(Value::Null) => Err(SchemaViolation::new(
            path(prefix, key),
            "required field is missing",
        )),
        Some(v) => Ok(v),
    }
}

fn required_str(
    obj: &Map<String, Value>,
    prefix: &str,
    key: &str,
) -> Result<String, SchemaViolation> {
    let value = required(obj, prefix, key)?;
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| wrong_type(&path(prefix, key), "a string", value))
}

fn positive_int(obj: &Map<String, Value>, prefix: &str, key: &str) -> Result<u32, SchemaViolation> {
    let field = path(prefix, key);
    let value = required(obj, prefix, key)?;

    if let Some(n) = value.as_u64() {
        if n == 0 {
            return Err(SchemaViolation::new(field, "must be a positive integer, got 0"));
        }
        return u32::try_from(n)
            .map_err(|_| SchemaViolation::new(field, format!("{n} is out of range")));
    }
    if let Some(n) = value.as_i64() {
        return Err(SchemaViolation::new(
            field,
            format!("must be a positive integer, got {n}"),
        ));
    }

    Err(wrong_type(&field, "an integer", value))
}

fn string_list(
    obj: &Map<String, Value>,
    prefix: &str,
    key: &str,
) -> Result<Vec<String>, SchemaViolation> {
    let field = path(prefix, key);
    let value = required(obj, prefix, key)?;
    let items = value
        .as_array()
        .ok_or_else(|| wrong_type(&field, "an array of strings", value))?;

    items
        .iter()
        .enumerate()
        .map(|(i, v)| {
            v.as_str()
                .map(str::to_string)
                .ok_or_else(|| wrong_type(&format!("{field}[{i}]"), "a string", v))
        })
        .collect()
}

fn wrong_type(field: &str, expected: &str, got: &Value) -> SchemaViolation {
    SchemaViolation::new(field, format!("expected {expected}, got {}", kind(got)))
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
