use serde::{Deserialize, Serialize};

/// Validated reservation extracted from model output.
///
/// Instances are produced by [`crate::services::parser::parse_reservation`], which rejects
/// anything missing or mistyped. Plain deserialization is only used to read back reports
/// this crate wrote itself.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ReservationRecord {
    pub client_name: String,
    pub number_of_guests: u32,
    pub date: String,
    pub food_ordered: Vec<FoodOrder>,
    pub is_vip: bool,
    pub special_requests: Vec<String>,
    pub preferences: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct FoodOrder {
    pub item: String,
    pub quantity: u32,
    pub price: f64,

    #[serde(default)]
    pub dietary_tags: Vec<String>,
}
