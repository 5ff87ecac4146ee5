use serde::{Deserialize, Serialize};

use crate::services::hash;

/// One diner as read from the input file. Never mutated after load.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Customer {
    pub name: String,

    #[serde(default)]
    pub reviews: Vec<Review>,

    #[serde(default)]
    pub reservations: Vec<PastReservation>,

    #[serde(default)]
    pub emails: Vec<Email>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Review {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restaurant_name: Option<String>,

    #[serde(default)]
    pub date: String,

    #[serde(default)]
    pub rating: u8,

    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PastReservation {
    #[serde(default)]
    pub date: String,

    #[serde(default)]
    pub number_of_people: u32,

    #[serde(default)]
    pub orders: Vec<OrderLine>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct OrderLine {
    pub item: String,

    #[serde(default)]
    pub dietary_tags: Vec<String>,

    #[serde(default)]
    pub price: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Email {
    #[serde(default)]
    pub date: String,

    #[serde(default)]
    pub subject: String,

    #[serde(default)]
    pub combined_thread: String,
}

/// Top-level input document.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct CustomerFile {
    #[serde(default)]
    pub diners: Vec<Customer>,
}

impl Customer {
    /// Stable identifier derived from the name and review text.
    pub fn source_id(&self) -> String {
        let parts = std::iter::once(self.name.as_str())
            .chain(self.reviews.iter().map(|r| r.content.as_str()));
        hash::hash_parts(parts)
    }
}
