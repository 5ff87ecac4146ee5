use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::model::customer::Review;

/// Preferences and sentiment pulled from past reviews with keyword matching.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ReviewInsights {
    pub dietary_preferences: Vec<String>,
    pub service_preferences: Vec<String>,
    pub ambiance_preferences: Vec<String>,
    pub common_complaints: Vec<String>,
    pub positive_experiences: Vec<String>,
    pub average_rating: f64,
}

const DIETARY_TRIGGERS: &[&str] = &["gluten", "vegan", "vegetarian", "allergy", "dairy"];
const DIETARY_TAGS: &[&str] = &["gluten-free", "vegan", "vegetarian", "dairy-free"];
const COMPLAINTS: &[&str] = &["slow", "cold", "noisy", "crowded"];
const POSITIVES: &[&str] = &["excellent", "amazing", "perfect", "wonderful"];

fn mentions_any(content: &str, words: &[&str]) -> bool {
    words.iter().any(|w| content.contains(w))
}

pub fn analyze(reviews: &[Review]) -> ReviewInsights {
    if reviews.is_empty() {
        return ReviewInsights::default();
    }

    let mut dietary = BTreeSet::new();
    let mut service = BTreeSet::new();
    let mut ambiance = BTreeSet::new();
    let mut complaints = BTreeSet::new();
    let mut positives = BTreeSet::new();
    let mut total_rating = 0u32;

    for review in reviews {
        let content = review.content.to_lowercase();
        total_rating += u32::from(review.rating);

        if mentions_any(&content, DIETARY_TRIGGERS) {
            for tag in DIETARY_TAGS.iter().filter(|t| content.contains(*t)) {
                dietary.insert(tag.to_string());
            }
        }

        if content.contains("service") {
            if mentions_any(&content, &["quick", "fast", "prompt"]) {
                service.insert("values prompt service".to_string());
            }
            if mentions_any(&content, &["attentive", "attention"]) {
                service.insert("prefers attentive service".to_string());
            }
        }

        if mentions_any(&content, &["quiet", "private", "romantic"]) {
            ambiance.insert("prefers quiet/private seating".to_string());
        }
        if content.contains("window") {
            ambiance.insert("prefers window seating".to_string());
        }

        if review.rating <= 3 {
            for issue in COMPLAINTS.iter().filter(|w| content.contains(*w)) {
                complaints.insert(issue.to_string());
            }
        }
        if review.rating >= 4 {
            for word in POSITIVES.iter().filter(|w| content.contains(*w)) {
                positives.insert(word.to_string());
            }
        }
    }

    ReviewInsights {
        dietary_preferences: dietary.into_iter().collect(),
        service_preferences: service.into_iter().collect(),
        ambiance_preferences: ambiance.into_iter().collect(),
        common_complaints: complaints.into_iter().collect(),
        positive_experiences: positives.into_iter().collect(),
        average_rating: f64::from(total_rating) / reviews.len() as f64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn review(rating: u8, content: &str) -> Review {
        Review {
            restaurant_name: None,
            date: "2024-01-01".into(),
            rating,
            content: content.into(),
        }
    }

    #[test]
    fn empty_reviews_give_defaults() {
        assert_eq!(analyze(&[]), ReviewInsights::default());
    }

    #[test]
    fn extracts_preferences_and_sentiment() {
        let insights = analyze(&[
            review(5, "Excellent vegan options and a quiet corner. Service was quick."),
            review(2, "Food arrived cold and the room was noisy."),
            review(4, "Loved the window seat, perfect evening."),
        ]);

        assert_eq!(insights.dietary_preferences, vec!["vegan"]);
        assert_eq!(insights.service_preferences, vec!["values prompt service"]);
        assert_eq!(
            insights.ambiance_preferences,
            vec!["prefers quiet/private seating", "prefers window seating"]
        );
        assert_eq!(insights.common_complaints, vec!["cold", "noisy"]);
        assert_eq!(insights.positive_experiences, vec!["excellent", "perfect"]);
        assert!((insights.average_rating - 11.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn complaints_only_count_on_low_ratings() {
        let insights = analyze(&[review(5, "A bit crowded but still great.")]);
        assert!(insights.common_complaints.is_empty());
    }
}
