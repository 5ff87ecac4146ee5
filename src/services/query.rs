//! Client-scoped lookups over loaded customers. Results borrow from the input and carry
//! the owning client's name so they can be listed without the surrounding record.

use chrono::NaiveDate;
use serde::Serialize;
use tracing::debug;

use crate::error::QueryError;
use crate::model::customer::{Customer, Email, PastReservation, Review};

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ClientReview<'a> {
    pub client_name: &'a str,
    #[serde(flatten)]
    pub review: &'a Review,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ClientReservation<'a> {
    pub client_name: &'a str,
    pub client_emails: &'a [Email],
    #[serde(flatten)]
    pub reservation: &'a PastReservation,
}

fn matching<'a>(
    customers: &'a [Customer],
    client: Option<&'a str>,
) -> impl Iterator<Item = &'a Customer> + 'a {
    customers
        .iter()
        .filter(move |c| client.map_or(true, |name| c.name == name))
}

fn tagged<'a>(customer: &'a Customer, reservation: &'a PastReservation) -> ClientReservation<'a> {
    ClientReservation {
        client_name: &customer.name,
        client_emails: &customer.emails,
        reservation,
    }
}

/// Every review, or only those of `client` when given.
pub fn client_reviews<'a>(customers: &'a [Customer], client: Option<&'a str>) -> Vec<ClientReview<'a>> {
    matching(customers, client)
        .flat_map(|c| {
            c.reviews.iter().map(move |review| ClientReview {
                client_name: &c.name,
                review,
            })
        })
        .collect()
}

/// Every past reservation, or only those of `client` when given.
pub fn client_reservations<'a>(
    customers: &'a [Customer],
    client: Option<&'a str>,
) -> Vec<ClientReservation<'a>> {
    matching(customers, client)
        .flat_map(|c| c.reservations.iter().map(move |r| tagged(c, r)))
        .collect()
}

/// Past reservations on `date` (`YYYY-MM-DD`), in input order.
///
/// Stored reservations whose own date does not parse never match.
pub fn reservations_by_date<'a>(
    customers: &'a [Customer],
    date: &str,
) -> Result<Vec<ClientReservation<'a>>, QueryError> {
    let target = NaiveDate::parse_from_str(date.trim(), DATE_FORMAT)
        .map_err(|_| QueryError::InvalidDate(date.to_string()))?;

    let found = customers
        .iter()
        .flat_map(|c| c.reservations.iter().map(move |r| (c, r)))
        .filter(|(c, r)| match NaiveDate::parse_from_str(&r.date, DATE_FORMAT) {
            Ok(d) => d == target,
            Err(_) => {
                debug!(client = %c.name, date = %r.date, "skipping reservation with bad date");
                false
            }
        })
        .map(|(c, r)| tagged(c, r))
        .collect();

    Ok(found)
}
