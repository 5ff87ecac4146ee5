#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Ping,
    AnalyzeReviews,
    ParseResponse,
    ProcessCustomers,
    SuggestReply,
    ClientReviews,
    ClientReservations,
    ReservationsByDate,
    Unknown,
}

impl From<&str> for Command {
    fn from(s: &str) -> Self {
        match s {
            "ping" => Command::Ping,
            "analyze_reviews" => Command::AnalyzeReviews,
            "parse_response" => Command::ParseResponse,
            "process_customers" => Command::ProcessCustomers,
            "suggest_reply" => Command::SuggestReply,
            "client_reviews" => Command::ClientReviews,
            "client_reservations" => Command::ClientReservations,
            "reservations_by_date" => Command::ReservationsByDate,
            _ => Command::Unknown,
        }
    }
}
