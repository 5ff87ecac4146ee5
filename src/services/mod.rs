pub mod ai;
pub mod ai_types;
pub mod hash;
pub mod parser;
pub mod pipeline;
pub mod prompt;
pub mod query;
pub mod reply;
pub mod reviews;
pub mod scheduler;
pub mod store;
