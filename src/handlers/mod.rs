pub mod health;
pub mod parse;

pub use health::{health_handler, ready_handler};
pub use parse::{parse_csv_handler, parse_handler, AppState};
