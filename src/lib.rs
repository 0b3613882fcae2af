mod agents;
mod config;
mod error;
mod evaluator;
mod leaderboard;
mod listing;
mod scorer;
mod session;
mod store;

pub use agents::*;
pub use config::*;
pub use error::*;
pub use evaluator::*;
pub use leaderboard::*;
pub use listing::*;
pub use scorer::*;
pub use session::*;
pub use store::*;
pub use uuid::Uuid;

/// 没有房源文件时使用的演示房源
pub fn demo_listings() -> Vec<Listing> {
    vec![
        Listing {
            address: "412 Dolores St, San Francisco".to_string(),
            bedrooms: 1,
            bathrooms: 1.0,
            details: "Top-floor unit with bay windows and in-unit laundry.".to_string(),
            ..Listing::new("demo-1", "Mission Dolores one-bed", 3450.0)
        }
        .with_agent_guess("Sonnet 4", 3300.0)
        .with_agent_guess("GPT-4.1", 3900.0)
        .with_agent_guess("Gemini 2.5 Pro", 3100.0),
        Listing {
            address: "88 Wythe Ave, Brooklyn".to_string(),
            bedrooms: 0,
            bathrooms: 1.0,
            details: "Studio in a converted warehouse, shared roof deck.".to_string(),
            ..Listing::new("demo-2", "Williamsburg studio", 2875.0)
        }
        .with_agent_guess("Sonnet 4", 2950.0)
        .with_agent_guess("GPT-4.1", 2600.0)
        .with_agent_guess("Gemini 2.5 Pro", 0.0),
        Listing {
            address: "1520 E 6th St, Austin".to_string(),
            bedrooms: 3,
            bathrooms: 2.5,
            details: "Townhouse with garage and small backyard.".to_string(),
            ..Listing::new("demo-3", "East Austin townhouse", 2650.0)
        }
        .with_agent_guess("Sonnet 4", 2500.0)
        .with_agent_guess("GPT-4.1", 2800.0)
        .with_agent_guess("Gemini 2.5 Pro", 2400.0),
    ]
}
