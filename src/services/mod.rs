pub mod analyzer;
pub mod anthropic_client;
pub mod challenge;
pub mod droid;
pub mod google_scraper;
pub mod instructions;
pub mod openai_client;
pub mod pipeline;
pub mod session_store;
pub mod testing;
pub mod title_extractor;
pub mod title_generator;

pub use analyzer::*;
pub use anthropic_client::*;
pub use challenge::*;
pub use droid::*;
pub use google_scraper::*;
pub use instructions::*;
pub use openai_client::*;
pub use pipeline::*;
pub use session_store::*;
pub use title_extractor::*;
pub use title_generator::*;
