pub mod analysis;
pub mod provider;
pub mod search_title;
pub mod session_state;

pub use analysis::*;
pub use provider::*;
pub use search_title::*;
pub use session_state::*;
