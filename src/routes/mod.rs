pub mod analyze_route;
pub mod challenge_route;
pub mod default_route;
pub mod instructions_route;
