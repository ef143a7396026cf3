pub mod executor;
pub mod resolver;
pub mod substitution;

pub use executor::ReplayOrchestrator;
pub use resolver::{ElementResolver, Resolved};
pub use substitution::{PlaceholderPolicy, Substitutor, DEFAULT_VOCABULARY};
