pub mod config;
pub mod error;
pub mod types;

pub use config::{load_config, load_config_or_default, MetabolismConfig, RegenerationPolicy};
pub use types::{EntityId, ResourceKind, SimTime};
