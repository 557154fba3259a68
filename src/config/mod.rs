// src/config/mod.rs
pub mod agents;
pub mod settings;

pub use agents::{load_agents_default, load_agents_from, AgentConfig};
pub use settings::Settings;
