pub mod classes;
pub mod combat;
pub mod config;
pub mod features;
pub mod generator;
pub mod input;
pub mod lore;
pub mod memory;
pub mod narration;
pub mod oracle;
pub mod persist;
pub mod run_state;
pub mod session;
