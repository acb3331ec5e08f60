pub mod action;
pub mod class;
pub mod content;
pub mod pattern;
pub mod skill;
pub mod stats;
