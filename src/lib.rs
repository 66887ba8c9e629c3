pub mod api;
pub mod config;
pub mod errors;
pub mod names;
pub mod preview;
pub mod root;
pub mod survey;
pub mod synth;
pub mod tree;

pub use api::{generate, inspect, DatagenError, Generation, Inspection};
pub use config::GeneratorConfig;
