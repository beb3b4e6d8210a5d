pub mod types;

pub use types::{CategoryConfig, Config};
