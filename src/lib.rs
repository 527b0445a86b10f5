pub mod config;
pub mod export;
pub mod logging;
pub mod model;
pub mod source;
pub mod traits;

// Re-export common types for convenience
pub use model::*;
pub use traits::*;
