//! Stockroom server: settings and service wiring used by the `stockroom`
//! binary.

pub mod context;
pub mod settings;

pub use context::AppContext;
pub use settings::AppConfig;
