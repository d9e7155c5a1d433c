pub mod category;
pub mod clock;
pub mod config;
pub mod export;
pub mod metrics;
pub mod source;
pub mod worker;
