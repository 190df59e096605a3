pub mod chart;
pub mod holding;
pub mod market;
pub mod quote;
pub mod settings;
pub mod snapshot;
pub mod view;
