pub mod error;
pub mod config;
pub mod machine;
pub mod objective;
pub mod score;
pub mod population;
pub mod reproduction;
pub mod tournament;
pub mod telemetry;
pub mod chart;
pub mod server;
pub mod metrics;
