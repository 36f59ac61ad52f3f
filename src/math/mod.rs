pub mod decimals;
pub mod pool_metrics;
