pub mod pool;

pub use pool::{PUMP_AMM_LAYOUT, PUMP_AMM_PROGRAM_ID};
