// DANS : src/delivery/mod.rs
//
// Les "coquilles" de sortie : elles reçoivent le résultat de chaque cycle,
// sans jamais influencer le calcul.

pub mod console;
pub mod csv_sink;
pub mod http;

pub use console::ConsoleReport;
pub use csv_sink::CsvSink;

use crate::state::snapshot::{CycleOutcome, LatestSnapshot};

/// Destination du résultat d'un cycle de polling.
pub trait SnapshotSink: Send {
    fn emit(&mut self, outcome: &CycleOutcome);
}

impl SnapshotSink for LatestSnapshot {
    fn emit(&mut self, outcome: &CycleOutcome) {
        self.publish(outcome);
    }
}
