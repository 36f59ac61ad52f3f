// DANS : src/delivery/csv_sink.rs

use anyhow::{Context, Result};
use csv::WriterBuilder;
use std::{
    fs::{File, OpenOptions},
    path::{Path, PathBuf},
};
use tracing::{debug, warn};

use crate::state::snapshot::{CycleOutcome, Snapshot};
use super::SnapshotSink;

pub const CSV_HEADER: [&str; 7] = ["ts", "base", "quote", "price_wsol", "lp_wsol", "supply", "mcap_wsol"];

/// Historique append-only. Un cycle en échec n'écrit aucune ligne.
pub struct CsvSink {
    path: PathBuf,
    writer: csv::Writer<File>,
}

impl CsvSink {
    /// Ouvre (ou crée) le fichier en ajout. L'en-tête n'est écrit que si le fichier est vide.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Ouverture du CSV {}", path.display()))?;
        let need_header = file.metadata().map(|m| m.len() == 0).unwrap_or(true);

        let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);
        if need_header {
            writer.write_record(CSV_HEADER).context("Écriture de l'en-tête CSV")?;
            writer.flush().context("Écriture de l'en-tête CSV")?;
        }
        Ok(Self { path, writer })
    }

    fn append(&mut self, snapshot: &Snapshot) -> Result<()> {
        let row = [
            snapshot.timestamp.to_string(),
            snapshot.base.normalize().to_string(),
            snapshot.quote.normalize().to_string(),
            snapshot.price.normalize().to_string(),
            snapshot.liquidity.normalize().to_string(),
            snapshot.supply.normalize().to_string(),
            snapshot.market_cap.normalize().to_string(),
        ];
        self.writer.write_record(&row)?;
        self.writer.flush()?;
        Ok(())
    }
}

impl SnapshotSink for CsvSink {
    fn emit(&mut self, outcome: &CycleOutcome) {
        let Ok(snapshot) = outcome else {
            debug!(path = %self.path.display(), "[CSV] Cycle en échec, aucune ligne écrite");
            return;
        };
        if let Err(e) = self.append(snapshot) {
            warn!(path = %self.path.display(), "[CSV] Ajout de ligne impossible : {}", e);
        }
    }
}
