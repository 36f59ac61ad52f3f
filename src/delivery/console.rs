// DANS : src/delivery/console.rs

use std::io::{self, Write};
use tracing::warn;

use crate::state::snapshot::{CycleOutcome, Snapshot};
use super::SnapshotSink;

/// Rapport texte multi-ligne, un bloc par cycle. Les échecs sont une ligne `[ERREUR]`.
pub struct ConsoleReport<W: Write + Send = io::Stdout> {
    out: W,
}

impl ConsoleReport<io::Stdout> {
    pub fn stdout() -> Self {
        Self { out: io::stdout() }
    }
}

impl<W: Write + Send> ConsoleReport<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

pub fn format_report(snapshot: &Snapshot) -> String {
    let volume = match snapshot.volume {
        Some(volume) => format!("{} WSOL", volume.normalize()),
        None => "n/a (premier cycle)".to_string(),
    };
    format!(
        "=== {mint} @ {ts} ===\n\
         Pool         : {pool}\n\
         Base         : {base} (vault {base_vault})\n\
         Quote        : {quote} WSOL (vault {quote_vault})\n\
         Prix         : {price} WSOL\n\
         Liquidité    : {liquidity} WSOL\n\
         Supply       : {supply}\n\
         Market cap   : {mcap} WSOL\n\
         Volume       : {volume}\n",
        mint = snapshot.token_mint,
        ts = snapshot.timestamp,
        pool = snapshot.pool,
        base = snapshot.base.normalize(),
        base_vault = snapshot.base_vault,
        quote = snapshot.quote.normalize(),
        quote_vault = snapshot.quote_vault,
        price = snapshot.price.normalize(),
        liquidity = snapshot.liquidity.normalize(),
        supply = snapshot.supply.normalize(),
        mcap = snapshot.market_cap.normalize(),
        volume = volume,
    )
}

impl<W: Write + Send> SnapshotSink for ConsoleReport<W> {
    fn emit(&mut self, outcome: &CycleOutcome) {
        let written = match outcome {
            Ok(snapshot) => writeln!(self.out, "{}", format_report(snapshot)),
            Err(e) => writeln!(self.out, "[ERREUR] {}", e),
        };
        if let Err(e) = written.and_then(|_| self.out.flush()) {
            warn!("[Console] Écriture du rapport impossible : {}", e);
        }
    }
}
