// DANS: src/math/pool_metrics.rs

use rust_decimal::Decimal;

/// Les métriques dérivées d'un pool, toutes libellées en quote (WSOL).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolMetrics {
    pub price: Decimal,
    pub liquidity: Decimal,
    pub market_cap: Decimal,
}

/// Calcule prix, liquidité et market cap à partir des réserves normalisées.
///
/// Fonction totale : une réserve base nulle donne un prix de 0 (et donc une
/// market cap de 0). C'est le signal "pas assez de liquidité", pas une erreur.
pub fn compute(base_qty: Decimal, quote_qty: Decimal, supply: Decimal) -> PoolMetrics {
    let price = if base_qty > Decimal::ZERO {
        // Un quotient hors de la plage de `Decimal` sature : 0 reste réservé à "base vide".
        quote_qty.checked_div(base_qty).unwrap_or(Decimal::MAX)
    } else {
        Decimal::ZERO
    };

    // Approximation de la liquidité des deux côtés, en quote.
    let liquidity = base_qty.saturating_mul(price).saturating_add(quote_qty);
    let market_cap = price.saturating_mul(supply);

    PoolMetrics { price, liquidity, market_cap }
}

/// Volume échangé entre deux cycles : `|Δquote| + |Δbase| * prix`.
/// Le prix utilisé est celui du snapshot précédent.
pub fn volume_delta(
    previous_base: Decimal,
    previous_quote: Decimal,
    previous_price: Decimal,
    base_qty: Decimal,
    quote_qty: Decimal,
) -> Decimal {
    let delta_quote = (quote_qty - previous_quote).abs();
    let delta_base = (base_qty - previous_base).abs();
    delta_quote.saturating_add(delta_base.saturating_mul(previous_price))
}
