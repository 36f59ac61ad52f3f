// DANS: src/math/decimals.rs

use rust_decimal::Decimal;

/// Échelle maximale supportée nativement par `Decimal`.
const MAX_DECIMAL_SCALE: u8 = 28;

/// Un montant tel que lu on-chain : l'entier brut et SON exposant décimal.
/// Chaque compte porte ses propres décimales, on ne les mélange jamais.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RawAmount {
    pub amount: u64,
    pub decimals: u8,
}

impl RawAmount {
    pub const ZERO: RawAmount = RawAmount { amount: 0, decimals: 0 };

    pub fn new(amount: u64, decimals: u8) -> Self {
        Self { amount, decimals }
    }

    /// Remplace l'exposant lu on-chain par une valeur imposée par la configuration.
    pub fn with_decimals_override(self, decimals: Option<u8>) -> Self {
        match decimals {
            Some(decimals) => Self { decimals, ..self },
            None => self,
        }
    }

    pub fn normalized(&self) -> Decimal {
        normalize(self.amount, self.decimals)
    }
}

/// Convertit un montant brut en quantité réelle : `amount / 10^decimals`.
///
/// Exact pour tout `u64` jusqu'à 28 décimales. Au-delà, on divise par dix
/// pas à pas et le résultat peut s'arrondir vers zéro.
pub fn normalize(amount: u64, decimals: u8) -> Decimal {
    let scale = decimals.min(MAX_DECIMAL_SCALE);
    let mut value = Decimal::from_i128_with_scale(i128::from(amount), u32::from(scale));

    for _ in scale..decimals {
        if value.is_zero() {
            break;
        }
        value /= Decimal::TEN;
    }
    value
}
