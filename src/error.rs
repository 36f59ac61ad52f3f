// src/error.rs

use solana_sdk::pubkey::Pubkey;
use thiserror::Error;

/// Les erreurs du cœur (résolution, lectures, calcul).
/// Le binaire et la configuration restent sur `anyhow`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TrackerError {
    /// Aucun pool (ou des vaults illisibles) pour ce mint. Terminal pour le cycle.
    #[error("No vaults found for mint {0}")]
    NotFound(Pubkey),

    /// Appel RPC en échec ou en timeout. Seule erreur qui mérite un ré-essai.
    #[error("RPC transport failure during {operation}: {message}")]
    Transport { operation: &'static str, message: String },

    /// Forme de données inattendue. Ré-essayer ne changera rien.
    #[error("Malformed account data: {0}")]
    MalformedData(String),

    #[error("Account {0} not found")]
    AccountNotFound(Pubkey),

    /// Les trois lectures du cycle ont échoué : on ne publie pas un snapshot tout à zéro.
    #[error("All reads failed for mint {0}")]
    AllReadsFailed(Pubkey),
}

impl TrackerError {
    pub fn transport(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Transport { operation, message: message.into() }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }
}

pub type TrackerResult<T> = std::result::Result<T, TrackerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message_names_the_mint() {
        let mint = Pubkey::new_unique();
        let err = TrackerError::NotFound(mint);
        assert_eq!(err.to_string(), format!("No vaults found for mint {}", mint));
    }

    #[test]
    fn test_only_transport_is_retryable() {
        assert!(TrackerError::transport("getTokenSupply", "timeout").is_retryable());
        assert!(!TrackerError::MalformedData("bad".into()).is_retryable());
        assert!(!TrackerError::NotFound(Pubkey::new_unique()).is_retryable());
        assert!(!TrackerError::AccountNotFound(Pubkey::new_unique()).is_retryable());
    }
}
