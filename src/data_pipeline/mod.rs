// src/data_pipeline/mod.rs

// Étape "Resolving" du pipeline : du mint vers le pool et ses deux vaults.
pub mod vault_resolver;
