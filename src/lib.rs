// src/lib.rs

// On déclare tous nos modules principaux pour les rendre publics et
// utilisables par le binaire (token_tracker.rs).
pub mod config;
pub mod data_pipeline;
pub mod decoders;
pub mod delivery;
pub mod error;
pub mod math;
pub mod monitoring;
pub mod rpc;
pub mod state;
