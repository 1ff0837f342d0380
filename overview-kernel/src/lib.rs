//! Status overview kernel
//!
//! Sert en JSON l'état instantané du contrôleur, des agents et des plugins
//! installés, derrière un cache de snapshots par catégorie : une rafale de
//! sondages du dashboard déclenche au plus une collecte par catégorie.

pub mod cache;
pub mod cluster;
pub mod collector;
pub mod config;
pub mod error;
pub mod http;
pub mod response;
pub mod security;
pub mod service;
pub mod settings;
pub mod state;
pub mod telemetry;

pub use cache::{SnapshotCache, StatusCategory};
pub use error::StatusError;
pub use service::StatusService;
