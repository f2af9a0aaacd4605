//! Reference backend implementations.
//!
//! Each module provides a struct implementing [`crate::backend::SearchBackend`]
//! against one public source: the GEO dataset registry and the PubMed /
//! Europe PMC bibliographic indexes. All three speak JSON over HTTPS; their
//! parse functions are pure and unit-tested on canned payloads.

pub mod europepmc;
pub mod geo;
pub mod pubmed;

pub use europepmc::EuropePmcBackend;
pub use geo::GeoBackend;
pub use pubmed::PubMedBackend;
