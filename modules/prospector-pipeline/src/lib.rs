//! Lead discovery pipeline: map-search scraping, extraction, prospect
//! classification, and deduplicated persistence, run by a pool of workers
//! that share one stop signal.

pub mod browse;
pub mod classifier;
pub mod control;
pub mod distributor;
pub mod extractor;
pub mod maps;
pub mod orchestrator;
pub mod quality;
pub mod session;
pub mod worker;

#[cfg(test)]
pub(crate) mod testing;
