// src/pipeline/mod.rs

//! Pipeline entry points for scrape runs.
//!
//! A run drives fetch → parse → extract → normalize → persist for one
//! page type, with pagination for aggregator listings and bounded
//! concurrent detail fetches.

pub mod run;

pub use run::{Pipeline, RunReport};
