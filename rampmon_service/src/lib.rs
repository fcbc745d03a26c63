//! Water depth at the Howard Prairie Lake boat ramp.
//!
//! Downloads daily forebay elevations from the Reclamation Hydromet feed,
//! caches them for a few hours, subtracts a user-chosen ramp elevation and
//! hands the resulting series to a renderer.

pub mod analysis;
pub mod cache;
pub mod config;
pub mod ingest;
pub mod levels;
pub mod logging;
pub mod model;
pub mod render;
pub mod stations;
pub mod verify;
