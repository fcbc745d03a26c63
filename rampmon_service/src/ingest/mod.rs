/// Data ingestion from external providers.
///
/// Submodules:
/// - `hydromet`: Reclamation Hydromet daily CSV: URL building, HTTP source,
///   CSV parsing and writing.

pub mod hydromet;
