/// Application state module
///
/// This module holds the data that flows between the catalog on disk and
/// the UI layer:
/// - Shared data structures and identifier parsing (data.rs)
/// - Catalog folder scanning (catalog.rs)

pub mod catalog;
pub mod data;
