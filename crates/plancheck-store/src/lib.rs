//! Storage layer: tabular readers (CSV, XLSX), the definitions reference, the
//! extracted-data loader, and the JSON-persisted learning store.

mod error;
pub use error::StoreError;

pub mod definitions;
pub mod extracted;
pub mod learning;
pub mod table;

pub use definitions::DefinitionsStore;
pub use extracted::{group_names, load_extracted, load_extracted_file};
pub use learning::{HistoryEntry, LearningAction, LearningState, LearningStore};
pub use table::Table;
