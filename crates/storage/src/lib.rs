#![forbid(unsafe_code)]

pub mod repository;
pub mod sqlite;

pub use repository::{
    AttemptHistoryRepository, AttemptRow, InMemoryRepository, QuizCatalogRepository, Storage,
    StorageError,
};
