#![forbid(unsafe_code)]

pub mod repository;

pub use repository::{
    AttemptRepository, DailyProgressRepository, InMemoryStore, ItemRepository,
    MarkerRepository, ProfileRepository, ScheduleRepository, SessionRepository,
    StorageError, Store,
};
