pub mod core;
pub mod export;
pub mod intake;

pub use crate::core::db::{
    ApiKind, ApiMarker, ApiRepository, Position, Project, ProjectRepository, Screen,
    ScreenRepository, Store, StoreError, StoreOptions,
};
pub use export::{ExportFormat, ScreenExport};
