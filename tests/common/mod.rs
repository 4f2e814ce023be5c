#![allow(dead_code)]

mod fixtures;
pub use fixtures::*;

// Re-export commonly used types from screenmap for tests
pub use screenmap::core::db::{
    ApiIndex, ApiKind, ApiMarker, ApiPatch, ApiRepository, NewApi, NewProject, NewScreen,
    Position, Project, ProjectIndex, ProjectPatch, ProjectRepository, Schema, Screen, ScreenIndex,
    ScreenPatch, ScreenRepository, Store, StoreError, StoreOptions,
};
