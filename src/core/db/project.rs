use serde::Serialize;

use crate::core::db::error::Result;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Project {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    /// Milliseconds since the Unix epoch, set once at creation.
    pub created_at: i64,
    #[serde(skip)]
    pub(crate) _guard: (),
}

#[derive(Debug, Clone)]
pub struct NewProject {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ProjectPatch {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
}

impl ProjectPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.description.is_none()
    }
}

/// Fields of `projects` backed by an index.
#[derive(Debug, Clone)]
pub enum ProjectIndex {
    Name(String),
    CreatedAt(i64),
}

pub trait ProjectRepository {
    fn add_project(&self, project: &NewProject) -> impl Future<Output = Result<Project>>;
    fn get_project(&self, id: i64) -> impl Future<Output = Result<Option<Project>>>;
    fn get_projects(&self) -> impl Future<Output = Result<Vec<Project>>>;
    fn query_projects(&self, index: &ProjectIndex) -> impl Future<Output = Result<Vec<Project>>>;
    fn update_project(&self, id: i64, patch: &ProjectPatch) -> impl Future<Output = Result<Project>>;
    /// Removes the project together with its screens and their markers.
    /// Returns `false` when no such project existed.
    fn delete_project(&self, id: i64) -> impl Future<Output = Result<bool>>;
}
