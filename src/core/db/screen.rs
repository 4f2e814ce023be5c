use serde::Serialize;

use crate::core::db::{error::Result, model::Sequenced};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Screen {
    pub id: i64,
    pub project_id: i64,
    pub name: String,
    /// Inline `data:` URI of the screenshot.
    pub image_url: String,
    pub description: Option<String>,
    pub order: i64,
    #[serde(skip)]
    pub(crate) _guard: (),
}

impl Sequenced for Screen {
    fn sequence(&self) -> Option<i64> {
        Some(self.order)
    }

    fn id(&self) -> i64 {
        self.id
    }
}

#[derive(Debug, Clone)]
pub struct NewScreen {
    pub project_id: i64,
    pub name: String,
    pub image_url: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ScreenPatch {
    pub name: Option<String>,
    pub image_url: Option<String>,
    pub description: Option<Option<String>>,
    pub order: Option<i64>,
}

impl ScreenPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.image_url.is_none()
            && self.description.is_none()
            && self.order.is_none()
    }
}

#[derive(Debug, Clone)]
pub enum ScreenIndex {
    ProjectId(i64),
    Name(String),
    Order(i64),
}

pub trait ScreenRepository {
    /// Inserts the screen after its current siblings: `order` becomes the
    /// number of screens the project already has.
    fn add_screen(&self, screen: &NewScreen) -> impl Future<Output = Result<Screen>>;
    fn get_screen(&self, id: i64) -> impl Future<Output = Result<Option<Screen>>>;
    /// Screens of a project in display order.
    fn get_screens(&self, project_id: i64) -> impl Future<Output = Result<Vec<Screen>>>;
    fn query_screens(&self, index: &ScreenIndex) -> impl Future<Output = Result<Vec<Screen>>>;
    fn update_screen(&self, id: i64, patch: &ScreenPatch) -> impl Future<Output = Result<Screen>>;
    fn reorder_screens(&self, project_id: i64, ids: &[i64]) -> impl Future<Output = Result<()>>;
    /// Deletes the screen and every marker placed on it in one transaction.
    fn delete_screen(&self, id: i64) -> impl Future<Output = Result<bool>>;
}
