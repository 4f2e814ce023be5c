use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::core::db::{
    error::Result,
    model::{Position, Sequenced},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiKind {
    Query,
    Mutation,
}

impl ApiKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApiKind::Query => "query",
            ApiKind::Mutation => "mutation",
        }
    }
}

impl fmt::Display for ApiKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for ApiKind {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value {
            "query" => Ok(ApiKind::Query),
            "mutation" => Ok(ApiKind::Mutation),
            other => Err(format!("unknown api kind '{other}'")),
        }
    }
}

/// A GraphQL call site pinned onto a screen.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiMarker {
    pub id: i64,
    pub screen_id: i64,
    pub name: String,
    pub kind: ApiKind,
    pub code: String,
    pub description: Option<String>,
    pub position: Option<Position>,
    pub order: Option<i64>,
    #[serde(skip)]
    pub(crate) _guard: (),
}

impl ApiMarker {
    pub fn position_or_default(&self) -> Position {
        self.position.unwrap_or_default()
    }
}

impl Sequenced for ApiMarker {
    fn sequence(&self) -> Option<i64> {
        self.order
    }

    fn id(&self) -> i64 {
        self.id
    }
}

#[derive(Debug, Clone)]
pub struct NewApi {
    pub screen_id: i64,
    pub name: String,
    pub kind: ApiKind,
    pub code: String,
    pub description: Option<String>,
    pub position: Option<Position>,
    pub order: Option<i64>,
}

#[derive(Debug, Clone, Default)]
pub struct ApiPatch {
    pub name: Option<String>,
    pub kind: Option<ApiKind>,
    pub code: Option<String>,
    pub description: Option<Option<String>>,
    pub position: Option<Option<Position>>,
    pub order: Option<Option<i64>>,
}

impl ApiPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.kind.is_none()
            && self.code.is_none()
            && self.description.is_none()
            && self.position.is_none()
            && self.order.is_none()
    }
}

#[derive(Debug, Clone)]
pub enum ApiIndex {
    ScreenId(i64),
    Name(String),
    Kind(ApiKind),
    Order(i64),
}

pub trait ApiRepository {
    fn add_api(&self, api: &NewApi) -> impl Future<Output = Result<ApiMarker>>;
    fn get_api(&self, id: i64) -> impl Future<Output = Result<Option<ApiMarker>>>;
    /// Markers of a screen sorted by `order`, unordered ones last.
    fn get_apis(&self, screen_id: i64) -> impl Future<Output = Result<Vec<ApiMarker>>>;
    fn query_apis(&self, index: &ApiIndex) -> impl Future<Output = Result<Vec<ApiMarker>>>;
    fn update_api(&self, id: i64, patch: &ApiPatch) -> impl Future<Output = Result<ApiMarker>>;
    fn move_api(&self, id: i64, position: Position) -> impl Future<Output = Result<ApiMarker>>;
    fn reorder_apis(&self, screen_id: i64, ids: &[i64]) -> impl Future<Output = Result<()>>;
    fn delete_api(&self, id: i64) -> impl Future<Output = Result<bool>>;
}
