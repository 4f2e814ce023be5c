mod api;
mod error;
mod model;
mod project;
mod schema;
mod screen;
mod state;

use std::{path::PathBuf, sync::Arc};

use sqlx::{Connection, QueryBuilder, Sqlite, SqliteConnection};
use state::StoreState;
use tracing::debug;

pub use api::{ApiIndex, ApiKind, ApiMarker, ApiPatch, ApiRepository, NewApi};
pub use error::{Result, StoreError};
pub use model::{Color, Position, Sequenced, compare_sequence, sort_by_sequence};
pub use project::{NewProject, Project, ProjectIndex, ProjectPatch, ProjectRepository};
pub use schema::{Migration, Schema, Step};
pub use screen::{NewScreen, Screen, ScreenIndex, ScreenPatch, ScreenRepository};
pub use state::StoreOptions;

const PROJECT_COLUMNS: &str = "id, name, description, created_at";
const SCREEN_COLUMNS: &str = "id, project_id, name, image_url, description, sort_order";
const API_COLUMNS: &str =
    "id, screen_id, name, kind, code, description, position_x, position_y, sort_order";

/// Handle to the local database. Cheap to clone; all clones share one pool.
#[derive(Debug, Clone)]
pub struct Store {
    state: Arc<StoreState>,
}

impl Store {
    /// Opens (or creates) the database at `path` on the latest schema.
    pub async fn open<P: Into<PathBuf>>(path: P) -> Result<Self> {
        Self::open_with(StoreOptions::new(path), &Schema::LATEST).await
    }

    /// Opens the database against an explicit schema. Pending migrations run
    /// before this returns; a database written by a newer schema is refused.
    ///
    /// The repository operations expect [`Schema::LATEST`]; older schemas are
    /// only useful for preparing legacy files.
    pub async fn open_with(options: StoreOptions, schema: &Schema) -> Result<Self> {
        Ok(Self {
            state: Arc::new(StoreState::open(options, schema).await?),
        })
    }

    pub fn schema_version(&self) -> u32 {
        self.state.schema_version()
    }

    /// Flushes and closes the underlying pool. Required before the file is
    /// copied or reopened elsewhere within the same process.
    pub async fn close(&self) -> Result<()> {
        self.state.close().await
    }
}

#[derive(sqlx::FromRow)]
struct ProjectRow {
    id: i64,
    name: String,
    description: Option<String>,
    created_at: Option<i64>,
}

impl TryFrom<ProjectRow> for Project {
    type Error = StoreError;

    fn try_from(row: ProjectRow) -> Result<Self> {
        let created_at = row.created_at.ok_or_else(|| StoreError::InvalidRecord {
            collection: "projects",
            id: row.id,
            reason: "missing created_at".to_string(),
        })?;
        Ok(Project {
            id: row.id,
            name: row.name,
            description: row.description,
            created_at,
            _guard: (),
        })
    }
}

#[derive(sqlx::FromRow)]
struct ScreenRow {
    id: i64,
    project_id: i64,
    name: String,
    image_url: String,
    description: Option<String>,
    sort_order: Option<i64>,
}

impl TryFrom<ScreenRow> for Screen {
    type Error = StoreError;

    fn try_from(row: ScreenRow) -> Result<Self> {
        let order = row.sort_order.ok_or_else(|| StoreError::InvalidRecord {
            collection: "screens",
            id: row.id,
            reason: "missing order".to_string(),
        })?;
        Ok(Screen {
            id: row.id,
            project_id: row.project_id,
            name: row.name,
            image_url: row.image_url,
            description: row.description,
            order,
            _guard: (),
        })
    }
}

#[derive(sqlx::FromRow)]
struct ApiRow {
    id: i64,
    screen_id: i64,
    name: String,
    kind: String,
    code: String,
    description: Option<String>,
    position_x: Option<f64>,
    position_y: Option<f64>,
    sort_order: Option<i64>,
}

impl TryFrom<ApiRow> for ApiMarker {
    type Error = StoreError;

    fn try_from(row: ApiRow) -> Result<Self> {
        let kind = row
            .kind
            .parse::<ApiKind>()
            .map_err(|reason| StoreError::InvalidRecord {
                collection: "apis",
                id: row.id,
                reason,
            })?;
        Ok(ApiMarker {
            id: row.id,
            screen_id: row.screen_id,
            name: row.name,
            kind,
            code: row.code,
            description: row.description,
            position: Position::from_columns(row.position_x, row.position_y),
            order: row.sort_order,
            _guard: (),
        })
    }
}

fn collect<R, T>(rows: Vec<R>) -> Result<Vec<T>>
where
    T: TryFrom<R, Error = StoreError>,
{
    rows.into_iter().map(T::try_from).collect()
}

async fn fetch_project(conn: &mut SqliteConnection, id: i64) -> Result<Option<Project>> {
    let row: Option<ProjectRow> =
        sqlx::query_as(&format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE id = $1"))
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;
    row.map(Project::try_from).transpose()
}

async fn fetch_screen(conn: &mut SqliteConnection, id: i64) -> Result<Option<Screen>> {
    let row: Option<ScreenRow> =
        sqlx::query_as(&format!("SELECT {SCREEN_COLUMNS} FROM screens WHERE id = $1"))
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;
    row.map(Screen::try_from).transpose()
}

async fn fetch_api(conn: &mut SqliteConnection, id: i64) -> Result<Option<ApiMarker>> {
    let row: Option<ApiRow> =
        sqlx::query_as(&format!("SELECT {API_COLUMNS} FROM apis WHERE id = $1"))
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;
    row.map(ApiMarker::try_from).transpose()
}

impl ProjectRepository for Store {
    async fn add_project(&self, project: &NewProject) -> Result<Project> {
        let mut conn = self.state.conn().await?;
        let row: ProjectRow = sqlx::query_as(&format!(
            "INSERT INTO projects (name, description, created_at) VALUES ($1, $2, $3)
            RETURNING {PROJECT_COLUMNS}"
        ))
        .bind(project.name.as_str())
        .bind(project.description.as_deref())
        .bind(schema::now_millis())
        .fetch_one(&mut **conn)
        .await?;
        let project = Project::try_from(row)?;
        debug!(id = project.id, "created project");
        Ok(project)
    }

    async fn get_project(&self, id: i64) -> Result<Option<Project>> {
        let mut conn = self.state.conn().await?;
        fetch_project(&mut conn, id).await
    }

    async fn get_projects(&self) -> Result<Vec<Project>> {
        let mut conn = self.state.conn().await?;
        let rows: Vec<ProjectRow> =
            sqlx::query_as(&format!("SELECT {PROJECT_COLUMNS} FROM projects ORDER BY id ASC"))
                .fetch_all(&mut **conn)
                .await?;
        collect(rows)
    }

    async fn query_projects(&self, index: &ProjectIndex) -> Result<Vec<Project>> {
        let mut conn = self.state.conn().await?;
        let mut query =
            QueryBuilder::<Sqlite>::new(format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE "));
        match index {
            ProjectIndex::Name(name) => query.push("name = ").push_bind(name.clone()),
            ProjectIndex::CreatedAt(created_at) => {
                query.push("created_at = ").push_bind(*created_at)
            }
        };
        query.push(" ORDER BY id ASC");
        let rows: Vec<ProjectRow> = query.build_query_as().fetch_all(&mut **conn).await?;
        collect(rows)
    }

    async fn update_project(&self, id: i64, patch: &ProjectPatch) -> Result<Project> {
        let mut conn = self.state.conn().await?;
        let mut tx = conn.begin().await?;
        if !patch.is_empty() {
            let mut query = QueryBuilder::<Sqlite>::new("UPDATE projects SET ");
            {
                let mut fields = query.separated(", ");
                if let Some(name) = &patch.name {
                    fields.push("name = ").push_bind_unseparated(name.clone());
                }
                if let Some(description) = &patch.description {
                    fields
                        .push("description = ")
                        .push_bind_unseparated(description.clone());
                }
            }
            query.push(" WHERE id = ").push_bind(id);
            query.build().execute(&mut *tx).await?;
        }
        let project = fetch_project(&mut tx, id)
            .await?
            .ok_or(StoreError::NotFound {
                collection: "projects",
                id,
            })?;
        tx.commit().await?;
        debug!(id, "updated project");
        Ok(project)
    }

    async fn delete_project(&self, id: i64) -> Result<bool> {
        let mut conn = self.state.conn().await?;
        let mut tx = conn.begin().await?;
        let apis = sqlx::query(
            "DELETE FROM apis WHERE screen_id IN (SELECT id FROM screens WHERE project_id = $1)",
        )
        .bind(id)
        .execute(&mut *tx)
        .await?
        .rows_affected();
        let screens = sqlx::query("DELETE FROM screens WHERE project_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        let removed = sqlx::query("DELETE FROM projects WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected()
            > 0;
        tx.commit().await?;
        debug!(id, removed, screens, apis, "deleted project");
        Ok(removed)
    }
}

impl ScreenRepository for Store {
    async fn add_screen(&self, screen: &NewScreen) -> Result<Screen> {
        let mut conn = self.state.conn().await?;
        let row: ScreenRow = sqlx::query_as(&format!(
            "INSERT INTO screens (project_id, name, image_url, description, sort_order)
            VALUES ($1, $2, $3, $4, (SELECT COUNT(*) FROM screens WHERE project_id = $1))
            RETURNING {SCREEN_COLUMNS}"
        ))
        .bind(screen.project_id)
        .bind(screen.name.as_str())
        .bind(screen.image_url.as_str())
        .bind(screen.description.as_deref())
        .fetch_one(&mut **conn)
        .await?;
        let screen = Screen::try_from(row)?;
        debug!(id = screen.id, project_id = screen.project_id, order = screen.order, "created screen");
        Ok(screen)
    }

    async fn get_screen(&self, id: i64) -> Result<Option<Screen>> {
        let mut conn = self.state.conn().await?;
        fetch_screen(&mut conn, id).await
    }

    async fn get_screens(&self, project_id: i64) -> Result<Vec<Screen>> {
        let mut screens = self.query_screens(&ScreenIndex::ProjectId(project_id)).await?;
        sort_by_sequence(&mut screens);
        Ok(screens)
    }

    async fn query_screens(&self, index: &ScreenIndex) -> Result<Vec<Screen>> {
        let mut conn = self.state.conn().await?;
        let mut query =
            QueryBuilder::<Sqlite>::new(format!("SELECT {SCREEN_COLUMNS} FROM screens WHERE "));
        match index {
            ScreenIndex::ProjectId(project_id) => {
                query.push("project_id = ").push_bind(*project_id)
            }
            ScreenIndex::Name(name) => query.push("name = ").push_bind(name.clone()),
            ScreenIndex::Order(order) => query.push("sort_order = ").push_bind(*order),
        };
        query.push(" ORDER BY id ASC");
        let rows: Vec<ScreenRow> = query.build_query_as().fetch_all(&mut **conn).await?;
        collect(rows)
    }

    async fn update_screen(&self, id: i64, patch: &ScreenPatch) -> Result<Screen> {
        let mut conn = self.state.conn().await?;
        let mut tx = conn.begin().await?;
        if !patch.is_empty() {
            let mut query = QueryBuilder::<Sqlite>::new("UPDATE screens SET ");
            {
                let mut fields = query.separated(", ");
                if let Some(name) = &patch.name {
                    fields.push("name = ").push_bind_unseparated(name.clone());
                }
                if let Some(image_url) = &patch.image_url {
                    fields
                        .push("image_url = ")
                        .push_bind_unseparated(image_url.clone());
                }
                if let Some(description) = &patch.description {
                    fields
                        .push("description = ")
                        .push_bind_unseparated(description.clone());
                }
                if let Some(order) = patch.order {
                    fields.push("sort_order = ").push_bind_unseparated(order);
                }
            }
            query.push(" WHERE id = ").push_bind(id);
            query.build().execute(&mut *tx).await?;
        }
        let screen = fetch_screen(&mut tx, id)
            .await?
            .ok_or(StoreError::NotFound {
                collection: "screens",
                id,
            })?;
        tx.commit().await?;
        debug!(id, "updated screen");
        Ok(screen)
    }

    async fn reorder_screens(&self, project_id: i64, ids: &[i64]) -> Result<()> {
        let mut conn = self.state.conn().await?;
        let mut tx = conn.begin().await?;
        for (position, id) in ids.iter().enumerate() {
            sqlx::query("UPDATE screens SET sort_order = $1 WHERE id = $2 AND project_id = $3")
                .bind(position as i64)
                .bind(*id)
                .bind(project_id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        debug!(project_id, count = ids.len(), "reordered screens");
        Ok(())
    }

    async fn delete_screen(&self, id: i64) -> Result<bool> {
        let mut conn = self.state.conn().await?;
        let mut tx = conn.begin().await?;
        let apis = sqlx::query("DELETE FROM apis WHERE screen_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        let removed = sqlx::query("DELETE FROM screens WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected()
            > 0;
        tx.commit().await?;
        debug!(id, removed, apis, "deleted screen");
        Ok(removed)
    }
}

impl ApiRepository for Store {
    async fn add_api(&self, api: &NewApi) -> Result<ApiMarker> {
        let mut conn = self.state.conn().await?;
        let (x, y) = Position::into_columns(api.position);
        let row: ApiRow = sqlx::query_as(&format!(
            "INSERT INTO apis
                (screen_id, name, kind, code, description, position_x, position_y, sort_order)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {API_COLUMNS}"
        ))
        .bind(api.screen_id)
        .bind(api.name.as_str())
        .bind(api.kind.as_str())
        .bind(api.code.as_str())
        .bind(api.description.as_deref())
        .bind(x)
        .bind(y)
        .bind(api.order)
        .fetch_one(&mut **conn)
        .await?;
        let api = ApiMarker::try_from(row)?;
        debug!(id = api.id, screen_id = api.screen_id, kind = %api.kind, "created api");
        Ok(api)
    }

    async fn get_api(&self, id: i64) -> Result<Option<ApiMarker>> {
        let mut conn = self.state.conn().await?;
        fetch_api(&mut conn, id).await
    }

    async fn get_apis(&self, screen_id: i64) -> Result<Vec<ApiMarker>> {
        let mut apis = self.query_apis(&ApiIndex::ScreenId(screen_id)).await?;
        sort_by_sequence(&mut apis);
        Ok(apis)
    }

    async fn query_apis(&self, index: &ApiIndex) -> Result<Vec<ApiMarker>> {
        let mut conn = self.state.conn().await?;
        let mut query =
            QueryBuilder::<Sqlite>::new(format!("SELECT {API_COLUMNS} FROM apis WHERE "));
        match index {
            ApiIndex::ScreenId(screen_id) => query.push("screen_id = ").push_bind(*screen_id),
            ApiIndex::Name(name) => query.push("name = ").push_bind(name.clone()),
            ApiIndex::Kind(kind) => query.push("kind = ").push_bind(kind.as_str()),
            ApiIndex::Order(order) => query.push("sort_order = ").push_bind(*order),
        };
        query.push(" ORDER BY id ASC");
        let rows: Vec<ApiRow> = query.build_query_as().fetch_all(&mut **conn).await?;
        collect(rows)
    }

    async fn update_api(&self, id: i64, patch: &ApiPatch) -> Result<ApiMarker> {
        let mut conn = self.state.conn().await?;
        let mut tx = conn.begin().await?;
        if !patch.is_empty() {
            let mut query = QueryBuilder::<Sqlite>::new("UPDATE apis SET ");
            {
                let mut fields = query.separated(", ");
                if let Some(name) = &patch.name {
                    fields.push("name = ").push_bind_unseparated(name.clone());
                }
                if let Some(kind) = patch.kind {
                    fields.push("kind = ").push_bind_unseparated(kind.as_str());
                }
                if let Some(code) = &patch.code {
                    fields.push("code = ").push_bind_unseparated(code.clone());
                }
                if let Some(description) = &patch.description {
                    fields
                        .push("description = ")
                        .push_bind_unseparated(description.clone());
                }
                if let Some(position) = patch.position {
                    let (x, y) = Position::into_columns(position);
                    fields.push("position_x = ").push_bind_unseparated(x);
                    fields.push("position_y = ").push_bind_unseparated(y);
                }
                if let Some(order) = patch.order {
                    fields.push("sort_order = ").push_bind_unseparated(order);
                }
            }
            query.push(" WHERE id = ").push_bind(id);
            query.build().execute(&mut *tx).await?;
        }
        let api = fetch_api(&mut tx, id).await?.ok_or(StoreError::NotFound {
            collection: "apis",
            id,
        })?;
        tx.commit().await?;
        debug!(id, "updated api");
        Ok(api)
    }

    async fn move_api(&self, id: i64, position: Position) -> Result<ApiMarker> {
        let patch = ApiPatch {
            position: Some(Some(position)),
            ..Default::default()
        };
        self.update_api(id, &patch).await
    }

    async fn reorder_apis(&self, screen_id: i64, ids: &[i64]) -> Result<()> {
        let mut conn = self.state.conn().await?;
        let mut tx = conn.begin().await?;
        for (position, id) in ids.iter().enumerate() {
            sqlx::query("UPDATE apis SET sort_order = $1 WHERE id = $2 AND screen_id = $3")
                .bind(position as i64)
                .bind(*id)
                .bind(screen_id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        debug!(screen_id, count = ids.len(), "reordered apis");
        Ok(())
    }

    async fn delete_api(&self, id: i64) -> Result<bool> {
        let mut conn = self.state.conn().await?;
        let removed = sqlx::query("DELETE FROM apis WHERE id = $1")
            .bind(id)
            .execute(&mut **conn)
            .await?
            .rows_affected()
            > 0;
        debug!(id, removed, "deleted api");
        Ok(removed)
    }
}
