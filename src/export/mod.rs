//! Read-only export of an annotated screen: a PNG snapshot with the markers
//! drawn on it and a markdown listing of the GraphQL documents.

mod markdown;
mod snapshot;

use std::{
    fmt,
    io::Cursor,
    path::{Path, PathBuf},
    str::FromStr,
};

use image::ImageFormat;
use serde::Serialize;
use thiserror::Error;
use tokio::fs as async_fs;
use tracing::info;

use crate::core::db::{
    ApiKind, ApiMarker, ApiRepository, Project, ProjectRepository, Screen, ScreenRepository,
    StoreError,
};
use crate::intake::IntakeError;

pub use markdown::render_markdown;
pub use snapshot::{MUTATION_COLOR, QUERY_COLOR, render_snapshot};

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("screen {0} not found")]
    ScreenNotFound(i64),
    #[error("project {0} not found")]
    ProjectNotFound(i64),
    #[error("screen '{0}' has no apis to export")]
    NoApis(String),
    #[error("screen image could not be decoded: {0}")]
    InvalidImage(#[from] IntakeError),
    #[error(transparent)]
    Image(#[from] image::ImageError),
    #[error("bundled label font is unreadable: {0}")]
    Font(#[from] ab_glyph::InvalidFont),
    #[error("failed to write {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    Image,
    Markdown,
    #[default]
    Both,
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "image" => Ok(ExportFormat::Image),
            "markdown" => Ok(ExportFormat::Markdown),
            "both" => Ok(ExportFormat::Both),
            other => Err(format!("unknown export format '{other}'")),
        }
    }
}

/// A marker together with its `Q<n>`/`M<n>` label.
#[derive(Debug, Clone, Serialize)]
pub struct NumberedApi {
    pub label: String,
    pub api: ApiMarker,
}

/// Labels markers per kind in the order given: queries `Q1, Q2, ..`,
/// mutations `M1, M2, ..`.
pub fn number_apis(apis: &[ApiMarker]) -> Vec<NumberedApi> {
    let mut queries = 0;
    let mut mutations = 0;
    apis.iter()
        .map(|api| {
            let label = match api.kind {
                ApiKind::Query => {
                    queries += 1;
                    format!("Q{queries}")
                }
                ApiKind::Mutation => {
                    mutations += 1;
                    format!("M{mutations}")
                }
            };
            NumberedApi {
                label,
                api: api.clone(),
            }
        })
        .collect()
}

/// Everything an export needs, read in one pass.
#[derive(Debug, Clone)]
pub struct ScreenExport {
    pub project: Project,
    pub screen: Screen,
    pub apis: Vec<NumberedApi>,
}

impl ScreenExport {
    pub async fn load<R>(repo: &R, screen_id: i64) -> Result<Self, ExportError>
    where
        R: ProjectRepository + ScreenRepository + ApiRepository,
    {
        let screen = repo
            .get_screen(screen_id)
            .await?
            .ok_or(ExportError::ScreenNotFound(screen_id))?;
        let project = repo
            .get_project(screen.project_id)
            .await?
            .ok_or(ExportError::ProjectNotFound(screen.project_id))?;
        let apis = repo.get_apis(screen.id).await?;
        Ok(Self {
            project,
            screen,
            apis: number_apis(&apis),
        })
    }

    pub fn image_file_name(&self) -> String {
        format!("{}-screen.png", file_stem(&self.screen.name))
    }

    pub fn markdown_file_name(&self) -> String {
        format!("{}-apis.md", file_stem(&self.screen.name))
    }
}

impl fmt::Display for ScreenExport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} / {}", self.project.name, self.screen.name)
    }
}

/// Screen names are free text; keep them usable as file names.
fn file_stem(name: &str) -> String {
    let stem: String = name
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    if stem.is_empty() {
        "screen".to_string()
    } else {
        stem
    }
}

/// Writes the requested artifacts into `dir`, returning the paths written.
///
/// `Markdown` on a screen without markers fails with [`ExportError::NoApis`]
/// and writes nothing. `Both` still writes the image and skips the listing.
pub async fn write_export(
    export: &ScreenExport,
    dir: &Path,
    format: ExportFormat,
) -> Result<Vec<PathBuf>, ExportError> {
    let io_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source: std::io::Error| ExportError::Io { path, source }
    };

    let markdown = match format {
        ExportFormat::Markdown => Some(render_markdown(export)?),
        ExportFormat::Both if export.apis.is_empty() => {
            info!(export = %export, "no apis on screen, skipping markdown");
            None
        }
        ExportFormat::Both => Some(render_markdown(export)?),
        ExportFormat::Image => None,
    };
    let png = match format {
        ExportFormat::Image | ExportFormat::Both => {
            let mut bytes = Vec::new();
            render_snapshot(export)?.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
            Some(bytes)
        }
        ExportFormat::Markdown => None,
    };

    async_fs::create_dir_all(dir).await.map_err(io_err(dir))?;
    let mut written = Vec::new();
    if let Some(png) = png {
        let path = dir.join(export.image_file_name());
        async_fs::write(&path, png).await.map_err(io_err(&path))?;
        written.push(path);
    }
    if let Some(markdown) = markdown {
        let path = dir.join(export.markdown_file_name());
        async_fs::write(&path, markdown)
            .await
            .map_err(io_err(&path))?;
        written.push(path);
    }
    info!(export = %export, files = written.len(), "exported screen");
    Ok(written)
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::core::db::{ApiKind, ApiMarker, Project, Screen};

    pub(crate) fn project() -> Project {
        Project {
            id: 1,
            name: "Checkout".to_string(),
            description: None,
            created_at: 0,
            _guard: (),
        }
    }

    pub(crate) fn screen(image_url: &str) -> Screen {
        Screen {
            id: 1,
            project_id: 1,
            name: "Cart".to_string(),
            image_url: image_url.to_string(),
            description: None,
            order: 0,
            _guard: (),
        }
    }

    pub(crate) fn marker(id: i64, kind: ApiKind, order: Option<i64>) -> ApiMarker {
        ApiMarker {
            id,
            screen_id: 1,
            name: format!("api{id}"),
            kind,
            code: format!("{kind} Api{id} {{ id }}"),
            description: None,
            position: None,
            order,
            _guard: (),
        }
    }
}
