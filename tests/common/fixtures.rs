use std::path::Path;

use image::{ImageBuffer, Rgb};
use screenmap::core::db::{ApiKind, NewApi, NewProject, NewScreen, Schema, Store, StoreOptions};
use screenmap::intake::image_data_uri;
use sqlx::{Connection, SqliteConnection, sqlite::SqliteConnectOptions};
use tempfile::NamedTempFile;

/// Creates a 100x100 red test image and returns the temp file.
/// The file will be automatically cleaned up when dropped.
pub fn create_test_image() -> NamedTempFile {
    let img = ImageBuffer::from_fn(100, 100, |_, _| Rgb([255u8, 0u8, 0u8]));
    let file = tempfile::Builder::new()
        .suffix(".png")
        .tempfile()
        .expect("Failed to create temp image file");
    img.save_with_format(file.path(), image::ImageFormat::Png)
        .expect("Failed to save test image");
    file
}

/// Creates a Store backed by a file in a temporary directory.
/// Returns both the store and the temp directory (which must be kept alive).
pub async fn create_test_store() -> (Store, tempfile::TempDir) {
    let dir = tempfile::TempDir::new().expect("Failed to create temp directory");
    let store = Store::open(dir.path().join("test.db"))
        .await
        .expect("Failed to create test store");
    (store, dir)
}

pub fn make_project(name: &str) -> NewProject {
    NewProject {
        name: name.to_string(),
        description: None,
    }
}

/// Builds a NewScreen whose image is a freshly encoded red PNG.
pub async fn make_screen(project_id: i64, name: &str) -> NewScreen {
    let img_file = create_test_image();
    let image_url = image_data_uri(img_file.path())
        .await
        .expect("Failed to encode test image");
    NewScreen {
        project_id,
        name: name.to_string(),
        image_url,
        description: None,
    }
}

pub fn make_api(screen_id: i64, name: &str, kind: ApiKind) -> NewApi {
    NewApi {
        screen_id,
        name: name.to_string(),
        kind,
        code: format!("{} {} {{ id }}", kind, name),
        description: None,
        position: None,
        order: None,
    }
}

/// Creates a database file on the version 1 schema, as written by the
/// first release, and returns a raw connection to it for seeding rows.
pub async fn create_legacy_db(path: &Path) -> anyhow::Result<SqliteConnection> {
    let store = Store::open_with(StoreOptions::new(path), &Schema::up_to(1)).await?;
    store.close().await?;
    raw_connection(path).await
}

pub async fn raw_connection(path: &Path) -> anyhow::Result<SqliteConnection> {
    let options = SqliteConnectOptions::new().filename(path);
    Ok(SqliteConnection::connect_with(&options).await?)
}
