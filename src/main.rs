use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use tracing::{Level, warn};
use tracing_subscriber::EnvFilter;

use screenmap::core::db::{
    ApiKind, ApiRepository, NewApi, NewProject, NewScreen, Position, ProjectPatch,
    ProjectRepository, ScreenPatch, ScreenRepository, Store, StoreError,
};
use screenmap::export::{ExportFormat, ScreenExport, number_apis, write_export};
use screenmap::intake::{decode_data_uri_bytes, image_data_uri};

#[derive(Parser)]
#[command(name = "screenmap")]
#[command(about = "Annotate application screenshots with the GraphQL calls they make")]
struct Cli {
    /// Path to the database file
    #[arg(long, env = "SCREENMAP_DB", default_value = "screenmap.db", global = true)]
    db: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print records as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Manage projects
    #[command(subcommand)]
    Project(ProjectCommand),
    /// Manage screens of a project
    #[command(subcommand)]
    Screen(ScreenCommand),
    /// Manage api markers on a screen
    #[command(subcommand)]
    Api(ApiCommand),
    /// Export a screen as an annotated image and/or markdown
    Export {
        screen: i64,
        /// Output directory
        #[arg(long = "out", default_value = ".")]
        dir: PathBuf,
        /// image, markdown or both
        #[arg(long, default_value = "both")]
        format: ExportFormat,
    },
}

#[derive(Subcommand)]
enum ProjectCommand {
    Add {
        name: String,
        #[arg(long)]
        description: Option<String>,
    },
    List,
    Show {
        id: i64,
    },
    Rename {
        id: i64,
        name: String,
    },
    /// Delete a project with all its screens and markers
    Delete {
        id: i64,
    },
}

#[derive(Subcommand)]
enum ScreenCommand {
    Add {
        project: i64,
        name: String,
        /// Screenshot file
        image: PathBuf,
        #[arg(long)]
        description: Option<String>,
    },
    List {
        project: i64,
    },
    Show {
        id: i64,
    },
    Rename {
        id: i64,
        name: String,
    },
    ReplaceImage {
        id: i64,
        image: PathBuf,
    },
    /// Delete a screen and its markers
    Delete {
        id: i64,
    },
    /// Set the display order of a project's screens
    Reorder {
        project: i64,
        #[arg(required = true)]
        ids: Vec<i64>,
    },
}

#[derive(Subcommand)]
enum ApiCommand {
    Add {
        screen: i64,
        name: String,
        /// query or mutation
        #[arg(long, default_value = "query")]
        kind: ApiKind,
        #[command(flatten)]
        code: CodeSource,
        #[arg(long)]
        description: Option<String>,
        /// Horizontal position in percent of the image width
        #[arg(long, requires = "y")]
        x: Option<f64>,
        /// Vertical position in percent of the image height
        #[arg(long, requires = "x")]
        y: Option<f64>,
    },
    List {
        screen: i64,
    },
    Show {
        id: i64,
    },
    /// Reposition a marker (percent of the image box)
    Move {
        id: i64,
        x: f64,
        y: f64,
    },
    Delete {
        id: i64,
    },
    /// Set the list order of a screen's markers
    Reorder {
        screen: i64,
        #[arg(required = true)]
        ids: Vec<i64>,
    },
}

#[derive(Args)]
#[group(required = true, multiple = false)]
struct CodeSource {
    /// GraphQL document
    #[arg(long)]
    code: Option<String>,
    /// File containing the GraphQL document
    #[arg(long)]
    code_file: Option<PathBuf>,
}

impl CodeSource {
    async fn read(self) -> anyhow::Result<String> {
        match (self.code, self.code_file) {
            (Some(code), _) => Ok(code),
            (None, Some(path)) => tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("Failed to read GraphQL document {:?}", path)),
            (None, None) => bail!("either --code or --code-file is required"),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();
    setup_logging(&args.log_level, args.verbose);

    let store = Store::open(&args.db)
        .await
        .with_context(|| format!("Failed to open database {:?}", args.db))?;
    let out = Output { json: args.json };

    let result = match args.command {
        Command::Project(command) => run_project(&store, &out, command).await,
        Command::Screen(command) => run_screen(&store, &out, command).await,
        Command::Api(command) => run_api(&store, &out, command).await,
        Command::Export { screen, dir, format } => run_export(&store, screen, &dir, format).await,
    };

    store.close().await?;
    result
}

fn setup_logging(log_level: &Option<String>, verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let log_level = match log_level
        .as_deref()
        .unwrap_or(default)
        .to_lowercase()
        .as_str()
    {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(format!("sqlx=warn,{}", log_level)))
        .without_time()
        .init();
}

struct Output {
    json: bool,
}

impl Output {
    fn records<T: Serialize>(&self, records: &[T], line: impl Fn(&T) -> String) -> anyhow::Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(records)?);
        } else if records.is_empty() {
            println!("(none)");
        } else {
            for record in records {
                println!("{}", line(record));
            }
        }
        Ok(())
    }

    fn record<T: Serialize>(&self, record: &T, lines: impl Fn(&T) -> Vec<String>) -> anyhow::Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(record)?);
        } else {
            for line in lines(record) {
                println!("{}", line);
            }
        }
        Ok(())
    }
}

/// The view layer owns input validation; the store accepts any string.
fn required(field: &str, value: String) -> anyhow::Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        bail!("{} must not be empty", field);
    }
    Ok(trimmed.to_string())
}

fn optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn format_millis(millis: i64) -> String {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(millis) * 1_000_000)
        .ok()
        .and_then(|dt| dt.format(&Rfc3339).ok())
        .unwrap_or_else(|| millis.to_string())
}

/// Update and get misses are reported, not fatal.
fn missing<T>(result: Result<T, StoreError>) -> anyhow::Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(StoreError::NotFound { collection, id }) => {
            warn!(collection, id, "record not found");
            Ok(None)
        }
        Err(err) => Err(err.into()),
    }
}

async fn run_export(
    store: &Store,
    screen: i64,
    dir: &Path,
    format: ExportFormat,
) -> anyhow::Result<()> {
    let export = ScreenExport::load(store, screen).await?;
    for path in write_export(&export, dir, format).await? {
        println!("Wrote {}", path.display());
    }
    Ok(())
}

async fn run_project(store: &Store, out: &Output, command: ProjectCommand) -> anyhow::Result<()> {
    match command {
        ProjectCommand::Add { name, description } => {
            let project = store
                .add_project(&NewProject {
                    name: required("name", name)?,
                    description: optional(description),
                })
                .await?;
            println!("Created project {} ({})", project.id, project.name);
        }
        ProjectCommand::List => {
            let projects = store.get_projects().await?;
            out.records(&projects, |p| {
                format!("{:>4}  {}  {}", p.id, format_millis(p.created_at), p.name)
            })?;
        }
        ProjectCommand::Show { id } => match store.get_project(id).await? {
            Some(project) => {
                let screens = store.get_screens(id).await?;
                out.record(&project, |p| {
                    vec![
                        format!("Project {}: {}", p.id, p.name),
                        format!("Created: {}", format_millis(p.created_at)),
                        format!("Description: {}", p.description.as_deref().unwrap_or("-")),
                        format!("Screens: {}", screens.len()),
                    ]
                })?;
            }
            None => println!("No project {}", id),
        },
        ProjectCommand::Rename { id, name } => {
            let patch = ProjectPatch {
                name: Some(required("name", name)?),
                ..Default::default()
            };
            if let Some(project) = missing(store.update_project(id, &patch).await)? {
                println!("Renamed project {} to {}", project.id, project.name);
            }
        }
        ProjectCommand::Delete { id } => {
            if store.delete_project(id).await? {
                println!("Deleted project {}", id);
            } else {
                println!("No project {}", id);
            }
        }
    }
    Ok(())
}

async fn run_screen(store: &Store, out: &Output, command: ScreenCommand) -> anyhow::Result<()> {
    match command {
        ScreenCommand::Add {
            project,
            name,
            image,
            description,
        } => {
            let name = required("name", name)?;
            if store.get_project(project).await?.is_none() {
                bail!("No project {}", project);
            }
            let image_url = image_data_uri(&image)
                .await
                .with_context(|| format!("Failed to load screenshot {:?}", image))?;
            let screen = store
                .add_screen(&NewScreen {
                    project_id: project,
                    name,
                    image_url,
                    description: optional(description),
                })
                .await?;
            println!(
                "Created screen {} ({}) at position {}",
                screen.id, screen.name, screen.order
            );
        }
        ScreenCommand::List { project } => {
            let screens = store.get_screens(project).await?;
            out.records(&screens, |s| format!("{:>4}  #{:<3} {}", s.id, s.order, s.name))?;
        }
        ScreenCommand::Show { id } => match store.get_screen(id).await? {
            Some(screen) => {
                let apis = store.get_apis(id).await?;
                let image = decode_data_uri_bytes(&screen.image_url)
                    .map(|(mime, bytes)| format!("{}, {} bytes", mime, bytes.len()))
                    .unwrap_or_else(|_| "unreadable".to_string());
                out.record(&screen, |s| {
                    vec![
                        format!("Screen {}: {}", s.id, s.name),
                        format!("Project: {}", s.project_id),
                        format!("Order: {}", s.order),
                        format!("Description: {}", s.description.as_deref().unwrap_or("-")),
                        format!("Image: {}", image),
                        format!("Apis: {}", apis.len()),
                    ]
                })?;
            }
            None => println!("No screen {}", id),
        },
        ScreenCommand::Rename { id, name } => {
            let patch = ScreenPatch {
                name: Some(required("name", name)?),
                ..Default::default()
            };
            if let Some(screen) = missing(store.update_screen(id, &patch).await)? {
                println!("Renamed screen {} to {}", screen.id, screen.name);
            }
        }
        ScreenCommand::ReplaceImage { id, image } => {
            let image_url = image_data_uri(&image)
                .await
                .with_context(|| format!("Failed to load screenshot {:?}", image))?;
            let patch = ScreenPatch {
                image_url: Some(image_url),
                ..Default::default()
            };
            if let Some(screen) = missing(store.update_screen(id, &patch).await)? {
                println!("Replaced image of screen {}", screen.id);
            }
        }
        ScreenCommand::Delete { id } => {
            if store.delete_screen(id).await? {
                println!("Deleted screen {}", id);
            } else {
                println!("No screen {}", id);
            }
        }
        ScreenCommand::Reorder { project, ids } => {
            store.reorder_screens(project, &ids).await?;
            println!("Reordered {} screens", ids.len());
        }
    }
    Ok(())
}

async fn run_api(store: &Store, out: &Output, command: ApiCommand) -> anyhow::Result<()> {
    match command {
        ApiCommand::Add {
            screen,
            name,
            kind,
            code,
            description,
            x,
            y,
        } => {
            let name = required("name", name)?;
            let code = required("code", code.read().await?)?;
            if store.get_screen(screen).await?.is_none() {
                bail!("No screen {}", screen);
            }
            let position = match (x, y) {
                (Some(x), Some(y)) => Some(Position::new(x, y)),
                _ => None,
            };
            let api = store
                .add_api(&NewApi {
                    screen_id: screen,
                    name,
                    kind,
                    code,
                    description: optional(description),
                    position,
                    order: None,
                })
                .await?;
            println!("Created {} {} ({})", api.kind, api.id, api.name);
        }
        ApiCommand::List { screen } => {
            let numbered = number_apis(&store.get_apis(screen).await?);
            out.records(&numbered, |n| {
                let position = n.api.position_or_default();
                format!(
                    "{:>4}  {:<4} {:<8} ({:.1}%, {:.1}%)  {}",
                    n.api.id, n.label, n.api.kind, position.x(), position.y(), n.api.name
                )
            })?;
        }
        ApiCommand::Show { id } => match store.get_api(id).await? {
            Some(api) => {
                out.record(&api, |a| {
                    let position = a.position_or_default();
                    vec![
                        format!("Api {}: {} ({})", a.id, a.name, a.kind),
                        format!("Screen: {}", a.screen_id),
                        format!("Position: {:.1}%, {:.1}%", position.x(), position.y()),
                        format!("Description: {}", a.description.as_deref().unwrap_or("-")),
                        String::new(),
                        a.code.clone(),
                    ]
                })?;
            }
            None => println!("No api {}", id),
        },
        ApiCommand::Move { id, x, y } => {
            if let Some(api) = missing(store.move_api(id, Position::new(x, y)).await)? {
                let position = api.position_or_default();
                println!("Moved api {} to {:.1}%, {:.1}%", api.id, position.x(), position.y());
            }
        }
        ApiCommand::Delete { id } => {
            if store.delete_api(id).await? {
                println!("Deleted api {}", id);
            } else {
                println!("No api {}", id);
            }
        }
        ApiCommand::Reorder { screen, ids } => {
            store.reorder_apis(screen, &ids).await?;
            println!("Reordered {} apis", ids.len());
        }
    }
    Ok(())
}
