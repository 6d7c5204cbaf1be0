use std::sync::Arc;
use std::time::Duration;

use opentelemetry_tide::TideExt;
use structopt::StructOpt;
use time::UtcOffset;

pub mod cache;
pub mod db;
pub mod icloud;
pub mod models;
pub mod sources;
pub mod telemetry;
pub mod web;

use cache::TimelineCache;
use db::comments::{CommentStore, MemoryCommentStore};
use icloud::IsahcTransport;
use models::timeline::Timeline;
use sources::{PhotoSource, SourceError};

#[derive(Clone)]
pub struct State {
    pub args: Arc<Args>,
    pub comments: Arc<dyn CommentStore>,
    pub source: Arc<PhotoSource>,
    pub timeline: Arc<TimelineCache>,
    pub tera: Arc<tera::Tera>,
}

impl State {
    pub async fn timeline(&self) -> Result<Arc<Timeline>, SourceError> {
        self.timeline.get_or_load(|| self.source.load()).await
    }
}

#[derive(Debug)]
pub enum Error {
    TemplateParseError(tera::Error),
    TemplatePathError(std::io::Error),
    TelemetryInitError(anyhow::Error),
    DatabaseError(sqlx::Error),
    MigrationError(sqlx::migrate::MigrateError),
    HttpClientError(isahc::Error),
    InvalidYearOffset(time::error::ComponentRange),
    MissingPhotoSource,
    ListenError(std::io::Error),
}

impl From<Error> for u8 {
    fn from(error: Error) -> u8 {
        match error {
            Error::ListenError(_) => 2,
            Error::TemplateParseError(_) => 3,
            Error::TemplatePathError(_) => 3,
            Error::TelemetryInitError(_) => 4,
            Error::DatabaseError(_) => 5,
            Error::MigrationError(_) => 6,
            Error::HttpClientError(_) => 7,
            Error::InvalidYearOffset(_) => 8,
            Error::MissingPhotoSource => 9,
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::TemplateParseError(err) => {
                write!(f, "Template parsing error: {}", err)
            },
            Error::TemplatePathError(err) => {
                write!(f, "Could not resolve template path: {}", err)
            },
            Error::TelemetryInitError(err) => {
                write!(f, "Failed to init telemetry: {}", err)
            },
            Error::DatabaseError(err) => {
                write!(f, "Failed to connect to database: {}", err)
            },
            Error::MigrationError(err) => {
                write!(f, "Failed to migrate database: {}", err)
            },
            Error::HttpClientError(err) => {
                write!(f, "Failed to build HTTP client: {}", err)
            },
            Error::InvalidYearOffset(err) => {
                write!(f, "Invalid year offset: {}", err)
            },
            Error::MissingPhotoSource => {
                write!(f, "Either an iCloud album id or a local photos json path is required")
            },
            Error::ListenError(err) => {
                write!(f, "Failed to start server: {}", err)
            },
        }
    }
}

#[derive(Debug, StructOpt)]
pub struct Args {
    /// Host address to bind to.
    #[structopt(long, default_value = "localhost", env = "MEMORY_LANE_BIND_ADDRESS")]
    address: String,
    /// Port to bind to.
    #[structopt(long, default_value = "8166", env = "MEMORY_LANE_BIND_PORT")]
    port: u16,

    /// Album base URL.
    #[structopt(long, env = "MEMORY_LANE_BASE_URL")]
    base_url: String,

    /// Shared password protecting the album.
    #[structopt(long, env = "MEMORY_LANE_SITE_PASSWORD", hide_env_values = true)]
    site_password: String,

    /// Mark the auth cookie as Secure.
    #[structopt(
        long,
        default_value = "false",
        parse(try_from_str),
        env = "MEMORY_LANE_SECURE_COOKIES"
    )]
    secure_cookies: bool,

    /// Identifier of the public iCloud shared album to display.
    #[structopt(long, env = "MEMORY_LANE_ICLOUD_ALBUM_ID")]
    icloud_album_id: Option<String>,

    /// photos.json written by memory-lane-sync, used when no iCloud album is configured.
    #[structopt(long, parse(from_os_str), env = "MEMORY_LANE_PHOTOS_JSON")]
    photos_json: Option<std::path::PathBuf>,

    /// Seconds a loaded timeline is served before it is fetched again.
    #[structopt(long, default_value = "3600", env = "MEMORY_LANE_REFRESH_INTERVAL")]
    refresh_interval: u64,

    /// Seconds a shared album resolution may take.
    #[structopt(long, default_value = "30", env = "MEMORY_LANE_RESOLVE_TIMEOUT")]
    resolve_timeout: u64,

    /// UTC offset in hours used to decide which year a photo belongs to.
    #[structopt(
        long,
        default_value = "0",
        allow_hyphen_values = true,
        env = "MEMORY_LANE_YEAR_OFFSET_HOURS"
    )]
    year_offset_hours: i8,

    /// PostgreSQL database url for comments. Comments are kept in memory without it.
    #[structopt(long, env = "DATABASE_URL", hide_env_values = true)]
    database_url: Option<String>,

    /// Path to Tera templates directory
    #[structopt(
        long,
        parse(from_os_str),
        default_value = "./templates",
        env = "MEMORY_LANE_TEMPLATE_PATH"
    )]
    template_path: std::path::PathBuf,
}

async fn comment_store(args: &Args) -> Result<Arc<dyn CommentStore>, Error> {
    match args.database_url {
        Some(ref database_url) => {
            let pool = db::get_pool(database_url)
                .await
                .map_err(Error::DatabaseError)?;
            db::migrate(&pool).await.map_err(Error::MigrationError)?;
            Ok(Arc::new(pool))
        },
        None => {
            tracing::warn!("DATABASE_URL not set, comments will not survive a restart");
            Ok(Arc::new(MemoryCommentStore::new()))
        },
    }
}

fn photo_source(args: &Args) -> Result<PhotoSource, Error> {
    let offset = UtcOffset::from_hms(args.year_offset_hours, 0, 0).map_err(Error::InvalidYearOffset)?;

    if let Some(ref album_id) = args.icloud_album_id {
        let transport = IsahcTransport::new().map_err(Error::HttpClientError)?;
        return Ok(PhotoSource::shared_album(
            transport,
            album_id.clone(),
            Duration::from_secs(args.resolve_timeout),
            offset,
        ));
    }

    match args.photos_json {
        Some(ref path) => Ok(PhotoSource::LocalManifest {
            path: path.clone(),
            offset,
        }),
        None => Err(Error::MissingPhotoSource),
    }
}

pub async fn main() -> Result<(), Error> {
    dotenv::dotenv().ok();
    let args = Arc::new(Args::from_args());

    telemetry::init().map_err(Error::TelemetryInitError)?;

    let comments = comment_store(&args).await?;
    let source = photo_source(&args)?;

    let template_path = args
        .template_path
        .canonicalize()
        .map_err(Error::TemplatePathError)?;
    let tera = tera::Tera::new(&template_path.join("**/*.html").to_string_lossy())
        .map_err(Error::TemplateParseError)?;

    let state = State {
        args: args.clone(),
        comments,
        source: Arc::new(source),
        timeline: Arc::new(TimelineCache::new(Duration::from_secs(args.refresh_interval))),
        tera: Arc::new(tera),
    };
    let mut app = tide::with_state(state);

    app.with_default_tracing_middleware();

    web::mount(&mut app);

    let address: &str = args.address.as_ref();
    app.listen((address, args.port))
        .await
        .map_err(Error::ListenError)?;

    Ok(())
}
