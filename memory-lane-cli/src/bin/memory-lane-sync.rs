use std::time::Duration;

use structopt::StructOpt;

use memory_lane_cli::geocode::Nominatim;
use memory_lane_cli::headlines::HeadlineCache;
use memory_lane_cli::sync::{sync, SyncOptions};

#[derive(StructOpt)]
struct Args {
    /// Directory holding the photo files.
    #[structopt(
        long,
        parse(from_os_str),
        default_value = "public/photos",
        env = "MEMORY_LANE_PHOTOS_DIR"
    )]
    photos_dir: std::path::PathBuf,

    /// Where to write the photos json.
    #[structopt(
        long,
        parse(from_os_str),
        default_value = "public/data/photos.json",
        env = "MEMORY_LANE_PHOTOS_JSON"
    )]
    output: std::path::PathBuf,

    /// URL prefix photo file names are appended to.
    #[structopt(long, default_value = "/photos", env = "MEMORY_LANE_PHOTOS_URL_PREFIX")]
    url_prefix: String,

    /// Milliseconds to wait between photos.
    #[structopt(long, default_value = "1000", env = "MEMORY_LANE_SYNC_DELAY_MS")]
    delay_ms: u64,

    /// Nominatim reverse geocoding endpoint.
    #[structopt(
        long,
        default_value = "https://nominatim.openstreetmap.org/reverse",
        env = "MEMORY_LANE_NOMINATIM_URL"
    )]
    nominatim_url: String,

    /// RSS feed headlines are picked from.
    #[structopt(
        long,
        default_value = "https://feeds.bbci.co.uk/news/rss.xml",
        env = "MEMORY_LANE_HEADLINE_FEED"
    )]
    headline_feed: String,
}

#[async_std::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::from_args();
    let options = SyncOptions {
        photos_dir: args.photos_dir,
        output: args.output,
        url_prefix: args.url_prefix,
        delay: Duration::from_millis(args.delay_ms),
    };

    let geocoder = Nominatim::new(args.nominatim_url);
    let mut headlines = HeadlineCache::new(args.headline_feed);

    if let Err(err) = sync(&options, &geocoder, &mut headlines).await {
        log::error!("Sync failed: {}", err);
        return Err(err.into());
    }

    Ok(())
}
