use std::io::Write;

use memory_lane_cli::metadata::{file_time, is_tiff, read_metadata};
use memory_lane_cli::xmp::read_xmp_packet;

#[async_std::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let path = match std::env::args().nth(1) {
        Some(path) => std::path::PathBuf::from(path),
        None => {
            log::error!("Usage: memory-lane-dump-metadata PATH");
            return Ok(());
        },
    };

    let metadata = read_metadata(&path)?;
    match metadata.taken {
        Some(taken) => log::info!("Taken: {}", taken),
        None => log::info!("Taken: unknown, file time {}", file_time(&path)?),
    }
    log::info!("GPS: {:?}", metadata.gps);
    log::info!("Title: {:?}", metadata.title);

    if is_tiff(&path) {
        let file = std::fs::File::open(&path)?;
        let xmp_xml = read_xmp_packet(&file)?;

        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        std::fs::File::create(format!("xmp.{}.xml", file_name))?.write_all(xmp_xml.as_bytes())?;
    }

    Ok(())
}
