//! Subcommand execution

use crate::app::cli::args::{ListArgs, ScanArgs};
use crate::app::cli::display;
use crate::app::spinner::run_spinner;
use crate::core::error_handling::log_error_with_context;
use crate::core::shutdown::{ShutdownCoordinator, INTERRUPTED_EXIT_CODE};
use crate::scanner::api::{ScanCoordinator, ScanError, ScanImage};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;

pub async fn run_list(coordinator: &ScanCoordinator, args: &ListArgs, use_color: bool) -> i32 {
    let scanners = coordinator.list_scanners().await;
    if args.json {
        match display::scanners_json(&scanners) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                log::error!("Cannot render scanner list: {}", e);
                return EXIT_FAILURE;
            }
        }
    } else {
        display::display_scanner_table(&scanners, use_color);
    }
    EXIT_SUCCESS
}

/// Run one scan, cancelling it when a shutdown is requested
pub async fn run_scan(
    coordinator: Arc<ScanCoordinator>,
    args: &ScanArgs,
    shutdown: &ShutdownCoordinator,
    use_color: bool,
) -> i32 {
    let request = args.to_request();
    log::info!(
        "Scanning from {} ({} dpi, source {})",
        request.scanner_id,
        request.resolution.dpi(),
        request.source
    );

    let spinner = tokio::spawn(run_spinner(coordinator.subscribe(), shutdown.subscribe()));
    let canceller = {
        let coordinator = Arc::clone(&coordinator);
        let mut shutdown_rx = shutdown.subscribe();
        tokio::spawn(async move {
            if shutdown_rx.recv().await.is_ok() {
                log::info!("Cancelling scan");
                coordinator.cancel_scan().await;
            }
        })
    };

    let result = coordinator.perform_scan(&request).await;
    canceller.abort();
    // Terminal events end the spinner; this only bounds the wait
    let _ = tokio::time::timeout(Duration::from_millis(500), spinner).await;

    let images = match result {
        Ok(images) => images,
        Err(ScanError::Cancelled) => {
            eprintln!("Scan cancelled");
            return INTERRUPTED_EXIT_CODE;
        }
        Err(e) => {
            log_error_with_context(&e, &format!("Scanning failed: {}", e));
            return EXIT_FAILURE;
        }
    };

    if args.json {
        return match display::pages_json(&images) {
            Ok(json) => {
                println!("{}", json);
                EXIT_SUCCESS
            }
            Err(e) => {
                log::error!("Cannot render scanned pages: {}", e);
                EXIT_FAILURE
            }
        };
    }

    let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S").to_string();
    match write_pages(&args.output_dir, &images, &stamp).await {
        Ok(paths) => {
            println!("{}", display::written_pages_summary(&paths, use_color));
            EXIT_SUCCESS
        }
        Err(e) => {
            log::error!(
                "Cannot write pages to {}: {}",
                args.output_dir.display(),
                e
            );
            EXIT_FAILURE
        }
    }
}

/// `scan_<stamp>_001.jpg`, keeping the extension the tool produced
pub fn page_file_name(stamp: &str, index: usize, image: &ScanImage) -> String {
    let extension = image
        .file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext)
        .filter(|ext| !ext.is_empty())
        .unwrap_or("jpg");
    format!("scan_{}_{:03}.{}", stamp, index + 1, extension)
}

/// Write all pages to `dir` concurrently
pub async fn write_pages(
    dir: &Path,
    images: &[ScanImage],
    stamp: &str,
) -> std::io::Result<Vec<PathBuf>> {
    tokio::fs::create_dir_all(dir).await?;
    let writes = images.iter().enumerate().map(|(index, image)| {
        let path = dir.join(page_file_name(stamp, index, image));
        async move {
            tokio::fs::write(&path, &image.bytes).await?;
            log::debug!("Wrote {} ({} bytes)", path.display(), image.len());
            Ok::<_, std::io::Error>(path)
        }
    });
    futures::future::join_all(writes).await.into_iter().collect()
}
