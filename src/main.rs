// SPDX-License-Identifier: Apache-2.0

use args::Args;
use clap::Parser;
use std::{
    error::Error,
    fs,
    sync::Arc,
    thread,
    time::{Duration, Instant},
};
use tokio::runtime::Handle;
use tracing::{debug, info, warn, Level};
use viewfinder::{
    analysis::{AnalysisKind, AnalyzerConfig, Event, FrameAnalyzer},
    barcode::QrDecoder,
    image::{image_size, Frame, PixelFormat},
};

mod args;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(if args.verbose {
            Level::DEBUG
        } else {
            Level::INFO
        })
        .with_writer(std::io::stderr)
        .init();

    let (width, height) = (args.width(), args.height());
    if width == 0 || height == 0 {
        return Err(format!("invalid frame size {}x{}", width, height).into());
    }
    let format = PixelFormat::from(args.format);

    let config = AnalyzerConfig::from(&args);
    if !config.barcode_scanning && !config.preview_mode {
        warn!("neither --barcode nor --preview given, no events will be produced");
    }

    let (tx, rx) = kanal::unbounded::<Event>();
    let printer = thread::spawn(move || {
        let mut count = 0usize;
        while let Ok(event) = rx.recv() {
            println!("{}", event.to_json());
            count += 1;
        }
        count
    });

    let decoder = Arc::new(QrDecoder::new(config.barcode_types.clone()));
    let analyzer = FrameAnalyzer::new(config, decoder, Arc::new(tx), Handle::current());

    let frame_len = image_size(width, height, format);
    let interval = Duration::from_millis(args.interval_ms);
    let start = Instant::now();
    let mut frames = 0usize;
    let mut pending = Vec::new();

    for path in &args.frames {
        let data = fs::read(path)?;
        if data.len() % frame_len != 0 {
            return Err(format!(
                "{} holds {} bytes which is not a whole number of {}x{} {} frames ({} bytes each)",
                path.display(),
                data.len(),
                width,
                height,
                format,
                frame_len
            )
            .into());
        }
        debug!(path = %path.display(), frames = data.len() / frame_len, "reading frames");

        for chunk in data.chunks_exact(frame_len) {
            let frame = Frame::new(chunk.to_vec(), width, height, format)?;
            let dispatch = analyzer.on_preview_frame(Arc::new(frame));
            if !dispatch.is_empty() {
                pending.push(dispatch);
            }
            frames += 1;

            if !interval.is_zero() {
                tokio::time::sleep(interval).await;
            }
        }
    }

    for dispatch in pending {
        dispatch.join().await;
    }

    let barcode_skipped = analyzer.gate(AnalysisKind::Barcode).rejected();
    let preview_skipped = analyzer.gate(AnalysisKind::PreviewColor).rejected();
    drop(analyzer);

    let events = printer
        .join()
        .map_err(|_| "event printer thread panicked")?;

    info!(
        frames,
        events,
        barcode_skipped,
        preview_skipped,
        elapsed = ?start.elapsed(),
        "analysis complete"
    );

    Ok(())
}
