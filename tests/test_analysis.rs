// SPDX-License-Identifier: Apache-2.0

use qrcode::{Color, QrCode};
use std::sync::{Arc, Mutex};
use tokio::runtime::Handle;
use viewfinder::{
    analysis::{scan_barcode, AnalysisKind, AnalyzerConfig, Event, FrameAnalyzer, Orientation},
    barcode::{Barcode, BarcodeDecoder, BarcodeFormat, BarcodeFormats, LuminanceSource, QrDecoder},
    error::{Error, Result},
    image::{Frame, Hsl, PixelFormat, SamplePoint},
};

/// Decoder that waits for a go signal and returns a canned result.
struct ScriptedDecoder {
    release: Option<Mutex<kanal::Receiver<()>>>,
    result: fn() -> Result<Option<Barcode>>,
    seen: Mutex<Vec<(u32, u32)>>,
}

impl ScriptedDecoder {
    fn new(result: fn() -> Result<Option<Barcode>>) -> Self {
        Self {
            release: None,
            result,
            seen: Mutex::new(Vec::new()),
        }
    }

    fn gated(result: fn() -> Result<Option<Barcode>>) -> (Self, kanal::Sender<()>) {
        let (tx, rx) = kanal::unbounded();
        let decoder = Self {
            release: Some(Mutex::new(rx)),
            ..Self::new(result)
        };
        (decoder, tx)
    }
}

impl BarcodeDecoder for ScriptedDecoder {
    fn decode(&self, source: &LuminanceSource<'_>) -> Result<Option<Barcode>> {
        self.seen
            .lock()
            .unwrap()
            .push((source.width(), source.height()));
        if let Some(release) = &self.release {
            release.lock().unwrap().recv().unwrap();
        }
        (self.result)()
    }

    fn supported(&self) -> BarcodeFormats {
        BarcodeFormats::all()
    }
}

fn qr_hello() -> Result<Option<Barcode>> {
    Ok(Some(Barcode {
        text: "hello".to_string(),
        format: BarcodeFormat::QrCode,
    }))
}

fn ean_code() -> Result<Option<Barcode>> {
    Ok(Some(Barcode {
        text: "4006381333931".to_string(),
        format: BarcodeFormat::Ean13,
    }))
}

fn not_found() -> Result<Option<Barcode>> {
    Ok(None)
}

fn failure() -> Result<Option<Barcode>> {
    Err(Error::Decoder("checksum mismatch".to_string()))
}

fn panics() -> Result<Option<Barcode>> {
    panic!("decoder crashed")
}

/// 176x144 NV21 frame, black luma with a strong red chroma
fn red_frame() -> Arc<Frame> {
    let (width, height) = (176u32, 144u32);
    let mut data = vec![0u8; (width * height) as usize];
    for _ in 0..(width * height / 4) {
        data.push(255);
        data.push(128);
    }
    Arc::new(Frame::new(data, width, height, PixelFormat::Nv21).unwrap())
}

/// NV21 frame with a QR symbol in the luma plane, 4 pixels per module and a
/// 4 module quiet zone.
fn qr_frame(text: &str) -> Frame {
    let code = QrCode::new(text).unwrap();
    let modules = code.width();
    let colors = code.to_colors();
    let side = (modules + 8) * 4;

    let mut data = vec![255u8; side * side];
    for (i, color) in colors.iter().enumerate() {
        if *color != Color::Dark {
            continue;
        }
        let (my, mx) = (i / modules + 4, i % modules + 4);
        for y in my * 4..my * 4 + 4 {
            for x in mx * 4..mx * 4 + 4 {
                data[y * side + x] = 0;
            }
        }
    }
    data.resize(side * side * 3 / 2, 128);
    Frame::new(data, side as u32, side as u32, PixelFormat::Nv21).unwrap()
}

fn analyzer(
    config: AnalyzerConfig,
    decoder: ScriptedDecoder,
) -> (FrameAnalyzer, Arc<ScriptedDecoder>, kanal::Receiver<Event>) {
    let (tx, rx) = kanal::unbounded();
    let decoder = Arc::new(decoder);
    let analyzer = FrameAnalyzer::new(config, decoder.clone(), Arc::new(tx), Handle::current());
    (analyzer, decoder, rx)
}

fn barcode_config() -> AnalyzerConfig {
    AnalyzerConfig {
        barcode_scanning: true,
        ..Default::default()
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_barcode_event() {
    let (analyzer, _, rx) = analyzer(barcode_config(), ScriptedDecoder::new(qr_hello));

    let dispatch = analyzer.on_preview_frame(red_frame());
    assert!(dispatch.started(AnalysisKind::Barcode));
    assert!(!dispatch.started(AnalysisKind::PreviewColor));
    dispatch.join().await;

    let event = rx.try_recv().unwrap().unwrap();
    assert_eq!(event.name(), Event::BARCODE_READ);
    assert_eq!(
        event.payload(),
        serde_json::json!({"data": "hello", "type": "QR_CODE"})
    );
    assert!(!analyzer.gate(AnalysisKind::Barcode).is_busy());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_busy_gate_drops_frames() {
    let (decoder, release) = ScriptedDecoder::gated(qr_hello);
    let (analyzer, decoder, rx) = analyzer(barcode_config(), decoder);

    let first = analyzer.on_preview_frame(red_frame());
    assert!(first.started(AnalysisKind::Barcode));
    assert!(analyzer.gate(AnalysisKind::Barcode).is_busy());

    let second = analyzer.on_preview_frame(red_frame());
    assert!(second.is_empty());
    let third = analyzer.on_preview_frame(red_frame());
    assert!(third.is_empty());
    assert_eq!(analyzer.gate(AnalysisKind::Barcode).rejected(), 2);

    release.send(()).unwrap();
    first.join().await;
    assert_eq!(rx.len(), 1);

    // slot is free again once the task finished
    let fourth = analyzer.on_preview_frame(red_frame());
    assert!(fourth.started(AnalysisKind::Barcode));
    release.send(()).unwrap();
    fourth.join().await;

    assert_eq!(rx.len(), 2);
    assert_eq!(decoder.seen.lock().unwrap().len(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_not_found_and_failure_emit_nothing() {
    for result in [not_found as fn() -> Result<Option<Barcode>>, failure] {
        let (analyzer, _, rx) = analyzer(barcode_config(), ScriptedDecoder::new(result));
        analyzer.on_preview_frame(red_frame()).join().await;
        assert!(rx.is_empty());
        assert!(!analyzer.gate(AnalysisKind::Barcode).is_busy());
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_panicking_decoder_releases_gate() {
    let (analyzer, _, rx) = analyzer(barcode_config(), ScriptedDecoder::new(panics));
    analyzer.on_preview_frame(red_frame()).join().await;
    assert!(rx.is_empty());
    assert!(!analyzer.gate(AnalysisKind::Barcode).is_busy());
    assert!(analyzer
        .on_preview_frame(red_frame())
        .started(AnalysisKind::Barcode));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_disabled_barcode_type_filtered() {
    let config = AnalyzerConfig {
        barcode_types: BarcodeFormats::from_names(["qr"]),
        ..barcode_config()
    };
    let (analyzer, _, rx) = analyzer(config, ScriptedDecoder::new(ean_code));
    analyzer.on_preview_frame(red_frame()).join().await;
    assert!(rx.is_empty());

    analyzer.set_barcode_types(BarcodeFormats::from_names(["qr", "ean13"]));
    analyzer.on_preview_frame(red_frame()).join().await;
    let event = rx.try_recv().unwrap().unwrap();
    assert_eq!(event.payload()["type"], "EAN_13");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_portrait_rotates_source() {
    let (analyzer, decoder, _rx) = analyzer(barcode_config(), ScriptedDecoder::new(not_found));

    analyzer.on_preview_frame(red_frame()).join().await;
    analyzer.set_orientation(Orientation::Portrait);
    analyzer.on_preview_frame(red_frame()).join().await;

    assert_eq!(*decoder.seen.lock().unwrap(), vec![(176, 144), (144, 176)]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_preview_color_event() {
    let config = AnalyzerConfig {
        preview_mode: true,
        ..Default::default()
    };
    let (analyzer, decoder, rx) = analyzer(config, ScriptedDecoder::new(qr_hello));

    let dispatch = analyzer.on_preview_frame(red_frame());
    assert!(dispatch.started(AnalysisKind::PreviewColor));
    assert!(!dispatch.started(AnalysisKind::Barcode));
    dispatch.join().await;

    // rgb(186, 0, 0)
    let event = rx.try_recv().unwrap().unwrap();
    assert_eq!(
        event,
        Event::PreviewFrameRead(Hsl {
            hue: 0,
            saturation: 100,
            lightness: 36,
        })
    );
    assert_eq!(
        event.to_json(),
        serde_json::json!({
            "event": "PreviewFrameRead",
            "payload": {"hue": 0, "saturation": 100, "brightness": 36},
        })
    );
    assert!(decoder.seen.lock().unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_preview_sample_out_of_bounds() {
    let config = AnalyzerConfig {
        preview_mode: true,
        sample_point: SamplePoint::Fixed { x: 500, y: 10 },
        ..Default::default()
    };
    let (analyzer, _, rx) = analyzer(config, ScriptedDecoder::new(not_found));
    analyzer.on_preview_frame(red_frame()).join().await;
    assert!(rx.is_empty());
    assert!(!analyzer.gate(AnalysisKind::PreviewColor).is_busy());

    analyzer.set_sample_point(SamplePoint::Center);
    analyzer.on_preview_frame(red_frame()).join().await;
    assert_eq!(rx.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_kinds_gate_independently() {
    let (decoder, release) = ScriptedDecoder::gated(qr_hello);
    let config = AnalyzerConfig {
        barcode_scanning: true,
        preview_mode: true,
        ..Default::default()
    };
    let (analyzer, _, rx) = analyzer(config, decoder);

    let first = analyzer.on_preview_frame(red_frame());
    assert!(first.started(AnalysisKind::Barcode));
    assert!(first.started(AnalysisKind::PreviewColor));

    // barcode still blocked, preview free to run again once done
    for _ in 0..50 {
        if !analyzer.gate(AnalysisKind::PreviewColor).is_busy() {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    let second = analyzer.on_preview_frame(red_frame());
    assert!(!second.started(AnalysisKind::Barcode));
    assert!(second.started(AnalysisKind::PreviewColor));

    release.send(()).unwrap();
    first.join().await;
    second.join().await;

    // one barcode, two preview colors
    assert_eq!(rx.len(), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_toggle_analyses() {
    let (analyzer, _, rx) = analyzer(AnalyzerConfig::default(), ScriptedDecoder::new(qr_hello));
    assert!(analyzer.on_preview_frame(red_frame()).is_empty());

    analyzer.set_barcode_scanning(true);
    analyzer.set_preview_mode(true);
    analyzer.on_preview_frame(red_frame()).join().await;
    assert_eq!(rx.len(), 2);

    analyzer.set_barcode_scanning(false);
    analyzer.set_preview_mode(false);
    assert!(analyzer.on_preview_frame(red_frame()).is_empty());
    assert!(!analyzer.config().barcode_scanning);
}

#[test]
fn test_scan_qr_both_orientations() {
    let frame = qr_frame("hello viewfinder");
    let decoder = QrDecoder::default();
    let expected = Some(Barcode {
        text: "hello viewfinder".to_string(),
        format: BarcodeFormat::QrCode,
    });

    assert_eq!(scan_barcode(&frame, false, &decoder).unwrap(), expected);
    assert_eq!(scan_barcode(&frame, true, &decoder).unwrap(), expected);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_qr_decoder_event() {
    let (tx, rx) = kanal::unbounded();
    let config = AnalyzerConfig {
        orientation: Orientation::Portrait,
        ..barcode_config()
    };
    let analyzer = FrameAnalyzer::new(
        config,
        Arc::new(QrDecoder::default()),
        Arc::new(tx),
        Handle::current(),
    );

    analyzer
        .on_preview_frame(Arc::new(qr_frame("https://example.com/item/42")))
        .join()
        .await;
    let event = rx.try_recv().unwrap().unwrap();
    assert_eq!(
        event.payload(),
        serde_json::json!({"data": "https://example.com/item/42", "type": "QR_CODE"})
    );
}
