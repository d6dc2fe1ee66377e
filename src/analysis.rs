// SPDX-License-Identifier: Apache-2.0

//! Background analysis of camera preview frames.
//!
//! [`FrameAnalyzer`] receives every preview frame and, per analysis kind,
//! starts at most one blocking task at a time:
//!
//! - **barcode**: the luma plane, rotated for portrait orientation, is handed
//!   to a [`BarcodeDecoder`] and a decoded symbol is emitted as
//!   [`Event::BarCodeRead`].
//! - **preview color**: one sample point is converted YUV to RGB to HSL and
//!   emitted as [`Event::PreviewFrameRead`].
//!
//! Failures inside a task are logged and produce no event for that frame;
//! the kind's [`AdmissionGate`] is released whatever the outcome.

use crate::{
    barcode::{Barcode, BarcodeDecoder, BarcodeFormats, LuminanceSource},
    error::Result,
    gate::AdmissionGate,
    image::{Frame, Hsl, SamplePoint},
};
use core::fmt;
use serde_json::{json, Value};
use std::sync::{Arc, RwLock};
use tokio::{runtime::Handle, task::JoinHandle};
use tracing::{debug, info, trace, warn};

/// Device orientation relative to the camera sensor.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Orientation {
    /// Frames match the sensor orientation.
    #[default]
    Landscape,
    /// Frames are rotated 90 degrees before barcode decoding.
    Portrait,
}

/// The two analyses run on preview frames.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum AnalysisKind {
    Barcode,
    PreviewColor,
}

impl fmt::Display for AnalysisKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AnalysisKind::Barcode => f.write_str("barcode"),
            AnalysisKind::PreviewColor => f.write_str("preview"),
        }
    }
}

/// Runtime settings of a [`FrameAnalyzer`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AnalyzerConfig {
    /// Run barcode decoding on preview frames.
    pub barcode_scanning: bool,
    /// Run preview color sampling on preview frames.
    pub preview_mode: bool,
    /// Symbologies reported to the sink, empty for all.
    pub barcode_types: BarcodeFormats,
    pub sample_point: SamplePoint,
    pub orientation: Orientation,
}

/// Results delivered to the host.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    BarCodeRead(Barcode),
    PreviewFrameRead(Hsl),
}

impl Event {
    pub const BARCODE_READ: &'static str = "CameraBarCodeRead";
    pub const PREVIEW_FRAME_READ: &'static str = "PreviewFrameRead";

    pub fn name(&self) -> &'static str {
        match self {
            Event::BarCodeRead(_) => Self::BARCODE_READ,
            Event::PreviewFrameRead(_) => Self::PREVIEW_FRAME_READ,
        }
    }

    /// The event body as the scripting layer receives it.
    pub fn payload(&self) -> Value {
        match self {
            Event::BarCodeRead(barcode) => json!({
                "data": barcode.text,
                "type": barcode.format.name(),
            }),
            Event::PreviewFrameRead(hsl) => json!({
                "hue": hsl.hue,
                "saturation": hsl.saturation,
                "brightness": hsl.lightness,
            }),
        }
    }

    /// Name and payload in one object.
    pub fn to_json(&self) -> Value {
        json!({
            "event": self.name(),
            "payload": self.payload(),
        })
    }
}

/// Destination for analysis events.
///
/// Called from blocking worker threads, so implementations must not assume
/// they run on the thread that delivered the frame.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: Event);
}

impl EventSink for kanal::Sender<Event> {
    fn emit(&self, event: Event) {
        if let Err(e) = self.send(event) {
            debug!(error = %e, "event receiver gone, event dropped");
        }
    }
}

/// Tasks started for one frame.
#[derive(Debug, Default)]
pub struct Dispatch {
    barcode: Option<JoinHandle<()>>,
    preview: Option<JoinHandle<()>>,
}

impl Dispatch {
    pub fn started(&self, kind: AnalysisKind) -> bool {
        match kind {
            AnalysisKind::Barcode => self.barcode.is_some(),
            AnalysisKind::PreviewColor => self.preview.is_some(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.barcode.is_none() && self.preview.is_none()
    }

    /// Waits for the started tasks to finish. A panicked task is logged.
    pub async fn join(self) {
        for (kind, handle) in [
            (AnalysisKind::Barcode, self.barcode),
            (AnalysisKind::PreviewColor, self.preview),
        ] {
            if let Some(handle) = handle {
                if let Err(e) = handle.await {
                    warn!(%kind, error = %e, "analysis task aborted");
                }
            }
        }
    }
}

/// Per-frame dispatcher for barcode and preview color analysis.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use viewfinder::{
///     analysis::{AnalyzerConfig, Event, FrameAnalyzer},
///     barcode::QrDecoder,
///     image::{Frame, PixelFormat},
/// };
///
/// # async fn run() -> Result<(), viewfinder::error::Error> {
/// let (tx, rx) = kanal::unbounded::<Event>();
/// let config = AnalyzerConfig {
///     preview_mode: true,
///     ..Default::default()
/// };
/// let analyzer = FrameAnalyzer::new(
///     config,
///     Arc::new(QrDecoder::default()),
///     Arc::new(tx),
///     tokio::runtime::Handle::current(),
/// );
///
/// let frame = Frame::new(vec![128; 176 * 144 * 3 / 2], 176, 144, PixelFormat::Nv21)?;
/// analyzer.on_preview_frame(Arc::new(frame)).join().await;
/// println!("{}", rx.recv().unwrap().to_json());
/// # Ok(())
/// # }
/// ```
pub struct FrameAnalyzer {
    config: RwLock<AnalyzerConfig>,
    decoder: Arc<dyn BarcodeDecoder>,
    sink: Arc<dyn EventSink>,
    barcode_gate: Arc<AdmissionGate>,
    preview_gate: Arc<AdmissionGate>,
    runtime: Handle,
}

impl FrameAnalyzer {
    /// Creates an analyzer whose tasks run on the blocking pool of `runtime`.
    pub fn new(
        config: AnalyzerConfig,
        decoder: Arc<dyn BarcodeDecoder>,
        sink: Arc<dyn EventSink>,
        runtime: Handle,
    ) -> Self {
        let analyzer = Self {
            config: RwLock::new(AnalyzerConfig::default()),
            decoder,
            sink,
            barcode_gate: Arc::new(AdmissionGate::new("barcode")),
            preview_gate: Arc::new(AdmissionGate::new("preview")),
            runtime,
        };
        analyzer.set_config(config);
        analyzer
    }

    /// Snapshot of the current settings.
    pub fn config(&self) -> AnalyzerConfig {
        self.config
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn set_config(&self, config: AnalyzerConfig) {
        self.warn_unsupported(&config.barcode_types);
        info!(
            barcode = config.barcode_scanning,
            preview = config.preview_mode,
            orientation = ?config.orientation,
            sample = ?config.sample_point,
            "analyzer configured"
        );
        *self.config.write().unwrap_or_else(|e| e.into_inner()) = config;
    }

    fn update(&self, f: impl FnOnce(&mut AnalyzerConfig)) {
        let mut config = self.config.write().unwrap_or_else(|e| e.into_inner());
        f(&mut config);
    }

    pub fn set_barcode_scanning(&self, enabled: bool) {
        self.update(|c| c.barcode_scanning = enabled);
    }

    pub fn set_preview_mode(&self, enabled: bool) {
        self.update(|c| c.preview_mode = enabled);
    }

    pub fn set_barcode_types(&self, types: BarcodeFormats) {
        self.warn_unsupported(&types);
        self.update(|c| c.barcode_types = types);
    }

    pub fn set_sample_point(&self, point: SamplePoint) {
        self.update(|c| c.sample_point = point);
    }

    pub fn set_orientation(&self, orientation: Orientation) {
        self.update(|c| c.orientation = orientation);
    }

    pub fn gate(&self, kind: AnalysisKind) -> &AdmissionGate {
        match kind {
            AnalysisKind::Barcode => self.barcode_gate.as_ref(),
            AnalysisKind::PreviewColor => self.preview_gate.as_ref(),
        }
    }

    fn warn_unsupported(&self, types: &BarcodeFormats) {
        let supported = self.decoder.supported();
        for format in types.iter().filter(|f| !supported.allows(*f)) {
            warn!(%format, "barcode type not supported by decoder");
        }
    }

    /// Starts the enabled analyses for one preview frame.
    ///
    /// Must be called from a context where the analyzer's runtime can spawn
    /// blocking work. A kind whose previous task is still running skips this
    /// frame. The returned [`Dispatch`] may be dropped; the tasks keep running.
    pub fn on_preview_frame(&self, frame: Arc<Frame>) -> Dispatch {
        let config = self.config();
        let mut dispatch = Dispatch::default();

        if config.barcode_scanning {
            match self.barcode_gate.try_acquire() {
                Some(permit) => {
                    let frame = Arc::clone(&frame);
                    let decoder = Arc::clone(&self.decoder);
                    let sink = Arc::clone(&self.sink);
                    let portrait = config.orientation == Orientation::Portrait;
                    let types = config.barcode_types.clone();
                    dispatch.barcode = Some(self.runtime.spawn_blocking(move || {
                        let _permit = permit;
                        match scan_barcode(&frame, portrait, decoder.as_ref()) {
                            Ok(Some(barcode)) if types.allows(barcode.format) => {
                                debug!(format = %barcode.format, "barcode read");
                                sink.emit(Event::BarCodeRead(barcode));
                            }
                            Ok(Some(barcode)) => {
                                trace!(format = %barcode.format, "barcode type not enabled")
                            }
                            Ok(None) => trace!("no barcode in frame"),
                            Err(e) => debug!(error = %e, "barcode scan failed"),
                        }
                    }));
                }
                None => trace!("barcode scan in flight, frame skipped"),
            }
        }

        if config.preview_mode {
            match self.preview_gate.try_acquire() {
                Some(permit) => {
                    let frame = Arc::clone(&frame);
                    let sink = Arc::clone(&self.sink);
                    let point = config.sample_point;
                    dispatch.preview = Some(self.runtime.spawn_blocking(move || {
                        let _permit = permit;
                        match preview_color(&frame, point) {
                            Ok(hsl) => sink.emit(Event::PreviewFrameRead(hsl)),
                            Err(e) => debug!(error = %e, "preview color failed"),
                        }
                    }));
                }
                None => trace!("preview color in flight, frame skipped"),
            }
        }

        dispatch
    }
}

/// Decodes a barcode from the frame's luma plane.
pub fn scan_barcode(
    frame: &Frame,
    portrait: bool,
    decoder: &dyn BarcodeDecoder,
) -> Result<Option<Barcode>> {
    if portrait {
        let rotated = frame.rotate90()?;
        decoder.decode(&LuminanceSource::from(&rotated))
    } else {
        decoder.decode(&LuminanceSource::from(frame))
    }
}

/// Samples the frame at `point` and converts the color to HSL.
pub fn preview_color(frame: &Frame, point: SamplePoint) -> Result<Hsl> {
    let rgb = frame.sample(point)?.mean();
    debug!(r = rgb.r, g = rgb.g, b = rgb.b, "preview color");
    Ok(Hsl::from(rgb))
}
