use std::{thread, time::Duration};

use chrono::{DateTime, Utc};
use image::RgbImage;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{
    BoardGeometry, BoardSnapshot, CaptureError, CellObservation, GameStatus, GameStatusDetector,
    GeometryCache, LocateError, StatusReport, TileClassifier,
    snapshot::{matrix_of, overall_confidence},
};

/// Supplies fresh captures of the page on request.
pub trait FrameSource {
    /// Captures a new frame.
    ///
    /// Returning [`CaptureError::Cancelled`] ends the retry loop; any
    /// other error only consumes one attempt.
    fn recapture(&mut self) -> Result<RgbImage, CaptureError>;

    /// Whether the source is known to have no frame left.
    ///
    /// The assembler checks this before pausing, so an exhausted source
    /// settles the snapshot without waiting.
    fn is_exhausted(&self) -> bool {
        false
    }
}

/// Waits between recapture attempts.
pub trait Pause {
    fn pause(&mut self, delay: Duration);
}

/// Sleeps the current thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleep;

impl Pause for ThreadSleep {
    fn pause(&mut self, delay: Duration) {
        thread::sleep(delay);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Upper bound on recapture requests per snapshot.
    pub max_recaptures: usize,
    /// Delay before each recapture, letting slide and merge animations settle.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_recaptures: 3,
            delay: Duration::from_millis(120),
        }
    }
}

#[derive(Debug, Clone)]
struct FrameReading {
    cells: Vec<CellObservation>,
    confidence: f32,
    report: StatusReport,
}

/// Turns frames into [`BoardSnapshot`]s.
///
/// A frame whose overall confidence (the minimum over all cells) is below
/// the floor is usually caught mid-animation, so the assembler asks the
/// [`FrameSource`] for a new one, at most [`RetryPolicy::max_recaptures`]
/// times. If no frame reaches the floor, the most confident one is
/// returned with [`GameStatus::Unknown`] and flagged as not authoritative.
#[derive(Debug, Clone)]
pub struct BoardAssembler {
    classifier: TileClassifier,
    detector: GameStatusDetector,
    policy: RetryPolicy,
    confidence_floor: f32,
    clock: fn() -> DateTime<Utc>,
}

impl BoardAssembler {
    #[must_use]
    pub fn new(
        classifier: TileClassifier,
        detector: GameStatusDetector,
        policy: RetryPolicy,
        confidence_floor: f32,
    ) -> Self {
        Self {
            classifier,
            detector,
            policy,
            confidence_floor,
            clock: Utc::now,
        }
    }

    /// Replaces the timestamp source.
    #[must_use]
    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn classifier(&self) -> &TileClassifier {
        &self.classifier
    }

    #[must_use]
    pub fn detector(&self) -> &GameStatusDetector {
        &self.detector
    }

    #[must_use]
    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    #[must_use]
    pub fn confidence_floor(&self) -> f32 {
        self.confidence_floor
    }

    fn read(&self, image: &RgbImage, geometry: &BoardGeometry) -> FrameReading {
        let cells = self.classifier.classify_board(image, geometry);
        let confidence = overall_confidence(&cells);
        let matrix = matrix_of(&cells);
        let report = self.detector.detect(image, geometry, Some(&matrix));
        FrameReading {
            cells,
            confidence,
            report,
        }
    }

    fn settle(
        &self,
        reading: FrameReading,
        status: GameStatus,
        authoritative: bool,
        recaptures: usize,
    ) -> BoardSnapshot {
        BoardSnapshot::new(
            reading.cells,
            status,
            authoritative,
            recaptures,
            (self.clock)(),
        )
    }

    /// Classifies a single frame without recapturing.
    #[must_use]
    pub fn assemble_frame(&self, image: &RgbImage, geometry: &BoardGeometry) -> BoardSnapshot {
        let reading = self.read(image, geometry);
        let status = reading.report.status;
        if status.is_unknown() || reading.confidence < self.confidence_floor {
            let status = if reading.report.is_terminal() {
                status
            } else {
                GameStatus::Unknown
            };
            return self.settle(reading, status, false, 0);
        }
        self.settle(reading, status, true, 0)
    }

    /// Assembles a snapshot of `image` using the session geometry.
    ///
    /// Fails only when `cache` holds no geometry.
    pub fn assemble<S, P>(
        &self,
        image: &RgbImage,
        cache: &GeometryCache,
        source: &mut S,
        pause: &mut P,
    ) -> Result<BoardSnapshot, LocateError>
    where
        S: FrameSource,
        P: Pause,
    {
        let geometry = cache.current().ok_or(LocateError::NotLocated)?;
        let mut reading = self.read(image, &geometry);
        let mut best = reading.clone();
        let mut attempts = 0;
        let mut recaptures = 0;

        loop {
            if reading.report.is_terminal() {
                let authoritative = reading.confidence >= self.confidence_floor;
                debug!(
                    status = %reading.report.status,
                    confidence = reading.confidence,
                    recaptures,
                    "terminal overlay"
                );
                let status = reading.report.status;
                return Ok(self.settle(reading, status, authoritative, recaptures));
            }
            if reading.confidence >= self.confidence_floor && !reading.report.status.is_unknown() {
                debug!(confidence = reading.confidence, recaptures, "snapshot settled");
                let status = reading.report.status;
                return Ok(self.settle(reading, status, true, recaptures));
            }
            if attempts >= self.policy.max_recaptures {
                info!(
                    confidence = best.confidence,
                    attempts, "retry budget exhausted, snapshot is not authoritative"
                );
                return Ok(self.settle(best, GameStatus::Unknown, false, recaptures));
            }
            if source.is_exhausted() {
                debug!(attempts, "no frame left to recapture");
                return Ok(self.settle(best, GameStatus::Unknown, false, recaptures));
            }

            pause.pause(self.policy.delay);
            attempts += 1;
            match source.recapture() {
                Ok(frame) => {
                    recaptures += 1;
                    reading = self.read(&frame, &geometry);
                    debug!(
                        attempt = attempts,
                        confidence = reading.confidence,
                        "recaptured frame"
                    );
                    if reading.confidence > best.confidence {
                        best = reading.clone();
                    }
                }
                Err(CaptureError::Cancelled) => {
                    debug!(attempt = attempts, "recapture cancelled");
                    return Ok(self.settle(best, GameStatus::Unknown, false, recaptures));
                }
                Err(err) => {
                    warn!(%err, attempt = attempts, "recapture failed");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use tilescan_engine::Board;

    use super::*;
    use crate::{
        BoardRenderer, CanonicalPalette, ClassifierConfig, GeometryLocator, LocatorConfig,
        NoRecapture, OverlaySignature, StatusConfig,
    };

    #[derive(Debug, Default)]
    struct ScriptedSource {
        frames: VecDeque<Result<RgbImage, CaptureError>>,
        fallback: Option<RgbImage>,
        requests: usize,
    }

    impl FrameSource for ScriptedSource {
        fn recapture(&mut self) -> Result<RgbImage, CaptureError> {
            self.requests += 1;
            match self.frames.pop_front() {
                Some(frame) => frame,
                None => self.fallback.clone().ok_or(CaptureError::Cancelled),
            }
        }
    }

    #[derive(Debug, Default)]
    struct RecordingPause {
        delays: Vec<Duration>,
    }

    impl Pause for RecordingPause {
        fn pause(&mut self, delay: Duration) {
            self.delays.push(delay);
        }
    }

    fn epoch() -> DateTime<Utc> {
        DateTime::<Utc>::UNIX_EPOCH
    }

    fn assembler(max_recaptures: usize) -> BoardAssembler {
        let palette = CanonicalPalette::canonical();
        BoardAssembler::new(
            TileClassifier::new(palette.clone(), ClassifierConfig::default()),
            GameStatusDetector::new(palette.frame(), StatusConfig::default()),
            RetryPolicy {
                max_recaptures,
                delay: Duration::from_millis(50),
            },
            0.5,
        )
        .with_clock(epoch)
    }

    fn board() -> Board {
        Board::from_rows([[2, 4, 0, 0], [0, 8, 16, 0], [0; 4], [2048, 0, 0, 2]]).unwrap()
    }

    fn clean_frame() -> RgbImage {
        BoardRenderer::default().render(&board())
    }

    /// A frame with the 2 in the top-left corner washed out.
    fn blurred_frame() -> RgbImage {
        let renderer = BoardRenderer::default();
        let mut image = renderer.render(&board());
        renderer.perturb_cell(&mut image, 0, 0, [60; 3]);
        image
    }

    fn located_cache(image: &RgbImage) -> GeometryCache {
        let locator =
            GeometryLocator::new(&CanonicalPalette::canonical(), LocatorConfig::default());
        let mut cache = GeometryCache::new();
        locator.locate(image, &mut cache).unwrap();
        cache
    }

    #[test]
    fn test_clean_frame_needs_no_recapture() {
        let image = clean_frame();
        let cache = located_cache(&image);
        let mut source = ScriptedSource::default();
        let snapshot = assembler(3)
            .assemble(&image, &cache, &mut source, &mut RecordingPause::default())
            .unwrap();
        assert_eq!(snapshot.board(), &board());
        assert_eq!(snapshot.status(), GameStatus::Active);
        assert!(snapshot.is_authoritative());
        assert!((snapshot.confidence() - 1.0).abs() < f32::EPSILON);
        assert_eq!(source.requests, 0);
    }

    #[test]
    fn test_same_image_same_snapshot() {
        let image = clean_frame();
        let cache = located_cache(&image);
        let assembler = assembler(3);
        let assemble = || {
            assembler
                .assemble(
                    &image,
                    &cache,
                    &mut ScriptedSource::default(),
                    &mut RecordingPause::default(),
                )
                .unwrap()
        };
        let first = assemble();
        let second = assemble();
        assert_eq!(first, second);
    }

    #[test]
    fn test_recapture_count_is_bounded() {
        let cache = located_cache(&clean_frame());
        for max in 0..5 {
            let mut source = ScriptedSource {
                fallback: Some(blurred_frame()),
                ..ScriptedSource::default()
            };
            let mut pause = RecordingPause::default();
            let snapshot = assembler(max)
                .assemble(&blurred_frame(), &cache, &mut source, &mut pause)
                .unwrap();
            assert_eq!(source.requests, max, "recapture requests with budget {max}");
            assert_eq!(snapshot.recaptures(), max);
            assert_eq!(pause.delays, vec![Duration::from_millis(50); max]);
            assert_eq!(snapshot.status(), GameStatus::Unknown);
            assert!(!snapshot.is_authoritative());
            assert_eq!(snapshot.board(), &board(), "best-effort matrix is populated");
        }
    }

    #[test]
    fn test_recovers_after_transient_frame() {
        let cache = located_cache(&clean_frame());
        let mut source = ScriptedSource {
            frames: VecDeque::from([Ok(blurred_frame()), Ok(clean_frame())]),
            ..ScriptedSource::default()
        };
        let snapshot = assembler(3)
            .assemble(&blurred_frame(), &cache, &mut source, &mut RecordingPause::default())
            .unwrap();
        assert_eq!(source.requests, 2);
        assert_eq!(snapshot.recaptures(), 2);
        assert!(snapshot.is_authoritative());
        assert_eq!(snapshot.status(), GameStatus::Active);
    }

    #[test]
    fn test_cancelled_recapture_stops_immediately() {
        let cache = located_cache(&clean_frame());
        let mut source = ScriptedSource {
            frames: VecDeque::from([Err(CaptureError::Cancelled), Ok(clean_frame())]),
            ..ScriptedSource::default()
        };
        let snapshot = assembler(3)
            .assemble(&blurred_frame(), &cache, &mut source, &mut RecordingPause::default())
            .unwrap();
        assert_eq!(source.requests, 1, "no request after cancellation");
        assert_eq!(snapshot.recaptures(), 0, "no frame was delivered");
        assert_eq!(snapshot.status(), GameStatus::Unknown);
        assert!(!snapshot.is_authoritative());
    }

    #[test]
    fn test_failed_capture_consumes_an_attempt() {
        let cache = located_cache(&clean_frame());
        let failure = || {
            Err(CaptureError::Failed {
                message: "tab not ready".to_owned(),
            })
        };
        let mut source = ScriptedSource {
            frames: VecDeque::from([failure(), failure(), Ok(clean_frame())]),
            ..ScriptedSource::default()
        };
        let snapshot = assembler(2)
            .assemble(&blurred_frame(), &cache, &mut source, &mut RecordingPause::default())
            .unwrap();
        assert_eq!(source.requests, 2);
        assert_eq!(snapshot.recaptures(), 0);
        assert_eq!(snapshot.status(), GameStatus::Unknown);
    }

    #[test]
    fn test_best_frame_is_kept() {
        let renderer = BoardRenderer::default();
        let mut worse = renderer.render(&board());
        renderer.perturb_cell(&mut worse, 0, 0, [60; 3]);
        renderer.perturb_cell(&mut worse, 3, 3, [-120; 3]);
        let cache = located_cache(&clean_frame());
        let mut source = ScriptedSource {
            frames: VecDeque::from([Ok(worse)]),
            ..ScriptedSource::default()
        };
        let first = blurred_frame();
        let snapshot = assembler(1)
            .assemble(&first, &cache, &mut source, &mut RecordingPause::default())
            .unwrap();
        let expected = assembler(0).assemble_frame(&first, &cache.current().unwrap());
        assert!((snapshot.confidence() - expected.confidence()).abs() < f32::EPSILON);
        assert_eq!(snapshot.cells(), expected.cells());
    }

    #[test]
    fn test_terminal_overlay_ends_the_loop() {
        let renderer = BoardRenderer::default();
        let cache = located_cache(&clean_frame());
        let [game_over, _] = OverlaySignature::canonical();
        let image = renderer.render_with_overlay(&board(), &game_over);
        let mut source = ScriptedSource {
            fallback: Some(clean_frame()),
            ..ScriptedSource::default()
        };
        let snapshot = assembler(3)
            .assemble(&image, &cache, &mut source, &mut RecordingPause::default())
            .unwrap();
        assert_eq!(snapshot.status(), GameStatus::GameOver);
        assert_eq!(source.requests, 0);
    }

    #[test]
    fn test_requires_located_geometry() {
        let result = assembler(3).assemble(
            &clean_frame(),
            &GeometryCache::new(),
            &mut ScriptedSource::default(),
            &mut RecordingPause::default(),
        );
        assert_eq!(result, Err(LocateError::NotLocated));
    }

    #[test]
    fn test_exhausted_source_settles_without_waiting() {
        let cache = located_cache(&clean_frame());
        let mut pause = RecordingPause::default();
        let snapshot = assembler(3)
            .assemble(&blurred_frame(), &cache, &mut NoRecapture, &mut pause)
            .unwrap();
        assert_eq!(snapshot.recaptures(), 0);
        assert!(pause.delays.is_empty(), "no pause before an exhausted source");
        assert_eq!(snapshot.status(), GameStatus::Unknown);
        assert!(!snapshot.is_authoritative());
    }

    #[test]
    fn test_undersized_frame_snapshot_round_trips() {
        let cache = located_cache(&clean_frame());
        let mut source = ScriptedSource {
            frames: VecDeque::from([Ok(RgbImage::new(40, 40))]),
            ..ScriptedSource::default()
        };
        let snapshot = assembler(1)
            .assemble(&blurred_frame(), &cache, &mut source, &mut RecordingPause::default())
            .unwrap();
        let geometry = cache.current().unwrap();
        let small = assembler(0).assemble_frame(&RgbImage::new(40, 40), &geometry);
        assert!(small.cells().iter().any(|cell| cell.distance.is_none()));
        for snapshot in [snapshot, small] {
            let json = serde_json::to_string(&snapshot).unwrap();
            let back: BoardSnapshot = serde_json::from_str(&json).unwrap();
            assert_eq!(back, snapshot);
        }
    }
}
