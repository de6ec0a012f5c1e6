/// Modal image viewer: a full-viewport lightbox over a card's image sequence
///
/// The state machine is `closed → open (fitted) → open (zoomed/panned) →
/// closed`. While open it owns the sequence (sources plus a circular index),
/// the per-session transform (zoom bounded to the current image's
/// `[min_zoom, MAX_ZOOM]`, pan offset, drag anchor), and the trigger to
/// return focus to on close. Zoom and pan math lives in `geometry`; this
/// module only sequences it.
///
/// Opening acquires an input-suppression guard; because the guard is owned
/// by the open-session struct, every exit path (cancel key, backdrop press,
/// close control, programmatic close) releases it when the session drops.

use std::path::PathBuf;

use cgmath::Vector2;

use crate::geometry;

/// Upper zoom bound, fixed across images
pub const MAX_ZOOM: f32 = 5.0;

/// Wheel step factors: scroll up zooms in, scroll down zooms out
pub const WHEEL_ZOOM_IN: f32 = 1.12;
pub const WHEEL_ZOOM_OUT: f32 = 0.9;

/// Tolerance when comparing against the minimum zoom
const MIN_ZOOM_EPSILON: f32 = 1e-4;

/// Target zoom for the toggle control (doubling, capped at MAX_ZOOM)
const TOGGLE_TARGET_ZOOM: f32 = 2.0;

/// Background input suppression held while the viewer is open.
///
/// The view layers an opaque capturing backdrop while this guard exists and
/// the application routes wheel/drag input to the viewer only, so the page
/// behind the modal cannot scroll or react.
#[derive(Debug)]
pub struct InputSuppression(());

impl InputSuppression {
    fn acquire() -> Self {
        log::debug!("viewer open: background input suppressed");
        InputSuppression(())
    }
}

impl Drop for InputSuppression {
    fn drop(&mut self) {
        log::debug!("viewer closed: background input restored");
    }
}

/// Drag-in-progress state, anchored at the pointer-down position
#[derive(Debug, Clone, Copy)]
struct DragAnchor {
    start: Vector2<f32>,
    start_offset: Vector2<f32>,
}

/// Everything owned by one open session
#[derive(Debug)]
struct Session {
    images: Vec<PathBuf>,
    index: usize,
    /// Card whose trigger opened the viewer; focus returns there on close
    trigger_card: usize,
    /// Natural size of the current image; None until its load completes
    natural: Option<Vector2<f32>>,
    min_zoom: f32,
    zoom: f32,
    offset: Vector2<f32>,
    drag: Option<DragAnchor>,
    _suppression: InputSuppression,
}

/// What the caller should do after a viewer operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewerEvent {
    /// Nothing to do (invalid operation or state unchanged)
    None,
    /// Begin loading this image source
    Load(PathBuf),
    /// Viewer closed; return focus to this card's trigger
    Closed { trigger_card: usize },
}

/// The modal image viewer
#[derive(Debug, Default)]
pub struct ImageViewer {
    session: Option<Session>,
}

impl ImageViewer {
    pub fn new() -> Self {
        ImageViewer { session: None }
    }

    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    /// Open the viewer on a sequence. Empty sequences are a defined no-op;
    /// the start index is clamped into range.
    pub fn open(
        &mut self,
        images: Vec<PathBuf>,
        start: usize,
        trigger_card: usize,
    ) -> ViewerEvent {
        if images.is_empty() {
            return ViewerEvent::None;
        }
        let index = start.min(images.len() - 1);
        let source = images[index].clone();
        self.session = Some(Session {
            images,
            index,
            trigger_card,
            natural: None,
            min_zoom: 1.0,
            zoom: 1.0,
            offset: Vector2::new(0.0, 0.0),
            drag: None,
            _suppression: InputSuppression::acquire(),
        });
        ViewerEvent::Load(source)
    }

    /// Close the modal, resetting transform state and releasing the
    /// input-suppression guard. Returns the trigger to focus.
    pub fn close(&mut self) -> ViewerEvent {
        match self.session.take() {
            Some(session) => ViewerEvent::Closed {
                trigger_card: session.trigger_card,
            },
            None => ViewerEvent::None,
        }
    }

    /// The current image's natural dimensions arrived: derive the minimum
    /// zoom, pick the initial zoom (natural size when it fits the stage,
    /// otherwise the fit scale), and center the offset.
    ///
    /// Returns the neighbor sources to prefetch, fire-and-forget.
    pub fn image_loaded(
        &mut self,
        natural: Vector2<f32>,
        stage: Vector2<f32>,
    ) -> Vec<PathBuf> {
        let Some(session) = &mut self.session else {
            // The viewer was closed while the image decoded; the late
            // result has nothing to apply to
            return Vec::new();
        };

        session.natural = Some(natural);
        session.min_zoom = geometry::min_zoom_for(natural, stage);
        session.zoom = if geometry::fits(natural, 1.0, stage) {
            1.0
        } else {
            geometry::fit_scale(natural, stage).clamp(session.min_zoom, MAX_ZOOM)
        };
        session.offset = geometry::centered_offset(natural, session.zoom, stage);
        session.offset = geometry::clamp_offsets(
            natural,
            session.zoom,
            stage,
            session.offset,
            geometry::SLACK_FRACTION,
        );
        session.drag = None;

        session.neighbors()
    }

    /// Move through the sequence circularly and start loading the new image
    pub fn navigate(&mut self, step: i32) -> ViewerEvent {
        let Some(session) = &mut self.session else {
            return ViewerEvent::None;
        };
        let len = session.images.len() as i32;
        session.index = (session.index as i32 + step).rem_euclid(len) as usize;
        // The previous image's transform does not carry over
        session.natural = None;
        session.drag = None;
        ViewerEvent::Load(session.images[session.index].clone())
    }

    /// Pointer-anchored zoom, bounded to the current image's zoom range
    pub fn zoom_at(&mut self, point: Vector2<f32>, factor: f32, stage: Vector2<f32>) {
        let Some(session) = &mut self.session else { return };
        let Some(natural) = session.natural else { return };

        let Some((zoom, offset)) = geometry::zoom_about_point(
            session.zoom,
            session.offset,
            point,
            factor,
            session.min_zoom,
            MAX_ZOOM,
        ) else {
            return;
        };
        session.zoom = zoom;
        session.offset = offset;
        session.recenter_or_clamp(natural, stage);
    }

    /// Near minimum zoom: zoom in toward double size anchored at `point`;
    /// otherwise reset to the minimum, re-centering when the result fits.
    pub fn toggle_zoom(&mut self, point: Vector2<f32>, stage: Vector2<f32>) {
        let Some(session) = &mut self.session else { return };
        let Some(natural) = session.natural else { return };

        if session.zoom <= session.min_zoom + MIN_ZOOM_EPSILON {
            let factor = (TOGGLE_TARGET_ZOOM / session.zoom).min(MAX_ZOOM / session.zoom);
            if let Some((zoom, offset)) = geometry::zoom_about_point(
                session.zoom,
                session.offset,
                point,
                factor,
                session.min_zoom,
                MAX_ZOOM,
            ) {
                session.zoom = zoom;
                session.offset = offset;
            }
        } else {
            session.zoom = session.min_zoom;
        }
        session.recenter_or_clamp(natural, stage);
    }

    /// Begin a drag. Panning is only permitted when the scaled image
    /// overflows the stage on at least one axis; otherwise the gesture is
    /// ignored so the pointer is not captured pointlessly.
    pub fn pan_start(&mut self, point: Vector2<f32>, stage: Vector2<f32>) -> bool {
        let Some(session) = &mut self.session else { return false };
        let Some(natural) = session.natural else { return false };
        if geometry::fits(natural, session.zoom, stage) {
            return false;
        }
        session.drag = Some(DragAnchor {
            start: point,
            start_offset: session.offset,
        });
        true
    }

    /// Update the offset from the drag anchor, then clamp softly
    pub fn pan_move(&mut self, point: Vector2<f32>, stage: Vector2<f32>) {
        let Some(session) = &mut self.session else { return };
        let (Some(natural), Some(drag)) = (session.natural, session.drag) else {
            return;
        };
        session.offset = drag.start_offset + (point - drag.start);
        session.offset = geometry::clamp_offsets(
            natural,
            session.zoom,
            stage,
            session.offset,
            geometry::SLACK_FRACTION,
        );
    }

    pub fn pan_end(&mut self) {
        if let Some(session) = &mut self.session {
            session.drag = None;
        }
    }

    pub fn is_dragging(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|s| s.drag.is_some())
    }

    pub fn current_source(&self) -> Option<&PathBuf> {
        self.session.as_ref().map(|s| &s.images[s.index])
    }

    pub fn index(&self) -> Option<usize> {
        self.session.as_ref().map(|s| s.index)
    }

    /// Caption text, "current / total"
    pub fn caption(&self) -> String {
        match &self.session {
            Some(s) => format!("{} / {}", s.index + 1, s.images.len()),
            None => String::new(),
        }
    }

    /// Transform to render with: (natural size, zoom, offset).
    /// None while the current image is still loading.
    pub fn transform(&self) -> Option<(Vector2<f32>, f32, Vector2<f32>)> {
        let session = self.session.as_ref()?;
        let natural = session.natural?;
        Some((natural, session.zoom, session.offset))
    }

    #[cfg(test)]
    fn zoom(&self) -> f32 {
        self.session.as_ref().map(|s| s.zoom).unwrap_or(0.0)
    }
}

impl Session {
    /// Previous and next sources, for prefetch on load
    fn neighbors(&self) -> Vec<PathBuf> {
        let len = self.images.len();
        if len < 2 {
            return Vec::new();
        }
        let prev = (self.index + len - 1) % len;
        let next = (self.index + 1) % len;
        let mut out = vec![self.images[prev].clone()];
        if next != prev {
            out.push(self.images[next].clone());
        }
        out
    }

    /// Center the image when it fits the stage at the current zoom,
    /// otherwise soft-clamp the offset
    fn recenter_or_clamp(&mut self, natural: Vector2<f32>, stage: Vector2<f32>) {
        if geometry::fits(natural, self.zoom, stage) {
            self.offset = geometry::centered_offset(natural, self.zoom, stage);
        } else {
            self.offset = geometry::clamp_offsets(
                natural,
                self.zoom,
                stage,
                self.offset,
                geometry::SLACK_FRACTION,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STAGE: Vector2<f32> = Vector2 { x: 900.0, y: 700.0 };

    fn sources(n: usize) -> Vec<PathBuf> {
        (0..n).map(|i| PathBuf::from(format!("img-{}.jpg", i))).collect()
    }

    fn open_loaded(n: usize, start: usize, natural: Vector2<f32>) -> ImageViewer {
        let mut viewer = ImageViewer::new();
        viewer.open(sources(n), start, 0);
        viewer.image_loaded(natural, STAGE);
        viewer
    }

    #[test]
    fn test_open_empty_sequence_is_a_no_op() {
        let mut viewer = ImageViewer::new();
        assert_eq!(viewer.open(Vec::new(), 0, 0), ViewerEvent::None);
        assert!(!viewer.is_open());
    }

    #[test]
    fn test_open_clamps_start_index() {
        let mut viewer = ImageViewer::new();
        let event = viewer.open(sources(3), 17, 2);
        assert_eq!(event, ViewerEvent::Load(PathBuf::from("img-2.jpg")));
        assert_eq!(viewer.index(), Some(2));
    }

    #[test]
    fn test_navigation_is_circular() {
        let mut viewer = ImageViewer::new();
        viewer.open(sources(3), 0, 0);
        viewer.navigate(-1);
        assert_eq!(viewer.index(), Some(2));
        viewer.navigate(1);
        assert_eq!(viewer.index(), Some(0));
    }

    #[test]
    fn test_next_twice_from_middle_wraps() {
        // 3-image sequence starting at index 1: next, next lands on 0
        let mut viewer = ImageViewer::new();
        viewer.open(sources(3), 1, 0);
        viewer.navigate(1);
        viewer.navigate(1);
        assert_eq!(viewer.index(), Some(0));
    }

    #[test]
    fn test_small_image_opens_at_natural_size_centered() {
        let viewer = open_loaded(1, 0, Vector2::new(400.0, 300.0));
        let (natural, zoom, offset) = viewer.transform().unwrap();
        assert_eq!(zoom, 1.0);
        assert_eq!(offset, geometry::centered_offset(natural, 1.0, STAGE));
    }

    #[test]
    fn test_large_image_opens_at_fit_scale() {
        let viewer = open_loaded(1, 0, Vector2::new(1800.0, 1400.0));
        let (_, zoom, _) = viewer.transform().unwrap();
        assert!((zoom - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_zoom_stays_within_bounds() {
        let mut viewer = open_loaded(1, 0, Vector2::new(1800.0, 1400.0));
        let point = Vector2::new(450.0, 350.0);
        for _ in 0..100 {
            viewer.zoom_at(point, WHEEL_ZOOM_IN, STAGE);
        }
        assert!(viewer.zoom() <= MAX_ZOOM);
        for _ in 0..100 {
            viewer.zoom_at(point, WHEEL_ZOOM_OUT, STAGE);
        }
        assert!(viewer.zoom() >= 0.5 - 1e-6);
    }

    #[test]
    fn test_toggle_zoom_in_then_reset() {
        let mut viewer = open_loaded(1, 0, Vector2::new(1800.0, 1400.0));
        let point = Vector2::new(450.0, 350.0);
        let fitted = viewer.zoom();
        viewer.toggle_zoom(point, STAGE);
        assert!((viewer.zoom() - TOGGLE_TARGET_ZOOM).abs() < 1e-4);
        viewer.toggle_zoom(point, STAGE);
        assert!((viewer.zoom() - fitted).abs() < 1e-4);
    }

    #[test]
    fn test_pan_ignored_when_image_fits() {
        let mut viewer = open_loaded(1, 0, Vector2::new(400.0, 300.0));
        assert!(!viewer.pan_start(Vector2::new(100.0, 100.0), STAGE));
        assert!(!viewer.is_dragging());
    }

    #[test]
    fn test_pan_moves_and_clamps_when_zoomed() {
        let mut viewer = open_loaded(1, 0, Vector2::new(1800.0, 1400.0));
        // Zoom in past fit so the image overflows the stage
        viewer.zoom_at(Vector2::new(450.0, 350.0), 4.0, STAGE);
        assert!(viewer.pan_start(Vector2::new(450.0, 350.0), STAGE));
        viewer.pan_move(Vector2::new(-5000.0, -5000.0), STAGE);
        let (natural, zoom, offset) = viewer.transform().unwrap();
        let slack = STAGE * geometry::SLACK_FRACTION;
        assert!(offset.x >= STAGE.x - natural.x * zoom - slack.x - 1e-3);
        assert!(offset.y >= STAGE.y - natural.y * zoom - slack.y - 1e-3);
        viewer.pan_end();
        assert!(!viewer.is_dragging());
    }

    #[test]
    fn test_close_returns_focus_to_trigger() {
        let mut viewer = ImageViewer::new();
        viewer.open(sources(2), 0, 7);
        assert_eq!(viewer.close(), ViewerEvent::Closed { trigger_card: 7 });
        assert!(!viewer.is_open());
        // Closing again is a no-op
        assert_eq!(viewer.close(), ViewerEvent::None);
    }

    #[test]
    fn test_late_image_result_after_close_is_harmless() {
        let mut viewer = ImageViewer::new();
        viewer.open(sources(2), 0, 0);
        viewer.close();
        let prefetch = viewer.image_loaded(Vector2::new(800.0, 600.0), STAGE);
        assert!(prefetch.is_empty());
        assert!(!viewer.is_open());
    }

    #[test]
    fn test_prefetch_targets_are_the_neighbors() {
        let mut viewer = ImageViewer::new();
        viewer.open(sources(3), 1, 0);
        let prefetch = viewer.image_loaded(Vector2::new(800.0, 600.0), STAGE);
        assert_eq!(
            prefetch,
            vec![PathBuf::from("img-0.jpg"), PathBuf::from("img-2.jpg")]
        );
    }
}
