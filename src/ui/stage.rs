/// Canvas renderer for the image viewer stage
///
/// Draws the current image at `translate(offset) scale(zoom)` and converts
/// pointer input into viewer messages: wheel for pointer-centered zoom,
/// drag for panning, double-press for the zoom toggle. All coordinates sent
/// upward are stage-relative.

use std::time::{Duration, Instant};

use cgmath::Vector2;
use iced::mouse::{self, Cursor};
use iced::widget::canvas::{self, Program};
use iced::widget::image::Handle;
use iced::{Point, Rectangle, Renderer, Size, Theme};

use crate::viewer::{WHEEL_ZOOM_IN, WHEEL_ZOOM_OUT};
use crate::Message;

/// Two presses this close together (in time and space) count as a
/// zoom-toggle double click
const DOUBLE_PRESS_WINDOW: Duration = Duration::from_millis(400);
const DOUBLE_PRESS_SLOP: f32 = 8.0;

/// The viewer stage: one image with its current transform
pub struct ViewerStage {
    handle: Handle,
    natural: Vector2<f32>,
    zoom: f32,
    offset: Vector2<f32>,
}

impl ViewerStage {
    pub fn new(handle: Handle, natural: Vector2<f32>, zoom: f32, offset: Vector2<f32>) -> Self {
        ViewerStage {
            handle,
            natural,
            zoom,
            offset,
        }
    }
}

/// Pointer-interaction state kept by the canvas between events
#[derive(Debug, Clone, Default)]
pub struct StageState {
    last_press: Option<(Instant, Point)>,
}

impl Program<Message> for ViewerStage {
    type State = StageState;

    fn draw(
        &self,
        _state: &Self::State,
        renderer: &Renderer,
        _theme: &Theme,
        bounds: Rectangle,
        _cursor: Cursor,
    ) -> Vec<canvas::Geometry> {
        let mut frame = canvas::Frame::new(renderer, bounds.size());
        let placement = Rectangle::new(
            Point::new(self.offset.x, self.offset.y),
            Size::new(self.natural.x * self.zoom, self.natural.y * self.zoom),
        );
        frame.draw_image(placement, &self.handle);
        vec![frame.into_geometry()]
    }

    fn update(
        &self,
        state: &mut Self::State,
        event: canvas::Event,
        bounds: Rectangle,
        cursor: Cursor,
    ) -> (canvas::event::Status, Option<Message>) {
        match event {
            // Mouse wheel: pointer-centered zoom
            canvas::Event::Mouse(mouse::Event::WheelScrolled { delta }) => {
                let Some(point) = cursor.position_in(bounds) else {
                    return (canvas::event::Status::Ignored, None);
                };
                let scroll = match delta {
                    mouse::ScrollDelta::Lines { y, .. } => y,
                    mouse::ScrollDelta::Pixels { y, .. } => y,
                };
                let factor = if scroll > 0.0 {
                    WHEEL_ZOOM_IN
                } else {
                    WHEEL_ZOOM_OUT
                };
                (
                    canvas::event::Status::Captured,
                    Some(Message::StageZoom {
                        point: Vector2::new(point.x, point.y),
                        factor,
                    }),
                )
            }

            // Button press: either the second half of a double press
            // (zoom toggle) or the start of a drag
            canvas::Event::Mouse(mouse::Event::ButtonPressed(mouse::Button::Left)) => {
                let Some(point) = cursor.position_in(bounds) else {
                    return (canvas::event::Status::Ignored, None);
                };
                let now = Instant::now();
                let double = state.last_press.is_some_and(|(at, prev)| {
                    now.duration_since(at) <= DOUBLE_PRESS_WINDOW
                        && prev.distance(point) <= DOUBLE_PRESS_SLOP
                });
                state.last_press = if double { None } else { Some((now, point)) };
                let message = if double {
                    Message::StageToggleZoom {
                        point: Vector2::new(point.x, point.y),
                    }
                } else {
                    Message::StagePanStart {
                        point: Vector2::new(point.x, point.y),
                    }
                };
                (canvas::event::Status::Captured, Some(message))
            }

            // Move: pan updates track the cursor even slightly outside the
            // stage, so a fast drag does not stutter at the edge
            canvas::Event::Mouse(mouse::Event::CursorMoved { .. }) => {
                if let Some(position) = cursor.position() {
                    let point = Point::new(position.x - bounds.x, position.y - bounds.y);
                    return (
                        canvas::event::Status::Captured,
                        Some(Message::StagePanMove {
                            point: Vector2::new(point.x, point.y),
                        }),
                    );
                }
                (canvas::event::Status::Ignored, None)
            }

            canvas::Event::Mouse(mouse::Event::ButtonReleased(mouse::Button::Left)) => {
                (canvas::event::Status::Captured, Some(Message::StagePanEnd))
            }

            _ => (canvas::event::Status::Ignored, None),
        }
    }
}
