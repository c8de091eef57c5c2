use std::time::Duration;

/// Displacement (px, either axis) past which a gesture becomes a drag.
pub const DRAG_THRESHOLD_PX: i32 = 10;

/// How long the pointer must stay down, without drifting past the drag
/// threshold, before a long-press starts.
pub const LONG_PRESS_WINDOW: Duration = Duration::from_millis(500);

/// Actionable intent produced from a pointer-event sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Gesture {
    /// Pointer released without dragging or long-pressing.
    Tap,
    /// Pointer moved past the threshold; reposition the control.
    Drag { dx: i32, dy: i32 },
    /// Drag finished; the final position should be persisted.
    DragEnd { x: i32, y: i32 },
    /// The long-press window elapsed with the pointer still.
    LongPressStart,
    /// Pointer released after a long-press started.
    LongPressRelease,
    /// The gesture was cancelled mid-long-press.
    CancelRecording,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// No pointer down.
    Rest,
    /// Down received, long-press armed, below drag threshold.
    Armed,
    /// Threshold exceeded; tracking the pointer.
    Dragging,
    /// Long-press fired; recording until up/cancel.
    LongPress,
}

/// Classifies raw pointer events into gestures.
///
/// Timer-free: `on_down` tells the caller how long to sleep before calling
/// `long_press_elapsed`, and `long_press_armed` reports whether that sleep
/// is still relevant. Drag detection runs on every move before anything
/// else, so a drag always disarms the window before it can fire.
pub struct GestureClassifier {
    phase: Phase,
    /// Pointer position at Down.
    origin: (i32, i32),
    /// Control position at Down; drags reposition relative to this.
    control_origin: (i32, i32),
    control: (i32, i32),
}

impl GestureClassifier {
    pub fn new(control_x: i32, control_y: i32) -> Self {
        Self {
            phase: Phase::Rest,
            origin: (0, 0),
            control_origin: (control_x, control_y),
            control: (control_x, control_y),
        }
    }

    /// Current control position, updated by drags.
    pub fn control_position(&self) -> (i32, i32) {
        self.control
    }

    pub fn long_press_armed(&self) -> bool {
        self.phase == Phase::Armed
    }

    /// Pointer down: capture the origin and arm the long-press window.
    /// Returns how long the caller should wait before `long_press_elapsed`.
    pub fn on_down(&mut self, x: i32, y: i32) -> Duration {
        self.phase = Phase::Armed;
        self.origin = (x, y);
        self.control_origin = self.control;
        LONG_PRESS_WINDOW
    }

    /// Pointer moved. Past the threshold this disarms the long-press window
    /// and yields a reposition for this and every later move of the gesture.
    pub fn on_move(&mut self, x: i32, y: i32) -> Option<Gesture> {
        let dx = x - self.origin.0;
        let dy = y - self.origin.1;

        match self.phase {
            Phase::Armed if dx.abs() > DRAG_THRESHOLD_PX || dy.abs() > DRAG_THRESHOLD_PX => {
                self.phase = Phase::Dragging;
                self.control = (self.control_origin.0 + dx, self.control_origin.1 + dy);
                Some(Gesture::Drag { dx, dy })
            }
            Phase::Dragging => {
                self.control = (self.control_origin.0 + dx, self.control_origin.1 + dy);
                Some(Gesture::Drag { dx, dy })
            }
            _ => None,
        }
    }

    /// The caller's long-press timer fired. Yields a start only if the
    /// window is still armed; a stale timer (drag or up since) is ignored.
    pub fn long_press_elapsed(&mut self) -> Option<Gesture> {
        if self.phase == Phase::Armed {
            self.phase = Phase::LongPress;
            Some(Gesture::LongPressStart)
        } else {
            None
        }
    }

    pub fn on_up(&mut self) -> Option<Gesture> {
        let gesture = match self.phase {
            Phase::LongPress => Some(Gesture::LongPressRelease),
            Phase::Armed => Some(Gesture::Tap),
            Phase::Dragging => Some(Gesture::DragEnd {
                x: self.control.0,
                y: self.control.1,
            }),
            Phase::Rest => None,
        };
        self.phase = Phase::Rest;
        gesture
    }

    pub fn on_cancel(&mut self) -> Option<Gesture> {
        let gesture = match self.phase {
            Phase::LongPress => Some(Gesture::CancelRecording),
            _ => None,
        };
        self.phase = Phase::Rest;
        gesture
    }
}
