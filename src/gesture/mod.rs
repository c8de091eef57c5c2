mod classifier;

pub use classifier::{Gesture, GestureClassifier, DRAG_THRESHOLD_PX, LONG_PRESS_WINDOW};
