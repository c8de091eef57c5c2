// Integration tests for pointer-gesture classification
//
// These tests drive the classifier through raw Down/Move/Up/Cancel
// sequences and verify the gesture it settles on.

use voice_overlay::gesture::{Gesture, GestureClassifier, DRAG_THRESHOLD_PX, LONG_PRESS_WINDOW};

#[test]
fn test_tap_on_quick_release() {
    let mut classifier = GestureClassifier::new(50, 200);

    let window = classifier.on_down(100, 100);
    assert_eq!(window, LONG_PRESS_WINDOW);
    assert!(classifier.long_press_armed());

    assert_eq!(classifier.on_up(), Some(Gesture::Tap));
    assert!(!classifier.long_press_armed());
}

#[test]
fn test_small_jitter_still_taps() {
    let mut classifier = GestureClassifier::new(50, 200);

    classifier.on_down(100, 100);
    // Move within the threshold in both axes
    assert_eq!(classifier.on_move(105, 95), None);
    assert_eq!(
        classifier.on_move(100 + DRAG_THRESHOLD_PX, 100 - DRAG_THRESHOLD_PX),
        None
    );

    assert_eq!(classifier.on_up(), Some(Gesture::Tap));
}

#[test]
fn test_drag_past_threshold_repositions_control() {
    let mut classifier = GestureClassifier::new(50, 200);

    classifier.on_down(100, 100);
    let gesture = classifier.on_move(100 + DRAG_THRESHOLD_PX + 5, 100);
    assert_eq!(gesture, Some(Gesture::Drag { dx: 15, dy: 0 }));

    // Later moves keep reporting, even back inside the threshold
    assert_eq!(classifier.on_move(103, 102), Some(Gesture::Drag { dx: 3, dy: 2 }));

    assert_eq!(classifier.on_up(), Some(Gesture::DragEnd { x: 53, y: 202 }));
    assert_eq!(classifier.control_position(), (53, 202));
}

#[test]
fn test_drag_disarms_long_press() {
    let mut classifier = GestureClassifier::new(50, 200);

    classifier.on_down(100, 100);
    classifier.on_move(130, 100);
    assert!(!classifier.long_press_armed());

    // A timer firing after the drag started must be ignored
    assert_eq!(classifier.long_press_elapsed(), None);
}

#[test]
fn test_long_press_start_and_release() {
    let mut classifier = GestureClassifier::new(50, 200);

    classifier.on_down(100, 100);
    assert_eq!(classifier.long_press_elapsed(), Some(Gesture::LongPressStart));
    assert_eq!(classifier.on_up(), Some(Gesture::LongPressRelease));
}

#[test]
fn test_long_press_timer_fires_once() {
    let mut classifier = GestureClassifier::new(50, 200);

    classifier.on_down(100, 100);
    assert_eq!(classifier.long_press_elapsed(), Some(Gesture::LongPressStart));
    assert_eq!(classifier.long_press_elapsed(), None);
}

#[test]
fn test_cancel_during_long_press_cancels_recording() {
    let mut classifier = GestureClassifier::new(50, 200);

    classifier.on_down(100, 100);
    classifier.long_press_elapsed();
    assert_eq!(classifier.on_cancel(), Some(Gesture::CancelRecording));
}

#[test]
fn test_cancel_before_long_press_is_silent() {
    let mut classifier = GestureClassifier::new(50, 200);

    classifier.on_down(100, 100);
    assert_eq!(classifier.on_cancel(), None);

    // After cancel the classifier is back at rest
    assert_eq!(classifier.on_up(), None);
}

#[test]
fn test_stale_up_without_down() {
    let mut classifier = GestureClassifier::new(50, 200);
    assert_eq!(classifier.on_up(), None);
}

#[test]
fn test_second_gesture_starts_from_moved_control() {
    let mut classifier = GestureClassifier::new(0, 0);

    classifier.on_down(10, 10);
    classifier.on_move(40, 10);
    assert_eq!(classifier.on_up(), Some(Gesture::DragEnd { x: 30, y: 0 }));

    // Next drag is relative to the new control position
    classifier.on_down(200, 200);
    classifier.on_move(220, 200);
    assert_eq!(classifier.on_up(), Some(Gesture::DragEnd { x: 50, y: 0 }));
}
