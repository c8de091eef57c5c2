// Integration tests for the overlay orchestration actor
//
// These tests run the full engine end to end: pointer gestures, the
// recording session over the synthetic backend, transcription against a
// local HTTP stub, refinement, history persistence, and the discarding
// of results that outlive their editor.

mod common;

use anyhow::Result;
use common::spawn_stub;
use std::time::Duration;
use tempfile::TempDir;
use voice_overlay::config::Settings;
use voice_overlay::history::HistoryLog;
use voice_overlay::overlay::{
    EditorSnapshot, OverlayEvent, OverlayHandle, OverlayService, PointerEvent,
};
use voice_overlay::session::RecorderState;
use voice_overlay::SettingsProvider;

struct TestRig {
    provider: SettingsProvider,
    history: HistoryLog,
    _temp_dir: TempDir,
}

fn test_rig(transcribe_url: Option<String>) -> Result<TestRig> {
    let temp_dir = TempDir::new()?;

    let mut settings = Settings::default();
    settings.overlay.auto_start_recording = false;
    settings.audio.capture_dir = temp_dir.path().join("captures");
    settings.history.log_path = temp_dir.path().join("history.log");
    settings.history.audio_dir = temp_dir.path().join("history-audio");
    if let Some(url) = transcribe_url {
        settings.transcription.api_url = url;
        settings.transcription.api_key = "test-key".to_string();
    }
    std::fs::create_dir_all(&settings.audio.capture_dir)?;

    let history = HistoryLog::new(&settings.history)?;
    Ok(TestRig {
        provider: SettingsProvider::new(settings),
        history,
        _temp_dir: temp_dir,
    })
}

/// Poll the actor until the snapshot satisfies the predicate.
async fn wait_for(
    handle: &OverlayHandle,
    what: &str,
    pred: impl Fn(&EditorSnapshot) -> bool,
) -> Result<EditorSnapshot> {
    for _ in 0..250 {
        let snapshot = handle.snapshot().await;
        if pred(&snapshot) {
            return Ok(snapshot);
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    anyhow::bail!("timed out waiting for: {}", what)
}

#[tokio::test]
async fn test_tap_opens_editor() -> Result<()> {
    let rig = test_rig(None)?;
    let handle = OverlayService::spawn(rig.provider, rig.history);

    let (x, y) = handle.snapshot().await.control_position;
    handle.send(OverlayEvent::Pointer(PointerEvent::Down { x, y }));
    handle.send(OverlayEvent::Pointer(PointerEvent::Up));

    let snapshot = wait_for(&handle, "editor open", |s| s.editor.is_editor_open).await?;
    assert!(!snapshot.editor.is_recording);
    handle.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_editor_auto_starts_recording_when_configured() -> Result<()> {
    let rig = test_rig(None)?;
    rig.provider.update(|s| s.overlay.auto_start_recording = true);
    let handle = OverlayService::spawn(rig.provider, rig.history);

    handle.send(OverlayEvent::OpenEditor);
    let snapshot = wait_for(&handle, "recording started", |s| s.editor.is_recording).await?;
    assert_eq!(snapshot.recorder_state, RecorderState::Recording);
    assert!(snapshot.editor.status.starts_with("Recording"));

    handle.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_record_stop_transcribe_appends_text() -> Result<()> {
    let url = spawn_stub(200, r#"{"text": "hello world"}"#).await?;
    let rig = test_rig(Some(url))?;
    let handle = OverlayService::spawn(rig.provider.clone(), rig.history);

    handle.send(OverlayEvent::OpenEditor);
    handle.send(OverlayEvent::StartRecording);
    wait_for(&handle, "recording", |s| s.editor.is_recording).await?;

    handle.send(OverlayEvent::StopRecording);
    let snapshot = wait_for(&handle, "transcript", |s| {
        !s.editor.is_processing && s.editor.status == "Transcribed"
    })
    .await?;
    assert_eq!(snapshot.editor.text, "hello world");
    assert_eq!(snapshot.recorder_state, RecorderState::Idle);

    // The temp capture file is deleted after the upload
    let capture_dir = rig.provider.snapshot().audio.capture_dir;
    let leftovers: Vec<_> = std::fs::read_dir(&capture_dir)?.collect();
    assert!(leftovers.is_empty(), "Capture dir should be empty, found {:?}", leftovers);

    handle.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_second_transcript_separated_by_newline() -> Result<()> {
    let url = spawn_stub(200, r#"{"text": "hello world"}"#).await?;
    let rig = test_rig(Some(url))?;
    let handle = OverlayService::spawn(rig.provider, rig.history);

    handle.send(OverlayEvent::OpenEditor);
    handle.send(OverlayEvent::SetText("first paragraph".to_string()));
    handle.send(OverlayEvent::StartRecording);
    wait_for(&handle, "recording", |s| s.editor.is_recording).await?;

    handle.send(OverlayEvent::StopRecording);
    let snapshot = wait_for(&handle, "appended transcript", |s| {
        s.editor.status == "Transcribed"
    })
    .await?;
    assert_eq!(snapshot.editor.text, "first paragraph\nhello world");

    handle.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_transcription_failure_reports_and_resets() -> Result<()> {
    let url = spawn_stub(401, r#"{"error": "bad key"}"#).await?;
    let rig = test_rig(Some(url))?;
    let handle = OverlayService::spawn(rig.provider, rig.history);

    handle.send(OverlayEvent::OpenEditor);
    handle.send(OverlayEvent::StartRecording);
    wait_for(&handle, "recording", |s| s.editor.is_recording).await?;

    handle.send(OverlayEvent::StopRecording);
    let snapshot = wait_for(&handle, "failure status", |s| {
        !s.editor.is_processing && s.editor.status.starts_with("Transcription failed")
    })
    .await?;
    assert_eq!(snapshot.editor.text, "", "Failed transcription must not change text");

    // The engine keeps serving: a new recording can start
    handle.send(OverlayEvent::StartRecording);
    wait_for(&handle, "recording again", |s| s.editor.is_recording).await?;

    handle.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_cancel_discards_recording() -> Result<()> {
    let rig = test_rig(None)?;
    let handle = OverlayService::spawn(rig.provider.clone(), rig.history);

    handle.send(OverlayEvent::OpenEditor);
    handle.send(OverlayEvent::StartRecording);
    wait_for(&handle, "recording", |s| s.editor.is_recording).await?;

    handle.send(OverlayEvent::CancelRecording);
    let snapshot = wait_for(&handle, "cancelled", |s| !s.editor.is_recording).await?;
    assert_eq!(snapshot.recorder_state, RecorderState::Idle);
    assert_eq!(snapshot.editor.status, "Ready");

    // Nothing left behind and nothing was transcribed
    let capture_dir = rig.provider.snapshot().audio.capture_dir;
    assert_eq!(std::fs::read_dir(&capture_dir)?.count(), 0);

    handle.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_pause_and_resume() -> Result<()> {
    let rig = test_rig(None)?;
    let handle = OverlayService::spawn(rig.provider, rig.history);

    handle.send(OverlayEvent::OpenEditor);
    handle.send(OverlayEvent::StartRecording);
    wait_for(&handle, "recording", |s| s.editor.is_recording).await?;

    handle.send(OverlayEvent::PauseRecording);
    let snapshot = wait_for(&handle, "paused", |s| s.editor.is_paused).await?;
    assert_eq!(snapshot.recorder_state, RecorderState::Paused);
    assert!(snapshot.editor.status.starts_with("Paused"));

    handle.send(OverlayEvent::ResumeRecording);
    let snapshot = wait_for(&handle, "resumed", |s| !s.editor.is_paused).await?;
    assert_eq!(snapshot.recorder_state, RecorderState::Recording);

    handle.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_improve_replaces_text_wholesale() -> Result<()> {
    let completion_url = spawn_stub(
        200,
        r#"{"choices": [{"message": {"role": "assistant", "content": "This is a test."}}]}"#,
    )
    .await?;
    let rig = test_rig(None)?;
    rig.provider.update(|s| {
        s.completion.url = completion_url;
        s.transcription.api_key = "test-key".to_string();
    });
    let handle = OverlayService::spawn(rig.provider, rig.history);

    handle.send(OverlayEvent::OpenEditor);
    handle.send(OverlayEvent::SetText("this is a test".to_string()));
    handle.send(OverlayEvent::Improve);

    let snapshot = wait_for(&handle, "improved text", |s| {
        s.editor.status == "Text improved"
    })
    .await?;
    assert_eq!(snapshot.editor.text, "This is a test.");
    assert!(!snapshot.editor.is_processing);

    handle.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_improve_with_empty_text_is_refused() -> Result<()> {
    let rig = test_rig(None)?;
    let handle = OverlayService::spawn(rig.provider, rig.history);

    handle.send(OverlayEvent::OpenEditor);
    handle.send(OverlayEvent::Improve);

    let snapshot = wait_for(&handle, "refusal", |s| {
        s.editor.status == "No text to improve"
    })
    .await?;
    assert!(!snapshot.editor.is_processing);

    handle.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_voice_edit_modal_flow() -> Result<()> {
    // One stub speaks both wire shapes; the transcription client reads
    // "text" and the completion client reads "choices".
    let url = spawn_stub(
        200,
        r#"{"text": "change today to tomorrow", "choices": [{"message": {"role": "assistant", "content": "Buy milk tomorrow"}}]}"#,
    )
    .await?;
    let rig = test_rig(Some(url.clone()))?;
    rig.provider.update(|s| s.completion.url = url);
    let handle = OverlayService::spawn(rig.provider, rig.history);

    handle.send(OverlayEvent::OpenEditor);
    handle.send(OverlayEvent::SetText("Buy milk today".to_string()));
    handle.send(OverlayEvent::VoiceEdit);
    let snapshot = wait_for(&handle, "modal open", |s| s.modal_open).await?;
    assert_eq!(snapshot.editor.text, "Buy milk today");

    handle.send(OverlayEvent::ModalRecord);
    wait_for(&handle, "modal recording", |s| s.modal_recording).await?;

    handle.send(OverlayEvent::ModalStop);
    let snapshot = wait_for(&handle, "edit applied", |s| {
        s.editor.status == "Voice edit applied"
    })
    .await?;
    assert_eq!(snapshot.editor.text, "Buy milk tomorrow");
    assert!(!snapshot.modal_open);

    handle.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_voice_edit_modal_cancel_keeps_text() -> Result<()> {
    let rig = test_rig(None)?;
    rig.provider.update(|s| s.transcription.api_key = "test-key".to_string());
    let handle = OverlayService::spawn(rig.provider, rig.history);

    handle.send(OverlayEvent::OpenEditor);
    handle.send(OverlayEvent::SetText("untouched".to_string()));
    handle.send(OverlayEvent::VoiceEdit);
    wait_for(&handle, "modal open", |s| s.modal_open).await?;

    handle.send(OverlayEvent::ModalRecord);
    wait_for(&handle, "modal recording", |s| s.modal_recording).await?;

    handle.send(OverlayEvent::ModalCancel);
    let snapshot = wait_for(&handle, "modal closed", |s| !s.modal_open).await?;
    assert_eq!(snapshot.editor.text, "untouched");

    handle.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_voice_edit_requires_api_key() -> Result<()> {
    let rig = test_rig(None)?;
    let handle = OverlayService::spawn(rig.provider, rig.history);

    handle.send(OverlayEvent::OpenEditor);
    handle.send(OverlayEvent::SetText("some text".to_string()));
    handle.send(OverlayEvent::VoiceEdit);

    let snapshot = wait_for(&handle, "key refusal", |s| {
        s.editor.status.contains("API key")
    })
    .await?;
    assert!(!snapshot.modal_open);

    handle.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_close_editor_saves_text_to_history() -> Result<()> {
    let rig = test_rig(None)?;
    let history = rig.history.clone();
    let handle = OverlayService::spawn(rig.provider, rig.history);

    handle.send(OverlayEvent::OpenEditor);
    handle.send(OverlayEvent::SetText("remember this".to_string()));
    handle.send(OverlayEvent::CloseEditor);

    let snapshot = wait_for(&handle, "editor closed", |s| !s.editor.is_editor_open).await?;
    assert_eq!(snapshot.editor.text, "");

    let entries = history.list(None);
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].text, "remember this");

    handle.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_clear_text_saves_before_clearing() -> Result<()> {
    let rig = test_rig(None)?;
    let history = rig.history.clone();
    let handle = OverlayService::spawn(rig.provider, rig.history);

    handle.send(OverlayEvent::OpenEditor);
    handle.send(OverlayEvent::SetText("saved on clear".to_string()));
    handle.send(OverlayEvent::ClearText);

    let snapshot = wait_for(&handle, "cleared", |s| s.editor.text.is_empty()).await?;
    assert!(snapshot.editor.status.contains("saved to history"));
    assert_eq!(history.list(None)[0].text, "saved on clear");

    handle.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_take_text_stops_recording_first() -> Result<()> {
    let url = spawn_stub(200, r#"{"text": "dictated reply"}"#).await?;
    let rig = test_rig(Some(url))?;
    let handle = OverlayService::spawn(rig.provider, rig.history);

    handle.send(OverlayEvent::OpenEditor);
    handle.send(OverlayEvent::StartRecording);
    wait_for(&handle, "recording", |s| s.editor.is_recording).await?;

    let (reply_tx, reply_rx) = tokio::sync::oneshot::channel();
    handle.send(OverlayEvent::TakeText(reply_tx));

    let delivered = reply_rx.await?;
    assert_eq!(delivered, "dictated reply");

    // Delivery closes the editor
    let snapshot = wait_for(&handle, "editor closed", |s| !s.editor.is_editor_open).await?;
    assert_eq!(snapshot.editor.text, "");

    handle.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_drag_persists_button_position() -> Result<()> {
    let rig = test_rig(None)?;
    let provider = rig.provider.clone();
    let handle = OverlayService::spawn(rig.provider, rig.history);

    let (x0, y0) = handle.snapshot().await.control_position;
    handle.send(OverlayEvent::Pointer(PointerEvent::Down { x: 300, y: 300 }));
    handle.send(OverlayEvent::Pointer(PointerEvent::Move { x: 330, y: 290 }));
    handle.send(OverlayEvent::Pointer(PointerEvent::Up));

    let expected = (x0 + 30, y0 - 10);
    let snapshot = wait_for(&handle, "position moved", |s| s.control_position == expected).await?;
    assert!(!snapshot.editor.is_editor_open, "A drag must not open the editor");

    let saved = provider.snapshot().overlay;
    assert_eq!((saved.button_x, saved.button_y), expected);

    handle.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_long_press_quick_recording() -> Result<()> {
    let url = spawn_stub(200, r#"{"text": "quick note"}"#).await?;
    let rig = test_rig(Some(url))?;
    let handle = OverlayService::spawn(rig.provider, rig.history);

    let (x, y) = handle.snapshot().await.control_position;
    handle.send(OverlayEvent::Pointer(PointerEvent::Down { x, y }));

    // Hold past the long-press window; recording starts without the editor
    let snapshot = wait_for(&handle, "quick recording", |s| {
        s.recorder_state == RecorderState::Recording
    })
    .await?;
    assert!(!snapshot.editor.is_editor_open);

    handle.send(OverlayEvent::Pointer(PointerEvent::Up));
    let snapshot = wait_for(&handle, "quick transcript", |s| s.quick_transcript.is_some()).await?;
    assert_eq!(snapshot.quick_transcript.as_deref(), Some("quick note"));
    assert_eq!(snapshot.recorder_state, RecorderState::Idle);

    handle.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_drag_does_not_start_quick_recording() -> Result<()> {
    let rig = test_rig(None)?;
    let handle = OverlayService::spawn(rig.provider, rig.history);

    handle.send(OverlayEvent::Pointer(PointerEvent::Down { x: 100, y: 100 }));
    handle.send(OverlayEvent::Pointer(PointerEvent::Move { x: 150, y: 100 }));

    // Wait out the long-press window; the drag must have disarmed it
    tokio::time::sleep(Duration::from_millis(700)).await;
    let snapshot = handle.snapshot().await;
    assert_eq!(snapshot.recorder_state, RecorderState::Idle);

    handle.send(OverlayEvent::Pointer(PointerEvent::Up));
    handle.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_hold_with_editor_open_stays_a_tap() -> Result<()> {
    let rig = test_rig(None)?;
    let handle = OverlayService::spawn(rig.provider, rig.history);

    handle.send(OverlayEvent::OpenEditor);
    wait_for(&handle, "editor open", |s| s.editor.is_editor_open).await?;

    // Hold on the control well past the long-press window, no movement
    let (x, y) = handle.snapshot().await.control_position;
    handle.send(OverlayEvent::Pointer(PointerEvent::Down { x, y }));
    tokio::time::sleep(Duration::from_millis(700)).await;

    let snapshot = handle.snapshot().await;
    assert_eq!(
        snapshot.recorder_state,
        RecorderState::Idle,
        "Quick recording must not start while the editor is open"
    );

    handle.send(OverlayEvent::Pointer(PointerEvent::Up));
    tokio::time::sleep(Duration::from_millis(100)).await;

    let snapshot = handle.snapshot().await;
    assert!(snapshot.editor.is_editor_open);
    assert_eq!(snapshot.recorder_state, RecorderState::Idle);
    assert!(
        !snapshot.editor.status.starts_with("Error"),
        "Release must land as a tap, got status {:?}",
        snapshot.editor.status
    );

    handle.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_close_editor_discards_modal() -> Result<()> {
    let rig = test_rig(None)?;
    let provider = rig.provider.clone();
    provider.update(|s| s.transcription.api_key = "test-key".to_string());
    let handle = OverlayService::spawn(rig.provider, rig.history);

    handle.send(OverlayEvent::OpenEditor);
    handle.send(OverlayEvent::SetText("some text".to_string()));
    handle.send(OverlayEvent::VoiceEdit);
    wait_for(&handle, "modal open", |s| s.modal_open).await?;

    handle.send(OverlayEvent::ModalRecord);
    wait_for(&handle, "modal recording", |s| s.modal_recording).await?;

    handle.send(OverlayEvent::CloseEditor);
    let snapshot = wait_for(&handle, "editor closed", |s| !s.editor.is_editor_open).await?;
    assert!(!snapshot.modal_open, "Modal must not survive its editor");
    assert!(!snapshot.modal_recording);

    // The modal's capture was released, nothing left behind
    let capture_dir = provider.snapshot().audio.capture_dir;
    assert_eq!(std::fs::read_dir(&capture_dir)?.count(), 0);

    // Reopening starts without a modal
    handle.send(OverlayEvent::OpenEditor);
    let snapshot = wait_for(&handle, "reopened", |s| s.editor.is_editor_open).await?;
    assert!(!snapshot.modal_open);

    handle.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_result_arriving_after_close_is_discarded() -> Result<()> {
    let url = spawn_stub(200, r#"{"text": "too late"}"#).await?;
    let rig = test_rig(Some(url))?;
    let history = rig.history.clone();
    let handle = OverlayService::spawn(rig.provider, rig.history);

    handle.send(OverlayEvent::OpenEditor);
    handle.send(OverlayEvent::StartRecording);
    wait_for(&handle, "recording", |s| s.editor.is_recording).await?;

    // Close before the upload can possibly finish; both commands are
    // queued ahead of the network round trip's completion event.
    handle.send(OverlayEvent::StopRecording);
    handle.send(OverlayEvent::CloseEditor);

    tokio::time::sleep(Duration::from_millis(500)).await;
    let snapshot = handle.snapshot().await;
    assert_eq!(snapshot.editor.text, "", "Stale transcript must not land");
    assert!(!snapshot.editor.is_editor_open);

    // Reopening starts clean
    handle.send(OverlayEvent::OpenEditor);
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(handle.snapshot().await.editor.text, "");

    // Nothing was saved: the editor was empty at close
    assert_eq!(history.list(None).len(), 0);

    handle.shutdown().await;
    Ok(())
}
