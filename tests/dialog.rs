//! Dialog engine integration tests
//!
//! Drives the capture loop with scripted sources and recognizers, so the
//! full state machine runs without audio hardware. Loops end deterministically
//! when the scripted frames run out and the read retry limit trips.

use std::path::Path;
use std::time::{Duration, Instant};

use hark_dialog::config::{DialogConfig, UplinkCodec};
use hark_dialog::uplink::StreamingUplink;
use hark_dialog::{AudioFrameSource, DialogEngine, DialogHandle, SourceFactory};

mod common;

use common::{MockSessionFactory, RecordingPlayer, ScriptedRecognizer, ScriptedSource, frame};

fn test_config(dir: &Path) -> DialogConfig {
    DialogConfig {
        recording_path: dir.join("command.wav"),
        encoded_path: dir.join("command.flac"),
        tick_interval: Duration::ZERO,
        ..DialogConfig::default()
    }
}

fn source_factory(source: ScriptedSource) -> SourceFactory {
    Box::new(move || Ok(Box::new(source) as Box<dyn AudioFrameSource>))
}

/// Wait for the capture thread to end on its own (scripted frames exhausted)
fn wait_until_finished(handle: &DialogHandle) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while handle.is_running() && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(5));
    }
    assert!(!handle.is_running(), "capture loop should have ended");
}

#[cfg(unix)]
fn write_script(dir: &Path, body: &str) -> std::path::PathBuf {
    use std::io::Write;
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("processcmd.sh");
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(file, "#!/bin/sh\n{body}").unwrap();
    let mut perms = file.metadata().unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path
}

#[test]
fn test_keyword_accepted_plays_prompt_and_opens_window() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let please_say = config.prompts.please_say.clone();

    let recognizer = ScriptedRecognizer::new(vec![true, false], vec![Some("HUMIX".to_string())]);
    let player = RecordingPlayer::new();
    let played = player.played();

    let engine = DialogEngine::new(
        config,
        source_factory(ScriptedSource::silent(2)),
        Box::new(recognizer),
        Box::new(player),
    );
    let (handle, mut commands) = engine.start().unwrap();

    wait_until_finished(&handle);
    assert!(handle.stop().is_err(), "exhausted source aborts the loop");

    assert_eq!(*played.lock().unwrap(), vec![please_say]);
    assert!(commands.try_recv().is_err(), "no command was spoken");
}

#[test]
fn test_keyword_mismatch_returns_to_ready() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());

    let recognizer =
        ScriptedRecognizer::new(vec![true, false], vec![Some("not the keyword".to_string())]);
    let player = RecordingPlayer::new();
    let played = player.played();

    let engine = DialogEngine::new(
        config,
        source_factory(ScriptedSource::silent(2)),
        Box::new(recognizer),
        Box::new(player),
    );
    let (handle, mut commands) = engine.start().unwrap();

    wait_until_finished(&handle);
    assert!(handle.stop().is_err());

    assert!(played.lock().unwrap().is_empty(), "no prompt on a mismatch");
    assert!(commands.try_recv().is_err());
}

#[cfg(unix)]
#[test]
fn test_local_command_recognized_via_script() {
    let dir = tempfile::tempdir().unwrap();
    let script = write_script(dir.path(), "echo 'turn on light'");
    let config = DialogConfig {
        command_processor: script,
        ..test_config(dir.path())
    };
    let please_say = config.prompts.please_say.clone();
    let processing = config.prompts.processing.clone();
    let recording_path = config.recording_path.clone();

    // Keyword over two ticks, then a two-frame command utterance
    let frames = vec![frame(0), frame(0), frame(5), frame(6), frame(0)];
    let recognizer = ScriptedRecognizer::new(
        vec![true, false, true, true, false],
        vec![Some("HUMIX".to_string())],
    );
    let player = RecordingPlayer::new();
    let played = player.played();

    let engine = DialogEngine::new(
        config,
        source_factory(ScriptedSource::new(frames)),
        Box::new(recognizer),
        Box::new(player),
    );
    let (handle, mut commands) = engine.start().unwrap();

    wait_until_finished(&handle);
    assert!(handle.stop().is_err());

    assert_eq!(commands.try_recv().unwrap(), "turn on light");
    assert_eq!(*played.lock().unwrap(), vec![please_say, processing]);

    // The recording holds exactly the two command frames
    let mut reader = hound::WavReader::open(&recording_path).unwrap();
    assert_eq!(reader.spec().channels, 1);
    assert_eq!(reader.spec().sample_rate, 16_000);
    let samples: Vec<i16> = reader.samples::<i16>().map(Result::unwrap).collect();
    assert_eq!(samples.len(), 2 * common::TICK_SAMPLES);
    assert!(samples[..common::TICK_SAMPLES].iter().all(|&s| s == 5));
    assert!(samples[common::TICK_SAMPLES..].iter().all(|&s| s == 6));
}

#[test]
fn test_idle_window_closes_after_full_wait_budget() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let please_say = config.prompts.please_say.clone();
    let goodbye = config.prompts.goodbye.clone();

    // Two keyword ticks, then exactly 100 ticks/cycle * 20 cycles of waiting
    let recognizer = ScriptedRecognizer::new(vec![true, false], vec![Some("HUMIX".to_string())]);
    let player = RecordingPlayer::new();
    let played = player.played();

    let engine = DialogEngine::new(
        config,
        source_factory(ScriptedSource::silent(2 + 2000)),
        Box::new(recognizer),
        Box::new(player),
    );
    let (handle, _commands) = engine.start().unwrap();

    wait_until_finished(&handle);
    assert!(handle.stop().is_err());

    assert_eq!(*played.lock().unwrap(), vec![please_say, goodbye]);
}

#[test]
fn test_idle_window_still_open_one_tick_short() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let please_say = config.prompts.please_say.clone();

    let recognizer = ScriptedRecognizer::new(vec![true, false], vec![Some("HUMIX".to_string())]);
    let player = RecordingPlayer::new();
    let played = player.played();

    let engine = DialogEngine::new(
        config,
        source_factory(ScriptedSource::silent(2 + 1999)),
        Box::new(recognizer),
        Box::new(player),
    );
    let (handle, _commands) = engine.start().unwrap();

    wait_until_finished(&handle);
    assert!(handle.stop().is_err());

    assert_eq!(
        *played.lock().unwrap(),
        vec![please_say],
        "goodbye must not play before the full idle budget"
    );
}

#[test]
fn test_wait_counter_carries_across_command() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let please_say = config.prompts.please_say.clone();
    let processing = config.prompts.processing.clone();
    let goodbye = config.prompts.goodbye.clone();

    // 2 keyword ticks, 30 waiting ticks, a 3-tick command, then the idle
    // budget minus the 30 ticks already spent in the current cycle
    let mut speech = vec![true, false];
    speech.extend(std::iter::repeat(false).take(30));
    speech.extend([true, true, false]);
    let total = 2 + 30 + 3 + (2000 - 30);
    let recognizer = ScriptedRecognizer::new(speech, vec![Some("HUMIX".to_string())]);
    let player = RecordingPlayer::new();
    let played = player.played();

    let engine = DialogEngine::new(
        config,
        source_factory(ScriptedSource::silent(total)),
        Box::new(recognizer),
        Box::new(player),
    );
    let (handle, _commands) = engine.start().unwrap();

    wait_until_finished(&handle);
    assert!(handle.stop().is_err());

    assert_eq!(
        *played.lock().unwrap(),
        vec![please_say, processing, goodbye],
        "ticks waited before the command count against the idle budget"
    );
}

#[tokio::test]
async fn test_remote_command_streams_frames_and_trailer() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path());
    config.uplink.codec = UplinkCodec::Pcm;

    let (factory, probe) = MockSessionFactory::new();
    let uplink = StreamingUplink::spawn(&config.uplink, config.sample_rate, factory).unwrap();

    let frames = vec![frame(0), frame(0), frame(5), frame(6), frame(7)];
    let recognizer = ScriptedRecognizer::new(
        vec![true, false, true, true, false],
        vec![Some("HUMIX".to_string())],
    );
    let player = RecordingPlayer::new();

    let engine = DialogEngine::new(
        config,
        source_factory(ScriptedSource::new(frames)),
        Box::new(recognizer),
        Box::new(player),
    )
    .with_uplink(uplink);
    let (handle, _commands) = engine.start().unwrap();

    // Three command frames, then the one-second silence trailer
    let deadline = Instant::now() + Duration::from_secs(5);
    while (probe.sent_chunks().len() < 4 || probe.close_count() < 1) && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let pcm = |samples: &[i16]| -> Vec<u8> {
        samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    };
    assert_eq!(
        probe.sent_chunks(),
        vec![
            pcm(&frame(5)),
            pcm(&frame(6)),
            pcm(&frame(7)),
            pcm(&[0_i16; 16_000]),
        ]
    );
    assert_eq!(
        probe.connect_count(),
        1,
        "reconnect while live must not open a second session"
    );
    assert_eq!(probe.close_count(), 1, "session closed when the loop wound down");

    while handle.is_running() && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(handle.stop().is_err());
}
