use std::fs;
use std::sync::Arc;

use super::support::{file_names, source_file, ScriptedBackend, FRAGMENT_MS};
use crate::config::{GenerationRequest, LineRange, OutputFormat, TransformParams};
use crate::error::SpeakVaultError;
use crate::event_log::EventLog;
use crate::generator::{Generator, SUBTITLE_SILENCE_MS};
use crate::media::codec;
use crate::notification::MemoryProgressObserver;
use crate::progress::{RunEvent, RunStatus};

const TWO_SUBTITLES: &str = "1\n00:00:00,000 --> 00:00:01,000\nPierwszy napis\n\n2\n00:00:01,000 --> 00:00:02,000\nDrugi\nnapis\n";

fn wav_request(source: &std::path::Path, out: &std::path::Path) -> GenerationRequest {
    let mut request = GenerationRequest::new(source, out);
    request.format = OutputFormat::Wav;
    request
}

#[tokio::test]
async fn test_three_lines_split_mode_writes_three_files_in_order() {
    let input = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let source = source_file(input.path(), "lines.txt", "first\nsecond\nthird\n");

    let backend = ScriptedBackend::new();
    let calls = backend.calls();
    let observer = MemoryProgressObserver::new();

    let report = Generator::new(wav_request(&source, out.path()))
        .with_backend(Box::new(backend))
        .with_observer(Box::new(observer.clone()))
        .run()
        .await
        .unwrap();

    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(
        file_names(out.path()),
        vec!["output1 (1).wav", "output1 (2).wav", "output1 (3).wav"]
    );
    assert_eq!(*calls.lock().unwrap(), vec!["first", "second", "third"]);
    assert_eq!(report.files.len(), 3);
    assert_eq!(report.last_file, Some(out.path().join("output1 (3).wav")));
    assert_eq!(report.state.processed, 3);

    let lines = observer.lines();
    assert!(lines.contains(&"[33%] 1.1: first".to_string()));
    assert!(lines.contains(&"[100%] 3.1: third".to_string()));
    assert!(lines.contains(&"Saved: output1 (2).wav".to_string()));
}

#[tokio::test]
async fn test_subtitles_merged_into_single_file() {
    let input = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let source = source_file(input.path(), "film.srt", TWO_SUBTITLES);

    let backend = ScriptedBackend::new();
    let calls = backend.calls();
    let mut request = wav_request(&source, out.path());
    request.merge = true;

    let report = Generator::new(request)
        .with_backend(Box::new(backend))
        .run()
        .await
        .unwrap();

    assert_eq!(file_names(out.path()), vec!["output1 (1).wav"]);
    assert_eq!(*calls.lock().unwrap(), vec!["Pierwszy napis", "Drugi napis"]);
    let merged = codec::decode_file(&out.path().join("output1 (1).wav")).unwrap();
    assert_eq!(merged.duration_ms(), 2 * FRAGMENT_MS);
    assert_eq!(report.files, vec![out.path().join("output1 (1).wav")]);
}

#[tokio::test]
async fn test_existing_files_are_never_overwritten() {
    let input = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let source = source_file(input.path(), "lines.txt", "a\nb\n");
    fs::write(out.path().join("output1 (1).wav"), b"precious").unwrap();

    let report = Generator::new(wav_request(&source, out.path()))
        .with_backend(Box::new(ScriptedBackend::new()))
        .run()
        .await
        .unwrap();

    assert_eq!(fs::read(out.path().join("output1 (1).wav")).unwrap(), b"precious");
    assert_eq!(
        report.files,
        vec![out.path().join("output1 (2).wav"), out.path().join("output1 (3).wav")]
    );
}

#[tokio::test]
async fn test_failed_chunk_is_skipped_and_logged() {
    let input = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let source = source_file(input.path(), "lines.txt", "one\nbroken FAIL\nthree\n");
    let observer = MemoryProgressObserver::new();
    let event_log = Arc::new(EventLog::new());

    let report = Generator::new(wav_request(&source, out.path()))
        .with_backend(Box::new(ScriptedBackend::new().failing_on("FAIL")))
        .with_observer(Box::new(observer.clone()))
        .with_event_log(event_log.clone())
        .run()
        .await
        .unwrap();

    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.skipped, 1);
    assert_eq!(file_names(out.path()), vec!["output1 (1).wav", "output1 (2).wav"]);
    assert!(observer
        .history()
        .iter()
        .any(|e| matches!(e, RunEvent::ChunkSkipped { label, part: 1, .. } if label == "2")));
    assert!(event_log.lines().iter().any(|l| l.contains("Chunk 2.1 skipped")));
}

#[tokio::test]
async fn test_line_range_limits_work_and_progress() {
    let input = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let source = source_file(input.path(), "lines.txt", "first\n\nsecond\nthird\n");
    let backend = ScriptedBackend::new();
    let calls = backend.calls();
    let observer = MemoryProgressObserver::new();

    let mut request = wav_request(&source, out.path());
    request.range = LineRange::new(2, Some(2));
    Generator::new(request)
        .with_backend(Box::new(backend))
        .with_observer(Box::new(observer.clone()))
        .run()
        .await
        .unwrap();

    assert_eq!(*calls.lock().unwrap(), vec!["second"]);
    // Метка - номер физической строки
    assert!(observer.lines().contains(&"[100%] 3.1: second".to_string()));
}

#[tokio::test]
async fn test_long_line_is_split_into_parts() {
    let input = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let source = source_file(input.path(), "long.txt", "alpha beta gamma delta\n");
    let backend = ScriptedBackend::new();
    let calls = backend.calls();

    let mut request = wav_request(&source, out.path());
    request.char_limit = 11;
    let report = Generator::new(request)
        .with_backend(Box::new(backend))
        .run()
        .await
        .unwrap();

    assert_eq!(*calls.lock().unwrap(), vec!["alpha beta", "gamma delta"]);
    assert_eq!(report.files.len(), 2);
}

#[tokio::test]
async fn test_subtitle_silence_appended_in_split_mode() {
    let input = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let source = source_file(input.path(), "film.srt", TWO_SUBTITLES);

    let mut request = wav_request(&source, out.path());
    request.subtitle_silence = true;
    let report = Generator::new(request)
        .with_backend(Box::new(ScriptedBackend::new()))
        .run()
        .await
        .unwrap();

    for file in &report.files {
        let audio = codec::decode_file(file).unwrap();
        assert_eq!(audio.duration_ms(), FRAGMENT_MS + SUBTITLE_SILENCE_MS);
    }
}

#[tokio::test]
async fn test_global_stretch_matches_subtitle_timeline() {
    let input = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let source = source_file(input.path(), "film.srt", TWO_SUBTITLES);

    let mut request = wav_request(&source, out.path());
    request.merge = true;
    request.global_stretch = true;
    Generator::new(request)
        .with_backend(Box::new(ScriptedBackend::new()))
        .run()
        .await
        .unwrap();

    let merged = codec::decode_file(&out.path().join("output1 (1).wav")).unwrap();
    assert!((merged.duration_ms() as i64 - 2000).abs() <= 2, "got {} ms", merged.duration_ms());
}

#[tokio::test]
async fn test_gain_shifts_loudness_by_ten_db() {
    let input = tempfile::tempdir().unwrap();
    let plain_out = tempfile::tempdir().unwrap();
    let loud_out = tempfile::tempdir().unwrap();
    let source = source_file(input.path(), "one.txt", "tekst\n");

    Generator::new(wav_request(&source, plain_out.path()))
        .with_backend(Box::new(ScriptedBackend::new().with_amplitude(0.05)))
        .run()
        .await
        .unwrap();

    let mut request = wav_request(&source, loud_out.path());
    request.transform = TransformParams {
        gain: 1.5,
        ..Default::default()
    };
    Generator::new(request)
        .with_backend(Box::new(ScriptedBackend::new().with_amplitude(0.05)))
        .run()
        .await
        .unwrap();

    let plain = codec::decode_file(&plain_out.path().join("output1 (1).wav")).unwrap();
    let loud = codec::decode_file(&loud_out.path().join("output1 (1).wav")).unwrap();
    let delta = loud.dbfs() - plain.dbfs();
    assert!((delta - 10.0).abs() < 0.05, "delta was {}", delta);
}

#[tokio::test]
async fn test_unreadable_source_is_fatal() {
    let out = tempfile::tempdir().unwrap();
    let backend = ScriptedBackend::new();
    let calls = backend.calls();
    let observer = MemoryProgressObserver::new();

    let mut generator = Generator::new(wav_request(&out.path().join("missing.txt"), out.path()))
        .with_backend(Box::new(backend))
        .with_observer(Box::new(observer.clone()));
    let err = generator.run().await.unwrap_err();

    assert!(matches!(err, SpeakVaultError::SourceFile(_)));
    assert_eq!(generator.status(), RunStatus::FailedFatal);
    assert!(calls.lock().unwrap().is_empty());
    assert!(file_names(out.path()).is_empty());
    assert!(matches!(observer.history().last(), Some(RunEvent::Failed { .. })));
}

#[tokio::test]
async fn test_spawned_run_reports_through_handle() {
    let input = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let source = source_file(input.path(), "data.csv", "alpha,1\n\nbeta,2\n,3\ngamma,4\n");

    let handle = Generator::new(wav_request(&source, out.path()))
        .with_backend(Box::new(ScriptedBackend::new()))
        .spawn();
    let report = handle.join().await.unwrap();

    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.files.len(), 3);
    assert_eq!(report.state.total, 3);
}
