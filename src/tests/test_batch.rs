use tokio_util::sync::CancellationToken;

use super::support::{file_names, write_tone};
use crate::batch::{run_batch, BatchRequest};
use crate::config::{OutputFormat, TransformParams};
use crate::media::codec;
use crate::notification::MemoryProgressObserver;
use crate::progress::RunStatus;

#[tokio::test]
async fn test_batch_trims_and_names_outputs() {
    let input = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let first = input.path().join("first.wav");
    let second = input.path().join("second.wav");
    write_tone(&first, 1000, 0.3).unwrap();
    write_tone(&second, 1000, 0.3).unwrap();

    let mut request = BatchRequest::new(vec![first, second], out.path());
    request.format = OutputFormat::Wav;
    request.trim_start_s = 0.25;
    request.trim_end_s = 0.75;
    let observer = MemoryProgressObserver::new();

    let report = run_batch(&request, &observer, &CancellationToken::new()).await.unwrap();

    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(file_names(out.path()), vec!["output2 (1).wav", "output2 (2).wav"]);
    let trimmed = codec::decode_file(&out.path().join("output2 (1).wav")).unwrap();
    assert_eq!(trimmed.duration_ms(), 500);
    assert!(observer.lines().iter().any(|l| l.starts_with("[1/2] Opening: first.wav")));
}

#[tokio::test]
async fn test_batch_continues_after_bad_file() {
    let input = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let good = input.path().join("good.wav");
    write_tone(&good, 300, 0.3).unwrap();

    let mut request = BatchRequest::new(vec![input.path().join("missing.wav"), good], out.path());
    request.format = OutputFormat::Wav;
    request.transform = TransformParams {
        tempo: 2.0,
        ..Default::default()
    };

    let report = run_batch(&request, &MemoryProgressObserver::new(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.files.len(), 1);
    let faster = codec::decode_file(&report.files[0]).unwrap();
    assert!((faster.duration_ms() as i64 - 150).abs() <= 1);
}

#[tokio::test]
async fn test_batch_cancelled_before_first_file() {
    let input = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let path = input.path().join("a.wav");
    write_tone(&path, 100, 0.3).unwrap();

    let cancel = CancellationToken::new();
    cancel.cancel();
    let report = run_batch(
        &BatchRequest::new(vec![path], out.path()),
        &MemoryProgressObserver::new(),
        &cancel,
    )
    .await
    .unwrap();

    assert_eq!(report.status, RunStatus::Cancelled);
    assert!(file_names(out.path()).is_empty());
}

#[test]
fn test_batch_requires_output_dir() {
    let err = tokio_test::block_on(run_batch(
        &BatchRequest::new(Vec::new(), "/no/such/speakvault/dir"),
        &MemoryProgressObserver::new(),
        &CancellationToken::new(),
    ))
    .unwrap_err();
    assert!(err.is_fatal());
}
