//! End-to-end chunk path: session buffer → dispatch → decode → transcript.

use scribed::config::DispatchConfig;
use scribed::dispatch::{AudioWindow, DispatchOutcome, DispatchRequest, Dispatcher};
use scribed::filter::HallucinationFilter;
use scribed::session::Session;
use scribed::sink::CollectorSink;
use scribed::stt::{MockTranscriber, SharedEngine};
use std::sync::Arc;

/// In-memory WAV with the given mono samples at 16 kHz.
fn wav_bytes(samples: &[i16]) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 16000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for &s in samples {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}

fn speech_samples(seconds: u32) -> Vec<i16> {
    (0..16000 * seconds)
        .map(|i| if i % 2 == 0 { 8000 } else { -8000 })
        .collect()
}

#[tokio::test]
async fn buffered_chunks_become_a_transcript() {
    let mock = MockTranscriber::new("base").with_response("the quick brown fox");
    let dispatcher = Dispatcher::new(
        SharedEngine::preloaded(Arc::new(mock.clone())),
        Arc::new(HallucinationFilter::new()),
        DispatchConfig::default(),
    );
    let sink = Arc::new(CollectorSink::new());
    let mut session = Session::new(160 * 1024, 4096, "en");

    // Feed the stream in 4 KB chunks, as a browser would
    let stream = wav_bytes(&speech_samples(2));
    for chunk in stream.chunks(4096) {
        session.buffer.append(chunk);
    }

    let outcome = dispatcher.try_dispatch(
        session.inflight_flag(),
        DispatchRequest {
            window: AudioWindow::Encoded(session.buffer.snapshot()),
            language: "en".to_string(),
            timestamp_ms: 777,
            participant: None,
        },
        sink.clone(),
    );
    let DispatchOutcome::Started(task) = outcome else {
        panic!("expected Started");
    };
    task.await.unwrap();

    let transcripts = sink.transcripts();
    assert_eq!(transcripts.len(), 1);
    assert_eq!(transcripts[0].text, "the quick brown fox");
    assert_eq!(transcripts[0].timestamp_ms, 777);
    assert_eq!(mock.last_language(), Some("en".to_string()));
}

#[tokio::test]
async fn truncated_buffer_snapshot_still_decodes() {
    // A long stream against a small buffer forces truncation. The pinned
    // header keeps the snapshot decodable; without it every snapshot after
    // the first eviction would be headerless garbage.
    let mut session = Session::new(32 * 1024, 4096, "en");
    let stream = wav_bytes(&speech_samples(10)); // 320 KB of samples

    for chunk in stream.chunks(4096) {
        session.buffer.append(chunk);
    }
    assert!(session.buffer.len() <= 32 * 1024 + 4096);

    let snapshot = session.buffer.snapshot();
    let decoded = scribed::audio::decode::decode_bytes(&snapshot, None)
        .expect("snapshot must keep its container header");
    assert!(decoded.samples.len() > 16000, "kept a meaningful audio tail");
}

#[tokio::test]
async fn session_teardown_cancels_inflight_inference() {
    let mock = MockTranscriber::new("slow")
        .with_response("never delivered")
        .with_latency(std::time::Duration::from_secs(5));
    let dispatcher = Dispatcher::new(
        SharedEngine::preloaded(Arc::new(mock)),
        Arc::new(HallucinationFilter::new()),
        DispatchConfig::default(),
    );
    let sink = Arc::new(CollectorSink::new());
    let mut session = Session::new(160 * 1024, 4096, "en");

    session.buffer.append(&wav_bytes(&speech_samples(1)));
    let outcome = dispatcher.try_dispatch(
        session.inflight_flag(),
        DispatchRequest {
            window: AudioWindow::Encoded(session.buffer.snapshot()),
            language: "en".to_string(),
            timestamp_ms: 0,
            participant: None,
        },
        sink.clone(),
    );
    let DispatchOutcome::Started(task) = outcome else {
        panic!("expected Started");
    };
    session.set_task(task);

    // Client disconnects mid-inference
    session.teardown();
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    assert_eq!(sink.count(), 0, "aborted inference must not deliver");
    assert!(!session.is_busy(), "teardown clears the in-flight flag");
}
