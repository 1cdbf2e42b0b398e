//! Property tests for range reads: a range plus its complement is the file.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::TryStreamExt;
use proptest::prelude::*;
use seedreel_core::config::SessionConfig;
use seedreel_core::engine::{MockEngine, MockFile};
use seedreel_core::session::{
    SessionError, SessionManager, SessionSource, StatusUpdate, TelemetrySink,
};

const MAGNET: &str = "magnet:?xt=urn:btih:abababababababababababababababababababab";

async fn read(manager: &SessionManager, id: &str, range: Option<String>) -> Vec<u8> {
    let stream = manager.open_stream(id, range.as_deref()).unwrap();
    let expected = stream.content_length() as usize;
    let chunks: Vec<Bytes> = stream.body.try_collect().await.unwrap();
    let body = chunks.concat();
    assert_eq!(body.len(), expected);
    body
}

async fn manager_for(total: u64) -> (SessionManager, String) {
    let engine = Arc::new(MockEngine::new(vec![MockFile::new("movie.mp4", total)]));
    let manager = SessionManager::new(
        engine,
        SessionConfig {
            telemetry_interval: Duration::from_secs(60),
            cleanup_delay: Duration::ZERO,
            resolve_timeout: Duration::from_secs(1),
        },
    );
    let sink: Arc<dyn TelemetrySink> = Arc::new(|_update: StatusUpdate| {});
    let id = manager
        .start(SessionSource::Locator(MAGNET.to_string()), sink)
        .await
        .unwrap()
        .id;
    (manager, id)
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn range_and_complement_cover_the_file(
        total in 1u64..200_000,
        a in any::<u64>(),
        b in any::<u64>(),
    ) {
        let (start, end) = {
            let (x, y) = (a % total, b % total);
            (x.min(y), x.max(y))
        };

        runtime().block_on(async {
            let (manager, id) = manager_for(total).await;
            let full = read(&manager, &id, None).await;

            let mut stitched = Vec::new();
            if start > 0 {
                stitched.extend(read(&manager, &id, Some(format!("bytes=0-{}", start - 1))).await);
            }
            stitched.extend(read(&manager, &id, Some(format!("bytes={start}-{end}"))).await);
            if end + 1 < total {
                stitched.extend(read(&manager, &id, Some(format!("bytes={}-", end + 1))).await);
            }

            assert_eq!(stitched, full);
            manager.shutdown().await;
        });
    }

    #[test]
    fn ranges_past_the_end_are_unsatisfiable(
        total in 1u64..10_000,
        overshoot in 0u64..10_000,
        span in 0u64..10_000,
    ) {
        runtime().block_on(async {
            let (manager, id) = manager_for(total).await;
            let start = total + overshoot;

            let past_end = format!("bytes={start}-{}", start + span);
            assert!(matches!(
                manager.open_stream(&id, Some(past_end.as_str())),
                Err(SessionError::RangeUnsatisfiable { .. })
            ));

            let end = span.min(total - 1);
            let inverted = format!("bytes={}-{}", end + 1, end);
            assert!(matches!(
                manager.open_stream(&id, Some(inverted.as_str())),
                Err(SessionError::RangeUnsatisfiable { .. })
            ));
            manager.shutdown().await;
        });
    }
}
