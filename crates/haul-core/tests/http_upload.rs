//! `HttpUploadTransport` against a local HTTP upload service.

mod common;

use haul_core::error::ErrorKind;
use haul_core::upload::{
    HttpUploadTransport, SeekableSource, SessionId, SessionStatus, TransferSession,
    UploadCoordinator, UploadSettings,
};
use tokio_util::sync::CancellationToken;

fn coordinator(endpoint: &str, part: u64) -> UploadCoordinator<HttpUploadTransport> {
    UploadCoordinator::new(
        HttpUploadTransport::new(endpoint).unwrap(),
        UploadSettings {
            max_part_size: part,
            list_page_size: 2,
        },
    )
}

#[tokio::test]
async fn full_upload_over_http() {
    let server = common::upload_server::start(None);
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("mod.pak");
    let body = common::payload(70_000);
    std::fs::write(&file, &body).unwrap();

    let c = coordinator(&server.endpoint, 16 * 1024);
    let mut session = c.begin_session(body.len() as u64, "nonce-1").await.unwrap();
    assert_eq!(session.part_count(), 5);
    let mut source = SeekableSource::open(&file).await.unwrap();
    c.upload_next_parts(&mut session, 0, &mut source, &CancellationToken::new())
        .await
        .unwrap();
    c.complete_session(&mut session).await.unwrap();
    assert_eq!(session.status, SessionStatus::Completed);
    assert!(server.is_completed(session.id.as_str()));
    assert_eq!(server.assembled(session.id.as_str()), body);
}

#[tokio::test]
async fn server_part_size_and_transient_failure_then_resume() {
    let server = common::upload_server::start(Some(10_000));
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("mod.pak");
    let body = common::payload(35_000);
    std::fs::write(&file, &body).unwrap();

    let c = coordinator(&server.endpoint, 1 << 20);
    let mut session = c.begin_session(body.len() as u64, "n").await.unwrap();
    assert_eq!(session.max_part_size, 10_000);
    assert_eq!(session.part_count(), 4);

    server.fail_next_part();
    let mut source = SeekableSource::open(&file).await.unwrap();
    let err = c
        .upload_next_parts(&mut session, 0, &mut source, &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TransportFailure);

    // Fresh session object, as after a restart.
    let mut resumed = TransferSession::new(session.id.clone(), session.total_size, 10_000);
    let at = c.resume_session(&mut resumed).await.unwrap();
    assert_eq!(at, 0);
    c.upload_next_parts(&mut resumed, at, &mut source, &CancellationToken::new())
        .await
        .unwrap();
    c.complete_session(&mut resumed).await.unwrap();
    assert_eq!(server.assembled(resumed.id.as_str()), body);
}

#[tokio::test]
async fn unknown_session_is_a_rejection() {
    let server = common::upload_server::start(None);
    let c = coordinator(&server.endpoint, 1024);
    let mut session = TransferSession::new(SessionId::new("missing"), 10, 1024);
    let err = c.resume_session(&mut session).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ServerRejection);
    assert!(!err.kind().is_retryable());
}

#[tokio::test]
async fn unreachable_endpoint_is_a_transport_failure() {
    // Bind then drop to get a port nobody listens on.
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();
    let c = coordinator(&format!("http://127.0.0.1:{}/api", port), 1024);
    let err = c.begin_session(10, "n").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TransportFailure);
}
