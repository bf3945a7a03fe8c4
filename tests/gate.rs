use std::time::{Duration, Instant};

use hopline::config::HandlerKind;
use hopline::{GateError, wait_ready, wait_ready_with_events};
use hopline::service::StartupEvent;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

async fn free_addr() -> String {
    let l = TcpListener::bind("127.0.0.1:0").await.unwrap();
    l.local_addr().unwrap().to_string()
}

#[tokio::test]
async fn ready_within_one_poll_of_listener_opening() {
    let addr = free_addr().await;
    let bind_addr = addr.clone();
    let opened = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        let listener = TcpListener::bind(&bind_addr).await.unwrap();
        let at = Instant::now();
        // Keep accepting so the poll connection completes.
        tokio::spawn(async move { while listener.accept().await.is_ok() {} });
        at
    });

    wait_ready(&addr, Duration::from_secs(5)).await.unwrap();
    let ready_at = Instant::now();
    let opened_at = opened.await.unwrap();
    assert!(ready_at.duration_since(opened_at) <= Duration::from_millis(400));
}

#[tokio::test]
async fn times_out_when_nothing_listens() {
    let addr = free_addr().await;
    let started = Instant::now();
    let err = wait_ready(&addr, Duration::from_secs(1)).await.unwrap_err();
    assert!(matches!(err, GateError::Timeout { addr: ref a, .. } if *a == addr));
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(1));
    assert!(elapsed < Duration::from_secs(3));
}

#[tokio::test]
async fn startup_failure_ends_wait_early() {
    let addr = free_addr().await;
    let (tx, mut rx) = mpsc::unbounded_channel();
    tx.send(StartupEvent::Failed {
        reason: "failed to start service front: address in use".into(),
    })
    .unwrap();

    let started = Instant::now();
    let err = wait_ready_with_events(&addr, Duration::from_secs(5), &mut rx)
        .await
        .unwrap_err();
    assert!(matches!(err, GateError::StartupFailed { ref reason, .. } if reason.contains("front")));
    assert!(started.elapsed() < Duration::from_secs(1));
}

#[tokio::test]
async fn listening_event_names_handler() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let bound = listener.local_addr().unwrap();
    let (tx, mut rx) = mpsc::unbounded_channel();
    tx.send(StartupEvent::Listening {
        service: "front".into(),
        addr: bound,
        handler: HandlerKind::Socks5,
    })
    .unwrap();
    drop(tx);

    let handler = wait_ready_with_events(&bound.to_string(), Duration::from_secs(2), &mut rx)
        .await
        .unwrap();
    assert_eq!(handler, Some(HandlerKind::Socks5));
    drop(listener);
}

#[tokio::test]
async fn late_listening_event_still_names_handler() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let bound = listener.local_addr().unwrap();
    let (tx, mut rx) = mpsc::unbounded_channel();
    // The port answers before the service announces itself.
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        tx.send(StartupEvent::Listening {
            service: "web".into(),
            addr: bound,
            handler: HandlerKind::Http,
        })
        .unwrap();
    });

    let handler = wait_ready_with_events(&bound.to_string(), Duration::from_secs(2), &mut rx)
        .await
        .unwrap();
    assert_eq!(handler, Some(HandlerKind::Http));
    drop(listener);
}
