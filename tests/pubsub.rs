//! Subscription loop behavior against the scripted fake server.

use std::ops::ControlFlow;
use std::time::Duration;

use helper::{array, bulk, integer, FakeServer, Session, Step};
use respline::{Client, ErrorKind, PushEvent};

fn subscribe_ack(channel: &str, count: i64) -> Vec<u8> {
    array(&[bulk(b"subscribe"), bulk(channel.as_bytes()), integer(count)])
}

fn unsubscribe_ack(channel: &str, count: i64) -> Vec<u8> {
    array(&[bulk(b"unsubscribe"), bulk(channel.as_bytes()), integer(count)])
}

fn message(channel: &str, payload: &str) -> Vec<u8> {
    array(&[
        bulk(b"message"),
        bulk(channel.as_bytes()),
        bulk(payload.as_bytes()),
    ])
}

#[tokio::test]
async fn dispatches_messages_until_the_count_drops_to_zero() {
    let server = FakeServer::start(vec![Session::new()
        .step(Step::recv(&["SUBSCRIBE", "news"]))
        .step(Step::Send(subscribe_ack("news", 1)))
        .step(Step::Send(message("news", "hello")))
        .step(Step::Send(unsubscribe_ack("news", 0)))])
    .await
    .unwrap();

    let mut client = Client::new(&server.addr()).await.unwrap();

    let mut events = Vec::new();
    client
        .subscribe(&["news"], |event| {
            events.push(event);
            Ok(ControlFlow::Continue(()))
        })
        .await
        .unwrap();

    assert_eq!(
        vec![
            PushEvent::Subscribe {
                channel: "news".into(),
                count: 1,
            },
            PushEvent::Message {
                channel: "news".into(),
                payload: "hello".into(),
            },
            PushEvent::Unsubscribe {
                channel: Some("news".into()),
                count: 0,
            },
        ],
        events,
    );
    server.finish().await.unwrap();
}

#[tokio::test]
async fn breaking_the_handler_unsubscribes_and_drains() {
    let server = FakeServer::start(vec![Session::new()
        .step(Step::recv(&["SUBSCRIBE", "news", "sport"]))
        .step(Step::Send(subscribe_ack("news", 1)))
        .step(Step::Send(subscribe_ack("sport", 2)))
        .step(Step::Send(message("news", "enough")))
        .step(Step::recv(&["UNSUBSCRIBE"]))
        .step(Step::Send(unsubscribe_ack("news", 1)))
        .step(Step::Send(unsubscribe_ack("sport", 0)))])
    .await
    .unwrap();

    let mut client = Client::new(&server.addr()).await.unwrap();

    let mut messages = 0;
    client
        .subscribe(&["news", "sport"], |event| {
            Ok(match event {
                PushEvent::Message { .. } => {
                    messages += 1;
                    ControlFlow::Break(())
                }
                _ => ControlFlow::Continue(()),
            })
        })
        .await
        .unwrap();

    assert_eq!(1, messages);
    // the loop exited cleanly, the connection is still usable
    assert!(client.is_connected());
    server.finish().await.unwrap();
}

#[tokio::test]
async fn pattern_subscription_delivers_pmessage() {
    let server = FakeServer::start(vec![Session::new()
        .step(Step::recv(&["PSUBSCRIBE", "news.*"]))
        .step(Step::Send(array(&[
            bulk(b"psubscribe"),
            bulk(b"news.*"),
            integer(1),
        ])))
        .step(Step::Send(array(&[
            bulk(b"pmessage"),
            bulk(b"news.*"),
            bulk(b"news.tech"),
            bulk(b"shipped"),
        ])))
        .step(Step::Send(array(&[
            bulk(b"punsubscribe"),
            bulk(b"news.*"),
            integer(0),
        ])))])
    .await
    .unwrap();

    let mut client = Client::new(&server.addr()).await.unwrap();

    let mut payloads = Vec::new();
    client
        .psubscribe(&["news.*"], |event| {
            if let PushEvent::PMessage {
                channel, payload, ..
            } = event
            {
                payloads.push((channel, payload));
            }
            Ok(ControlFlow::Continue(()))
        })
        .await
        .unwrap();

    assert_eq!(vec![("news.tech".into(), "shipped".into())], payloads);
    server.finish().await.unwrap();
}

#[tokio::test]
async fn subscription_read_can_be_bounded() {
    let server = FakeServer::start(vec![Session::new()
        .step(Step::recv(&["SUBSCRIBE", "news"]))
        .step(Step::Send(subscribe_ack("news", 1)))
        .step(Step::Idle(Duration::from_secs(5)))])
    .await
    .unwrap();

    let mut client = Client::new(&server.addr()).await.unwrap();

    let err = client
        .subscribe_with_timeout(Duration::from_millis(50), &["news"], |_| {
            Ok(ControlFlow::Continue(()))
        })
        .await
        .unwrap_err();

    assert!(err.is_timeout());
    // a broken-off subscription leaves the connection unusable; it is gone
    assert!(!client.is_connected());
}

#[tokio::test]
async fn handler_errors_tear_the_connection_down() {
    let server = FakeServer::start(vec![Session::new()
        .step(Step::recv(&["SUBSCRIBE", "news"]))
        .step(Step::Send(subscribe_ack("news", 1)))
        .step(Step::Send(message("news", "poison")))])
    .await
    .unwrap();

    let mut client = Client::new(&server.addr()).await.unwrap();

    let err = client
        .subscribe(&["news"], |event| match event {
            PushEvent::Message { .. } => Err(ErrorKind::UnexpectedReply.into()),
            _ => Ok(ControlFlow::Continue(())),
        })
        .await
        .unwrap_err();

    assert!(matches!(err.kind(), ErrorKind::UnexpectedReply));
    assert!(!client.is_connected());
    server.finish().await.unwrap();
}

#[test]
fn unsubscribe_without_subscription_is_a_usage_error() {
    // no server involved: the error is raised before any I/O
    let addr = "127.0.0.1:1".parse().unwrap();
    let client = Client::builder().build(respline::connector::TcpConnector::new(addr));

    let err = client.unsubscribe().unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::NotSubscribed));
    let err = client.punsubscribe().unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::NotSubscribed));
    assert!(!client.is_connected());
}

#[tokio::test]
async fn publish_reports_the_receiver_count() {
    let server = FakeServer::start(vec![
        Session::new().exchange(&["PUBLISH", "news", "hello"], integer(3)),
    ])
    .await
    .unwrap();

    let mut client = Client::new(&server.addr()).await.unwrap();
    assert_eq!(3, client.publish("news", "hello").await.unwrap());
    server.finish().await.unwrap();
}
