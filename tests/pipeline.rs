//! Pipeline and transaction behavior against the scripted fake server.

use helper::{bulk, error, integer, simple, FakeServer, Session, Step};
use respline::{Client, ErrorKind, Pipeline, Reply, Transaction};

#[tokio::test]
async fn pipeline_resolves_positionally() {
    let server = FakeServer::start(vec![Session::new()
        .step(Step::recv(&["SET", "a", "1"]))
        .step(Step::recv(&["INCR", "a"]))
        .step(Step::Send(simple("OK")))
        .step(Step::Send(integer(2)))])
    .await
    .unwrap();

    let mut client = Client::new(&server.addr()).await.unwrap();

    let mut pipe = Pipeline::new();
    let set = pipe.call(&["SET", "a", "1"]);
    let incr = pipe.call(&["INCR", "a"]);
    let values = pipe.execute(&mut client).await.unwrap();

    assert_eq!(
        vec![Reply::Status("OK".into()), Reply::Integer(2)],
        values,
    );
    assert_eq!(Reply::Status("OK".into()), set.value().unwrap());
    assert_eq!(Reply::Integer(2), incr.value().unwrap());
    server.finish().await.unwrap();
}

#[tokio::test]
async fn pipeline_transform_shapes_the_reply() {
    let server = FakeServer::start(vec![Session::new()
        .step(Step::recv(&["LRANGE", "l", "0", "-1"]))
        .step(Step::Send(helper::array(&[bulk(b"a"), bulk(b"b")])))])
    .await
    .unwrap();

    let mut client = Client::new(&server.addr()).await.unwrap();

    let mut pipe = Pipeline::new();
    let length = pipe.call_with(&["LRANGE", "l", "0", "-1"], |reply| match reply {
        Reply::Array(Some(items)) => Reply::Integer(items.len() as i64),
        other => other,
    });
    pipe.execute(&mut client).await.unwrap();

    assert_eq!(Reply::Integer(2), length.value().unwrap());
    server.finish().await.unwrap();
}

#[tokio::test]
async fn first_server_error_raised_after_collecting_all() {
    let server = FakeServer::start(vec![Session::new()
        .step(Step::recv(&["INCR", "text"]))
        .step(Step::recv(&["GET", "k"]))
        .step(Step::Send(error("WRONGTYPE not an integer")))
        .step(Step::Send(bulk(b"v")))])
    .await
    .unwrap();

    let mut client = Client::new(&server.addr()).await.unwrap();

    let mut pipe = Pipeline::new();
    let bad = pipe.call(&["INCR", "text"]);
    let good = pipe.call(&["GET", "k"]);
    let err = pipe.execute(&mut client).await.unwrap_err();

    assert_eq!(
        Some("WRONGTYPE"),
        err.as_server_error().and_then(|e| e.code.as_deref()),
    );
    // both replies were read off the wire; the later one is not lost
    assert!(bad.value().is_err());
    assert_eq!(Reply::Bulk(Some("v".into())), good.value().unwrap());
    // and the stream stayed aligned, no reconnect
    assert_eq!(1, server.connections());
    server.finish().await.unwrap();
}

#[tokio::test]
async fn transaction_resolves_from_the_exec_array() {
    let server = FakeServer::start(vec![Session::new()
        .step(Step::recv(&["MULTI"]))
        .step(Step::recv(&["SET", "x", "1"]))
        .step(Step::recv(&["INCR", "x"]))
        .step(Step::recv(&["EXEC"]))
        .step(Step::Send(simple("OK")))
        .step(Step::Send(simple("QUEUED")))
        .step(Step::Send(simple("QUEUED")))
        .step(Step::Send(helper::array(&[simple("OK"), integer(2)])))])
    .await
    .unwrap();

    let mut client = Client::new(&server.addr()).await.unwrap();

    let mut tx = Transaction::new();
    let set = tx.call(&["SET", "x", "1"]);
    let incr = tx.call(&["INCR", "x"]);
    let values = tx.execute(&mut client).await.unwrap();

    assert_eq!(
        Some(vec![Reply::Status("OK".into()), Reply::Integer(2)]),
        values,
    );
    assert_eq!(Reply::Status("OK".into()), set.value().unwrap());
    assert_eq!(Reply::Integer(2), incr.value().unwrap());
    server.finish().await.unwrap();
}

#[tokio::test]
async fn watch_violation_aborts_every_deferred() {
    let server = FakeServer::start(vec![Session::new()
        .step(Step::recv(&["MULTI"]))
        .step(Step::recv(&["SET", "x", "1"]))
        .step(Step::recv(&["INCR", "x"]))
        .step(Step::recv(&["EXEC"]))
        .step(Step::Send(simple("OK")))
        .step(Step::Send(simple("QUEUED")))
        .step(Step::Send(simple("QUEUED")))
        .step(Step::Send(helper::nil_array()))])
    .await
    .unwrap();

    let mut client = Client::new(&server.addr()).await.unwrap();

    let mut tx = Transaction::new();
    let set = tx.call(&["SET", "x", "1"]);
    let incr = tx.call(&["INCR", "x"]);
    let values = tx.execute(&mut client).await.unwrap();

    assert_eq!(None, values);
    assert!(set.aborted());
    assert!(incr.aborted());
    assert!(matches!(
        incr.value().unwrap_err().kind(),
        ErrorKind::TransactionAborted,
    ));
    server.finish().await.unwrap();
}

#[tokio::test]
async fn queue_rejection_governs_over_exec_abort() {
    let server = FakeServer::start(vec![Session::new()
        .step(Step::recv(&["MULTI"]))
        .step(Step::recv(&["SET", "x", "1"]))
        .step(Step::recv(&["NOSUCH"]))
        .step(Step::recv(&["EXEC"]))
        .step(Step::Send(simple("OK")))
        .step(Step::Send(simple("QUEUED")))
        .step(Step::Send(error("ERR unknown command 'NOSUCH'")))
        .step(Step::Send(error("EXECABORT Transaction discarded")))])
    .await
    .unwrap();

    let mut client = Client::new(&server.addr()).await.unwrap();

    let mut tx = Transaction::new();
    tx.call(&["SET", "x", "1"]);
    tx.call(&["NOSUCH"]);
    let err = tx.execute(&mut client).await.unwrap_err();

    // the rejection that broke the queue wins over the EXECABORT echo
    assert_eq!(
        Some("ERR"),
        err.as_server_error().and_then(|e| e.code.as_deref()),
    );
    server.finish().await.unwrap();
}

#[tokio::test]
async fn expected_shutdown_swallows_the_reset() {
    let server = FakeServer::start(vec![Session::new()
        .step(Step::recv(&["SHUTDOWN"]))
        .step(Step::Hangup)])
    .await
    .unwrap();

    let mut client = Client::new(&server.addr()).await.unwrap();
    client.shutdown().await.unwrap();

    assert!(!client.is_connected());
    server.finish().await.unwrap();
}

#[tokio::test]
async fn refused_shutdown_raises_the_error() {
    let server = FakeServer::start(vec![Session::new()
        .exchange(&["SHUTDOWN"], error("ERR Errors trying to SHUTDOWN. Check logs."))])
    .await
    .unwrap();

    let mut client = Client::new(&server.addr()).await.unwrap();
    let err = client.shutdown().await.unwrap_err();

    assert!(err.as_server_error().is_some());
    server.finish().await.unwrap();
}
