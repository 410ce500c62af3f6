//! Peer connection reuse, dialing, and call setup.
use std::sync::Arc;
use std::time::Duration;

use switchyard::conn::mock::{MockConnection, MockConnector};
use switchyard::conn::Connection as _;
use switchyard::conn::{CallOptions, ConnectionOptions, ConnectionState, Format};
use switchyard::peer::{Builder, ConnectionCount};
use switchyard::{CallContext, Error, PeerConfig, PeerList};

const ADDR: &str = "10.0.0.1:4040";

fn list(connector: MockConnector) -> (Arc<MockConnector>, PeerList<MockConnector>) {
    let connector = Arc::new(connector);
    (connector.clone(), Builder::shared(connector).build())
}

#[tokio::test]
async fn active_connection_never_dials() {
    let _ = tracing_subscriber::fmt::try_init();
    let (connector, peers) = list(MockConnector::new());

    let peer = peers.add(ADDR);
    let inbound = Arc::new(MockConnection::active());
    let outbound = Arc::new(MockConnection::active());
    peer.add_inbound_connection(inbound.clone()).unwrap();
    peer.add_outbound_connection(outbound.clone()).unwrap();

    let mut seen = std::collections::HashSet::new();
    for _ in 0..200 {
        let conn = peer.get_connection(&CallContext::new()).await.unwrap();
        assert!(conn.id() == inbound.id() || conn.id() == outbound.id());
        seen.insert(conn.id());
    }

    assert_eq!(connector.connect_count(), 0);
    assert_eq!(seen.len(), 2, "both active connections should be chosen");
}

#[tokio::test]
async fn dials_exactly_once_without_active() {
    let _ = tracing_subscriber::fmt::try_init();
    let options = ConnectionOptions::default().with_process_name("keyvalue-client");
    let (connector, peers) = list(MockConnector::new().options(options.clone()));

    let peer = peers.add(ADDR);
    peer.add_outbound_connection(MockConnection::new(ConnectionState::StartClose))
        .unwrap();

    let conn = peer.get_connection(&CallContext::new()).await.unwrap();
    assert!(conn.is_active());
    assert_eq!(connector.connect_count(), 1);

    let dialed = connector.dialed();
    assert_eq!(dialed.len(), 1);
    assert_eq!(dialed[0].0.as_str(), ADDR);
    assert_eq!(dialed[0].1, options);

    assert_eq!(
        peer.connection_count(),
        ConnectionCount {
            inbound: 0,
            outbound: 2,
            active: 1
        }
    );
}

#[tokio::test]
async fn connect_failure_is_surfaced() {
    let (connector, peers) = list(MockConnector::error());
    let peer = peers.add(ADDR);

    let error = peer
        .begin_call(&CallContext::new(), "keyvalue", "get", None)
        .await
        .unwrap_err();

    assert!(matches!(error, Error::Connecting(_)));
    assert_eq!(error.to_string(), "connecting: connection error");
    assert_eq!(connector.connect_count(), 1, "no retries");
}

#[tokio::test]
async fn connect_failure_leaves_list_intact() {
    let (connector, peers) = list(MockConnector::new());
    let good = peers.add("10.0.0.2:4040");
    good.add_outbound_connection(MockConnection::active())
        .unwrap();

    let bad = peers.add(ADDR);
    connector.fail();
    assert!(bad.get_connection(&CallContext::new()).await.is_err());

    assert_eq!(peers.len(), 2);
    assert!(good.get_connection(&CallContext::new()).await.is_ok());
}

#[tokio::test(start_paused = true)]
async fn slow_connect_times_out() {
    let (_, peers) = list(MockConnector::new().delay(Duration::from_secs(5)));
    let peer = peers.add(ADDR);

    let ctx = CallContext::with_timeout(Duration::from_secs(1));
    let error = peer.connect(&ctx).await.unwrap_err();
    assert!(matches!(error, Error::Timeout));
    assert_eq!(peer.connection_count(), ConnectionCount::default());

    let conn = peer
        .connect(&CallContext::with_timeout(Duration::from_secs(10)))
        .await
        .unwrap();
    assert!(conn.is_active());
}

#[tokio::test]
async fn cancel_while_connecting() {
    let (_, peers) = list(MockConnector::hang());
    let peer = peers.add(ADDR);

    let ctx = CallContext::new();
    let canceler = ctx.clone();
    let call = tokio::spawn(async move { peer.begin_call(&ctx, "keyvalue", "get", None).await });

    tokio::task::yield_now().await;
    canceler.cancel();

    let outcome = call.await.unwrap();
    assert!(matches!(outcome, Err(Error::Canceled)));
}

#[tokio::test(start_paused = true)]
async fn slow_call_times_out() {
    let (connector, peers) = list(MockConnector::new());
    let peer = peers.add(ADDR);

    let conn = Arc::new(MockConnection::active());
    conn.hang_calls();
    peer.add_outbound_connection(conn.clone()).unwrap();

    let ctx = CallContext::with_timeout(Duration::from_millis(100));
    let error = peer
        .begin_call(&ctx, "keyvalue", "get", None)
        .await
        .unwrap_err();

    assert!(matches!(error, Error::Timeout));
    assert_eq!(conn.call_count(), 1);
    assert_eq!(connector.connect_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn cancel_while_calling() {
    let (connector, peers) = list(MockConnector::new());
    let peer = peers.add(ADDR);

    let conn = Arc::new(MockConnection::active());
    conn.hang_calls();
    peer.add_outbound_connection(conn.clone()).unwrap();

    let ctx = CallContext::new();
    let canceler = ctx.clone();
    let call = tokio::spawn(async move { peer.begin_call(&ctx, "keyvalue", "get", None).await });

    while conn.call_count() == 0 {
        tokio::task::yield_now().await;
    }
    canceler.cancel();

    let outcome = call.await.unwrap();
    assert!(matches!(outcome, Err(Error::Canceled)));
    assert_eq!(connector.connect_count(), 0);
}

#[tokio::test]
async fn begin_call_forwards_options() {
    let (_, peers) = list(MockConnector::new());
    let peer = peers.add(ADDR);

    let options = CallOptions::with_format(Format::Thrift).shard_key("user-1");
    let call = peer
        .begin_call(&CallContext::new(), "keyvalue", "KeyValue::set", Some(&options))
        .await
        .unwrap();

    assert_eq!(call.service, "keyvalue");
    assert_eq!(call.operation, "KeyValue::set");
    assert_eq!(call.options, options);

    let conn = peer.get_connection(&CallContext::new()).await.unwrap();
    assert_eq!(conn.id(), call.connection);
    assert_eq!(conn.call_count(), 1);
}

#[tokio::test]
async fn list_get_then_call() {
    let (connector, peers) = list(MockConnector::new());
    peers.add(ADDR);
    peers.add("10.0.0.2:4040");

    for _ in 0..10 {
        let peer = peers.get().unwrap();
        peer.begin_call(&CallContext::new(), "keyvalue", "get", None)
            .await
            .unwrap();
    }

    assert!(connector.connect_count() <= 2);
}

#[tokio::test]
async fn close_completeness() {
    let (_, peers) = list(MockConnector::new());
    let child = peers.new_child();

    let mut connections = Vec::new();
    for i in 0..3 {
        let peer = child.add(format!("10.0.1.{i}:4040"));
        let inbound = Arc::new(MockConnection::active());
        peer.add_inbound_connection(inbound.clone()).unwrap();
        connections.push(inbound);
        connections.push(peer.connect(&CallContext::new()).await.unwrap());
    }

    child.close();

    for conn in &connections {
        assert_eq!(conn.close_count(), 1);
        assert_eq!(conn.state(), ConnectionState::Closed);
    }

    let peer = child.get().unwrap();
    let fresh = peer.get_connection(&CallContext::new()).await.unwrap();
    assert!(connections.iter().all(|c| c.id() != fresh.id()));
}

#[tokio::test]
async fn pruning_config() {
    let connector = Arc::new(MockConnector::new());
    let peers = Builder::shared(connector)
        .peer_config(PeerConfig::pruning())
        .build();
    let peer = peers.add(ADDR);

    for _ in 0..5 {
        let conn = peer.get_connection(&CallContext::new()).await.unwrap();
        conn.close();
    }

    assert_eq!(peer.connection_count().outbound, 1);
}
