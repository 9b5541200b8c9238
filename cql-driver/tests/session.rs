mod common;

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use common::*;
use cql_driver::cluster::{SessionBuilder, TcpSession};
use cql_driver::consistency::Consistency;
use cql_driver::error::Error;
use cql_driver::frame::events::{
    SchemaChange, SchemaChangeType, ServerEvent, TopologyChange, TopologyChangeType,
};
use cql_driver::frame::{Frame, Opcode};
use cql_driver::transport::CqlTransport;
use cql_driver::types::CInet;

const PEERS_QUERY: &str = "SELECT * FROM system.peers";

fn ip(value: &str) -> IpAddr {
    value.parse().unwrap()
}

async fn session(node: &FakeNode) -> TcpSession {
    SessionBuilder::new()
        .with_contact_point(node.addr().into())
        .with_port(node.addr().port())
        .with_connection_config(fast_reconnect_config())
        .build()
        .await
        .unwrap()
}

fn topology_change(change_type: TopologyChangeType, ip: IpAddr) -> ServerEvent {
    ServerEvent::TopologyChange(TopologyChange {
        change_type,
        addr: CInet::new(SocketAddr::new(ip, 7000)),
    })
}

fn addresses(session: &TcpSession) -> Vec<SocketAddr> {
    session
        .connections()
        .iter()
        .map(|connection| connection.address())
        .collect()
}

#[tokio::test]
async fn should_bootstrap_from_contact_point() {
    let node = FakeNode::start().await;
    let session = session(&node).await;

    assert_eq!(addresses(&session), vec![node.addr()]);
    assert_eq!(node.requests_with(Opcode::Register), 1);
    assert_eq!(session.consistency(), Consistency::Quorum);

    assert_eq!(
        session.metadata().cluster_name().await.unwrap(),
        "Fake Cluster"
    );
}

#[tokio::test]
async fn should_open_connections_to_discovered_peers() {
    let node = FakeNode::start_with(
        Arc::new(|request: &Frame| match query_text(request).as_deref() {
            Some(PEERS_QUERY) => Some(peers_result(
                request,
                &[
                    (ip("127.0.0.2"), Some(ip("127.0.0.12"))),
                    (ip("127.0.0.3"), Some(ip("0.0.0.0"))),
                    (ip("127.0.0.1"), None),
                ],
            )),
            _ => default_response(request),
        }),
        false,
        ip("127.0.0.1"),
    )
    .await;
    let port = node.addr().port();

    let session = session(&node).await;

    assert_eq!(
        addresses(&session),
        vec![
            node.addr(),
            SocketAddr::new(ip("127.0.0.12"), port),
            SocketAddr::new(ip("127.0.0.3"), port),
        ]
    );
    assert!(session
        .execute("SELECT * FROM system.local")
        .await
        .is_ok());

    session.shutdown();
}

#[tokio::test]
async fn should_skip_unreachable_contact_point() {
    let node = FakeNode::start().await;

    let session = SessionBuilder::new()
        .with_contact_point(dead_addr().into())
        .with_contact_point(node.addr().into())
        .with_port(node.addr().port())
        .build()
        .await
        .unwrap();

    assert_eq!(addresses(&session), vec![node.addr()]);
}

#[tokio::test]
async fn should_fail_without_live_contact_points() {
    let result = SessionBuilder::new()
        .with_contact_point(dead_addr().into())
        .build()
        .await;

    assert!(matches!(result, Err(Error::NoLiveNodes)));
}

#[tokio::test]
async fn should_broadcast_server_events() {
    let node = FakeNode::start().await;
    let session = session(&node).await;
    let mut events = session.subscribe_events();

    let event = ServerEvent::SchemaChange(SchemaChange {
        change_type: SchemaChangeType::Created,
        keyspace: "ks".into(),
        table: String::new(),
    });
    node.push_event(&event);

    assert_eq!(within(events.recv()).await.unwrap(), event);
}

#[tokio::test]
async fn should_follow_topology_changes() {
    let node = FakeNode::start().await;
    let port = node.addr().port();
    let session = session(&node).await;
    let mut events = session.subscribe_events();

    let new_node = topology_change(TopologyChangeType::NewNode, ip("127.0.0.3"));
    node.push_event(&new_node);
    node.push_event(&new_node);

    assert_eq!(within(events.recv()).await.unwrap(), new_node);
    assert_eq!(within(events.recv()).await.unwrap(), new_node);
    assert_eq!(
        addresses(&session),
        vec![node.addr(), SocketAddr::new(ip("127.0.0.3"), port)]
    );

    let removed_node = topology_change(TopologyChangeType::RemovedNode, ip("127.0.0.3"));
    node.push_event(&removed_node);

    assert_eq!(within(events.recv()).await.unwrap(), removed_node);
    assert_eq!(addresses(&session), vec![node.addr()]);
}

#[tokio::test]
async fn should_reject_requests_after_shutdown() {
    let node = FakeNode::start().await;
    let session = session(&node).await;

    session.shutdown();

    wait_for(|| session.connections().iter().all(|connection| !connection.is_ready())).await;
    assert!(matches!(
        session.execute("SELECT * FROM system.local").await,
        Err(Error::NoConnectionsAvailable)
    ));
}
