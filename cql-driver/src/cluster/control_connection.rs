use arc_swap::ArcSwap;
use derive_more::Constructor;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio::sync::broadcast::Sender;
use tokio::sync::mpsc::Receiver;
use tracing::*;

use crate::cluster::ConnectionManager;
use crate::frame::events::{ServerEvent, TopologyChangeType};
use crate::transport::CqlTransport;

/// Consumes events pushed to the event connection: every event is re-broadcast to session
/// subscribers and topology changes are applied to the connection list. This is the only writer
/// of the list after bootstrap.
#[derive(Constructor)]
pub struct ControlConnection<T: CqlTransport + 'static, CM: ConnectionManager<T> + 'static> {
    connections: Arc<ArcSwap<Vec<Arc<T>>>>,
    connection_manager: Arc<CM>,
    event_sender: Sender<ServerEvent>,
    port: u16,
}

impl<T: CqlTransport, CM: ConnectionManager<T>> ControlConnection<T, CM> {
    pub async fn run(self, mut event_receiver: Receiver<ServerEvent>) {
        while let Some(event) = event_receiver.recv().await {
            self.process_event(event);
        }

        debug!("Event connection closed, no more server events.");
    }

    pub fn process_event(&self, event: ServerEvent) {
        if let ServerEvent::TopologyChange(change) = &event {
            let ip = change.addr().ip();
            match change.change_type {
                TopologyChangeType::NewNode => self.add_node(ip),
                TopologyChangeType::RemovedNode => self.remove_node(ip),
                TopologyChangeType::MovedNode => {}
            }
        }

        // no subscribers is fine
        let _ = self.event_sender.send(event);
    }

    fn add_node(&self, ip: IpAddr) {
        let connections = self.connections.load();
        if connections
            .iter()
            .any(|connection| connection.address().ip() == ip)
        {
            debug!(%ip, "Ignoring new node which is already connected.");
            return;
        }

        let addr = SocketAddr::new(ip, self.port);
        info!(%addr, "Adding new node.");

        let mut updated = Vec::clone(&connections);
        updated.push(Arc::new(self.connection_manager.open(addr)));

        self.connections.store(Arc::new(updated));
    }

    fn remove_node(&self, ip: IpAddr) {
        let (removed, kept): (Vec<_>, Vec<_>) = self
            .connections
            .load()
            .iter()
            .cloned()
            .partition(|connection| connection.address().ip() == ip);

        if removed.is_empty() {
            return;
        }

        info!(%ip, "Removing node.");
        self.connections.store(Arc::new(kept));

        for connection in removed {
            connection.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::connection_manager::MockConnectionManager;
    use crate::frame::events::{StatusChange, StatusChangeType, TopologyChange};
    use crate::transport::MockCqlTransport;
    use crate::types::CInet;
    use tokio::sync::broadcast;

    fn transport(addr: SocketAddr, expect_close: bool) -> MockCqlTransport {
        let mut transport = MockCqlTransport::new();
        transport.expect_address().return_const(addr);
        transport
            .expect_close()
            .times(usize::from(expect_close))
            .return_const(());

        transport
    }

    fn topology_change(change_type: TopologyChangeType, addr: SocketAddr) -> ServerEvent {
        ServerEvent::TopologyChange(TopologyChange {
            change_type,
            addr: CInet::new(addr),
        })
    }

    fn control_connection(
        connections: Vec<MockCqlTransport>,
        connection_manager: MockConnectionManager<MockCqlTransport>,
    ) -> (
        ControlConnection<MockCqlTransport, MockConnectionManager<MockCqlTransport>>,
        Arc<ArcSwap<Vec<Arc<MockCqlTransport>>>>,
        broadcast::Receiver<ServerEvent>,
    ) {
        let connections = Arc::new(ArcSwap::from_pointee(
            connections.into_iter().map(Arc::new).collect::<Vec<_>>(),
        ));
        let (event_sender, event_receiver) = broadcast::channel(16);

        (
            ControlConnection::new(
                connections.clone(),
                Arc::new(connection_manager),
                event_sender,
                9042,
            ),
            connections,
            event_receiver,
        )
    }

    #[test]
    fn should_add_new_node_once() {
        let existing: SocketAddr = "10.0.0.1:9042".parse().unwrap();
        let new_node: SocketAddr = "10.0.0.2:9042".parse().unwrap();

        let mut connection_manager = MockConnectionManager::new();
        connection_manager
            .expect_open()
            .withf(move |addr| *addr == new_node)
            .times(1)
            .returning(|addr| transport(addr, false));

        let (control, connections, _events) = control_connection(
            vec![transport(existing, false)],
            connection_manager,
        );

        control.process_event(topology_change(TopologyChangeType::NewNode, new_node));
        control.process_event(topology_change(TopologyChangeType::NewNode, new_node));

        let addresses: Vec<SocketAddr> = connections
            .load()
            .iter()
            .map(|connection| connection.address())
            .collect();
        assert_eq!(addresses, vec![existing, new_node]);
    }

    #[test]
    fn should_use_session_port_for_new_nodes() {
        let mut connection_manager = MockConnectionManager::new();
        connection_manager
            .expect_open()
            .withf(|addr| *addr == "10.0.0.7:9042".parse::<SocketAddr>().unwrap())
            .times(1)
            .returning(|addr| transport(addr, false));

        let (control, connections, _events) = control_connection(vec![], connection_manager);

        control.process_event(topology_change(
            TopologyChangeType::NewNode,
            "10.0.0.7:7000".parse().unwrap(),
        ));

        assert_eq!(connections.load().len(), 1);
    }

    #[test]
    fn should_remove_and_close_node() {
        let kept: SocketAddr = "10.0.0.1:9042".parse().unwrap();
        let removed: SocketAddr = "10.0.0.2:9042".parse().unwrap();

        let (control, connections, _events) = control_connection(
            vec![transport(kept, false), transport(removed, true)],
            MockConnectionManager::new(),
        );

        control.process_event(topology_change(TopologyChangeType::RemovedNode, removed));
        control.process_event(topology_change(TopologyChangeType::RemovedNode, removed));

        let addresses: Vec<SocketAddr> = connections
            .load()
            .iter()
            .map(|connection| connection.address())
            .collect();
        assert_eq!(addresses, vec![kept]);
    }

    #[test]
    fn should_ignore_other_events_but_broadcast_them() {
        let addr: SocketAddr = "10.0.0.1:9042".parse().unwrap();
        let (control, connections, mut events) =
            control_connection(vec![transport(addr, false)], MockConnectionManager::new());

        let status = ServerEvent::StatusChange(StatusChange {
            change_type: StatusChangeType::Down,
            addr: CInet::new(addr),
        });
        control.process_event(status.clone());
        control.process_event(topology_change(TopologyChangeType::MovedNode, addr));

        assert_eq!(connections.load().len(), 1);
        assert_eq!(events.try_recv().unwrap(), status);
        assert_eq!(
            events.try_recv().unwrap(),
            topology_change(TopologyChangeType::MovedNode, addr)
        );
    }

    #[tokio::test]
    async fn should_stop_when_event_connection_closes() {
        let (control, _connections, _events) =
            control_connection(vec![], MockConnectionManager::new());
        let (event_sender, event_receiver) = tokio::sync::mpsc::channel(1);
        drop(event_sender);

        control.run(event_receiver).await;
    }
}
