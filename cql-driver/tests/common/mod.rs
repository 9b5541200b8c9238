//! In-process fake node speaking the native protocol v2 server side.
#![allow(dead_code)]

use std::io::Cursor;
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use cql_driver::cluster::NodeConnectionConfigBuilder;
use cql_driver::cluster::NodeConnectionConfig;
use cql_driver::frame::events::ServerEvent;
use cql_driver::frame::frame_decoder::FrameDecoder;
use cql_driver::frame::message_error::ErrorBody;
use cql_driver::frame::message_query::BodyReqQuery;
use cql_driver::frame::message_result::{
    ColSpec, ColType, ColTypeOption, ResultKind, RowsMetadata, RowsMetadataFlags, TableSpec,
};
use cql_driver::frame::message_supported::BodyResSupported;
use cql_driver::frame::{Direction, Flags, Frame, FromCursor, Opcode, Serialize, Version};
use cql_driver::retry::ConstantReconnectionPolicy;
use cql_driver::types::CBytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout, Instant};

pub type Responder = Arc<dyn Fn(&Frame) -> Option<Frame> + Send + Sync>;

/// Answers a request with any number of frames, written to the socket at once.
pub type ScriptedResponder = Arc<dyn Fn(&Frame) -> Vec<Frame> + Send + Sync>;

/// How long tests wait for something that should happen promptly.
pub const WAIT_TIMEOUT: Duration = Duration::from_secs(5);

/// Connection config which retries quickly, so reconnection tests stay fast.
pub fn fast_reconnect_config() -> NodeConnectionConfig {
    NodeConnectionConfigBuilder::new()
        .with_reconnection_policy(Arc::new(ConstantReconnectionPolicy::new(
            Duration::from_millis(50),
        )))
        .build()
}

struct FakeNodeState {
    responder: ScriptedResponder,
    split_writes: bool,
    requests: Mutex<Vec<Frame>>,
    accepted: AtomicUsize,
    pushers: Mutex<Vec<mpsc::UnboundedSender<Vec<u8>>>>,
    kill_sender: broadcast::Sender<()>,
}

pub struct FakeNode {
    addr: SocketAddr,
    state: Arc<FakeNodeState>,
    accept_handle: JoinHandle<()>,
}

impl FakeNode {
    /// Starts a node on a random local port answering with [`default_response`].
    pub async fn start() -> Self {
        Self::start_with(Arc::new(default_response), false, "127.0.0.1".parse().unwrap()).await
    }

    pub async fn start_with(responder: Responder, split_writes: bool, ip: IpAddr) -> Self {
        Self::start_scripted(
            Arc::new(move |request: &Frame| -> Vec<Frame> {
                responder(request).into_iter().collect()
            }),
            split_writes,
            ip,
        )
        .await
    }

    pub async fn start_scripted(
        responder: ScriptedResponder,
        split_writes: bool,
        ip: IpAddr,
    ) -> Self {
        let listener = TcpListener::bind(SocketAddr::new(ip, 0)).await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (kill_sender, _) = broadcast::channel(4);
        let state = Arc::new(FakeNodeState {
            responder,
            split_writes,
            requests: Mutex::new(vec![]),
            accepted: AtomicUsize::new(0),
            pushers: Mutex::new(vec![]),
            kill_sender,
        });

        let accept_state = state.clone();
        let accept_handle = tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                accept_state.accepted.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(serve(socket, accept_state.clone()));
            }
        });

        FakeNode {
            addr,
            state,
            accept_handle,
        }
    }

    #[inline]
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Number of accepted TCP connections so far.
    pub fn accepted(&self) -> usize {
        self.state.accepted.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<Frame> {
        self.state.requests.lock().unwrap().clone()
    }

    pub fn requests_with(&self, opcode: Opcode) -> usize {
        self.requests()
            .iter()
            .filter(|request| request.opcode == opcode)
            .count()
    }

    /// Pushes an event to every open client connection.
    pub fn push_event(&self, event: &ServerEvent) {
        let data = event_frame(event).encode();
        for pusher in self.state.pushers.lock().unwrap().iter() {
            let _ = pusher.send(data.clone());
        }
    }

    /// Writes raw bytes to every open client connection.
    pub fn push_raw(&self, data: Vec<u8>) {
        for pusher in self.state.pushers.lock().unwrap().iter() {
            let _ = pusher.send(data.clone());
        }
    }

    /// Drops every open client socket. The node keeps accepting new connections.
    pub fn disconnect_all(&self) {
        let _ = self.state.kill_sender.send(());
    }

    /// Stops accepting and drops every open client socket.
    pub fn stop(&self) {
        self.accept_handle.abort();
        self.disconnect_all();
    }
}

impl Drop for FakeNode {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn serve(socket: tokio::net::TcpStream, state: Arc<FakeNodeState>) {
    let mut kill_receiver = state.kill_sender.subscribe();
    let (mut read_half, mut write_half) = socket.into_split();
    let (push_sender, mut push_receiver) = mpsc::unbounded_channel::<Vec<u8>>();
    state.pushers.lock().unwrap().push(push_sender.clone());

    let mut decoder = FrameDecoder::default();
    let mut buffer = vec![0; 4096];

    loop {
        tokio::select! {
            read = read_half.read(&mut buffer) => {
                let read = match read {
                    Ok(0) | Err(_) => break,
                    Ok(read) => read,
                };

                for request in decoder.consume(&buffer[..read]).unwrap() {
                    state.requests.lock().unwrap().push(request.clone());
                    let responses = (state.responder)(&request);
                    if !responses.is_empty() {
                        let data = responses.iter().flat_map(Frame::encode).collect();
                        let _ = push_sender.send(data);
                    }
                }
            }
            data = push_receiver.recv() => {
                let Some(data) = data else { break };
                if write(&mut write_half, &data, state.split_writes).await.is_err() {
                    break;
                }
            }
            _ = kill_receiver.recv() => break,
        }
    }
}

async fn write(
    write_half: &mut tokio::net::tcp::OwnedWriteHalf,
    data: &[u8],
    split_writes: bool,
) -> std::io::Result<()> {
    if !split_writes {
        return write_half.write_all(data).await;
    }

    for chunk in data.chunks(3) {
        write_half.write_all(chunk).await?;
        write_half.flush().await?;
        sleep(Duration::from_millis(1)).await;
    }

    Ok(())
}

pub fn response(request: &Frame, opcode: Opcode, body: Vec<u8>) -> Frame {
    Frame {
        version: Version::V2,
        direction: Direction::Response,
        flags: Flags::empty(),
        opcode,
        stream: request.stream,
        body,
        tracing_id: None,
    }
}

pub fn event_frame(event: &ServerEvent) -> Frame {
    Frame {
        version: Version::V2,
        direction: Direction::Response,
        flags: Flags::empty(),
        opcode: Opcode::Event,
        stream: -1,
        body: event.serialize_to_vec(),
        tracing_id: None,
    }
}

pub fn ready(request: &Frame) -> Frame {
    response(request, Opcode::Ready, vec![])
}

pub fn error(request: &Frame, error_code: i32, message: &str) -> Frame {
    let body = ErrorBody {
        error_code,
        message: message.into(),
    };

    response(request, Opcode::Error, body.serialize_to_vec())
}

pub fn void_result(request: &Frame) -> Frame {
    response(request, Opcode::Result, ResultKind::Void.serialize_to_vec())
}

/// Builds a `ROWS` result with a global table spec and the given column types.
pub fn rows_result(
    request: &Frame,
    table: &str,
    columns: &[(&str, ColType)],
    rows: Vec<Vec<Option<Vec<u8>>>>,
) -> Frame {
    let metadata = RowsMetadata {
        flags: RowsMetadataFlags::GLOBAL_TABLE_SPACE,
        columns_count: columns.len() as i32,
        global_table_spec: Some(TableSpec {
            ks_name: "system".into(),
            table_name: table.into(),
        }),
        col_specs: columns
            .iter()
            .map(|(name, col_type)| ColSpec {
                table_spec: None,
                name: (*name).into(),
                col_type: ColTypeOption::simple(*col_type),
            })
            .collect(),
    };

    let mut body = ResultKind::Rows.serialize_to_vec();
    body.extend(metadata.serialize_to_vec());
    body.extend((rows.len() as i32).serialize_to_vec());

    for value in rows.into_iter().flatten() {
        let value = match value {
            Some(bytes) => CBytes::new(bytes),
            None => CBytes::new_null(),
        };
        body.extend(value.serialize_to_vec());
    }

    response(request, Opcode::Result, body)
}

/// Encodes an IP address the way `inet` columns carry it.
pub fn inet_bytes(ip: IpAddr) -> Vec<u8> {
    match ip {
        IpAddr::V4(ip) => ip.octets().to_vec(),
        IpAddr::V6(ip) => ip.octets().to_vec(),
    }
}

/// `system.peers` rows, each given as `(peer, rpc_address)`.
pub fn peers_result(request: &Frame, peers: &[(IpAddr, Option<IpAddr>)]) -> Frame {
    rows_result(
        request,
        "peers",
        &[("peer", ColType::Inet), ("rpc_address", ColType::Inet)],
        peers
            .iter()
            .map(|(peer, rpc_address)| {
                vec![Some(inet_bytes(*peer)), rpc_address.map(inet_bytes)]
            })
            .collect(),
    )
}

pub fn query_text(request: &Frame) -> Option<String> {
    if request.opcode != Opcode::Query {
        return None;
    }

    BodyReqQuery::from_cursor(&mut Cursor::new(request.body.as_slice()))
        .ok()
        .map(|body| body.query)
}

/// Answers the handshake, `OPTIONS`, an empty `system.peers`, `system.local` with a cluster name
/// and a `VOID` result for any other query.
pub fn default_response(request: &Frame) -> Option<Frame> {
    match request.opcode {
        Opcode::Startup | Opcode::Register => Some(ready(request)),
        Opcode::Options => {
            let supported = BodyResSupported {
                data: vec![
                    ("CQL_VERSION".into(), vec!["3.0.0".into()]),
                    ("COMPRESSION".into(), vec!["snappy".into()]),
                ],
            };
            Some(response(
                request,
                Opcode::Supported,
                supported.serialize_to_vec(),
            ))
        }
        Opcode::Query => match query_text(request).as_deref() {
            Some("SELECT * FROM system.peers") => Some(peers_result(request, &[])),
            Some("SELECT * FROM system.local") => Some(rows_result(
                request,
                "local",
                &[("cluster_name", ColType::Varchar)],
                vec![vec![Some(b"Fake Cluster".to_vec())]],
            )),
            _ => Some(void_result(request)),
        },
        _ => None,
    }
}

/// A local address nothing listens on.
pub fn dead_addr() -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap()
}

/// Polls `condition` until it holds, panicking after [`WAIT_TIMEOUT`].
pub async fn wait_for(mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + WAIT_TIMEOUT;
    while !condition() {
        assert!(Instant::now() < deadline, "condition not met in time");
        sleep(Duration::from_millis(10)).await;
    }
}

/// Awaits a future, panicking after [`WAIT_TIMEOUT`].
pub async fn within<F: std::future::Future>(future: F) -> F::Output {
    timeout(WAIT_TIMEOUT, future)
        .await
        .expect("operation timed out")
}
