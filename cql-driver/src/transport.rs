//! This module contains the declaration of the `CqlTransport` trait, the seam between the
//! session and a single node connection, and [`NodeConnection`], its TCP implementation.
//!
//! A [`NodeConnection`] multiplexes up to [`MAX_STREAMS`] concurrent requests over one socket.
//! Each connection is served by a single background task which performs the `STARTUP` handshake,
//! feeds the socket from a write queue, reassembles response frames, resolves pending requests by
//! stream id and re-establishes the session according to its
//! [`ReconnectionPolicy`](crate::retry::ReconnectionPolicy).
use atomic::Atomic;
use bytemuck::NoUninit;
use derive_more::Display;
use futures::FutureExt;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufWriter};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, Notify};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout_at, Instant};
use tracing::*;

#[cfg(test)]
use mockall::*;

use crate::cluster::NodeConnectionConfig;
use crate::consistency::Consistency;
use crate::frame::events::{ServerEvent, SimpleServerEvent};
use crate::frame::frame_decoder::FrameDecoder;
use crate::frame::message_response::ResponseBody;
use crate::frame::message_result::ResResultBody;
use crate::frame::message_supported::BodyResSupported;
use crate::frame::{Frame, Opcode, StreamId};
use crate::future::BoxFuture;
use crate::retry::ReconnectionSchedule;
use crate::Error;
use crate::Result;

pub use self::stream_table::MAX_STREAMS;
use self::stream_table::StreamTable;

mod stream_table;

const READ_BUFFER_SIZE: usize = 64 * 1024;
const HANDSHAKE_STREAM: StreamId = 0;

/// General CQL transport trait.
pub trait CqlTransport: Send + Sync {
    /// Executes a query and waits for its result.
    fn query<'a>(
        &'a self,
        query: &'a str,
        consistency: Consistency,
    ) -> BoxFuture<'a, Result<ResResultBody>>;

    /// Checks if the connection has completed its handshake and can take requests.
    fn is_ready(&self) -> bool;

    /// Returns associated node address.
    fn address(&self) -> SocketAddr;

    /// Closes the connection for good.
    fn close(&self);
}

#[cfg(test)]
mock! {
    pub CqlTransport {
    }

    impl CqlTransport for CqlTransport {
        fn query(&self, query: &str, consistency: Consistency) -> BoxFuture<'static, Result<ResResultBody>>;

        fn is_ready(&self) -> bool;

        fn address(&self) -> SocketAddr;

        fn close(&self);
    }
}

/// Lifecycle state of a node connection.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Display, NoUninit)]
#[repr(u8)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Ready,
}

type ResponseHandler = oneshot::Sender<Result<Frame>>;

/// State guarded by a single lock, so that a stream can only be acquired while the connection
/// has a live writer and every acquired stream is failed when the writer goes away.
struct Requests {
    streams: StreamTable<ResponseHandler>,
    write_sender: Option<mpsc::Sender<Vec<u8>>>,
}

struct ConnectionShared {
    addr: SocketAddr,
    config: NodeConnectionConfig,
    state: Atomic<ConnectionState>,
    closed: AtomicBool,
    close_signal: Notify,
    reconnection_attempts: AtomicUsize,
    requests: Mutex<Requests>,
    stream_released: Notify,
    event_handler: Option<mpsc::Sender<ServerEvent>>,
}

/// Multiplexed TCP connection to a single node.
pub struct NodeConnection {
    shared: Arc<ConnectionShared>,
    driver_handle: JoinHandle<()>,
}

impl NodeConnection {
    /// Connects to the node and waits for the handshake to complete. A failure of this first
    /// attempt is returned to the caller and no reconnection is attempted. Once established, lost
    /// connections are re-established according to the configured reconnection policy.
    ///
    /// When `event_handler` is given, the connection registers for all server events and forwards
    /// them to the handler.
    pub async fn connect(
        addr: SocketAddr,
        config: NodeConnectionConfig,
        event_handler: Option<mpsc::Sender<ServerEvent>>,
    ) -> Result<Self> {
        let (sender, receiver) = oneshot::channel();
        let connection = Self::spawn(addr, config, event_handler, Some(sender));

        receiver.await.map_err(|_| Error::Disconnected(addr))??;
        Ok(connection)
    }

    /// Creates a connection which establishes itself in the background. Failed attempts, the
    /// first one included, are retried according to the reconnection policy. Must be called
    /// within a tokio runtime.
    pub fn open(
        addr: SocketAddr,
        config: NodeConnectionConfig,
        event_handler: Option<mpsc::Sender<ServerEvent>>,
    ) -> Self {
        Self::spawn(addr, config, event_handler, None)
    }

    fn spawn(
        addr: SocketAddr,
        config: NodeConnectionConfig,
        event_handler: Option<mpsc::Sender<ServerEvent>>,
        connect_result: Option<oneshot::Sender<Result<()>>>,
    ) -> Self {
        let shared = Arc::new(ConnectionShared {
            addr,
            config,
            state: Atomic::new(ConnectionState::Disconnected),
            closed: AtomicBool::new(false),
            close_signal: Notify::new(),
            reconnection_attempts: AtomicUsize::new(0),
            requests: Mutex::new(Requests {
                streams: StreamTable::default(),
                write_sender: None,
            }),
            stream_released: Notify::new(),
            event_handler,
        });

        let driver_handle = tokio::spawn(Self::drive(shared.clone(), connect_result));

        NodeConnection {
            shared,
            driver_handle,
        }
    }

    #[inline]
    pub fn state(&self) -> ConnectionState {
        self.shared.state()
    }

    #[inline]
    pub fn is_ready(&self) -> bool {
        self.state() == ConnectionState::Ready
    }

    #[inline]
    pub fn addr(&self) -> SocketAddr {
        self.shared.addr
    }

    /// Number of consecutive failed connection cycles since the last successful handshake.
    #[inline]
    pub fn reconnection_attempts(&self) -> usize {
        self.shared.reconnection_attempts.load(Ordering::Relaxed)
    }

    /// Number of requests waiting for a response.
    pub fn in_flight(&self) -> usize {
        self.shared.requests().streams.live()
    }

    /// Sends a `QUERY` and waits for its result. Server `ERROR` responses are returned as
    /// [`Error::Server`] and leave the connection usable.
    pub async fn query(&self, query: &str, consistency: Consistency) -> Result<ResResultBody> {
        let frame = self
            .send_request(|stream| Frame::new_req_query(query.to_string(), consistency, stream))
            .await?;

        let opcode = frame.opcode;
        self.shared
            .response_body(frame)?
            .into_result()
            .ok_or(Error::UnsupportedOpcode(opcode))
    }

    /// Asks the node which startup options it supports.
    pub async fn options(&self) -> Result<BodyResSupported> {
        let frame = self.send_request(Frame::new_req_options).await?;

        let opcode = frame.opcode;
        self.shared
            .response_body(frame)?
            .into_supported()
            .ok_or(Error::UnsupportedOpcode(opcode))
    }

    /// Closes the socket and disables reconnection. Pending requests fail with
    /// [`Error::Disconnected`]. Calling it more than once has no effect.
    pub fn close(&self) {
        if self.shared.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        debug!(addr = %self.shared.addr, "Closing connection");
        self.shared.close_signal.notify_one();
    }

    async fn send_request(&self, request: impl FnOnce(StreamId) -> Frame) -> Result<Frame> {
        let (sender, receiver) = oneshot::channel();
        let (stream_id, write_sender) = self.shared.acquire_stream(sender).await?;

        // a failed send means the writer is gone and the handler gets failed on disconnect
        let _ = write_sender.send(request(stream_id).encode()).await;

        receiver
            .await
            .map_err(|_| Error::Disconnected(self.shared.addr))?
    }

    async fn drive(
        shared: Arc<ConnectionShared>,
        mut connect_result: Option<oneshot::Sender<Result<()>>>,
    ) {
        let mut schedule: Option<Box<dyn ReconnectionSchedule + Send + Sync>> = None;

        while !shared.is_closed() {
            shared.set_state(ConnectionState::Connecting);

            let established = tokio::select! {
                result = shared.establish() => result,
                _ = shared.close_signal.notified() => break,
            };

            match established {
                Ok((socket, decoder)) => {
                    if shared.is_closed() {
                        break;
                    }

                    schedule = None;
                    shared.reconnection_attempts.store(0, Ordering::Relaxed);

                    let write_receiver = shared.mark_ready();
                    debug!(addr = %shared.addr, "Connection ready");

                    if let Some(connect_result) = connect_result.take() {
                        let _ = connect_result.send(Ok(()));
                    }

                    tokio::select! {
                        result = shared.process(socket, decoder, write_receiver) => {
                            if let Err(error) = result {
                                error!(%error, addr = %shared.addr, "Transport error!");
                            }
                        }
                        _ = shared.close_signal.notified() => {}
                    }

                    shared.disconnect();
                }
                Err(error) => {
                    shared.set_state(ConnectionState::Disconnected);

                    if let Some(connect_result) = connect_result.take() {
                        let _ = connect_result.send(Err(error));
                        return;
                    }

                    error!(%error, addr = %shared.addr, "Failed to connect!");
                }
            }

            if shared.is_closed() {
                break;
            }

            let attempt = shared.reconnection_attempts.fetch_add(1, Ordering::Relaxed) + 1;
            let delay = schedule
                .get_or_insert_with(|| shared.config.reconnection_policy.new_node_schedule())
                .next_delay();

            let Some(delay) = delay else {
                debug!(addr = %shared.addr, "Reconnection policy gave up");
                break;
            };

            debug!(addr = %shared.addr, attempt, ?delay, "Reconnecting");

            tokio::select! {
                _ = sleep(delay) => {}
                _ = shared.close_signal.notified() => break,
            }
        }

        shared.set_state(ConnectionState::Disconnected);
    }
}

impl CqlTransport for NodeConnection {
    #[inline]
    fn query<'a>(
        &'a self,
        query: &'a str,
        consistency: Consistency,
    ) -> BoxFuture<'a, Result<ResResultBody>> {
        NodeConnection::query(self, query, consistency).boxed()
    }

    #[inline]
    fn is_ready(&self) -> bool {
        NodeConnection::is_ready(self)
    }

    #[inline]
    fn address(&self) -> SocketAddr {
        self.addr()
    }

    #[inline]
    fn close(&self) {
        NodeConnection::close(self)
    }
}

impl Drop for NodeConnection {
    fn drop(&mut self) {
        self.close();
        self.driver_handle.abort();
    }
}

impl ConnectionShared {
    #[inline]
    fn state(&self) -> ConnectionState {
        self.state.load(Ordering::Acquire)
    }

    #[inline]
    fn set_state(&self, state: ConnectionState) {
        self.state.store(state, Ordering::Release);
    }

    #[inline]
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    #[inline]
    fn requests(&self) -> MutexGuard<'_, Requests> {
        self.requests.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn acquire_stream(
        &self,
        mut handler: ResponseHandler,
    ) -> Result<(StreamId, mpsc::Sender<Vec<u8>>)> {
        let deadline = self
            .config
            .stream_wait_timeout
            .map(|timeout| Instant::now() + timeout);

        loop {
            let released = self.stream_released.notified();

            {
                let mut requests = self.requests();
                let write_sender = match &requests.write_sender {
                    Some(write_sender) if !self.is_closed() => write_sender.clone(),
                    _ => return Err(Error::NotReady(self.addr)),
                };

                match requests.streams.acquire(handler) {
                    Ok(stream_id) => return Ok((stream_id, write_sender)),
                    Err(returned) => handler = returned,
                }
            }

            let Some(deadline) = deadline else {
                return Err(Error::NoAvailableStreams(self.addr));
            };

            if timeout_at(deadline, released).await.is_err() {
                return Err(Error::Timeout(format!(
                    "no stream became available on connection to {}",
                    self.addr
                )));
            }
        }
    }

    fn mark_ready(&self) -> mpsc::Receiver<Vec<u8>> {
        let (write_sender, write_receiver) = mpsc::channel(self.config.write_buffer_size);

        let mut requests = self.requests();
        requests.write_sender = Some(write_sender);
        self.set_state(ConnectionState::Ready);

        write_receiver
    }

    /// Fails every in-flight request and stops accepting new ones until the next handshake.
    fn disconnect(&self) {
        let handlers = {
            let mut requests = self.requests();
            self.set_state(ConnectionState::Disconnected);
            requests.write_sender = None;
            requests.streams.drain()
        };

        if !handlers.is_empty() {
            debug!(addr = %self.addr, count = handlers.len(), "Failing in-flight requests");
        }

        for handler in handlers {
            let _ = handler.send(Err(Error::Disconnected(self.addr)));
        }

        self.stream_released.notify_waiters();
    }

    async fn establish(&self) -> Result<(TcpStream, FrameDecoder)> {
        debug!(addr = %self.addr, "Connecting");

        let mut socket = TcpStream::connect(self.addr).await?;
        socket.set_nodelay(self.config.tcp_nodelay)?;

        let mut decoder = FrameDecoder::default();

        let response = self
            .handshake_request(
                &mut socket,
                &mut decoder,
                Frame::new_req_startup(HANDSHAKE_STREAM),
            )
            .await?;
        self.expect_ready(&response)?;

        if self.event_handler.is_some() {
            let response = self
                .handshake_request(
                    &mut socket,
                    &mut decoder,
                    Frame::new_req_register(SimpleServerEvent::all(), HANDSHAKE_STREAM),
                )
                .await?;
            self.expect_ready(&response)?;

            debug!(addr = %self.addr, "Registered for server events");
        }

        Ok((socket, decoder))
    }

    /// Writes a handshake request directly to the socket and reads until the response with the
    /// same stream id arrives. Events read along the way are dispatched like on a ready
    /// connection.
    async fn handshake_request(
        &self,
        socket: &mut TcpStream,
        decoder: &mut FrameDecoder,
        request: Frame,
    ) -> Result<Frame> {
        socket.write_all(&request.encode()).await?;

        let mut buffer = vec![0; READ_BUFFER_SIZE];
        let mut response = None;

        loop {
            let read = socket.read(&mut buffer).await?;
            if read == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "connection closed during handshake",
                )
                .into());
            }

            for frame in decoder.consume(&buffer[..read])? {
                if frame.is_event() {
                    self.dispatch_event(frame).await;
                } else if frame.stream == request.stream && response.is_none() {
                    response = Some(frame);
                } else {
                    warn!(
                        stream_id = frame.stream,
                        addr = %self.addr,
                        "Dropping unexpected frame during handshake"
                    );
                }
            }

            if let Some(response) = response.take() {
                return Ok(response);
            }
        }
    }

    fn expect_ready(&self, frame: &Frame) -> Result<()> {
        match frame.opcode {
            Opcode::Ready => Ok(()),
            Opcode::Error => match frame.response_body()? {
                ResponseBody::Error(body) => Err(Error::Server {
                    body,
                    addr: self.addr,
                }),
                _ => Err(Error::UnexpectedStartupResponse(frame.opcode)),
            },
            opcode => Err(Error::UnexpectedStartupResponse(opcode)),
        }
    }

    fn response_body(&self, frame: Frame) -> Result<ResponseBody> {
        match frame.response_body()? {
            ResponseBody::Error(body) => Err(Error::Server {
                body,
                addr: self.addr,
            }),
            body => Ok(body),
        }
    }

    async fn process(
        &self,
        socket: TcpStream,
        decoder: FrameDecoder,
        write_receiver: mpsc::Receiver<Vec<u8>>,
    ) -> Result<()> {
        let (read_half, write_half) = socket.into_split();

        let writer = Self::start_writing(write_receiver, BufWriter::new(write_half));
        let reader = self.start_reading(read_half, decoder);

        tokio::try_join!(writer, reader).map(|_| ())
    }

    async fn start_reading(
        &self,
        mut read_half: impl AsyncRead + Unpin,
        mut decoder: FrameDecoder,
    ) -> Result<()> {
        let mut buffer = vec![0; READ_BUFFER_SIZE];

        loop {
            let read = read_half.read(&mut buffer).await?;
            if read == 0 {
                if decoder.pending_len() > 0 {
                    warn!(
                        pending = decoder.pending_len(),
                        addr = %self.addr,
                        "Connection closed in the middle of a frame"
                    );
                }

                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "connection closed by peer",
                )
                .into());
            }

            for frame in decoder.consume(&buffer[..read])? {
                if frame.is_event() {
                    self.dispatch_event(frame).await;
                } else {
                    self.complete(frame);
                }
            }
        }
    }

    async fn start_writing(
        mut write_receiver: mpsc::Receiver<Vec<u8>>,
        mut write_half: impl AsyncWrite + Unpin,
    ) -> Result<()> {
        while let Some(mut data) = write_receiver.recv().await {
            loop {
                write_half.write_all(&data).await?;

                data = match write_receiver.try_recv() {
                    Ok(data) => data,
                    Err(_) => break,
                }
            }

            write_half.flush().await?;
        }

        Ok(())
    }

    fn complete(&self, frame: Frame) {
        let handler = self.requests().streams.release(frame.stream);
        match handler {
            Some(handler) => {
                self.stream_released.notify_one();
                let _ = handler.send(Ok(frame));
            }
            None => {
                warn!(
                    stream_id = frame.stream,
                    addr = %self.addr,
                    "Dropping response for unknown stream"
                );
            }
        }
    }

    async fn dispatch_event(&self, frame: Frame) {
        let Some(event_handler) = &self.event_handler else {
            return;
        };

        match frame.response_body().map(ResponseBody::into_server_event) {
            Ok(Some(event)) => {
                let _ = event_handler.send(event).await;
            }
            Ok(None) => {
                warn!(opcode = %frame.opcode, addr = %self.addr, "Unexpected frame on event stream");
            }
            Err(error) => {
                warn!(%error, addr = %self.addr, "Failed to decode server event");
            }
        }
    }
}
