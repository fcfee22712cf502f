/*
 * Created on Tue Jul 14 2026
 *
 * This file is a part of Skyconf
 * Skyconf is a free and open-source YANG-driven configuration management
 * engine written by Sayan Nandan ("the Author") with the vision to provide
 * safe, transactional network configuration without compromising on
 * correctness or performance.
 *
 * Copyright (c) 2026, Sayan Nandan <ohsayan@outlook.com>
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program. If not, see <https://www.gnu.org/licenses/>.
 *
*/

//! # Session networking
//!
//! The listener accepts clients up to the connection limit and drives one
//! [`ConnectionHandler`] task per session. A handler loops over three
//! signals: the next framed request on the socket, the session's
//! notification channel, and engine termination. Requests on one session
//! are processed strictly in arrival order; the handler only yields at the
//! read/write suspension points, so each datastore mutation appears atomic
//! to every other session.
//!
//! On EOF (or a kill signal) the session is detached, releasing its locks
//! and subscriptions.

use crate::engine::Engine;
use crate::protocol::{self, Response, MAX_FRAME};
use crate::queryengine;
use crate::streams::{SessionMsg, NOTIFICATION_NS};
use crate::IoResult;
use bytes::{Buf, BytesMut};
use libskyconf::BUF_CAP;
use std::sync::atomic::{AtomicU8, Ordering};
use std::future::Future;
use std::io::{Error as IoError, ErrorKind as IoErrorKind};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufWriter};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc, Semaphore};
use tokio::time;

/// The user every socket session runs as. The framing carries no
/// credentials; authentication fronts the engine and is out of scope here.
const SESSION_USER: &str = "default";

/// A wrapper around the shutdown broadcast channel
pub struct Terminator {
    terminate: bool,
    signal: broadcast::Receiver<()>,
}

impl Terminator {
    pub fn new(signal: broadcast::Receiver<()>) -> Self {
        Self {
            terminate: false,
            signal,
        }
    }
    /// Wait for the shutdown signal; completes immediately once received
    pub async fn receive_signal(&mut self) {
        if !self.terminate {
            let _ = self.signal.recv().await;
            self.terminate = true;
        }
    }
}

/// A backoff implementation that is meant to be used in connection loops
struct NetBackoff {
    c: AtomicU8,
}

impl NetBackoff {
    /// The maximum backoff duration
    const MAX_BACKOFF: u8 = 64;
    const fn new() -> Self {
        Self { c: AtomicU8::new(1) }
    }
    /// Wait for the current backoff duration
    async fn spin(&self) {
        let c = self.c.load(Ordering::Relaxed);
        time::sleep(Duration::from_secs(c as _)).await;
        self.c.store(c << 1, Ordering::Relaxed);
    }
    /// Should we give up on the listener?
    fn should_disconnect(&self) -> bool {
        self.c.load(Ordering::Relaxed) > Self::MAX_BACKOFF
    }
}

/// What the frame reader produced
pub enum FrameResult {
    /// A complete frame body (without the length prefix)
    Frame(Vec<u8>),
    /// The client closed the connection
    Disconnected,
}

/// A framed client connection
pub struct Connection {
    stream: BufWriter<TcpStream>,
    buffer: BytesMut,
}

impl Connection {
    pub fn new(stream: TcpStream) -> Self {
        Self {
            stream: BufWriter::new(stream),
            buffer: BytesMut::with_capacity(BUF_CAP),
        }
    }
    /// Read the next length-prefixed frame. Cancel-safe: partial reads stay
    /// in the buffer.
    pub async fn read_frame(&mut self) -> IoResult<FrameResult> {
        loop {
            if self.buffer.len() >= 4 {
                let len = u32::from_be_bytes([
                    self.buffer[0],
                    self.buffer[1],
                    self.buffer[2],
                    self.buffer[3],
                ]) as usize;
                if len > MAX_FRAME {
                    return Err(IoError::new(IoErrorKind::InvalidData, "oversized frame"));
                }
                if self.buffer.len() >= 4 + len {
                    self.buffer.advance(4);
                    let frame = self.buffer.split_to(len).to_vec();
                    return Ok(FrameResult::Frame(frame));
                }
            }
            if self.stream.read_buf(&mut self.buffer).await? == 0 {
                if self.buffer.is_empty() {
                    return Ok(FrameResult::Disconnected);
                }
                return Err(IoError::from(IoErrorKind::ConnectionReset));
            }
        }
    }
    /// Write one reply frame and flush it
    pub async fn write_response(&mut self, resp: &Response) -> IoResult<()> {
        self.stream
            .write_all(&protocol::encode_response(resp))
            .await?;
        self.stream.flush().await
    }
}

/// Drives one client session
pub struct ConnectionHandler {
    engine: Engine,
    con: Connection,
    session: u64,
    rx: mpsc::UnboundedReceiver<SessionMsg>,
    climit: Arc<Semaphore>,
    termination_signal: broadcast::Receiver<()>,
    // dropped when the handler finishes; used for graceful drain
    _term_sig_tx: mpsc::Sender<()>,
}

impl ConnectionHandler {
    pub fn new(
        engine: Engine,
        con: Connection,
        climit: Arc<Semaphore>,
        termination_signal: broadcast::Receiver<()>,
        _term_sig_tx: mpsc::Sender<()>,
    ) -> Self {
        let (session, rx) = engine.attach_session(SESSION_USER);
        Self {
            engine,
            con,
            session,
            rx,
            climit,
            termination_signal,
            _term_sig_tx,
        }
    }
    pub async fn run(&mut self) -> IoResult<()> {
        loop {
            tokio::select! {
                frame = self.con.read_frame() => {
                    match frame? {
                        FrameResult::Frame(buf) => match protocol::decode_request(&buf) {
                            Ok(req) => {
                                queryengine::execute(&self.engine, &mut self.con, self.session, req)
                                    .await?
                            }
                            Err(e) => self.con.write_response(&Response::err_from(&e)).await?,
                        },
                        FrameResult::Disconnected => return Ok(()),
                    }
                }
                msg = self.rx.recv() => {
                    match msg {
                        Some(SessionMsg::Event(envelope)) => {
                            self.con
                                .write_response(&Response::Notify(envelope.into_bytes()))
                                .await?
                        }
                        Some(SessionMsg::SubscriptionDone { stream }) => {
                            let terminal = format!(
                                "<notificationComplete xmlns=\"{}\"><stream>{}</stream></notificationComplete>",
                                NOTIFICATION_NS, stream
                            );
                            self.con
                                .write_response(&Response::Notify(terminal.into_bytes()))
                                .await?
                        }
                        Some(SessionMsg::Kill) | None => return Ok(()),
                    }
                }
                _ = self.termination_signal.recv() => return Ok(()),
            }
        }
    }
}

impl Drop for ConnectionHandler {
    fn drop(&mut self) {
        // the session may already be detached (kill); this is idempotent
        self.engine.detach_session(self.session);
        // return the permit even if the handler panicked
        self.climit.add_permits(1);
    }
}

/// The base TCP listener
pub struct Listener {
    engine: Engine,
    listener: TcpListener,
    climit: Arc<Semaphore>,
    signal: broadcast::Sender<()>,
    terminate_tx: mpsc::Sender<()>,
}

impl Listener {
    async fn accept(&mut self) -> IoResult<TcpStream> {
        let backoff = NetBackoff::new();
        loop {
            match self.listener.accept().await {
                // we don't need the bindaddr
                Ok((stream, _)) => return Ok(stream),
                Err(e) => {
                    if backoff.should_disconnect() {
                        return Err(e);
                    }
                }
            }
            backoff.spin().await;
        }
    }
    pub async fn run(&mut self) -> IoResult<()> {
        loop {
            // take the permit first; it is returned by the handler's Drop
            match self.climit.acquire().await {
                Ok(permit) => permit.forget(),
                Err(_) => return Ok(()),
            }
            /*
             Ignore accept errors instead of terminating the whole server:
             transient connection failures are common and flooding the log
             with them helps nobody
            */
            let stream = skip_loop_err!(self.accept().await);
            let mut chandle = ConnectionHandler::new(
                self.engine.clone(),
                Connection::new(stream),
                self.climit.clone(),
                self.signal.subscribe(),
                self.terminate_tx.clone(),
            );
            tokio::spawn(async move {
                if let Err(e) = chandle.run().await {
                    log::error!("Session error: {}", e);
                }
            });
        }
    }
}

/// Bind the listener, start the background services and serve until the
/// termination future resolves; returns the engine for shutdown
pub async fn run(engine: Engine, sig: impl Future<Output = ()>) -> IoResult<Engine> {
    let opts = engine.shared.opts.clone();
    let listener = TcpListener::bind((opts.host, opts.port)).await?;
    run_with_listener(engine, listener, sig).await
}

/// Serve on an already-bound listener (the test suite binds ephemeral ports)
pub async fn run_with_listener(
    engine: Engine,
    listener: TcpListener,
    sig: impl Future<Output = ()>,
) -> IoResult<Engine> {
    let opts = engine.shared.opts.clone();
    let (signal, _) = broadcast::channel(1);
    let (terminate_tx, mut terminate_rx) = mpsc::channel::<()>(1);
    if let Ok(addr) = listener.local_addr() {
        log::info!("Server started on {}", addr);
    }
    let timer = tokio::spawn(crate::services::stream_timer::stream_timer_service(
        engine.clone(),
        Terminator::new(signal.subscribe()),
    ));
    let mut server = Listener {
        engine: engine.clone(),
        listener,
        climit: Arc::new(Semaphore::new(opts.maxcon)),
        signal: signal.clone(),
        terminate_tx,
    };
    tokio::select! {
        ret = server.run() => {
            if let Err(e) = ret {
                log::error!("Listener failed with: {}", e);
            }
        }
        _ = sig => {
            log::info!("Signalling all workers to shut down");
        }
    }
    // stop accepting, tell every handler to wind down and wait for them
    let Listener { terminate_tx, .. } = server;
    drop(signal);
    drop(terminate_tx);
    let _ = terminate_rx.recv().await;
    let _ = timer.await;
    log::info!("Stopped accepting incoming connections");
    Ok(engine)
}
