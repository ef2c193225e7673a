use anyhow::{anyhow, bail, Context, Result};
use httparse::Header;
use std::{
    collections::HashMap,
    io::{Read, Write},
    net::{SocketAddr, TcpListener, TcpStream},
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, Mutex, MutexGuard,
    },
    thread,
    time::Duration,
};
use tracing::{debug, info, warn};
use ws_helper::{
    consts::{OPCODE_CLOSE, OPCODE_TEXT},
    DecodedMessage, FrameError,
};

const HANDSHAKE_BUF_LEN: usize = 4096;
const READ_BUF_LEN: usize = 4096;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Send every text message to all upgraded clients (instead of sender only)
    pub broadcast: bool,

    /// Frames with larger payload close the connection
    pub max_frame_size: usize,

    /// Writes blocked longer than this fail (client not reading)
    pub write_timeout: Option<Duration>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            broadcast: false,
            max_frame_size: 1 << 20,
            write_timeout: Some(Duration::from_secs(5)),
        }
    }
}

pub type ConnId = u64;

struct Connection {
    addr: SocketAddr,
    writer: Mutex<TcpStream>,
    upgraded: AtomicBool,
}

impl Connection {
    fn write_all(&self, data: &[u8]) -> Result<()> {
        self.writer
            .lock()
            .map_err(|_| anyhow!("connection writer poisoned"))?
            .write_all(data)?;

        Ok(())
    }
}

/// Connected clients, keyed by connection id.
///
/// The map lock is never held during socket io, each connection
/// serializes its own writes.
#[derive(Default)]
pub struct Registry {
    next_id: AtomicU64,
    conns: Mutex<HashMap<ConnId, Arc<Connection>>>,
}

impl Registry {
    fn conns(&self) -> Result<MutexGuard<'_, HashMap<ConnId, Arc<Connection>>>> {
        self.conns
            .lock()
            .map_err(|_| anyhow!("connection registry poisoned"))
    }

    fn get(&self, id: ConnId) -> Result<Arc<Connection>> {
        self.conns()?
            .get(&id)
            .cloned()
            .ok_or_else(|| anyhow!("connection {id} not registered"))
    }

    pub fn add(&self, addr: SocketAddr, writer: TcpStream) -> Result<ConnId> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.conns()?.insert(
            id,
            Arc::new(Connection {
                addr,
                writer: Mutex::new(writer),
                upgraded: AtomicBool::new(false),
            }),
        );

        Ok(id)
    }

    pub fn remove(&self, id: ConnId) -> Result<()> {
        self.conns()?.remove(&id);
        Ok(())
    }

    pub fn client_count(&self) -> Result<usize> {
        Ok(self.conns()?.len())
    }

    /// Write handshake response and mark connection as upgraded (under the
    /// connection's writer lock, so no broadcast frame can get in front of the response)
    pub fn complete_upgrade(&self, id: ConnId, response: &[u8]) -> Result<()> {
        let conn = self.get(id)?;
        let mut writer = conn
            .writer
            .lock()
            .map_err(|_| anyhow!("connection writer poisoned"))?;

        writer.write_all(response)?;
        conn.upgraded.store(true, Ordering::Release);
        Ok(())
    }

    pub fn send_to(&self, id: ConnId, frame: &[u8]) -> Result<()> {
        self.get(id)?.write_all(frame)
    }

    /// Returns number of clients the frame was written to
    pub fn broadcast(&self, frame: &[u8]) -> Result<usize> {
        let targets = self
            .conns()?
            .iter()
            .filter(|(_, c)| c.upgraded.load(Ordering::Acquire))
            .map(|(id, c)| (*id, c.clone()))
            .collect::<Vec<_>>();

        let mut sent = 0;
        for (id, conn) in targets {
            match conn.write_all(frame) {
                Ok(()) => sent += 1,
                Err(e) => warn!(conn = id, addr = %conn.addr, "broadcast write failed: {e:#}"),
            }
        }

        Ok(sent)
    }
}

pub fn start_server(ip: &str, config: ServerConfig) -> Result<()> {
    let listener = TcpListener::bind(ip).with_context(|| format!("binding {ip}"))?;
    let addr = listener.local_addr()?;
    info!(%addr, "server started");

    serve(listener, config)
}

/// Accept loop, one thread per client
pub fn serve(listener: TcpListener, config: ServerConfig) -> Result<()> {
    let registry = Arc::new(Registry::default());
    let config = Arc::new(config);

    for stream in listener.incoming() {
        let (stream, addr) = match stream.and_then(|s| s.peer_addr().map(|addr| (s, addr))) {
            Ok(accepted) => accepted,
            Err(e) => {
                warn!(error = %e, "accept failed");
                continue;
            }
        };

        let writer = stream.try_clone()?;
        writer.set_write_timeout(config.write_timeout)?;

        let id = registry.add(addr, writer)?;
        let clients = registry.client_count()?;
        info!(conn = id, %addr, clients, "client connected");

        let registry = registry.clone();
        let config = config.clone();
        thread::spawn(move || {
            if let Err(e) = handle_client(&registry, &config, id, stream) {
                warn!(conn = id, "connection error: {e:#}");
            }

            if let Err(e) = registry.remove(id) {
                warn!(conn = id, "{e:#}");
            }

            info!(conn = id, "client closed");
        });
    }

    Ok(())
}

fn handle_client(
    registry: &Registry,
    config: &ServerConfig,
    id: ConnId,
    mut stream: TcpStream,
) -> Result<()> {
    let mut buf = [0; HANDSHAKE_BUF_LEN];
    let n = stream.read(&mut buf)?;
    if n == 0 {
        return Ok(());
    }

    let response = match ws_helper::negotiate(&buf[..n]) {
        Ok(response) => response,
        Err(e) => {
            let response = ws_helper::http_response(
                400,
                "Bad Request",
                &[Header {
                    name: "Connection",
                    value: b"close",
                }],
            );

            _ = registry.send_to(id, &response);
            return Err(e).context("handshake failed");
        }
    };

    registry.complete_upgrade(id, &response)?;
    debug!(conn = id, "handshake done");

    // frames sent right behind the request (same read)
    let mut pending = Vec::new();
    if let Some(end) = buf[..n].windows(4).position(|w| w == b"\r\n\r\n") {
        pending.extend_from_slice(&buf[end + 4..n]);
    }

    let mut chunk = [0; READ_BUF_LEN];
    loop {
        let frame_len = match ws_helper::decode_header(&pending) {
            Ok(header) => {
                if header.payload_len > config.max_frame_size as u64 {
                    bail!(
                        "frame payload of {} bytes exceeds limit ({})",
                        header.payload_len,
                        config.max_frame_size
                    );
                }

                Some(header.frame_len())
            }
            Err(e) if e.is_incomplete() => None,
            // masking key not received yet
            Err(FrameError::MissingMaskKey)
                if ws_helper::header_len_hint(&pending).is_some_and(|len| pending.len() < len) =>
            {
                None
            }
            Err(e) => return Err(e).context("invalid frame header"),
        };

        match frame_len {
            Some(frame_len) if pending.len() >= frame_len => {
                let msg = ws_helper::decode(&pending[..frame_len], true).context("invalid frame")?;
                pending.drain(..frame_len);

                if !handle_message(registry, config, id, msg)? {
                    return Ok(());
                }
            }
            _ => {
                let n = stream.read(&mut chunk)?;
                if n == 0 {
                    debug!(conn = id, pending = pending.len(), "eof");
                    return Ok(());
                }

                pending.extend_from_slice(&chunk[..n]);
            }
        }
    }
}

/// Returns false if connection should be closed
fn handle_message(
    registry: &Registry,
    config: &ServerConfig,
    id: ConnId,
    msg: DecodedMessage,
) -> Result<bool> {
    match msg.opcode {
        OPCODE_TEXT => {
            info!(
                conn = id,
                len = msg.payload.len(),
                "new msg: {}",
                String::from_utf8_lossy(&msg.payload)
            );

            let frame = ws_helper::encode(&msg.payload, false)?;
            if config.broadcast {
                let sent = registry.broadcast(&frame)?;
                debug!(conn = id, sent, "broadcast");
            } else {
                registry.send_to(id, &frame)?;
            }

            Ok(true)
        }
        OPCODE_CLOSE => {
            debug!(conn = id, "close frame");
            Ok(false)
        }
        opcode => {
            debug!(conn = id, opcode, "ignoring non-text frame");
            Ok(true)
        }
    }
}
