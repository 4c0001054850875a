//! Event channel between the scene and the rover backend.
//!
//! The backend emits `move` with a `"up"`/`"down"` string and listens for a
//! payload-less `drill`.
//!
//! Implementations:
//! - `SocketIoChannel`: socket.io client, the backend's native protocol
//! - `SocketChannel`: plain TCP with one JSON object per line,
//!   `{"event":"move","data":"up"}` inbound and `{"event":"drill"}` outbound
//! - `LoopbackChannel`: in-process pair for offline runs and tests

use crossbeam_channel::{Receiver, Sender};
use rust_socketio::client::Client;
use rust_socketio::{ClientBuilder, Payload, RawClient};
use serde::{Deserialize, Serialize};
use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::thread::{self, JoinHandle};

/// Longest line the TCP transport accepts, newline excluded.
pub const MAX_LINE_BYTES: usize = 4096;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "lowercase")]
pub enum InboundEvent {
    Move(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum OutboundEvent {
    Drill,
}

#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("could not resolve channel endpoint {0}")]
    Resolve(String),
    #[error("channel i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not encode event: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("socket.io failure: {0}")]
    SocketIo(#[from] rust_socketio::Error),
    #[error("channel is closed")]
    Closed,
}

pub trait Channel {
    /// Every inbound event received since the last call. Never blocks.
    fn drain(&mut self) -> Vec<InboundEvent>;
    fn emit(&mut self, event: OutboundEvent) -> Result<(), ChannelError>;
    /// Stops delivery in both directions. Safe to call more than once.
    fn disconnect(&mut self);
}

/// Decodes one wire line. Anything that is not a known event yields `None`.
pub fn decode_line(line: &str) -> Option<InboundEvent> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    match serde_json::from_str(line) {
        Ok(event) => Some(event),
        Err(e) => {
            log::debug!("dropping unrecognised channel message {line:?}: {e}");
            None
        }
    }
}

/// Connection speaking socket.io, as the rover backend does.
pub struct SocketIoChannel {
    client: Option<Client>,
    inbound: Receiver<InboundEvent>,
}

impl SocketIoChannel {
    pub fn connect(url: &str) -> Result<Self, ChannelError> {
        let (tx, rx) = crossbeam_channel::unbounded();
        let client = ClientBuilder::new(url)
            .on("move", move |payload: Payload, _: RawClient| {
                if let Some(event) = move_from_payload(&payload) {
                    let _ = tx.send(event);
                }
            })
            .on("error", |err: Payload, _: RawClient| {
                log::warn!("rover channel error: {err:?}");
            })
            .connect()?;

        log::info!("connected to rover channel at {url}");
        Ok(Self {
            client: Some(client),
            inbound: rx,
        })
    }
}

/// First argument of a `move` event, when it is a string.
pub fn move_from_payload(payload: &Payload) -> Option<InboundEvent> {
    if let Payload::Text(values) = payload {
        if let Some(serde_json::Value::String(direction)) = values.first() {
            return Some(InboundEvent::Move(direction.clone()));
        }
    }
    log::debug!("dropping move event with payload {payload:?}");
    None
}

impl Channel for SocketIoChannel {
    fn drain(&mut self) -> Vec<InboundEvent> {
        self.inbound.try_iter().collect()
    }

    fn emit(&mut self, event: OutboundEvent) -> Result<(), ChannelError> {
        let client = self.client.as_ref().ok_or(ChannelError::Closed)?;
        let name = match event {
            OutboundEvent::Drill => "drill",
        };
        client.emit(name, Payload::Text(Vec::new()))?;
        Ok(())
    }

    fn disconnect(&mut self) {
        if let Some(client) = self.client.take() {
            if let Err(e) = client.disconnect() {
                log::warn!("rover channel did not close cleanly: {e}");
            }
        }
    }
}

impl Drop for SocketIoChannel {
    fn drop(&mut self) {
        self.disconnect();
    }
}

pub struct SocketChannel {
    stream: Option<TcpStream>,
    inbound: Receiver<InboundEvent>,
    reader: Option<JoinHandle<()>>,
}

impl SocketChannel {
    /// `endpoint` is `host:port`; a leading `scheme://` is ignored.
    pub fn connect(endpoint: &str) -> Result<Self, ChannelError> {
        let host_port = endpoint
            .split_once("://")
            .map_or(endpoint, |(_, rest)| rest)
            .trim_end_matches('/');
        let addr = host_port
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| ChannelError::Resolve(endpoint.to_string()))?;
        let stream = TcpStream::connect(addr)?;
        stream.set_nodelay(true)?;
        let read_half = stream.try_clone()?;

        let (tx, rx) = crossbeam_channel::unbounded();
        let reader = thread::Builder::new()
            .name("channel-reader".into())
            .spawn(move || read_events(read_half, tx))?;

        log::info!("connected to rover channel at {addr}");
        Ok(Self {
            stream: Some(stream),
            inbound: rx,
            reader: Some(reader),
        })
    }
}

enum Line {
    Complete,
    TooLong,
}

/// Reads one `\n`-terminated line into `buf`, never buffering more than
/// `MAX_LINE_BYTES + 1` bytes. Oversize lines are consumed up to their newline.
fn read_bounded_line<R: BufRead>(reader: &mut R, buf: &mut Vec<u8>) -> io::Result<Option<Line>> {
    let limit = MAX_LINE_BYTES as u64 + 1;
    if reader.by_ref().take(limit).read_until(b'\n', buf)? == 0 {
        return Ok(None);
    }
    if buf.last() == Some(&b'\n') || buf.len() <= MAX_LINE_BYTES {
        return Ok(Some(Line::Complete));
    }

    let mut rest = Vec::new();
    loop {
        rest.clear();
        let n = reader.by_ref().take(limit).read_until(b'\n', &mut rest)?;
        if n == 0 || rest.last() == Some(&b'\n') {
            return Ok(Some(Line::TooLong));
        }
    }
}

/// Forwards decoded events until EOF, an I/O error, or the scene goes away.
/// Bad lines are dropped and reading carries on.
fn read_events<R: Read>(stream: R, tx: Sender<InboundEvent>) {
    let mut reader = BufReader::new(stream);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match read_bounded_line(&mut reader, &mut buf) {
            Ok(None) => break,
            Ok(Some(Line::TooLong)) => {
                log::debug!("dropping channel line longer than {MAX_LINE_BYTES} bytes");
                continue;
            }
            Ok(Some(Line::Complete)) => {}
            Err(e) => {
                log::warn!("channel read failed: {e}");
                break;
            }
        }

        let Ok(line) = std::str::from_utf8(&buf) else {
            log::debug!("dropping channel line that is not UTF-8");
            continue;
        };
        if let Some(event) = decode_line(line) {
            if tx.send(event).is_err() {
                break;
            }
        }
    }
    log::info!("rover channel closed");
}

impl Channel for SocketChannel {
    fn drain(&mut self) -> Vec<InboundEvent> {
        self.inbound.try_iter().collect()
    }

    fn emit(&mut self, event: OutboundEvent) -> Result<(), ChannelError> {
        let stream = self.stream.as_mut().ok_or(ChannelError::Closed)?;
        let mut line = serde_json::to_vec(&event)?;
        line.push(b'\n');
        stream.write_all(&line)?;
        stream.flush()?;
        Ok(())
    }

    fn disconnect(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown(Shutdown::Both);
        }
        if let Some(reader) = self.reader.take() {
            if reader.join().is_err() {
                log::error!("channel reader thread panicked");
            }
        }
    }
}

impl Drop for SocketChannel {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// Scene-side end of an in-process channel.
pub struct LoopbackChannel {
    inbound: Receiver<InboundEvent>,
    outbound: Option<Sender<OutboundEvent>>,
    open: bool,
}

/// Backend-side end of an in-process channel.
pub struct LoopbackPeer {
    inbound: Sender<InboundEvent>,
    outbound: Receiver<OutboundEvent>,
}

impl LoopbackChannel {
    #[must_use]
    pub fn pair() -> (Self, LoopbackPeer) {
        let (in_tx, in_rx) = crossbeam_channel::unbounded();
        let (out_tx, out_rx) = crossbeam_channel::unbounded();
        let channel = Self {
            inbound: in_rx,
            outbound: Some(out_tx),
            open: true,
        };
        let peer = LoopbackPeer {
            inbound: in_tx,
            outbound: out_rx,
        };
        (channel, peer)
    }
}

impl Channel for LoopbackChannel {
    fn drain(&mut self) -> Vec<InboundEvent> {
        if !self.open {
            return Vec::new();
        }
        self.inbound.try_iter().collect()
    }

    fn emit(&mut self, event: OutboundEvent) -> Result<(), ChannelError> {
        let tx = self.outbound.as_ref().ok_or(ChannelError::Closed)?;
        tx.send(event).map_err(|_| ChannelError::Closed)
    }

    fn disconnect(&mut self) {
        self.open = false;
        self.outbound = None;
    }
}

impl LoopbackPeer {
    /// Returns false once the scene side is gone.
    pub fn send(&self, event: InboundEvent) -> bool {
        self.inbound.send(event).is_ok()
    }

    pub fn send_move(&self, payload: &str) -> bool {
        self.send(InboundEvent::Move(payload.to_string()))
    }

    pub fn received(&self) -> Vec<OutboundEvent> {
        self.outbound.try_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::net::TcpListener;
    use std::time::{Duration, Instant};

    #[test]
    fn decodes_move_events() {
        assert_eq!(
            decode_line(r#"{"event":"move","data":"up"}"#),
            Some(InboundEvent::Move("up".into()))
        );
        assert_eq!(
            decode_line("  {\"event\":\"move\",\"data\":\"sideways\"}\r"),
            Some(InboundEvent::Move("sideways".into()))
        );
    }

    #[test]
    fn drops_garbage_and_unknown_events() {
        assert_eq!(decode_line(""), None);
        assert_eq!(decode_line("not json"), None);
        assert_eq!(decode_line(r#"{"event":"teleport","data":"mars"}"#), None);
        assert_eq!(decode_line(r#"{"event":"move","data":7}"#), None);
        assert_eq!(decode_line(r#"{"event":"move"}"#), None);
    }

    #[test]
    fn drill_encodes_without_payload() {
        assert_eq!(
            serde_json::to_string(&OutboundEvent::Drill).unwrap(),
            r#"{"event":"drill"}"#
        );
    }

    #[test]
    fn loopback_delivers_both_ways() {
        let (mut channel, peer) = LoopbackChannel::pair();
        assert!(peer.send_move("up"));
        assert!(peer.send_move("down"));
        assert_eq!(
            channel.drain(),
            vec![InboundEvent::Move("up".into()), InboundEvent::Move("down".into())]
        );
        assert!(channel.drain().is_empty());

        channel.emit(OutboundEvent::Drill).unwrap();
        assert_eq!(peer.received(), vec![OutboundEvent::Drill]);
    }

    #[test]
    fn loopback_is_silent_after_disconnect() {
        let (mut channel, peer) = LoopbackChannel::pair();
        channel.disconnect();
        peer.send_move("up");
        assert!(channel.drain().is_empty());
        assert!(matches!(channel.emit(OutboundEvent::Drill), Err(ChannelError::Closed)));
    }

    #[test]
    fn socket_channel_round_trip() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let endpoint = listener.local_addr().unwrap().to_string();

        let mut channel = SocketChannel::connect(&endpoint).unwrap();
        let (mut backend, _) = listener.accept().unwrap();
        backend.write_all(b"{\"event\":\"move\",\"data\":\"up\"}\nnot json\n").unwrap();
        backend.write_all(b"{\"event\":\"move\",\"data\":\"down\"}\n").unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        let mut received = Vec::new();
        while received.len() < 2 && Instant::now() < deadline {
            received.extend(channel.drain());
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(
            received,
            vec![InboundEvent::Move("up".into()), InboundEvent::Move("down".into())]
        );

        channel.emit(OutboundEvent::Drill).unwrap();
        let mut line = String::new();
        BufReader::new(backend.try_clone().unwrap()).read_line(&mut line).unwrap();
        assert_eq!(line, "{\"event\":\"drill\"}\n");

        channel.disconnect();
        assert!(matches!(channel.emit(OutboundEvent::Drill), Err(ChannelError::Closed)));
        let mut rest = Vec::new();
        backend.read_to_end(&mut rest).unwrap();
        assert!(rest.is_empty());
    }

    #[test]
    fn socket_channel_skips_undecodable_lines() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let endpoint = format!("tcp://{}", listener.local_addr().unwrap());

        let mut channel = SocketChannel::connect(&endpoint).unwrap();
        let (mut backend, _) = listener.accept().unwrap();
        backend.write_all(b"{\"event\":\"move\",\"data\":\"up\"}\n").unwrap();
        backend.write_all(b"\xff\xfe garbage\n").unwrap();
        backend.write_all(b"{\"event\":\"move\",\"data\":\"down\"}\n").unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        let mut received = Vec::new();
        while received.len() < 2 && Instant::now() < deadline {
            received.extend(channel.drain());
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(
            received,
            vec![InboundEvent::Move("up".into()), InboundEvent::Move("down".into())]
        );
    }

    #[test]
    fn oversize_lines_are_skipped_without_losing_the_next_event() {
        let mut input = vec![b'x'; MAX_LINE_BYTES * 3];
        input.push(b'\n');
        input.extend_from_slice(b"{\"event\":\"move\",\"data\":\"up\"}\n");
        input.extend_from_slice(b"{\"event\":\"move\",\"data\":\"down\"}");

        let (tx, rx) = crossbeam_channel::unbounded();
        read_events(Cursor::new(input), tx);
        assert_eq!(
            rx.try_iter().collect::<Vec<_>>(),
            vec![InboundEvent::Move("up".into()), InboundEvent::Move("down".into())]
        );
    }

    #[test]
    fn oversize_line_at_eof_ends_cleanly() {
        let (tx, rx) = crossbeam_channel::unbounded();
        read_events(Cursor::new(vec![b'{'; MAX_LINE_BYTES + 10]), tx);
        assert!(rx.try_iter().next().is_none());
    }

    #[test]
    fn move_payload_takes_the_first_string_argument() {
        let payload = Payload::Text(vec![serde_json::json!("up")]);
        assert_eq!(move_from_payload(&payload), Some(InboundEvent::Move("up".into())));

        let payload = Payload::Text(vec![serde_json::json!("sideways"), serde_json::json!(1)]);
        assert_eq!(move_from_payload(&payload), Some(InboundEvent::Move("sideways".into())));
    }

    #[test]
    fn move_payload_without_a_string_is_dropped() {
        assert_eq!(move_from_payload(&Payload::Text(Vec::new())), None);
        assert_eq!(move_from_payload(&Payload::Text(vec![serde_json::json!(7)])), None);
        assert_eq!(move_from_payload(&Payload::Binary(vec![0x75, 0x70].into())), None);
    }

    #[test]
    fn connect_reports_refused_endpoint() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let endpoint = listener.local_addr().unwrap().to_string();
        drop(listener);
        assert!(matches!(SocketChannel::connect(&endpoint), Err(ChannelError::Io(_))));
    }
}
