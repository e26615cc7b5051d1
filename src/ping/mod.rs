//! Component F: the ping engine.

pub mod entry;
pub mod result;

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::errors::ProbeError;
use crate::icmp::{self, packet, Mode, Multiplexer, SeqPool};
use crate::resolve::resolve_host;

use entry::{Elapsed, Entry, EntryHeap, EntryId, EntryOptions, EvType, Reply};
pub use result::PingResult;

/// Per-`Add` options, mirroring the original's `AddressOption` functional
/// builders.
#[derive(Debug, Clone, Default)]
pub struct AddOptions {
    pub count: Option<usize>,
    pub data_size: Option<usize>,
    pub timeout: Option<Duration>,
    pub interval: Option<Duration>,
    pub force_v4: bool,
    pub force_v6: bool,
}

/// Correlation payload stored in the sequence pool.
struct Correlation {
    target: EntryId,
    reply_index: usize,
}

pub struct Ping {
    interval: Duration,
    ipv4_socket: Option<icmp::IcmpSocket>,
    ipv6_socket: Option<icmp::IcmpSocket>,
    multiplexer: Multiplexer,
    heap: EntryHeap,
    seq_pool: SeqPool<Correlation>,
    starting: AtomicBool,
    closing: AtomicBool,
    buffer: Vec<u8>,
}

impl Ping {
    pub fn new(ident: u16, interval: Duration) -> Self {
        Self {
            interval,
            ipv4_socket: None,
            ipv6_socket: None,
            multiplexer: Multiplexer::new(),
            heap: EntryHeap::default(),
            seq_pool: SeqPool::new(ident),
            starting: AtomicBool::new(false),
            closing: AtomicBool::new(false),
            buffer: vec![0u8; 4096],
        }
    }

    /// Resolves `host`, opens/registers the appropriate socket family if not
    /// already open, and enqueues a fresh per-target entry. Rejected once
    /// `Start` has begun.
    pub fn add(&mut self, host: &str, options: AddOptions) -> Result<(), ProbeError> {
        if self.starting.load(Ordering::SeqCst) {
            return Ok(());
        }
        let ip = resolve_host(host, options.force_v4, options.force_v6)?;
        let mode = if ip.is_ipv6() { Mode::V6 } else { Mode::V4 };

        match mode {
            Mode::V6 => {
                if self.ipv6_socket.is_none() {
                    let sock = icmp::IcmpSocket::open(Mode::V6)?;
                    self.multiplexer.register(sock.as_raw_fd());
                    self.ipv6_socket = Some(sock);
                }
            }
            Mode::V4 => {
                if self.ipv4_socket.is_none() {
                    let sock = icmp::IcmpSocket::open(Mode::V4)?;
                    self.multiplexer.register(sock.as_raw_fd());
                    self.ipv4_socket = Some(sock);
                }
            }
        }

        let entry_options = EntryOptions {
            data_size: options.data_size.unwrap_or(icmp::DEFAULT_DATA_SIZE),
            count: options.count.unwrap_or(1),
            timeout: options.timeout.unwrap_or(icmp::DEFAULT_TIMEOUT),
            interval: options.interval.unwrap_or(icmp::DEFAULT_INTERVAL),
        };
        let addr = SocketAddr::new(ip, 0);
        let entry = Entry::new(host.to_string(), ip, addr, mode, &entry_options);
        self.heap.push_new(entry);
        Ok(())
    }

    /// Safe to call from another thread; checked between loop iterations.
    pub fn stop(&self) {
        self.closing.store(true, Ordering::SeqCst);
    }

    fn is_closing(&self) -> bool {
        self.closing.load(Ordering::SeqCst)
    }

    fn send(&mut self, target: EntryId) {
        let mode = self.heap.get(target).mode;

        let entry = self.heap.get_mut(target);
        entry.sent += 1;
        let reply_index = entry.replies.len();
        entry.replies.push(Reply {
            send_time: Instant::now(),
            elapsed: Elapsed::Unused,
        });
        let data_size = entry.data_size;
        let addr = entry.addr;

        if data_size > self.buffer.len() {
            self.buffer.resize(data_size, 0);
        }
        let (ident, seq) = self.seq_pool.apply(Correlation { target, reply_index });
        let packet_bytes = match mode {
            Mode::V4 => packet::build_echo_request_v4(ident, seq, data_size),
            Mode::V6 => packet::build_echo_request_v6(ident, seq, data_size),
        };

        let Some(socket) = (match mode {
            Mode::V4 => self.ipv4_socket.as_ref(),
            Mode::V6 => self.ipv6_socket.as_ref(),
        }) else {
            return;
        };
        if socket.send(addr, &packet_bytes).is_err() {
            self.seq_pool.free(ident, seq);
            self.heap.get_mut(target).replies[reply_index].elapsed = Elapsed::Error;
        }
    }

    /// Runs the cooperative loop to completion (per §4.F) and returns one
    /// `Result` per registered target, in `Add` order.
    pub fn start(&mut self) -> Result<Vec<PingResult>, ProbeError> {
        if self.starting.swap(true, Ordering::SeqCst) {
            return Err(ProbeError::AlreadyRunning);
        }

        let mut current_time = Instant::now();
        let mut last_send_time: Option<Instant> = None;

        while !self.is_closing() && !self.heap.is_empty() {
            if let Some(id) = self.heap.peek_id() {
                let entry = self.heap.get(id);
                if entry.ev_time <= current_time {
                    match entry.ev_type {
                        EvType::Ping => {
                            let gap = last_send_time
                                .map(|t| current_time.duration_since(t))
                                .unwrap_or(self.interval);
                            if gap >= self.interval {
                                self.heap.pop();
                                self.send(id);
                                let now = Instant::now();
                                last_send_time = Some(now);

                                let entry = self.heap.get_mut(id);
                                if entry.sent < entry.count {
                                    entry.ev_type = EvType::Ping;
                                    entry.ev_time = now + entry.interval;
                                } else {
                                    entry.ev_type = EvType::Timeout;
                                    entry.ev_time = now + entry.timeout;
                                }
                                self.heap.enqueue(id);
                            }
                        }
                        EvType::Timeout => {
                            self.heap.pop();
                        }
                    }
                }
            }

            let mut wait_time = match self.heap.peek_id().map(|id| self.heap.get(id)) {
                Some(entry) => {
                    let mut w = entry.ev_time.saturating_duration_since(current_time);
                    if entry.ev_type == EvType::Ping && w < self.interval {
                        let since_last = last_send_time
                            .map(|t| current_time.duration_since(t))
                            .unwrap_or(self.interval);
                        w = if since_last < self.interval {
                            self.interval - since_last
                        } else {
                            self.interval
                        };
                    }
                    w
                }
                None => Duration::ZERO,
            };

            while !self.is_closing() {
                match self.wait_for_reply(wait_time)? {
                    true => wait_time = Duration::ZERO,
                    false => break,
                }
            }
            current_time = Instant::now();
        }

        if self.is_closing() {
            return Err(ProbeError::AlreadyClosed);
        }

        Ok(self.heap.all().iter().map(PingResult::from_entry).collect())
    }

    /// Reads and processes one datagram if the multiplexer reports
    /// readiness. Returns `true` if it read something (caller should drain
    /// further with a zero wait), `false` on timeout.
    fn wait_for_reply(&mut self, wait_time: Duration) -> Result<bool, ProbeError> {
        let Some(fd) = self.multiplexer.wait(wait_time)? else {
            return Ok(false);
        };

        let is_v6 = self.ipv6_socket.as_ref().map(|s| s.as_raw_fd()) == Some(fd);
        let mode = if is_v6 { Mode::V6 } else { Mode::V4 };
        let socket = (if is_v6 { self.ipv6_socket.as_ref() } else { self.ipv4_socket.as_ref() })
            .expect("fd was registered by this engine");

        let (n, _peer) = match socket.recv(&mut self.buffer) {
            Ok(v) => v,
            Err(_) => return Ok(false),
        };

        let decoded = match mode {
            Mode::V4 => {
                let Some((_src, header_len)) = icmp::strip_ipv4_header(&self.buffer[..n]) else {
                    return Ok(true);
                };
                packet::decode_v4(&self.buffer[header_len..n])
            }
            Mode::V6 => packet::decode_v6(&self.buffer[..n]),
        };

        let Some(packet::Reply::EchoReply { ident, seq }) = decoded else {
            return Ok(true);
        };
        let Some(correlation) = self.seq_pool.free(ident, seq) else {
            return Ok(true);
        };

        let entry = self.heap.get_mut(correlation.target);
        let reply = &mut entry.replies[correlation.reply_index];
        if reply.elapsed == Elapsed::Unused {
            let rtt = reply.send_time.elapsed();
            reply.elapsed = Elapsed::Value(rtt);
            let rtt_ms = rtt.as_secs_f64() * 1000.0;
            entry.record_rtt_ms(rtt_ms);
            if entry.received >= entry.count {
                self.heap.remove(correlation.target);
            }
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_rejects_silently_once_started() {
        let mut ping = Ping::new(1, Duration::from_millis(1));
        ping.starting.store(true, Ordering::SeqCst);
        assert!(ping.add("127.0.0.1", AddOptions::default()).is_ok());
        assert!(ping.heap.is_empty());
    }
}
