//! Component G: the MTR (combined traceroute + ping) engine, grounded on
//! the original `mtr.go`.

pub mod pending;
pub mod result;

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::errors::ProbeError;
use crate::icmp::{self, packet, Mode, Multiplexer, SeqPool};
use crate::resolve::{local_outbound_addr, resolve_host};

use pending::{PendingId, PendingQueue};
pub use result::MtrResult;
use result::{TtlResult, TtlResultEntry};

#[derive(Debug, Clone)]
pub struct MtrOptions {
    /// Attempts per hop.
    pub count: usize,
    pub max_ttl: usize,
    pub data_size: usize,
    pub timeout: Duration,
    pub interval: Duration,
    pub force_v4: bool,
    pub force_v6: bool,
}

impl Default for MtrOptions {
    fn default() -> Self {
        Self {
            count: 3,
            max_ttl: 60,
            data_size: icmp::DEFAULT_DATA_SIZE,
            timeout: icmp::DEFAULT_TIMEOUT,
            interval: icmp::DEFAULT_INTERVAL,
            force_v4: false,
            force_v6: false,
        }
    }
}

/// Correlation payload stored in the sequence pool: the hop and attempt an
/// in-flight probe belongs to, plus the handle needed to cancel its
/// deadline once a reply (or a send error) retires it early.
struct Pending {
    ttl: usize,
    /// Logical attempt number (`current_count` at send time). Used only to
    /// key `ping_ttl`.
    attempt: usize,
    /// Position this probe's `RoundEntry` was pushed at within
    /// `results[ttl].entries`. Not necessarily equal to `attempt`: an
    /// earlier attempt that capped at a lower ttl never pushes an entry
    /// here, so later attempts can land at an earlier index than their
    /// attempt number. Used for the entries-vec lookup at reply time.
    index: usize,
    pending_id: PendingId,
}

struct RoundEntry {
    send_time: Instant,
    ip: Option<IpAddr>,
    reply_time: Option<Instant>,
    end: bool,
    /// Logical attempt number this entry was sent for, kept alongside the
    /// entry since its vec position can diverge from it (see `Pending::index`).
    /// Needed so `build_result` queries `ping_ttl` by the right key.
    attempt: usize,
}

#[derive(Default)]
struct RoundResult {
    entries: Vec<RoundEntry>,
}

pub struct Mtr {
    target: String,
    ip: IpAddr,
    local_ip: Option<IpAddr>,
    mode: Mode,
    socket: icmp::IcmpSocket,
    multiplexer: Multiplexer,
    options: MtrOptions,

    seq_pool: SeqPool<Pending>,
    pending: PendingQueue<(u16, u16)>,

    /// Indexed by TTL (`results[0]` is unused, mirroring the original's
    /// 1-based hop numbering).
    results: Vec<RoundResult>,
    /// Attempt index -> the minimum TTL at which that attempt's probe
    /// reached the destination. Once set, later hops in the same attempt
    /// don't need to be sent.
    ping_ttl: HashMap<usize, usize>,
    current_max_ttl: usize,
    current_ttl: usize,
    current_count: usize,

    starting: AtomicBool,
    buffer: Vec<u8>,
}

impl Mtr {
    pub fn new(target: &str, ident: u16, options: MtrOptions) -> Result<Self, ProbeError> {
        let ip = resolve_host(target, options.force_v4, options.force_v6)?;
        let mode = if ip.is_ipv6() { Mode::V6 } else { Mode::V4 };
        let socket = icmp::IcmpSocket::open(mode)?;
        let mut multiplexer = Multiplexer::new();
        multiplexer.register(socket.as_raw_fd());
        let local_ip = local_outbound_addr(ip).ok();
        let max_ttl = options.max_ttl;
        let buffer_len = options.data_size.max(4096);

        Ok(Self {
            target: target.to_string(),
            ip,
            local_ip,
            mode,
            socket,
            multiplexer,
            results: (0..=max_ttl).map(|_| RoundResult::default()).collect(),
            seq_pool: SeqPool::new(ident),
            pending: PendingQueue::default(),
            ping_ttl: HashMap::new(),
            current_max_ttl: 0,
            current_ttl: 1,
            current_count: 0,
            starting: AtomicBool::new(false),
            buffer: vec![0u8; buffer_len],
            options,
        })
    }

    /// Runs the sweep to completion (per §4.G) and assembles the final
    /// per-hop result.
    pub fn start(&mut self) -> Result<MtrResult, ProbeError> {
        if self.starting.swap(true, Ordering::SeqCst) {
            return Err(ProbeError::AlreadyRunning);
        }
        tracing::debug!(target = %self.target, "starting mtr sweep");

        let mut last_send_time: Option<Instant> = None;

        while self.current_count < self.options.count {
            let now = Instant::now();
            let gap = last_send_time.map(|t| now.duration_since(t)).unwrap_or(self.options.interval);

            let mut wait_time;
            if gap < self.options.interval {
                wait_time = self.options.interval - gap;
            } else {
                last_send_time = Some(now);
                self.send(now);
                self.current_ttl += 1;
                if self.ping_ttl.contains_key(&self.current_count) || self.current_ttl > self.options.max_ttl {
                    self.current_ttl = 1;
                    self.current_count += 1;
                }
                wait_time = self.options.interval;
            }

            loop {
                if !self.wait_for_reply(wait_time)? {
                    break;
                }
                wait_time = Duration::ZERO;
            }
        }

        while let Some((id, deadline)) = self.pending.peek_earliest() {
            let now = Instant::now();
            if deadline <= now {
                if let Some((ident, seq)) = self.pending.remove(id) {
                    self.seq_pool.free(ident, seq);
                }
                continue;
            }
            let mut wait_time = deadline - now;
            loop {
                if !self.wait_for_reply(wait_time)? {
                    break;
                }
                wait_time = Duration::ZERO;
            }
        }

        Ok(self.build_result())
    }

    fn send(&mut self, send_time: Instant) {
        let ttl = self.current_ttl;
        let attempt = self.current_count;

        let round = &mut self.results[ttl];
        let index = round.entries.len();
        round.entries.push(RoundEntry { send_time, ip: None, reply_time: None, end: false, attempt });

        let deadline = send_time + self.options.timeout;
        let (ident, seq) = self.seq_pool.peek();
        let pending_id = self.pending.insert(deadline, (ident, seq));
        let (ident, seq) = self.seq_pool.apply(Pending { ttl, attempt, index, pending_id });

        let data_size = self.options.data_size;
        if data_size > self.buffer.len() {
            self.buffer.resize(data_size, 0);
        }
        let packet_bytes = match self.mode {
            Mode::V4 => packet::build_echo_request_v4(ident, seq, data_size),
            Mode::V6 => packet::build_echo_request_v6(ident, seq, data_size),
        };

        if self.socket.set_ttl(ttl as u32).is_err() {
            self.seq_pool.free(ident, seq);
            self.pending.remove(pending_id);
            return;
        }
        let addr = SocketAddr::new(self.ip, 0);
        if self.socket.send(addr, &packet_bytes).is_err() {
            self.seq_pool.free(ident, seq);
            self.pending.remove(pending_id);
        }
    }

    /// Reads and processes one datagram if ready. `true` means the caller
    /// should keep draining with a zero wait.
    fn wait_for_reply(&mut self, wait_time: Duration) -> Result<bool, ProbeError> {
        let Some(_fd) = self.multiplexer.wait(wait_time)? else {
            return Ok(false);
        };

        let (n, peer) = match self.socket.recv(&mut self.buffer) {
            Ok(v) => v,
            Err(_) => return Ok(false),
        };

        let (reply_src, decoded) = match self.mode {
            Mode::V4 => {
                let Some((src, header_len)) = icmp::strip_ipv4_header(&self.buffer[..n]) else {
                    return Ok(true);
                };
                (IpAddr::V4(src), packet::decode_v4(&self.buffer[header_len..n]))
            }
            Mode::V6 => (peer.ip(), packet::decode_v6(&self.buffer[..n])),
        };
        let Some(reply) = decoded else {
            return Ok(true);
        };
        let (ident, seq, is_echo_reply) = match reply {
            packet::Reply::EchoReply { ident, seq } => (ident, seq, true),
            packet::Reply::TimeExceeded { ident, seq } => (ident, seq, false),
        };
        let Some(pending) = self.seq_pool.free(ident, seq) else {
            return Ok(true);
        };
        self.pending.remove(pending.pending_id);

        let entry = &mut self.results[pending.ttl].entries[pending.index];
        entry.ip = Some(reply_src);
        entry.reply_time = Some(Instant::now());

        if is_echo_reply {
            entry.end = true;
            // §9 fix: capped strictly by the attempt index this Pending record
            // was stamped with at send time, never a live counter read back now.
            let already_capped_at = self.ping_ttl.get(&pending.attempt).copied();
            if already_capped_at.is_none_or(|capped| pending.ttl < capped) {
                self.ping_ttl.insert(pending.attempt, pending.ttl);
                if pending.ttl > self.current_max_ttl {
                    self.current_max_ttl = pending.ttl;
                }
            }
        }
        Ok(true)
    }

    fn build_result(&self) -> MtrResult {
        let mut ttl_results = Vec::new();
        for ttl in 1..=self.current_max_ttl {
            let round = &self.results[ttl];
            let mut tr = TtlResult::default();
            for entry in round.entries.iter() {
                if let Some(&capped) = self.ping_ttl.get(&entry.attempt) {
                    if capped < ttl {
                        continue;
                    }
                }
                let elapsed = entry.ip.and(entry.reply_time).map(|rt| rt.duration_since(entry.send_time));
                tr.entries.push(TtlResultEntry { ip: entry.ip, elapsed });
            }
            if tr.entries.is_empty() {
                break;
            }
            ttl_results.push(tr);
        }
        MtrResult { target_ip: self.ip, local_ip: self.local_ip, ttl: ttl_results }
    }
}
