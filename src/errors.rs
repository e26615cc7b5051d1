//! Structured error kinds for the ping and MTR engines (§7).
//!
//! Only lifecycle and resource-acquisition failures are represented here and
//! propagate out of `Start`/`Add`/`NewMtr`. Per-packet anomalies (malformed
//! replies, transient send failures) are recorded into the probe's own
//! result slot instead of being surfaced as an `Err` — see §7's rationale.

use crate::icmp::Mode;

#[derive(thiserror::Error, Debug)]
pub enum ProbeError {
    #[error("resolving {host:?} yielded no usable address")]
    Resolve { host: String },

    #[error("opening raw {mode:?} ICMP socket failed")]
    Socket {
        mode: Mode,
        #[source]
        source: std::io::Error,
    },

    #[error("engine is already running")]
    AlreadyRunning,

    #[error("engine is not running")]
    NotRunning,

    #[error("engine is already closed")]
    AlreadyClosed,

    #[error("readiness multiplexer failed: {0}")]
    Multiplexer(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ProbeError>;
