//! Component H for MTR: per-hop result records.

use std::net::IpAddr;
use std::time::Duration;

use serde::Serialize;

/// One attempt's outcome at a given hop.
#[derive(Debug, Clone, Serialize)]
pub struct TtlResultEntry {
    pub ip: Option<IpAddr>,
    pub elapsed: Option<Duration>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TtlResult {
    pub entries: Vec<TtlResultEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MtrResult {
    pub target_ip: IpAddr,
    pub local_ip: Option<IpAddr>,
    /// One `TtlResult` per hop, ordered from TTL 1 to the highest TTL any
    /// attempt reached the destination at.
    pub ttl: Vec<TtlResult>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ttl_result_default_is_empty() {
        let r = TtlResult::default();
        assert!(r.entries.is_empty());
    }
}
