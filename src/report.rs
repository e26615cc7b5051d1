//! Component H's text-reporting surface (§10.5): aligned tables for ping and
//! MTR results, grounded on the teacher's column-formatted `report.rs`.

use crate::hop_stats;
use crate::mtr::MtrResult;
use crate::ping::PingResult;
use crate::utils::network::format_optional_ip;
use crate::utils::time::{format_duration_ms, format_optional_duration_ms};

pub fn format_ping_result(result: &PingResult) -> String {
    let mut out = String::new();
    out.push_str(&format!("PING {} ({})\n", result.host, result.ip));
    out.push_str(&format!(
        "{} packets transmitted, {} received, {:.1}% packet loss\n",
        result.packets,
        result.received,
        result.loss()
    ));
    if let Some((min, avg, max)) = result.min_avg_max() {
        out.push_str(&format!(
            "rtt min/avg/max/stddev = {}/{}/{}/{:.1} ms\n",
            format_duration_ms(min),
            format_duration_ms(avg),
            format_duration_ms(max),
            result.stddev
        ));
    }
    out
}

pub fn format_mtr_result(result: &MtrResult) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "Start: {}\n",
        chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
    ));
    out.push_str(&format!(
        "HOST: {} -> {}\n",
        format_optional_ip(result.local_ip),
        result.target_ip
    ));
    out.push_str("Hop  Host                  Loss%  Snt   Last    Avg   Best  Worst  Jttr\n");

    for stats in hop_stats::enrich(result) {
        let host = result
            .ttl
            .get(stats.hop - 1)
            .and_then(|tr| tr.entries.iter().find_map(|e| e.ip))
            .map(|ip| ip.to_string())
            .unwrap_or_else(|| "???".to_string());

        out.push_str(&format!(
            "{:3}. {:20} {:5.1}% {:4} {:>7} {:>6} {:>6} {:>6} {:>5}\n",
            stats.hop,
            host,
            stats.loss_percent,
            stats.sent,
            format_optional_duration_ms(stats.last_rtt),
            format_optional_duration_ms(stats.avg_rtt),
            format_optional_duration_ms(stats.best_rtt),
            format_optional_duration_ms(stats.worst_rtt),
            format_optional_duration_ms(stats.jitter_avg),
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ping::entry::Elapsed;
    use std::net::{IpAddr, Ipv4Addr};
    use std::time::Duration;

    #[test]
    fn ping_report_includes_loss_and_rtt_summary() {
        let result = PingResult {
            host: "example.com".into(),
            ip: IpAddr::V4(Ipv4Addr::new(93, 184, 216, 34)),
            packets: 4,
            received: 4,
            stddev: 1.2,
            times: vec![
                Elapsed::Value(Duration::from_millis(10)),
                Elapsed::Value(Duration::from_millis(12)),
                Elapsed::Value(Duration::from_millis(11)),
                Elapsed::Value(Duration::from_millis(13)),
            ],
        };
        let text = format_ping_result(&result);
        assert!(text.contains("0.0% packet loss"));
        assert!(text.contains("rtt min/avg/max/stddev"));
    }

    #[test]
    fn mtr_report_includes_header_and_hop_rows() {
        use crate::mtr::result::{TtlResult, TtlResultEntry};
        let result = MtrResult {
            target_ip: IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8)),
            local_ip: Some(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 1))),
            ttl: vec![TtlResult {
                entries: vec![TtlResultEntry {
                    ip: Some(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1))),
                    elapsed: Some(Duration::from_millis(5)),
                }],
            }],
        };
        let text = format_mtr_result(&result);
        assert!(text.contains("HOST:"));
        assert!(text.contains("10.0.0.1"));
    }
}
