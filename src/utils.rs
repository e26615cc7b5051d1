//! Small formatting helpers shared by `report`, kept from the teacher's
//! utility module (trimmed to what a CLI text report needs).

pub mod time {
    use std::time::Duration;

    pub fn duration_to_ms_f64(duration: Duration) -> f64 {
        duration.as_secs_f64() * 1000.0
    }

    pub fn format_duration_ms(duration: Duration) -> String {
        format!("{:.1}", duration_to_ms_f64(duration))
    }

    pub fn format_optional_duration_ms(duration: Option<Duration>) -> String {
        duration.map(format_duration_ms).unwrap_or_else(|| "???".to_string())
    }
}

pub mod network {
    use std::net::IpAddr;

    pub fn format_optional_ip(addr: Option<IpAddr>) -> String {
        addr.map(|a| a.to_string()).unwrap_or_else(|| "???".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn formats_duration_as_ms() {
        assert_eq!(time::format_duration_ms(Duration::from_millis(1500)), "1500.0");
    }

    #[test]
    fn formats_missing_duration_as_placeholder() {
        assert_eq!(time::format_optional_duration_ms(None), "???");
    }

    #[test]
    fn formats_missing_ip_as_placeholder() {
        assert_eq!(network::format_optional_ip(None), "???");
    }
}
