//! Target address normalisation.
//!
//! Hublist addresses arrive in several shapes: a bare host, `host:port`,
//! a bracketed or bare IPv6 literal, or a URL such as `dchub://host:port`.
//! [`normalize_target`] turns all of them into a dialable `host:port`.

use url::Url;

/// Split `host:port` into its parts.
///
/// Returns `None` for the port when the address does not carry one. A bare
/// IPv6 literal (`::1`) is treated as a host without a port.
pub fn split_host_port(addr: &str) -> (&str, Option<&str>) {
    if let Some(rest) = addr.strip_prefix('[') {
        if let Some((host, tail)) = rest.split_once(']') {
            let port = tail.strip_prefix(':').filter(|p| !p.is_empty());
            return (host, port);
        }
        return (addr, None);
    }
    match addr.rsplit_once(':') {
        // More than one colon without brackets: IPv6 literal.
        Some((host, _)) if host.contains(':') => (addr, None),
        Some((host, port)) if !port.is_empty() => (host, Some(port)),
        Some((host, _)) => (host, None),
        None => (addr, None),
    }
}

/// Normalise a target address, appending `default_port` when none is given.
pub fn normalize_target(addr: &str, default_port: u16) -> String {
    let addr = addr.trim();
    let authority = match Url::parse(addr) {
        Ok(url) if url.host_str().is_some_and(|h| !h.is_empty()) => {
            let host = url.host_str().unwrap_or_default().to_string();
            match url.port() {
                Some(port) => format!("{}:{}", host, port),
                None => host,
            }
        }
        _ => addr.to_string(),
    };

    let (host, port) = split_host_port(&authority);
    let host = host.trim_start_matches('[').trim_end_matches(']');
    let port = port
        .map(str::to_string)
        .unwrap_or_else(|| default_port.to_string());
    if host.contains(':') {
        format!("[{}]:{}", host, port)
    } else {
        format!("{}:{}", host, port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_host_port() {
        assert_eq!(split_host_port("example.com:411"), ("example.com", Some("411")));
        assert_eq!(split_host_port("example.com"), ("example.com", None));
        assert_eq!(split_host_port("[::1]:2501"), ("::1", Some("2501")));
        assert_eq!(split_host_port("::1"), ("::1", None));
        assert_eq!(split_host_port("example.com:"), ("example.com", None));
    }

    #[test]
    fn test_normalize_appends_default_port() {
        assert_eq!(normalize_target("hublist.example", 2501), "hublist.example:2501");
        assert_eq!(normalize_target("hublist.example:411", 2501), "hublist.example:411");
        assert_eq!(normalize_target("127.0.0.1", 2501), "127.0.0.1:2501");
    }

    #[test]
    fn test_normalize_ipv6() {
        assert_eq!(normalize_target("::1", 2501), "[::1]:2501");
        assert_eq!(normalize_target("[::1]:9000", 2501), "[::1]:9000");
    }

    #[test]
    fn test_normalize_url() {
        assert_eq!(normalize_target("dchub://hublist.example:411", 2501), "hublist.example:411");
        assert_eq!(normalize_target("dchub://hublist.example", 2501), "hublist.example:2501");
    }
}
