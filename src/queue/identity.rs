//! Consumer identity
//!
//! Consumers are named `{topic}-{group}-{host}` so broker-side listings show
//! where a subscription is being served from. The name is diagnostic only and
//! its generation never fails.

/// Substituted when the host name cannot be determined
pub const UNKNOWN_HOST: &str = "unknown";

/// Build the consumer name for a topic/group pair on this host
pub fn consumer_name(topic: &str, group: &str) -> String {
    consumer_name_for_host(topic, group, &hostname())
}

pub fn consumer_name_for_host(topic: &str, group: &str, host: &str) -> String {
    let host = if host.trim().is_empty() {
        UNKNOWN_HOST
    } else {
        host.trim()
    };
    format!("{}-{}-{}", topic, group, host)
}

/// Best-effort host name lookup
pub fn hostname() -> String {
    system_hostname()
        .or_else(|| std::env::var("HOSTNAME").ok())
        .or_else(|| std::env::var("COMPUTERNAME").ok())
        .map(|h| h.trim().to_string())
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| UNKNOWN_HOST.to_string())
}

#[cfg(unix)]
fn system_hostname() -> Option<String> {
    let mut buffer = [0u8; 256];
    // SAFETY: the pointer and length describe a writable buffer we own
    let rc = unsafe { libc::gethostname(buffer.as_mut_ptr().cast(), buffer.len()) };
    if rc != 0 {
        return None;
    }
    let len = buffer.iter().position(|b| *b == 0).unwrap_or(buffer.len());
    std::str::from_utf8(&buffer[..len]).ok().map(str::to_string)
}

#[cfg(not(unix))]
fn system_hostname() -> Option<String> {
    None
}
