use std::net::{SocketAddr, SocketAddrV4};

/// Returns the IPv4 form of `addr`, unwrapping IPv4-mapped IPv6 addresses.
pub fn to_v4(addr: SocketAddr) -> Option<SocketAddrV4> {
    use SocketAddr::*;

    match addr {
        V4(v) => Some(v),
        V6(v) => v
            .ip()
            .to_ipv4_mapped()
            .map(|v4_addr| SocketAddrV4::new(v4_addr, v.port())),
    }
}

/// Shortened hex dump for packet tracing.
pub fn hex_str(data: &[u8]) -> String {
    const MAX: usize = 64;

    if data.len() > MAX {
        format!("{}.. ({} bytes)", hex::encode(&data[..MAX]), data.len())
    } else {
        hex::encode(data)
    }
}

/// (De)serializes a `Duration` as whole milliseconds.
pub mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::{convert::TryFrom, time::Duration};

    pub fn serialize<S>(v: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(u64::try_from(v.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}
