use crate::errors::Error;

use {
    core::{str::FromStr, time::Duration},
    derive_more::{Display, From},
    serde::{Deserialize, Serialize},
    std::{collections::BTreeMap, net::SocketAddr, string::ToString},
};

/// Server rules. Keys are unique; a repeated key keeps the last value.
pub type Rules = BTreeMap<String, String>;

/// Language shown when the server does not report one.
pub const NO_LANGUAGE: &str = "-";

#[derive(Clone, Debug, Display, PartialEq, Eq)]
#[display(fmt = "{}:{}", host, port)]
pub struct StringAddr {
    pub host: String,
    pub port: u16,
}

#[derive(Clone, Debug, Display, PartialEq, Eq, From)]
pub enum Host {
    A(SocketAddr),
    S(StringAddr),
}

impl<S> From<(S, u16)> for Host
where
    S: ToString,
{
    fn from((host, port): (S, u16)) -> Self {
        Host::S(StringAddr {
            host: host.to_string(),
            port,
        })
    }
}

impl FromStr for Host {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(addr) = s.parse::<SocketAddr>() {
            return Ok(Host::A(addr));
        }

        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| Error::resolution(s, "missing port"))?;
        if host.is_empty() {
            return Err(Error::resolution(s, "missing host name"));
        }
        let port = port
            .parse::<u16>()
            .map_err(|e| Error::resolution(s, format!("invalid port: {}", e)))?;

        Ok((host, port).into())
    }
}

/// Decoded answer to an info query.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerInfo {
    pub password: bool,
    pub players: u16,
    pub max_players: u16,
    pub hostname: String,
    pub gamemode: String,
    pub language: String,
}

/// Everything known about one server after a full query cycle.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerRecord {
    pub address: String,
    pub hostname: String,
    pub players: u16,
    pub max_players: u16,
    pub gamemode: String,
    pub language: String,
    pub password: bool,
    #[serde(default)]
    pub rules: Rules,
    /// Round trip time; whole milliseconds in serialized form.
    #[serde(with = "crate::util::millis")]
    pub ping: Duration,
    #[serde(rename = "isOmp")]
    pub is_omp: bool,
}

impl ServerRecord {
    pub fn new(address: String, info: ServerInfo) -> ServerRecord {
        ServerRecord {
            address,
            hostname: info.hostname,
            players: info.players,
            max_players: info.max_players,
            gamemode: info.gamemode,
            language: info.language,
            password: info.password,
            rules: Default::default(),
            ping: Default::default(),
            is_omp: Default::default(),
        }
    }
}
