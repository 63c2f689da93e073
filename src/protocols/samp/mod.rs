//! SA:MP query protocol codec.
//!
//! Every request and response starts with the same 11-byte header: the `SAMP`
//! signature, the target IPv4 address, the target port (little-endian) and the opcode.

use crate::{
    errors::{Error, Result},
    models::Rules,
    protocols::helpers::{long_string, lossy, short_string},
};

use {
    byteorder::{ByteOrder, LittleEndian},
    derive_more::Display,
    enum_primitive_derive::Primitive,
    nom::{
        bytes::complete::take,
        number::complete::{le_u16, le_u8},
        sequence::{pair, terminated},
        IResult,
    },
    num_traits::FromPrimitive,
    rand::RngCore,
    std::net::{Ipv4Addr, SocketAddrV4},
    tracing::trace,
};

pub const SIGNATURE: &[u8; 4] = b"SAMP";
pub const HEADER_LEN: usize = 11;
/// Rules responses shorter than this carry no rules.
pub const MIN_RULES_LEN: usize = 20;
pub const NONCE_LEN: usize = 4;
const SCORE_LEN: usize = 4;

#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Hash, Primitive)]
pub enum QueryKind {
    /// `i`
    #[display(fmt = "info")]
    Info = 0x69,
    /// `r`
    #[display(fmt = "rules")]
    Rules = 0x72,
    /// `c`
    #[display(fmt = "player list")]
    PlayerList = 0x63,
    /// `p`
    #[display(fmt = "ping")]
    Ping = 0x70,
    /// `o`, answered only by open.mp servers
    #[display(fmt = "variant probe")]
    VariantProbe = 0x6F,
}

impl QueryKind {
    pub fn opcode(self) -> u8 {
        self as u8
    }

    pub fn from_opcode(opcode: u8) -> Option<Self> {
        Self::from_u8(opcode)
    }

    /// Whether the request carries a trailing nonce.
    pub fn has_nonce(self) -> bool {
        matches!(self, QueryKind::Ping | QueryKind::VariantProbe)
    }
}

/// Builds the request datagram for `kind` addressed to `addr`.
pub fn encode_request<R>(kind: QueryKind, addr: SocketAddrV4, rng: &mut R) -> Vec<u8>
where
    R: RngCore + ?Sized,
{
    let mut out = Vec::with_capacity(HEADER_LEN + NONCE_LEN);
    out.extend_from_slice(SIGNATURE);
    out.extend_from_slice(&addr.ip().octets());

    let mut port = [0; 2];
    LittleEndian::write_u16(&mut port, addr.port());
    out.extend_from_slice(&port);

    out.push(kind.opcode());

    if kind.has_nonce() {
        let mut nonce = [0; NONCE_LEN];
        rng.fill_bytes(&mut nonce);
        out.extend_from_slice(&nonce);
    }

    out
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResponseHeader {
    pub addr: SocketAddrV4,
    pub kind: QueryKind,
}

fn too_short() -> Error {
    Error::MalformedResponse(format!("response is less than {} bytes", HEADER_LEN))
}

fn payload(data: &[u8]) -> Result<&[u8]> {
    data.get(HEADER_LEN..).ok_or_else(too_short)
}

/// Reads the echoed header. The signature is not checked.
pub fn decode_header(data: &[u8]) -> Result<ResponseHeader> {
    if data.len() < HEADER_LEN {
        return Err(too_short());
    }

    let ip = Ipv4Addr::new(data[4], data[5], data[6], data[7]);
    let port = LittleEndian::read_u16(&data[8..10]);
    let opcode = data[10];
    let kind = QueryKind::from_opcode(opcode)
        .ok_or_else(|| Error::MalformedResponse(format!("unknown opcode 0x{:02x}", opcode)))?;

    Ok(ResponseHeader {
        addr: SocketAddrV4::new(ip, port),
        kind,
    })
}

/// Info payload with the text fields still in their wire encoding.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InfoResponse<'a> {
    pub password: bool,
    pub players: u16,
    pub max_players: u16,
    pub hostname: &'a [u8],
    pub gamemode: &'a [u8],
    pub language: &'a [u8],
}

fn info_payload(input: &[u8]) -> IResult<&[u8], InfoResponse<'_>> {
    let (input, password) = le_u8(input)?;
    let (input, players) = le_u16(input)?;
    let (input, max_players) = le_u16(input)?;
    let (input, hostname) = long_string(input)?;
    let (input, gamemode) = long_string(input)?;
    let (input, language) = long_string(input)?;

    Ok((
        input,
        InfoResponse {
            password: password != 0,
            players,
            max_players,
            hostname,
            gamemode,
            language,
        },
    ))
}

pub fn decode_info(data: &[u8]) -> Result<InfoResponse<'_>> {
    let (_, info) = info_payload(payload(data)?)
        .map_err(|_| Error::MalformedResponse("info payload is truncated".into()))?;
    Ok(info)
}

fn entry_count(input: &[u8]) -> IResult<&[u8], u16> {
    le_u16(input)
}

fn rule_entry(input: &[u8]) -> IResult<&[u8], (&[u8], &[u8])> {
    pair(short_string, short_string)(input)
}

fn player_entry(input: &[u8]) -> IResult<&[u8], &[u8]> {
    terminated(short_string, take(SCORE_LEN))(input)
}

/// Parses a rules response. Truncated payloads yield the entries read so far.
pub fn decode_rules(data: &[u8]) -> Rules {
    let mut rules = Rules::new();
    if data.len() < MIN_RULES_LEN {
        return rules;
    }

    let (mut input, count) = match entry_count(&data[HEADER_LEN..]) {
        Ok(v) => v,
        Err(_) => return rules,
    };

    for i in 0..count {
        match rule_entry(input) {
            Ok((rest, (key, value))) => {
                rules.insert(lossy(key), lossy(value));
                input = rest;
            }
            Err(_) => {
                trace!("Rules payload ends after {} of {} entries", i, count);
                break;
            }
        }
    }

    rules
}

/// Parses a player list response. Scores are skipped. Truncated payloads yield the
/// players read so far.
pub fn decode_players(data: &[u8]) -> Vec<String> {
    let body = match data.get(HEADER_LEN..) {
        Some(v) => v,
        None => return Vec::new(),
    };
    let (mut input, count) = match entry_count(body) {
        Ok(v) => v,
        Err(_) => return Vec::new(),
    };

    let mut players = Vec::with_capacity(usize::from(count).min(input.len()));
    for i in 0..count {
        match player_entry(input) {
            Ok((rest, name)) => {
                players.push(lossy(name));
                input = rest;
            }
            Err(_) => {
                trace!("Player list ends after {} of {} entries", i, count);
                break;
            }
        }
    }

    players
}
