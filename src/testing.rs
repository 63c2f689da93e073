//! Packet builders and an in-process fake server shared by the unit tests.

use crate::protocols::samp::{QueryKind, HEADER_LEN, SIGNATURE};

use std::{
    collections::HashMap,
    net::{Ipv4Addr, SocketAddr, SocketAddrV4},
};
use tokio::{net::UdpSocket, task::JoinHandle};
use tracing::trace;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn header(kind: QueryKind) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_LEN);
    out.extend_from_slice(SIGNATURE);
    out.extend_from_slice(&[127, 0, 0, 1]);
    out.extend_from_slice(&7777u16.to_le_bytes());
    out.push(kind.opcode());
    out
}

pub fn response(kind: QueryKind, payload: &[u8]) -> Vec<u8> {
    let mut out = header(kind);
    out.extend_from_slice(payload);
    out
}

pub fn info_payload(
    password: bool,
    players: u16,
    max_players: u16,
    hostname: &[u8],
    gamemode: &[u8],
    language: &[u8],
) -> Vec<u8> {
    let mut out = vec![password as u8];
    out.extend_from_slice(&players.to_le_bytes());
    out.extend_from_slice(&max_players.to_le_bytes());
    for s in &[hostname, gamemode, language] {
        out.extend_from_slice(&(s.len() as u32).to_le_bytes());
        out.extend_from_slice(s);
    }
    out
}

pub fn rules_payload(rules: &[(&str, &str)]) -> Vec<u8> {
    let mut out = (rules.len() as u16).to_le_bytes().to_vec();
    for (k, v) in rules {
        out.push(k.len() as u8);
        out.extend_from_slice(k.as_bytes());
        out.push(v.len() as u8);
        out.extend_from_slice(v.as_bytes());
    }
    out
}

pub fn players_payload(names: &[&str]) -> Vec<u8> {
    let mut out = (names.len() as u16).to_le_bytes().to_vec();
    for (score, name) in names.iter().enumerate() {
        out.push(name.len() as u8);
        out.extend_from_slice(name.as_bytes());
        out.extend_from_slice(&(score as u32).to_le_bytes());
    }
    out
}

/// UDP server answering each opcode with a canned datagram. Opcodes without a
/// canned reply are left unanswered.
pub struct FakeServer {
    pub addr: SocketAddrV4,
    handle: JoinHandle<()>,
}

impl FakeServer {
    pub async fn spawn(replies: HashMap<QueryKind, Vec<u8>>) -> Self {
        let socket = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
        let addr = match socket.local_addr().unwrap() {
            SocketAddr::V4(v) => v,
            SocketAddr::V6(_) => unreachable!("bound to an IPv4 address"),
        };

        let handle = tokio::spawn(async move {
            let mut buf = [0u8; 2048];
            loop {
                let (n, peer) = match socket.recv_from(&mut buf).await {
                    Ok(v) => v,
                    Err(_) => return,
                };
                if n < HEADER_LEN {
                    continue;
                }
                let kind = match QueryKind::from_opcode(buf[HEADER_LEN - 1]) {
                    Some(kind) => kind,
                    None => continue,
                };
                trace!("Fake server got {} query from {}", kind, peer);
                if let Some(reply) = replies.get(&kind) {
                    let _ = socket.send_to(reply, peer).await;
                }
            }
        });

        Self { addr, handle }
    }
}

impl Drop for FakeServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
