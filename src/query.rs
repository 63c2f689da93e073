use crate::{
    dns::resolve_host,
    encoding::{decode_text, detection_sample},
    errors::{Error, Result},
    models::{Host, Rules, ServerInfo, NO_LANGUAGE},
    protocols::{
        helpers::lossy,
        samp::{self, QueryKind, HEADER_LEN},
    },
    util::hex_str,
};

use {
    bytes::Bytes,
    derive_more::Deref,
    rand::{rngs::StdRng, RngCore, SeedableRng},
    std::{
        io,
        net::{Ipv4Addr, SocketAddrV4},
        time::{Duration, Instant},
    },
    tokio::{net::UdpSocket, sync::oneshot},
    tokio_util::sync::CancellationToken,
    tracing::{debug, trace},
};

/// Bytes of a single response, at least one header long.
#[derive(Clone, Debug, PartialEq, Eq, Deref)]
pub struct RawResponse(Bytes);

impl RawResponse {
    pub fn new(data: Bytes) -> Result<Self> {
        if data.len() < HEADER_LEN {
            return Err(Error::MalformedResponse(format!(
                "response is less than {} bytes",
                HEADER_LEN
            )));
        }
        Ok(Self(data))
    }

    pub fn into_inner(self) -> Bytes {
        self.0
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueryConfig {
    /// Size of the datagram receive buffer.
    pub recv_buffer_size: usize,
    /// Socket read deadline of the variant probe, applied even when the caller
    /// never cancels.
    pub probe_read_timeout: Duration,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            recv_buffer_size: 2048,
            probe_read_timeout: Duration::from_secs(1),
        }
    }
}

/// Returns a token that cancels itself after `timeout`.
pub fn cancel_after(timeout: Duration) -> CancellationToken {
    let token = CancellationToken::new();
    tokio::spawn({
        let token = token.clone();
        async move {
            tokio::time::sleep(timeout).await;
            token.cancel();
        }
    });
    token
}

/// `None` when the read deadline elapsed without a datagram.
type ReadOutcome = io::Result<Option<Bytes>>;

async fn read_response(
    socket: UdpSocket,
    buffer_size: usize,
    deadline: Option<Duration>,
) -> ReadOutcome {
    let mut buf = vec![0; buffer_size];
    let n = match deadline {
        Some(deadline) => match tokio::time::timeout(deadline, socket.recv(&mut buf)).await {
            Ok(res) => res?,
            Err(_) => return Ok(None),
        },
        None => socket.recv(&mut buf).await?,
    };
    buf.truncate(n);
    Ok(Some(Bytes::from(buf)))
}

/// Query handle for a single server. Each exchange uses its own socket.
#[derive(Debug)]
pub struct Query<R = StdRng> {
    addr: SocketAddrV4,
    rng: R,
    config: QueryConfig,
}

impl Query {
    pub async fn new(host: &str) -> Result<Self> {
        let host = host.parse::<Host>()?;
        Ok(Self::from_addr(resolve_host(&host).await?))
    }

    pub fn from_addr(addr: SocketAddrV4) -> Self {
        Self::with_rng(addr, StdRng::from_entropy())
    }
}

impl<R> Query<R>
where
    R: RngCore + Send,
{
    pub fn with_rng(addr: SocketAddrV4, rng: R) -> Self {
        Self {
            addr,
            rng,
            config: QueryConfig::default(),
        }
    }

    pub fn with_config(mut self, config: QueryConfig) -> Self {
        self.config = config;
        self
    }

    pub fn addr(&self) -> SocketAddrV4 {
        self.addr
    }

    async fn open_socket(&self) -> Result<UdpSocket> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))
            .await
            .map_err(Error::network("failed to bind"))?;
        socket
            .connect(self.addr)
            .await
            .map_err(Error::network("failed to dial"))?;
        Ok(socket)
    }

    /// Performs one exchange of the given kind.
    ///
    /// Returns `Ok(None)` only for [`QueryKind::VariantProbe`], when no response arrived
    /// before `cancel` fired or the probe read deadline elapsed. Every other kind fails
    /// with [`Error::Timeout`] instead.
    pub async fn send_query(
        &mut self,
        kind: QueryKind,
        cancel: &CancellationToken,
    ) -> Result<Option<RawResponse>> {
        let request = samp::encode_request(kind, self.addr, &mut self.rng);

        let socket = self.open_socket().await?;
        trace!("Sending {} query to {}: {}", kind, self.addr, hex_str(&request));
        socket
            .send(&request)
            .await
            .map_err(Error::network("failed to write"))?;

        let deadline = match kind {
            QueryKind::VariantProbe => Some(self.config.probe_read_timeout),
            _ => None,
        };
        let (tx, rx) = oneshot::channel::<ReadOutcome>();
        let reader = tokio::spawn({
            let buffer_size = self.config.recv_buffer_size;
            async move {
                let _ = tx.send(read_response(socket, buffer_size, deadline).await);
            }
        });

        let outcome = tokio::select! {
            _ = cancel.cancelled() => None,
            res = rx => Some(res),
        };
        reader.abort();

        let outcome = match outcome {
            Some(Ok(outcome)) => outcome,
            Some(Err(_)) => {
                return Err(Error::network("failed to read response")(io::Error::new(
                    io::ErrorKind::Other,
                    "read task ended without a result",
                )))
            }
            None => {
                debug!("{} query to {} was cancelled", kind, self.addr);
                return match kind {
                    QueryKind::VariantProbe => Ok(None),
                    _ => Err(Error::Timeout),
                };
            }
        };

        match outcome.map_err(Error::network("failed to read response"))? {
            Some(data) => {
                trace!("Received data from {}: {}", self.addr, hex_str(&data));
                RawResponse::new(data).map(Some)
            }
            None => {
                debug!("No {} response from {}", kind, self.addr);
                Ok(None)
            }
        }
    }

    async fn exchange(
        &mut self,
        kind: QueryKind,
        cancel: &CancellationToken,
    ) -> Result<RawResponse> {
        self.send_query(kind, cancel).await?.ok_or(Error::Timeout)
    }

    /// Core server info. With `attempt_decode` the text fields are run through the
    /// encoding heuristic, otherwise they are taken as-is.
    ///
    /// An empty language field is reported as `"-"`. A non-empty one is always kept,
    /// also without `attempt_decode`, where older query tools would report `"-"`.
    pub async fn get_info(
        &mut self,
        attempt_decode: bool,
        cancel: &CancellationToken,
    ) -> Result<ServerInfo> {
        let response = self.exchange(QueryKind::Info, cancel).await?;
        let info = samp::decode_info(&response)?;

        let (hostname, gamemode, language) = if attempt_decode {
            let sample = detection_sample(info.hostname, info.gamemode, info.language);
            let hint = lossy(info.language);
            (
                decode_text(info.hostname, &sample, &hint),
                decode_text(info.gamemode, &sample, &hint),
                decode_text(info.language, &sample, &hint),
            )
        } else {
            (
                lossy(info.hostname),
                lossy(info.gamemode),
                lossy(info.language),
            )
        };

        Ok(ServerInfo {
            password: info.password,
            players: info.players,
            max_players: info.max_players,
            hostname,
            gamemode,
            language: if language.is_empty() {
                NO_LANGUAGE.into()
            } else {
                language
            },
        })
    }

    pub async fn get_rules(&mut self, cancel: &CancellationToken) -> Result<Rules> {
        let response = self.exchange(QueryKind::Rules, cancel).await?;
        Ok(samp::decode_rules(&response))
    }

    /// Player names. Scores are not reported.
    pub async fn get_players(&mut self, cancel: &CancellationToken) -> Result<Vec<String>> {
        let response = self.exchange(QueryKind::PlayerList, cancel).await?;
        Ok(samp::decode_players(&response))
    }

    /// Round trip time of a ping exchange.
    pub async fn get_ping(&mut self, cancel: &CancellationToken) -> Result<Duration> {
        let t = Instant::now();
        self.exchange(QueryKind::Ping, cancel).await?;
        Ok(t.elapsed())
    }

    /// Whether the server answers the open.mp probe. Errors count as no answer.
    pub async fn probe_variant(&mut self, cancel: &CancellationToken) -> bool {
        match self.send_query(QueryKind::VariantProbe, cancel).await {
            Ok(res) => res.is_some(),
            Err(e) => {
                debug!("Variant probe of {} failed: {}", self.addr, e);
                false
            }
        }
    }
}
