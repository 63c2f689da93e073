//!
//! Asynchronous client for the SA:MP / open.mp server query protocol.
//!
//! The `samp_query` crate retrieves a game server's hostname, player counts, game mode,
//! language, rules, player list and latency, and detects open.mp servers.

pub mod dns;
pub mod encoding;
pub mod errors;
pub mod models;
pub use models::*;
pub mod protocols;
pub mod query;
pub use query::{cancel_after, Query, QueryConfig, RawResponse};
pub mod util;

#[cfg(test)]
mod testing;

use errors::Result;

use {rand::RngCore, tracing::debug};

pub use protocols::samp::QueryKind;
pub use tokio_util::sync::CancellationToken;

/// Marker in the `version` rule of open.mp servers.
const OMP_VERSION_MARKER: &str = "omp ";
/// Rule only open.mp servers report.
const OMP_RULE: &str = "allow_DL";

/// Whether the rules alone identify an open.mp server.
pub fn omp_from_rules(rules: &Rules) -> bool {
    rules
        .get("version")
        .map_or(false, |v| v.contains(OMP_VERSION_MARKER))
        || rules.contains_key(OMP_RULE)
}

async fn collect<R>(
    query: &mut Query<R>,
    address: String,
    attempt_decode: bool,
    cancel: &CancellationToken,
) -> Result<ServerRecord>
where
    R: RngCore + Send,
{
    let info = query.get_info(attempt_decode, cancel).await?;
    let mut server = ServerRecord::new(address, info);

    server.rules = query.get_rules(cancel).await?;
    server.ping = query.get_ping(cancel).await?;

    // Probe only when the rules are inconclusive.
    server.is_omp = omp_from_rules(&server.rules) || query.probe_variant(cancel).await;

    debug!(
        "Queried {}: {} ({}/{}), open.mp: {}",
        server.address, server.hostname, server.players, server.max_players, server.is_omp
    );
    Ok(server)
}

/// Runs a full query cycle against `host` (`"host:port"`).
///
/// `attempt_decode` runs hostname, game mode and language through the legacy code page
/// heuristics in [`encoding`]. The first hard error aborts the cycle.
pub async fn get_server_info(
    host: &str,
    attempt_decode: bool,
    cancel: &CancellationToken,
) -> Result<ServerRecord> {
    let mut query = Query::new(host).await?;
    collect(&mut query, host.to_string(), attempt_decode, cancel).await
}

/// Same as [`get_server_info`] for an already constructed query.
pub async fn get_server_info_with<R>(
    query: &mut Query<R>,
    attempt_decode: bool,
    cancel: &CancellationToken,
) -> Result<ServerRecord>
where
    R: RngCore + Send,
{
    let address = query.addr().to_string();
    collect(query, address, attempt_decode, cancel).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        errors::Error,
        testing::{info_payload, init_tracing, response, rules_payload, FakeServer},
    };
    use std::{collections::HashMap, time::Duration};

    fn rules(entries: &[(&str, &str)]) -> Rules {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn replies(rules: &[(&str, &str)], probe: bool) -> HashMap<QueryKind, Vec<u8>> {
        let mut out = HashMap::new();
        out.insert(
            QueryKind::Info,
            response(
                QueryKind::Info,
                &info_payload(false, 12, 32, b"Test Server", b"DM", b"English"),
            ),
        );
        out.insert(QueryKind::Rules, response(QueryKind::Rules, &rules_payload(rules)));
        out.insert(QueryKind::Ping, response(QueryKind::Ping, &[9, 9, 9, 9]));
        if probe {
            out.insert(
                QueryKind::VariantProbe,
                response(QueryKind::VariantProbe, &[9, 9, 9, 9]),
            );
        }
        out
    }

    #[test]
    fn test_omp_from_rules() {
        assert!(omp_from_rules(&rules(&[("version", "omp 1.1.0.2612")])));
        assert!(omp_from_rules(&rules(&[("allow_DL", "1")])));
        assert!(omp_from_rules(&rules(&[
            ("version", "0.3.7-R2"),
            ("allow_DL", "0")
        ])));
        assert!(!omp_from_rules(&rules(&[("version", "0.3.7-R2")])));
        assert!(!omp_from_rules(&rules(&[("version", "0.3.DL-R1")])));
        assert!(!omp_from_rules(&Rules::new()));
    }

    #[tokio::test]
    async fn test_get_server_info() -> anyhow::Result<()> {
        init_tracing();
        let server = FakeServer::spawn(replies(
            &[("mapname", "San Andreas"), ("version", "0.3.7-R2")],
            false,
        ))
        .await;
        let host = server.addr.to_string();

        let result = get_server_info(&host, true, &cancel_after(Duration::from_secs(5))).await?;

        assert_eq!(result.address, host);
        assert_eq!(result.hostname, "Test Server");
        assert_eq!(result.gamemode, "DM");
        assert_eq!(result.language, "English");
        assert_eq!(result.players, 12);
        assert_eq!(result.max_players, 32);
        assert!(!result.password);
        assert_eq!(result.rules["mapname"], "San Andreas");
        assert!(!result.is_omp);
        Ok(())
    }

    #[tokio::test]
    async fn test_omp_detected_by_version_rule() -> anyhow::Result<()> {
        init_tracing();
        // The probe is never answered, so only the rules can tell.
        let server = FakeServer::spawn(replies(&[("version", "omp 1.1.0.2612")], false)).await;

        let result =
            get_server_info(&server.addr.to_string(), false, &CancellationToken::new()).await?;

        assert!(result.is_omp);
        Ok(())
    }

    #[tokio::test]
    async fn test_omp_detected_by_download_rule() -> anyhow::Result<()> {
        init_tracing();
        let server = FakeServer::spawn(replies(
            &[("version", "0.3.7-R2"), ("allow_DL", "1")],
            false,
        ))
        .await;
        let mut query = Query::from_addr(server.addr).with_config(QueryConfig {
            probe_read_timeout: Duration::from_secs(30),
            ..Default::default()
        });

        // An unanswered variant query would outlast this deadline and come back false.
        let cancel = cancel_after(Duration::from_secs(5));
        let result = get_server_info_with(&mut query, false, &cancel).await?;

        assert!(result.is_omp);
        assert!(!cancel.is_cancelled());
        Ok(())
    }

    #[tokio::test]
    async fn test_omp_detected_by_variant_query() -> anyhow::Result<()> {
        init_tracing();
        let server = FakeServer::spawn(replies(&[("version", "0.3.7-R2")], true)).await;
        let mut query = Query::from_addr(server.addr);

        let result = get_server_info_with(&mut query, false, &CancellationToken::new()).await?;

        assert_eq!(result.address, server.addr.to_string());
        assert!(result.is_omp);
        Ok(())
    }

    #[tokio::test]
    async fn test_malformed_info_aborts() {
        init_tracing();
        let mut replies = replies(&[], false);
        let mut info = info_payload(false, 12, 32, b"Test Server", b"DM", b"English");
        info.truncate(info.len() - 3);
        replies.insert(QueryKind::Info, response(QueryKind::Info, &info));
        let server = FakeServer::spawn(replies).await;

        let result = get_server_info(&server.addr.to_string(), false, &CancellationToken::new())
            .await;

        assert!(matches!(result, Err(Error::MalformedResponse(_))));
    }

    #[tokio::test]
    async fn test_missing_rules_abort() {
        init_tracing();
        let mut replies = replies(&[], false);
        replies.remove(&QueryKind::Rules);
        let server = FakeServer::spawn(replies).await;

        let result = get_server_info(
            &server.addr.to_string(),
            false,
            &cancel_after(Duration::from_millis(200)),
        )
        .await;

        assert!(matches!(result, Err(Error::Timeout)));
    }

    #[tokio::test]
    async fn test_missing_ping_aborts() {
        init_tracing();
        let mut replies = replies(&[("allow_DL", "1")], true);
        replies.remove(&QueryKind::Ping);
        let server = FakeServer::spawn(replies).await;

        let result = get_server_info(
            &server.addr.to_string(),
            false,
            &cancel_after(Duration::from_millis(200)),
        )
        .await;

        assert!(matches!(result, Err(Error::Timeout)));
    }

    #[tokio::test]
    async fn test_bad_host() {
        init_tracing();
        let result = get_server_info("no-port-here", false, &CancellationToken::new()).await;

        assert!(matches!(result, Err(Error::Resolution { .. })));
    }
}
