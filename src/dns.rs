use crate::{
    errors::{Error, Result},
    models::Host,
    util::to_v4,
};

use {
    std::net::{IpAddr, SocketAddr, SocketAddrV4},
    tracing::debug,
    trust_dns_resolver::TokioAsyncResolver,
};

fn literal(addr: SocketAddr) -> Result<SocketAddrV4> {
    to_v4(addr).ok_or_else(|| Error::resolution(addr, "not an IPv4 address"))
}

/// Resolves `host` to the IPv4 address the query protocol is spoken to.
pub async fn resolve_host(host: &Host) -> Result<SocketAddrV4> {
    match host {
        Host::A(addr) => literal(*addr),
        Host::S(stringaddr) => {
            if let Ok(ip) = stringaddr.host.parse::<IpAddr>() {
                return literal(SocketAddr::new(ip, stringaddr.port));
            }

            let resolver = TokioAsyncResolver::tokio_from_system_conf()
                .map_err(|e| Error::resolution(stringaddr, e))?;
            let addr = resolver
                .lookup_ip(stringaddr.host.as_str())
                .await
                .map_err(|e| Error::resolution(stringaddr, e))?
                .iter()
                .find_map(|ip| to_v4(SocketAddr::new(ip, stringaddr.port)))
                .ok_or_else(|| Error::resolution(stringaddr, "no IPv4 address found"))?;

            debug!("Resolved {} to {}", stringaddr, addr);
            Ok(addr)
        }
    }
}
