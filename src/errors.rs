use std::io;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to resolve host {host}: {reason}")]
    Resolution { host: String, reason: String },
    #[error("{context}: {source}")]
    Network {
        context: &'static str,
        #[source]
        source: io::Error,
    },
    #[error("socket read timed out")]
    Timeout,
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

impl Error {
    pub(crate) fn network(context: &'static str) -> impl FnOnce(io::Error) -> Self {
        move |source| Error::Network { context, source }
    }

    pub(crate) fn resolution<H, R>(host: H, reason: R) -> Self
    where
        H: ToString,
        R: ToString,
    {
        Error::Resolution {
            host: host.to_string(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
