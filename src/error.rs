use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Network, DNS or timeout failure after the transport retry budget ran out.
    #[error("connectivity error: {0}")]
    Connectivity(#[source] reqwest::Error),

    /// The login endpoint rejected the credentials.
    #[error("authentication failed ({status}): {message}")]
    AuthFailed { status: u16, message: String },

    /// The token could not be recovered by a refresh. Hosts should ask for
    /// new credentials.
    #[error("token expired and could not be refreshed")]
    TokenExpired,

    #[error("vendor error ({status}): {message}")]
    Vendor { status: u16, message: String },

    #[error("invalid device index: {0}")]
    InvalidDevice(usize),

    #[error("device {index} has no {field} field")]
    MissingField { index: usize, field: &'static str },

    #[error("no email or tokens configured")]
    MissingCredentials,

    #[error("config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Connectivity(e)
    }
}

impl Error {
    /// True for failures that a later retry may fix without new credentials.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Connectivity(_))
    }

    /// True when the host must re-run the credential flow.
    pub fn needs_reauth(&self) -> bool {
        matches!(self, Error::AuthFailed { .. } | Error::TokenExpired | Error::MissingCredentials)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reauth_classification() {
        assert!(Error::TokenExpired.needs_reauth());
        assert!(
            Error::AuthFailed {
                status: 401,
                message: "bad".into()
            }
            .needs_reauth()
        );
        assert!(!Error::InvalidDevice(3).needs_reauth());
        assert!(!Error::TokenExpired.is_transient());
    }

    #[test]
    fn display_messages() {
        let err = Error::MissingField {
            index: 0,
            field: "cspHome",
        };
        assert_eq!(err.to_string(), "device 0 has no cspHome field");
        let err = Error::Vendor {
            status: 500,
            message: "boom".into(),
        };
        assert_eq!(err.to_string(), "vendor error (500): boom");
    }
}
