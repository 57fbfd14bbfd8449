//! # Error taxonomy
//!
//! Every lookup ends in exactly one of three failure kinds, each mapped to a
//! fixed HTTP status and a fixed client message. The underlying cause is kept
//! on the error for logging and never leaks into the response body.
//!
//! | Kind | Status | Client message |
//! |---|---|---|
//! | [`LookupError::Validation`] | 400 | `Malformed or missing <field>` |
//! | [`LookupError::NotFound`] | 404 | `<Entity> not found` |
//! | [`LookupError::Upstream`] | 502 | `Failed to fetch data from <Upstream>` |

use thiserror::Error;

/// Why an upstream call could not produce a usable body.
#[derive(Debug, Error)]
pub enum UpstreamFailure {
    /// The configured deadline elapsed before the upstream answered.
    #[error("upstream request timed out")]
    Timeout,
    /// Connection, DNS or TLS failure.
    #[error("transport error: {0}")]
    Transport(String),
    /// A status that is neither 2xx nor 404.
    #[error("unexpected upstream status {0}")]
    Status(u16),
    /// A 2xx answer whose body is not JSON of the expected shape.
    #[error("unusable upstream body: {0}")]
    Body(String),
}

/// Terminal outcome of a failed lookup.
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("malformed or missing query parameter `{field}`")]
    Validation { field: &'static str },

    #[error("{entity} not found upstream")]
    NotFound { entity: &'static str },

    #[error("failed to fetch from {upstream}: {source}")]
    Upstream {
        upstream: &'static str,
        #[source]
        source: UpstreamFailure,
    },
}

impl LookupError {
    /// HTTP status the error is answered with.
    #[must_use]
    pub fn status(&self) -> u16 {
        match self {
            LookupError::Validation { .. } => 400,
            LookupError::NotFound { .. } => 404,
            LookupError::Upstream { .. } => 502,
        }
    }

    /// The fixed message placed in `{ "error": ... }`.
    #[must_use]
    pub fn client_message(&self) -> String {
        match self {
            LookupError::Validation { field } => format!("Malformed or missing {field}"),
            LookupError::NotFound { entity } => format!("{entity} not found"),
            LookupError::Upstream { upstream, .. } => {
                format!("Failed to fetch data from {upstream}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(LookupError::Validation { field: "name" }.status(), 400);
        assert_eq!(LookupError::NotFound { entity: "Book" }.status(), 404);
        let upstream = LookupError::Upstream {
            upstream: "Open Library",
            source: UpstreamFailure::Timeout,
        };
        assert_eq!(upstream.status(), 502);
    }

    #[test]
    fn test_client_message_hides_cause() {
        let err = LookupError::Upstream {
            upstream: "PokéAPI",
            source: UpstreamFailure::Transport("connection refused (os error 111)".into()),
        };
        assert_eq!(err.client_message(), "Failed to fetch data from PokéAPI");
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn test_client_messages() {
        assert_eq!(
            LookupError::Validation { field: "isbn" }.client_message(),
            "Malformed or missing isbn"
        );
        assert_eq!(
            LookupError::NotFound { entity: "Pokemon" }.client_message(),
            "Pokemon not found"
        );
    }
}
