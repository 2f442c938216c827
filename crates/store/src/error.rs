/// Errors from store reads, writes and subscriptions.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The store answered with a non-2xx status.
    #[error("Store returned HTTP {status}: {body}")]
    HttpStatus {
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// A response body or stream event was not the expected JSON.
    #[error("Invalid store payload: {0}")]
    Decode(#[from] serde_json::Error),

    /// The store cannot serve requests (closed, or deliberately failing).
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_status_display() {
        let err = StoreError::HttpStatus {
            status: 401,
            body: "Permission denied".to_string(),
        };
        assert_eq!(err.to_string(), "Store returned HTTP 401: Permission denied");
    }

    #[test]
    fn decode_error_converts() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: StoreError = json_err.into();
        assert!(err.to_string().starts_with("Invalid store payload"));
    }
}
