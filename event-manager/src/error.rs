use callback_server::ServerError;
use thiserror::Error;
use upnp_api::ApiError;

/// Errors that can occur in the subscription manager
#[derive(Error, Debug)]
pub enum ManagerError {
    /// A GENA request failed or was answered with something unusable
    #[error(transparent)]
    Api(#[from] ApiError),

    /// The callback listener could not be bound
    #[error("Failed to start callback listener: {0}")]
    Listener(#[from] ServerError),

    /// A worker thread could not be spawned
    #[error("Failed to spawn {name} thread: {source}")]
    WorkerSpawn {
        name: &'static str,
        #[source]
        source: std::io::Error,
    },

    /// `register` needs a running listener to advertise
    #[error("Callback listener is not running")]
    NotStarted,

    /// No local address routes to the device
    #[error("No callback address reaches {0}")]
    NoCallbackAddress(String),

    /// The service holds no active subscription
    #[error("No subscription for service {0}")]
    NotSubscribed(String),
}

/// Result type for subscription manager operations
pub type Result<T> = std::result::Result<T, ManagerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_is_transparent() {
        let err: ManagerError = ApiError::NetworkError("connection refused".to_string()).into();
        assert_eq!(err.to_string(), "Network error: connection refused");
    }

    #[test]
    fn test_not_subscribed_display() {
        let err = ManagerError::NotSubscribed("uuid:a::urn:upnp-org:serviceId:AVTransport".to_string());
        assert_eq!(
            err.to_string(),
            "No subscription for service uuid:a::urn:upnp-org:serviceId:AVTransport"
        );
    }
}
