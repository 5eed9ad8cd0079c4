use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("error-crowdsense-config-1 Required environment variable not set: {var_name}")]
    EnvVarRequired { var_name: String },

    #[error("error-crowdsense-config-2 Version not available")]
    VersionNotAvailable,

    #[error("error-crowdsense-config-3 Invalid distance value: {value}")]
    InvalidDistance { value: String },

    #[error("error-crowdsense-config-4 Invalid duration value: {value}")]
    InvalidDuration { value: String },

    #[error("error-crowdsense-config-5 Invalid URL: {url}: {details}")]
    InvalidUrl { url: String, details: String },
}

#[derive(Error, Debug)]
pub enum TaskError {
    #[error("error-crowdsense-task-1 Task has no triggers: {task_id}")]
    NoTriggers { task_id: String },

    #[error(
        "error-crowdsense-task-2 No trigger could be resolved to a reference entry: {task_id}"
    )]
    NoResolvableTriggers { task_id: String },

    #[error(
        "error-crowdsense-task-3 Invalid trigger window: valid_from {valid_from} is after valid_to {valid_to}"
    )]
    InvalidWindow {
        valid_from: chrono::DateTime<chrono::Utc>,
        valid_to: chrono::DateTime<chrono::Utc>,
    },

    #[error("error-crowdsense-task-4 Task identifier is empty")]
    EmptyTaskId,

    #[error(
        "error-crowdsense-task-5 Invalid coordinate: latitude {latitude}, longitude {longitude}"
    )]
    InvalidCoordinate { latitude: f64, longitude: f64 },
}

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("error-crowdsense-provider-1 HTTP request failed: {0}")]
    HttpRequestFailed(#[from] reqwest::Error),

    #[error("error-crowdsense-provider-2 Request timeout: exceeded {timeout_ms}ms")]
    RequestTimeout { timeout_ms: u64 },

    #[error("error-crowdsense-provider-3 Unexpected status: HTTP {status} from {operation}")]
    UnexpectedStatus { operation: String, status: u16 },

    #[error("error-crowdsense-provider-4 Response decoding failed: {operation}: {details}")]
    DecodeFailed { operation: String, details: String },
}

#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("error-crowdsense-delivery-1 HTTP request failed: {0}")]
    HttpRequestFailed(#[from] reqwest::Error),

    #[error("error-crowdsense-delivery-2 Request timeout: exceeded {timeout_ms}ms")]
    RequestTimeout { timeout_ms: u64 },

    #[error("error-crowdsense-delivery-3 Callback target rejected delivery: HTTP {status}")]
    Rejected { status: u16 },

    #[error("error-crowdsense-delivery-4 Payload serialization failed: {source}")]
    SerializationFailed {
        #[source]
        source: serde_json::Error,
    },
}
