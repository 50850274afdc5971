use thiserror::Error;

#[derive(Debug, Error)]
pub enum AplcheckError {
    #[error("config: {message}")]
    Config { message: String },

    #[error("connection: {message}")]
    Connection { message: String },

    #[error("HTTP {status}: {message}")]
    Remote { status: u16, message: String },

    #[error("response: {message}")]
    Response { message: String },

    #[error("timeout: query cancelled after {millis}ms")]
    Timeout { millis: u128 },

    #[error("format: {message}")]
    Format { message: String },
}
