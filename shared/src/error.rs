use thiserror::Error;

use crate::config::ConfigError;
use crate::status::StatusError;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Status(#[from] StatusError),

    #[error("product {id} has not been confirmed by the backend yet")]
    Unconfirmed { id: String },

    #[error("no tokio runtime available to drive the store")]
    NoRuntime,
}
