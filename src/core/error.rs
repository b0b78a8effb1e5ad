

use thiserror::Error;

use crate::db::StoreError;
use crate::toolkit::deletion::models::EntityRef;


#[derive(Error, Debug)]
pub enum PurgeError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Entity not found: {0}")]
    NotFound(EntityRef),

    #[error("Deletion blocked for {target}: {reason}")]
    Blocked { target: EntityRef, reason: String },

    #[error("Entity {0} is locked by another deletion in progress")]
    Locked(EntityRef),

    #[error("Plan for {0} is stale: the store changed since analysis")]
    StalePlan(EntityRef),

    #[error("Invalid session transition from {from} to {to}")]
    InvalidTransition { from: &'static str, to: &'static str },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}


pub type Result<T> = std::result::Result<T, PurgeError>;
