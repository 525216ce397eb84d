//! Error types shared across the agent.
//!
//! Low-level data problems (missing price file, corrupt ledger line) are not
//! errors here: the store and ledger degrade to empty results and log instead.
//! These variants cover the conditions that must stop a session.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, AgentError>;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("llm error: {0}")]
    Llm(String),

    #[error("undecodable decision: {0}")]
    Decision(String),

    #[error("trade rejected: {0}")]
    Trade(String),

    #[error("ledger error: {0}")]
    Ledger(String),
}
