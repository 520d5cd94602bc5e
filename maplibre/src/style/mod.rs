//! Vector tile format styling.

use std::io;

use thiserror::Error;

pub mod expression;
pub mod filter;
pub mod layer;
pub mod resolve;
mod style;

pub use style::*;

#[derive(Error, Debug)]
pub enum StyleError {
    #[error("failed to parse style: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to read style: {0}")]
    Io(#[from] io::Error),
    #[error("invalid filter: {0}")]
    InvalidFilter(String),
    #[error("invalid expression: {0}")]
    InvalidExpression(String),
}
