use thiserror::Error;

use pf_common::TokenParseError;
use pf_gateway::GatewayError;

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Token parse error: {0}")]
    Parse(#[from] TokenParseError),

    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),
}
