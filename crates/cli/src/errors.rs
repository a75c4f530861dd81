use serde_json::{Value as JsonValue, json};

use tokenledger_core::DomainError;
use tokenledger_infra::DispatchError;

pub fn dispatch_error_to_response(err: &DispatchError) -> JsonValue {
    match err {
        DispatchError::Rejected(domain) => json_error(domain_error_code(domain), domain.reason()),
        DispatchError::Concurrency(msg) => json_error("conflict", msg.clone()),
        DispatchError::Poisoned => json_error("internal", err.to_string()),
        DispatchError::CorruptStream(_)
        | DispatchError::Deserialize(_)
        | DispatchError::Store(_) => json_error("store_error", err.to_string()),
    }
}

pub fn domain_error_code(err: &DomainError) -> &'static str {
    match err {
        DomainError::InvalidRecipient => "invalid_recipient",
        DomainError::InvalidSpender => "invalid_spender",
        DomainError::InsufficientBalance { .. } => "insufficient_balance",
        DomainError::InsufficientAllowance { .. } => "insufficient_allowance",
        DomainError::Validation(_) => "validation_error",
        DomainError::InvalidAddress(_) => "invalid_address",
        DomainError::InvalidAmount(_) => "invalid_amount",
        DomainError::InvariantViolation(_) => "invariant_violation",
        DomainError::NotCreated => "not_created",
        DomainError::Conflict(_) => "conflict",
    }
}

pub fn json_error(code: &'static str, message: impl Into<String>) -> JsonValue {
    json!({
        "ok": false,
        "code": code,
        "error": message.into(),
    })
}
