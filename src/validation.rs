//! Input validation for user-supplied names, namespaces, contexts, and
//! numeric parameters. Everything here runs before any kubectl invocation;
//! user strings only ever become argv elements.

use thiserror::Error;

pub const MAX_RESOURCE_NAME_LENGTH: usize = 253;
pub const MAX_NAMESPACE_LENGTH: usize = 63;
pub const MAX_CONTEXT_LENGTH: usize = 253;
pub const MAX_HORIZON_HOURS: u32 = 720;
pub const MAX_GRAPH_DEPTH: u32 = 10;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Resource name cannot be empty")]
    EmptyName,
    #[error("Resource name too long: {0} chars (max {MAX_RESOURCE_NAME_LENGTH})")]
    NameTooLong(usize),
    #[error("Invalid resource name '{0}': must be a lowercase RFC 1123 DNS label")]
    InvalidName(String),
    #[error("Namespace cannot be empty string")]
    EmptyNamespace,
    #[error("Namespace too long: {0} chars (max {MAX_NAMESPACE_LENGTH})")]
    NamespaceTooLong(usize),
    #[error("Invalid namespace '{0}': must be a lowercase RFC 1123 DNS label")]
    InvalidNamespace(String),
    #[error("Context cannot be empty string")]
    EmptyContext,
    #[error("Context name too long: {0} chars (max {MAX_CONTEXT_LENGTH})")]
    ContextTooLong(usize),
    #[error("Invalid context '{0}': only alphanumerics and '.-_' are allowed")]
    InvalidContext(String),
    #[error("Horizon must be >= 1 hour, got {0}")]
    HorizonTooSmall(u32),
    #[error("Horizon too large: {0} hours (max {MAX_HORIZON_HOURS} hours / 30 days)")]
    HorizonTooLarge(u32),
    #[error("Depth must be >= 1, got {0}")]
    DepthTooSmall(u32),
    #[error("Depth too large: {0} (max {MAX_GRAPH_DEPTH})")]
    DepthTooLarge(u32),
}

/// RFC 1123 DNS label: lowercase alphanumerics and hyphens, starting and
/// ending with an alphanumeric.
fn is_dns_label(s: &str) -> bool {
    let bytes = s.as_bytes();
    if bytes.is_empty() {
        return false;
    }
    let alnum = |b: u8| b.is_ascii_lowercase() || b.is_ascii_digit();
    if !alnum(bytes[0]) || !alnum(bytes[bytes.len() - 1]) {
        return false;
    }
    bytes.iter().all(|&b| alnum(b) || b == b'-')
}

pub fn validate_resource_name(name: &str) -> Result<(), ValidationError> {
    if name.is_empty() {
        return Err(ValidationError::EmptyName);
    }
    if name.len() > MAX_RESOURCE_NAME_LENGTH {
        return Err(ValidationError::NameTooLong(name.len()));
    }
    if !is_dns_label(name) {
        return Err(ValidationError::InvalidName(name.to_string()));
    }
    Ok(())
}

pub fn validate_namespace(namespace: Option<&str>) -> Result<(), ValidationError> {
    let Some(ns) = namespace else {
        return Ok(());
    };
    if ns.is_empty() {
        return Err(ValidationError::EmptyNamespace);
    }
    if ns.len() > MAX_NAMESPACE_LENGTH {
        return Err(ValidationError::NamespaceTooLong(ns.len()));
    }
    if !is_dns_label(ns) {
        return Err(ValidationError::InvalidNamespace(ns.to_string()));
    }
    Ok(())
}

pub fn validate_context(context: Option<&str>) -> Result<(), ValidationError> {
    let Some(ctx) = context else {
        return Ok(());
    };
    if ctx.is_empty() {
        return Err(ValidationError::EmptyContext);
    }
    if ctx.len() > MAX_CONTEXT_LENGTH {
        return Err(ValidationError::ContextTooLong(ctx.len()));
    }
    let bytes = ctx.as_bytes();
    let inner_ok = bytes
        .iter()
        .all(|&b| b.is_ascii_alphanumeric() || b == b'-' || b == b'.' || b == b'_');
    let ends_ok = bytes[0].is_ascii_alphanumeric() && bytes[bytes.len() - 1].is_ascii_alphanumeric();
    if !inner_ok || !ends_ok {
        return Err(ValidationError::InvalidContext(ctx.to_string()));
    }
    Ok(())
}

pub fn validate_horizon(horizon: u32) -> Result<(), ValidationError> {
    if horizon < 1 {
        return Err(ValidationError::HorizonTooSmall(horizon));
    }
    if horizon > MAX_HORIZON_HOURS {
        return Err(ValidationError::HorizonTooLarge(horizon));
    }
    Ok(())
}

pub fn validate_depth(depth: u32) -> Result<(), ValidationError> {
    if depth < 1 {
        return Err(ValidationError::DepthTooSmall(depth));
    }
    if depth > MAX_GRAPH_DEPTH {
        return Err(ValidationError::DepthTooLarge(depth));
    }
    Ok(())
}

/// Validate the common subject inputs in one call.
pub fn validate_subject(
    name: &str,
    namespace: Option<&str>,
    context: Option<&str>,
) -> Result<(), ValidationError> {
    validate_resource_name(name)?;
    validate_namespace(namespace)?;
    validate_context(context)?;
    Ok(())
}
