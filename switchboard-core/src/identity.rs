//! Agent identity normalization and transfer targets.

use crate::error::{DeskError, DeskResult};
use serde::{Deserialize, Serialize};

const CLIENT_PREFIX: &str = "client:";
const AGENT_PREFIX: &str = "agent:";

fn is_identity_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '@' | ':' | '+')
}

/// Normalize an agent identity to the canonical `client:agent:<id>` form.
///
/// Bare ids and `agent:` ids gain the missing prefixes. Anything already
/// starting with `client:` is returned unchanged, so the function is
/// idempotent.
pub fn normalize_identity(raw: &str) -> DeskResult<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(DeskError::validation("targetIdentity", "identity must not be empty"));
    }
    if let Some(bad) = trimmed.chars().find(|c| !is_identity_char(*c)) {
        return Err(DeskError::validation(
            "targetIdentity",
            format!("identity contains invalid character {:?}", bad),
        ));
    }

    if trimmed.starts_with(CLIENT_PREFIX) {
        if trimmed.len() == CLIENT_PREFIX.len() {
            return Err(DeskError::validation("targetIdentity", "identity must not be empty"));
        }
        return Ok(trimmed.to_string());
    }
    if let Some(id) = trimmed.strip_prefix(AGENT_PREFIX) {
        if id.is_empty() {
            return Err(DeskError::validation("targetIdentity", "agent id must not be empty"));
        }
        return Ok(format!("{}{}", CLIENT_PREFIX, trimmed));
    }
    Ok(format!("{}{}{}", CLIENT_PREFIX, AGENT_PREFIX, trimmed))
}

/// Whether a transfer targets another agent or an external number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    #[default]
    Agent,
    Number,
}

/// Resolved destination of a transfer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TransferTarget {
    /// A normalized `client:agent:<id>` identity.
    Client(String),
    /// An E.164 phone number.
    Number(String),
}

impl TransferTarget {
    pub fn parse(kind: TargetKind, raw: &str) -> DeskResult<Self> {
        match kind {
            TargetKind::Agent => normalize_identity(raw).map(TransferTarget::Client),
            TargetKind::Number => {
                let number = raw.trim();
                if is_e164(number) {
                    Ok(TransferTarget::Number(number.to_string()))
                } else {
                    Err(DeskError::validation(
                        "targetIdentity",
                        "number must be in E.164 format",
                    ))
                }
            }
        }
    }

    /// The address as a call's `to` field expects it.
    pub fn address(&self) -> &str {
        match self {
            TransferTarget::Client(identity) => identity,
            TransferTarget::Number(number) => number,
        }
    }

    /// Client name used inside `<Dial><Client>`, without the `client:` scheme.
    pub fn dial_client_name(&self) -> Option<&str> {
        match self {
            TransferTarget::Client(identity) => identity.strip_prefix(CLIENT_PREFIX),
            TransferTarget::Number(_) => None,
        }
    }
}

fn is_e164(number: &str) -> bool {
    let Some(digits) = number.strip_prefix('+') else {
        return false;
    };
    (8..=15).contains(&digits.len())
        && digits.chars().all(|c| c.is_ascii_digit())
        && !digits.starts_with('0')
}
