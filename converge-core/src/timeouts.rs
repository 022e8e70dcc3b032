//! Per-operation timeouts
//!
//! Each lifecycle operation that waits on the provider (create, update,
//! delete) has its own time budget. Budgets are written as duration strings
//! such as `30s`, `10m` or `1h30m`, either on the command line or in a
//! `timeouts` map attribute on the resource.

use std::collections::HashMap;
use std::time::Duration;

use thiserror::Error;

use crate::resource::Value;

/// Default budget for every operation (10 minutes)
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);

/// Longest budget accepted from a duration string (one year)
pub const MAX_TIMEOUT: Duration = Duration::from_secs(365 * 24 * 3600);

/// Error returned when a duration string cannot be parsed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimeoutParseError {
    #[error("Empty duration")]
    Empty,

    #[error("Invalid duration '{input}': {reason}")]
    Invalid { input: String, reason: String },

    #[error("Unknown timeout operation '{0}', expected create, update or delete")]
    UnknownOperation(String),
}

/// Time budgets for the waiting lifecycle operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceTimeouts {
    pub create: Duration,
    pub update: Duration,
    pub delete: Duration,
}

impl Default for ResourceTimeouts {
    fn default() -> Self {
        Self {
            create: DEFAULT_TIMEOUT,
            update: DEFAULT_TIMEOUT,
            delete: DEFAULT_TIMEOUT,
        }
    }
}

impl ResourceTimeouts {
    pub fn with_create(mut self, timeout: Duration) -> Self {
        self.create = timeout;
        self
    }

    pub fn with_update(mut self, timeout: Duration) -> Self {
        self.update = timeout;
        self
    }

    pub fn with_delete(mut self, timeout: Duration) -> Self {
        self.delete = timeout;
        self
    }

    /// Read overrides from a `timeouts` attribute map
    ///
    /// Missing operations keep their defaults.
    pub fn from_attributes(
        attributes: &HashMap<String, Value>,
    ) -> Result<Self, TimeoutParseError> {
        let mut timeouts = Self::default();
        let Some(Value::Map(map)) = attributes.get("timeouts") else {
            return Ok(timeouts);
        };

        for (operation, value) in map {
            let raw = value.as_str().ok_or_else(|| TimeoutParseError::Invalid {
                input: format!("{:?}", value),
                reason: "expected a duration string".to_string(),
            })?;
            let duration = parse_duration(raw)?;
            match operation.as_str() {
                "create" => timeouts.create = duration,
                "update" => timeouts.update = duration,
                "delete" => timeouts.delete = duration,
                other => return Err(TimeoutParseError::UnknownOperation(other.to_string())),
            }
        }

        Ok(timeouts)
    }
}

/// Parse a duration string made of `<number><unit>` groups
///
/// Units are `h`, `m`, `s` and `ms`; groups may be combined (`1h30m`).
pub fn parse_duration(input: &str) -> Result<Duration, TimeoutParseError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(TimeoutParseError::Empty);
    }

    let invalid = |reason: &str| TimeoutParseError::Invalid {
        input: input.to_string(),
        reason: reason.to_string(),
    };

    let mut total = Duration::ZERO;
    let mut rest = trimmed;
    while !rest.is_empty() {
        let digits = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
        if digits == 0 {
            return Err(invalid("expected a number"));
        }
        let amount: u64 = rest[..digits]
            .parse()
            .map_err(|_| invalid("number out of range"))?;
        rest = &rest[digits..];

        let unit_len = rest.find(|c: char| c.is_ascii_digit()).unwrap_or(rest.len());
        let part = match &rest[..unit_len] {
            "h" => amount.checked_mul(3600).map(Duration::from_secs),
            "m" => amount.checked_mul(60).map(Duration::from_secs),
            "s" => Some(Duration::from_secs(amount)),
            "ms" => Some(Duration::from_millis(amount)),
            "" => return Err(invalid("missing unit")),
            _ => return Err(invalid("unknown unit, expected h, m, s or ms")),
        };
        rest = &rest[unit_len..];
        total = part
            .and_then(|part| total.checked_add(part))
            .filter(|total| *total <= MAX_TIMEOUT)
            .ok_or_else(|| invalid("duration too large"))?;
    }

    Ok(total)
}
