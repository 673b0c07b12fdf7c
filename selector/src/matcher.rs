// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! A parsed label selector.

use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, LabelSelectorRequirement};
use kube::core::{Selector, SelectorExt};

const MAX_NAME_LEN: usize = 63;
const MAX_PREFIX_LEN: usize = 253;

#[derive(Debug, thiserror::Error)]
pub enum SelectorError {
    #[error("invalid label key '{key}': {reason}")]
    InvalidKey { key: String, reason: &'static str },
    #[error("invalid value '{value}' for label key '{key}': {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: &'static str,
    },
    #[error("invalid requirement on label key '{key}': {reason}")]
    InvalidRequirement { key: String, reason: String },
    #[error("unparsable selector: {0}")]
    Unparsable(String),
    #[error("failed to serialize selector: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// A label selector parsed into a reusable predicate.
#[derive(Debug)]
pub struct Matcher {
    selector: Selector,
}

/// The key a selector is cached under: its JSON serialization.
/// An absent selector and an empty one both select everything and share a key.
pub fn canonical_key(selector: Option<&LabelSelector>) -> Result<String, SelectorError> {
    match selector {
        Some(selector) => Ok(serde_json::to_string(selector)?),
        None => Ok(serde_json::to_string(&LabelSelector::default())?),
    }
}

impl Matcher {
    /// Validate and parse a selector. `None` selects everything.
    pub fn parse(selector: Option<&LabelSelector>) -> Result<Self, SelectorError> {
        let selector = selector.cloned().unwrap_or_default();
        validate(&selector)?;
        let selector =
            Selector::try_from(selector).map_err(|e| SelectorError::Unparsable(e.to_string()))?;
        Ok(Self { selector })
    }

    /// True if the label set satisfies every requirement of the selector
    #[must_use]
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.selector.matches(labels)
    }
}

fn validate(selector: &LabelSelector) -> Result<(), SelectorError> {
    for (key, value) in selector.match_labels.iter().flatten() {
        validate_key(key)?;
        validate_value(key, value)?;
    }
    for req in selector.match_expressions.iter().flatten() {
        validate_requirement(req)?;
    }
    Ok(())
}

fn validate_requirement(req: &LabelSelectorRequirement) -> Result<(), SelectorError> {
    validate_key(&req.key)?;
    let values = req.values.as_deref().unwrap_or_default();
    match req.operator.as_str() {
        "In" | "NotIn" => {
            if values.is_empty() {
                return Err(SelectorError::InvalidRequirement {
                    key: req.key.clone(),
                    reason: format!("operator {} requires at least one value", req.operator),
                });
            }
            for value in values {
                validate_value(&req.key, value)?;
            }
            Ok(())
        }
        "Exists" | "DoesNotExist" => {
            if values.is_empty() {
                Ok(())
            } else {
                Err(SelectorError::InvalidRequirement {
                    key: req.key.clone(),
                    reason: format!("operator {} does not take values", req.operator),
                })
            }
        }
        other => Err(SelectorError::InvalidRequirement {
            key: req.key.clone(),
            reason: format!("unknown operator '{other}'"),
        }),
    }
}

/// A label key is an optional DNS subdomain prefix followed by `/` and a name.
fn validate_key(key: &str) -> Result<(), SelectorError> {
    let invalid = |reason| SelectorError::InvalidKey {
        key: key.to_owned(),
        reason,
    };
    let name = match key.split_once('/') {
        Some((prefix, name)) => {
            if prefix.is_empty() || prefix.len() > MAX_PREFIX_LEN {
                return Err(invalid("prefix must be 1-253 characters"));
            }
            if !prefix.split('.').all(is_dns_label) {
                return Err(invalid("prefix must be a DNS subdomain"));
            }
            name
        }
        None => key,
    };
    if name.is_empty() || name.len() > MAX_NAME_LEN {
        return Err(invalid("name must be 1-63 characters"));
    }
    if !is_label_name(name) {
        return Err(invalid(
            "name must be alphanumeric, '-', '_' or '.', starting and ending with an alphanumeric",
        ));
    }
    Ok(())
}

fn validate_value(key: &str, value: &str) -> Result<(), SelectorError> {
    if value.is_empty() {
        return Ok(());
    }
    let invalid = |reason| SelectorError::InvalidValue {
        key: key.to_owned(),
        value: value.to_owned(),
        reason,
    };
    if value.len() > MAX_NAME_LEN {
        return Err(invalid("must be at most 63 characters"));
    }
    if !is_label_name(value) {
        return Err(invalid(
            "must be alphanumeric, '-', '_' or '.', starting and ending with an alphanumeric",
        ));
    }
    Ok(())
}

fn is_label_name(s: &str) -> bool {
    let bytes = s.as_bytes();
    match (bytes.first(), bytes.last()) {
        (Some(first), Some(last)) => {
            first.is_ascii_alphanumeric()
                && last.is_ascii_alphanumeric()
                && bytes
                    .iter()
                    .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'))
        }
        _ => false,
    }
}

fn is_dns_label(s: &str) -> bool {
    let bytes = s.as_bytes();
    match (bytes.first(), bytes.last()) {
        (Some(first), Some(last)) => {
            s.len() <= MAX_NAME_LEN
                && first.is_ascii_alphanumeric()
                && last.is_ascii_alphanumeric()
                && bytes
                    .iter()
                    .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || *b == b'-')
        }
        _ => false,
    }
}
