#![warn(missing_docs)]
//! # launch-gate-destination
//!
//! ## Purpose
//! Builds deterministic destination identifiers from device payloads.
//!
//! ## Responsibilities
//! - URL-encode payload pairs into a query string in fixed order.
//! - Base64-encode the query and append it to the decoded base identifier.
//! - Fall back to a literal sentinel query when structured encoding fails.
//!
//! ## Data flow
//! Decoded base + [`DevicePayload`] -> [`DestinationBuilder::build`] ->
//! destination string -> [`launch_gate_core::Destination`] validation in the
//! orchestrator.
//!
//! ## Ownership and lifetimes
//! The builder owns its decoded base so it can be cloned into spawned tasks.
//!
//! ## Error model
//! [`encode_query`] reports [`DestinationError`]; the builder absorbs it into
//! the fallback form and never fails.
//!
//! ## Security and privacy notes
//! Built strings embed device tokens. This crate logs only which encoding path
//! was taken, never the payload.
//!
//! ## Example
//! ```rust
//! use launch_gate_core::DevicePayload;
//! use launch_gate_destination::DestinationBuilder;
//!
//! let builder = DestinationBuilder::new("https://app.example.test");
//! let destination = builder.build(&DevicePayload::sentinel());
//! assert!(destination.starts_with("https://app.example.test/?data="));
//! ```

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use launch_gate_core::{DevicePayload, decode_percent_ascii};
use thiserror::Error;

/// Separator between base and payload on the structured path.
pub const DATA_SEPARATOR: &str = "/?data=";

/// Separator between base and payload on the fallback path.
pub const FALLBACK_DATA_SEPARATOR: &str = "?data=";

/// Literal query used when structured encoding fails.
pub const FALLBACK_QUERY: &str = "apns_token=token&att_token=token";

/// Deterministic destination builder bound to one decoded base identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestinationBuilder {
    base: String,
}

impl DestinationBuilder {
    /// Creates a builder from an already decoded base identifier.
    pub fn new(decoded_base: impl Into<String>) -> Self {
        Self {
            base: decoded_base.into(),
        }
    }

    /// Creates a builder from a percent-encoded base identifier.
    ///
    /// A malformed encoding yields an empty base.
    pub fn from_encoded(encoded_base: &str) -> Self {
        Self::new(decode_percent_ascii(encoded_base))
    }

    /// Decoded base identifier.
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Builds the destination string for a device payload.
    pub fn build(&self, payload: &DevicePayload) -> String {
        self.build_pairs(&payload.pairs())
    }

    /// Builds the destination string for arbitrary ordered pairs.
    ///
    /// # Semantics
    /// - Empty `pairs` are replaced by the sentinel payload.
    /// - Structured path: `base + "/?data=" + base64(query)`.
    /// - Fallback path: `base + "?data=" + base64(FALLBACK_QUERY)`.
    pub fn build_pairs(&self, pairs: &[(&str, &str)]) -> String {
        let sentinel = DevicePayload::sentinel();
        let sentinel_pairs = sentinel.pairs();
        let pairs = if pairs.is_empty() {
            &sentinel_pairs[..]
        } else {
            pairs
        };

        match encode_query(pairs) {
            Ok(query) => {
                tracing::debug!(stage = "destination", action = "structured", "destination built");
                format!("{}{DATA_SEPARATOR}{}", self.base, BASE64_STANDARD.encode(query))
            }
            Err(error) => {
                tracing::warn!(
                    stage = "destination",
                    action = "fallback",
                    %error,
                    "query encoding failed; using sentinel query"
                );
                format!(
                    "{}{FALLBACK_DATA_SEPARATOR}{}",
                    self.base,
                    BASE64_STANDARD.encode(FALLBACK_QUERY)
                )
            }
        }
    }
}

/// Encodes ordered pairs with `application/x-www-form-urlencoded` rules.
///
/// # Errors
/// Returns [`DestinationError::EmptyQuery`] when no pairs are given and
/// [`DestinationError::BlankKey`] when any key is blank.
pub fn encode_query(pairs: &[(&str, &str)]) -> Result<String, DestinationError> {
    if pairs.is_empty() {
        return Err(DestinationError::EmptyQuery);
    }

    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for (index, (key, value)) in pairs.iter().enumerate() {
        if key.trim().is_empty() {
            return Err(DestinationError::BlankKey { index });
        }
        serializer.append_pair(key, value);
    }

    Ok(serializer.finish())
}

/// Query encoding failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DestinationError {
    /// No pairs were supplied.
    #[error("query has no pairs")]
    EmptyQuery,
    /// A pair has a blank key.
    #[error("query pair {index} has a blank key")]
    BlankKey {
        /// Position of the offending pair.
        index: usize,
    },
}
