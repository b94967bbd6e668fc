//! Validated OAuth scope lists.

use std::fmt;

use serde_json::Value;

use crate::error::{GrantError, Result};

/// Ordered, non-empty list of non-empty scope strings.
///
/// Duplicates are kept; the server decides what they mean.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeSet(Vec<String>);

impl ScopeSet {
    /// # Example
    /// ```
    /// use grantline::scope::ScopeSet;
    ///
    /// let scopes = ScopeSet::new(["identity.readonly", "listening.write"])?;
    /// assert_eq!(scopes.joined(), "identity.readonly listening.write");
    /// assert!(ScopeSet::new(Vec::<String>::new()).is_err());
    /// # Ok::<(), grantline::error::GrantError>(())
    /// ```
    pub fn new<I, S>(scopes: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let scopes: Vec<String> = scopes
            .into_iter()
            .map(|scope| scope.as_ref().to_string())
            .collect();
        if scopes.is_empty() {
            return Err(GrantError::InvalidArgument(
                "at least one scope is required".to_string(),
            ));
        }
        if let Some(position) = scopes.iter().position(|scope| scope.trim().is_empty()) {
            return Err(GrantError::InvalidArgument(format!(
                "scope at index {position} is empty"
            )));
        }
        Ok(Self(scopes))
    }

    /// Build from untyped request input, rejecting any non-string element.
    pub fn from_json(value: &Value) -> Result<Self> {
        let items = value.as_array().ok_or_else(|| {
            GrantError::InvalidArgument("scopes must be an array of strings".to_string())
        })?;
        let scopes = items
            .iter()
            .enumerate()
            .map(|(index, item)| {
                item.as_str().ok_or_else(|| {
                    GrantError::InvalidArgument(format!(
                        "scope at index {index} must be a string, got {item}"
                    ))
                })
            })
            .collect::<Result<Vec<&str>>>()?;
        Self::new(scopes)
    }

    /// Space-joined form used in the `scope` parameter.
    pub fn joined(&self) -> String {
        self.0.join(" ")
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ScopeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.joined())
    }
}
