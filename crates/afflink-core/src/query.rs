//! The user's search request: free text plus optional price bounds.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("product_name is required (aliases: query, q)")]
    EmptyQuery,

    #[error("min_price ({min}) must not be greater than max_price ({max})")]
    InvertedPriceBounds { min: u64, max: u64 },
}

/// A validated search request.
///
/// Prices are integers in minor currency units. A bound of `0` means
/// "unbounded", matching how the listing form treats an empty field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    pub text: String,
    pub min_price: u64,
    pub max_price: u64,
}

impl SearchQuery {
    /// Builds a query, trimming the text and checking the bounds.
    ///
    /// # Errors
    ///
    /// - [`QueryError::EmptyQuery`] if the text is blank.
    /// - [`QueryError::InvertedPriceBounds`] if both bounds are set and `min > max`.
    pub fn new(text: &str, min_price: u64, max_price: u64) -> Result<Self, QueryError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(QueryError::EmptyQuery);
        }
        if min_price > 0 && max_price > 0 && min_price > max_price {
            return Err(QueryError::InvertedPriceBounds {
                min: min_price,
                max: max_price,
            });
        }
        Ok(Self {
            text: text.to_string(),
            min_price,
            max_price,
        })
    }

    /// Returns `true` if `price` satisfies every bound that is set.
    #[must_use]
    pub fn admits_price(&self, price: u64) -> bool {
        if self.min_price > 0 && price < self.min_price {
            return false;
        }
        if self.max_price > 0 && price > self.max_price {
            return false;
        }
        true
    }

    /// Form value for the minimum-price field: empty when unbounded.
    #[must_use]
    pub fn min_field(&self) -> String {
        bound_field(self.min_price)
    }

    /// Form value for the maximum-price field: empty when unbounded.
    #[must_use]
    pub fn max_field(&self) -> String {
        bound_field(self.max_price)
    }
}

fn bound_field(bound: u64) -> String {
    if bound == 0 {
        String::new()
    } else {
        bound.to_string()
    }
}
