//! Oracle adapter.
//!
//! The engine is agnostic to the proof scheme. Whatever verifies the signed
//! price bundle sits behind [`Oracle`] and hands back the asserted
//! `(pair, price)` set; a malformed proof fails verification and the engine
//! surfaces the error. Bundle order feeds iteration order but carries no
//! semantic weight.

use crate::types::AssetIndex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One price assertion from a verified bundle. `price` is in six-decimal
/// minor units and unvalidated here: the engine rejects zeroes. `decimals`
/// is carried for future use; the engine assumes a uniform scale per asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceAssertion {
    pub pair_id: AssetIndex,
    pub price: u128,
    pub decimals: u8,
}

impl PriceAssertion {
    pub fn new(pair_id: AssetIndex, price: u128) -> Self {
        Self {
            pair_id,
            price,
            decimals: 6,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OracleError {
    #[error("price proof failed verification")]
    InvalidProof,
}

/// Proof verifier consumed by the engine; one call per executor action.
pub trait Oracle {
    fn verify(&self, proof: &[u8]) -> Result<Vec<PriceAssertion>, OracleError>;
}

/// Test and simulation oracle: bundles are registered up front against their
/// proof blobs, anything unregistered fails verification.
#[derive(Debug, Clone, Default)]
pub struct StaticOracle {
    bundles: HashMap<Vec<u8>, Vec<PriceAssertion>>,
}

impl StaticOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, proof: impl Into<Vec<u8>>, bundle: Vec<PriceAssertion>) {
        self.bundles.insert(proof.into(), bundle);
    }
}

impl Oracle for StaticOracle {
    fn verify(&self, proof: &[u8]) -> Result<Vec<PriceAssertion>, OracleError> {
        self.bundles
            .get(proof)
            .cloned()
            .ok_or(OracleError::InvalidProof)
    }
}
