//! Randomness effect handler - production only

use async_trait::async_trait;
use gate_core::effects::RandomEffects;
use rand::rngs::OsRng;
use rand::RngCore;

/// Operating-system entropy
#[derive(Debug, Clone, Default)]
pub struct RealRandomHandler;

impl RealRandomHandler {
    /// Create a new handler
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl RandomEffects for RealRandomHandler {
    async fn random_bytes(&self, len: usize) -> Vec<u8> {
        let mut bytes = vec![0u8; len];
        OsRng.fill_bytes(&mut bytes);
        bytes
    }
}
