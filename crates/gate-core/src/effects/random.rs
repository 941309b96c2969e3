//! Randomness effect
//!
//! Secrets, nonces and identifiers are drawn from this trait rather than
//! ambient RNGs, so tests can run with seeded entropy.

use async_trait::async_trait;
use uuid::Uuid;

/// Entropy source
#[async_trait]
pub trait RandomEffects: Send + Sync {
    /// Fill a fresh buffer of `len` random bytes
    async fn random_bytes(&self, len: usize) -> Vec<u8>;

    /// 32 random bytes
    async fn random_bytes_32(&self) -> [u8; 32] {
        let bytes = self.random_bytes(32).await;
        let mut out = [0u8; 32];
        for (dst, src) in out.iter_mut().zip(bytes) {
            *dst = src;
        }
        out
    }

    /// 16 random bytes
    async fn random_bytes_16(&self) -> [u8; 16] {
        let bytes = self.random_bytes(16).await;
        let mut out = [0u8; 16];
        for (dst, src) in out.iter_mut().zip(bytes) {
            *dst = src;
        }
        out
    }

    /// Random (v4) UUID
    async fn random_uuid(&self) -> Uuid {
        uuid::Builder::from_random_bytes(self.random_bytes_16().await).into_uuid()
    }
}
