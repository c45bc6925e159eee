//! Health probes consulted by the gate.

use async_trait::async_trait;
use std::future::Future;

/// A lightweight reachability check against the backend.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HealthProbe: Send + Sync {
    /// Returns true if the backend looks reachable.
    async fn check(&self) -> bool;
}

/// A probe that always reports healthy.
///
/// Lets real queries surface connectivity problems themselves.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysHealthy;

#[async_trait]
impl HealthProbe for AlwaysHealthy {
    async fn check(&self) -> bool {
        true
    }
}

/// A probe backed by an async closure.
#[derive(Debug, Clone)]
pub struct FnProbe<F> {
    f: F,
}

impl<F, Fut> FnProbe<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = bool> + Send + 'static,
{
    /// Creates a probe from a closure.
    #[must_use]
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F, Fut> HealthProbe for FnProbe<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = bool> + Send + 'static,
{
    async fn check(&self) -> bool {
        (self.f)().await
    }
}
