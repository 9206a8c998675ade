use crate::types::LatLng;
use anyhow::{anyhow, Result};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::sync::Arc;

/// One-shot position lookup. Failures are expected (no fix, permission
/// denied) and callers degrade to a request without location.
pub trait Locator: Send + Sync {
    fn locate(&self) -> BoxFuture<'_, Result<LatLng>>;
}

/// Position supplied up front, e.g. from `TAPPI_LATITUDE`/`TAPPI_LONGITUDE`.
#[derive(Debug, Clone, Copy)]
pub struct FixedLocator(pub LatLng);

impl Locator for FixedLocator {
    fn locate(&self) -> BoxFuture<'_, Result<LatLng>> {
        let position = self.0;
        async move { Ok(position) }.boxed()
    }
}

/// No position source available.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unlocated;

impl Locator for Unlocated {
    fn locate(&self) -> BoxFuture<'_, Result<LatLng>> {
        async { Err(anyhow!("no position source configured")) }.boxed()
    }
}

pub fn locator_for(location: Option<LatLng>) -> Arc<dyn Locator> {
    match location {
        Some(position) => Arc::new(FixedLocator(position)),
        None => Arc::new(Unlocated),
    }
}
