pub mod differ;
pub mod error;
pub mod reconciler;
pub mod upstream_sync;

#[cfg(test)]
pub(crate) mod testing;
