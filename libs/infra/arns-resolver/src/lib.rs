//! C7: ArNS name resolution — registry hydration plus the resolver
//! fan-out pipeline.

mod hydrator;
mod pipeline;

pub use hydrator::{RegistryFetcher, RegistryHydrator, RegistryPage};
pub use pipeline::{ArnsResolverPipeline, NameResolver};
