//! Protocol adapters
//!
//! Each adapter turns one provider's data into canonical root nodes and
//! their allocation leaves. Adapters fetch through [`JsonFetcher`] so every
//! build can run against recorded fixtures.

pub mod ethena;
pub mod euler;
mod fetch;
#[cfg(test)]
mod integration_tests;
mod registry;
pub mod resolv;
mod traits;
pub mod units;

pub use ethena::EthenaAdapter;
pub use euler::EulerAdapter;
pub use fetch::{fixture_key, get_typed, graphql, FetchError, FixtureFetcher, HttpFetcher, JsonFetcher};
pub use registry::AdapterRegistry;
pub use resolv::ResolvAdapter;
pub use traits::{
    settle_all, AdapterError, AssetContribution, AssetKey, AssetSource, Contributions, Leaves,
    ProtocolAdapter,
};
