//! Upstream API clients.
//!
//! | Adapter | Upstream | Flow |
//! |---------|----------|------|
//! | [`AppLovinClient`] | ad-report REST endpoint | 7-day ad metrics, full replace |
//! | [`ShipHeroClient`] | warehouse-management GraphQL | incremental orders, merge |

pub mod applovin;
pub mod queries;
pub mod shiphero;

pub use applovin::AppLovinClient;
pub use shiphero::{AccessToken, OrdersFetch, ShipHeroClient, ShipHeroCredentials};
