pub mod config;
pub mod error;
pub mod extractor;
pub mod ledger;
pub mod quota;
pub mod rewrite;
pub mod routes;
pub mod tiers;
pub mod transform;
pub mod webhooks;
