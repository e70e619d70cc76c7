//! Root of the `keeper-core` library.
//!
//! Ties the Scrapyd client to the local state store: configuration, project
//! discovery, job reconciliation and the background poller.

pub mod config;
mod poller;
mod projects;
mod reconcile;
pub mod timestamp;

pub use config::ConfigError;
pub use config::ConfigOverrides;
pub use config::KeeperConfig;
pub use config::find_keeper_home;
pub use poller::PassReport;
pub use poller::Poller;
pub use projects::delete_project;
pub use projects::sync_projects;
pub use reconcile::Freshness;
pub use reconcile::JobListing;
pub use reconcile::JobView;
pub use reconcile::ListedJobs;
pub use reconcile::MaterializeOutcome;
pub use reconcile::Reconciler;
pub use reconcile::StatusBuckets;
pub use reconcile::UNKNOWN_SPIDER;
