//! Core domain logic for scheduled signage content.
//! This crate is the single source of truth for item/site/bulletin link
//! invariants.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::{ConfigError, EngineConfig};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::entity::{
    Bulletin, BulletinDraft, BulletinId, BulletinPatch, Entity, EntityDraft, EntityKind,
    EntityPatch, Item, ItemDraft, ItemId, ItemPatch, ItemStatus, ModelValidationError, Site,
    SiteDraft, SiteId, SitePatch,
};
pub use model::link::{BulletinSiteLink, ItemSiteLink, LinkDirection, LinkRow, Relation};
pub use repo::entity_repo::{EntityStore, SqliteEntityStore};
pub use repo::link_repo::{InsertOutcome, LinkRepository, SqliteLinkRepository};
pub use repo::{RepoError, RepoResult};
pub use service::association_engine::{
    AssociationEngine, AssociationError, AssociationResult, LinkChange,
};
pub use service::catalog_service::CatalogService;
pub use service::link_validator::LinkValidator;
pub use service::projection::{BulletinDetail, ItemDetail, LinkProjection, SiteDetail};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
