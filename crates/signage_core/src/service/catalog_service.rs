//! Catalog use-case service.
//!
//! # Responsibility
//! - Give callers one entry point per item/site/bulletin use-case.
//! - Wrap every mutation in its own `UnitOfWork`, commit it, then re-read the
//!   entity with its links attached.
//! - Emit metadata-only `event=` logs with status and duration.
//!
//! # Invariants
//! - A failed operation commits nothing; the unit is dropped and rolled back.
//! - Read-back happens after commit, so callers only see committed state.
//! - No retries happen here.

use crate::config::EngineConfig;
use crate::db::UnitOfWork;
use crate::model::entity::{
    Bulletin, BulletinDraft, BulletinId, BulletinPatch, Entity, EntityKind, EntityPatch, Item,
    ItemDraft, ItemId, ItemPatch, Site, SiteDraft, SiteId, SitePatch,
};
use crate::model::link::{ItemSiteLink, LinkDirection, LinkRow};
use crate::repo::entity_repo::{EntityStore, SqliteEntityStore};
use crate::repo::link_repo::SqliteLinkRepository;
use crate::service::association_engine::{
    AssociationEngine, AssociationError, AssociationResult, LinkChange,
};
use crate::service::projection::{BulletinDetail, ItemDetail, LinkProjection, SiteDetail};
use log::{error, info};
use rusqlite::Connection;
use std::time::Instant;

/// Caller-facing facade over the association engine and projections.
pub struct CatalogService<'conn> {
    conn: &'conn mut Connection,
    engine: AssociationEngine,
}

impl<'conn> CatalogService<'conn> {
    /// Creates a service with default engine config.
    pub fn new(conn: &'conn mut Connection) -> Self {
        Self::with_config(conn, EngineConfig::default())
    }

    pub fn with_config(conn: &'conn mut Connection, config: EngineConfig) -> Self {
        Self {
            conn,
            engine: AssociationEngine::new(config),
        }
    }

    /// Creates an item linked to `site_ids`; all-or-nothing.
    pub fn create_item(
        &mut self,
        draft: ItemDraft,
        site_ids: &[SiteId],
    ) -> AssociationResult<ItemDetail> {
        let item = self.run_unit("item_create", |engine, uow| {
            engine.create_item_with_sites(uow, &draft, site_ids)
        })?;
        self.item_detail(item.id)?
            .ok_or(AssociationError::InconsistentState(
                "created item not found in read-back",
            ))
    }

    /// Creates a site linked to `item_ids` and `bulletin_ids`; all-or-nothing.
    pub fn create_site(
        &mut self,
        draft: SiteDraft,
        item_ids: &[ItemId],
        bulletin_ids: &[BulletinId],
    ) -> AssociationResult<SiteDetail> {
        let site = self.run_unit("site_create", |engine, uow| {
            engine.create_site_with_links(uow, &draft, item_ids, bulletin_ids)
        })?;
        self.site_detail(site.id)?
            .ok_or(AssociationError::InconsistentState(
                "created site not found in read-back",
            ))
    }

    /// Creates a bulletin linked to `site_ids`; all-or-nothing.
    pub fn create_bulletin(
        &mut self,
        draft: BulletinDraft,
        site_ids: &[SiteId],
    ) -> AssociationResult<BulletinDetail> {
        let bulletin = self.run_unit("bulletin_create", |engine, uow| {
            engine.create_bulletin_with_sites(uow, &draft, site_ids)
        })?;
        self.bulletin_detail(bulletin.id)?
            .ok_or(AssociationError::InconsistentState(
                "created bulletin not found in read-back",
            ))
    }

    /// Patches an item; `site_ids = Some(..)` also fully replaces its sites.
    pub fn update_item(
        &mut self,
        id: ItemId,
        patch: ItemPatch,
        site_ids: Option<&[SiteId]>,
    ) -> AssociationResult<ItemDetail> {
        let patch = EntityPatch::Item(patch);
        self.run_unit("item_update", |engine, uow| {
            engine.update_with_links(
                uow,
                id,
                &patch,
                site_ids.map(|ids| (LinkDirection::ItemToSites, ids)),
            )
        })?;
        self.item_detail(id)?
            .ok_or(AssociationError::InconsistentState(
                "updated item not found in read-back",
            ))
    }

    /// Patches a site; each `Some(..)` id list fully replaces that relation.
    pub fn update_site(
        &mut self,
        id: SiteId,
        patch: SitePatch,
        item_ids: Option<&[ItemId]>,
        bulletin_ids: Option<&[BulletinId]>,
    ) -> AssociationResult<SiteDetail> {
        let patch = EntityPatch::Site(patch);
        self.run_unit("site_update", |engine, uow| {
            engine.update_with_links(
                uow,
                id,
                &patch,
                item_ids.map(|ids| (LinkDirection::SiteToItems, ids)),
            )?;
            if let Some(ids) = bulletin_ids {
                engine.replace_links(uow, LinkDirection::SiteToBulletins, id, ids)?;
            }
            Ok(())
        })?;
        self.site_detail(id)?
            .ok_or(AssociationError::InconsistentState(
                "updated site not found in read-back",
            ))
    }

    /// Patches a bulletin; `site_ids = Some(..)` also fully replaces its sites.
    pub fn update_bulletin(
        &mut self,
        id: BulletinId,
        patch: BulletinPatch,
        site_ids: Option<&[SiteId]>,
    ) -> AssociationResult<BulletinDetail> {
        let patch = EntityPatch::Bulletin(patch);
        self.run_unit("bulletin_update", |engine, uow| {
            engine.update_with_links(
                uow,
                id,
                &patch,
                site_ids.map(|ids| (LinkDirection::BulletinToSites, ids)),
            )
        })?;
        self.bulletin_detail(id)?
            .ok_or(AssociationError::InconsistentState(
                "updated bulletin not found in read-back",
            ))
    }

    /// Fully replaces the anchor's links and returns the resulting rows.
    pub fn replace_links(
        &mut self,
        direction: LinkDirection,
        anchor_id: i64,
        counterpart_ids: &[i64],
    ) -> AssociationResult<Vec<LinkRow>> {
        self.run_unit("links_replace", |engine, uow| {
            engine.replace_links(uow, direction, anchor_id, counterpart_ids)
        })?;
        self.links_of(direction, anchor_id)
    }

    /// Adds links for counterparts not linked yet.
    pub fn add_links(
        &mut self,
        direction: LinkDirection,
        anchor_id: i64,
        counterpart_ids: &[i64],
    ) -> AssociationResult<LinkChange> {
        self.run_unit("links_add", |engine, uow| {
            engine.add_links(uow, direction, anchor_id, counterpart_ids)
        })
    }

    /// Removes the listed links; absent pairs are not an error.
    pub fn remove_links(
        &mut self,
        direction: LinkDirection,
        anchor_id: i64,
        counterpart_ids: &[i64],
    ) -> AssociationResult<LinkChange> {
        self.run_unit("links_remove", |engine, uow| {
            engine.remove_links(uow, direction, anchor_id, counterpart_ids)
        })
    }

    pub fn set_play_duration(
        &mut self,
        item_id: ItemId,
        site_id: SiteId,
        seconds: i64,
    ) -> AssociationResult<ItemSiteLink> {
        self.run_unit("play_duration_set", |engine, uow| {
            engine.set_play_duration(uow, item_id, site_id, seconds)
        })
    }

    /// Hard-deletes an entity with all of its links. Returns links removed.
    pub fn delete(&mut self, kind: EntityKind, id: i64) -> AssociationResult<usize> {
        self.run_unit("entity_delete", |engine, uow| {
            engine.cascade_delete(uow, kind, id)
        })
    }

    /// Hides an entity from validation and projections; links are kept.
    pub fn archive(&mut self, kind: EntityKind, id: i64) -> AssociationResult<()> {
        self.run_unit("entity_archive", |_, uow| {
            SqliteEntityStore::try_new(uow.conn())?.set_archived(kind, id, true)?;
            Ok(())
        })
    }

    pub fn restore(&mut self, kind: EntityKind, id: i64) -> AssociationResult<()> {
        self.run_unit("entity_restore", |_, uow| {
            SqliteEntityStore::try_new(uow.conn())?.set_archived(kind, id, false)?;
            Ok(())
        })
    }

    pub fn item_detail(&self, id: ItemId) -> AssociationResult<Option<ItemDetail>> {
        Ok(self.projection()?.item_detail(id)?)
    }

    pub fn site_detail(&self, id: SiteId) -> AssociationResult<Option<SiteDetail>> {
        Ok(self.projection()?.site_detail(id)?)
    }

    pub fn bulletin_detail(&self, id: BulletinId) -> AssociationResult<Option<BulletinDetail>> {
        Ok(self.projection()?.bulletin_detail(id)?)
    }

    pub fn counterparts_of(
        &self,
        direction: LinkDirection,
        anchor_id: i64,
    ) -> AssociationResult<Vec<Entity>> {
        Ok(self.projection()?.counterparts_of(direction, anchor_id)?)
    }

    pub fn links_of(
        &self,
        direction: LinkDirection,
        anchor_id: i64,
    ) -> AssociationResult<Vec<LinkRow>> {
        Ok(self.projection()?.links_of(direction, anchor_id)?)
    }

    /// Lists live items ordered by id.
    pub fn list_items(&self) -> AssociationResult<Vec<Item>> {
        Ok(SqliteEntityStore::try_new(&*self.conn)?.list_items(false)?)
    }

    /// Lists live sites ordered by id.
    pub fn list_sites(&self) -> AssociationResult<Vec<Site>> {
        Ok(SqliteEntityStore::try_new(&*self.conn)?.list_sites(false)?)
    }

    /// Lists live bulletins ordered by id.
    pub fn list_bulletins(&self) -> AssociationResult<Vec<Bulletin>> {
        Ok(SqliteEntityStore::try_new(&*self.conn)?.list_bulletins(false)?)
    }

    fn projection(
        &self,
    ) -> AssociationResult<LinkProjection<SqliteEntityStore<'_>, SqliteLinkRepository<'_>>> {
        Ok(LinkProjection::new(
            SqliteEntityStore::try_new(&*self.conn)?,
            SqliteLinkRepository::try_new(&*self.conn)?,
        ))
    }

    fn run_unit<T>(
        &mut self,
        event: &'static str,
        op: impl FnOnce(&AssociationEngine, &UnitOfWork<'_>) -> AssociationResult<T>,
    ) -> AssociationResult<T> {
        let started_at = Instant::now();
        info!("event={event} module=catalog status=start");

        let result = UnitOfWork::begin(&mut *self.conn)
            .map_err(AssociationError::from)
            .and_then(|uow| {
                let value = op(&self.engine, &uow)?;
                uow.commit()?;
                Ok(value)
            });

        match &result {
            Ok(_) => info!(
                "event={event} module=catalog status=ok duration_ms={}",
                started_at.elapsed().as_millis()
            ),
            Err(err) => error!(
                "event={event} module=catalog status=error duration_ms={} error_code={} error={}",
                started_at.elapsed().as_millis(),
                err.code(),
                err
            ),
        }
        result
    }
}
