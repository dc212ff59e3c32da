//! Read-side link projections.
//!
//! # Responsibility
//! - Resolve the counterparts linked to one entity.
//! - Expose raw link rows when the per-pair attribute itself is needed.
//! - Assemble entity-with-links read models for callers.
//!
//! # Invariants
//! - Order is link creation order (`link_seq ASC`) everywhere.
//! - `counterparts_of` skips archived counterparts; `links_of` does not.

use crate::model::entity::{Bulletin, BulletinId, Entity, Item, ItemId, Site, SiteId};
use crate::model::link::{LinkDirection, LinkRow};
use crate::repo::entity_repo::EntityStore;
use crate::repo::link_repo::LinkRepository;
use crate::repo::RepoResult;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Item with its site links.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemDetail {
    pub item: Item,
    /// Counterpart ids are site ids; every row carries a play duration.
    pub sites: Vec<LinkRow>,
}

/// Site with its item and bulletin links.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SiteDetail {
    pub site: Site,
    pub items: Vec<LinkRow>,
    pub bulletins: Vec<LinkRow>,
}

/// Bulletin with its site links.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BulletinDetail {
    pub bulletin: Bulletin,
    pub sites: Vec<LinkRow>,
}

/// Projection facade over entity and link repositories.
pub struct LinkProjection<S: EntityStore, L: LinkRepository> {
    store: S,
    links: L,
}

impl<S: EntityStore, L: LinkRepository> LinkProjection<S, L> {
    pub fn new(store: S, links: L) -> Self {
        Self { store, links }
    }

    /// Live counterpart entities linked to `anchor_id`.
    pub fn counterparts_of(
        &self,
        direction: LinkDirection,
        anchor_id: i64,
    ) -> RepoResult<Vec<Entity>> {
        let rows = self.links.list_links(direction, anchor_id)?;
        let ids: BTreeSet<i64> = rows.iter().map(|row| row.counterpart_id).collect();
        let mut by_id: BTreeMap<i64, Entity> = self
            .store
            .get_many(direction.counterpart_kind(), &ids)?
            .into_iter()
            .map(|entity| (entity.id(), entity))
            .collect();

        Ok(rows
            .iter()
            .filter_map(|row| by_id.remove(&row.counterpart_id))
            .collect())
    }

    /// Raw link rows of `anchor_id`.
    pub fn links_of(&self, direction: LinkDirection, anchor_id: i64) -> RepoResult<Vec<LinkRow>> {
        self.links.list_links(direction, anchor_id)
    }

    pub fn item_detail(&self, id: ItemId) -> RepoResult<Option<ItemDetail>> {
        let Some(item) = self.store.get_item(id, true)? else {
            return Ok(None);
        };
        let sites = self.links_of(LinkDirection::ItemToSites, id)?;
        Ok(Some(ItemDetail { item, sites }))
    }

    pub fn site_detail(&self, id: SiteId) -> RepoResult<Option<SiteDetail>> {
        let Some(site) = self.store.get_site(id, true)? else {
            return Ok(None);
        };
        let items = self.links_of(LinkDirection::SiteToItems, id)?;
        let bulletins = self.links_of(LinkDirection::SiteToBulletins, id)?;
        Ok(Some(SiteDetail {
            site,
            items,
            bulletins,
        }))
    }

    pub fn bulletin_detail(&self, id: BulletinId) -> RepoResult<Option<BulletinDetail>> {
        let Some(bulletin) = self.store.get_bulletin(id, true)? else {
            return Ok(None);
        };
        let sites = self.links_of(LinkDirection::BulletinToSites, id)?;
        Ok(Some(BulletinDetail { bulletin, sites }))
    }
}
