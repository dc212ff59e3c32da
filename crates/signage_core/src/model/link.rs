//! Link (join) records and link directions.
//!
//! # Responsibility
//! - Describe the two many-to-many relations and their storage layout.
//! - Give both sides of each relation one symmetric addressing scheme.
//!
//! # Invariants
//! - `(item_id, site_id)` and `(bulletin_id, site_id)` are unique pairs.
//! - A link either exists or it does not; there is no tombstone state.
//! - Only item/site links carry a play duration.

use super::entity::{BulletinId, EntityKind, ItemId, SiteId};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// One of the two stored many-to-many relations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    ItemSite,
    BulletinSite,
}

impl Relation {
    pub fn table(self) -> &'static str {
        match self {
            Self::ItemSite => "item_sites",
            Self::BulletinSite => "bulletin_sites",
        }
    }

    /// Column holding the non-site endpoint.
    pub fn owner_column(self) -> &'static str {
        match self {
            Self::ItemSite => "item_id",
            Self::BulletinSite => "bulletin_id",
        }
    }
}

/// A relation viewed from one of its sides.
///
/// The anchor is the entity an operation is addressed to; counterparts are
/// the entities on the other side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkDirection {
    ItemToSites,
    SiteToItems,
    BulletinToSites,
    SiteToBulletins,
}

impl LinkDirection {
    pub fn relation(self) -> Relation {
        match self {
            Self::ItemToSites | Self::SiteToItems => Relation::ItemSite,
            Self::BulletinToSites | Self::SiteToBulletins => Relation::BulletinSite,
        }
    }

    pub fn anchor_kind(self) -> EntityKind {
        match self {
            Self::ItemToSites => EntityKind::Item,
            Self::BulletinToSites => EntityKind::Bulletin,
            Self::SiteToItems | Self::SiteToBulletins => EntityKind::Site,
        }
    }

    pub fn counterpart_kind(self) -> EntityKind {
        match self {
            Self::ItemToSites | Self::BulletinToSites => EntityKind::Site,
            Self::SiteToItems => EntityKind::Item,
            Self::SiteToBulletins => EntityKind::Bulletin,
        }
    }

    /// Whether the anchor sits in the owner (non-site) column.
    fn anchor_is_owner(self) -> bool {
        matches!(self, Self::ItemToSites | Self::BulletinToSites)
    }

    pub fn table(self) -> &'static str {
        self.relation().table()
    }

    pub fn anchor_column(self) -> &'static str {
        if self.anchor_is_owner() {
            self.relation().owner_column()
        } else {
            "site_id"
        }
    }

    pub fn counterpart_column(self) -> &'static str {
        if self.anchor_is_owner() {
            "site_id"
        } else {
            self.relation().owner_column()
        }
    }

    pub fn carries_play_duration(self) -> bool {
        self.relation() == Relation::ItemSite
    }

    /// Orders `(anchor, counterpart)` into `(owner_id, site_id)`.
    pub fn to_pair(self, anchor_id: i64, counterpart_id: i64) -> (i64, i64) {
        if self.anchor_is_owner() {
            (anchor_id, counterpart_id)
        } else {
            (counterpart_id, anchor_id)
        }
    }
}

impl Display for LinkDirection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::ItemToSites => "item_to_sites",
            Self::SiteToItems => "site_to_items",
            Self::BulletinToSites => "bulletin_to_sites",
            Self::SiteToBulletins => "site_to_bulletins",
        };
        f.write_str(label)
    }
}

/// Stored item/site link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemSiteLink {
    pub item_id: ItemId,
    pub site_id: SiteId,
    /// Seconds this item plays at this site. Copied from the item's nominal
    /// duration when the link is created and edited independently after.
    pub play_duration_secs: i64,
    pub created_at: i64,
}

/// Stored bulletin/site link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulletinSiteLink {
    pub bulletin_id: BulletinId,
    pub site_id: SiteId,
    pub created_at: i64,
}

/// Raw link row seen from an anchor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkRow {
    pub counterpart_id: i64,
    /// `Some` only for item/site links.
    pub play_duration_secs: Option<i64>,
    pub created_at: i64,
}
