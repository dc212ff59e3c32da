//! Item, site and bulletin domain records.
//!
//! # Responsibility
//! - Define the three linkable entity shapes plus their create/patch inputs.
//! - Validate field-level constraints before anything reaches storage.
//!
//! # Invariants
//! - Identifiers are storage-assigned row ids and never reused.
//! - `Item::duration_secs` (nominal duration) is always positive.
//! - Site names and item/bulletin titles are never blank.
//! - `is_archived` hides an entity from link validation and projections but
//!   keeps its links; hard delete is the only path that removes links.

use serde::{Deserialize, Deserializer, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type ItemId = i64;
pub type SiteId = i64;
pub type BulletinId = i64;

/// Kind of a linkable entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Item,
    Site,
    Bulletin,
}

impl EntityKind {
    /// Backing table name.
    pub fn table(self) -> &'static str {
        match self {
            Self::Item => "items",
            Self::Site => "sites",
            Self::Bulletin => "bulletins",
        }
    }
}

impl Display for EntityKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Item => "item",
            Self::Site => "site",
            Self::Bulletin => "bulletin",
        };
        f.write_str(label)
    }
}

/// Publication state of an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    #[default]
    Active,
    Inactive,
}

/// Field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelValidationError {
    BlankTitle(EntityKind),
    BlankSiteName,
    NonPositiveDuration(i64),
}

impl Display for ModelValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankTitle(kind) => write!(f, "{kind} title must not be blank"),
            Self::BlankSiteName => write!(f, "site name must not be blank"),
            Self::NonPositiveDuration(value) => {
                write!(f, "duration must be a positive number of seconds, got {value}")
            }
        }
    }
}

impl Error for ModelValidationError {}

/// A piece of content that can be scheduled at sites.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub title: String,
    pub description: String,
    pub image_url: Option<String>,
    pub video_url: Option<String>,
    pub status: ItemStatus,
    /// Nominal duration. New site links copy this value once, at creation.
    pub duration_secs: i64,
    pub is_archived: bool,
    /// Epoch milliseconds.
    pub created_at: i64,
    /// Epoch milliseconds.
    pub updated_at: i64,
}

impl Item {
    pub fn validate(&self) -> Result<(), ModelValidationError> {
        validate_item_fields(&self.title, self.duration_secs)
    }
}

/// Input for creating an item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDraft {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub video_url: Option<String>,
    #[serde(default)]
    pub status: ItemStatus,
    pub duration_secs: i64,
}

impl ItemDraft {
    /// Active item draft with empty optional metadata.
    pub fn new(title: impl Into<String>, duration_secs: i64) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            image_url: None,
            video_url: None,
            status: ItemStatus::Active,
            duration_secs,
        }
    }

    pub fn validate(&self) -> Result<(), ModelValidationError> {
        validate_item_fields(&self.title, self.duration_secs)
    }
}

/// Partial item update. `None` leaves the stored field untouched; for the
/// media URLs `Some(None)` (JSON `null`) clears the stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ItemPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(deserialize_with = "clearable")]
    pub image_url: Option<Option<String>>,
    #[serde(deserialize_with = "clearable")]
    pub video_url: Option<Option<String>>,
    pub status: Option<ItemStatus>,
    /// Changing the nominal duration never touches existing link durations.
    pub duration_secs: Option<i64>,
}

impl ItemPatch {
    pub fn apply_to(&self, item: &mut Item) {
        if let Some(title) = &self.title {
            item.title = title.clone();
        }
        if let Some(description) = &self.description {
            item.description = description.clone();
        }
        if let Some(image_url) = &self.image_url {
            item.image_url = image_url.clone();
        }
        if let Some(video_url) = &self.video_url {
            item.video_url = video_url.clone();
        }
        if let Some(status) = self.status {
            item.status = status;
        }
        if let Some(duration_secs) = self.duration_secs {
            item.duration_secs = duration_secs;
        }
    }
}

/// A physical display location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Site {
    pub id: SiteId,
    /// Unique across all sites.
    pub name: String,
    pub address: String,
    pub is_archived: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Site {
    pub fn validate(&self) -> Result<(), ModelValidationError> {
        validate_site_name(&self.name)
    }
}

/// Input for creating a site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteDraft {
    pub name: String,
    #[serde(default)]
    pub address: String,
}

impl SiteDraft {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
        }
    }

    pub fn validate(&self) -> Result<(), ModelValidationError> {
        validate_site_name(&self.name)
    }
}

/// Partial site update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SitePatch {
    pub name: Option<String>,
    pub address: Option<String>,
}

impl SitePatch {
    pub fn apply_to(&self, site: &mut Site) {
        if let Some(name) = &self.name {
            site.name = name.clone();
        }
        if let Some(address) = &self.address {
            site.address = address.clone();
        }
    }
}

/// A notice document shown at sites.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bulletin {
    pub id: BulletinId,
    pub title: String,
    /// Reference to the uploaded document (e.g. a PDF location).
    pub document_url: Option<String>,
    pub is_archived: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Bulletin {
    pub fn validate(&self) -> Result<(), ModelValidationError> {
        validate_title(EntityKind::Bulletin, &self.title)
    }
}

/// Input for creating a bulletin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulletinDraft {
    pub title: String,
    #[serde(default)]
    pub document_url: Option<String>,
}

impl BulletinDraft {
    pub fn new(title: impl Into<String>, document_url: Option<String>) -> Self {
        Self {
            title: title.into(),
            document_url,
        }
    }

    pub fn validate(&self) -> Result<(), ModelValidationError> {
        validate_title(EntityKind::Bulletin, &self.title)
    }
}

/// Partial bulletin update. `document_url: Some(None)` detaches the document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BulletinPatch {
    pub title: Option<String>,
    #[serde(deserialize_with = "clearable")]
    pub document_url: Option<Option<String>>,
}

impl BulletinPatch {
    pub fn apply_to(&self, bulletin: &mut Bulletin) {
        if let Some(title) = &self.title {
            bulletin.title = title.clone();
        }
        if let Some(document_url) = &self.document_url {
            bulletin.document_url = document_url.clone();
        }
    }
}

/// Any of the three linkable entities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Entity {
    Item(Item),
    Site(Site),
    Bulletin(Bulletin),
}

impl Entity {
    pub fn id(&self) -> i64 {
        match self {
            Self::Item(item) => item.id,
            Self::Site(site) => site.id,
            Self::Bulletin(bulletin) => bulletin.id,
        }
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Item(_) => EntityKind::Item,
            Self::Site(_) => EntityKind::Site,
            Self::Bulletin(_) => EntityKind::Bulletin,
        }
    }
}

/// Create input for any linkable entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntityDraft {
    Item(ItemDraft),
    Site(SiteDraft),
    Bulletin(BulletinDraft),
}

impl EntityDraft {
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Item(_) => EntityKind::Item,
            Self::Site(_) => EntityKind::Site,
            Self::Bulletin(_) => EntityKind::Bulletin,
        }
    }
}

/// Patch input for any linkable entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntityPatch {
    Item(ItemPatch),
    Site(SitePatch),
    Bulletin(BulletinPatch),
}

impl EntityPatch {
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Item(_) => EntityKind::Item,
            Self::Site(_) => EntityKind::Site,
            Self::Bulletin(_) => EntityKind::Bulletin,
        }
    }
}

/// Keeps an explicit `null` apart from an absent field: absent stays `None`
/// through `#[serde(default)]`, `null` becomes `Some(None)`.
fn clearable<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

fn validate_item_fields(title: &str, duration_secs: i64) -> Result<(), ModelValidationError> {
    validate_title(EntityKind::Item, title)?;
    if duration_secs <= 0 {
        return Err(ModelValidationError::NonPositiveDuration(duration_secs));
    }
    Ok(())
}

fn validate_title(kind: EntityKind, title: &str) -> Result<(), ModelValidationError> {
    if title.trim().is_empty() {
        return Err(ModelValidationError::BlankTitle(kind));
    }
    Ok(())
}

fn validate_site_name(name: &str) -> Result<(), ModelValidationError> {
    if name.trim().is_empty() {
        return Err(ModelValidationError::BlankSiteName);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{BulletinPatch, ItemDraft, ItemPatch, ItemStatus, ModelValidationError, SiteDraft};

    #[test]
    fn item_draft_rejects_non_positive_duration() {
        let err = ItemDraft::new("promo", 0).validate().unwrap_err();
        assert_eq!(err, ModelValidationError::NonPositiveDuration(0));
    }

    #[test]
    fn site_draft_rejects_blank_name() {
        let err = SiteDraft::new("   ", "").validate().unwrap_err();
        assert_eq!(err, ModelValidationError::BlankSiteName);
    }

    #[test]
    fn item_patch_leaves_absent_fields_untouched() {
        let mut item = super::Item {
            id: 7,
            title: "before".to_string(),
            description: "desc".to_string(),
            image_url: None,
            video_url: Some("clip.mp4".to_string()),
            status: ItemStatus::Active,
            duration_secs: 30,
            is_archived: false,
            created_at: 0,
            updated_at: 0,
        };
        let patch = ItemPatch {
            title: Some("after".to_string()),
            status: Some(ItemStatus::Inactive),
            ..ItemPatch::default()
        };
        patch.apply_to(&mut item);

        assert_eq!(item.title, "after");
        assert_eq!(item.status, ItemStatus::Inactive);
        assert_eq!(item.description, "desc");
        assert_eq!(item.video_url.as_deref(), Some("clip.mp4"));
        assert_eq!(item.duration_secs, 30);
    }

    #[test]
    fn item_patch_can_clear_a_media_url() {
        let mut item = super::Item {
            id: 7,
            title: "promo".to_string(),
            description: String::new(),
            image_url: Some("still.png".to_string()),
            video_url: Some("clip.mp4".to_string()),
            status: ItemStatus::Active,
            duration_secs: 30,
            is_archived: false,
            created_at: 0,
            updated_at: 0,
        };
        let patch = ItemPatch {
            video_url: Some(None),
            ..ItemPatch::default()
        };
        patch.apply_to(&mut item);

        assert_eq!(item.video_url, None);
        assert_eq!(item.image_url.as_deref(), Some("still.png"));
    }

    #[test]
    fn patch_json_tells_null_from_absent() {
        let cleared: ItemPatch = serde_json::from_str(r#"{"video_url": null}"#).unwrap();
        assert_eq!(cleared.video_url, Some(None));
        assert_eq!(cleared.image_url, None);

        let set: BulletinPatch =
            serde_json::from_str(r#"{"document_url": "docs/menu.pdf"}"#).unwrap();
        assert_eq!(set.document_url, Some(Some("docs/menu.pdf".to_string())));
        let untouched: BulletinPatch = serde_json::from_str(r#"{"title": "Menu"}"#).unwrap();
        assert_eq!(untouched.document_url, None);
    }
}
