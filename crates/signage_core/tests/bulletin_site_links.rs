use signage_core::db::open_db_in_memory;
use signage_core::{
    AssociationError, BulletinDraft, BulletinPatch, CatalogService, EntityKind, LinkDirection,
    LinkRepository, RepoError, SiteDraft, SitePatch, SqliteLinkRepository,
};

#[test]
fn bulletin_links_carry_no_play_duration() {
    let mut conn = open_db_in_memory().unwrap();
    let mut catalog = CatalogService::new(&mut conn);
    let lobby = catalog
        .create_site(SiteDraft::new("Lobby", ""), &[], &[])
        .unwrap()
        .site
        .id;
    let cafe = catalog
        .create_site(SiteDraft::new("Cafe", ""), &[], &[])
        .unwrap()
        .site
        .id;

    let detail = catalog
        .create_bulletin(
            BulletinDraft::new("Fire drill", Some("docs/drill.pdf".to_string())),
            &[cafe, lobby],
        )
        .unwrap();

    let ids: Vec<i64> = detail.sites.iter().map(|row| row.counterpart_id).collect();
    assert_eq!(ids, vec![lobby, cafe]);
    assert!(detail
        .sites
        .iter()
        .all(|row| row.play_duration_secs.is_none()));
}

#[test]
fn bulletin_replace_add_and_remove_follow_set_semantics() {
    let mut conn = open_db_in_memory().unwrap();
    let mut catalog = CatalogService::new(&mut conn);
    let lobby = catalog
        .create_site(SiteDraft::new("Lobby", ""), &[], &[])
        .unwrap()
        .site
        .id;
    let cafe = catalog
        .create_site(SiteDraft::new("Cafe", ""), &[], &[])
        .unwrap()
        .site
        .id;
    let bulletin_id = catalog
        .create_bulletin(BulletinDraft::new("Menu", None), &[lobby])
        .unwrap()
        .bulletin
        .id;

    let added = catalog
        .add_links(LinkDirection::BulletinToSites, bulletin_id, &[lobby, cafe])
        .unwrap();
    assert_eq!(added.created, 1);

    let rows = catalog
        .replace_links(LinkDirection::BulletinToSites, bulletin_id, &[cafe])
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].counterpart_id, cafe);

    let removed = catalog
        .remove_links(LinkDirection::BulletinToSites, bulletin_id, &[cafe, lobby])
        .unwrap();
    assert_eq!(removed.removed, 1);
    assert!(catalog
        .links_of(LinkDirection::BulletinToSites, bulletin_id)
        .unwrap()
        .is_empty());
}

#[test]
fn bulletin_create_with_unknown_site_commits_nothing() {
    let mut conn = open_db_in_memory().unwrap();
    let mut catalog = CatalogService::new(&mut conn);

    let err = catalog
        .create_bulletin(BulletinDraft::new("Menu", None), &[12])
        .unwrap_err();

    assert!(matches!(
        err,
        AssociationError::ValidationFailed {
            kind: EntityKind::Site,
            ..
        }
    ));
    assert!(catalog.list_bulletins().unwrap().is_empty());
}

#[test]
fn site_create_links_items_and_bulletins_in_one_unit() {
    let mut conn = open_db_in_memory().unwrap();
    let mut catalog = CatalogService::new(&mut conn);
    let bulletin_id = catalog
        .create_bulletin(BulletinDraft::new("Menu", None), &[])
        .unwrap()
        .bulletin
        .id;

    let err = catalog
        .create_site(SiteDraft::new("Lobby", ""), &[], &[bulletin_id, 404])
        .unwrap_err();
    assert!(matches!(
        err,
        AssociationError::ValidationFailed {
            kind: EntityKind::Bulletin,
            ..
        }
    ));
    assert!(catalog.list_sites().unwrap().is_empty());

    let site = catalog
        .create_site(SiteDraft::new("Lobby", ""), &[], &[bulletin_id])
        .unwrap();
    assert_eq!(site.bulletins.len(), 1);
    assert_eq!(
        catalog
            .links_of(LinkDirection::BulletinToSites, bulletin_id)
            .unwrap()[0]
            .counterpart_id,
        site.site.id
    );
}

#[test]
fn site_update_can_replace_bulletins_without_touching_items() {
    let mut conn = open_db_in_memory().unwrap();
    let mut catalog = CatalogService::new(&mut conn);
    let first = catalog
        .create_bulletin(BulletinDraft::new("Menu", None), &[])
        .unwrap()
        .bulletin
        .id;
    let second = catalog
        .create_bulletin(BulletinDraft::new("Hours", None), &[])
        .unwrap()
        .bulletin
        .id;
    let site_id = catalog
        .create_site(SiteDraft::new("Lobby", ""), &[], &[first])
        .unwrap()
        .site
        .id;

    let detail = catalog
        .update_site(
            site_id,
            SitePatch {
                address: Some("2 Side St".to_string()),
                ..SitePatch::default()
            },
            None,
            Some(&[second][..]),
        )
        .unwrap();

    assert_eq!(detail.site.address, "2 Side St");
    assert_eq!(detail.bulletins.len(), 1);
    assert_eq!(detail.bulletins[0].counterpart_id, second);
    assert!(detail.items.is_empty());
}

#[test]
fn bulletin_update_patches_fields_and_optionally_relinks() {
    let mut conn = open_db_in_memory().unwrap();
    let mut catalog = CatalogService::new(&mut conn);
    let lobby = catalog
        .create_site(SiteDraft::new("Lobby", ""), &[], &[])
        .unwrap()
        .site
        .id;
    let bulletin_id = catalog
        .create_bulletin(BulletinDraft::new("Menu", None), &[lobby])
        .unwrap()
        .bulletin
        .id;

    let detail = catalog
        .update_bulletin(
            bulletin_id,
            BulletinPatch {
                document_url: Some(Some("docs/menu-v2.pdf".to_string())),
                ..BulletinPatch::default()
            },
            None,
        )
        .unwrap();
    assert_eq!(detail.bulletin.document_url.as_deref(), Some("docs/menu-v2.pdf"));
    assert_eq!(detail.sites.len(), 1);

    let relinked = catalog
        .update_bulletin(bulletin_id, BulletinPatch::default(), Some(&[][..]))
        .unwrap();
    assert!(relinked.sites.is_empty());

    let detached = catalog
        .update_bulletin(
            bulletin_id,
            BulletinPatch {
                document_url: Some(None),
                ..BulletinPatch::default()
            },
            None,
        )
        .unwrap();
    assert_eq!(detached.bulletin.document_url, None);
    assert_eq!(detached.bulletin.title, "Menu");
}

#[test]
fn renaming_site_to_existing_name_fails_without_changes() {
    let mut conn = open_db_in_memory().unwrap();
    let mut catalog = CatalogService::new(&mut conn);
    catalog
        .create_site(SiteDraft::new("Lobby", ""), &[], &[])
        .unwrap();
    let cafe = catalog
        .create_site(SiteDraft::new("Cafe", ""), &[], &[])
        .unwrap()
        .site
        .id;

    let err = catalog
        .update_site(
            cafe,
            SitePatch {
                name: Some("Lobby".to_string()),
                ..SitePatch::default()
            },
            None,
            None,
        )
        .unwrap_err();

    assert!(matches!(
        err,
        AssociationError::Repo(RepoError::UniqueViolation("sites.name"))
    ));
    assert_eq!(catalog.site_detail(cafe).unwrap().unwrap().site.name, "Cafe");
}

#[test]
fn stored_bulletin_link_is_addressable_by_pair() {
    let mut conn = open_db_in_memory().unwrap();
    let (bulletin_id, lobby, cafe) = {
        let mut catalog = CatalogService::new(&mut conn);
        let lobby = catalog
            .create_site(SiteDraft::new("Lobby", ""), &[], &[])
            .unwrap()
            .site
            .id;
        let cafe = catalog
            .create_site(SiteDraft::new("Cafe", ""), &[], &[])
            .unwrap()
            .site
            .id;
        let bulletin_id = catalog
            .create_bulletin(BulletinDraft::new("Menu", None), &[lobby])
            .unwrap()
            .bulletin
            .id;
        (bulletin_id, lobby, cafe)
    };

    let links = SqliteLinkRepository::try_new(&conn).unwrap();
    let stored = links
        .get_bulletin_site_link(bulletin_id, lobby)
        .unwrap()
        .unwrap();
    assert_eq!((stored.bulletin_id, stored.site_id), (bulletin_id, lobby));
    assert!(stored.created_at > 0);
    assert!(links
        .get_bulletin_site_link(bulletin_id, cafe)
        .unwrap()
        .is_none());
}
