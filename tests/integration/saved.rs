use haulscout_core::{MarketplaceConfig, SavedLoadStatus, SearchCriteria};
use haulscout_integration_tests::*;
use haulscout_scrapers::run_criteria_scan;

#[tokio::test]
async fn test_saved_load_lifecycle() {
    let config = MarketplaceConfig::default();
    let site = MockSite::new();
    site.serve(
        &config.search_path,
        search_page(&config, &[load_card("LB-7", "Chicago, IL", "Dallas, TX", "$2,000", "Dry Van | 920 mi")]),
    );
    let pipeline = pipeline(MockLauncher::new(site, config.clone()), config);
    let db = connected_db().await;

    let mut criteria = SearchCriteria {
        origin_city: Some("Chicago".to_string()),
        origin_state: Some("IL".to_string()),
        ..SearchCriteria::new(USER)
    };
    let criteria_id = db.create_criteria(&mut criteria).await.unwrap();
    run_criteria_scan(&db, &pipeline, &cipher(), criteria_id).await.unwrap();

    let found = db.list_found_loads(criteria_id).await.unwrap();
    let saved = db.save_found_load(USER, found[0].id.unwrap()).await.unwrap();
    let saved_id = saved.id.unwrap();
    assert_eq!(saved.load_id, "LB-7");
    assert_eq!(saved.status, SavedLoadStatus::Interested);

    db.set_saved_load_status(saved_id, SavedLoadStatus::Trash).await.unwrap();
    assert!(db.list_saved_loads(USER, SavedLoadStatus::Interested).await.unwrap().is_empty());
    assert_eq!(db.list_saved_loads(USER, SavedLoadStatus::Trash).await.unwrap().len(), 1);

    db.set_saved_load_status(saved_id, SavedLoadStatus::Interested).await.unwrap();
    let interested = db.list_saved_loads(USER, SavedLoadStatus::Interested).await.unwrap();
    assert_eq!(interested.len(), 1);
    assert_eq!(interested[0].details.destination, "Dallas, TX");

    db.start_backhaul(saved_id).await.unwrap();
    db.remove_saved_load(saved_id).await.unwrap();
    assert!(db.get_saved_load(saved_id).await.unwrap().is_none());
    assert!(db.get_backhaul(saved_id).await.unwrap().is_none());

    // Hard-deleting the criteria removes its found loads.
    db.delete_criteria(criteria_id).await.unwrap();
    assert!(db.list_found_loads(criteria_id).await.unwrap().is_empty());
}
