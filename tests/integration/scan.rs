use haulscout_core::{Database, HaulError, MarketplaceConfig, ScanStatus, SearchCriteria};
use haulscout_integration_tests::*;
use haulscout_scrapers::run_criteria_scan;

fn chicago_dry_van() -> SearchCriteria {
    SearchCriteria {
        origin_city: Some("Chicago".to_string()),
        origin_state: Some("IL".to_string()),
        pickup_distance: Some(100),
        equipment_type: Some("Dry Van".to_string()),
        ..SearchCriteria::new(USER)
    }
}

fn cards(ids: &[&str]) -> Vec<String> {
    ids.iter()
        .map(|id| load_card(id, "Chicago, IL", "Dallas, TX", "$2,000", "Dry Van | 920 mi | 40,000 lbs"))
        .collect()
}

async fn stored(db: &Database, mut criteria: SearchCriteria) -> i64 {
    db.create_criteria(&mut criteria).await.unwrap()
}

#[tokio::test]
async fn test_scan_stores_matching_loads() {
    let config = MarketplaceConfig::default();
    let site = MockSite::new();
    let mut page_cards = cards(&["LB-1", "LB-2", "LB-3"]);
    page_cards.push(load_card("LB-4", "Chicago, IL", "Denver, CO", "$3,100", "Reefer | 1,000 mi"));
    site.serve(&config.search_path, search_page(&config, &page_cards));

    let launcher = MockLauncher::new(site, config.clone());
    let pipeline = pipeline(launcher.clone(), config.clone());
    let db = connected_db().await;
    let id = stored(&db, chicago_dry_van()).await;

    let report = run_criteria_scan(&db, &pipeline, &cipher(), id).await.unwrap();
    assert_eq!(report.found, 3);
    assert_eq!(report.inserted, 3);

    let criteria = db.get_criteria(id).await.unwrap().unwrap();
    assert_eq!(criteria.scan_status, Some(ScanStatus::Success));
    assert_eq!(criteria.last_scan_count, Some(3));
    assert_eq!(criteria.scan_error, None);
    assert!(criteria.last_scanned_at.is_some());

    let found = db.list_found_loads(id).await.unwrap();
    assert_eq!(found.len(), 3);
    assert!(found.iter().all(|f| f.details.equipment == "Dry Van"));

    let actions = launcher.actions();
    assert!(actions.contains(&format!("type {} Chicago, IL", config.form.origin_input)));
    assert!(actions.contains(&format!("select {} 100", config.form.radius_select)));
    assert_eq!(launcher.launches(), 1);
    assert_eq!(launcher.closes(), 1);
}

#[tokio::test]
async fn test_empty_results_is_a_successful_scan() {
    let config = MarketplaceConfig::default();
    let site = MockSite::new();
    site.serve(&config.search_path, search_page(&config, &[]));

    let launcher = MockLauncher::new(site, config.clone());
    let pipeline = pipeline(launcher.clone(), config);
    let db = connected_db().await;
    let id = stored(&db, chicago_dry_van()).await;

    let report = run_criteria_scan(&db, &pipeline, &cipher(), id).await.unwrap();
    assert_eq!(report.found, 0);

    let criteria = db.get_criteria(id).await.unwrap().unwrap();
    assert_eq!(criteria.scan_status, Some(ScanStatus::Success));
    assert_eq!(criteria.last_scan_count, Some(0));
    assert_eq!(launcher.closes(), 1);
}

#[tokio::test]
async fn test_expired_session_is_recorded() {
    let config = MarketplaceConfig::default();
    let site = MockSite::new();
    site.serve(&config.search_path, search_page(&config, &cards(&["LB-1"])));
    site.expire_session();

    let launcher = MockLauncher::new(site, config.clone());
    let pipeline = pipeline(launcher.clone(), config);
    let db = connected_db().await;
    let id = stored(&db, chicago_dry_van()).await;

    let err = run_criteria_scan(&db, &pipeline, &cipher(), id).await.unwrap_err();
    assert!(matches!(err, HaulError::SessionExpired));

    let criteria = db.get_criteria(id).await.unwrap().unwrap();
    assert_eq!(criteria.scan_status, Some(ScanStatus::Error));
    assert!(criteria.scan_error.unwrap().contains("reconnect your account"));
    assert!(!db.get_credentials(USER).await.unwrap().unwrap().is_valid);
    assert_eq!(launcher.closes(), 1);

    // Known-bad credentials fail before a browser is started.
    let err = run_criteria_scan(&db, &pipeline, &cipher(), id).await.unwrap_err();
    assert!(matches!(err, HaulError::SessionExpired));
    assert_eq!(launcher.launches(), 1);
}

#[tokio::test]
async fn test_rescan_inserts_only_new_loads() {
    let config = MarketplaceConfig::default();
    let site = MockSite::new();
    site.serve(&config.search_path, search_page(&config, &cards(&["A", "B", "C"])));

    let launcher = MockLauncher::new(site.clone(), config.clone());
    let pipeline = pipeline(launcher, config.clone());
    let db = connected_db().await;
    let id = stored(&db, chicago_dry_van()).await;

    let first = run_criteria_scan(&db, &pipeline, &cipher(), id).await.unwrap();
    assert_eq!(first.inserted, 3);

    site.serve(&config.search_path, search_page(&config, &cards(&["B", "C", "D"])));
    let second = run_criteria_scan(&db, &pipeline, &cipher(), id).await.unwrap();
    assert_eq!(second.found, 3);
    assert_eq!(second.inserted, 1);

    let mut ids: Vec<String> = db
        .list_found_loads(id)
        .await
        .unwrap()
        .into_iter()
        .map(|f| f.load_id)
        .collect();
    ids.sort();
    assert_eq!(ids, vec!["A", "B", "C", "D"]);
}

#[tokio::test]
async fn test_missing_credentials_fail_without_browser() {
    let config = MarketplaceConfig::default();
    let launcher = MockLauncher::new(MockSite::new(), config.clone());
    let pipeline = pipeline(launcher.clone(), config);
    let db = Database::in_memory().await.unwrap();
    let id = stored(&db, chicago_dry_van()).await;

    let err = run_criteria_scan(&db, &pipeline, &cipher(), id).await.unwrap_err();
    assert!(matches!(err, HaulError::NotConnected(ref user) if user == USER));
    assert_eq!(launcher.launches(), 0);

    let criteria = db.get_criteria(id).await.unwrap().unwrap();
    assert_eq!(criteria.scan_status, Some(ScanStatus::Error));
}

#[tokio::test]
async fn test_deleted_criteria_is_not_scanned() {
    let config = MarketplaceConfig::default();
    let launcher = MockLauncher::new(MockSite::new(), config.clone());
    let pipeline = pipeline(launcher.clone(), config);
    let db = connected_db().await;
    let id = stored(&db, chicago_dry_van()).await;
    db.soft_delete_criteria(id).await.unwrap();

    let err = run_criteria_scan(&db, &pipeline, &cipher(), id).await.unwrap_err();
    assert!(matches!(err, HaulError::Invalid(_)));
    assert_eq!(launcher.launches(), 0);
}

#[tokio::test]
async fn test_scan_booked_reads_cards() {
    let config = MarketplaceConfig::default();
    let site = MockSite::new();
    site.serve(
        &config.booked_path,
        booked_page(&[
            booked_card("J-1", "Columbus, OH", "Atlanta, GA", "$1,450.00", "In transit"),
            booked_card("J-2", "", "", "$900", "Delivered"),
        ]),
    );

    let launcher = MockLauncher::new(site, config.clone());
    let pipeline = pipeline(launcher.clone(), config);

    let loads = pipeline.scan_booked(&session()).await.unwrap();
    assert_eq!(loads.len(), 1);
    assert_eq!(loads[0].id, "J-1");
    assert_eq!(loads[0].rate, Some(1450.0));
    assert_eq!(loads[0].equipment, "Dry Van");
    assert_eq!(loads[0].status.as_deref(), Some("In transit"));
    assert_eq!(launcher.closes(), 1);
}
