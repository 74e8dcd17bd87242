use haulscout_core::{BackhaulStatus, Database, MarketplaceConfig, SavedLoad, ScrapedLoad, SearchCriteria};
use haulscout_integration_tests::*;
use haulscout_scrapers::suggest_backhaul;

fn delivered_load() -> ScrapedLoad {
    ScrapedLoad {
        id: "OUT-1".to_string(),
        origin: "Chicago, IL".to_string(),
        destination: "Dallas, TX".to_string(),
        rate: Some(2300.0),
        rate_per_mile: None,
        equipment: "Dry Van".to_string(),
        distance: Some(920.0),
        weight: Some(40_000.0),
        broker: "Acme Logistics".to_string(),
        pickup_date: "Mon 10/21".to_string(),
        status: None,
        id_is_synthetic: false,
    }
}

async fn saved_load(db: &Database) -> i64 {
    let mut saved = SavedLoad::new(USER, None, delivered_load());
    db.save_load(&mut saved).await.unwrap()
}

async fn add_preference(db: &Database) {
    let mut preference = SearchCriteria {
        equipment_type: Some("Dry Van".to_string()),
        min_rate: Some(1000.0),
        backhaul: true,
        ..SearchCriteria::new(USER)
    };
    db.create_criteria(&mut preference).await.unwrap();
}

#[tokio::test]
async fn test_no_preferences() {
    let config = MarketplaceConfig::default();
    let launcher = MockLauncher::new(MockSite::new(), config.clone());
    let pipeline = pipeline(launcher.clone(), config);
    let db = connected_db().await;
    let saved_id = saved_load(&db).await;

    let backhaul = suggest_backhaul(&db, &pipeline, &cipher(), saved_id, 3).await.unwrap();
    assert_eq!(backhaul.status, BackhaulStatus::NoPreferences);
    assert_eq!(launcher.launches(), 0);

    let stored = db.get_backhaul(saved_id).await.unwrap().unwrap();
    assert_eq!(stored.status, BackhaulStatus::NoPreferences);
}

#[tokio::test]
async fn test_finds_return_loads() {
    let config = MarketplaceConfig::default();
    let site = MockSite::new();
    site.serve(
        &config.search_path,
        search_page(
            &config,
            &[
                load_card("R-1", "Dallas, TX", "Chicago, IL", "$1,840", "Dry Van | 920 mi"),
                load_card("R-2", "Dallas, TX", "Joliet, IL", "$2,100", "Dry Van | 700 mi"),
                load_card("R-3", "Dallas, TX", "Chicago, IL", "$900", "Dry Van | 920 mi"),
                load_card("R-4", "Dallas, TX", "Chicago, IL", "$2,500", "Flatbed | 920 mi"),
            ],
        ),
    );

    let launcher = MockLauncher::new(site, config.clone());
    let pipeline = pipeline(launcher.clone(), config.clone());
    let db = connected_db().await;
    add_preference(&db).await;
    let saved_id = saved_load(&db).await;

    let backhaul = suggest_backhaul(&db, &pipeline, &cipher(), saved_id, 1).await.unwrap();
    assert_eq!(backhaul.status, BackhaulStatus::Found);
    assert_eq!(backhaul.result_count, 2);
    assert_eq!(backhaul.best_rate, Some(2100.0));
    assert_eq!(backhaul.best_rpm, Some(3.0));
    assert_eq!(backhaul.top_loads.len(), 1);
    assert_eq!(backhaul.top_loads[0].id, "R-2");

    let actions = launcher.actions();
    assert!(actions.contains(&format!("type {} Dallas, TX", config.form.origin_input)));
    assert!(actions.contains(&format!("type {} Chicago, IL", config.form.destination_input)));
    assert_eq!(launcher.closes(), 1);

    let stored = db.get_backhaul(saved_id).await.unwrap().unwrap();
    assert_eq!(stored.status, BackhaulStatus::Found);
    assert_eq!(stored.top_loads[0].id, "R-2");
}

#[tokio::test]
async fn test_rerun_resets_previous_suggestion() {
    let config = MarketplaceConfig::default();
    let site = MockSite::new();
    site.serve(
        &config.search_path,
        search_page(&config, &[load_card("R-1", "Dallas, TX", "Chicago, IL", "$1,840", "Dry Van | 920 mi")]),
    );

    let launcher = MockLauncher::new(site.clone(), config.clone());
    let pipeline = pipeline(launcher, config.clone());
    let db = connected_db().await;
    add_preference(&db).await;
    let saved_id = saved_load(&db).await;

    let first = suggest_backhaul(&db, &pipeline, &cipher(), saved_id, 3).await.unwrap();
    assert_eq!(first.status, BackhaulStatus::Found);

    site.serve(&config.search_path, search_page(&config, &[]));
    let second = suggest_backhaul(&db, &pipeline, &cipher(), saved_id, 3).await.unwrap();
    assert_eq!(second.id, first.id);
    assert_eq!(second.status, BackhaulStatus::NoResults);
    assert_eq!(second.result_count, 0);
    assert!(second.top_loads.is_empty());
}

#[tokio::test]
async fn test_expired_session_is_recorded_on_suggestion() {
    let config = MarketplaceConfig::default();
    let site = MockSite::new();
    site.expire_session();

    let launcher = MockLauncher::new(site, config.clone());
    let pipeline = pipeline(launcher.clone(), config);
    let db = connected_db().await;
    add_preference(&db).await;
    let saved_id = saved_load(&db).await;

    let backhaul = suggest_backhaul(&db, &pipeline, &cipher(), saved_id, 3).await.unwrap();
    assert_eq!(backhaul.status, BackhaulStatus::Error);
    assert!(backhaul.error.unwrap().contains("reconnect your account"));
    assert!(!db.get_credentials(USER).await.unwrap().unwrap().is_valid);
    assert_eq!(launcher.closes(), 1);
}
