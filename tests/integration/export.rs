use haulscout_core::{write_loads_csv, MarketplaceConfig, SearchCriteria};
use haulscout_integration_tests::*;
use haulscout_scrapers::run_criteria_scan;
use tempfile::tempdir;

#[tokio::test]
async fn test_export_found_loads() -> Result<(), Box<dyn std::error::Error>> {
    let config = MarketplaceConfig::default();
    let site = MockSite::new();
    site.serve(
        &config.search_path,
        search_page(
            &config,
            &[
                load_card("LB-1", "Chicago, IL", "Dallas, TX", "$1,840", "Dry Van | 920 mi | 40,000 lbs"),
                load_card("LB-2", "Chicago, IL", "Omaha, NE", "Call", ""),
            ],
        ),
    );
    let pipeline = pipeline(MockLauncher::new(site, config.clone()), config);
    let db = connected_db().await;
    let mut criteria = SearchCriteria { origin_city: Some("Chicago".to_string()), ..SearchCriteria::new(USER) };
    let criteria_id = db.create_criteria(&mut criteria).await?;
    run_criteria_scan(&db, &pipeline, &cipher(), criteria_id).await?;

    let temp_dir = tempdir()?;
    let path = temp_dir.path().join("loads.csv");
    let found = db.list_found_loads(criteria_id).await?;
    write_loads_csv(std::fs::File::create(&path)?, &found)?;

    let exported = std::fs::read_to_string(&path)?;
    let lines: Vec<&str> = exported.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("Criteria,Load ID,Origin,Destination,Rate"));
    assert!(lines.contains(&format!("{},LB-1,\"Chicago, IL\",\"Dallas, TX\",1840,2,920,40000,Dry Van,Acme Logistics,Mon 10/21", criteria_id).as_str()));
    assert!(lines.contains(&format!("{},LB-2,\"Chicago, IL\",\"Omaha, NE\",,,,,Unknown,Acme Logistics,Mon 10/21", criteria_id).as_str()));

    Ok(())
}
