use haulscout_core::{
    BackhaulStatus, MarketplaceConfig, SavedLoad, ScanStatus, ScrapedLoad, SearchCriteria, WorkerConfig,
};
use haulscout_integration_tests::*;
use haulscout_scrapers::worker::wait_for;
use haulscout_scrapers::{JobOutcome, ScanContext, ScanJob, ScanWorker};
use std::sync::Arc;

#[tokio::test]
async fn test_worker_runs_queued_jobs() {
    let config = MarketplaceConfig::default();
    let site = MockSite::new();
    site.serve(
        &config.search_path,
        search_page(
            &config,
            &[
                load_card("LB-1", "Chicago, IL", "Dallas, TX", "$2,000", "Dry Van | 920 mi"),
                load_card("LB-2", "Dallas, TX", "Chicago, IL", "$1,500", "Dry Van | 920 mi"),
            ],
        ),
    );
    let launcher = MockLauncher::new(site, config.clone());
    let db = connected_db().await;

    let mut ids = Vec::new();
    for city in ["Chicago", "Dallas", "Gary"] {
        let mut criteria = SearchCriteria { origin_city: Some(city.to_string()), ..SearchCriteria::new(USER) };
        ids.push(db.create_criteria(&mut criteria).await.unwrap());
    }
    let mut saved = SavedLoad::new(
        USER,
        None,
        ScrapedLoad {
            id: "OUT-1".to_string(),
            origin: "Chicago, IL".to_string(),
            destination: "Dallas, TX".to_string(),
            rate: Some(2000.0),
            rate_per_mile: None,
            equipment: "Dry Van".to_string(),
            distance: Some(920.0),
            weight: None,
            broker: String::new(),
            pickup_date: String::new(),
            status: None,
            id_is_synthetic: false,
        },
    );
    let saved_id = db.save_load(&mut saved).await.unwrap();

    let worker = ScanWorker::spawn(
        ScanContext {
            db: db.clone(),
            pipeline: Arc::new(pipeline(launcher.clone(), config)),
            cipher: cipher(),
            backhaul_top_n: 3,
        },
        &WorkerConfig { concurrency: 2, queue_capacity: 4, backhaul_top_n: 3 },
    );

    let mut receivers = Vec::new();
    for id in &ids {
        receivers.push(worker.submit(ScanJob::Criteria(*id)).await.unwrap());
    }
    let backhaul = worker.submit(ScanJob::Backhaul(saved_id)).await.unwrap();

    // A submitter that stops listening does not cancel its job.
    drop(receivers.pop());

    for (id, receiver) in ids.iter().zip(receivers) {
        match wait_for(receiver).await.unwrap() {
            JobOutcome::Scan(report) => {
                assert_eq!(report.criteria_id, *id);
                assert_eq!(report.found, 2);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }
    match wait_for(backhaul).await.unwrap() {
        JobOutcome::Backhaul(suggestion) => assert_eq!(suggestion.status, BackhaulStatus::NoPreferences),
        other => panic!("unexpected outcome {:?}", other),
    }

    worker.shutdown().await;

    let dropped = db.get_criteria(ids[2]).await.unwrap().unwrap();
    assert_eq!(dropped.scan_status, Some(ScanStatus::Success));
    assert_eq!(launcher.launches(), 3);
    assert_eq!(launcher.closes(), 3);
}

#[tokio::test]
async fn test_failed_job_reports_error() {
    let config = MarketplaceConfig::default();
    let site = MockSite::new();
    site.expire_session();
    let launcher = MockLauncher::new(site, config.clone());
    let db = connected_db().await;
    let mut criteria = SearchCriteria { origin_city: Some("Chicago".to_string()), ..SearchCriteria::new(USER) };
    let id = db.create_criteria(&mut criteria).await.unwrap();

    let worker = ScanWorker::spawn(
        ScanContext {
            db: db.clone(),
            pipeline: Arc::new(pipeline(launcher, config)),
            cipher: cipher(),
            backhaul_top_n: 3,
        },
        &WorkerConfig::default(),
    );

    let receiver = worker.submit(ScanJob::Criteria(id)).await.unwrap();
    let err = wait_for(receiver).await.unwrap_err();
    assert!(err.needs_reconnect());
    worker.shutdown().await;

    let criteria = db.get_criteria(id).await.unwrap().unwrap();
    assert_eq!(criteria.scan_status, Some(ScanStatus::Error));
}
