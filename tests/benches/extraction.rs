use chrono::Utc;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use haulscout_core::{Database, LoadFilter, MarketplaceConfig, ScrapedLoad, SearchCriteria};
use haulscout_scrapers::{ExtractorFactory, ExtractorKind};
use std::time::Duration;
use tokio::runtime::Runtime;

const EQUIPMENT: [&str; 3] = ["Dry Van", "Reefer", "Flatbed"];

fn results_page(count: usize) -> String {
    let cards: String = (0..count)
        .map(|i| {
            format!(
                r#"<div class="load-card" data-load-id="LB-{i}">
                    <span class="load-card__location">Chicago, IL</span>
                    <span class="load-card__location">Dallas, TX</span>
                    <span class="load-card__rate">${rate}.00</span>
                    <span class="load-card__details">{equipment} | {miles} mi | {weight} lbs</span>
                    <span class="load-card__broker">Broker {i}</span>
                    <span class="load-card__pickup">Mon 10/21</span>
                </div>"#,
                i = i,
                rate = 800 + (i * 37) % 3000,
                equipment = EQUIPMENT[i % EQUIPMENT.len()],
                miles = 200 + (i * 13) % 1200,
                weight = 10_000 + (i * 511) % 35_000,
            )
        })
        .collect();
    format!(r#"<html><body><div class="search-results">{}</div></body></html>"#, cards)
}

fn bench_extraction(c: &mut Criterion) {
    let config = MarketplaceConfig::default();
    let extractor = ExtractorFactory::create(ExtractorKind::SearchResults, &config).unwrap();

    let mut group = c.benchmark_group("extraction");
    for size in [10, 100, 500].iter() {
        let html = results_page(*size);
        group.bench_with_input(BenchmarkId::new("search_results", size), &html, |b, html| {
            b.iter(|| black_box(extractor.extract(html, Utc::now()).unwrap()));
        });
    }
    group.finish();
}

fn bench_filter(c: &mut Criterion) {
    let config = MarketplaceConfig::default();
    let extractor = ExtractorFactory::create(ExtractorKind::SearchResults, &config).unwrap();
    let loads = extractor.extract(&results_page(1000), Utc::now()).unwrap();
    let filter = LoadFilter::from_criteria(&SearchCriteria {
        equipment_type: Some("dry van".to_string()),
        min_rate: Some(1500.0),
        max_weight: Some(40_000.0),
        ..SearchCriteria::new("bench")
    });

    c.bench_function("filter_1000", |b| {
        b.iter(|| black_box(filter.apply(loads.clone())));
    });
}

fn bench_dedup_insert(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let config = MarketplaceConfig::default();
    let extractor = ExtractorFactory::create(ExtractorKind::SearchResults, &config).unwrap();

    let mut group = c.benchmark_group("persistence");
    group.sample_size(10);
    group.measurement_time(Duration::from_secs(10));

    for size in [10, 100].iter() {
        let loads: Vec<ScrapedLoad> = extractor.extract(&results_page(*size), Utc::now()).unwrap();
        group.bench_with_input(BenchmarkId::new("insert_new_loads", size), &loads, |b, loads| {
            b.to_async(&rt).iter(|| async {
                let db = Database::in_memory().await.unwrap();
                let mut criteria = SearchCriteria::new("bench");
                let id = db.create_criteria(&mut criteria).await.unwrap();
                black_box(db.insert_new_loads(id, loads).await.unwrap());
                // Second pass is all duplicates.
                black_box(db.insert_new_loads(id, loads).await.unwrap());
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_extraction, bench_filter, bench_dedup_insert);
criterion_main!(benches);
