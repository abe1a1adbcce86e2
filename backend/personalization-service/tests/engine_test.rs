use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;

use personalization_service::config::Config;
use personalization_service::models::{OnboardingPreferences, Product, SwipeOutcome};
use personalization_service::services::{
    InMemoryAssignmentStore, InMemoryCatalog, InMemoryProfileStore, InMemorySwipeLedger,
    ProfileStore, RecommendationEngine,
};

type Engine = RecommendationEngine<
    InMemoryCatalog,
    InMemorySwipeLedger,
    InMemoryProfileStore,
    InMemoryAssignmentStore,
>;

fn product(id: &str, tags: &[&str], category: &str, brand: &str) -> Product {
    Product {
        id: id.to_string(),
        title: format!("Product {}", id),
        brand: Some(brand.to_string()),
        category: Some(category.to_string()),
        price: 3000,
        tags: tags.iter().map(|s| s.to_string()).collect::<BTreeSet<_>>(),
        popularity_score: 0.5,
        is_active: true,
        created_at: Utc::now(),
    }
}

struct Stores {
    catalog: Arc<InMemoryCatalog>,
    ledger: Arc<InMemorySwipeLedger>,
    profiles: Arc<InMemoryProfileStore>,
    assignments: Arc<InMemoryAssignmentStore>,
}

impl Stores {
    fn new() -> Self {
        Self {
            catalog: Arc::new(InMemoryCatalog::new()),
            ledger: Arc::new(InMemorySwipeLedger::new()),
            profiles: Arc::new(InMemoryProfileStore::new()),
            assignments: Arc::new(InMemoryAssignmentStore::new()),
        }
    }

    fn engine(&self) -> Engine {
        RecommendationEngine::new(
            self.catalog.clone(),
            self.ledger.clone(),
            self.profiles.clone(),
            self.assignments.clone(),
            Config::default(),
        )
    }
}

#[tokio::test]
async fn test_variant_stable_across_engine_restarts() {
    let stores = Stores::new();

    let first = stores
        .engine()
        .get_experiment_variant("user-7", "ranking_weights")
        .await
        .unwrap();

    // A fresh engine over the same assignment store must agree
    let second = stores
        .engine()
        .get_experiment_variant("user-7", "ranking_weights")
        .await
        .unwrap();

    assert_eq!(first, second);
}

#[tokio::test]
async fn test_swiped_products_never_resurface() {
    let stores = Stores::new();
    for i in 0..30 {
        stores.catalog.upsert(product(
            &format!("p{:02}", i),
            &["casual"],
            &format!("cat{}", i),
            &format!("brand{}", i),
        ));
    }
    let engine = stores.engine();

    for i in 0..12 {
        let outcome = if i % 2 == 0 {
            SwipeOutcome::Liked
        } else {
            SwipeOutcome::Rejected
        };
        engine
            .record_swipe("u1", "s1", &format!("p{:02}", i), outcome, Some(700))
            .await
            .unwrap();
    }

    let feed = engine.get_recommendations("u1", "s1", 10).await.unwrap();
    assert!(!feed.is_empty());
    for item in &feed {
        let n: usize = item.id[1..].parse().unwrap();
        assert!(n >= 12, "swiped product {} resurfaced", item.id);
    }
}

#[tokio::test]
async fn test_cold_start_with_over_constrained_onboarding_still_fills() {
    let stores = Stores::new();
    for i in 0..15 {
        stores.catalog.upsert(product(
            &format!("p{:02}", i),
            &["casual"],
            &format!("cat{}", i),
            &format!("brand{}", i),
        ));
    }

    stores
        .profiles
        .save_onboarding(
            "new-user",
            OnboardingPreferences {
                styles: vec!["style-nobody-has".to_string()],
                categories: vec!["no-such-category".to_string()],
                price_range: Some((1, 2)),
            },
        )
        .await
        .unwrap();

    let engine = stores.engine();
    let feed = engine
        .get_recommendations("new-user", "s1", 10)
        .await
        .unwrap();
    assert_eq!(feed.len(), 10);
}

#[tokio::test]
async fn test_no_category_dominates_the_feed() {
    let stores = Stores::new();
    // Dresses are the most popular block
    for i in 0..20 {
        let mut p = product(
            &format!("d{:02}", i),
            &["casual"],
            "dresses",
            &format!("brand{}", i),
        );
        p.popularity_score = 0.9;
        stores.catalog.upsert(p);
    }
    for i in 0..10 {
        stores.catalog.upsert(product(
            &format!("o{:02}", i),
            &["casual"],
            &format!("cat{}", i),
            &format!("other{}", i),
        ));
    }

    let engine = stores.engine();
    // One swipe so the user is past cold start
    engine
        .record_swipe("u1", "s1", "o00", SwipeOutcome::Liked, None)
        .await
        .unwrap();

    let feed = engine.get_recommendations("u1", "s1", 10).await.unwrap();
    assert_eq!(feed.len(), 10);

    let dresses = feed
        .iter()
        .filter(|p| p.category.as_deref() == Some("dresses"))
        .count();
    assert!(dresses <= 4, "got {} dresses out of 10", dresses);
}

#[tokio::test]
async fn test_liked_style_rises_in_the_feed() {
    let stores = Stores::new();

    // Swiped products: three liked minimalist pieces, one rejected streetwear
    stores
        .catalog
        .upsert(product("liked-1", &["minimalist"], "coats", "b1"));
    stores
        .catalog
        .upsert(product("liked-2", &["minimalist"], "jackets", "b2"));
    stores
        .catalog
        .upsert(product("liked-3", &["minimalist"], "knitwear", "b3"));
    stores
        .catalog
        .upsert(product("rejected-1", &["streetwear"], "hoodies", "b4"));

    // Unswiped pool: five minimalist, ten unrelated
    for i in 0..5 {
        stores.catalog.upsert(product(
            &format!("min-{}", i),
            &["minimalist"],
            &format!("mcat{}", i),
            &format!("mb{}", i),
        ));
    }
    for i in 0..10 {
        stores.catalog.upsert(product(
            &format!("other-{}", i),
            &["romantic"],
            &format!("ocat{}", i),
            &format!("ob{}", i),
        ));
    }

    let engine = stores.engine();
    for id in ["liked-1", "liked-2", "liked-3"] {
        engine
            .record_swipe("u1", "s1", id, SwipeOutcome::Liked, Some(900))
            .await
            .unwrap();
    }
    engine
        .record_swipe("u1", "s1", "rejected-1", SwipeOutcome::Rejected, Some(400))
        .await
        .unwrap();

    let feed = engine.get_recommendations("u1", "s1", 10).await.unwrap();
    assert_eq!(feed.len(), 10);

    // Nothing already swiped comes back
    for item in &feed {
        assert!(!item.id.starts_with("liked-"));
        assert!(!item.id.starts_with("rejected-"));
    }

    // Minimalist pieces dominate the top of the feed
    let minimalist_in_top5 = feed[..5]
        .iter()
        .filter(|p| p.tags.contains("minimalist"))
        .count();
    assert!(
        minimalist_in_top5 >= 3,
        "only {} minimalist items in top 5",
        minimalist_in_top5
    );
}

#[tokio::test]
async fn test_category_shift_after_rejection_streak() {
    let stores = Stores::new();
    for i in 0..5 {
        stores.catalog.upsert(product(
            &format!("street-{}", i),
            &["streetwear"],
            "hoodies",
            &format!("sb{}", i),
        ));
    }
    for i in 0..15 {
        stores.catalog.upsert(product(
            &format!("alt-{}", i),
            &["classic"],
            &format!("acat{}", i),
            &format!("ab{}", i),
        ));
    }

    let engine = stores.engine();
    // Three consecutive rejections in the same category
    for i in 0..3 {
        engine
            .record_swipe("u1", "s1", &format!("street-{}", i), SwipeOutcome::Rejected, None)
            .await
            .unwrap();
    }

    let feed = engine.get_recommendations("u1", "s1", 10).await.unwrap();
    assert!(!feed.is_empty());
    for item in &feed {
        assert_ne!(item.category.as_deref(), Some("hoodies"));
    }
}
