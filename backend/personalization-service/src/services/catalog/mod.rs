use super::StoreResult;
use crate::models::Product;
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashSet;

/// Candidate retrieval filter. `any_tags` matches products carrying at least
/// one of the listed tags; `exclude_ids` carries every previously swiped id.
#[derive(Debug, Clone, Default)]
pub struct CatalogFilter {
    pub any_tags: Option<Vec<String>>,
    pub categories: Option<Vec<String>>,
    pub exclude_categories: Vec<String>,
    pub price_range: Option<(u64, u64)>,
    pub exclude_ids: HashSet<String>,
}

/// Read-only access to the product catalog.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Active products matching the filter, ordered by popularity descending
    /// then id ascending, truncated to `limit`.
    async fn find(&self, filter: &CatalogFilter, limit: usize) -> StoreResult<Vec<Product>>;

    async fn get(&self, product_id: &str) -> StoreResult<Option<Product>>;
}

/// In-memory catalog used by the binary and by tests. A deployment would put
/// a database-backed implementation behind the same trait.
#[derive(Default)]
pub struct InMemoryCatalog {
    products: DashMap<String, Product>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&self, mut product: Product) {
        product.normalize_tags();
        self.products.insert(product.id.clone(), product);
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    fn matches(product: &Product, filter: &CatalogFilter) -> bool {
        if !product.is_active {
            return false;
        }
        if filter.exclude_ids.contains(&product.id) {
            return false;
        }
        if let Some(category) = &product.category {
            if filter.exclude_categories.contains(category) {
                return false;
            }
        }
        if let Some(categories) = &filter.categories {
            match &product.category {
                Some(category) if categories.contains(category) => {}
                _ => return false,
            }
        }
        if let Some(tags) = &filter.any_tags {
            if !tags.iter().any(|t| product.tags.contains(t)) {
                return false;
            }
        }
        if let Some((min, max)) = filter.price_range {
            if product.price < min || product.price > max {
                return false;
            }
        }
        true
    }
}

#[async_trait]
impl CatalogStore for InMemoryCatalog {
    async fn find(&self, filter: &CatalogFilter, limit: usize) -> StoreResult<Vec<Product>> {
        let mut matched: Vec<Product> = self
            .products
            .iter()
            .filter(|entry| Self::matches(entry.value(), filter))
            .map(|entry| entry.value().clone())
            .collect();

        matched.sort_by(|a, b| {
            b.popularity_score
                .partial_cmp(&a.popularity_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        matched.truncate(limit);

        Ok(matched)
    }

    async fn get(&self, product_id: &str) -> StoreResult<Option<Product>> {
        Ok(self.products.get(product_id).map(|entry| entry.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn product(id: &str, category: &str, price: u64, popularity: f64) -> Product {
        Product {
            id: id.to_string(),
            title: format!("Product {}", id),
            brand: Some("brand".to_string()),
            category: Some(category.to_string()),
            price,
            tags: ["casual"].iter().map(|s| s.to_string()).collect(),
            popularity_score: popularity,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_find_orders_by_popularity_then_id() {
        let catalog = InMemoryCatalog::new();
        catalog.upsert(product("b", "tops", 1000, 0.5));
        catalog.upsert(product("a", "tops", 1000, 0.5));
        catalog.upsert(product("c", "tops", 1000, 0.9));

        let found = catalog.find(&CatalogFilter::default(), 10).await.unwrap();
        let ids: Vec<&str> = found.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }

    #[tokio::test]
    async fn test_find_applies_exclusions_and_price_range() {
        let catalog = InMemoryCatalog::new();
        catalog.upsert(product("p1", "tops", 1000, 0.5));
        catalog.upsert(product("p2", "tops", 9000, 0.5));
        catalog.upsert(product("p3", "shoes", 2000, 0.5));

        let mut inactive = product("p4", "tops", 1500, 0.9);
        inactive.is_active = false;
        catalog.upsert(inactive);

        let filter = CatalogFilter {
            price_range: Some((500, 5000)),
            exclude_ids: ["p3"].iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        };

        let found = catalog.find(&filter, 10).await.unwrap();
        let ids: Vec<&str> = found.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["p1"]);
    }

    #[tokio::test]
    async fn test_find_matches_any_tag() {
        let catalog = InMemoryCatalog::new();
        let mut tagged = product("p1", "tops", 1000, 0.5);
        tagged.tags = ["minimalist", "linen"].iter().map(|s| s.to_string()).collect();
        catalog.upsert(tagged);
        catalog.upsert(product("p2", "tops", 1000, 0.9));

        let filter = CatalogFilter {
            any_tags: Some(vec!["minimalist".to_string()]),
            ..Default::default()
        };

        let found = catalog.find(&filter, 10).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "p1");
    }

    #[tokio::test]
    async fn test_find_excludes_shifted_categories() {
        let catalog = InMemoryCatalog::new();
        catalog.upsert(product("p1", "tops", 1000, 0.5));
        catalog.upsert(product("p2", "shoes", 1000, 0.5));

        let filter = CatalogFilter {
            exclude_categories: vec!["tops".to_string()],
            ..Default::default()
        };

        let found = catalog.find(&filter, 10).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "p2");
    }
}
