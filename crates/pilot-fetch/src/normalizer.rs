//! Maps the scraper's raw item JSON onto [`ProductFact`].
//!
//! Field names drift between the scraper's two actors and across scraper
//! versions (`countReview` vs `reviewCount`, `imageUrlList` vs `images`,
//! `features` vs the older `bulletPoints`, `salesRank`/`salesRankCategory`
//! for BSR). `normalize` tries the current name first and falls back to the
//! older one, so a field is only ever missing if the scraper genuinely
//! didn't report it.

use chrono::Utc;
use serde_json::Value;

use crate::ProductFact;
use crate::ProviderError;

fn str_field(v: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|k| v.get(*k))
        .and_then(|x| x.as_str())
        .map(|s| s.to_string())
}

fn f64_field(v: &Value, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|k| v.get(*k)).and_then(|x| x.as_f64())
}

fn i64_field(v: &Value, keys: &[&str]) -> Option<i64> {
    keys.iter().find_map(|k| v.get(*k)).and_then(|x| x.as_i64())
}

fn bool_field(v: &Value, keys: &[&str]) -> bool {
    keys.iter()
        .find_map(|k| v.get(*k))
        .and_then(|x| x.as_bool())
        .unwrap_or(false)
}

fn string_list_field(v: &Value, keys: &[&str]) -> Vec<String> {
    keys.iter()
        .find_map(|k| v.get(*k))
        .and_then(|x| x.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|item| item.as_str().map(|s| s.to_string()))
                .collect()
        })
        .unwrap_or_default()
}

/// Normalize one raw scraper item. Tolerant of missing optional fields;
/// only `asin` is mandatory, matching the original's per-item skip-on-error
/// behavior (a missing ASIN means the item is unusable at all).
pub fn normalize(raw: &Value) -> Result<ProductFact, ProviderError> {
    let asin = str_field(raw, &["asin"])
        .ok_or_else(|| ProviderError::Malformed("missing asin field".to_string()))?;

    let title = str_field(raw, &["title"]).unwrap_or_default();
    let bullet_points = {
        let features = string_list_field(raw, &["features"]);
        if features.is_empty() {
            string_list_field(raw, &["bulletPoints"])
        } else {
            features
        }
    };

    Ok(ProductFact {
        asin,
        title,
        brand: str_field(raw, &["brand"]),
        category: str_field(raw, &["category"]),
        description: str_field(raw, &["description"]),
        bullet_points,
        images: string_list_field(raw, &["imageUrlList", "images"]),
        price: f64_field(raw, &["price"]),
        currency: str_field(raw, &["currency"]).unwrap_or_else(|| "USD".to_string()),
        rating: f64_field(raw, &["rating"]),
        review_count: i64_field(raw, &["countReview", "reviewCount"]),
        bsr: i64_field(raw, &["salesRank"]),
        bsr_category: str_field(raw, &["salesRankCategory"]),
        // Never derived from `price` — Buy Box data, when the scraper
        // reports it at all, arrives under its own field.
        buy_box_price: f64_field(raw, &["buyBoxPrice"]),
        seller: str_field(raw, &["soldBy"]),
        availability: str_field(raw, &["warehouseAvailability"]),
        prime: bool_field(raw, &["prime"]),
        scraped_at: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn normalizes_current_field_names() {
        let raw = json!({
            "asin": "B08N5WRWNW",
            "title": "Echo Dot",
            "countReview": 42,
            "imageUrlList": ["https://a/1.jpg"],
            "features": ["Voice control"],
            "salesRank": 100,
            "salesRankCategory": "Electronics",
            "soldBy": "Amazon.com",
            "warehouseAvailability": "In Stock",
            "prime": true,
            "price": 49.99,
        });
        let fact = normalize(&raw).unwrap();
        assert_eq!(fact.review_count, Some(42));
        assert_eq!(fact.images, vec!["https://a/1.jpg".to_string()]);
        assert_eq!(fact.bullet_points, vec!["Voice control".to_string()]);
        assert_eq!(fact.bsr, Some(100));
        assert_eq!(fact.seller.as_deref(), Some("Amazon.com"));
        assert!(fact.prime);
        assert_eq!(fact.buy_box_price, None);
    }

    #[test]
    fn falls_back_to_older_field_names() {
        let raw = json!({
            "asin": "B08N5WRWNW",
            "bulletPoints": ["Old-style bullet"],
            "reviewCount": 7,
        });
        let fact = normalize(&raw).unwrap();
        assert_eq!(fact.bullet_points, vec!["Old-style bullet".to_string()]);
        assert_eq!(fact.review_count, Some(7));
    }

    #[test]
    fn missing_asin_is_malformed() {
        let raw = json!({"title": "No ASIN here"});
        assert!(normalize(&raw).is_err());
    }
}
