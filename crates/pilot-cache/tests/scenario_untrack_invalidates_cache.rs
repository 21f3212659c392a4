//! Scenario E6 (spec §8): untracking a product invalidates its
//! `product_data` projection and the tracking user's `user_tracked` list,
//! while leaving the `price`/`ranking` projections (which other users
//! tracking the same product still rely on) untouched.
//!
//! Requires a live Redis instance reachable via REDIS_ADDR.

use pilot_cache::{price_key, product_data_key, ranking_key, user_tracked_key, CacheLayer};
use std::time::Duration;
use uuid::Uuid;

#[tokio::test]
#[ignore = "requires REDIS_ADDR; run: REDIS_ADDR=127.0.0.1:6379 cargo test -p pilot-cache -- --include-ignored"]
async fn untrack_clears_product_data_and_user_tracked_but_not_price_or_ranking() {
    let addr = std::env::var("REDIS_ADDR").expect("REDIS_ADDR required");
    let cache = CacheLayer::connect(&addr, 0).await.expect("connect redis");

    let product_id = Uuid::new_v4();
    let user_id = Uuid::new_v4();
    let ttl = Duration::from_secs(60);

    cache.set_json(&product_data_key(product_id), &"product-json", ttl).await;
    cache.set_json(&price_key(product_id), &42.0, ttl).await;
    cache.set_json(&ranking_key(product_id), &7i64, ttl).await;
    cache.set_json(&user_tracked_key(user_id), &vec![product_id.to_string()], ttl).await;

    cache.invalidate_on_untrack(product_id, user_id).await;

    assert_eq!(cache.get_json::<String>(&product_data_key(product_id)).await, None);
    assert_eq!(cache.get_json::<Vec<String>>(&user_tracked_key(user_id)).await, None);
    assert_eq!(cache.get_json::<f64>(&price_key(product_id)).await, Some(42.0));
    assert_eq!(cache.get_json::<i64>(&ranking_key(product_id)).await, Some(7));
}
