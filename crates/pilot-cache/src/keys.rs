//! Key builders for the three-key namespace in spec §4.6.

use uuid::Uuid;

const NAMESPACE: &str = "amazon_pilot";

pub fn product_data_key(product_id: Uuid) -> String {
    format!("{NAMESPACE}:product_data:{product_id}")
}

pub fn price_key(product_id: Uuid) -> String {
    format!("{NAMESPACE}:price:{product_id}")
}

pub fn ranking_key(product_id: Uuid) -> String {
    format!("{NAMESPACE}:ranking:{product_id}")
}

/// List-of-tracked-product-ids view for a user, matching the original's
/// `UserTrackedPrefix`. Invalidated on both track and untrack.
pub fn user_tracked_key(user_id: Uuid) -> String {
    format!("{NAMESPACE}:user_tracked:{user_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_use_documented_prefixes() {
        let id = Uuid::nil();
        assert_eq!(product_data_key(id), format!("amazon_pilot:product_data:{id}"));
        assert_eq!(price_key(id), format!("amazon_pilot:price:{id}"));
        assert_eq!(ranking_key(id), format!("amazon_pilot:ranking:{id}"));
        assert_eq!(user_tracked_key(id), format!("amazon_pilot:user_tracked:{id}"));
    }
}
