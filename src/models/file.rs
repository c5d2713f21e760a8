use serde::{Serialize, Deserialize};
use chrono::{DateTime, Utc};
use uuid::Uuid;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct File {
    pub id: Uuid,
    pub owner_id: String,
    pub collection_id: Option<Uuid>,
    /// Blob store address. Internal only.
    #[serde(skip_serializing, default)]
    pub storage_key: String,
    pub display_name: String,
    pub size_bytes: u64,
    pub content_type: String,
    pub uploaded_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_key_is_not_serialized() {
        let now = Utc::now();
        let f = File {
            id: Uuid::new_v4(),
            owner_id: "user_1".into(),
            collection_id: None,
            storage_key: "user_1:1:secret.txt".into(),
            display_name: "secret.txt".into(),
            size_bytes: 3,
            content_type: "text/plain".into(),
            uploaded_at: now,
            created_at: now,
            updated_at: now,
        };
        let v = serde_json::to_value(&f).unwrap();
        assert!(v.get("storage_key").is_none());
        assert_eq!(v["display_name"], "secret.txt");
        assert!(v["collection_id"].is_null());
    }
}
