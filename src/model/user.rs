use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A human participant referenced by messages when `senderUserId` is
/// supplied.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub external_id: Option<String>,
    pub email: Option<String>,
    pub name: Option<String>,
    pub metadata: HashMap<String, serde_json::Value>,
}
