use serde::{Deserialize, Serialize};

/// A room: a named group of metadevice ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: String,
    pub friendly_name: String,
    pub children: Vec<String>,
}
