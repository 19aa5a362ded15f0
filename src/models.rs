use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct InfoQuery {
    pub url: Option<String>,
}

#[derive(Debug, Serialize, Clone)]
pub struct StreamVariant {
    pub label: String,
    pub ext: String,
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct VideoSummary {
    pub title: String,
    pub duration: Option<u64>,
    pub thumbnail: String,
    pub formats: Vec<StreamVariant>,
    pub audios: Vec<StreamVariant>,
}
