use serde::{Deserialize, Serialize};

/// The profile document stored at `/users/{uid}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub username: String,
    #[serde(default)]
    pub bio: String,
    #[serde(rename = "photoURL", default)]
    pub photo_url: String,
    /// Shown in this order on the public page
    #[serde(default)]
    pub links: Vec<Link>,
    #[serde(default)]
    pub published: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    #[serde(default)]
    pub icon: LinkIcon,
    pub title: String,
    pub url: String,
}

/// Which icon a link is rendered with
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkIcon {
    Twitter,
    YouTube,
    TikTok,
    GitHub,
    LinkedIn,
    #[default]
    #[serde(other)]
    Custom,
}
