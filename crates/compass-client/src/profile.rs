//! Profile endpoints.

use async_trait::async_trait;
use reqwest::multipart::Form;
use serde::Deserialize;
use tracing::debug;

use compass_core::{
    AcademicInfo, Preferences, ProfileApi, ProfileSnapshot, ProfileUpdate, Result, SavedToggle,
    UploadFile,
};

use crate::client::CompassClient;
use crate::form::file_part;

#[derive(Debug, Deserialize)]
struct SavedIds {
    #[serde(default)]
    saved_university_ids: Vec<i64>,
}

#[async_trait]
impl ProfileApi for CompassClient {
    async fn fetch_profile(&self) -> Result<ProfileSnapshot> {
        let mut profile: ProfileSnapshot = self.get_json("/api/profile/").await?;
        let saved: SavedIds = self.get_json("/api/universities/saved_ids/").await?;
        profile.saved_university_ids = saved.saved_university_ids;
        debug!(
            user_id = profile.user.id,
            saved = profile.saved_university_ids.len(),
            "Fetched profile"
        );
        Ok(profile)
    }

    async fn update_profile(&self, update: &ProfileUpdate) -> Result<()> {
        self.patch_json("/api/profile/", update).await
    }

    async fn update_preferences(&self, preferences: &Preferences) -> Result<()> {
        self.patch_json("/api/preferences/", preferences).await
    }

    async fn update_academic_info(&self, info: &AcademicInfo) -> Result<()> {
        self.patch_json("/api/academic-info/", info).await
    }

    async fn delete_academic_info(&self) -> Result<()> {
        self.delete("/api/academic-info/").await
    }

    async fn upload_avatar(&self, file: &UploadFile) -> Result<()> {
        let url = self.config().url("/api/profile/");
        self.send(|http| http.patch(&url).multipart(Form::new().part("avatar", file_part(file))))
            .await?;
        Ok(())
    }

    async fn toggle_saved_university(&self, university_id: i64) -> Result<SavedToggle> {
        let path = format!("/api/universities/{}/toggle_save/", university_id);
        self.post_json(&path, &serde_json::json!({})).await
    }
}
