//! Session-held profile snapshot.
//!
//! The snapshot is only ever replaced by a full fetch. Writes go to the
//! Account Service first and are followed by a refetch, which is also what
//! feeds the embedding synchronizer.

use std::collections::BTreeSet;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use compass_core::{
    AcademicInfo, Error, EventBus, Preferences, ProfileApi, ProfileSignature, ProfileSnapshot,
    ProfileUpdate, Result, SessionEvent, UploadFile, ValidationError,
};

use crate::action::ActionState;
use crate::profile_sync::ProfileEmbeddingSynchronizer;

/// Avatar uploads accept images only.
const AVATAR_EXTENSIONS: &[&str] = &[".jpg", ".jpeg", ".png", ".gif"];

pub struct ProfileStore {
    api: Arc<dyn ProfileApi>,
    synchronizer: ProfileEmbeddingSynchronizer,
    events: EventBus,
    snapshot: RwLock<Option<ProfileSnapshot>>,
    /// Saved universities as shown to the user, including optimistic
    /// toggles not yet confirmed by a refetch.
    saved: RwLock<BTreeSet<i64>>,
    action: ActionState,
}

impl ProfileStore {
    pub fn new(
        api: Arc<dyn ProfileApi>,
        synchronizer: ProfileEmbeddingSynchronizer,
        events: EventBus,
    ) -> Self {
        Self {
            api,
            synchronizer,
            events,
            snapshot: RwLock::new(None),
            saved: RwLock::new(BTreeSet::new()),
            action: ActionState::new(),
        }
    }

    /// Fetch the profile and replace the snapshot.
    pub async fn load(&self) -> Result<ProfileSnapshot> {
        self.action.track("load_profile", self.refetch()).await
    }

    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<ProfileSnapshot> {
        if update.is_empty() {
            return Err(ValidationError::Field {
                field: "profile",
                reason: "no fields to update".to_string(),
            }
            .into());
        }
        self.action
            .track("update_profile", async {
                self.api.update_profile(update).await?;
                self.refetch().await
            })
            .await
    }

    pub async fn update_preferences(&self, preferences: &Preferences) -> Result<ProfileSnapshot> {
        preferences.validate()?;
        self.action
            .track("update_preferences", async {
                self.api.update_preferences(preferences).await?;
                self.refetch().await
            })
            .await
    }

    pub async fn update_academic_info(&self, info: &AcademicInfo) -> Result<ProfileSnapshot> {
        info.validate()?;
        self.action
            .track("update_academic_info", async {
                self.api.update_academic_info(info).await?;
                self.refetch().await
            })
            .await
    }

    pub async fn delete_academic_info(&self) -> Result<ProfileSnapshot> {
        self.action
            .track("delete_academic_info", async {
                self.api.delete_academic_info().await?;
                self.refetch().await
            })
            .await
    }

    /// Replace the avatar. Does not affect the signature.
    pub async fn upload_avatar(&self, file: &UploadFile) -> Result<ProfileSnapshot> {
        match file.extension() {
            Some(ext) if AVATAR_EXTENSIONS.contains(&ext.as_str()) => {}
            other => {
                return Err(ValidationError::ExtensionNotAllowed {
                    extension: other.unwrap_or_else(|| "(none)".to_string()),
                    allowed: AVATAR_EXTENSIONS.join(", "),
                }
                .into())
            }
        }
        if file.content.is_empty() {
            return Err(ValidationError::EmptyFile.into());
        }
        self.action
            .track("upload_avatar", async {
                self.api.upload_avatar(file).await?;
                self.refetch().await
            })
            .await
    }

    /// Flip the saved state of a university.
    ///
    /// The saved set changes immediately and is rolled back only if the
    /// server rejects the toggle. An accepted toggle is followed by a
    /// refetch, since saved references are part of the signature; if that
    /// refetch fails the server's answer is kept and the error recorded.
    pub async fn toggle_saved(&self, university_id: i64) -> Result<bool> {
        if self.snapshot.read().await.is_none() {
            return Err(Error::NotReady("profile not loaded".to_string()));
        }

        let optimistic = {
            let mut saved = self.saved.write().await;
            if !saved.remove(&university_id) {
                saved.insert(university_id);
                true
            } else {
                false
            }
        };
        debug!(university_id, saved = optimistic, "Saved university toggled locally");

        self.action
            .track("toggle_saved_university", async {
                let toggle = match self.api.toggle_saved_university(university_id).await {
                    Ok(toggle) => toggle,
                    Err(e) => {
                        self.set_saved(university_id, !optimistic).await;
                        warn!(university_id, error = %e, "Saved university toggle failed, rolled back");
                        return Err(e);
                    }
                };
                self.set_saved(university_id, toggle.saved).await;
                if let Err(e) = self.refetch().await {
                    warn!(university_id, error = %e, "Profile refetch after saved toggle failed");
                    return Err(e);
                }
                Ok(toggle.saved)
            })
            .await
    }

    async fn set_saved(&self, university_id: i64, value: bool) {
        let mut saved = self.saved.write().await;
        if value {
            saved.insert(university_id);
        } else {
            saved.remove(&university_id);
        }
    }

    pub async fn snapshot(&self) -> Option<ProfileSnapshot> {
        self.snapshot.read().await.clone()
    }

    pub async fn is_loaded(&self) -> bool {
        self.snapshot.read().await.is_some()
    }

    pub async fn is_saved(&self, university_id: i64) -> bool {
        self.saved.read().await.contains(&university_id)
    }

    pub async fn saved_university_ids(&self) -> Vec<i64> {
        self.saved.read().await.iter().copied().collect()
    }

    pub fn action(&self) -> &ActionState {
        &self.action
    }

    pub fn synchronizer(&self) -> &ProfileEmbeddingSynchronizer {
        &self.synchronizer
    }

    /// Drop the snapshot (logout).
    pub async fn clear(&self) {
        *self.snapshot.write().await = None;
        self.saved.write().await.clear();
    }

    async fn refetch(&self) -> Result<ProfileSnapshot> {
        let snapshot = self.api.fetch_profile().await?;
        let signature = ProfileSignature::of(&snapshot);

        *self.saved.write().await = snapshot.saved_university_ids.iter().copied().collect();
        *self.snapshot.write().await = Some(snapshot.clone());
        info!(signature = signature.short(), "Profile loaded");
        self.events.emit(SessionEvent::ProfileLoaded {
            signature: signature.to_string(),
        });

        self.synchronizer.observe(&snapshot).await;
        Ok(snapshot)
    }
}
