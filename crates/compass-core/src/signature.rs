//! Canonical fingerprint of the profile fields that feed retrieval context.
//!
//! Two snapshots that differ only in fields the retrieval index never sees
//! (avatar, phone number, timestamps) produce the same signature. Any other
//! difference produces a different one.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use sha2::{Digest, Sha256};

use crate::models::ProfileSnapshot;

/// SHA-256 of the canonical profile form, hex encoded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProfileSignature(String);

impl ProfileSignature {
    pub fn of(snapshot: &ProfileSnapshot) -> Self {
        let canonical = canonical_form(snapshot).to_string();
        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 hex characters, for log lines.
    pub fn short(&self) -> &str {
        &self.0[..12]
    }
}

impl fmt::Display for ProfileSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Order-independent JSON form of the signature-relevant fields.
///
/// Object keys serialize sorted (serde_json maps are ordered), list-valued
/// fields are sorted here. Duplicates are kept, so a repeated entry is a
/// change.
pub fn canonical_form(snapshot: &ProfileSnapshot) -> JsonValue {
    let user = &snapshot.user;

    let preferences = snapshot.preferences.as_ref().map(|p| {
        let mut fields = p.fields_of_interest.clone();
        fields.sort();
        json!({
            "applying_for": p.applying_for,
            "fields_of_interest": fields,
            "preferred_ranking_min": p.preferred_ranking_min,
            "preferred_ranking_max": p.preferred_ranking_max,
            "need_financial_aid": p.need_financial_aid,
        })
    });

    let mut saved = snapshot.saved_university_ids.clone();
    saved.sort_unstable();

    json!({
        "identity": {
            "id": user.id,
            "username": user.username,
            "email": user.email,
            "first_name": user.first_name,
            "last_name": user.last_name,
        },
        "preferences": preferences,
        "academic_info": snapshot.academic_info,
        "saved_university_ids": saved,
    })
}
