//! Account profiles: contact/address defaults and the research context
//! with its research-use attestation. Reads are cached per user; every
//! upsert deletes the cached bundle.

use crate::{
    cache::TtlCache,
    db::DbPool,
    entities::research_profile::{self, Entity as ResearchProfile},
    entities::user_profile::{self, Entity as UserProfile},
    errors::ServiceError,
    events::{Event, EventSender},
};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, NotSet, QueryFilter, Set};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

fn profile_cache_key(user_id: &str) -> String {
    format!("profile_{}", user_id)
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct UpsertUserProfile {
    #[validate(email(message = "A valid email is required"))]
    pub email: String,
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub default_shipping_address: Option<serde_json::Value>,
    pub default_billing_address: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UpsertResearchProfile {
    pub institution_name: Option<String>,
    pub institution_type: Option<String>,
    pub field_of_study: Option<String>,
    pub intended_use: Option<String>,
    pub research_use_attested: bool,
}

/// Both halves of a user's account, the shape the profile endpoint serves.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ProfileBundle {
    pub user_profile: Option<user_profile::Model>,
    pub research_profile: Option<research_profile::Model>,
}

#[derive(Clone)]
pub struct ProfileService {
    db: Arc<DbPool>,
    event_sender: Arc<EventSender>,
    cache: TtlCache,
}

impl ProfileService {
    pub fn new(db: Arc<DbPool>, event_sender: Arc<EventSender>, cache: TtlCache) -> Self {
        Self {
            db,
            event_sender,
            cache,
        }
    }

    /// Both profiles for a user, cached. Either half may be absent; that
    /// is a valid state for a fresh account, not an error.
    #[instrument(skip(self))]
    pub async fn get_profile(&self, user_id: &str) -> Result<ProfileBundle, ServiceError> {
        let key = profile_cache_key(user_id);
        if let Some(bundle) = self.cache.get_json::<ProfileBundle>(&key).await? {
            return Ok(bundle);
        }

        let user_profile = UserProfile::find()
            .filter(user_profile::Column::UserId.eq(user_id))
            .one(&*self.db)
            .await?;
        let research_profile = ResearchProfile::find()
            .filter(research_profile::Column::UserId.eq(user_id))
            .one(&*self.db)
            .await?;

        let bundle = ProfileBundle {
            user_profile,
            research_profile,
        };
        self.cache.set_json(&key, &bundle, None).await?;
        Ok(bundle)
    }

    /// Creates or updates the contact half of a profile.
    #[instrument(skip(self, input))]
    pub async fn upsert_user_profile(
        &self,
        user_id: &str,
        input: UpsertUserProfile,
    ) -> Result<user_profile::Model, ServiceError> {
        if user_id.is_empty() {
            return Err(ServiceError::ValidationError(
                "User id is required".to_string(),
            ));
        }
        input
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        let existing = UserProfile::find()
            .filter(user_profile::Column::UserId.eq(user_id))
            .one(&*self.db)
            .await?;

        let shipping = input.default_shipping_address.map(|v| v.to_string());
        let billing = input.default_billing_address.map(|v| v.to_string());

        let saved = match existing {
            Some(profile) => {
                let mut active: user_profile::ActiveModel = profile.into();
                active.email = Set(input.email);
                active.full_name = Set(input.full_name);
                active.phone = Set(input.phone);
                active.default_shipping_address = Set(shipping);
                active.default_billing_address = Set(billing);
                active.update(&*self.db).await?
            }
            None => {
                let active = user_profile::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    user_id: Set(user_id.to_string()),
                    email: Set(input.email),
                    full_name: Set(input.full_name),
                    phone: Set(input.phone),
                    default_shipping_address: Set(shipping),
                    default_billing_address: Set(billing),
                    created_at: NotSet,
                    updated_at: NotSet,
                };
                active.insert(&*self.db).await?
            }
        };

        self.invalidate_profile(user_id).await;
        self.event_sender
            .send_or_log(Event::ProfileUpdated {
                user_id: user_id.to_string(),
            })
            .await;
        info!(user_id = %user_id, "User profile saved");
        Ok(saved)
    }

    /// Creates or updates the research half of a profile. The attestation
    /// flag gates checkout, so flipping it off is allowed but consequential.
    #[instrument(skip(self, input))]
    pub async fn upsert_research_profile(
        &self,
        user_id: &str,
        input: UpsertResearchProfile,
    ) -> Result<research_profile::Model, ServiceError> {
        if user_id.is_empty() {
            return Err(ServiceError::ValidationError(
                "User id is required".to_string(),
            ));
        }

        let existing = ResearchProfile::find()
            .filter(research_profile::Column::UserId.eq(user_id))
            .one(&*self.db)
            .await?;

        let saved = match existing {
            Some(profile) => {
                let mut active: research_profile::ActiveModel = profile.into();
                active.institution_name = Set(input.institution_name);
                active.institution_type = Set(input.institution_type);
                active.field_of_study = Set(input.field_of_study);
                active.intended_use = Set(input.intended_use);
                active.research_use_attested = Set(input.research_use_attested);
                active.update(&*self.db).await?
            }
            None => {
                let active = research_profile::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    user_id: Set(user_id.to_string()),
                    institution_name: Set(input.institution_name),
                    institution_type: Set(input.institution_type),
                    field_of_study: Set(input.field_of_study),
                    intended_use: Set(input.intended_use),
                    research_use_attested: Set(input.research_use_attested),
                    created_at: NotSet,
                    updated_at: NotSet,
                };
                active.insert(&*self.db).await?
            }
        };

        self.invalidate_profile(user_id).await;
        self.event_sender
            .send_or_log(Event::ProfileUpdated {
                user_id: user_id.to_string(),
            })
            .await;
        info!(user_id = %user_id, attested = saved.research_use_attested, "Research profile saved");
        Ok(saved)
    }

    async fn invalidate_profile(&self, user_id: &str) {
        if let Err(e) = self.cache.delete(&profile_cache_key(user_id)).await {
            warn!(user_id = %user_id, error = %e, "Failed to invalidate profile cache");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_cache_key_is_per_user() {
        assert_eq!(profile_cache_key("user-1"), "profile_user-1");
        assert_ne!(profile_cache_key("user-1"), profile_cache_key("user-2"));
    }

    #[test]
    fn empty_bundle_round_trips_as_json() {
        let bundle = ProfileBundle {
            user_profile: None,
            research_profile: None,
        };
        let json = serde_json::to_string(&bundle).unwrap();
        let back: ProfileBundle = serde_json::from_str(&json).unwrap();
        assert!(back.user_profile.is_none());
        assert!(back.research_profile.is_none());
    }
}
