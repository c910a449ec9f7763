//! Contact form intake: store the message, list for the back office.

use crate::{
    db::DbPool,
    entities::contact_message::{self, Entity as ContactMessage},
    errors::ServiceError,
    events::{Event, EventSender},
};
use sea_orm::{ActiveModelTrait, EntityTrait, NotSet, PaginatorTrait, QueryOrder, Set};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct NewContactMessage {
    #[validate(length(min = 1, max = 255, message = "Name is required"))]
    pub name: String,
    #[validate(email(message = "A valid email is required"))]
    pub email: String,
    pub subject: Option<String>,
    #[validate(length(min = 1, message = "Message is required"))]
    pub message: String,
}

#[derive(Clone)]
pub struct ContactService {
    db: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl ContactService {
    pub fn new(db: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    #[instrument(skip(self, input))]
    pub async fn submit(
        &self,
        input: NewContactMessage,
    ) -> Result<contact_message::Model, ServiceError> {
        input
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        let message = contact_message::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(input.name),
            email: Set(input.email),
            subject: Set(input.subject),
            message: Set(input.message),
            created_at: NotSet,
        }
        .insert(&*self.db)
        .await?;

        self.event_sender
            .send_or_log(Event::ContactMessageReceived(message.id))
            .await;
        info!(message_id = %message.id, "Contact message received");
        Ok(message)
    }

    /// Back-office listing, newest first.
    #[instrument(skip(self))]
    pub async fn list(
        &self,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<contact_message::Model>, u64), ServiceError> {
        let paginator = ContactMessage::find()
            .order_by_desc(contact_message::Column::CreatedAt)
            .paginate(&*self.db, per_page);

        let total = paginator.num_items().await?;
        let messages = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((messages, total))
    }
}
