//! Research documents: certificates of analysis, technical and safety data
//! sheets and third-party testing reports, one table with a category tag
//! and a schema-checked JSON payload.
//!
//! Payloads are validated when a document is created. A row that reaches
//! the database always decodes; render paths never discover a malformed
//! payload.

use crate::{
    db::DbPool,
    entities::product::Entity as Product,
    entities::research_document::{
        self, DocumentCategory, DocumentPayload, Entity as ResearchDocument,
    },
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use sea_orm::{
    ActiveEnum, ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NewDocument {
    pub product_id: Uuid,
    pub title: String,
    /// Tagged payload; its kind decides the document category
    pub payload: DocumentPayload,
    #[serde(default)]
    pub published: bool,
}

#[derive(Clone)]
pub struct DocumentService {
    db: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl DocumentService {
    pub fn new(db: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Creates a document. The category and batch number come from the
    /// payload itself; a payload missing its required content is rejected
    /// here, before anything is stored.
    #[instrument(skip(self, input), fields(product_id = %input.product_id))]
    pub async fn create_document(
        &self,
        input: NewDocument,
    ) -> Result<research_document::Model, ServiceError> {
        if input.title.trim().is_empty() {
            return Err(ServiceError::ValidationError(
                "Document title is required".to_string(),
            ));
        }
        validate_payload(&input.payload)?;

        Product::find_by_id(input.product_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Product {} not found", input.product_id))
            })?;

        let category = input.payload.category();
        let batch_number = input.payload.batch_number().map(str::to_string);
        let payload_json = serde_json::to_value(&input.payload)
            .map_err(|e| ServiceError::SerializationError(e.to_string()))?;

        let now = Utc::now();
        let document = research_document::ActiveModel {
            id: Set(Uuid::new_v4()),
            product_id: Set(input.product_id),
            category: Set(category),
            title: Set(input.title),
            batch_number: Set(batch_number),
            payload: Set(payload_json),
            published: Set(input.published),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let created = document.insert(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::DocumentCreated {
                document_id: created.id,
                category: created.category.to_value(),
            })
            .await;
        info!(document_id = %created.id, "Research document created");
        Ok(created)
    }

    pub async fn get_document(
        &self,
        document_id: Uuid,
    ) -> Result<research_document::Model, ServiceError> {
        ResearchDocument::find_by_id(document_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Document {} not found", document_id)))
    }

    /// Documents attached to a product. The storefront passes
    /// `published_only = true`; back-office listings see everything.
    #[instrument(skip(self))]
    pub async fn list_by_product(
        &self,
        product_id: Uuid,
        published_only: bool,
    ) -> Result<Vec<research_document::Model>, ServiceError> {
        let mut query =
            ResearchDocument::find().filter(research_document::Column::ProductId.eq(product_id));
        if published_only {
            query = query.filter(research_document::Column::Published.eq(true));
        }
        let documents = query
            .order_by_desc(research_document::Column::CreatedAt)
            .all(&*self.db)
            .await?;
        Ok(documents)
    }

    #[instrument(skip(self))]
    pub async fn list_by_category(
        &self,
        category: DocumentCategory,
        published_only: bool,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<research_document::Model>, u64), ServiceError> {
        let mut query =
            ResearchDocument::find().filter(research_document::Column::Category.eq(category));
        if published_only {
            query = query.filter(research_document::Column::Published.eq(true));
        }

        let paginator = query
            .order_by_desc(research_document::Column::CreatedAt)
            .paginate(&*self.db, per_page);

        let total = paginator.num_items().await?;
        let documents = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((documents, total))
    }

    /// Published certificate of analysis for a batch, the lookup buyers
    /// use to verify a vial in hand.
    #[instrument(skip(self))]
    pub async fn find_coa_by_batch(
        &self,
        batch_number: &str,
    ) -> Result<research_document::Model, ServiceError> {
        ResearchDocument::find()
            .filter(research_document::Column::Category.eq(DocumentCategory::CertificateOfAnalysis))
            .filter(research_document::Column::BatchNumber.eq(batch_number))
            .filter(research_document::Column::Published.eq(true))
            .order_by_desc(research_document::Column::CreatedAt)
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!(
                    "No published certificate of analysis for batch {}",
                    batch_number
                ))
            })
    }

    /// Flips the publish flag. Publishing is how a document becomes
    /// visible to the storefront; unpublishing hides it without deletion.
    #[instrument(skip(self))]
    pub async fn set_published(
        &self,
        document_id: Uuid,
        published: bool,
    ) -> Result<research_document::Model, ServiceError> {
        let document = self.get_document(document_id).await?;
        if document.published == published {
            return Ok(document);
        }

        let mut active: research_document::ActiveModel = document.into();
        active.published = Set(published);
        active.updated_at = Set(Utc::now());
        let updated = active.update(&*self.db).await?;
        info!(document_id = %updated.id, published = published, "Document publish flag set");
        Ok(updated)
    }
}

/// Content checks beyond shape: the tagged deserialization already
/// guarantees the right fields exist, this rejects empty ones.
fn validate_payload(payload: &DocumentPayload) -> Result<(), ServiceError> {
    let complaint = match payload {
        DocumentPayload::CertificateOfAnalysis {
            batch_number,
            purity_percent,
            test_results,
        } => {
            if batch_number.trim().is_empty() {
                Some("a certificate of analysis needs a batch number")
            } else if purity_percent.trim().is_empty() {
                Some("a certificate of analysis needs a purity figure")
            } else if test_results.is_empty() {
                Some("a certificate of analysis needs at least one test result")
            } else if test_results.iter().any(|r| r.analyte.trim().is_empty()) {
                Some("every test result needs an analyte")
            } else {
                None
            }
        }
        DocumentPayload::TechnicalDataSheet {
            solubility, storage, ..
        } => {
            if solubility.trim().is_empty() {
                Some("a technical data sheet needs solubility guidance")
            } else if storage.trim().is_empty() {
                Some("a technical data sheet needs storage guidance")
            } else {
                None
            }
        }
        DocumentPayload::SafetyDataSheet {
            hazard_statements,
            first_aid,
            ..
        } => {
            if hazard_statements.iter().all(|h| h.trim().is_empty()) {
                Some("a safety data sheet needs hazard statements")
            } else if first_aid.trim().is_empty() {
                Some("a safety data sheet needs first-aid guidance")
            } else {
                None
            }
        }
        DocumentPayload::TestingReport {
            lab,
            method,
            result_summary,
        } => {
            if lab.trim().is_empty() {
                Some("a testing report needs the lab name")
            } else if method.trim().is_empty() {
                Some("a testing report needs the method")
            } else if result_summary.trim().is_empty() {
                Some("a testing report needs a result summary")
            } else {
                None
            }
        }
    };

    match complaint {
        Some(problem) => Err(ServiceError::ValidationError(format!(
            "Invalid document payload: {}",
            problem
        ))),
        None => Ok(()),
    }
}
