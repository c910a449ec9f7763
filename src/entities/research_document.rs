use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, Set};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Research documentation published for a product: certificates of analysis,
/// technical data sheets, safety data sheets and third-party testing reports.
/// The structured body lives in `payload` as a tagged JSON document; the
/// `category` column is denormalized from the payload tag for filtering.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[schema(as = ResearchDocument)]
#[sea_orm(table_name = "research_documents")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub product_id: Uuid,
    pub category: DocumentCategory,
    pub title: String,
    /// Set for certificates of analysis, used for batch lookups
    pub batch_number: Option<String>,
    pub payload: Json,
    pub published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Model {
    /// Decode the tagged payload body.
    pub fn decoded_payload(&self) -> Result<DocumentPayload, serde_json::Error> {
        serde_json::from_value(self.payload.clone())
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::product::Entity",
        from = "Column::ProductId",
        to = "super::product::Column::Id"
    )]
    Product,
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C: ConnectionTrait>(self, _db: &C, _insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut active_model = self;
        let now = Utc::now();
        if let ActiveValue::NotSet = active_model.created_at {
            active_model.created_at = Set(now);
        }
        active_model.updated_at = Set(now);
        Ok(active_model)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(30))")]
#[serde(rename_all = "snake_case")]
pub enum DocumentCategory {
    #[sea_orm(string_value = "coa")]
    #[serde(rename = "coa")]
    CertificateOfAnalysis,
    #[sea_orm(string_value = "technical_data_sheet")]
    TechnicalDataSheet,
    #[sea_orm(string_value = "safety_data_sheet")]
    SafetyDataSheet,
    #[sea_orm(string_value = "testing_report")]
    TestingReport,
}

/// Structured document body, tagged by `kind`. Each category has its own
/// required fields; a payload is only accepted when its kind matches the
/// document's category column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DocumentPayload {
    CertificateOfAnalysis {
        batch_number: String,
        purity_percent: String,
        test_results: Vec<TestResult>,
    },
    TechnicalDataSheet {
        solubility: String,
        storage: String,
        reconstitution: Option<String>,
    },
    SafetyDataSheet {
        hazard_statements: Vec<String>,
        ppe: Vec<String>,
        first_aid: String,
    },
    TestingReport {
        lab: String,
        method: String,
        result_summary: String,
    },
}

/// One assay line in a certificate of analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TestResult {
    pub analyte: String,
    pub method: String,
    pub specification: String,
    pub result: String,
}

impl DocumentPayload {
    /// The category this payload variant belongs to.
    pub fn category(&self) -> DocumentCategory {
        match self {
            DocumentPayload::CertificateOfAnalysis { .. } => DocumentCategory::CertificateOfAnalysis,
            DocumentPayload::TechnicalDataSheet { .. } => DocumentCategory::TechnicalDataSheet,
            DocumentPayload::SafetyDataSheet { .. } => DocumentCategory::SafetyDataSheet,
            DocumentPayload::TestingReport { .. } => DocumentCategory::TestingReport,
        }
    }

    /// Batch number carried by the payload, when the variant has one.
    pub fn batch_number(&self) -> Option<&str> {
        match self {
            DocumentPayload::CertificateOfAnalysis { batch_number, .. } => Some(batch_number),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_kind_tag_round_trips() {
        let payload = DocumentPayload::CertificateOfAnalysis {
            batch_number: "B-2024-117".to_string(),
            purity_percent: "99.3".to_string(),
            test_results: vec![TestResult {
                analyte: "Peptide content".to_string(),
                method: "HPLC-UV".to_string(),
                specification: ">= 99.0%".to_string(),
                result: "99.3%".to_string(),
            }],
        };

        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["kind"], "certificate_of_analysis");

        let decoded: DocumentPayload = serde_json::from_value(json).unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn payload_reports_its_category() {
        let payload = DocumentPayload::SafetyDataSheet {
            hazard_statements: vec!["H315".to_string()],
            ppe: vec!["Nitrile gloves".to_string()],
            first_aid: "Rinse with water".to_string(),
        };
        assert_eq!(payload.category(), DocumentCategory::SafetyDataSheet);
        assert_eq!(payload.batch_number(), None);
    }
}
