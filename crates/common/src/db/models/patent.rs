//! Patent entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "patent")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub publication_number: String,

    pub publication_date: Option<Date>,

    /// Comma separated ids this patent cites
    #[sea_orm(column_type = "Text", nullable)]
    pub backward_citations: Option<String>,

    /// Comma separated ids citing this patent
    #[sea_orm(column_type = "Text", nullable)]
    pub forward_citations: Option<String>,

    #[sea_orm(column_name = "abstract", column_type = "Text", nullable)]
    pub abstract_text: Option<String>,

    /// Whether the applicant is a listed company
    pub listed_company: Option<bool>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_one = "super::partition::Entity")]
    Partition,

    #[sea_orm(has_one = "super::cd_index::Entity")]
    CdIndex,
}

impl Related<super::partition::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Partition.def()
    }
}

impl Related<super::cd_index::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CdIndex.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
