//! Partition result entity
//!
//! One row per focal patent; each set is stored as a sorted comma separated list.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "extended_info")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub publication_number: String,

    #[sea_orm(column_type = "Text")]
    pub b1f0_patents: String,

    #[sea_orm(column_type = "Text")]
    pub b1f1_patents: String,

    #[sea_orm(column_type = "Text")]
    pub b0f1_patents: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::patent::Entity",
        from = "Column::PublicationNumber",
        to = "super::patent::Column::PublicationNumber",
        on_delete = "Cascade"
    )]
    Patent,
}

impl Related<super::patent::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Patent.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
