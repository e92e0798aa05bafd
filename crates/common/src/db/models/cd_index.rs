//! CD index entity
//!
//! Every index column is nullable: null means undefined or not computed yet.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "cd_index")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub publication_number: String,

    #[sea_orm(column_type = "Double", nullable)]
    pub cd_t: Option<f64>,

    #[sea_orm(column_type = "Double", nullable)]
    pub cd_f_t: Option<f64>,

    #[sea_orm(column_type = "Double", nullable)]
    pub cd_f2_t: Option<f64>,

    #[sea_orm(column_type = "Double", nullable)]
    pub cd_f3_t: Option<f64>,
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
