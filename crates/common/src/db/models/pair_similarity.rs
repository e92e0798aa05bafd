//! Pairwise abstract similarity entity
//!
//! Keyed by the canonical (smaller id, bigger id) pair so each unordered pair
//! has exactly one row.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "patent_matrix")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub small_patent: String,

    #[sea_orm(primary_key, auto_increment = false)]
    pub big_patent: String,

    #[sea_orm(column_type = "Double")]
    pub similarity: f64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
