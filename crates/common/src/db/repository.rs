//! Repository pattern for database operations
//!
//! Implements the collaborator traits over SeaORM. Page commits run inside a
//! single transaction; all inserts are conflict-tolerant so concurrent
//! resolution of the same entity degrades to last-writer-wins.

use crate::db::models::*;
use crate::db::DbPool;
use crate::errors::Result;
use crate::store::{join_ids, split_ids, CitationLookup, CitationSet, DateLookup, EntityStore};
use crate::types::{
    Direction, IndexCandidate, IndexName, IndexRecord, IndexValues, PairKey, PairSimilarity,
    Partition, PartitionRecord,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use sea_orm::sea_query::{Expr, OnConflict, Query};
use sea_orm::{
    ActiveValue::{NotSet, Set},
    ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, TransactionTrait,
};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::debug;

/// Upper bound on ids per `IN (...)` clause
const IN_CHUNK_SIZE: usize = 10_000;

/// Upper bound on pairs per lookup query
const PAIR_CHUNK_SIZE: usize = 1_000;

/// Upper bound on rows per multi-row insert
const INSERT_CHUNK_SIZE: usize = 2_000;

/// Repository for data access operations
#[derive(Clone)]
pub struct Repository {
    pool: DbPool,
}

impl Repository {
    /// Create a new repository with the given connection pool
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn conn(&self) -> &DatabaseConnection {
        self.pool.conn()
    }
}

fn index_column(name: IndexName) -> CdIndexColumn {
    match name {
        IndexName::CdT => CdIndexColumn::CdT,
        IndexName::CdFT => CdIndexColumn::CdFT,
        IndexName::CdF2T => CdIndexColumn::CdF2T,
        IndexName::CdF3T => CdIndexColumn::CdF3T,
    }
}

fn partition_from_row(row: &PartitionRow) -> Partition {
    Partition {
        b1f0: split_ids(Some(&row.b1f0_patents)).into_iter().collect(),
        b1f1: split_ids(Some(&row.b1f1_patents)).into_iter().collect(),
        b0f1: split_ids(Some(&row.b0f1_patents)).into_iter().collect(),
    }
}

fn values_from_row(row: &CdIndex) -> IndexValues {
    IndexValues {
        cd_t: row.cd_t,
        cd_f_t: row.cd_f_t,
        cd_f2_t: row.cd_f2_t,
        cd_f3_t: row.cd_f3_t,
    }
}

/// Active model with only the non-null fields set, plus the columns to
/// update on conflict
fn index_active_model(row: &IndexRecord) -> (CdIndexActiveModel, Vec<CdIndexColumn>) {
    let mut model = CdIndexActiveModel {
        publication_number: Set(row.focal.clone()),
        cd_t: NotSet,
        cd_f_t: NotSet,
        cd_f2_t: NotSet,
        cd_f3_t: NotSet,
    };
    let mut columns = Vec::new();

    for name in IndexName::ALL {
        let Some(value) = row.values.get(name) else {
            continue;
        };
        match name {
            IndexName::CdT => model.cd_t = Set(Some(value)),
            IndexName::CdFT => model.cd_f_t = Set(Some(value)),
            IndexName::CdF2T => model.cd_f2_t = Set(Some(value)),
            IndexName::CdF3T => model.cd_f3_t = Set(Some(value)),
        }
        columns.push(index_column(name));
    }

    (model, columns)
}

fn citation_column(direction: Direction) -> PatentColumn {
    match direction {
        Direction::Forward => PatentColumn::ForwardCitations,
        Direction::Backward => PatentColumn::BackwardCitations,
    }
}

#[async_trait]
impl CitationLookup for Repository {
    async fn citations(&self, id: &str, direction: Direction) -> Result<Option<CitationSet>> {
        let row = PatentEntity::find_by_id(id.to_string())
            .select_only()
            .column(citation_column(direction))
            .into_tuple::<Option<String>>()
            .one(self.conn())
            .await?;

        Ok(row.map(|raw| Arc::new(split_ids(raw.as_deref()))))
    }

    async fn citations_many(
        &self,
        ids: &[String],
        direction: Direction,
    ) -> Result<HashMap<String, CitationSet>> {
        let mut found = HashMap::with_capacity(ids.len());

        for chunk in ids.chunks(IN_CHUNK_SIZE) {
            let rows = PatentEntity::find()
                .select_only()
                .column(PatentColumn::PublicationNumber)
                .column(citation_column(direction))
                .filter(PatentColumn::PublicationNumber.is_in(chunk.to_vec()))
                .into_tuple::<(String, Option<String>)>()
                .all(self.conn())
                .await?;

            found.extend(
                rows.into_iter()
                    .map(|(id, raw)| (id, Arc::new(split_ids(raw.as_deref())))),
            );
        }

        debug!(requested = ids.len(), found = found.len(), ?direction, "Bulk citation lookup");
        Ok(found)
    }
}

#[async_trait]
impl DateLookup for Repository {
    async fn publication_date(&self, id: &str) -> Result<Option<NaiveDate>> {
        let row = PatentEntity::find_by_id(id.to_string())
            .select_only()
            .column(PatentColumn::PublicationDate)
            .into_tuple::<Option<NaiveDate>>()
            .one(self.conn())
            .await?;

        Ok(row.flatten())
    }

    async fn publication_dates(&self, ids: &[String]) -> Result<HashMap<String, NaiveDate>> {
        let mut found = HashMap::with_capacity(ids.len());

        for chunk in ids.chunks(IN_CHUNK_SIZE) {
            let rows = PatentEntity::find()
                .select_only()
                .column(PatentColumn::PublicationNumber)
                .column(PatentColumn::PublicationDate)
                .filter(PatentColumn::PublicationNumber.is_in(chunk.to_vec()))
                .filter(PatentColumn::PublicationDate.is_not_null())
                .into_tuple::<(String, NaiveDate)>()
                .all(self.conn())
                .await?;

            found.extend(rows);
        }

        Ok(found)
    }
}

#[async_trait]
impl EntityStore for Repository {
    async fn unresolved_partitions(
        &self,
        cursor: Option<&str>,
        limit: u64,
        listed_only: bool,
    ) -> Result<Vec<String>> {
        let resolved = Query::select()
            .column(PartitionColumn::PublicationNumber)
            .from(PartitionEntity)
            .to_owned();

        let mut query = PatentEntity::find()
            .select_only()
            .column(PatentColumn::PublicationNumber)
            .filter(PatentColumn::PublicationNumber.not_in_subquery(resolved));

        if let Some(cursor) = cursor {
            query = query.filter(PatentColumn::PublicationNumber.gt(cursor));
        }
        if listed_only {
            query = query.filter(PatentColumn::ListedCompany.eq(true));
        }

        let ids = query
            .order_by_asc(PatentColumn::PublicationNumber)
            .limit(limit)
            .into_tuple::<String>()
            .all(self.conn())
            .await?;

        debug!(count = ids.len(), cursor = ?cursor, "Fetched unresolved partition page");
        Ok(ids)
    }

    async fn unresolved_indices(
        &self,
        cursor: Option<&str>,
        limit: u64,
        fields: &BTreeSet<IndexName>,
    ) -> Result<Vec<IndexCandidate>> {
        // Rows where every requested field is already set
        let mut resolved = Query::select()
            .column(CdIndexColumn::PublicationNumber)
            .from(CdIndexEntity)
            .to_owned();
        for name in fields {
            resolved.and_where(Expr::col(index_column(*name)).is_not_null());
        }

        let mut query = PartitionEntity::find()
            .filter(PartitionColumn::PublicationNumber.not_in_subquery(resolved));
        if let Some(cursor) = cursor {
            query = query.filter(PartitionColumn::PublicationNumber.gt(cursor));
        }

        let rows = query
            .order_by_asc(PartitionColumn::PublicationNumber)
            .limit(limit)
            .all(self.conn())
            .await?;

        let ids: Vec<String> = rows.iter().map(|r| r.publication_number.clone()).collect();
        let existing: HashMap<String, IndexValues> = CdIndexEntity::find()
            .filter(CdIndexColumn::PublicationNumber.is_in(ids))
            .all(self.conn())
            .await?
            .iter()
            .map(|row| (row.publication_number.clone(), values_from_row(row)))
            .collect();

        debug!(count = rows.len(), cursor = ?cursor, "Fetched unresolved index page");

        Ok(rows
            .iter()
            .map(|row| IndexCandidate {
                partition: PartitionRecord {
                    focal: row.publication_number.clone(),
                    partition: partition_from_row(row),
                },
                existing: existing
                    .get(&row.publication_number)
                    .copied()
                    .unwrap_or_default(),
            })
            .collect())
    }

    async fn abstracts(&self, ids: &[String]) -> Result<HashMap<String, String>> {
        let mut abstracts = HashMap::with_capacity(ids.len());

        for chunk in ids.chunks(IN_CHUNK_SIZE) {
            let rows = PatentEntity::find()
                .select_only()
                .column(PatentColumn::PublicationNumber)
                .column(PatentColumn::AbstractText)
                .filter(PatentColumn::PublicationNumber.is_in(chunk.to_vec()))
                .into_tuple::<(String, Option<String>)>()
                .all(self.conn())
                .await?;

            abstracts.extend(rows.into_iter().map(|(id, text)| (id, text.unwrap_or_default())));
        }

        Ok(abstracts)
    }

    async fn pair_scores(&self, pairs: &[PairKey]) -> Result<HashMap<PairKey, f64>> {
        let mut scores = HashMap::new();

        for chunk in pairs.chunks(PAIR_CHUNK_SIZE) {
            let condition = chunk.iter().fold(Condition::any(), |cond, key| {
                cond.add(
                    Condition::all()
                        .add(PairSimilarityColumn::SmallPatent.eq(key.small()))
                        .add(PairSimilarityColumn::BigPatent.eq(key.big())),
                )
            });

            let rows = PairSimilarityEntity::find()
                .filter(condition)
                .all(self.conn())
                .await?;

            scores.extend(
                rows.into_iter()
                    .map(|row| (PairKey::new(row.small_patent, row.big_patent), row.similarity)),
            );
        }

        Ok(scores)
    }

    async fn commit_partition_page(&self, rows: Vec<PartitionRecord>) -> Result<()> {
        let txn = self.conn().begin().await?;

        for chunk in rows.chunks(INSERT_CHUNK_SIZE) {
            let models = chunk.iter().map(|row| PartitionActiveModel {
                publication_number: Set(row.focal.clone()),
                b1f0_patents: Set(join_ids(&row.partition.b1f0)),
                b1f1_patents: Set(join_ids(&row.partition.b1f1)),
                b0f1_patents: Set(join_ids(&row.partition.b0f1)),
            });

            PartitionEntity::insert_many(models)
                .on_conflict(
                    OnConflict::column(PartitionColumn::PublicationNumber)
                        .do_nothing()
                        .to_owned(),
                )
                .do_nothing()
                .exec(&txn)
                .await?;
        }

        txn.commit().await?;
        Ok(())
    }

    async fn commit_index_page(
        &self,
        pairs: Vec<PairSimilarity>,
        rows: Vec<IndexRecord>,
    ) -> Result<()> {
        let txn = self.conn().begin().await?;

        for chunk in pairs.chunks(INSERT_CHUNK_SIZE) {
            let models = chunk.iter().map(|pair| PairSimilarityActiveModel {
                small_patent: Set(pair.key.small().to_string()),
                big_patent: Set(pair.key.big().to_string()),
                similarity: Set(pair.score),
            });

            PairSimilarityEntity::insert_many(models)
                .on_conflict(
                    OnConflict::columns([
                        PairSimilarityColumn::SmallPatent,
                        PairSimilarityColumn::BigPatent,
                    ])
                    .do_nothing()
                    .to_owned(),
                )
                .do_nothing()
                .exec(&txn)
                .await?;
        }

        // Rows carry different column sets, so they are written one by one
        for row in &rows {
            let (model, columns) = index_active_model(row);
            if columns.is_empty() {
                continue;
            }

            CdIndexEntity::insert(model)
                .on_conflict(
                    OnConflict::column(CdIndexColumn::PublicationNumber)
                        .update_columns(columns)
                        .to_owned(),
                )
                .exec(&txn)
                .await?;
        }

        txn.commit().await?;
        Ok(())
    }

    async fn missing_citations(&self, cursor: Option<&str>, limit: u64) -> Result<Vec<String>> {
        let mut query = MissingCitationEntity::find()
            .select_only()
            .column(MissingCitationColumn::PublicationNumber);
        if let Some(cursor) = cursor {
            query = query.filter(MissingCitationColumn::PublicationNumber.gt(cursor));
        }

        let ids = query
            .order_by_asc(MissingCitationColumn::PublicationNumber)
            .limit(limit)
            .into_tuple::<String>()
            .all(self.conn())
            .await?;

        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_model_sets_only_present_fields() {
        let row = IndexRecord {
            focal: "US1".into(),
            values: IndexValues {
                cd_t: Some(0.5),
                cd_f3_t: Some(0.1),
                ..Default::default()
            },
        };
        let (model, columns) = index_active_model(&row);
        assert_eq!(columns.len(), 2);
        assert!(matches!(columns[0], CdIndexColumn::CdT));
        assert!(matches!(columns[1], CdIndexColumn::CdF3T));
        assert_eq!(model.cd_t, Set(Some(0.5)));
        assert!(matches!(model.cd_f_t, NotSet));
    }

    #[test]
    fn test_partition_row_round_trips_sets() {
        let row = PartitionRow {
            publication_number: "F".into(),
            b1f0_patents: "Z".into(),
            b1f1_patents: "".into(),
            b0f1_patents: "V,Y".into(),
        };
        let partition = partition_from_row(&row);
        assert!(partition.b1f1.is_empty());
        assert_eq!(join_ids(&partition.b0f1), "V,Y");
    }

    #[test]
    fn test_citation_column_follows_direction() {
        assert!(matches!(
            citation_column(Direction::Forward),
            PatentColumn::ForwardCitations
        ));
        assert!(matches!(
            citation_column(Direction::Backward),
            PatentColumn::BackwardCitations
        ));
    }
}
