//! SeaORM entity models
//!
//! Database entities for CiteIndex

mod patent;
mod partition;
mod cd_index;
mod pair_similarity;
mod missing_citation;

pub use patent::{
    Entity as PatentEntity,
    Model as Patent,
    ActiveModel as PatentActiveModel,
    Column as PatentColumn,
};

pub use partition::{
    Entity as PartitionEntity,
    Model as PartitionRow,
    ActiveModel as PartitionActiveModel,
    Column as PartitionColumn,
};

pub use cd_index::{
    Entity as CdIndexEntity,
    Model as CdIndex,
    ActiveModel as CdIndexActiveModel,
    Column as CdIndexColumn,
};

pub use pair_similarity::{
    Entity as PairSimilarityEntity,
    Model as PairSimilarityRow,
    ActiveModel as PairSimilarityActiveModel,
    Column as PairSimilarityColumn,
};

pub use missing_citation::{
    Entity as MissingCitationEntity,
    Model as MissingCitation,
    ActiveModel as MissingCitationActiveModel,
    Column as MissingCitationColumn,
};
