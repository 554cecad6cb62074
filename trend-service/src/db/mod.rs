pub mod snapshot_repo;
pub mod video_repo;

pub use snapshot_repo::{PgSnapshotStore, SnapshotStore};
pub use video_repo::{CandidateRow, PgTrendStore, TrendStore};
