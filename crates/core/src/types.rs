use uuid::Uuid;

/// Users, organizations, and other platform entities are PostgreSQL BIGSERIAL.
pub type DbId = i64;

/// Background jobs are keyed by UUID so the id can double as the queue
/// correlation token without a round-trip to the database.
pub type JobId = Uuid;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
