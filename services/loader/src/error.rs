use thiserror::Error;

/// Failures raised while talking to the warehouse.
///
/// Everything here is contained by the caller: a connect error feeds the
/// retry loop, anything inside a transaction triggers a rollback.
#[derive(Debug, Error)]
pub enum WarehouseError {
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// A prepared row references a natural key that has no surrogate id
    /// after the dimension upsert.
    #[error("no surrogate id for {dimension} key '{key}'")]
    UnresolvedKey { dimension: &'static str, key: String },

    #[error("{0}")]
    Backend(String),
}
