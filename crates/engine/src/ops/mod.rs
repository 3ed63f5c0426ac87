use sea_orm::{
    DatabaseConnection, DatabaseTransaction, DbBackend, IsolationLevel, RuntimeErr,
    TransactionTrait, prelude::*,
};

use crate::{EngineError, ResultEngine};

mod balances;
mod directory;
mod expenses;
mod settlements;
mod simplify;

pub use balances::apply_balance_delta;
pub use simplify::{simplify_balances, simplify_user_balances};

/// Run a block inside a DB transaction, committing on success and rolling back on error.
///
/// The block is evaluated as an `async` block, so `?` inside it stops at the
/// transaction boundary instead of returning from the caller.
macro_rules! with_tx {
    ($self:expr, |$tx:ident| $body:expr) => {{
        let $tx = $self.begin().await?;
        let result: $crate::ResultEngine<_> = async { $body }.await;
        match result {
            Ok(value) => {
                $tx.commit().await?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = $tx.rollback().await {
                    tracing::warn!("rollback failed after {err}: {rollback_err}");
                }
                Err(err)
            }
        }
    }};
}

pub(crate) use with_tx;

#[derive(Debug)]
pub struct Engine {
    database: DatabaseConnection,
}

impl Engine {
    /// Return a builder for `Engine`. Help to build the struct.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    /// Opens the transaction every mutating operation runs in.
    ///
    /// PostgreSQL gets `SERIALIZABLE`. SQLite transactions are serializable
    /// already and sea-orm only warns when asked for a level there.
    async fn begin(&self) -> ResultEngine<DatabaseTransaction> {
        let isolation = match self.database.get_database_backend() {
            DbBackend::Sqlite => None,
            _ => Some(IsolationLevel::Serializable),
        };
        Ok(self.database.begin_with_config(isolation, None).await?)
    }
}

/// Rejects empty or blank identifiers.
pub(crate) fn require_id(value: &str, label: &str) -> ResultEngine<()> {
    if value.trim().is_empty() {
        return Err(EngineError::InvalidInput(format!("{label} must be provided")));
    }
    Ok(())
}

/// Rejects zero, negative and non-finite amounts.
pub(crate) fn require_positive(amount: f64, label: &str) -> ResultEngine<()> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(EngineError::InvalidAmount(format!(
            "{label} must be positive, got {amount}"
        )));
    }
    Ok(())
}

fn normalize_required_name(value: &str, label: &str) -> ResultEngine<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(EngineError::InvalidInput(format!(
            "{label} name must not be empty"
        )));
    }
    Ok(trimmed.to_string())
}

/// The builder for `Engine`
#[derive(Default)]
pub struct EngineBuilder {
    database: DatabaseConnection,
}

impl EngineBuilder {
    /// Pass the required database
    pub fn database(mut self, db: DatabaseConnection) -> EngineBuilder {
        self.database = db;
        self
    }

    /// Construct `Engine`
    pub async fn build(self) -> ResultEngine<Engine> {
        if matches!(self.database, DatabaseConnection::Disconnected) {
            return Err(EngineError::Database(DbErr::Conn(RuntimeErr::Internal(
                "engine requires a connected database".to_string(),
            ))));
        }
        Ok(Engine {
            database: self.database,
        })
    }
}
