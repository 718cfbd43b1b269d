//! Transaction helpers.
//!
//! Both styles run a unit of work that returns a success flag:
//!
//! - [`Db::transaction`] (strict): begin, then commit on `Ok(true)`; roll back on
//!   `Ok(false)` or `Err`.
//! - [`Db::smart_transaction`]: start, flag failure on `Ok(false)` or `Err`, then let the
//!   driver decide on completion.
//!
//! If the unit of work panics, the transaction is rolled back (strict) or failed and
//! completed (smart) while unwinding.
//!
//! # Example
//!
//! ```ignore
//! let ok = db.transaction(|db| {
//!     db.execute("UPDATE account SET balance = balance - ? WHERE id = ?", &[100.into(), 1.into()])?;
//!     db.execute("UPDATE account SET balance = balance + ? WHERE id = ?", &[100.into(), 2.into()])?;
//!     Ok(true)
//! })?;
//! ```

use crate::db::Db;
use crate::error::{OrmError, OrmResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Style {
    Strict,
    Smart,
}

/// Ends an open transaction if the unit of work unwinds.
struct TransactionGuard<'a> {
    db: &'a Db,
    style: Style,
    armed: bool,
}

impl<'a> TransactionGuard<'a> {
    fn new(db: &'a Db, style: Style) -> Self {
        Self {
            db,
            style,
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for TransactionGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let conn = self.db.connection();
        let outcome = match self.style {
            Style::Strict => conn.rollback_trans().map(|_| ()),
            Style::Smart => {
                conn.fail_trans();
                conn.complete_trans().map(|_| ())
            }
        };
        match outcome {
            Ok(()) => tracing::warn!(
                target: "adorm",
                connection = %self.db.name(),
                "transaction abandoned while unwinding, rolled back"
            ),
            Err(e) => tracing::error!(
                target: "adorm",
                connection = %self.db.name(),
                error = %e,
                "transaction abandoned while unwinding, rollback failed"
            ),
        }
    }
}

impl Db {
    /// Run `work` inside a strict transaction.
    ///
    /// Returns `Ok(true)` if the work succeeded and the commit went through,
    /// `Ok(false)` if the work (or begin/commit) reported failure and the transaction
    /// was rolled back. An `Err` from the work is returned after rolling back.
    pub fn transaction<F>(&self, work: F) -> OrmResult<bool>
    where
        F: FnOnce(&Db) -> OrmResult<bool>,
    {
        let conn = self.connection();
        if !conn.begin_trans()? {
            tracing::warn!(target: "adorm", connection = %self.name(), error = %conn.error_msg(), "begin failed");
            return Ok(false);
        }

        let mut guard = TransactionGuard::new(self, Style::Strict);
        let outcome = work(self);
        guard.disarm();

        match outcome {
            Ok(true) => match conn.commit_trans() {
                Ok(true) => Ok(true),
                Ok(false) => {
                    tracing::warn!(target: "adorm", connection = %self.name(), error = %conn.error_msg(), "commit failed");
                    conn.rollback_trans()?;
                    Ok(false)
                }
                Err(error) => match conn.rollback_trans() {
                    Ok(_) => Err(error),
                    Err(rollback_err) => Err(OrmError::Transaction(format!(
                        "{error} (rollback failed: {rollback_err})"
                    ))),
                },
            },
            Ok(false) => {
                conn.rollback_trans()?;
                Ok(false)
            }
            Err(error) => match conn.rollback_trans() {
                Ok(_) => Err(error),
                Err(rollback_err) => Err(OrmError::Transaction(format!(
                    "{error} (rollback failed: {rollback_err})"
                ))),
            },
        }
    }

    /// Run `work` inside a smart transaction.
    ///
    /// Failure of the work flags the transaction; the result is whether the driver
    /// committed on completion. An `Err` from the work is returned after completion.
    pub fn smart_transaction<F>(&self, work: F) -> OrmResult<bool>
    where
        F: FnOnce(&Db) -> OrmResult<bool>,
    {
        let conn = self.connection();
        conn.start_trans()?;

        let mut guard = TransactionGuard::new(self, Style::Smart);
        let outcome = work(self);
        guard.disarm();

        match outcome {
            Ok(ok) => {
                if !ok {
                    conn.fail_trans();
                }
                conn.complete_trans()
            }
            Err(error) => {
                conn.fail_trans();
                match conn.complete_trans() {
                    Ok(_) => Err(error),
                    Err(complete_err) => Err(OrmError::Transaction(format!(
                        "{error} (completion failed: {complete_err})"
                    ))),
                }
            }
        }
    }
}
