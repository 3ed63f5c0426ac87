//! Balance ledger engine for shared expenses.
//!
//! The engine keeps a graph of pairwise debts (`balances`) in a transactional
//! store. Expenses add obligations from each participant to the payer,
//! settlements pay them down, and simplification shortens `X -> M -> Y`
//! chains into direct edges. Every mutation runs in a single database
//! transaction and leaves at most one positive, net edge per pair of users.

pub use balances::BalanceView;
pub use error::{EngineError, ErrorKind};
pub use expenses::{Expense, ExpenseSplit};
pub use groups::GroupView;
pub use ops::{
    Engine, EngineBuilder, apply_balance_delta, simplify_balances, simplify_user_balances,
};
pub use settlements::Settlement;
pub use split::{ExpenseInput, SPLIT_EPSILON, SplitInput, SplitType, compute_shares};
pub use users::UserView;

mod balances;
mod error;
mod expense_splits;
mod expenses;
mod group_members;
mod groups;
mod ops;
mod settlements;
mod split;
mod users;

type ResultEngine<T> = Result<T, EngineError>;
