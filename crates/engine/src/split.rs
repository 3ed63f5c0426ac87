//! Split calculator.
//!
//! Turns an [`ExpenseInput`] into the amount each participant owes for it.
//! Pure code: no storage access, deterministic for a given input.
//!
//! Policies:
//! - [`SplitType::Equal`]: `total / n` for each of the `n` distinct
//!   participants. The division is plain floating point, no remainder is
//!   redistributed.
//! - [`SplitType::Exact`]: one explicit amount per split; the amounts must add
//!   up to the total within [`SPLIT_EPSILON`].
//! - [`SplitType::Percent`]: one percentage per split; percentages must add up
//!   to 100 within [`SPLIT_EPSILON`], each share is `total * pct / 100`.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::{EngineError, ResultEngine};

/// Tolerance used when comparing split sums against the expected total.
pub const SPLIT_EPSILON: f64 = 0.01;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SplitType {
    Equal,
    Exact,
    Percent,
}

impl SplitType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Equal => "EQUAL",
            Self::Exact => "EXACT",
            Self::Percent => "PERCENT",
        }
    }
}

impl TryFrom<&str> for SplitType {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "EQUAL" => Ok(Self::Equal),
            "EXACT" => Ok(Self::Exact),
            "PERCENT" => Ok(Self::Percent),
            other => Err(EngineError::InvalidInput(format!(
                "invalid split type: {other}"
            ))),
        }
    }
}

/// One explicit split entry.
///
/// `value` is an amount for [`SplitType::Exact`] and a percentage for
/// [`SplitType::Percent`]. It is ignored for [`SplitType::Equal`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SplitInput {
    pub user_id: String,
    pub value: f64,
}

impl SplitInput {
    pub fn new(user_id: impl Into<String>, value: f64) -> Self {
        Self {
            user_id: user_id.into(),
            value,
        }
    }
}

/// Everything needed to record an expense.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExpenseInput {
    /// Caller-chosen id; left empty the engine generates one.
    #[serde(default)]
    pub expense_id: String,
    pub group_id: String,
    pub paid_by: String,
    pub total_amount: f64,
    pub split_type: SplitType,
    pub participants: Vec<String>,
    #[serde(default)]
    pub splits: Vec<SplitInput>,
    #[serde(default)]
    pub description: String,
}

/// Computes each participant's share of `input.total_amount`.
pub fn compute_shares(input: &ExpenseInput) -> ResultEngine<BTreeMap<String, f64>> {
    match input.split_type {
        SplitType::Equal => equal_shares(input),
        SplitType::Exact => exact_shares(input),
        SplitType::Percent => percent_shares(input),
    }
}

fn equal_shares(input: &ExpenseInput) -> ResultEngine<BTreeMap<String, f64>> {
    let participants: BTreeSet<&str> = input.participants.iter().map(String::as_str).collect();
    if participants.is_empty() {
        return Err(EngineError::InvalidSplit(
            "no participants provided".to_string(),
        ));
    }

    let share = input.total_amount / participants.len() as f64;
    Ok(participants
        .into_iter()
        .map(|user_id| (user_id.to_string(), share))
        .collect())
}

fn exact_shares(input: &ExpenseInput) -> ResultEngine<BTreeMap<String, f64>> {
    let splits = checked_splits(input, "amount")?;

    let total: f64 = splits.values().sum();
    if (total - input.total_amount).abs() > SPLIT_EPSILON {
        return Err(EngineError::InvalidSplit(format!(
            "sum of exact splits ({total}) must equal total amount ({})",
            input.total_amount
        )));
    }

    Ok(splits)
}

fn percent_shares(input: &ExpenseInput) -> ResultEngine<BTreeMap<String, f64>> {
    let splits = checked_splits(input, "percentage")?;

    let total_percentage: f64 = splits.values().sum();
    if (total_percentage - 100.0).abs() > SPLIT_EPSILON {
        return Err(EngineError::InvalidSplit(format!(
            "sum of percentages ({total_percentage}) must be 100"
        )));
    }

    Ok(splits
        .into_iter()
        .map(|(user_id, percentage)| (user_id, input.total_amount * (percentage / 100.0)))
        .collect())
}

/// Validates the explicit split list shared by the exact and percent policies.
fn checked_splits(input: &ExpenseInput, label: &str) -> ResultEngine<BTreeMap<String, f64>> {
    if input.splits.is_empty() {
        return Err(EngineError::InvalidSplit(format!(
            "{} split requires split details",
            input.split_type.as_str().to_lowercase()
        )));
    }

    let participants: BTreeSet<&str> = input.participants.iter().map(String::as_str).collect();
    let mut values = BTreeMap::new();
    for split in &input.splits {
        if split.value.is_nan() || split.value <= 0.0 {
            return Err(EngineError::InvalidSplit(format!(
                "split {label} for \"{}\" must be positive",
                split.user_id
            )));
        }
        if !participants.contains(split.user_id.as_str()) {
            return Err(EngineError::InvalidSplit(format!(
                "split user \"{}\" not in participants list",
                split.user_id
            )));
        }
        if values.insert(split.user_id.clone(), split.value).is_some() {
            return Err(EngineError::InvalidSplit(format!(
                "duplicate split for user \"{}\"",
                split.user_id
            )));
        }
    }

    Ok(values)
}
