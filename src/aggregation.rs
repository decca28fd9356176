//! Transaction aggregation for summaries and charts.
//!
//! Every function here is pure: the result only depends on the transactions (and categories)
//! passed in.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use time::Date;

use crate::{
    DateRange,
    category::{Category, CategoryId, TransactionKind},
    transaction::Transaction,
};

/// The label used for transactions without a category.
pub const UNCATEGORIZED_LABEL: &str = "Uncategorized";

/// Keep the transactions whose date falls within `range` (inclusive).
pub fn filter_by_date_range(transactions: &[Transaction], range: DateRange) -> Vec<&Transaction> {
    transactions
        .iter()
        .filter(|transaction| range.contains(transaction.date))
        .collect()
}

/// Sum the amounts of `transactions`.
pub fn sum_amounts<'a>(transactions: impl IntoIterator<Item = &'a Transaction>) -> f64 {
    transactions
        .into_iter()
        .map(|transaction| transaction.amount)
        .sum()
}

/// Income and expense totals for a set of transactions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Totals {
    /// The sum of income transactions.
    pub income: f64,
    /// The sum of expense transactions.
    pub expenses: f64,
}

impl Totals {
    /// Income minus expenses.
    pub fn net(&self) -> f64 {
        self.income - self.expenses
    }
}

/// Sum income and expenses separately.
pub fn totals_by_kind<'a>(transactions: impl IntoIterator<Item = &'a Transaction>) -> Totals {
    transactions
        .into_iter()
        .fold(Totals::default(), |mut totals, transaction| {
            match transaction.kind {
                TransactionKind::Income => totals.income += transaction.amount,
                TransactionKind::Expense => totals.expenses += transaction.amount,
            }
            totals
        })
}

/// The first day of the month that `date` falls in.
pub fn month_start(date: Date) -> Date {
    date.replace_day(1).unwrap_or(date)
}

/// The first day of the month before the month that `date` falls in.
pub fn previous_month_start(date: Date) -> Date {
    let start = month_start(date);

    start
        .previous_day()
        .map(month_start)
        .unwrap_or(start)
}

/// Sum transaction amounts by month, optionally only for one transaction type.
///
/// Months are keyed by their first day and iterate in chronological order.
pub fn group_by_month<'a>(
    transactions: impl IntoIterator<Item = &'a Transaction>,
    kind: Option<TransactionKind>,
) -> BTreeMap<Date, f64> {
    let mut totals = BTreeMap::new();

    for transaction in transactions
        .into_iter()
        .filter(|transaction| kind.is_none_or(|kind| kind == transaction.kind))
    {
        *totals.entry(month_start(transaction.date)).or_insert(0.0) += transaction.amount;
    }

    totals
}

/// Sum transaction amounts by category, optionally only for one transaction type.
///
/// Uncategorized transactions are grouped under `None`.
pub fn group_by_category<'a>(
    transactions: impl IntoIterator<Item = &'a Transaction>,
    kind: Option<TransactionKind>,
) -> HashMap<Option<CategoryId>, f64> {
    let mut totals = HashMap::new();

    for transaction in transactions
        .into_iter()
        .filter(|transaction| kind.is_none_or(|kind| kind == transaction.kind))
    {
        *totals.entry(transaction.category_id).or_insert(0.0) += transaction.amount;
    }

    totals
}

/// How much of `budget` has been used by `spent`, as a percentage.
///
/// Returns `None` when there is no positive budget to measure against.
pub fn budget_usage_percent(spent: f64, budget: f64) -> Option<f64> {
    (budget > 0.0).then(|| spent / budget * 100.0)
}

/// The percentage change from `previous` to `current`.
///
/// Returns `None` when `previous` is zero since the change is undefined.
pub fn month_over_month_change(previous: f64, current: f64) -> Option<f64> {
    (previous != 0.0).then(|| (current - previous) / previous.abs() * 100.0)
}

/// The total for one category along with display details and percentages.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategorySpend {
    /// The category, `None` for uncategorized transactions.
    pub category_id: Option<CategoryId>,
    /// The category name or [UNCATEGORIZED_LABEL].
    pub name: String,
    /// The category's display color, if it has a category.
    pub color: Option<String>,
    /// The sum of the transactions in the category.
    pub total: f64,
    /// The category total as a percentage of the total across all categories.
    pub share_percent: f64,
    /// The category total as a percentage of the category budget, if it has one.
    pub budget_percent: Option<f64>,
}

/// Break down the transactions of type `kind` by category.
///
/// The result is sorted by descending total, with the uncategorized group always last.
/// Transactions that reference a category missing from `categories` count as uncategorized.
pub fn category_breakdown(
    transactions: &[Transaction],
    categories: &[Category],
    kind: TransactionKind,
) -> Vec<CategorySpend> {
    let category_by_id: HashMap<CategoryId, &Category> = categories
        .iter()
        .map(|category| (category.id, category))
        .collect();

    let mut totals: HashMap<Option<CategoryId>, f64> = HashMap::new();
    for (category_id, total) in group_by_category(transactions, Some(kind)) {
        let category_id = category_id.filter(|id| category_by_id.contains_key(id));
        *totals.entry(category_id).or_insert(0.0) += total;
    }

    let grand_total: f64 = totals.values().sum();

    let mut breakdown: Vec<CategorySpend> = totals
        .into_iter()
        .map(|(category_id, total)| {
            let category = category_id.and_then(|id| category_by_id.get(&id).copied());

            CategorySpend {
                category_id,
                name: category
                    .map(|category| category.name.to_string())
                    .unwrap_or_else(|| UNCATEGORIZED_LABEL.to_owned()),
                color: category.map(|category| category.color.clone()),
                total,
                share_percent: if grand_total > 0.0 {
                    total / grand_total * 100.0
                } else {
                    0.0
                },
                budget_percent: category
                    .and_then(|category| category.budget)
                    .and_then(|budget| budget_usage_percent(total, budget)),
            }
        })
        .collect();

    breakdown.sort_by(|a, b| {
        a.category_id
            .is_none()
            .cmp(&b.category_id.is_none())
            .then(b.total.total_cmp(&a.total))
            .then_with(|| a.name.cmp(&b.name))
    });

    breakdown
}

/// Income, expenses and changes for one month.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlySummary {
    /// The first day of the month.
    pub month: Date,
    /// Totals for the month.
    pub totals: Totals,
    /// Totals for the previous month.
    pub previous_totals: Totals,
    /// Percentage change in expenses from the previous month.
    pub expense_change_percent: Option<f64>,
    /// Percentage change in income from the previous month.
    pub income_change_percent: Option<f64>,
    /// Percentage of `monthly_budget` used by the month's expenses.
    pub budget_percent: Option<f64>,
}

/// Summarize the month containing `month` and compare it with the month before.
///
/// `monthly_budget` is the overall spending limit for a month, if the user has set one.
pub fn monthly_summary(
    transactions: &[Transaction],
    month: Date,
    monthly_budget: Option<f64>,
) -> MonthlySummary {
    let this_month = DateRange::month_of(month);
    let last_month = DateRange::month_of(previous_month_start(month));

    let totals = totals_by_kind(filter_by_date_range(transactions, this_month));
    let previous_totals = totals_by_kind(filter_by_date_range(transactions, last_month));

    MonthlySummary {
        month: this_month.start(),
        totals,
        previous_totals,
        expense_change_percent: month_over_month_change(
            previous_totals.expenses,
            totals.expenses,
        ),
        income_change_percent: month_over_month_change(previous_totals.income, totals.income),
        budget_percent: monthly_budget
            .and_then(|budget| budget_usage_percent(totals.expenses, budget)),
    }
}
