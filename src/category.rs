//! Core category domain types.
//!
//! Categories group transactions of one type (income or expense) and may carry a budget
//! ceiling that spending is measured against.

use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{Error, user::UserID};

/// Whether money was earned or spent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    /// Money that was earned.
    Income,
    /// Money that was spent.
    Expense,
}

impl TransactionKind {
    /// The lowercase name used in the database and on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Income => "income",
            TransactionKind::Expense => "expense",
        }
    }
}

impl Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "income" => Ok(TransactionKind::Income),
            "expense" => Ok(TransactionKind::Expense),
            other => Err(format!(
                "\"{other}\" is not a transaction type, expected \"income\" or \"expense\""
            )),
        }
    }
}

/// A validated, non-empty category name.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct CategoryName(String);

impl CategoryName {
    /// Create a category name.
    ///
    /// # Errors
    ///
    /// This function will return an [Error::EmptyCategoryName] if `name` is an empty string.
    pub fn new(name: &str) -> Result<Self, Error> {
        let name = name.trim();

        if name.is_empty() {
            Err(Error::EmptyCategoryName)
        } else {
            Ok(Self(name.to_string()))
        }
    }

    /// Create a category name without validation.
    ///
    /// The caller should ensure that the string is not empty.
    ///
    /// This function has `_unchecked` in the name but is not `unsafe`, because if the non-empty invariant is violated it will cause incorrect behaviour but not affect memory safety.
    pub fn new_unchecked(name: &str) -> Self {
        Self(name.to_string())
    }

    /// Compare two names ignoring ASCII case, matching how the database compares names.
    pub fn matches(&self, other: &str) -> bool {
        self.0.eq_ignore_ascii_case(other.trim())
    }
}

impl AsRef<str> for CategoryName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for CategoryName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CategoryName::new(s)
    }
}

impl TryFrom<String> for CategoryName {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        CategoryName::new(&value)
    }
}

impl From<CategoryName> for String {
    fn from(value: CategoryName) -> Self {
        value.0
    }
}

impl Display for CategoryName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Database identifier for a category.
pub type CategoryId = i64;

/// The color used for categories created without one.
pub const DEFAULT_COLOR: &str = "#6b7280";
/// The icon used for categories created without one.
pub const DEFAULT_ICON: &str = "tag";

/// A category for grouping transactions (e.g., 'Food', 'Salary').
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    /// The ID of the category.
    pub id: CategoryId,
    /// The user that owns the category.
    pub user_id: UserID,
    /// The name of the category, unique per user and type.
    pub name: CategoryName,
    /// The type of transaction the category applies to.
    pub kind: TransactionKind,
    /// The display color, e.g. "#ef4444".
    pub color: String,
    /// The name of the display icon.
    pub icon: String,
    /// The most the user wants to spend (or expects to earn) in this category per month.
    pub budget: Option<f64>,
}

/// The user-editable fields of a category, used for creating and updating categories.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryData {
    /// The name of the category.
    pub name: CategoryName,
    /// The type of transaction the category applies to.
    pub kind: TransactionKind,
    /// The display color.
    #[serde(default = "default_color")]
    pub color: String,
    /// The name of the display icon.
    #[serde(default = "default_icon")]
    pub icon: String,
    /// The optional budget ceiling.
    #[serde(default)]
    pub budget: Option<f64>,
}

fn default_color() -> String {
    DEFAULT_COLOR.to_owned()
}

fn default_icon() -> String {
    DEFAULT_ICON.to_owned()
}

impl CategoryData {
    /// Create category data with the default color and icon and no budget.
    pub fn new(name: CategoryName, kind: TransactionKind) -> Self {
        Self {
            name,
            kind,
            color: default_color(),
            icon: default_icon(),
            budget: None,
        }
    }

    /// Set the display color and icon.
    pub fn style(mut self, color: &str, icon: &str) -> Self {
        self.color = color.to_owned();
        self.icon = icon.to_owned();
        self
    }

    /// Set the budget ceiling.
    pub fn budget(mut self, budget: Option<f64>) -> Self {
        self.budget = budget;
        self
    }

    /// Check the invariants that cannot be enforced by the types alone.
    ///
    /// # Errors
    ///
    /// Returns [Error::InvalidBudget] if the budget is negative or not finite.
    pub fn validate(&self) -> Result<(), Error> {
        match self.budget {
            Some(budget) if !budget.is_finite() || budget < 0.0 => Err(Error::InvalidBudget(budget)),
            _ => Ok(()),
        }
    }

    /// Attach an ID and owner to the data.
    pub fn into_category(self, id: CategoryId, user_id: UserID) -> Category {
        Category {
            id,
            user_id,
            name: self.name,
            kind: self.kind,
            color: self.color,
            icon: self.icon,
            budget: self.budget,
        }
    }
}

/// The categories every new user starts with.
pub fn default_categories() -> Vec<CategoryData> {
    [
        ("Salary", TransactionKind::Income, "#10b981", "briefcase"),
        ("Freelance", TransactionKind::Income, "#3b82f6", "laptop"),
        ("Investments", TransactionKind::Income, "#8b5cf6", "chart"),
        ("Other Income", TransactionKind::Income, "#6b7280", "plus"),
        ("Food", TransactionKind::Expense, "#ef4444", "utensils"),
        ("Transport", TransactionKind::Expense, "#f59e0b", "car"),
        ("Housing", TransactionKind::Expense, "#6366f1", "home"),
        ("Utilities", TransactionKind::Expense, "#14b8a6", "bolt"),
        ("Entertainment", TransactionKind::Expense, "#ec4899", "film"),
        ("Healthcare", TransactionKind::Expense, "#22c55e", "heart"),
        ("Shopping", TransactionKind::Expense, "#f97316", "bag"),
        ("Other Expenses", TransactionKind::Expense, "#6b7280", "dots"),
    ]
    .into_iter()
    .map(|(name, kind, color, icon)| {
        CategoryData::new(CategoryName::new_unchecked(name), kind).style(color, icon)
    })
    .collect()
}

/// Find a category by name (case-insensitive), optionally restricted to one transaction type.
pub fn find_by_name<'a>(
    categories: &'a [Category],
    name: &str,
    kind: Option<TransactionKind>,
) -> Option<&'a Category> {
    categories.iter().find(|category| {
        category.name.matches(name) && kind.is_none_or(|kind| kind == category.kind)
    })
}

/// Find a category by ID in a slice.
pub fn find_by_id(categories: &[Category], id: CategoryId) -> Option<&Category> {
    categories.iter().find(|category| category.id == id)
}

#[cfg(test)]
mod category_name_tests {
    use crate::{CategoryName, Error};

    #[test]
    fn new_fails_on_empty_string() {
        let category_name = CategoryName::new("");

        assert_eq!(category_name, Err(Error::EmptyCategoryName));
    }

    #[test]
    fn new_fails_on_just_whitespace() {
        let category_name = CategoryName::new("\n\t \r");

        assert_eq!(category_name, Err(Error::EmptyCategoryName));
    }

    #[test]
    fn new_succeeds_on_non_empty_string() {
        let category_name = CategoryName::new("🔥");

        assert!(category_name.is_ok())
    }

    #[test]
    fn deserialize_rejects_empty_name() {
        let result = serde_json::from_str::<CategoryName>("\"  \"");

        assert!(result.is_err());
    }
}

#[cfg(test)]
mod category_tests {
    use crate::{
        CategoryData, CategoryName, Error, TransactionKind, UserID,
        category::{default_categories, find_by_name},
    };

    #[test]
    fn kind_parses_case_insensitively() {
        assert_eq!("Income".parse(), Ok(TransactionKind::Income));
        assert_eq!(" expense ".parse(), Ok(TransactionKind::Expense));
        assert!("transfer".parse::<TransactionKind>().is_err());
    }

    #[test]
    fn validate_rejects_negative_budget() {
        let data = CategoryData::new(CategoryName::new_unchecked("Food"), TransactionKind::Expense)
            .budget(Some(-1.0));

        assert_eq!(data.validate(), Err(Error::InvalidBudget(-1.0)));
    }

    #[test]
    fn validate_accepts_zero_budget() {
        let data = CategoryData::new(CategoryName::new_unchecked("Food"), TransactionKind::Expense)
            .budget(Some(0.0));

        assert_eq!(data.validate(), Ok(()));
    }

    #[test]
    fn deserialize_fills_in_default_style() {
        let data: CategoryData =
            serde_json::from_str(r#"{"name":"Pets","kind":"expense"}"#).unwrap();

        assert_eq!(
            data,
            CategoryData::new(CategoryName::new_unchecked("Pets"), TransactionKind::Expense)
        );
    }

    #[test]
    fn default_category_names_are_unique_per_kind() {
        let defaults = default_categories();

        for (i, category) in defaults.iter().enumerate() {
            let duplicate = defaults.iter().skip(i + 1).any(|other| {
                other.kind == category.kind && other.name.matches(category.name.as_ref())
            });
            assert!(!duplicate, "{} appears twice", category.name);
        }
    }

    #[test]
    fn find_by_name_ignores_case_and_filters_kind() {
        let categories: Vec<_> = default_categories()
            .into_iter()
            .enumerate()
            .map(|(i, data)| data.into_category(i as i64 + 1, UserID::new(1)))
            .collect();

        let food = find_by_name(&categories, "food", None).expect("Food should exist");
        assert_eq!(food.name.as_ref(), "Food");
        assert!(find_by_name(&categories, "food", Some(TransactionKind::Income)).is_none());
    }
}
