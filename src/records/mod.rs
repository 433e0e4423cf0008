//! Replicated record model
//!
//! Every record a device replicates carries the same concurrency fields:
//! a device-generated `id`, the owning `user_id`, the `last_modified_at`
//! instant that drives last-writer-wins merging, a monotonically increasing
//! `version`, and the `is_deleted` tombstone flag. Deletes are soft so the
//! change feed can carry them to other devices.
//!
//! These are the wire shapes: ids are UUID strings and timestamps are
//! RFC 3339 UTC in JSON. The at-rest shapes live in `db::schemas`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Currency assumed when a request omits one
pub const DEFAULT_CURRENCY: &str = "CNY";

/// Default categories seeded for a new user
pub const DEFAULT_INCOME_CATEGORIES: &[&str] = &[
    "Salary",
    "Bonus",
    "Investment",
    "Gift",
    "Refund",
    "Reimbursement",
    "Other Income",
];

pub const DEFAULT_EXPENSE_CATEGORIES: &[&str] = &[
    "Food & Dining",
    "Groceries",
    "Transportation",
    "Shopping",
    "Entertainment",
    "Healthcare",
    "Education",
    "Utilities",
    "Rent",
    "Travel",
    "Subscriptions",
    "Personal Care",
    "Gifts",
    "Other Expense",
];

/// Capability set required by the LWW merger.
///
/// All three replicated kinds satisfy it without sharing an implementation
/// hierarchy.
pub trait Replicated {
    fn id(&self) -> Uuid;
    fn last_modified_at(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    Bank,
    Cash,
    Alipay,
    Wechat,
    Credit,
    Investment,
    Other,
}

impl AccountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bank => "bank",
            Self::Cash => "cash",
            Self::Alipay => "alipay",
            Self::Wechat => "wechat",
            Self::Credit => "credit",
            Self::Investment => "investment",
            Self::Other => "other",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryType {
    Income,
    Expense,
}

impl CategoryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Expense => "expense",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "income" => Some(Self::Income),
            "expense" => Some(Self::Expense),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Income,
    Expense,
    Transfer,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Expense => "expense",
            Self::Transfer => "transfer",
        }
    }
}

/// A money account (bank card, cash wallet, payment app balance, ...)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    #[serde(rename = "type")]
    pub account_type: AccountType,
    pub currency: String,
    pub balance: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_modified_at: DateTime<Utc>,
    pub version: i32,
    pub is_deleted: bool,
}

impl Account {
    pub fn new(
        user_id: Uuid,
        name: String,
        account_type: AccountType,
        currency: String,
        balance: f64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            name,
            account_type,
            currency,
            balance,
            created_at: now,
            updated_at: now,
            last_modified_at: now,
            version: 1,
            is_deleted: false,
        }
    }
}

impl Replicated for Account {
    fn id(&self) -> Uuid {
        self.id
    }

    fn last_modified_at(&self) -> DateTime<Utc> {
        self.last_modified_at
    }
}

/// An income or expense category, optionally nested under a parent of the
/// same type
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    #[serde(rename = "type")]
    pub category_type: CategoryType,
    pub parent_id: Option<Uuid>,
    #[serde(default)]
    pub icon: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_modified_at: DateTime<Utc>,
    pub version: i32,
    pub is_deleted: bool,
}

impl Category {
    pub fn new(
        user_id: Uuid,
        name: String,
        category_type: CategoryType,
        parent_id: Option<Uuid>,
        icon: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            name,
            category_type,
            parent_id,
            icon,
            created_at: now,
            updated_at: now,
            last_modified_at: now,
            version: 1,
            is_deleted: false,
        }
    }
}

impl Replicated for Category {
    fn id(&self) -> Uuid {
        self.id
    }

    fn last_modified_at(&self) -> DateTime<Utc> {
        self.last_modified_at
    }
}

/// A single ledger entry against an account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub user_id: Uuid,
    pub account_id: Uuid,
    pub category_id: Option<Uuid>,
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    pub amount: f64,
    pub currency: String,
    #[serde(default)]
    pub note: String,
    pub transaction_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_modified_at: DateTime<Utc>,
    pub version: i32,
    pub is_deleted: bool,
}

impl Transaction {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        user_id: Uuid,
        account_id: Uuid,
        category_id: Option<Uuid>,
        transaction_type: TransactionType,
        amount: f64,
        currency: String,
        note: String,
        transaction_date: DateTime<Utc>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            account_id,
            category_id,
            transaction_type,
            amount,
            currency,
            note,
            transaction_date,
            created_at: now,
            updated_at: now,
            last_modified_at: now,
            version: 1,
            is_deleted: false,
        }
    }
}

impl Replicated for Transaction {
    fn id(&self) -> Uuid {
        self.id
    }

    fn last_modified_at(&self) -> DateTime<Utc> {
        self.last_modified_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_type_wire_names() {
        assert_eq!(
            serde_json::to_string(&AccountType::Wechat).unwrap(),
            "\"wechat\""
        );
        assert_eq!(
            serde_json::from_str::<AccountType>("\"alipay\"").unwrap(),
            AccountType::Alipay
        );
        assert!(serde_json::from_str::<AccountType>("\"paypal\"").is_err());
    }

    #[test]
    fn test_category_type_parse() {
        assert_eq!(CategoryType::parse("income"), Some(CategoryType::Income));
        assert_eq!(CategoryType::parse("expense"), Some(CategoryType::Expense));
        assert_eq!(CategoryType::parse("transfer"), None);
    }

    #[test]
    fn test_new_account_invariants() {
        let account = Account::new(
            Uuid::new_v4(),
            "Cash".into(),
            AccountType::Cash,
            DEFAULT_CURRENCY.into(),
            0.0,
        );

        assert_eq!(account.version, 1);
        assert!(!account.is_deleted);
        assert!(account.last_modified_at >= account.created_at);
    }

    #[test]
    fn test_transaction_serializes_rfc3339() {
        let tx = Transaction::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            None,
            TransactionType::Expense,
            12.5,
            DEFAULT_CURRENCY.into(),
            "lunch".into(),
            "2024-06-01T10:00:00Z".parse().unwrap(),
        );

        let json = serde_json::to_string(&tx).unwrap();
        assert!(json.contains("\"type\":\"expense\""));
        assert!(json.contains("\"transaction_date\":\"2024-06-01T10:00:00Z\""));
        assert!(json.contains("\"category_id\":null"));

        let back: Transaction = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, tx.id);
        assert_eq!(back.transaction_date, tx.transaction_date);
    }
}
