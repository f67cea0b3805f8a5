//! Catalogue of the tables mirrored between the device and the remote.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// A table tracked by the local cache and the remote backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TableName {
    #[serde(rename = "receitas")]
    Income,
    #[serde(rename = "despesas")]
    Expenses,
    #[serde(rename = "dividas")]
    Debts,
    #[serde(rename = "saldos_bancarios")]
    BankBalances,
    #[serde(rename = "categorias")]
    Categories,
}

impl TableName {
    /// Every tracked table, in the order push and pull visit them.
    pub const ALL: [Self; 5] = [
        Self::Income,
        Self::Expenses,
        Self::Debts,
        Self::BankBalances,
        Self::Categories,
    ];

    /// Name of the table on the remote backend and in the local store.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Income => "receitas",
            Self::Expenses => "despesas",
            Self::Debts => "dividas",
            Self::BankBalances => "saldos_bancarios",
            Self::Categories => "categorias",
        }
    }

    /// Whether records of this table carry a month reference.
    pub const fn has_month(self) -> bool {
        matches!(self, Self::Income | Self::Expenses | Self::Debts)
    }

    /// Date field the month reference is derived from.
    pub const fn date_field(self) -> Option<&'static str> {
        match self {
            Self::Income => Some("data_recebimento"),
            Self::Expenses => Some("data_pagamento"),
            Self::Debts => Some("data_vencimento"),
            Self::BankBalances | Self::Categories => None,
        }
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TableName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        let table = match normalized.as_str() {
            "receitas" | "income" => Self::Income,
            "despesas" | "expenses" => Self::Expenses,
            "dividas" | "debts" => Self::Debts,
            "saldos_bancarios" | "bank_balances" | "balances" => Self::BankBalances,
            "categorias" | "categories" => Self::Categories,
            _ => return Err(Error::InvalidInput(format!("Unknown table: {s}"))),
        };
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_remote_and_english_names() {
        assert_eq!("despesas".parse::<TableName>().unwrap(), TableName::Expenses);
        assert_eq!(" Income ".parse::<TableName>().unwrap(), TableName::Income);
        assert_eq!(
            "saldos_bancarios".parse::<TableName>().unwrap(),
            TableName::BankBalances
        );
        assert!("notes".parse::<TableName>().is_err());
    }

    #[test]
    fn month_dimension_matches_date_field() {
        for table in TableName::ALL {
            assert_eq!(table.has_month(), table.date_field().is_some(), "{table}");
        }
    }

    #[test]
    fn serializes_as_remote_name() {
        let json = serde_json::to_string(&TableName::Debts).unwrap();
        assert_eq!(json, "\"dividas\"");
    }
}
