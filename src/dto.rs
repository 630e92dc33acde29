use rust_decimal::Decimal;
use rust_decimal::RoundingStrategy;
use serde::de::Deserializer;
use serde::{Deserialize, Serialize};

use crate::stores::{Account, AccountId};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum CommandType {
    Open,
    Deposit,
    Withdrawal,
    Transfer,
}

/// One row of a command file: `type,account,counterparty,name,amount`.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct Command {
    #[serde(rename = "type")]
    pub cmd_type: CommandType,
    pub account: Option<AccountId>,
    pub counterparty: Option<AccountId>,
    pub name: Option<String>,
    #[serde(deserialize_with = "deserialize_decimal_4dp")]
    pub amount: Option<Decimal>,
}

/// Parses the amount straight from its text, never through a float.
fn deserialize_decimal_4dp<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
where
    D: Deserializer<'de>,
{
    rust_decimal::serde::str_option::deserialize(deserializer)
        .map(|opt_dec| opt_dec.map(|dec| dec.round_dp_with_strategy(4, RoundingStrategy::ToZero)))
}

/// Balance line written after a run.
#[derive(Debug, Serialize, PartialEq)]
pub struct AccountRow {
    pub account: AccountId,
    pub name: String,
    pub balance: Decimal,
}

impl From<Account> for AccountRow {
    fn from(account: Account) -> Self {
        Self {
            account: account.id,
            name: account.name,
            balance: account.balance.normalize(),
        }
    }
}
