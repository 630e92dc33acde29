use bank_ledger::db::MemoryDatabase;
use bank_ledger::{Engine, Error, TransactionType};
use proptest::prelude::*;
use rust_decimal::Decimal;

fn engine() -> Engine<MemoryDatabase> {
    Engine::new(MemoryDatabase::default())
}

fn cents(value: i64) -> Decimal {
    Decimal::new(value, 2)
}

/// Balance in cents, and a withdrawal no larger than it.
fn covered_withdrawal() -> impl Strategy<Value = (i64, i64)> {
    (1i64..10_000_000).prop_flat_map(|balance| (Just(balance), 1..=balance))
}

/// Balance in cents, and a debit strictly larger than it.
fn overdraft() -> impl Strategy<Value = (i64, i64)> {
    (0i64..10_000_000).prop_flat_map(|balance| (Just(balance), balance + 1..balance + 1_000_000))
}

proptest! {
    #[test]
    fn created_account_is_found_as_created(name in "[a-z]{1,12}", balance in 0i64..10_000_000) {
        let engine = engine();
        let account = engine.create_account(&name, cents(balance)).unwrap();
        let found = engine.find_account(account.id).unwrap();
        prop_assert_eq!(found.name, name);
        prop_assert_eq!(found.balance, cents(balance));
    }

    #[test]
    fn negative_opening_balance_persists_nothing(balance in 1i64..10_000_000) {
        let engine = engine();
        let result = engine.create_account("alice", -cents(balance));
        prop_assert!(matches!(result, Err(Error::Validation(_))));
        prop_assert!(engine.accounts().unwrap().is_empty());
    }

    #[test]
    fn covered_withdrawal_debits_exactly((balance, withdrawal) in covered_withdrawal()) {
        let engine = engine();
        let account = engine.create_account("alice", cents(balance)).unwrap();

        let ref_id = engine.post_transaction(account.id, -cents(withdrawal)).unwrap();

        prop_assert_eq!(
            engine.find_account(account.id).unwrap().balance,
            cents(balance - withdrawal)
        );
        let history = engine.find_account_transactions(account.id).unwrap();
        prop_assert_eq!(history.len(), 1);
        prop_assert_eq!(history[0].tx_type, TransactionType::Withdrawal);
        prop_assert_eq!(history[0].amount, cents(withdrawal));
        prop_assert_eq!(history[0].ref_id, ref_id);
    }

    #[test]
    fn overdraft_leaves_account_untouched((balance, withdrawal) in overdraft()) {
        let engine = engine();
        let account = engine.create_account("alice", cents(balance)).unwrap();

        let result = engine.post_transaction(account.id, -cents(withdrawal));

        prop_assert!(matches!(result, Err(Error::InsufficientFunds { .. })), "unexpected result: {:?}", result);
        prop_assert_eq!(engine.find_account(account.id).unwrap().balance, cents(balance));
        prop_assert!(engine.find_account_transactions(account.id).unwrap().is_empty());
    }

    #[test]
    fn deposit_credits_exactly(balance in 0i64..10_000_000, deposit in 0i64..10_000_000) {
        let engine = engine();
        let account = engine.create_account("alice", cents(balance)).unwrap();

        engine.post_transaction(account.id, cents(deposit)).unwrap();

        prop_assert_eq!(
            engine.find_account(account.id).unwrap().balance,
            cents(balance + deposit)
        );
        let history = engine.find_account_transactions(account.id).unwrap();
        prop_assert_eq!(history.len(), 1);
        prop_assert_eq!(history[0].tx_type, TransactionType::Deposit);
        prop_assert_eq!(history[0].amount, cents(deposit));
    }

    #[test]
    fn transfer_legs_pair_up((balance, amount) in covered_withdrawal(), other in 0i64..10_000_000) {
        let engine = engine();
        let from = engine.create_account("from", cents(balance)).unwrap();
        let to = engine.create_account("to", cents(other)).unwrap();

        let ref_id = engine.transfer(from.id, to.id, cents(amount)).unwrap();

        let legs: Vec<_> = engine
            .find_account_transactions(from.id)
            .unwrap()
            .into_iter()
            .chain(engine.find_account_transactions(to.id).unwrap())
            .filter(|record| record.ref_id == ref_id)
            .collect();
        prop_assert_eq!(legs.len(), 2);
        prop_assert_eq!(legs[0].account_id, from.id);
        prop_assert_eq!(legs[0].tx_type, TransactionType::Withdrawal);
        prop_assert_eq!(legs[1].account_id, to.id);
        prop_assert_eq!(legs[1].tx_type, TransactionType::Deposit);
        prop_assert_eq!(legs[0].amount, legs[1].amount);
        prop_assert_eq!(legs[0].amount, cents(amount));

        let total = engine.find_account(from.id).unwrap().balance
            + engine.find_account(to.id).unwrap().balance;
        prop_assert_eq!(total, cents(balance + other));
    }

    #[test]
    fn non_positive_transfer_changes_nothing(amount in -10_000_000i64..=0) {
        let engine = engine();
        let from = engine.create_account("from", cents(500)).unwrap();
        let to = engine.create_account("to", cents(500)).unwrap();

        let result = engine.transfer(from.id, to.id, cents(amount));

        prop_assert!(matches!(result, Err(Error::Validation(_))));
        prop_assert_eq!(engine.find_account(from.id).unwrap().balance, cents(500));
        prop_assert_eq!(engine.find_account(to.id).unwrap().balance, cents(500));
    }

    #[test]
    fn underfunded_transfer_changes_nothing((balance, amount) in overdraft()) {
        let engine = engine();
        let from = engine.create_account("from", cents(balance)).unwrap();
        let to = engine.create_account("to", cents(100)).unwrap();

        let result = engine.transfer(from.id, to.id, cents(amount));

        prop_assert!(matches!(result, Err(Error::InsufficientFunds { .. })), "unexpected result: {:?}", result);
        prop_assert_eq!(engine.find_account(from.id).unwrap().balance, cents(balance));
        prop_assert_eq!(engine.find_account(to.id).unwrap().balance, cents(100));
        prop_assert!(engine.find_account_transactions(from.id).unwrap().is_empty());
        prop_assert!(engine.find_account_transactions(to.id).unwrap().is_empty());
    }
}
