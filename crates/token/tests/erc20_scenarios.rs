//! End-to-end scenarios for the token ledger's public interface.
//!
//! Each test starts from a fresh ledger: "TestToken" / "TT", 18 decimals,
//! 100 whole tokens credited to `owner`.

use tokenledger_core::{Address, Amount, DomainError, LedgerId};
use tokenledger_token::{Ledger, Notification, TokenMetadata};

struct Fixture {
    ledger: Ledger,
    owner: Address,
    user1: Address,
    user2: Address,
}

fn setup() -> Fixture {
    let owner = Address::from_low_u64(0xA11CE);
    let (ledger, _) = Ledger::create(
        LedgerId::new(),
        owner,
        TokenMetadata::new("TestToken", "TT", 18),
        100,
    )
    .unwrap();

    Fixture {
        ledger,
        owner,
        user1: Address::from_low_u64(0xB0B),
        user2: Address::from_low_u64(0xCA201),
    }
}

/// Whole tokens at 18 decimals.
fn units(text: &str) -> Amount {
    Amount::parse_units(text, 18).unwrap()
}

mod constructor {
    use super::*;

    #[test]
    fn initializes_total_supply() {
        let f = setup();
        assert_eq!(f.ledger.total_supply(), units("100"));
    }

    #[test]
    fn assigns_total_supply_to_owner() {
        let f = setup();
        assert_eq!(f.ledger.balance_of(f.owner), units("100"));
    }

    #[test]
    fn exposes_metadata() {
        let f = setup();
        assert_eq!(f.ledger.name(), "TestToken");
        assert_eq!(f.ledger.symbol(), "TT");
        assert_eq!(f.ledger.decimals(), 18);
    }
}

mod balance_of {
    use super::*;

    #[test]
    fn untouched_address_is_zero() {
        let f = setup();
        assert_eq!(f.ledger.balance_of(f.user2), Amount::ZERO);
    }

    #[test]
    fn reflects_consecutive_transfers() {
        let mut f = setup();
        let initial = f.ledger.balance_of(f.owner);

        f.ledger.transfer(f.owner, f.user1, Amount::new(1000)).unwrap();
        assert_eq!(
            f.ledger.balance_of(f.owner),
            initial.checked_sub(Amount::new(1000)).unwrap()
        );

        f.ledger.transfer(f.user1, f.user2, Amount::new(500)).unwrap();
        assert_eq!(f.ledger.balance_of(f.user1), Amount::new(500));
        assert_eq!(f.ledger.balance_of(f.user2), Amount::new(500));
    }
}

mod transfer {
    use super::*;

    #[test]
    fn moves_tokens_between_accounts() {
        let mut f = setup();
        f.ledger.transfer(f.owner, f.user1, units("10")).unwrap();

        assert_eq!(f.ledger.balance_of(f.owner), units("90"));
        assert_eq!(f.ledger.balance_of(f.user1), units("10"));
    }

    #[test]
    fn emits_transfer_event() {
        let mut f = setup();
        let notification = f.ledger.transfer(f.owner, f.user1, Amount::new(1000)).unwrap();
        assert_eq!(
            notification,
            Notification::Transfer {
                from: f.owner,
                to: f.user1,
                amount: Amount::new(1000),
            }
        );
    }

    #[test]
    fn rejects_null_recipient() {
        let mut f = setup();
        let err = f
            .ledger
            .transfer(f.owner, Address::ZERO, Amount::new(100))
            .unwrap_err();
        assert_eq!(err, DomainError::InvalidRecipient);
        assert_eq!(err.reason(), "ERC20: transfer to the zero address");
    }

    #[test]
    fn rejects_amount_above_balance_without_side_effects() {
        let mut f = setup();
        let before = f.ledger.clone();

        let err = f.ledger.transfer(f.user1, f.owner, Amount::new(1)).unwrap_err();
        assert_eq!(err.reason(), "ERC20: transfer amount exceeds balance");
        assert_eq!(f.ledger, before);
    }

    #[test]
    fn handles_full_balance_transfer() {
        let mut f = setup();
        let full = f.ledger.balance_of(f.owner);
        f.ledger.transfer(f.owner, f.user1, full).unwrap();

        assert_eq!(f.ledger.balance_of(f.owner), Amount::ZERO);
        assert_eq!(f.ledger.balance_of(f.user1), full);
    }

    #[test]
    fn one_past_full_balance_is_rejected() {
        let mut f = setup();
        let one_past = f.ledger.balance_of(f.owner).checked_add(Amount::new(1)).unwrap();
        assert_eq!(
            f.ledger.transfer(f.owner, f.user1, one_past),
            Err(DomainError::InsufficientBalance {
                available: units("100"),
                requested: one_past,
            })
        );
    }
}

mod approve {
    use super::*;

    #[test]
    fn sets_allowance() {
        let mut f = setup();
        f.ledger.approve(f.owner, f.user1, Amount::new(1000)).unwrap();
        assert_eq!(f.ledger.allowance(f.owner, f.user1), Amount::new(1000));
    }

    #[test]
    fn emits_approval_event() {
        let mut f = setup();
        let notification = f.ledger.approve(f.owner, f.user1, Amount::new(500)).unwrap();
        assert_eq!(
            notification,
            Notification::Approval {
                owner: f.owner,
                spender: f.user1,
                amount: Amount::new(500),
            }
        );
    }

    #[test]
    fn emits_approval_for_zero_and_unchanged_amounts() {
        let mut f = setup();
        f.ledger.approve(f.owner, f.user1, Amount::new(7)).unwrap();
        let again = f.ledger.approve(f.owner, f.user1, Amount::new(7)).unwrap();
        let zero = f.ledger.approve(f.owner, f.user1, Amount::ZERO).unwrap();

        assert_eq!(again.name(), "Approval");
        assert_eq!(zero.amount(), Amount::ZERO);
        assert_eq!(f.ledger.allowance(f.owner, f.user1), Amount::ZERO);
    }

    #[test]
    fn later_approval_overwrites() {
        let mut f = setup();
        f.ledger.approve(f.owner, f.user1, Amount::new(100)).unwrap();
        f.ledger.approve(f.owner, f.user1, Amount::new(30)).unwrap();
        assert_eq!(f.ledger.allowance(f.owner, f.user1), Amount::new(30));
    }

    #[test]
    fn rejects_null_spender() {
        let mut f = setup();
        let err = f
            .ledger
            .approve(f.owner, Address::ZERO, Amount::new(100))
            .unwrap_err();
        assert_eq!(err, DomainError::InvalidSpender);
        assert_eq!(err.reason(), "ERC20: approve to the zero address");
    }

    #[test]
    fn stores_max_amount_exactly() {
        let mut f = setup();
        f.ledger.approve(f.owner, f.user1, Amount::MAX).unwrap();
        assert_eq!(f.ledger.allowance(f.owner, f.user1), Amount::MAX);
    }

    #[test]
    fn max_allowance_is_still_decremented_on_spend() {
        let mut f = setup();
        f.ledger.approve(f.owner, f.user1, Amount::MAX).unwrap();
        f.ledger
            .transfer_from(f.user1, f.owner, f.user2, units("1"))
            .unwrap();

        assert_eq!(
            f.ledger.allowance(f.owner, f.user1),
            Amount::MAX.checked_sub(units("1")).unwrap()
        );
    }
}

mod transfer_from {
    use super::*;

    fn approved() -> Fixture {
        let mut f = setup();
        f.ledger.approve(f.owner, f.user1, units("50")).unwrap();
        f
    }

    #[test]
    fn moves_tokens_using_allowance() {
        let mut f = approved();
        let notification = f
            .ledger
            .transfer_from(f.user1, f.owner, f.user2, units("20"))
            .unwrap();

        assert_eq!(f.ledger.allowance(f.owner, f.user1), units("30"));
        assert_eq!(f.ledger.balance_of(f.owner), units("80"));
        assert_eq!(f.ledger.balance_of(f.user2), units("20"));
        assert_eq!(
            notification,
            Notification::Transfer {
                from: f.owner,
                to: f.user2,
                amount: units("20"),
            }
        );
    }

    #[test]
    fn rejects_amount_above_allowance_without_side_effects() {
        let mut f = approved();
        f.ledger
            .transfer_from(f.user1, f.owner, f.user2, units("20"))
            .unwrap();
        let before = f.ledger.clone();

        let err = f
            .ledger
            .transfer_from(f.user1, f.owner, f.user2, units("60"))
            .unwrap_err();
        assert_eq!(err.reason(), "ERC20: insufficient allowance");
        assert_eq!(f.ledger, before);
    }

    #[test]
    fn updates_allowance_after_transfer() {
        let mut f = approved();
        f.ledger
            .transfer_from(f.user1, f.owner, f.user2, units("25"))
            .unwrap();
        assert_eq!(f.ledger.allowance(f.owner, f.user1), units("25"));
    }

    #[test]
    fn handles_multiple_allowances() {
        let mut f = approved();
        f.ledger.approve(f.owner, f.user2, units("30")).unwrap();
        f.ledger
            .transfer_from(f.user2, f.owner, f.user1, units("30"))
            .unwrap();

        assert_eq!(f.ledger.allowance(f.owner, f.user2), Amount::ZERO);
        assert_eq!(f.ledger.allowance(f.owner, f.user1), units("50"));
        assert_eq!(f.ledger.balance_of(f.user1), units("30"));
    }

    #[test]
    fn spending_exact_allowance_leaves_zero() {
        let mut f = approved();
        f.ledger
            .transfer_from(f.user1, f.owner, f.user2, units("50"))
            .unwrap();
        assert_eq!(f.ledger.allowance(f.owner, f.user1), Amount::ZERO);
        assert!(matches!(
            f.ledger.transfer_from(f.user1, f.owner, f.user2, Amount::new(1)),
            Err(DomainError::InsufficientAllowance { .. })
        ));
    }

    #[test]
    fn rejects_null_recipient() {
        let mut f = approved();
        assert_eq!(
            f.ledger
                .transfer_from(f.user1, f.owner, Address::ZERO, units("1")),
            Err(DomainError::InvalidRecipient)
        );
        assert_eq!(f.ledger.allowance(f.owner, f.user1), units("50"));
    }

    #[test]
    fn allowance_larger_than_balance_fails_on_balance() {
        let mut f = setup();
        f.ledger.transfer(f.owner, f.user2, units("1")).unwrap();
        f.ledger.approve(f.user2, f.user1, units("5")).unwrap();
        let before = f.ledger.clone();

        assert_eq!(
            f.ledger.transfer_from(f.user1, f.user2, f.owner, units("2")),
            Err(DomainError::InsufficientBalance {
                available: units("1"),
                requested: units("2"),
            })
        );
        assert_eq!(f.ledger, before);
    }
}
