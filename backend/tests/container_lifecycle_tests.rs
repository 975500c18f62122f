//! Container lifecycle tests
//!
//! Tests for the container state machine including:
//! - Property 1: An empty container is always approved
//! - Property 2: Approval is idempotent and never changes the stock level
//! - Property 3: Stock-in is only accepted by an empty container

use chrono::Utc;
use proptest::prelude::*;
use rust_decimal::Decimal;
use shared::{
    plan_unload, Container, ContainerContent, ContainerState, ContainerTransition, ContainerType,
    DomainError, StockLevel,
};
use uuid::Uuid;

fn container(stock_level: StockLevel, approved: bool) -> Container {
    let now = Utc::now();
    Container {
        id: Uuid::new_v4(),
        plant_id: Uuid::new_v4(),
        container_type: ContainerType::Pallet,
        code: "PAL-001".to_string(),
        name: "PAL-001".to_string(),
        address: None,
        enabled: true,
        stock_level,
        approved,
        product_id: None,
        store_id: None,
        location_id: None,
        created_at: now,
        updated_at: now,
    }
}

fn content(container: &Container, quantity: i64) -> ContainerContent {
    ContainerContent {
        id: Uuid::new_v4(),
        plant_id: container.plant_id,
        container_id: container.id,
        product_id: Uuid::new_v4(),
        quantity: Decimal::from(quantity),
        barcode: None,
        created_at: Utc::now(),
    }
}

fn transition_strategy() -> impl Strategy<Value = ContainerTransition> {
    prop_oneof![
        Just(ContainerTransition::StockIn),
        Just(ContainerTransition::Approve),
        Just(ContainerTransition::MarkFull),
        (0usize..3).prop_map(|remaining_rows| ContainerTransition::Unload { remaining_rows }),
    ]
}

fn state_strategy() -> impl Strategy<Value = ContainerState> {
    prop_oneof![
        Just(ContainerState::initial()),
        any::<bool>().prop_map(|approved| ContainerState {
            stock_level: StockLevel::Partial,
            approved
        }),
        any::<bool>().prop_map(|approved| ContainerState {
            stock_level: StockLevel::Full,
            approved
        }),
    ]
}

// ============================================================================
// Property-Based Tests
// ============================================================================

proptest! {
    /// Property 1: Empty Implies Approved
    /// Whatever sequence of transitions is attempted, every reachable state keeps
    /// `stock_level = EMPTY => approved = true`.
    #[test]
    fn test_reachable_states_are_consistent(
        transitions in prop::collection::vec(transition_strategy(), 0..30),
    ) {
        let mut state = ContainerState::initial();
        prop_assert!(state.is_consistent());

        for transition in transitions {
            if let Ok(next) = state.apply(transition) {
                state = next;
            }
            prop_assert!(state.is_consistent());
        }
    }

    /// Property 2: Approval Idempotence
    #[test]
    fn test_approve_twice_equals_approve_once(state in state_strategy()) {
        let once = state.apply(ContainerTransition::Approve).unwrap();
        let twice = once.apply(ContainerTransition::Approve).unwrap();

        prop_assert_eq!(once, twice);
        prop_assert!(once.approved);
        prop_assert_eq!(once.stock_level, state.stock_level);
    }

    /// Property 3: Stock-In Exclusivity
    #[test]
    fn test_stock_in_requires_empty(state in state_strategy()) {
        let result = state.apply(ContainerTransition::StockIn);
        if state.stock_level == StockLevel::Empty {
            let next = result.unwrap();
            prop_assert_eq!(next.stock_level, StockLevel::Full);
            prop_assert!(!next.approved);
        } else {
            let is_conflict = matches!(result, Err(DomainError::Conflict { .. }));
            prop_assert!(is_conflict);
        }
    }

    /// Mark full never touches the approval flag
    #[test]
    fn test_mark_full_keeps_approval(approved in any::<bool>()) {
        let partial = ContainerState { stock_level: StockLevel::Partial, approved };
        let next = partial.apply(ContainerTransition::MarkFull).unwrap();
        prop_assert_eq!(next.stock_level, StockLevel::Full);
        prop_assert_eq!(next.approved, approved);
    }

    /// Unloading part of a row never empties the container
    #[test]
    fn test_partial_unload_leaves_partial(held in 2i64..1000, taken_fraction in 1i64..100) {
        let taken = (held * taken_fraction / 100).max(1).min(held - 1);
        let c = container(StockLevel::Full, true);
        let row = content(&c, held);

        let plan = plan_unload(&c, &[row.clone()], row.id, Decimal::from(taken)).unwrap();
        prop_assert!(!plan.deletes_row());
        prop_assert_eq!(plan.remaining_quantity, Decimal::from(held - taken));
        prop_assert_eq!(plan.next_state.stock_level, StockLevel::Partial);
        prop_assert!(!plan.next_state.approved);
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    /// Create -> stock-in -> approve, then a second stock-in is rejected
    #[test]
    fn test_pallet_receive_and_approve_scenario() {
        let created = ContainerState::initial();
        assert_eq!(created.stock_level, StockLevel::Empty);
        assert!(created.approved);

        let stocked = created.apply(ContainerTransition::StockIn).unwrap();
        assert_eq!(stocked.stock_level, StockLevel::Full);
        assert!(!stocked.approved);

        let approved = stocked.apply(ContainerTransition::Approve).unwrap();
        assert_eq!(approved.stock_level, StockLevel::Full);
        assert!(approved.approved);

        match approved.apply(ContainerTransition::StockIn) {
            Err(DomainError::Conflict { message, .. }) => {
                assert_eq!(message, "container not empty")
            }
            other => panic!("expected conflict, got {:?}", other),
        }
    }

    #[test]
    fn test_mark_full_on_empty_is_invalid_state() {
        let result = ContainerState::initial().apply(ContainerTransition::MarkFull);
        assert!(matches!(result, Err(DomainError::InvalidState(_))));
    }

    #[test]
    fn test_mark_full_is_idempotent_from_full() {
        let full = ContainerState {
            stock_level: StockLevel::Full,
            approved: false,
        };
        assert_eq!(full.apply(ContainerTransition::MarkFull).unwrap(), full);
    }

    #[test]
    fn test_unloading_last_row_empties_and_approves() {
        let c = container(StockLevel::Partial, false);
        let row = content(&c, 50);

        let plan = plan_unload(&c, &[row.clone()], row.id, Decimal::from(50)).unwrap();
        assert!(plan.deletes_row());
        assert!(plan.clears_container());
        assert_eq!(plan.next_state, ContainerState::initial());
    }

    #[test]
    fn test_unloading_one_of_two_rows_leaves_partial() {
        let c = container(StockLevel::Full, true);
        let first = content(&c, 10);
        let second = content(&c, 20);

        let plan = plan_unload(&c, &[first.clone(), second], first.id, Decimal::from(10)).unwrap();
        assert!(plan.deletes_row());
        assert!(!plan.clears_container());
        assert_eq!(plan.next_state.stock_level, StockLevel::Partial);
    }

    #[test]
    fn test_unloading_more_than_held_names_quantity() {
        let c = container(StockLevel::Full, true);
        let row = content(&c, 5);

        match plan_unload(&c, &[row.clone()], row.id, Decimal::from(6)) {
            Err(DomainError::Validation { field, value, .. }) => {
                assert_eq!(field, "quantity");
                assert_eq!(value.as_deref(), Some("6"));
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_unloading_empty_container_is_invalid_state() {
        let c = container(StockLevel::Empty, true);
        let result = plan_unload(&c, &[], Uuid::new_v4(), Decimal::ONE);
        assert!(matches!(result, Err(DomainError::InvalidState(_))));
    }

    #[test]
    fn test_disabled_container_rejects_stock_in() {
        let mut c = container(StockLevel::Empty, true);
        c.enabled = false;
        assert!(matches!(
            c.ensure_accepts_stock_in(),
            Err(DomainError::InvalidState(_))
        ));
    }
}
