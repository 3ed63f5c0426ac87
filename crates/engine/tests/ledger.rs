use sea_orm::{Database, DatabaseConnection, TransactionTrait};

use engine::{
    BalanceView, Engine, EngineError, ErrorKind, ExpenseInput, SplitInput, SplitType,
    apply_balance_delta, simplify_user_balances,
};
use migration::MigratorTrait;

async fn engine_with_db() -> (Engine, DatabaseConnection) {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let engine = Engine::builder()
        .database(db.clone())
        .build()
        .await
        .unwrap();
    (engine, db)
}

async fn seed(db: &DatabaseConnection, deltas: &[(&str, &str, f64)]) {
    let tx = db.begin().await.unwrap();
    for (debtor, creditor, amount) in deltas {
        apply_balance_delta(&tx, debtor, creditor, *amount)
            .await
            .unwrap();
    }
    tx.commit().await.unwrap();
}

async fn edges(engine: &Engine) -> Vec<(String, String, f64)> {
    engine
        .all_balances()
        .await
        .unwrap()
        .into_iter()
        .map(|b| (b.from_user_id, b.to_user_id, b.amount))
        .collect()
}

fn edge(from: &str, to: &str, amount: f64) -> (String, String, f64) {
    (from.to_string(), to.to_string(), amount)
}

fn assert_ledger_invariants(balances: &[BalanceView]) {
    for b in balances {
        assert_ne!(b.from_user_id, b.to_user_id, "self edge stored: {b:?}");
        assert!(b.amount > 0.0, "non-positive edge stored: {b:?}");
        assert!(
            !balances
                .iter()
                .any(|r| r.from_user_id == b.to_user_id && r.to_user_id == b.from_user_id),
            "both directions stored for {b:?}"
        );
    }
}

fn expense(
    paid_by: &str,
    total: f64,
    split_type: SplitType,
    participants: &[&str],
    splits: &[(&str, f64)],
) -> ExpenseInput {
    ExpenseInput {
        expense_id: String::new(),
        group_id: "trip".to_string(),
        paid_by: paid_by.to_string(),
        total_amount: total,
        split_type,
        participants: participants.iter().map(|p| p.to_string()).collect(),
        splits: splits
            .iter()
            .map(|(user, value)| SplitInput::new(*user, *value))
            .collect(),
        description: "dinner".to_string(),
    }
}

#[tokio::test]
async fn delta_nets_against_reverse_edge() {
    let (engine, db) = engine_with_db().await;

    let tx = db.begin().await.unwrap();
    apply_balance_delta(&tx, "alice", "bob", 10.0).await.unwrap();
    apply_balance_delta(&tx, "bob", "alice", 4.0).await.unwrap();
    tx.commit().await.unwrap();
    assert_eq!(edges(&engine).await, vec![edge("alice", "bob", 6.0)]);

    seed(&db, &[("bob", "alice", 10.0)]).await;
    assert_eq!(edges(&engine).await, vec![edge("bob", "alice", 4.0)]);
}

#[tokio::test]
async fn delta_equal_to_reverse_cancels_edge() {
    let (engine, db) = engine_with_db().await;
    seed(&db, &[("alice", "bob", 7.5), ("bob", "alice", 7.5)]).await;
    assert!(edges(&engine).await.is_empty());
}

#[tokio::test]
async fn delta_without_reverse_increments_forward_edge() {
    let (engine, db) = engine_with_db().await;
    seed(&db, &[("alice", "bob", 3.0), ("alice", "bob", 4.5)]).await;
    assert_eq!(edges(&engine).await, vec![edge("alice", "bob", 7.5)]);
}

#[tokio::test]
async fn delta_to_self_is_noop_and_amount_must_be_positive() {
    let (engine, db) = engine_with_db().await;

    let tx = db.begin().await.unwrap();
    apply_balance_delta(&tx, "alice", "alice", 5.0).await.unwrap();
    let err = apply_balance_delta(&tx, "alice", "bob", 0.0)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    let err = apply_balance_delta(&tx, "alice", "bob", -2.0)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidAmount(_)));
    tx.commit().await.unwrap();

    assert!(edges(&engine).await.is_empty());
}

#[tokio::test]
async fn equal_expense_makes_participants_owe_payer() {
    let (engine, _db) = engine_with_db().await;

    let id = engine
        .create_expense(expense(
            "alice",
            90.0,
            SplitType::Equal,
            &["alice", "bob", "carol"],
            &[],
        ))
        .await
        .unwrap();

    assert_eq!(
        edges(&engine).await,
        vec![edge("bob", "alice", 30.0), edge("carol", "alice", 30.0)]
    );

    let stored = engine.expense(&id).await.unwrap();
    assert_eq!(stored.paid_by, "alice");
    assert_eq!(stored.split_type, SplitType::Equal);
    assert_eq!(stored.amount, 90.0);
    assert_eq!(stored.description, "dinner");
    let splits: Vec<(&str, f64)> = stored
        .splits
        .iter()
        .map(|s| (s.user_id.as_str(), s.amount))
        .collect();
    assert_eq!(splits, vec![("alice", 30.0), ("bob", 30.0), ("carol", 30.0)]);
}

#[tokio::test]
async fn equal_expense_with_indivisible_total_keeps_float_shares() {
    let (engine, _db) = engine_with_db().await;

    let id = engine
        .create_expense(expense(
            "alice",
            100.0,
            SplitType::Equal,
            &["alice", "bob", "carol"],
            &[],
        ))
        .await
        .unwrap();

    let stored = engine.expense(&id).await.unwrap();
    let total: f64 = stored.splits.iter().map(|s| s.amount).sum();
    assert!((total - 100.0).abs() < 1e-9);
    assert!(stored.splits.iter().all(|s| s.amount == 100.0 / 3.0));
}

#[tokio::test]
async fn exact_and_percent_expenses_use_explicit_shares() {
    let (engine, _db) = engine_with_db().await;

    engine
        .create_expense(expense(
            "alice",
            300.0,
            SplitType::Exact,
            &["alice", "bob"],
            &[("alice", 100.0), ("bob", 200.0)],
        ))
        .await
        .unwrap();
    assert_eq!(edges(&engine).await, vec![edge("bob", "alice", 200.0)]);

    engine
        .create_expense(expense(
            "bob",
            200.0,
            SplitType::Percent,
            &["alice", "bob"],
            &[("alice", 75.0), ("bob", 25.0)],
        ))
        .await
        .unwrap();
    // alice now owes bob 150, netted against bob's 200
    assert_eq!(edges(&engine).await, vec![edge("bob", "alice", 50.0)]);
}

#[tokio::test]
async fn expense_keeps_caller_supplied_id() {
    let (engine, _db) = engine_with_db().await;

    let mut input = expense("alice", 20.0, SplitType::Equal, &["alice", "bob"], &[]);
    input.expense_id = "exp-1".to_string();
    let id = engine.create_expense(input.clone()).await.unwrap();
    assert_eq!(id, "exp-1");

    let err = engine.create_expense(input).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Storage);
    assert_eq!(edges(&engine).await, vec![edge("bob", "alice", 10.0)]);
}

#[tokio::test]
async fn invalid_split_rolls_back_whole_expense() {
    let (engine, _db) = engine_with_db().await;

    let mut input = expense(
        "alice",
        300.0,
        SplitType::Exact,
        &["alice", "bob"],
        &[("alice", 100.0), ("bob", 150.0)],
    );
    input.expense_id = "broken".to_string();

    let err = engine.create_expense(input).await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidSplit(_)));

    assert_eq!(
        engine.expense("broken").await.unwrap_err(),
        EngineError::KeyNotFound("expense broken".to_string())
    );
    assert!(edges(&engine).await.is_empty());
}

#[tokio::test]
async fn expense_input_is_validated() {
    let (engine, _db) = engine_with_db().await;

    let err = engine
        .create_expense(expense("alice", 0.0, SplitType::Equal, &["bob"], &[]))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        EngineError::InvalidAmount("total amount must be greater than 0".to_string())
    );

    let err = engine
        .create_expense(expense("", 10.0, SplitType::Equal, &["bob"], &[]))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        EngineError::InvalidInput("paid_by must be provided".to_string())
    );

    let err = engine
        .create_expense(expense("alice", 10.0, SplitType::Equal, &[], &[]))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    assert!(edges(&engine).await.is_empty());
}

#[tokio::test]
async fn settling_full_amount_removes_edge_and_records_payment() {
    let (engine, db) = engine_with_db().await;
    seed(&db, &[("bob", "alice", 25.0)]).await;

    let settlement = engine.settle_balance("bob", "alice", 25.0).await.unwrap();
    assert_eq!(settlement.from_user_id, "bob");
    assert_eq!(settlement.to_user_id, "alice");
    assert_eq!(settlement.amount, 25.0);
    assert!(edges(&engine).await.is_empty());

    let history = engine.settlements_for_user("alice").await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].id, settlement.id);
    assert_eq!(history[0].amount, 25.0);
}

#[tokio::test]
async fn partial_settlement_reduces_edge() {
    let (engine, db) = engine_with_db().await;
    seed(&db, &[("bob", "alice", 25.0)]).await;

    let first = engine.settle_balance("bob", "alice", 10.0).await.unwrap();
    let second = engine.settle_balance("bob", "alice", 5.0).await.unwrap();
    assert_ne!(first.id, second.id);
    assert_eq!(edges(&engine).await, vec![edge("bob", "alice", 10.0)]);
    assert_eq!(engine.settlements_for_user("bob").await.unwrap().len(), 2);
}

#[tokio::test]
async fn settlement_exceeding_balance_changes_nothing() {
    let (engine, db) = engine_with_db().await;
    seed(&db, &[("bob", "alice", 25.0)]).await;

    let err = engine.settle_balance("bob", "alice", 30.0).await.unwrap_err();
    assert_eq!(
        err,
        EngineError::ExceedsOutstandingBalance {
            from: "bob".to_string(),
            to: "alice".to_string(),
            requested: 30.0,
            outstanding: 25.0,
        }
    );
    assert_eq!(err.kind(), ErrorKind::StateConflict);
    assert_eq!(edges(&engine).await, vec![edge("bob", "alice", 25.0)]);
    assert!(engine.settlements_for_user("bob").await.unwrap().is_empty());
}

#[tokio::test]
async fn settlement_without_edge_fails() {
    let (engine, db) = engine_with_db().await;
    seed(&db, &[("bob", "alice", 25.0)]).await;

    // the edge only exists in the other direction
    let err = engine.settle_balance("alice", "bob", 5.0).await.unwrap_err();
    assert_eq!(
        err,
        EngineError::NoOutstandingBalance {
            from: "alice".to_string(),
            to: "bob".to_string(),
        }
    );
    assert_eq!(edges(&engine).await, vec![edge("bob", "alice", 25.0)]);
    assert!(engine.settlements_for_user("alice").await.unwrap().is_empty());
}

#[tokio::test]
async fn settlement_input_is_validated() {
    let (engine, _db) = engine_with_db().await;

    assert_eq!(
        engine.settle_balance("", "alice", 5.0).await.unwrap_err(),
        EngineError::InvalidInput("from_user_id must be provided".to_string())
    );
    assert_eq!(
        engine.settle_balance("bob", "bob", 5.0).await.unwrap_err(),
        EngineError::SelfSettlement("bob".to_string())
    );
    assert!(matches!(
        engine.settle_balance("bob", "alice", 0.0).await.unwrap_err(),
        EngineError::InvalidAmount(_)
    ));
}

#[tokio::test]
async fn simplify_removes_intermediary() {
    let (engine, db) = engine_with_db().await;
    seed(&db, &[("a", "m", 5.0), ("m", "b", 3.0)]).await;

    let transfers = engine.simplify_user_balances("m").await.unwrap();
    assert_eq!(transfers, 1);
    assert_eq!(
        edges(&engine).await,
        vec![edge("a", "b", 3.0), edge("a", "m", 2.0)]
    );
}

#[tokio::test]
async fn simplify_matches_greedily_in_counterparty_order() {
    let (engine, db) = engine_with_db().await;
    seed(
        &db,
        &[
            ("a", "m", 4.0),
            ("c", "m", 2.0),
            ("m", "b", 3.0),
            ("m", "d", 5.0),
        ],
    )
    .await;

    let tx = db.begin().await.unwrap();
    let transfers = simplify_user_balances(&tx, "m").await.unwrap();
    tx.commit().await.unwrap();

    assert_eq!(transfers, 3);
    assert_eq!(
        edges(&engine).await,
        vec![
            edge("a", "b", 3.0),
            edge("a", "d", 1.0),
            edge("c", "d", 2.0),
            edge("m", "d", 2.0),
        ]
    );
}

#[tokio::test]
async fn simplify_nets_new_edge_against_existing_reverse_debt() {
    let (engine, db) = engine_with_db().await;
    seed(&db, &[("a", "m", 5.0), ("m", "b", 5.0), ("b", "a", 2.0)]).await;

    engine.simplify_user_balances("m").await.unwrap();
    assert_eq!(edges(&engine).await, vec![edge("a", "b", 3.0)]);
}

#[tokio::test]
async fn simplify_without_chains_changes_nothing() {
    let (engine, db) = engine_with_db().await;
    seed(&db, &[("a", "m", 5.0), ("b", "m", 3.0)]).await;

    assert_eq!(engine.simplify_user_balances("m").await.unwrap(), 0);
    assert_eq!(engine.simplify_user_balances("nobody").await.unwrap(), 0);
    assert_eq!(
        edges(&engine).await,
        vec![edge("a", "m", 5.0), edge("b", "m", 3.0)]
    );
}

#[tokio::test]
async fn simplify_all_collapses_chain() {
    let (engine, db) = engine_with_db().await;
    seed(&db, &[("a", "b", 10.0), ("b", "c", 10.0), ("c", "d", 10.0)]).await;

    engine.simplify_balances().await.unwrap();
    assert_eq!(edges(&engine).await, vec![edge("a", "d", 10.0)]);
}

#[tokio::test]
async fn invariants_hold_across_mixed_operations() {
    let (engine, db) = engine_with_db().await;
    let users = ["ann", "ben", "cat", "dan", "eve"];

    for (round, payer) in users.iter().enumerate() {
        let total = 10.0 * (round as f64 + 1.0);
        engine
            .create_expense(expense(payer, total, SplitType::Equal, &users, &[]))
            .await
            .unwrap();
        assert_ledger_invariants(&engine.all_balances().await.unwrap());
    }

    seed(&db, &[("ann", "eve", 12.0), ("eve", "ben", 7.0)]).await;
    assert_ledger_invariants(&engine.all_balances().await.unwrap());

    for b in engine.user_balances("ann").await.unwrap() {
        let half = b.amount / 2.0;
        engine
            .settle_balance(&b.from_user_id, &b.to_user_id, half)
            .await
            .unwrap();
    }
    assert_ledger_invariants(&engine.all_balances().await.unwrap());

    engine.simplify_balances().await.unwrap();
    assert_ledger_invariants(&engine.all_balances().await.unwrap());
}

#[tokio::test]
async fn balance_reads_filter_by_user_and_group() {
    let (engine, _db) = engine_with_db().await;

    let alice = engine.create_user("Alice").await.unwrap();
    let bob = engine.create_user("Bob").await.unwrap();
    let carol = engine.create_user("Carol").await.unwrap();
    let group = engine.create_group("Flat").await.unwrap();
    engine.add_group_member(&group.id, &alice.id).await.unwrap();
    engine.add_group_member(&group.id, &bob.id).await.unwrap();

    let mut input = expense(
        &alice.id,
        60.0,
        SplitType::Equal,
        &[&alice.id, &bob.id, &carol.id],
        &[],
    );
    input.group_id = group.id.clone();
    engine.create_expense(input).await.unwrap();

    let group_balances = engine.group_balances(&group.id).await.unwrap();
    assert_eq!(
        group_balances,
        vec![BalanceView {
            from_user_id: bob.id.clone(),
            to_user_id: alice.id.clone(),
            amount: 20.0,
        }]
    );

    let alice_balances = engine.user_balances(&alice.id).await.unwrap();
    assert_eq!(alice_balances.len(), 2);
    assert!(alice_balances.iter().all(|b| b.to_user_id == alice.id));
    assert!(
        alice_balances
            .windows(2)
            .all(|w| w[0].from_user_id <= w[1].from_user_id)
    );

    assert_eq!(engine.user_balances(&carol.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn directory_lists_users_groups_and_members() {
    let (engine, _db) = engine_with_db().await;

    let zoe = engine.create_user("  Zoe ").await.unwrap();
    let adam = engine.create_user("Adam").await.unwrap();
    assert_eq!(zoe.name, "Zoe");
    let group = engine.create_group("Holiday").await.unwrap();
    engine.create_group("Atelier").await.unwrap();

    engine.add_group_member(&group.id, &zoe.id).await.unwrap();
    engine.add_group_member(&group.id, &adam.id).await.unwrap();

    let names: Vec<String> = engine
        .users()
        .await
        .unwrap()
        .into_iter()
        .map(|u| u.name)
        .collect();
    assert_eq!(names, vec!["Adam", "Zoe"]);

    let groups: Vec<String> = engine
        .groups()
        .await
        .unwrap()
        .into_iter()
        .map(|g| g.name)
        .collect();
    assert_eq!(groups, vec!["Atelier", "Holiday"]);

    assert_eq!(
        engine.group_members(&group.id).await.unwrap(),
        vec![adam.clone(), zoe.clone()]
    );

    assert_eq!(
        engine.add_group_member(&group.id, &zoe.id).await.unwrap_err(),
        EngineError::ExistingKey(format!("user {} in group {}", zoe.id, group.id))
    );
    assert_eq!(
        engine.add_group_member("missing", &zoe.id).await.unwrap_err(),
        EngineError::KeyNotFound("group missing".to_string())
    );
    assert!(matches!(
        engine.create_user("   ").await.unwrap_err(),
        EngineError::InvalidInput(_)
    ));
}
