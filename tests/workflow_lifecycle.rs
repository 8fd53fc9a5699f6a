mod common;

use common::*;
use workorbit_backend::db::models::requests::{NewRequest, RequestStatus};
use workorbit_backend::db::models::user::Role;
use workorbit_backend::workflow::engine::{self, RequestAction};
use workorbit_backend::workflow::WorkflowError;

fn new_request(title: &str) -> NewRequest {
    NewRequest {
        title: title.to_string(),
        description: "test".to_string(),
    }
}

#[tokio::test]
async fn full_lifecycle_fans_out_to_the_right_recipients() {
    let state = test_state().await;
    let employee = seed_user(&state, "erin", Role::Employee).await;
    let manager = seed_user(&state, "mara", Role::Manager).await;
    let manager2 = seed_user(&state, "mike", Role::Manager).await;
    let admin = seed_user(&state, "ada", Role::Admin).await;

    // Create: DRAFT, nobody notified.
    let request = engine::create_request(&state.pool, &employee, new_request("Laptop"))
        .await
        .unwrap();
    assert_eq!(request.status, RequestStatus::Draft);
    assert_eq!(notification_count(&state, manager.id).await, 0);

    // Submit: both managers and the admin hear about it, the creator does not.
    let request = engine::apply_transition(
        &state.pool,
        &state.registry,
        &employee,
        request.id,
        RequestAction::Submit,
    )
    .await
    .unwrap();
    assert_eq!(request.status, RequestStatus::Submitted);
    for reviewer in [manager.id, manager2.id, admin.id] {
        let kinds = notification_kinds(&state, reviewer).await;
        assert_eq!(kinds, vec![("REQUEST_SUBMITTED".to_string(), false)]);
    }
    assert_eq!(notification_count(&state, employee.id).await, 0);

    // Approve: reviewer stamp is recorded; creator and admin are told, the
    // acting manager and the uninvolved manager are not.
    let request = engine::apply_transition(
        &state.pool,
        &state.registry,
        &manager,
        request.id,
        RequestAction::Approve,
    )
    .await
    .unwrap();
    assert_eq!(request.status, RequestStatus::Approved);
    assert_eq!(request.reviewed_by, Some(manager.id));
    assert!(request.reviewed_at.is_some());
    assert_eq!(
        notification_kinds(&state, employee.id).await,
        vec![("REQUEST_APPROVED".to_string(), false)]
    );
    assert_eq!(notification_count(&state, manager.id).await, 1); // only the earlier submit
    assert_eq!(notification_count(&state, manager2.id).await, 1);
    assert_eq!(notification_count(&state, admin.id).await, 2);

    // Close: creator and managers are told, the acting admin is not.
    let request = engine::apply_transition(
        &state.pool,
        &state.registry,
        &admin,
        request.id,
        RequestAction::Close,
    )
    .await
    .unwrap();
    assert_eq!(request.status, RequestStatus::Closed);
    assert_eq!(notification_count(&state, employee.id).await, 2);
    assert_eq!(notification_count(&state, manager.id).await, 2);
    assert_eq!(notification_count(&state, manager2.id).await, 2);
    assert_eq!(notification_count(&state, admin.id).await, 2);

    // Reopen: straight back to SUBMITTED, review stamp intact.
    let request = engine::apply_transition(
        &state.pool,
        &state.registry,
        &admin,
        request.id,
        RequestAction::Reopen,
    )
    .await
    .unwrap();
    assert_eq!(request.status, RequestStatus::Submitted);
    assert_eq!(request.reviewed_by, Some(manager.id));
    assert_eq!(
        notification_kinds(&state, employee.id).await[0].0,
        "REQUEST_REOPENED"
    );
    assert_eq!(notification_count(&state, manager.id).await, 3);
}

#[tokio::test]
async fn submit_withdraw_resubmit_round_trip() {
    let state = test_state().await;
    let employee = seed_user(&state, "erin", Role::Employee).await;
    let manager = seed_user(&state, "mara", Role::Manager).await;

    let request = engine::create_request(&state.pool, &employee, new_request("Chair"))
        .await
        .unwrap();

    let request = engine::apply_transition(
        &state.pool,
        &state.registry,
        &employee,
        request.id,
        RequestAction::Submit,
    )
    .await
    .unwrap();
    assert_eq!(notification_count(&state, manager.id).await, 1);

    // Withdraw is silent.
    let request = engine::apply_transition(
        &state.pool,
        &state.registry,
        &employee,
        request.id,
        RequestAction::Withdraw,
    )
    .await
    .unwrap();
    assert_eq!(request.status, RequestStatus::Withdrawn);
    assert_eq!(notification_count(&state, manager.id).await, 1);

    // A withdrawn request can go back into the queue.
    let request = engine::apply_transition(
        &state.pool,
        &state.registry,
        &employee,
        request.id,
        RequestAction::Submit,
    )
    .await
    .unwrap();
    assert_eq!(request.status, RequestStatus::Submitted);
    assert_eq!(notification_count(&state, manager.id).await, 2);
}

#[tokio::test]
async fn version_increments_on_every_transition() {
    let state = test_state().await;
    let employee = seed_user(&state, "erin", Role::Employee).await;

    let request = engine::create_request(&state.pool, &employee, new_request("Desk"))
        .await
        .unwrap();
    assert_eq!(request.version, 0);

    let request = engine::apply_transition(
        &state.pool,
        &state.registry,
        &employee,
        request.id,
        RequestAction::Submit,
    )
    .await
    .unwrap();
    assert_eq!(request.version, 1);

    let request = engine::apply_transition(
        &state.pool,
        &state.registry,
        &employee,
        request.id,
        RequestAction::Withdraw,
    )
    .await
    .unwrap();
    assert_eq!(request.version, 2);
}

#[tokio::test]
async fn invalid_transition_reports_current_state() {
    let state = test_state().await;
    let employee = seed_user(&state, "erin", Role::Employee).await;
    let manager = seed_user(&state, "mara", Role::Manager).await;

    let request = engine::create_request(&state.pool, &employee, new_request("Monitor"))
        .await
        .unwrap();

    // Approving a DRAFT is a conflict, not a permission problem.
    let err = engine::apply_transition(
        &state.pool,
        &state.registry,
        &manager,
        request.id,
        RequestAction::Approve,
    )
    .await
    .unwrap_err();
    match err {
        WorkflowError::InvalidTransition { current } => {
            assert_eq!(current, RequestStatus::Draft)
        }
        other => panic!("expected InvalidTransition, got {other:?}"),
    }
}

#[tokio::test]
async fn wrong_role_is_forbidden() {
    let state = test_state().await;
    let employee = seed_user(&state, "erin", Role::Employee).await;
    let manager = seed_user(&state, "mara", Role::Manager).await;
    let admin = seed_user(&state, "ada", Role::Admin).await;

    let request = engine::create_request(&state.pool, &employee, new_request("Badge"))
        .await
        .unwrap();
    engine::apply_transition(
        &state.pool,
        &state.registry,
        &employee,
        request.id,
        RequestAction::Submit,
    )
    .await
    .unwrap();

    // Employees cannot review, admins cannot review, managers cannot close.
    for (actor, action) in [
        (&employee, RequestAction::Approve),
        (&admin, RequestAction::Approve),
        (&manager, RequestAction::Close),
        (&manager, RequestAction::Submit),
    ] {
        let err = engine::apply_transition(
            &state.pool,
            &state.registry,
            actor,
            request.id,
            action,
        )
        .await
        .unwrap_err();
        assert!(
            matches!(err, WorkflowError::Forbidden(_)),
            "expected Forbidden for {} by {}, got {err:?}",
            action.as_str(),
            actor.username
        );
    }
}

#[tokio::test]
async fn only_the_creator_can_submit_or_withdraw() {
    let state = test_state().await;
    let owner = seed_user(&state, "erin", Role::Employee).await;
    let other = seed_user(&state, "evan", Role::Employee).await;

    let request = engine::create_request(&state.pool, &owner, new_request("Headset"))
        .await
        .unwrap();

    let err = engine::apply_transition(
        &state.pool,
        &state.registry,
        &other,
        request.id,
        RequestAction::Submit,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, WorkflowError::Forbidden(_)));
}

#[tokio::test]
async fn create_is_employee_only_and_needs_a_title() {
    let state = test_state().await;
    let manager = seed_user(&state, "mara", Role::Manager).await;
    let employee = seed_user(&state, "erin", Role::Employee).await;

    let err = engine::create_request(&state.pool, &manager, new_request("Nope"))
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Forbidden(_)));

    let err = engine::create_request(&state.pool, &employee, new_request("   "))
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Validation(_)));
}

#[tokio::test]
async fn missing_request_is_not_found() {
    let state = test_state().await;
    let employee = seed_user(&state, "erin", Role::Employee).await;

    let err = engine::apply_transition(
        &state.pool,
        &state.registry,
        &employee,
        9999,
        RequestAction::Submit,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, WorkflowError::NotFound(_)));
}

#[tokio::test]
async fn concurrent_reviews_leave_exactly_one_winner() {
    let state = test_state().await;
    let employee = seed_user(&state, "erin", Role::Employee).await;
    let approver = seed_user(&state, "mara", Role::Manager).await;
    let rejecter = seed_user(&state, "mike", Role::Manager).await;

    let request = engine::create_request(&state.pool, &employee, new_request("Keyboard"))
        .await
        .unwrap();
    engine::apply_transition(
        &state.pool,
        &state.registry,
        &employee,
        request.id,
        RequestAction::Submit,
    )
    .await
    .unwrap();

    // Two managers race to review the same submission. The status update is
    // guarded by status + version, so exactly one commits; the other reports
    // the winner's state, never a silent overwrite.
    let approve = engine::apply_transition(
        &state.pool,
        &state.registry,
        &approver,
        request.id,
        RequestAction::Approve,
    );
    let reject = engine::apply_transition(
        &state.pool,
        &state.registry,
        &rejecter,
        request.id,
        RequestAction::Reject,
    );
    let (first, second) = tokio::join!(approve, reject);

    let (winner, loser) = match (first, second) {
        (Ok(winner), Err(loser)) => (winner, loser),
        (Err(loser), Ok(winner)) => (winner, loser),
        other => panic!("expected exactly one winner, got {other:?}"),
    };

    match loser {
        WorkflowError::InvalidTransition { current } => assert_eq!(current, winner.status),
        other => panic!("expected InvalidTransition, got {other:?}"),
    }

    let stored = engine::get_request(&state.pool, request.id).await.unwrap();
    assert_eq!(stored.status, winner.status);
    assert_eq!(stored.reviewed_by, winner.reviewed_by);
    assert_eq!(stored.version, 2); // submit + the single committed review
}

#[tokio::test]
async fn connected_recipient_gets_live_push_and_durable_row() {
    let state = test_state().await;
    let employee = seed_user(&state, "erin", Role::Employee).await;
    let manager = seed_user(&state, "mara", Role::Manager).await;
    let admin = seed_user(&state, "ada", Role::Admin).await;

    let (_conn, mut rx) = state.registry.connect(manager.id).await;

    let request = engine::create_request(&state.pool, &employee, new_request("Dock"))
        .await
        .unwrap();
    engine::apply_transition(
        &state.pool,
        &state.registry,
        &employee,
        request.id,
        RequestAction::Submit,
    )
    .await
    .unwrap();

    // Connected manager got the live payload with the running unread count.
    let payload = rx.recv().await.expect("live push");
    assert_eq!(payload["event"], "new-notification");
    assert_eq!(payload["unread_count"], 1);
    assert_eq!(payload["notification"]["type"], "REQUEST_SUBMITTED");

    // Unconnected admin still has the durable row.
    assert_eq!(
        notification_kinds(&state, admin.id).await,
        vec![("REQUEST_SUBMITTED".to_string(), false)]
    );
}
