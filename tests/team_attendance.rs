mod common;

use axum::extract::{Extension, Path, State};
use axum::Json;
use common::*;
use workorbit_backend::db::models::team::{NewTeam, UpdateTeam};
use workorbit_backend::db::models::user::Role;
use workorbit_backend::db::queries::attendance::{check_in, check_out, today};
use workorbit_backend::db::queries::team::{create_team, delete_team, update_team};

#[tokio::test]
async fn create_team_notifies_every_member() {
    let state = test_state().await;
    let manager = seed_user(&state, "mara", Role::Manager).await;
    let e1 = seed_user(&state, "erin", Role::Employee).await;
    let e2 = seed_user(&state, "evan", Role::Employee).await;

    let team = create_team(
        State(state.clone()),
        Extension(claims_for(&manager)),
        Json(NewTeam {
            name: "Platform".to_string(),
            members: vec![e1.id, e2.id],
        }),
    )
    .await
    .unwrap()
    .data
    .unwrap();

    assert_eq!(team.team.manager, manager.id);
    assert_eq!(team.members.len(), 2);
    for member in [e1.id, e2.id] {
        assert_eq!(
            notification_kinds(&state, member).await,
            vec![("TEAM_ADDED".to_string(), false)]
        );
    }
    assert_eq!(notification_count(&state, manager.id).await, 0);
}

#[tokio::test]
async fn employees_cannot_create_teams() {
    let state = test_state().await;
    let employee = seed_user(&state, "erin", Role::Employee).await;

    let err = create_team(
        State(state.clone()),
        Extension(claims_for(&employee)),
        Json(NewTeam {
            name: "Rogue".to_string(),
            members: vec![],
        }),
    )
    .await
    .unwrap_err();
    assert_eq!(err.status_code, 403);
}

#[tokio::test]
async fn members_must_be_existing_employees() {
    let state = test_state().await;
    let manager = seed_user(&state, "mara", Role::Manager).await;
    let other_manager = seed_user(&state, "mike", Role::Manager).await;

    // A manager id is not a valid member.
    let err = create_team(
        State(state.clone()),
        Extension(claims_for(&manager)),
        Json(NewTeam {
            name: "Mixed".to_string(),
            members: vec![other_manager.id],
        }),
    )
    .await
    .unwrap_err();
    assert_eq!(err.status_code, 422);
}

#[tokio::test]
async fn membership_diff_notifies_added_and_removed() {
    let state = test_state().await;
    let manager = seed_user(&state, "mara", Role::Manager).await;
    let stays = seed_user(&state, "erin", Role::Employee).await;
    let leaves = seed_user(&state, "evan", Role::Employee).await;
    let joins = seed_user(&state, "eli", Role::Employee).await;

    let team = create_team(
        State(state.clone()),
        Extension(claims_for(&manager)),
        Json(NewTeam {
            name: "Platform".to_string(),
            members: vec![stays.id, leaves.id],
        }),
    )
    .await
    .unwrap()
    .data
    .unwrap();

    let updated = update_team(
        State(state.clone()),
        Extension(claims_for(&manager)),
        Path(team.team.id),
        Json(UpdateTeam {
            name: None,
            members: Some(vec![stays.id, joins.id]),
        }),
    )
    .await
    .unwrap()
    .data
    .unwrap();

    let ids: Vec<i64> = updated.members.iter().map(|m| m.id).collect();
    assert!(ids.contains(&stays.id) && ids.contains(&joins.id));
    assert!(!ids.contains(&leaves.id));

    // Unchanged member: only the original TEAM_ADDED.
    assert_eq!(notification_count(&state, stays.id).await, 1);
    assert_eq!(
        notification_kinds(&state, joins.id).await,
        vec![("TEAM_ADDED".to_string(), false)]
    );
    assert_eq!(
        notification_kinds(&state, leaves.id).await[0].0,
        "TEAM_REMOVED"
    );
}

#[tokio::test]
async fn only_the_owning_manager_or_admin_may_delete() {
    let state = test_state().await;
    let owner = seed_user(&state, "mara", Role::Manager).await;
    let other = seed_user(&state, "mike", Role::Manager).await;
    let admin = seed_user(&state, "ada", Role::Admin).await;

    let team = create_team(
        State(state.clone()),
        Extension(claims_for(&owner)),
        Json(NewTeam {
            name: "Ops".to_string(),
            members: vec![],
        }),
    )
    .await
    .unwrap()
    .data
    .unwrap();

    let err = delete_team(
        State(state.clone()),
        Extension(claims_for(&other)),
        Path(team.team.id),
    )
    .await
    .unwrap_err();
    assert_eq!(err.status_code, 403);

    delete_team(
        State(state.clone()),
        Extension(claims_for(&admin)),
        Path(team.team.id),
    )
    .await
    .unwrap();
}

#[tokio::test]
async fn deleting_a_team_preserves_member_notifications() {
    let state = test_state().await;
    let manager = seed_user(&state, "mara", Role::Manager).await;
    let member = seed_user(&state, "erin", Role::Employee).await;

    let team = create_team(
        State(state.clone()),
        Extension(claims_for(&manager)),
        Json(NewTeam {
            name: "Short-lived".to_string(),
            members: vec![member.id],
        }),
    )
    .await
    .unwrap()
    .data
    .unwrap();
    assert_eq!(
        notification_kinds(&state, member.id).await,
        vec![("TEAM_ADDED".to_string(), false)]
    );

    // The TEAM_ADDED row references the team; deletion must still succeed.
    delete_team(
        State(state.clone()),
        Extension(claims_for(&manager)),
        Path(team.team.id),
    )
    .await
    .unwrap();

    // The notification is recipient-owned history and outlives the team,
    // with its team reference cleared.
    let related_team: Option<i64> = sqlx::query_scalar(
        "SELECT related_team FROM notifications WHERE recipient = ?1",
    )
    .bind(member.id)
    .fetch_one(&state.pool)
    .await
    .unwrap();
    assert_eq!(related_team, None);
    assert_eq!(notification_count(&state, member.id).await, 1);
}

#[tokio::test]
async fn check_in_is_once_per_day_and_self_notifies() {
    let state = test_state().await;
    let user = seed_user(&state, "erin", Role::Employee).await;

    let attendance = check_in(State(state.clone()), Extension(claims_for(&user)))
        .await
        .unwrap()
        .data
        .unwrap();
    assert!(attendance.check_out.is_none());
    assert_eq!(
        notification_kinds(&state, user.id).await,
        vec![("ATTENDANCE_MARKED".to_string(), false)]
    );

    let err = check_in(State(state.clone()), Extension(claims_for(&user)))
        .await
        .unwrap_err();
    assert_eq!(err.status_code, 409);
}

#[tokio::test]
async fn check_out_records_total_hours() {
    let state = test_state().await;
    let user = seed_user(&state, "erin", Role::Employee).await;

    check_in(State(state.clone()), Extension(claims_for(&user)))
        .await
        .unwrap();

    let attendance = check_out(State(state.clone()), Extension(claims_for(&user)))
        .await
        .unwrap()
        .data
        .unwrap();
    assert!(attendance.check_out.is_some());
    let hours = attendance.total_hours.expect("hours recorded");
    assert!((0.0..0.1).contains(&hours));

    // Second check-out is a conflict.
    let err = check_out(State(state.clone()), Extension(claims_for(&user)))
        .await
        .unwrap_err();
    assert_eq!(err.status_code, 409);

    // Today reflects the completed record.
    let today_record = today(State(state.clone()), Extension(claims_for(&user)))
        .await
        .unwrap()
        .data
        .unwrap()
        .expect("attendance today");
    assert_eq!(today_record.id, attendance.id);
}

#[tokio::test]
async fn check_out_without_check_in_is_not_found() {
    let state = test_state().await;
    let user = seed_user(&state, "erin", Role::Employee).await;

    let err = check_out(State(state.clone()), Extension(claims_for(&user)))
        .await
        .unwrap_err();
    assert_eq!(err.status_code, 404);
}
