// src/api/team.rs
use crate::app_state::AppState;
use crate::db::queries::team::*;
use axum::{
    routing::{get, post},
    Router,
};

pub fn team_routes() -> Router<AppState> {
    Router::new()
        .route("/teams", post(create_team).get(all_teams))
        .route("/teams/mine", get(my_teams))
        .route("/teams/employees", get(get_employees))
        .route(
            "/teams/{team_id}",
            get(get_team).patch(update_team).delete(delete_team),
        )
}
