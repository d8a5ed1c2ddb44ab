//! services/api/src/web/habits.rs
//!
//! The reading-habit tracker: one goal per user, daily progress, and a streak
//! counter. The day math lives in the domain (`Habit::apply_progress`); these
//! handlers only validate input and move state through the store.

use axum::{extract::State, response::IntoResponse, Extension, Json};
use chrono::{DateTime, Utc};
use readcircle_core::domain::{GoalType, Habit};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::ApiError;
use crate::web::middleware::AuthUser;
use crate::web::state::AppState;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HabitGoalRequest {
    pub goal_type: String,
    pub goal_value: u32,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRequest {
    pub amount: u32,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HabitBody {
    pub user_id: Uuid,
    pub goal_type: String,
    pub goal_value: u32,
    pub progress: u32,
    pub streak: u32,
    pub last_updated: DateTime<Utc>,
}

impl From<Habit> for HabitBody {
    fn from(habit: Habit) -> Self {
        Self {
            user_id: habit.user_id,
            goal_type: habit.goal_type.as_str().to_string(),
            goal_value: habit.goal_value,
            progress: habit.progress,
            streak: habit.streak,
            last_updated: habit.last_updated,
        }
    }
}

//=========================================================================================
// Handlers
//=========================================================================================

/// GET /habits - The acting user's habit state
#[utoipa::path(
    get,
    path = "/habits",
    responses(
        (status = 200, description = "Current goal, progress and streak", body = HabitBody),
        (status = 404, description = "No reading habit set"),
        (status = 401, description = "Missing or invalid token")
    )
)]
pub async fn get_habit_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    let habit = state.habits.get_habit_by_user(user.id).await?;
    Ok(Json(HabitBody::from(habit)))
}

/// PUT /habits - Set or change the goal
#[utoipa::path(
    put,
    path = "/habits",
    request_body = HabitGoalRequest,
    responses(
        (status = 200, description = "Goal stored; progress and streak untouched", body = HabitBody),
        (status = 400, description = "Unknown goal type or zero goal value"),
        (status = 401, description = "Missing or invalid token")
    )
)]
pub async fn set_habit_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<HabitGoalRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let goal_type = GoalType::parse(&payload.goal_type)
        .ok_or_else(|| ApiError::invalid("Goal type must be pages or minutes"))?;
    if payload.goal_value == 0 {
        return Err(ApiError::invalid("Goal value must be at least 1"));
    }
    let habit = state
        .habits
        .upsert_habit_goal(user.id, goal_type, payload.goal_value, Utc::now())
        .await?;
    Ok(Json(HabitBody::from(habit)))
}

/// POST /habits/progress - Report reading progress
#[utoipa::path(
    post,
    path = "/habits/progress",
    request_body = ProgressRequest,
    responses(
        (status = 200, description = "Updated progress and streak", body = HabitBody),
        (status = 400, description = "Zero amount"),
        (status = 404, description = "No reading habit set"),
        (status = 401, description = "Missing or invalid token")
    )
)]
pub async fn update_progress_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<ProgressRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if payload.amount == 0 {
        return Err(ApiError::invalid("Amount must be at least 1"));
    }

    // Read-modify-write; two simultaneous submits for one user may lose an
    // increment, which is acceptable for a personal tracker.
    let mut habit = state.habits.get_habit_by_user(user.id).await?;
    habit.apply_progress(payload.amount, Utc::now());
    state.habits.save_habit(&habit).await?;
    Ok(Json(HabitBody::from(habit)))
}
