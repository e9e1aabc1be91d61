//! Operation log queries

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::Router;
use chrono::NaiveDate;
use serde::Deserialize;

use crate::audit::ActionType;
use crate::db::{LogFilter, LogRepo, OperationLog};
use crate::http::access::require_manager;
use crate::http::extractors::{CurrentUser, ValidPath, ValidQuery};
use crate::http::response::{ok, ApiResult};
use crate::http::server::AppState;
use crate::models::{Page, PageQuery};

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct LogSearch {
    pub club_id: Option<i64>,
    pub action_type: Option<ActionType>,
    pub operator_name: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl LogSearch {
    fn into_filter(self, club_id: Option<i64>) -> LogFilter {
        LogFilter {
            club_id,
            action_type: self.action_type,
            operator_name: self.operator_name,
            start_date: self.start_date,
            end_date: self.end_date,
        }
    }
}

/// GET /leader/clubs/{clubId}/logs
async fn club_logs(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ValidPath(club_id): ValidPath<i64>,
    ValidQuery(page): ValidQuery<PageQuery>,
    ValidQuery(search): ValidQuery<LogSearch>,
) -> ApiResult<Page<OperationLog>> {
    require_manager(&state.pool, &user, club_id).await?;
    let filter = search.into_filter(Some(club_id));
    ok(LogRepo::new(&state.pool).list(&filter, page.into()).await?)
}

/// GET /admin/logs
async fn all_logs(
    State(state): State<Arc<AppState>>,
    ValidQuery(page): ValidQuery<PageQuery>,
    ValidQuery(search): ValidQuery<LogSearch>,
) -> ApiResult<Page<OperationLog>> {
    let club_id = search.club_id;
    let filter = search.into_filter(club_id);
    ok(LogRepo::new(&state.pool).list(&filter, page.into()).await?)
}

pub fn user_routes() -> Router<Arc<AppState>> {
    Router::new().route("/leader/clubs/{clubId}/logs", get(club_logs))
}

pub fn admin_routes() -> Router<Arc<AppState>> {
    Router::new().route("/admin/logs", get(all_logs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_string_parses_filters() {
        let search: LogSearch = serde_json::from_value(serde_json::json!({
            "actionType": "change_role",
            "operatorName": "Lee",
            "startDate": "2025-03-01",
            "clubId": 4,
        }))
        .unwrap();
        let filter = search.into_filter(Some(7));
        assert_eq!(filter.club_id, Some(7));
        assert_eq!(filter.action_type, Some(ActionType::ChangeRole));
        assert_eq!(filter.start_date, NaiveDate::from_ymd_opt(2025, 3, 1));
        assert!(filter.end_date.is_none());
    }
}
