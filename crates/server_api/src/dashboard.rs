use shared::{
    dashboard::{build_report, DashboardReport, TimeRange, TimeWindow},
    domain::{now_millis, User},
    error::ApiError,
};

use crate::{internal, ApiContext};

pub async fn dashboard(
    ctx: &ApiContext,
    actor: Option<&User>,
    range: TimeRange,
    start: Option<&str>,
    end: Option<&str>,
) -> Result<DashboardReport, ApiError> {
    let window = TimeWindow::resolve(range, start, end, now_millis()).map_err(ApiError::validation)?;
    let candidates = ctx.storage.list_candidates().await.map_err(internal)?;
    let batches = ctx.storage.list_batches().await.map_err(internal)?;
    let users = ctx.storage.list_users().await.map_err(internal)?;
    Ok(build_report(
        actor,
        &candidates,
        &batches,
        &users,
        window,
        ctx.settings.total_fees,
    ))
}
