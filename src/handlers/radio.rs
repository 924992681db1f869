//! `/users` — per-day counts of notes visible to the caller over the past
//! week, each linking to that day's inbox digest.

use std::sync::Arc;

use sqlx::types::chrono::NaiveDate;

use crate::app_error::AppError;
use crate::gemini::{Request, Writer};
use crate::server::{Conn, Handler};

pub async fn view(
    handler: &Arc<Handler>,
    writer: &mut Writer<Conn>,
    req: &Request,
    _caps: Vec<String>,
) -> Result<(), AppError> {
    let viewer = req.user.as_ref().ok_or(AppError::AuthRequired)?;

    let rows: Vec<(NaiveDate, i64)> = sqlx::query_as(
        "SELECT inserted::date, COUNT(*) FROM feed \
         WHERE follower = $1 AND inserted > now() - interval '7 days' \
         GROUP BY 1 ORDER BY 1 DESC",
    )
    .bind(&viewer.id)
    .fetch_all(&handler.db)
    .await
    .map_err(|e| AppError::storage(e.to_string()))?;

    writer.ok().await?;
    writer.title("Radio").await?;
    writer.empty().await?;

    if rows.is_empty() {
        writer.text("No follows").await?;
    } else {
        for (date, count) in rows {
            writer
                .link(&format!("/users/inbox/{date}"), &format!("{date} ({count})"))
                .await?;
        }
    }

    Ok(())
}
