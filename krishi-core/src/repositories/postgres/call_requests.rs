// krishi-core/src/repositories/postgres/call_requests.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row};

use krishi_common::Error;
use krishi_common::models::call_request::{CallRequest, CallStatus};
use krishi_common::traits::repository_traits::CallRequestRepository;

#[derive(Clone)]
pub struct PostgresCallRequestRepository {
    pool: Pool<Postgres>,
}

impl PostgresCallRequestRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

fn parse_status(raw: &str) -> Result<CallStatus, Error> {
    match raw {
        "requested" => Ok(CallStatus::Requested),
        "fulfilled" => Ok(CallStatus::Fulfilled),
        "cancelled" => Ok(CallStatus::Cancelled),
        other => Err(Error::Parse(format!("invalid call status: {other}"))),
    }
}

fn row_to_request(row: PgRow) -> Result<CallRequest, Error> {
    let status = parse_status(&row.try_get::<String, _>("status")?)?;
    Ok(CallRequest {
        id: row.try_get("call_request_id")?,
        user_id: row.try_get("user_id")?,
        user_name: row.try_get("user_name")?,
        paid: row.try_get("paid")?,
        agent_id: row.try_get("agent_id")?,
        message: row.try_get("message")?,
        request_time: row.try_get::<DateTime<Utc>, _>("request_time")?,
        status,
        fulfilled_time: row.try_get::<Option<DateTime<Utc>>, _>("fulfilled_time")?,
        remarks: row.try_get("remarks")?,
    })
}

#[async_trait]
impl CallRequestRepository for PostgresCallRequestRepository {
    async fn insert(&self, request: &CallRequest) -> Result<(), Error> {
        sqlx::query(
            r#"
            INSERT INTO call_requests (
                call_request_id,
                user_id,
                user_name,
                paid,
                agent_id,
                message,
                request_time,
                status,
                fulfilled_time,
                remarks
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(&request.id)
        .bind(&request.user_id)
        .bind(&request.user_name)
        .bind(request.paid)
        .bind(&request.agent_id)
        .bind(&request.message)
        .bind(request.request_time)
        .bind(request.status.as_str())
        .bind(request.fulfilled_time)
        .bind(&request.remarks)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<CallRequest>, Error> {
        let row = sqlx::query(
            r#"
            SELECT call_request_id, user_id, user_name, paid, agent_id,
                   message, request_time, status, fulfilled_time, remarks
            FROM call_requests
            WHERE call_request_id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(row_to_request).transpose()
    }

    async fn list_all(&self) -> Result<Vec<CallRequest>, Error> {
        let rows = sqlx::query(
            r#"
            SELECT call_request_id, user_id, user_name, paid, agent_id,
                   message, request_time, status, fulfilled_time, remarks
            FROM call_requests
            ORDER BY request_time DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_request).collect()
    }

    async fn mark_terminal(
        &self,
        id: &str,
        status: CallStatus,
        remarks: Option<&str>,
        fulfilled_time: Option<DateTime<Utc>>,
    ) -> Result<bool, Error> {
        // The status guard makes terminal states final: a second fulfill or
        // a cancel-after-fulfill matches zero rows.
        let result = sqlx::query(
            r#"
            UPDATE call_requests
            SET status = $2,
                remarks = $3,
                fulfilled_time = $4
            WHERE call_request_id = $1
              AND status = 'requested'
            "#,
        )
        .bind(id)
        .bind(status.as_str())
        .bind(remarks)
        .bind(fulfilled_time)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
