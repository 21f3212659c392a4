//! Competitor analysis groups and their asynchronous report results (C8).

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde_json::Value as Json;
use sqlx::{PgPool, Row};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct AnalysisGroupRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub main_product_id: Uuid,
    pub update_frequency: String,
    pub is_active: bool,
    pub next_analysis_at: Option<DateTime<Utc>>,
    pub last_analysis_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

fn analysis_group_from_row(row: &sqlx::postgres::PgRow) -> Result<AnalysisGroupRow> {
    Ok(AnalysisGroupRow {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        main_product_id: row.try_get("main_product_id")?,
        update_frequency: row.try_get("update_frequency")?,
        is_active: row.try_get("is_active")?,
        next_analysis_at: row.try_get("next_analysis_at")?,
        last_analysis_at: row.try_get("last_analysis_at")?,
        created_at: row.try_get("created_at")?,
    })
}

#[derive(Debug, Clone)]
pub struct AnalysisResultRow {
    pub id: Uuid,
    pub group_id: Uuid,
    pub task_id: Uuid,
    pub queue_id: Option<String>,
    pub status: String,
    pub analysis_data: Option<Json>,
    pub insights: Option<Json>,
    pub recommendations: Option<Json>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

fn analysis_result_from_row(row: &sqlx::postgres::PgRow) -> Result<AnalysisResultRow> {
    Ok(AnalysisResultRow {
        id: row.try_get("id")?,
        group_id: row.try_get("group_id")?,
        task_id: row.try_get("task_id")?,
        queue_id: row.try_get("queue_id")?,
        status: row.try_get("status")?,
        analysis_data: row.try_get("analysis_data")?,
        insights: row.try_get("insights")?,
        recommendations: row.try_get("recommendations")?,
        error_message: row.try_get("error_message")?,
        created_at: row.try_get("created_at")?,
        completed_at: row.try_get("completed_at")?,
    })
}

/// Creates a group and links its competitors in one transaction
/// (`POST /competitor/analysis` façade contract).
pub async fn create_analysis_group(
    pool: &PgPool,
    user_id: Uuid,
    name: &str,
    description: Option<&str>,
    main_product_id: Uuid,
    competitor_product_ids: &[Uuid],
) -> Result<AnalysisGroupRow> {
    let mut tx = pool.begin().await.context("create_analysis_group: begin failed")?;

    let row = sqlx::query(
        r#"
        insert into competitor_analysis_groups (user_id, name, description, main_product_id)
        values ($1, $2, $3, $4)
        returning *
        "#,
    )
    .bind(user_id)
    .bind(name)
    .bind(description)
    .bind(main_product_id)
    .fetch_one(&mut *tx)
    .await
    .context("create_analysis_group: insert group failed")?;
    let group = analysis_group_from_row(&row)?;

    for competitor_id in competitor_product_ids {
        sqlx::query(
            "insert into competitor_analysis_group_competitors (group_id, product_id) values ($1, $2)",
        )
        .bind(group.id)
        .bind(competitor_id)
        .execute(&mut *tx)
        .await
        .context("create_analysis_group: insert competitor link failed")?;
    }

    tx.commit().await.context("create_analysis_group: commit failed")?;
    Ok(group)
}

pub async fn get_analysis_group(pool: &PgPool, id: Uuid) -> Result<Option<AnalysisGroupRow>> {
    let row = sqlx::query("select * from competitor_analysis_groups where id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("get_analysis_group failed")?;
    row.as_ref().map(analysis_group_from_row).transpose()
}

pub async fn list_group_competitor_ids(pool: &PgPool, group_id: Uuid) -> Result<Vec<Uuid>> {
    let rows = sqlx::query(
        "select product_id from competitor_analysis_group_competitors where group_id = $1",
    )
    .bind(group_id)
    .fetch_all(pool)
    .await
    .context("list_group_competitor_ids failed")?;
    rows.iter()
        .map(|r| r.try_get::<Uuid, _>("product_id").context("decode product_id"))
        .collect()
}

/// An in-flight (queued or processing) result for the group, used by the
/// `force=false` dedup check in the report-request handler.
pub async fn find_in_flight_result(pool: &PgPool, group_id: Uuid) -> Result<Option<AnalysisResultRow>> {
    let row = sqlx::query(
        r#"
        select * from competitor_analysis_results
        where group_id = $1 and status in ('queued', 'processing')
        order by created_at desc
        limit 1
        "#,
    )
    .bind(group_id)
    .fetch_optional(pool)
    .await
    .context("find_in_flight_result failed")?;
    row.as_ref().map(analysis_result_from_row).transpose()
}

pub async fn insert_queued_result(pool: &PgPool, group_id: Uuid, task_id: Uuid, queue_id: Option<&str>) -> Result<AnalysisResultRow> {
    let row = sqlx::query(
        r#"
        insert into competitor_analysis_results (group_id, task_id, queue_id, status)
        values ($1, $2, $3, 'queued')
        returning *
        "#,
    )
    .bind(group_id)
    .bind(task_id)
    .bind(queue_id)
    .fetch_one(pool)
    .await
    .context("insert_queued_result failed")?;
    analysis_result_from_row(&row)
}

pub async fn get_result_by_task_id(pool: &PgPool, task_id: Uuid) -> Result<Option<AnalysisResultRow>> {
    let row = sqlx::query("select * from competitor_analysis_results where task_id = $1")
        .bind(task_id)
        .fetch_optional(pool)
        .await
        .context("get_result_by_task_id failed")?;
    row.as_ref().map(analysis_result_from_row).transpose()
}

pub async fn mark_result_processing(pool: &PgPool, task_id: Uuid) -> Result<()> {
    sqlx::query("update competitor_analysis_results set status = 'processing' where task_id = $1")
        .bind(task_id)
        .execute(pool)
        .await
        .context("mark_result_processing failed")?;
    Ok(())
}

pub async fn mark_result_completed(
    pool: &PgPool,
    task_id: Uuid,
    analysis_data: Json,
    insights: Json,
    recommendations: Json,
) -> Result<()> {
    sqlx::query(
        r#"
        update competitor_analysis_results
        set status = 'completed', analysis_data = $2, insights = $3, recommendations = $4, completed_at = now()
        where task_id = $1
        "#,
    )
    .bind(task_id)
    .bind(analysis_data)
    .bind(insights)
    .bind(recommendations)
    .execute(pool)
    .await
    .context("mark_result_completed failed")?;
    Ok(())
}

pub async fn mark_result_failed(pool: &PgPool, task_id: Uuid, error_message: &str) -> Result<()> {
    sqlx::query(
        "update competitor_analysis_results set status = 'failed', error_message = $2, completed_at = now() where task_id = $1",
    )
    .bind(task_id)
    .bind(error_message)
    .execute(pool)
    .await
    .context("mark_result_failed failed")?;
    Ok(())
}
