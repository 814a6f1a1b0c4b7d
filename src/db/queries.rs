use std::str::FromStr;

use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use crate::models::annotation::AnnotationResult;
use crate::models::image::ImageRecord;
use crate::models::job::ProcessingStatus;

const RECORD_COLUMNS: &str = "image_id, user_id, image_url, description, tags, colors, \
                              ai_processing_status, created_at, updated_at";

/// Upsert a record to `processing` ahead of the background task.
///
/// Creates the metadata row if the image has never been submitted, otherwise
/// resets its status; either way the caller may immediately report the job as
/// accepted.
pub async fn upsert_processing(
    pool: &PgPool,
    image_id: i64,
    user_id: &str,
    image_url: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO image_metadata (image_id, user_id, image_url, ai_processing_status)
        VALUES ($1, $2, $3, 'processing')
        ON CONFLICT (image_id) DO UPDATE
        SET user_id = EXCLUDED.user_id,
            image_url = EXCLUDED.image_url,
            ai_processing_status = 'processing',
            updated_at = NOW()
        "#,
    )
    .bind(image_id)
    .bind(user_id)
    .bind(image_url)
    .execute(pool)
    .await?;

    Ok(())
}

/// Write the annotations and the terminal `completed` status in one update.
pub async fn complete_annotation(
    pool: &PgPool,
    image_id: i64,
    result: &AnnotationResult,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE image_metadata
        SET description = $2,
            tags = $3,
            colors = $4,
            ai_processing_status = 'completed',
            updated_at = NOW()
        WHERE image_id = $1
        "#,
    )
    .bind(image_id)
    .bind(&result.description)
    .bind(&result.tags)
    .bind(&result.colors)
    .execute(pool)
    .await?;

    Ok(())
}

/// Set the terminal `failed` status after a persistence error.
pub async fn mark_failed(pool: &PgPool, image_id: i64) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE image_metadata
        SET ai_processing_status = 'failed',
            updated_at = NOW()
        WHERE image_id = $1
        "#,
    )
    .bind(image_id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Fetch one image record by id.
pub async fn get_image(pool: &PgPool, image_id: i64) -> Result<Option<ImageRecord>, sqlx::Error> {
    let row = sqlx::query(&format!(
        "SELECT {RECORD_COLUMNS} FROM image_metadata WHERE image_id = $1"
    ))
    .bind(image_id)
    .fetch_optional(pool)
    .await?;

    row.map(|r| map_record(&r)).transpose()
}

/// All of a user's other image records, for similarity ranking.
pub async fn list_for_user(
    pool: &PgPool,
    user_id: &str,
    exclude_image_id: i64,
) -> Result<Vec<ImageRecord>, sqlx::Error> {
    let rows = sqlx::query(&format!(
        r#"
        SELECT {RECORD_COLUMNS}
        FROM image_metadata
        WHERE user_id = $1 AND image_id <> $2
        ORDER BY image_id ASC
        "#
    ))
    .bind(user_id)
    .bind(exclude_image_id)
    .fetch_all(pool)
    .await?;

    rows.iter().map(map_record).collect()
}

/// One page of a user's records matching an optional free-text query
/// (tag membership or description substring) and an optional exact color.
pub async fn search_page(
    pool: &PgPool,
    user_id: &str,
    query: Option<&str>,
    color: Option<&str>,
    limit: i64,
    offset: i64,
) -> Result<Vec<ImageRecord>, sqlx::Error> {
    let rows = sqlx::query(&format!(
        r#"
        SELECT {RECORD_COLUMNS}
        FROM image_metadata
        WHERE user_id = $1
          AND ($2::TEXT IS NULL OR $2 = ANY(tags) OR description ILIKE '%' || $2 || '%')
          AND ($3::TEXT IS NULL OR $3 = ANY(colors))
        ORDER BY image_id DESC
        LIMIT $4 OFFSET $5
        "#
    ))
    .bind(user_id)
    .bind(query)
    .bind(color)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    rows.iter().map(map_record).collect()
}

fn map_record(row: &PgRow) -> Result<ImageRecord, sqlx::Error> {
    let status_str: String = row.try_get("ai_processing_status")?;
    let status = ProcessingStatus::from_str(&status_str).unwrap_or(ProcessingStatus::Pending);

    Ok(ImageRecord {
        image_id: row.try_get("image_id")?,
        user_id: row.try_get("user_id")?,
        image_url: row.try_get("image_url")?,
        description: row.try_get("description")?,
        tags: row.try_get("tags")?,
        colors: row.try_get("colors")?,
        ai_processing_status: status,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}
