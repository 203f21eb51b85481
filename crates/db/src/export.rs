//! Table dumps to CSV for offline inspection.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::str::FromStr;

use sqlx::Row;
use thiserror::Error;
use tracing::info;

use crate::DbPool;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportTable {
    Users,
    PriceAlerts,
}

impl ExportTable {
    pub const ALL: [ExportTable; 2] = [ExportTable::Users, ExportTable::PriceAlerts];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Users => "users",
            Self::PriceAlerts => "price_alerts",
        }
    }

    pub fn columns(self) -> &'static [&'static str] {
        match self {
            Self::Users => {
                &["user_id", "preferences", "style_profile", "budget_limits", "created_at"]
            }
            Self::PriceAlerts => {
                &["alert_id", "user_id", "product_id", "target_price", "created_at"]
            }
        }
    }

    fn select_sql(self) -> String {
        let projection: Vec<String> = self
            .columns()
            .iter()
            .map(|column| format!("CAST({column} AS TEXT) AS {column}"))
            .collect();
        format!("SELECT {} FROM {} ORDER BY rowid", projection.join(", "), self.as_str())
    }
}

impl FromStr for ExportTable {
    type Err = ExportError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        ExportTable::ALL
            .into_iter()
            .find(|table| table.as_str() == value.trim())
            .ok_or_else(|| ExportError::UnknownTable(value.to_string()))
    }
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("unknown table `{0}` (expected users|price_alerts)")]
    UnknownTable(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("write error: {0}")]
    Io(#[from] io::Error),
}

/// Writes a header row then every row of `table`; returns the number of data rows.
pub async fn export_table_to_csv<W: Write>(
    pool: &DbPool,
    table: ExportTable,
    writer: &mut W,
) -> Result<usize, ExportError> {
    let rows = sqlx::query(&table.select_sql()).fetch_all(pool).await?;
    let columns = table.columns();

    write_record(writer, columns.iter().copied())?;
    for row in &rows {
        let mut values = Vec::with_capacity(columns.len());
        for index in 0..columns.len() {
            let value: Option<String> = row.try_get(index)?;
            values.push(value.unwrap_or_default());
        }
        write_record(writer, values.iter().map(String::as_str))?;
    }
    writer.flush()?;

    info!(
        event_name = "db.export.completed",
        table = table.as_str(),
        rows = rows.len(),
        "table exported"
    );
    Ok(rows.len())
}

pub async fn export_table_to_path(
    pool: &DbPool,
    table: ExportTable,
    path: &Path,
) -> Result<usize, ExportError> {
    let mut writer = BufWriter::new(File::create(path)?);
    export_table_to_csv(pool, table, &mut writer).await
}

fn write_record<'a, W: Write>(
    writer: &mut W,
    fields: impl Iterator<Item = &'a str>,
) -> io::Result<()> {
    let line: Vec<String> = fields.map(escape_field).collect();
    writer.write_all(line.join(",").as_bytes())?;
    writer.write_all(b"\r\n")
}

fn escape_field(field: &str) -> String {
    if field.contains([',', '"', '\r', '\n']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::{escape_field, export_table_to_csv, export_table_to_path, ExportError, ExportTable};
    use crate::{connect_with_settings, migrations};

    async fn setup() -> sqlx::SqlitePool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    #[test]
    fn quotes_only_fields_that_need_it() {
        assert_eq!(escape_field("plain"), "plain");
        assert_eq!(
            escape_field(r#"{"size":"M","color":"black"}"#),
            r#""{""size"":""M"",""color"":""black""}""#
        );
        assert_eq!(escape_field("line\nbreak"), "\"line\nbreak\"");
    }

    #[test]
    fn unknown_tables_are_rejected() {
        assert!(matches!(
            "sqlite_master".parse::<ExportTable>(),
            Err(ExportError::UnknownTable(_))
        ));
        assert_eq!("price_alerts".parse::<ExportTable>().ok(), Some(ExportTable::PriceAlerts));
    }

    #[tokio::test]
    async fn empty_table_writes_header_only() {
        let pool = setup().await;
        let mut buffer = Vec::new();

        let rows = export_table_to_csv(&pool, ExportTable::PriceAlerts, &mut buffer)
            .await
            .expect("export");

        assert_eq!(rows, 0);
        assert_eq!(
            String::from_utf8(buffer).expect("utf8"),
            "alert_id,user_id,product_id,target_price,created_at\r\n"
        );
    }

    #[tokio::test]
    async fn rows_render_as_text_with_nulls_empty() {
        let pool = setup().await;
        sqlx::query(
            "INSERT INTO users (user_id, preferences, style_profile, budget_limits, created_at)
             VALUES ('u-1', '{\"size\":\"M\"}', NULL, '{}', '2026-10-14 09:00:00')",
        )
        .execute(&pool)
        .await
        .expect("insert user");
        sqlx::query(
            "INSERT INTO price_alerts (alert_id, user_id, product_id, target_price, created_at)
             VALUES ('a-1', 'u-1', 'B0TEST', 19.5, '2026-10-14 09:00:00')",
        )
        .execute(&pool)
        .await
        .expect("insert alert");

        let mut users = Vec::new();
        export_table_to_csv(&pool, ExportTable::Users, &mut users).await.expect("export users");
        let users = String::from_utf8(users).expect("utf8");
        let lines: Vec<&str> = users.split("\r\n").collect();
        assert_eq!(lines[0], "user_id,preferences,style_profile,budget_limits,created_at");
        assert_eq!(lines[1], r#"u-1,"{""size"":""M""}",,{},2026-10-14 09:00:00"#);

        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("price_alerts.csv");
        let rows = export_table_to_path(&pool, ExportTable::PriceAlerts, &path)
            .await
            .expect("export alerts");
        assert_eq!(rows, 1);
        let written = std::fs::read_to_string(&path).expect("read csv");
        assert!(written.contains("a-1,u-1,B0TEST,19.5,2026-10-14 09:00:00"));
    }
}
