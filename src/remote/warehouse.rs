use super::transport::Transport;
use crate::config::{RemoteConfig, WarehouseConfig};
use crate::error::{SyncError, SyncResult};
use crate::logging::{log_debug, log_info};
use reqwest::header::HeaderMap;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::time::sleep;

/// BigQuery-style warehouse adapter. Mirrors the planner's collections
/// into a staging-then-MERGE load pattern: each sync stages the fetched
/// rows into `_stg__{collection}`, then merges them into the target table
/// keyed on the collection's primary key, creating the target the first
/// time a collection is seen.
pub struct WarehouseClient {
    transport: Transport<WarehouseConfig>,
}

/// One target or staging table column, as reported by BigQuery's table
/// metadata endpoint.
struct ColumnSchema {
    name: String,
    bq_type: String,
    repeated: bool,
}

impl WarehouseClient {
    pub fn new(config: WarehouseConfig) -> Self {
        Self {
            transport: Transport::new(config),
        }
    }

    fn headers(&self) -> SyncResult<HeaderMap> {
        let token = self
            .transport
            .config()
            .service_account_token
            .as_ref()
            .ok_or_else(|| SyncError::configuration("warehouse adapter needs a service account token"))?;
        super::transport::bearer_headers(token)
    }

    fn project(&self) -> &str {
        &self.transport.config().project_id
    }

    fn dataset(&self) -> &str {
        &self.transport.config().dataset
    }

    fn qualified(&self, table_base: &str) -> String {
        format!("`{}.{}.{}`", self.project(), self.dataset(), table_base)
    }

    /// Loads `rows` into the staging table for `collection` and merges
    /// them into the target table, creating it on first use. Returns the
    /// target table's row count after the merge. A collection with no
    /// fresh rows is a no-op that returns the table's current count.
    /// `pk_field` is the column the MERGE keys on; `ts_field`, when
    /// present on both sides, guards the UPDATE so an out-of-order
    /// staging row can never regress a newer target row. `partition_field`
    /// installs day partitioning on the target the first time it's created.
    pub async fn load_merge(
        &self,
        collection: &str,
        rows: &[Value],
        pk_field: &str,
        ts_field: Option<&str>,
        partition_field: Option<&str>,
    ) -> SyncResult<u64> {
        if rows.is_empty() {
            log_debug!(collection, "no rows fetched, skipping merge");
            return self.row_count(collection).await.map(|c| c.unwrap_or(0));
        }

        let staging_table = format!("_stg__{collection}");
        self.load_ndjson(&staging_table, rows).await?;

        let staging_cols = self.table_columns(&staging_table).await?;
        if staging_cols.is_empty() {
            return Err(SyncError::warehouse(
                collection,
                "staging table has no columns after load",
            ));
        }

        if !self.table_exists(collection).await? {
            self.create_target_from_staging(collection, &staging_table, &staging_cols, partition_field)
                .await?;
        }

        let target_cols = self.table_columns(collection).await?;
        self.merge_staging_into_target(collection, &staging_table, &staging_cols, &target_cols, pk_field, ts_field)
            .await?;

        let count = self.row_count(collection).await?.unwrap_or(0);
        log_info!(collection, rows = rows.len(), total = count, "merged warehouse collection");
        Ok(count)
    }

    /// Scoped delete ahead of a backfill load, so a caller-provided date
    /// window stays authoritative instead of merging on top of whatever
    /// the checkpoint-driven run already wrote for that range.
    pub async fn purge_scope(
        &self,
        table_base: &str,
        date_from: &str,
        date_to: &str,
        person_id: Option<&str>,
    ) -> SyncResult<()> {
        if !self.table_exists(table_base).await? {
            return Ok(());
        }
        let mut sql = format!(
            "DELETE FROM {} WHERE DATE(date) BETWEEN '{}' AND '{}'",
            self.qualified(table_base),
            date_from,
            date_to
        );
        if let Some(person_id) = person_id {
            sql.push_str(&format!(" AND CAST(personId AS STRING) = '{person_id}'"));
        }
        self.run_query(&sql).await.map(|_| ())
    }

    async fn load_ndjson(&self, table_base: &str, rows: &[Value]) -> SyncResult<()> {
        let ndjson = rows
            .iter()
            .map(|row| serde_json::to_string(row).unwrap_or_default())
            .collect::<Vec<_>>()
            .join("\n");

        let config_json = json!({
            "configuration": {
                "load": {
                    "destinationTable": {
                        "projectId": self.project(),
                        "datasetId": self.dataset(),
                        "tableId": table_base,
                    },
                    "sourceFormat": "NEWLINE_DELIMITED_JSON",
                    "autodetect": true,
                    "writeDisposition": "WRITE_TRUNCATE",
                }
            }
        });

        let boundary = "warehouse-load-boundary";
        let mut body = Vec::new();
        body.extend_from_slice(format!("--{boundary}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n").as_bytes());
        body.extend_from_slice(config_json.to_string().as_bytes());
        body.extend_from_slice(format!("\r\n--{boundary}\r\nContent-Type: application/octet-stream\r\n\r\n").as_bytes());
        body.extend_from_slice(ndjson.as_bytes());
        body.extend_from_slice(format!("\r\n--{boundary}--").as_bytes());

        let url = format!(
            "https://bigquery.googleapis.com/upload/bigquery/v2/projects/{}/jobs?uploadType=multipart",
            self.project()
        );
        let headers = self.headers()?;
        let payload: Value = self
            .transport
            .send_json(|| {
                self.transport
                    .client()
                    .post(&url)
                    .headers(headers.clone())
                    .header(
                        "Content-Type",
                        format!("multipart/related; boundary={boundary}"),
                    )
                    .body(body.clone())
            })
            .await?;

        let job_id = payload
            .get("jobReference")
            .and_then(|r| r.get("jobId"))
            .and_then(Value::as_str)
            .ok_or_else(|| SyncError::warehouse(table_base, "load job response missing jobId"))?
            .to_string();

        self.await_job(&job_id).await
    }

    async fn await_job(&self, job_id: &str) -> SyncResult<()> {
        let url = format!("{}/projects/{}/jobs/{job_id}", self.transport.config().base_url(), self.project());
        let headers = self.headers()?;
        for _ in 0..30 {
            let payload: Value = self
                .transport
                .send_json(|| self.transport.client().get(&url).headers(headers.clone()))
                .await?;
            let state = payload
                .get("status")
                .and_then(|s| s.get("state"))
                .and_then(Value::as_str)
                .unwrap_or("");
            if state == "DONE" {
                if let Some(err) = payload.get("status").and_then(|s| s.get("errorResult")) {
                    return Err(SyncError::warehouse(job_id, format!("load job failed: {err}")));
                }
                return Ok(());
            }
            sleep(Duration::from_millis(500)).await;
        }
        Err(SyncError::warehouse(job_id, "load job did not finish in time"))
    }

    async fn table_exists(&self, table_base: &str) -> SyncResult<bool> {
        let url = format!(
            "{}/projects/{}/datasets/{}/tables/{table_base}",
            self.transport.config().base_url(),
            self.project(),
            self.dataset()
        );
        let headers = self.headers()?;
        let response = self
            .transport
            .client()
            .get(&url)
            .headers(headers)
            .send()
            .await
            .map_err(|e| SyncError::request_failed("warehouse", format!("table lookup failed: {e}"), Some(Box::new(e))))?;
        Ok(response.status().is_success())
    }

    async fn table_columns(&self, table_base: &str) -> SyncResult<Vec<ColumnSchema>> {
        let url = format!(
            "{}/projects/{}/datasets/{}/tables/{table_base}",
            self.transport.config().base_url(),
            self.project(),
            self.dataset()
        );
        let headers = self.headers()?;
        let payload: Value = self
            .transport
            .send_json(|| self.transport.client().get(&url).headers(headers.clone()))
            .await?;
        let fields = payload
            .get("schema")
            .and_then(|s| s.get("fields"))
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        Ok(fields
            .iter()
            .filter_map(|f| {
                let name = f.get("name").and_then(Value::as_str)?.to_string();
                let bq_type = f.get("type").and_then(Value::as_str).unwrap_or("STRING").to_uppercase();
                let repeated = f.get("mode").and_then(Value::as_str).unwrap_or("").eq_ignore_ascii_case("REPEATED");
                Some(ColumnSchema { name, bq_type, repeated })
            })
            .collect())
    }

    async fn create_target_from_staging(
        &self,
        table_base: &str,
        staging_table: &str,
        staging_cols: &[ColumnSchema],
        partition_field: Option<&str>,
    ) -> SyncResult<()> {
        let target = self.qualified(table_base);
        let staging = self.qualified(staging_table);
        let has_partition_field = partition_field.is_some_and(|field| staging_cols.iter().any(|c| c.name == field));
        let sql = if let Some(field) = partition_field.filter(|_| has_partition_field) {
            format!("CREATE TABLE {target} PARTITION BY DATE({field}) AS SELECT * FROM {staging} WHERE 1=0")
        } else {
            format!("CREATE TABLE {target} AS SELECT * FROM {staging} WHERE 1=0")
        };
        self.run_query(&sql).await.map(|_| ())
    }

    /// Casts one shared column from staging to the target's declared type.
    /// `SAFE_CAST` means a type-mismatched row loses that field rather
    /// than failing the whole merge; the primary key always casts to
    /// `STRING` since ids arrive as either numbers or strings depending
    /// on the source collection.
    fn cast_expr(col: &str, bq_type: &str, pk_field: &str) -> String {
        if col == pk_field {
            return format!("CAST({col} AS STRING) AS {col}");
        }
        match bq_type {
            "STRING" => format!("CAST({col} AS STRING) AS {col}"),
            "INT64" | "INTEGER" => format!("SAFE_CAST({col} AS INT64) AS {col}"),
            "FLOAT64" | "FLOAT" => format!("SAFE_CAST({col} AS FLOAT64) AS {col}"),
            "BOOL" | "BOOLEAN" => format!("SAFE_CAST({col} AS BOOL) AS {col}"),
            "DATE" => format!("SAFE_CAST({col} AS DATE) AS {col}"),
            "TIMESTAMP" => format!("SAFE_CAST({col} AS TIMESTAMP) AS {col}"),
            "DATETIME" => format!("SAFE_CAST({col} AS DATETIME) AS {col}"),
            _ => format!("{col} AS {col}"),
        }
    }

    async fn merge_staging_into_target(
        &self,
        table_base: &str,
        staging_table: &str,
        staging_cols: &[ColumnSchema],
        target_cols: &[ColumnSchema],
        pk_field: &str,
        ts_field: Option<&str>,
    ) -> SyncResult<()> {
        let staging_names: Vec<&str> = staging_cols.iter().map(|c| c.name.as_str()).collect();

        let select_parts: Vec<String> = target_cols
            .iter()
            .map(|target_col| {
                if let Some(staging_col) = staging_cols.iter().find(|c| c.name == target_col.name) {
                    if staging_col.repeated && target_col.bq_type == "STRING" {
                        format!("{name}[SAFE_OFFSET(0)] AS {name}", name = target_col.name)
                    } else {
                        Self::cast_expr(&target_col.name, &target_col.bq_type, pk_field)
                    }
                } else {
                    format!("CAST(NULL AS {}) AS {}", target_col.bq_type, target_col.name)
                }
            })
            .collect();
        let select_clause = select_parts.join(",\n    ");

        let shared_cols: Vec<&str> = target_cols
            .iter()
            .map(|c| c.name.as_str())
            .filter(|name| *name != pk_field && staging_names.contains(name))
            .collect();

        let set_clause = shared_cols.iter().map(|c| format!("T.{c} = S.{c}")).collect::<Vec<_>>().join(", ");
        let mut insert_cols = vec![pk_field.to_string()];
        insert_cols.extend(shared_cols.iter().map(|c| c.to_string()));
        let insert_vals = insert_cols.iter().map(|c| format!("S.{c}")).collect::<Vec<_>>().join(", ");

        let target = self.qualified(table_base);
        let staging = self.qualified(staging_table);
        let mut sql = format!(
            "MERGE {target} T\nUSING (\n  SELECT\n    {select_clause}\n  FROM {staging}\n) S\nON CAST(T.{pk_field} AS STRING) = S.{pk_field}\n"
        );

        if !set_clause.is_empty() {
            let ts_guard = ts_field.filter(|ts| {
                target_cols.iter().any(|c| &c.name == ts) && staging_names.contains(ts)
            });
            match ts_guard {
                Some(ts) => {
                    sql.push_str(&format!(
                        "WHEN MATCHED AND (SAFE.TIMESTAMP(S.{ts}) > SAFE.TIMESTAMP(T.{ts}) OR T.{ts} IS NULL OR S.{ts} IS NULL) THEN UPDATE SET {set_clause}\n"
                    ));
                }
                None => sql.push_str(&format!("WHEN MATCHED THEN UPDATE SET {set_clause}\n")),
            }
        }
        sql.push_str(&format!(
            "WHEN NOT MATCHED THEN INSERT ({}) VALUES ({})",
            insert_cols.join(", "),
            insert_vals
        ));

        self.run_query(&sql).await.map(|_| ())
    }

    async fn row_count(&self, table_base: &str) -> SyncResult<Option<u64>> {
        if !self.table_exists(table_base).await? {
            return Ok(None);
        }
        let sql = format!("SELECT COUNT(*) AS n FROM {}", self.qualified(table_base));
        let payload = self.run_query(&sql).await?;
        let count = payload
            .get("rows")
            .and_then(Value::as_array)
            .and_then(|rows| rows.first())
            .and_then(|row| row.get("f"))
            .and_then(Value::as_array)
            .and_then(|fields| fields.first())
            .and_then(|field| field.get("v"))
            .and_then(Value::as_str)
            .and_then(|s| s.parse::<u64>().ok());
        Ok(count)
    }

    async fn run_query(&self, sql: &str) -> SyncResult<Value> {
        let url = format!(
            "{}/projects/{}/queries",
            self.transport.config().base_url(),
            self.project()
        );
        let headers = self.headers()?;
        let body = json!({
            "query": sql,
            "useLegacySql": false,
            "location": self.transport.config().location,
        });
        self.transport
            .send_json(|| {
                self.transport
                    .client()
                    .post(&url)
                    .headers(headers.clone())
                    .json(&body)
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qualified_name_includes_project_and_dataset() {
        let config = WarehouseConfig {
            project_id: "proj".to_string(),
            dataset: "ds".to_string(),
            ..WarehouseConfig::default()
        };
        let client = WarehouseClient::new(config);
        assert_eq!(client.qualified("runn_people"), "`proj.ds.runn_people`");
    }

    #[test]
    fn cast_expr_uses_safe_cast_per_declared_type() {
        assert_eq!(WarehouseClient::cast_expr("amount", "FLOAT64", "pk"), "SAFE_CAST(amount AS FLOAT64) AS amount");
        assert_eq!(WarehouseClient::cast_expr("active", "BOOL", "pk"), "SAFE_CAST(active AS BOOL) AS active");
        assert_eq!(WarehouseClient::cast_expr("raw", "JSON", "pk"), "raw AS raw");
    }

    #[test]
    fn cast_expr_always_casts_the_primary_key_to_string() {
        assert_eq!(WarehouseClient::cast_expr("pk", "INT64", "pk"), "CAST(pk AS STRING) AS pk");
    }
}
