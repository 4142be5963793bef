//! Job table endpoints
//!
//! Rows come back as raw JSON. Callers decide when and how to parse them, so
//! one row with an unexpected shape never fails a whole read.

use crate::BackendClient;
use crate::error::Result;
use reqwest::{Method, RequestBuilder};
use serde::Serialize;
use serde_json::Value;

/// Name of the shared job table
pub const JOBS_TABLE: &str = "analysis_jobs";

impl BackendClient {
    // =============================================================================
    // Reads
    // =============================================================================

    /// Fetch the oldest row of `table` whose `status` equals `status`
    ///
    /// Ordered by `created_at` ascending with a limit of one.
    pub async fn select_oldest(&self, table: &str, status: &str) -> Result<Option<Value>> {
        let response = self
            .table_request(Method::GET, table)?
            .query(&[
                ("select", "*".to_string()),
                ("status", eq_filter(status)),
                ("order", "created_at.asc".to_string()),
                ("limit", "1".to_string()),
            ])
            .send()
            .await?;

        let rows: Vec<Value> = self.handle_response(response).await?;
        Ok(rows.into_iter().next())
    }

    // =============================================================================
    // Writes
    // =============================================================================

    /// Apply `body` to row `id`, only if its status is still `expected`
    ///
    /// The status filter is evaluated by the table itself, atomically with
    /// the write. An empty representation means the row no longer matched
    /// (another worker got there first) and yields `None`.
    pub async fn update_where_status<B: Serialize + ?Sized>(
        &self,
        table: &str,
        id: &str,
        expected: &str,
        body: &B,
    ) -> Result<Option<Value>> {
        let response = self
            .table_request(Method::PATCH, table)?
            .query(&[("id", eq_filter(id)), ("status", eq_filter(expected))])
            .header("Prefer", "return=representation")
            .json(body)
            .send()
            .await?;

        let rows: Vec<Value> = self.handle_response(response).await?;
        if rows.is_empty() {
            tracing::debug!("No {} row {} left to update", table, id);
        }
        Ok(rows.into_iter().next())
    }

    /// Apply `body` to row `id` unconditionally
    pub async fn update_by_id<B: Serialize + ?Sized>(
        &self,
        table: &str,
        id: &str,
        body: &B,
    ) -> Result<()> {
        let response = self
            .table_request(Method::PATCH, table)?
            .query(&[("id", eq_filter(id))])
            .header("Prefer", "return=minimal")
            .json(body)
            .send()
            .await?;

        self.handle_empty_response(response).await
    }

    /// Authorized request against `/rest/v1/{table}`, bounded by the table timeout
    fn table_request(&self, method: Method, table: &str) -> Result<RequestBuilder> {
        let url = self.endpoint(["rest", "v1", table])?;
        let request = self.authorized(self.client.request(method, url));

        Ok(match self.table_timeout {
            Some(timeout) => request.timeout(timeout),
            None => request,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Equality filter in the table API's `column=eq.value` syntax
fn eq_filter(value: impl std::fmt::Display) -> String {
    format!("eq.{}", value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ClientError;
    use axum::extract::State;
    use axum::http::{HeaderMap, Method, Uri};
    use axum::{Json, Router};
    use serde_json::json;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    const JOB_ID: &str = "6f1c1f1e-8a51-4c1b-9a55-6b2f3c1d9e10";

    /// One request as seen by the fake table
    #[derive(Debug, Clone)]
    struct Received {
        method: Method,
        path: String,
        query: String,
        headers: HeaderMap,
        body: String,
    }

    #[derive(Clone)]
    struct FakeTable {
        reply: Value,
        delay: Duration,
        received: Arc<Mutex<Vec<Received>>>,
    }

    async fn record(
        State(table): State<FakeTable>,
        method: Method,
        uri: Uri,
        headers: HeaderMap,
        body: String,
    ) -> Json<Value> {
        table.received.lock().unwrap().push(Received {
            method,
            path: uri.path().to_string(),
            query: uri.query().unwrap_or_default().to_string(),
            headers,
            body,
        });
        tokio::time::sleep(table.delay).await;
        Json(table.reply.clone())
    }

    /// Serves `reply` for every request on a local port
    async fn serve(reply: Value, delay: Duration) -> (BackendClient, Arc<Mutex<Vec<Received>>>) {
        let received = Arc::new(Mutex::new(Vec::new()));
        let app = Router::new().fallback(record).with_state(FakeTable {
            reply,
            delay,
            received: Arc::clone(&received),
        });

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

        let client = BackendClient::new(format!("http://{}", addr), "service-key");
        (client, received)
    }

    fn row(status: &str) -> Value {
        json!({
            "id": JOB_ID,
            "video_path": "uploads/match.mp4",
            "user_id": "owner-1",
            "status": status,
            "created_at": "2026-10-01T12:00:00Z"
        })
    }

    fn only_request(received: &Arc<Mutex<Vec<Received>>>) -> Received {
        let received = received.lock().unwrap();
        assert_eq!(received.len(), 1);
        received[0].clone()
    }

    #[test]
    fn test_eq_filter() {
        assert_eq!(eq_filter("queued"), "eq.queued");
        assert_eq!(eq_filter(JOB_ID), format!("eq.{}", JOB_ID));
    }

    #[test]
    fn test_table_endpoint() {
        let client = BackendClient::new("https://project.supabase.co", "key");
        let url = client.endpoint(["rest", "v1", JOBS_TABLE]).unwrap();
        assert_eq!(
            url.as_str(),
            "https://project.supabase.co/rest/v1/analysis_jobs"
        );
    }

    #[tokio::test]
    async fn test_select_oldest_filters_and_orders() {
        let (client, received) = serve(json!([row("queued")]), Duration::ZERO).await;

        let oldest = client.select_oldest(JOBS_TABLE, "queued").await.unwrap();

        assert_eq!(oldest, Some(row("queued")));
        let request = only_request(&received);
        assert_eq!(request.method, Method::GET);
        assert_eq!(request.path, "/rest/v1/analysis_jobs");
        assert!(request.query.contains("status=eq.queued"));
        assert!(request.query.contains("order=created_at.asc"));
        assert!(request.query.contains("limit=1"));
        assert_eq!(request.headers["apikey"], "service-key");
        assert_eq!(request.headers["authorization"], "Bearer service-key");
    }

    #[tokio::test]
    async fn test_select_oldest_returns_unparsed_rows() {
        let malformed = json!({"id": "legacy-17", "user_id": null, "status": "queued"});
        let (client, _) = serve(json!([malformed.clone()]), Duration::ZERO).await;

        let oldest = client.select_oldest(JOBS_TABLE, "queued").await.unwrap();

        assert_eq!(oldest, Some(malformed));
    }

    #[tokio::test]
    async fn test_update_where_status_sends_conditional_patch() {
        let (client, received) = serve(json!([row("processing")]), Duration::ZERO).await;
        let body = json!({"status": "processing"});

        let updated = client
            .update_where_status(JOBS_TABLE, JOB_ID, "queued", &body)
            .await
            .unwrap();

        assert_eq!(updated, Some(row("processing")));
        let request = only_request(&received);
        assert_eq!(request.method, Method::PATCH);
        assert!(request.query.contains(&format!("id=eq.{}", JOB_ID)));
        assert!(request.query.contains("status=eq.queued"));
        assert_eq!(request.headers["prefer"], "return=representation");
        let sent: Value = serde_json::from_str(&request.body).unwrap();
        assert_eq!(sent, body);
    }

    #[tokio::test]
    async fn test_update_where_status_empty_result_is_lost_race() {
        let (client, _) = serve(json!([]), Duration::ZERO).await;
        let body = json!({"status": "processing"});

        let updated = client
            .update_where_status(JOBS_TABLE, JOB_ID, "queued", &body)
            .await
            .unwrap();

        assert!(updated.is_none());
    }

    #[tokio::test]
    async fn test_update_by_id_has_no_status_filter() {
        let (client, received) = serve(json!([]), Duration::ZERO).await;
        let body = json!({"status": "failed", "error": "boom"});

        client
            .update_by_id(JOBS_TABLE, JOB_ID, &body)
            .await
            .unwrap();

        let request = only_request(&received);
        assert_eq!(request.method, Method::PATCH);
        assert_eq!(request.query, format!("id=eq.{}", JOB_ID));
        assert_eq!(request.headers["prefer"], "return=minimal");
    }

    #[tokio::test]
    async fn test_table_timeout_spares_storage_transfers() {
        let (client, _) = serve(json!([]), Duration::from_millis(300)).await;
        let client = client.with_table_timeout(Duration::from_millis(50));

        let err = client
            .select_oldest(JOBS_TABLE, "queued")
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::RequestFailed(ref e) if e.is_timeout()));

        let bytes = client
            .download_object("videos", "owner-1/match.mp4")
            .await
            .unwrap();
        assert_eq!(bytes, b"[]");
    }
}
