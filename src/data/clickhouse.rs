use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, info};
use crate::data::types::{Observation, TimeWindow};
use crate::data::window::render_window_query;
use crate::data::LoadSource;
use crate::error::{ForecastError, ForecastResult};

/// ClickHouse over its HTTP interface.
pub struct ClickHouseSource {
    client: Client,
    url: String,
    database: String,
    table: String,
    user: String,
    password: Option<String>,
}

impl ClickHouseSource {
    pub fn new(
        url: String,
        database: String,
        table: String,
        user: String,
        password: Option<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            url,
            database,
            table,
            user,
            password,
        }
    }
}

#[async_trait]
impl LoadSource for ClickHouseSource {
    async fn query(&self, window: &TimeWindow) -> ForecastResult<Vec<Observation>> {
        let sql = format!("{} FORMAT JSONEachRow", render_window_query(&self.table, window)?);
        debug!("ClickHouse query: {}", sql);

        let mut request = self.client
            .post(&self.url)
            .query(&[("database", self.database.as_str())])
            .header("X-ClickHouse-User", &self.user)
            .body(sql);
        if let Some(password) = &self.password {
            request = request.header("X-ClickHouse-Key", password);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ForecastError::DataSource(format!("ClickHouse unreachable: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ForecastError::DataSource(format!("Failed to read ClickHouse response: {}", e)))?;

        if !status.is_success() {
            return Err(ForecastError::DataSource(format!(
                "ClickHouse returned {}: {}",
                status,
                body.trim()
            )));
        }

        let rows = parse_json_each_row(&body)?;
        info!("Loaded {} rows from {}", rows.len(), self.table);
        Ok(rows)
    }
}

/// One JSON object per line, blank lines ignored.
fn parse_json_each_row(body: &str) -> ForecastResult<Vec<Observation>> {
    body.lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            serde_json::from_str::<Observation>(line).map_err(|e| {
                ForecastError::DataSource(format!("Unexpected row from ClickHouse: {} ({})", line, e))
            })
        })
        .collect()
}
