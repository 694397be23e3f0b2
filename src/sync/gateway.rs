use std::time::Duration;

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::schedule::ClockTime;
use crate::schedule::weekday::weekday_code;
use crate::storage::config::BackendConfig;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("Request error: {0}")]
    RequestError(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Authentication failed")]
    AuthenticationFailed,
    #[error("Backend rejected the request: {0}")]
    Rejected(String),
    #[error("Parse error: {0}")]
    ParseError(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// The seven days containing `date`, beginning on `first_day`.
    pub fn week_containing(date: NaiveDate, first_day: Weekday) -> Self {
        let offset = (date.weekday().num_days_from_sunday() + 7
            - first_day.num_days_from_sunday())
            % 7;
        let start = date
            .checked_sub_days(chrono::Days::new(offset as u64))
            .unwrap_or(date);
        let end = start
            .checked_add_days(chrono::Days::new(6))
            .unwrap_or(start);
        Self { start, end }
    }

    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days()
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

/// Body of `PUT /events/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RescheduleRequest {
    pub weekday: String,
    pub start_time: String,
    pub end_time: String,
}

impl RescheduleRequest {
    pub fn new(day: Weekday, start: ClockTime, end: ClockTime) -> Self {
        Self {
            weekday: weekday_code(day).to_string(),
            start_time: start.to_wire(),
            end_time: end.to_wire(),
        }
    }
}

/// Complete membership set of one enrollment. Replaces, never merges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RosterUpdate {
    pub event_ids: Vec<u64>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct PeriodPayload {
    #[serde(default)]
    pub classes: Vec<ClassRecord>,
    #[serde(default)]
    pub rentals: Vec<RentalRecord>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ClassRecord {
    pub id: u64,
    pub name: String,
    pub weekday: String,
    pub start_time: String,
    pub end_time: String,
    pub capacity: u32,
    #[serde(default)]
    pub students: Vec<StudentRecord>,
    #[serde(default)]
    pub makeups: Vec<MakeupRecord>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StudentRecord {
    pub id: u64,
    pub name: String,
    pub enrollment_id: Option<u64>,
    pub event_ids: Option<Vec<u64>>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MakeupRecord {
    pub student_id: u64,
    pub name: String,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RentalRecord {
    pub id: u64,
    pub customer: String,
    pub date: NaiveDate,
    pub start_time: String,
    pub end_time: String,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BackendGateway: Send + Sync {
    async fn fetch_period(&self, range: &DateRange) -> Result<PeriodPayload, GatewayError>;

    async fn reschedule_event(
        &self,
        class_id: u64,
        request: &RescheduleRequest,
    ) -> Result<(), GatewayError>;

    async fn update_roster(
        &self,
        enrollment_id: u64,
        update: &RosterUpdate,
    ) -> Result<(), GatewayError>;
}

/// Anything but an explicit `"success": true` is a failure.
pub fn check_envelope(body: &Value) -> Result<(), GatewayError> {
    let success = body.get("success").and_then(Value::as_bool).unwrap_or(false);
    if success {
        return Ok(());
    }
    let message = body
        .get("message")
        .or_else(|| body.get("error"))
        .and_then(Value::as_str)
        .unwrap_or("response carried no success flag");
    Err(GatewayError::Rejected(message.to_string()))
}

pub struct HttpGateway {
    base_url: String,
    api_token: Option<String>,
    client: reqwest::Client,
}

impl HttpGateway {
    pub fn new(base_url: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_token: None,
            client: reqwest::Client::new(),
        }
    }

    pub fn from_config(config: &BackendConfig) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_token: config.api_token.clone(),
            client,
        })
    }

    pub fn with_token(mut self, token: String) -> Self {
        self.api_token = Some(token);
        self
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: reqwest::RequestBuilder, target: &str) -> Result<Value, GatewayError> {
        let response = self.authorize(request).send().await?;

        let status = response.status();
        tracing::info!("{} response status: {}", target, status);

        if status == 401 || status == 403 {
            tracing::error!("Authentication failed for {}", target);
            return Err(GatewayError::AuthenticationFailed);
        }

        if status == 404 {
            tracing::error!("Not found: {}", target);
            return Err(GatewayError::NotFound(target.to_string()));
        }

        if !status.is_success() {
            let body = response.text().await?;
            tracing::error!("Request to {} failed. Status: {}, Body: {}", target, status, body);
            return Err(GatewayError::RequestError(format!("Status {}: {}", status, body)));
        }

        let text = response.text().await?;
        let body: Value = serde_json::from_str(&text)
            .map_err(|e| GatewayError::ParseError(format!("Invalid JSON from {}: {}", target, e)))?;
        check_envelope(&body)?;
        Ok(body)
    }
}

#[async_trait]
impl BackendGateway for HttpGateway {
    async fn fetch_period(&self, range: &DateRange) -> Result<PeriodPayload, GatewayError> {
        let url = format!("{}/schedule", self.base_url);
        let start = range.start.format("%Y-%m-%d").to_string();
        let end = range.end.format("%Y-%m-%d").to_string();

        tracing::info!("Fetching schedule from {} to {}", range.start, range.end);

        let request = self
            .client
            .get(&url)
            .query(&[("start", start.as_str()), ("end", end.as_str())]);
        let mut body = self.send(request, "schedule").await?;

        let data = body.get_mut("data").map(Value::take).unwrap_or(Value::Null);
        let payload: PeriodPayload = serde_json::from_value(data)
            .map_err(|e| GatewayError::ParseError(format!("Invalid schedule payload: {}", e)))?;

        tracing::info!(
            "Fetched {} classes and {} rentals",
            payload.classes.len(),
            payload.rentals.len()
        );
        Ok(payload)
    }

    async fn reschedule_event(
        &self,
        class_id: u64,
        request: &RescheduleRequest,
    ) -> Result<(), GatewayError> {
        let url = format!("{}/events/{}", self.base_url, class_id);

        tracing::info!(
            "Rescheduling class {} to {} {}-{}",
            class_id,
            request.weekday,
            request.start_time,
            request.end_time
        );
        tracing::debug!("PUT {} with payload: {:?}", url, request);

        let builder = self.client.put(&url).json(request);
        self.send(builder, &format!("event {}", class_id)).await?;
        Ok(())
    }

    async fn update_roster(
        &self,
        enrollment_id: u64,
        update: &RosterUpdate,
    ) -> Result<(), GatewayError> {
        let url = format!("{}/enrollments/{}/events", self.base_url, enrollment_id);

        tracing::info!(
            "Replacing memberships of enrollment {} with {:?}",
            enrollment_id,
            update.event_ids
        );

        let builder = self.client.put(&url).json(update);
        self.send(builder, &format!("enrollment {}", enrollment_id)).await?;
        Ok(())
    }
}
