use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::server::controller::error::ServiceError;
use crate::server::model::order::required_text;

pub type RequestId = i64;

/// What a customer is asking staff for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestKind {
    Waiter,
    Bill,
}

impl RequestKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestKind::Waiter => "waiter",
            RequestKind::Bill => "bill",
        }
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestKind {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "waiter" => Ok(Self::Waiter),
            "bill" => Ok(Self::Bill),
            s => Err(ServiceError::validation(format!("unknown request type \"{s}\""))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Resolved,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Resolved => "resolved",
        }
    }
}

impl FromStr for RequestStatus {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "resolved" => Ok(Self::Resolved),
            s => Err(ServiceError::validation(format!("unknown request status \"{s}\""))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceRequest {
    pub id: RequestId,
    pub restaurant_id: String,
    pub table: String,
    #[serde(rename = "type")]
    pub kind: RequestKind,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
    /// first time the request was resolved; what the sweeper ages by
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
}

impl ServiceRequest {
    pub fn is_pending_for(&self, restaurant_id: &str, table: &str, kind: RequestKind) -> bool {
        self.status == RequestStatus::Pending
            && self.kind == kind
            && self.table == table
            && self.restaurant_id == restaurant_id
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRequest {
    pub restaurant_id: String,
    pub table: String,
    pub kind: RequestKind,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostRequestRequest {
    pub restaurant_id: Option<String>,
    pub table: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

impl PostRequestRequest {
    pub fn validate(self) -> Result<NewRequest, ServiceError> {
        let restaurant_id = required_text(self.restaurant_id, "restaurantId")?;
        let table = required_text(self.table, "table")?;
        let kind: RequestKind = required_text(self.kind, "type")?.parse()?;
        Ok(NewRequest { restaurant_id, table, kind })
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PostRequestResponse {
    pub success: bool,
    /// false when an identical pending request already existed
    pub created: bool,
    pub request: ServiceRequest,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RequestResponse {
    pub success: bool,
    pub request: ServiceRequest,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GetRequestsResponse {
    pub success: bool,
    pub requests: Vec<ServiceRequest>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteRequestResponse {
    pub success: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetRequestsParams {
    pub restaurant_id: Option<String>,
    pub table: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestFilter {
    pub restaurant_id: String,
    pub table: Option<String>,
    pub status: Option<RequestStatus>,
}

impl RequestFilter {
    pub fn restaurant(restaurant_id: impl Into<String>) -> Self {
        Self {
            restaurant_id: restaurant_id.into(),
            table: None,
            status: None,
        }
    }

    pub fn matches(&self, request: &ServiceRequest) -> bool {
        request.restaurant_id == self.restaurant_id
            && self.table.as_ref().map_or(true, |t| *t == request.table)
            && self.status.map_or(true, |s| s == request.status)
    }
}

impl TryFrom<GetRequestsParams> for RequestFilter {
    type Error = ServiceError;

    fn try_from(params: GetRequestsParams) -> Result<Self, Self::Error> {
        Ok(Self {
            restaurant_id: required_text(params.restaurant_id, "restaurantId")?,
            table: params.table.filter(|t| !t.trim().is_empty()),
            status: params.status.as_deref().map(str::parse::<RequestStatus>).transpose()?,
        })
    }
}
