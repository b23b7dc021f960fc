use std::future::Future;
use std::time::Duration;

use anyhow::Error;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{error, warn};
use tokio::time;
use tokio_postgres::types::{Json, ToSql};
use tokio_postgres::Row;

use crate::server::controller::error::ServiceError;
use crate::server::database::pool::Pool;
use crate::server::model::item::OrderItem;
use crate::server::model::order::{NewOrder, Order, OrderFilter, OrderId, OrderStatus, StatusUpdate};
use crate::server::model::request::{NewRequest, RequestFilter, RequestId, RequestKind, RequestStatus, ServiceRequest};
use crate::server::service::status;
use crate::server::store::{request_not_found, OrderStore, RequestInsert, RequestStore};

const ORDER_COLUMNS: &str = "id, restaurant_id, table_label, items, status, created_at, served_at";
const REQUEST_COLUMNS: &str = "id, restaurant_id, table_label, kind, status, created_at, resolved_at";

/// tokio-postgres backed store. Reads go to the read pool, writes to the write pool.
/// Timestamps come from the database clock.
pub struct PgStore {
    read_pool: Pool,
    write_pool: Pool,
    timeout: Duration,
}

impl PgStore {
    pub async fn connect(read_conn_str: &str, write_conn_str: &str, size: usize, timeout: Duration) -> Result<Self, Error> {
        let read_pool = Pool::new("read", read_conn_str);
        let write_pool = Pool::new("write", write_conn_str);
        read_pool.init(size).await?;
        write_pool.init(size).await?;
        Ok(Self {
            read_pool,
            write_pool,
            timeout,
        })
    }

    /// bail out with `Timeout` if the store does not answer in time
    async fn bounded<T, F>(&self, op: &str, fut: F) -> Result<T, ServiceError>
    where
        F: Future<Output = Result<T, ServiceError>>,
    {
        let sleep = time::sleep(self.timeout);
        tokio::pin!(sleep);
        tokio::select! {
            result = fut => {
                if let Err(e) = &result {
                    if matches!(e, ServiceError::StoreUnavailable { .. }) {
                        error!("{} failed, {}", op, e);
                    }
                }
                result
            },
            _ = &mut sleep => {
                warn!("timeout in {} after {:?}", op, self.timeout);
                Err(ServiceError::Timeout)
            }
        }
    }
}

fn corrupt(what: &str, e: impl std::fmt::Display) -> ServiceError {
    ServiceError::unavailable(format!("corrupt {what} row, {e}"))
}

fn order_from_row(row: &Row) -> Result<Order, ServiceError> {
    let status: String = row.try_get("status")?;
    let Json(items): Json<Vec<OrderItem>> = row.try_get("items")?;
    Ok(Order {
        id: row.try_get("id")?,
        restaurant_id: row.try_get("restaurant_id")?,
        table: row.try_get("table_label")?,
        items,
        status: status.parse::<OrderStatus>().map_err(|e| corrupt("order", e))?,
        created_at: row.try_get("created_at")?,
        served_at: row.try_get("served_at")?,
    })
}

fn request_from_row(row: &Row) -> Result<ServiceRequest, ServiceError> {
    let kind: String = row.try_get("kind")?;
    let status: String = row.try_get("status")?;
    Ok(ServiceRequest {
        id: row.try_get("id")?,
        restaurant_id: row.try_get("restaurant_id")?,
        table: row.try_get("table_label")?,
        kind: kind.parse::<RequestKind>().map_err(|e| corrupt("request", e))?,
        status: status.parse::<RequestStatus>().map_err(|e| corrupt("request", e))?,
        created_at: row.try_get("created_at")?,
        resolved_at: row.try_get("resolved_at")?,
    })
}

/// Counts from the bulk status CTE. Whatever matched but neither moved nor
/// already sat at the target was refused by the transition rules.
fn tally(matched: i64, updated: i64, unchanged: i64) -> StatusUpdate {
    let count = |n: i64| u64::try_from(n).unwrap_or(0);
    StatusUpdate {
        matched: count(matched),
        updated: count(updated),
        unchanged: count(unchanged),
        rejected: count(matched - updated - unchanged),
    }
}

/// advisory lock key for one (restaurant, table, type) slot
fn pending_slot_key(request: &NewRequest) -> String {
    format!("{}\u{1f}{}\u{1f}{}", request.restaurant_id, request.table, request.kind)
}

#[async_trait]
impl OrderStore for PgStore {
    async fn insert_order(&self, order: NewOrder) -> Result<Order, ServiceError> {
        self.bounded("insert_order", async {
            let conn = self.write_pool.acquire(self.timeout).await?;
            let items = Json(&order.items);
            let params: &[&(dyn ToSql + Sync); 3] = &[&order.restaurant_id, &order.table, &items];
            let row = conn
                .query_one(
                    &format!(
                        r#"
                        INSERT INTO orders(restaurant_id, table_label, items, status)
                        VALUES ($1, $2, $3, 'pending')
                        RETURNING {ORDER_COLUMNS}
                        "#
                    ),
                    params,
                )
                .await?;
            order_from_row(&row)
        })
        .await
    }

    async fn list_orders(&self, filter: &OrderFilter) -> Result<Vec<Order>, ServiceError> {
        self.bounded("list_orders", async {
            let conn = self.read_pool.acquire(self.timeout).await?;
            let status = filter.status.map(|s| s.as_str());
            let params: &[&(dyn ToSql + Sync); 4] = &[&filter.restaurant_id, &filter.table, &status, &filter.active_only];
            let rows = conn
                .query(
                    &format!(
                        r#"
                        SELECT {ORDER_COLUMNS}
                        FROM orders
                        WHERE ($1::text IS NULL OR restaurant_id = $1)
                        AND ($2::text IS NULL OR table_label = $2)
                        AND ($3::text IS NULL OR status = $3)
                        AND (NOT $4 OR status <> 'paid')
                        ORDER BY created_at DESC, id DESC
                        "#
                    ),
                    params,
                )
                .await?;
            rows.iter().map(order_from_row).collect()
        })
        .await
    }

    async fn update_status(&self, ids: &[OrderId], to: OrderStatus) -> Result<StatusUpdate, ServiceError> {
        self.bounded("update_status", async {
            let conn = self.write_pool.acquire(self.timeout).await?;
            let target = to.as_str();
            let sources: Vec<&str> = status::sources_of(to).iter().map(|s| s.as_str()).collect();
            let params: &[&(dyn ToSql + Sync); 3] = &[&ids, &target, &sources];
            let row = conn
                .query_one(
                    r#"
                    WITH matched AS (
                        SELECT id, status FROM orders WHERE id = ANY($1) FOR UPDATE
                    ),
                    updated AS (
                        UPDATE orders o
                        SET status = $2::text,
                            served_at = CASE WHEN $2::text = 'served' THEN clock_timestamp() ELSE o.served_at END
                        FROM matched m
                        WHERE o.id = m.id AND m.status = ANY($3)
                        RETURNING o.id
                    )
                    SELECT
                        (SELECT count(*) FROM matched) AS matched,
                        (SELECT count(*) FROM updated) AS updated,
                        (SELECT count(*) FROM matched WHERE status = $2::text) AS unchanged
                    "#,
                    params,
                )
                .await?;
            Ok(tally(row.try_get("matched")?, row.try_get("updated")?, row.try_get("unchanged")?))
        })
        .await
    }
}

#[async_trait]
impl RequestStore for PgStore {
    async fn insert_request(&self, request: NewRequest) -> Result<ServiceRequest, ServiceError> {
        self.bounded("insert_request", async {
            let conn = self.write_pool.acquire(self.timeout).await?;
            let kind = request.kind.as_str();
            let params: &[&(dyn ToSql + Sync); 3] = &[&request.restaurant_id, &request.table, &kind];
            let row = conn
                .query_one(
                    &format!(
                        r#"
                        INSERT INTO service_request(restaurant_id, table_label, kind, status)
                        VALUES ($1, $2, $3, 'pending')
                        RETURNING {REQUEST_COLUMNS}
                        "#
                    ),
                    params,
                )
                .await?;
            request_from_row(&row)
        })
        .await
    }

    async fn insert_request_if_absent(&self, request: NewRequest) -> Result<RequestInsert, ServiceError> {
        self.bounded("insert_request_if_absent", async {
            let mut conn = self.write_pool.acquire(self.timeout).await?;
            let key = pending_slot_key(&request);
            let kind = request.kind.as_str();
            let params: &[&(dyn ToSql + Sync); 3] = &[&request.restaurant_id, &request.table, &kind];

            let txn = conn.transaction().await?;
            // serializes concurrent creators of the same slot until commit
            txn.execute("SELECT pg_advisory_xact_lock(hashtext($1))", &[&key]).await?;
            let existing = txn
                .query_opt(
                    &format!(
                        r#"
                        SELECT {REQUEST_COLUMNS}
                        FROM service_request
                        WHERE restaurant_id = $1 AND table_label = $2 AND kind = $3 AND status = 'pending'
                        ORDER BY created_at, id
                        LIMIT 1
                        "#
                    ),
                    params,
                )
                .await?;
            let outcome = match existing {
                Some(row) => RequestInsert::AlreadyPending(request_from_row(&row)?),
                None => {
                    let row = txn
                        .query_one(
                            &format!(
                                r#"
                                INSERT INTO service_request(restaurant_id, table_label, kind, status)
                                VALUES ($1, $2, $3, 'pending')
                                RETURNING {REQUEST_COLUMNS}
                                "#
                            ),
                            params,
                        )
                        .await?;
                    RequestInsert::Created(request_from_row(&row)?)
                }
            };
            txn.commit().await?;
            Ok(outcome)
        })
        .await
    }

    async fn list_requests(&self, filter: &RequestFilter) -> Result<Vec<ServiceRequest>, ServiceError> {
        self.bounded("list_requests", async {
            let conn = self.read_pool.acquire(self.timeout).await?;
            let status = filter.status.map(|s| s.as_str());
            let params: &[&(dyn ToSql + Sync); 3] = &[&filter.restaurant_id, &filter.table, &status];
            let rows = conn
                .query(
                    &format!(
                        r#"
                        SELECT {REQUEST_COLUMNS}
                        FROM service_request
                        WHERE restaurant_id = $1
                        AND ($2::text IS NULL OR table_label = $2)
                        AND ($3::text IS NULL OR status = $3)
                        ORDER BY created_at DESC, id DESC
                        "#
                    ),
                    params,
                )
                .await?;
            rows.iter().map(request_from_row).collect()
        })
        .await
    }

    async fn resolve_request(&self, id: RequestId) -> Result<ServiceRequest, ServiceError> {
        self.bounded("resolve_request", async {
            let conn = self.write_pool.acquire(self.timeout).await?;
            let row = conn
                .query_opt(
                    &format!(
                        r#"
                        UPDATE service_request
                        SET status = 'resolved', resolved_at = COALESCE(resolved_at, clock_timestamp())
                        WHERE id = $1
                        RETURNING {REQUEST_COLUMNS}
                        "#
                    ),
                    &[&id],
                )
                .await?;
            match row {
                Some(row) => request_from_row(&row),
                None => Err(request_not_found(id)),
            }
        })
        .await
    }

    async fn delete_request(&self, id: RequestId) -> Result<(), ServiceError> {
        self.bounded("delete_request", async {
            let conn = self.write_pool.acquire(self.timeout).await?;
            match conn.execute("DELETE FROM service_request WHERE id = $1", &[&id]).await? {
                0 => Err(request_not_found(id)),
                _ => Ok(()),
            }
        })
        .await
    }

    async fn purge_resolved(&self, before: DateTime<Utc>) -> Result<u64, ServiceError> {
        self.bounded("purge_resolved", async {
            let conn = self.write_pool.acquire(self.timeout).await?;
            let purged = conn
                .execute(
                    "DELETE FROM service_request WHERE status = 'resolved' AND resolved_at < $1",
                    &[&before],
                )
                .await?;
            Ok(purged)
        })
        .await
    }
}
