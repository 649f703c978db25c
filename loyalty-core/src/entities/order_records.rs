use crate::entities::OrderStatus;
use crate::framework::DatabaseProcessor;
use kanau::processor::Processor;
use loyalty_sdk::objects::OrderItem;
use rust_decimal::Decimal;
use time::OffsetDateTime;

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct OrderRecord {
    pub number: i64,
    pub user_id: i64,
    pub status: OrderStatus,
    /// Zero until the order is processed.
    pub accrual: Decimal,
    pub uploaded_at: OffsetDateTime,
}

impl OrderRecord {
    /// User-facing view of the order. The accrual is only reported once
    /// the order has been processed.
    pub fn to_item(&self) -> OrderItem {
        OrderItem {
            number: self.number.to_string(),
            status: self.status.into(),
            accrual: (self.status == OrderStatus::Processed).then_some(self.accrual),
            uploaded_at: self.uploaded_at,
        }
    }
}

/// Result of uploading an order number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    /// New order stored with status `NEW`.
    Accepted,
    /// The same user already uploaded this number. Nothing changed.
    AlreadyUploaded,
    /// The number belongs to another user.
    UploadedByAnotherUser,
}

#[derive(Debug, Clone)]
/// Insert a new order, or report who already owns the number.
pub struct InsertOrder {
    pub number: i64,
    pub user_id: i64,
}

impl Processor<InsertOrder> for DatabaseProcessor {
    type Output = CreateOutcome;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:InsertOrder")]
    async fn process(&self, insert: InsertOrder) -> Result<CreateOutcome, sqlx::Error> {
        let inserted: Option<i64> = sqlx::query_scalar(
            r#"
            INSERT INTO orders (number, user_id, status)
            VALUES ($1, $2, 'NEW')
            ON CONFLICT (number) DO NOTHING
            RETURNING number
            "#,
        )
        .bind(insert.number)
        .bind(insert.user_id)
        .fetch_optional(&self.pool)
        .await?;
        if inserted.is_some() {
            return Ok(CreateOutcome::Accepted);
        }

        let owner: i64 = sqlx::query_scalar("SELECT user_id FROM orders WHERE number = $1")
            .bind(insert.number)
            .fetch_one(&self.pool)
            .await?;
        Ok(if owner == insert.user_id {
            CreateOutcome::AlreadyUploaded
        } else {
            CreateOutcome::UploadedByAnotherUser
        })
    }
}

#[derive(Debug, Clone)]
/// All orders of a user, newest first.
pub struct GetOrdersByUser {
    pub user_id: i64,
}

impl Processor<GetOrdersByUser> for DatabaseProcessor {
    type Output = Vec<OrderRecord>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetOrdersByUser")]
    async fn process(&self, query: GetOrdersByUser) -> Result<Vec<OrderRecord>, sqlx::Error> {
        sqlx::query_as::<_, OrderRecord>(
            r#"
            SELECT number, user_id, status, accrual, uploaded_at
            FROM orders
            WHERE user_id = $1
            ORDER BY uploaded_at DESC, number DESC
            "#,
        )
        .bind(query.user_id)
        .fetch_all(&self.pool)
        .await
    }
}

#[derive(Debug, Clone)]
/// Orders still waiting for a final accrual result (`NEW` or `PROCESSING`),
/// oldest first.
pub struct GetPendingOrders;

impl Processor<GetPendingOrders> for DatabaseProcessor {
    type Output = Vec<OrderRecord>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetPendingOrders")]
    async fn process(&self, _: GetPendingOrders) -> Result<Vec<OrderRecord>, sqlx::Error> {
        sqlx::query_as::<_, OrderRecord>(
            r#"
            SELECT number, user_id, status, accrual, uploaded_at
            FROM orders
            WHERE status IN ('NEW', 'PROCESSING')
            ORDER BY uploaded_at ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
    }
}

#[derive(Debug, Clone)]
/// Move a non-terminal order to `status`.
///
/// Returns `false` when no row was changed: the order is unknown or
/// already terminal.
pub struct UpdateOrderStatus {
    pub number: i64,
    pub status: OrderStatus,
}

impl Processor<UpdateOrderStatus> for DatabaseProcessor {
    type Output = bool;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:UpdateOrderStatus")]
    async fn process(&self, update: UpdateOrderStatus) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET status = $2
            WHERE number = $1
              AND status IN ('NEW', 'PROCESSING')
            "#,
        )
        .bind(update.number)
        .bind(update.status)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[derive(Debug, Clone)]
pub struct GetOrderByNumber {
    pub number: i64,
}

impl Processor<GetOrderByNumber> for DatabaseProcessor {
    type Output = Option<OrderRecord>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetOrderByNumber")]
    async fn process(&self, query: GetOrderByNumber) -> Result<Option<OrderRecord>, sqlx::Error> {
        sqlx::query_as::<_, OrderRecord>(
            r#"
            SELECT number, user_id, status, accrual, uploaded_at
            FROM orders
            WHERE number = $1
            "#,
        )
        .bind(query.number)
        .fetch_optional(&self.pool)
        .await
    }
}
