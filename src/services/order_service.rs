use std::collections::{BTreeSet, HashMap};

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::{Expr, LockType};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseTransaction, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};

use crate::{
    db::OrmConn,
    dto::orders::{CreateOrderRequest, OrderItemInput, OrderWithItems, PaymentInput},
    entity::{
        inventory_items::{Column as InvCol, Entity as InventoryItems, Model as InventoryModel},
        offers::{Column as OfferCol, Entity as Offers, Model as OfferModel},
        order_items::{
            ActiveModel as OrderItemActive, Column as OrderItemCol, Entity as OrderItems,
            Model as OrderItemModel,
        },
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel},
    },
    error::{AppError, AppResult},
    models::{Order, OrderItem, OrderStatus},
    state::SharedClock,
};

/// What a line item points at. Exactly one per line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineRef {
    Inventory(i64),
    Offer(i64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestedLine {
    pub target: LineRef,
    pub quantity: i32,
}

/// A line with its price fixed from the locked row read inside the order transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricedLine {
    pub target: LineRef,
    pub quantity: i32,
    pub unit_price: Decimal,
}

impl PricedLine {
    pub fn total_price(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }

    fn inventory_item_id(&self) -> Option<i64> {
        match self.target {
            LineRef::Inventory(id) => Some(id),
            LineRef::Offer(_) => None,
        }
    }

    fn offer_id(&self) -> Option<i64> {
        match self.target {
            LineRef::Offer(id) => Some(id),
            LineRef::Inventory(_) => None,
        }
    }
}

/// Check the shape of every requested line before touching the database.
pub fn validate_lines(items: &[OrderItemInput]) -> AppResult<Vec<RequestedLine>> {
    if items.is_empty() {
        return Err(AppError::BadRequest("order must contain at least one item".into()));
    }

    items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            let target = match (item.inventory_item_id > 0, item.offer_id > 0) {
                (true, false) => LineRef::Inventory(item.inventory_item_id),
                (false, true) => LineRef::Offer(item.offer_id),
                _ => {
                    return Err(AppError::BadRequest(format!(
                        "item {index} must reference exactly one of inventory_item_id or offer_id"
                    )));
                }
            };
            if item.quantity <= 0 {
                return Err(AppError::BadRequest(format!(
                    "item {index} quantity must be positive"
                )));
            }
            Ok(RequestedLine {
                target,
                quantity: item.quantity,
            })
        })
        .collect()
}

pub fn order_total(lines: &[PricedLine]) -> Decimal {
    lines.iter().map(PricedLine::total_price).sum()
}

#[derive(Clone)]
pub struct OrderService {
    orm: OrmConn,
    clock: SharedClock,
}

impl OrderService {
    pub fn new(orm: OrmConn, clock: SharedClock) -> Self {
        Self { orm, clock }
    }

    /// Price, insert and reserve stock for an order in one transaction.
    ///
    /// Does not notify; callers do that after the commit.
    pub async fn create_order(&self, input: CreateOrderRequest) -> AppResult<OrderWithItems> {
        let requested = validate_lines(&input.order_items)?;

        let txn = self.orm.begin().await?;

        let lines = price_lines(&txn, input.restaurant_id, &requested).await?;
        let total_amount = order_total(&lines);

        let order = OrderActive {
            id: NotSet,
            user_id: Set(input.user_id),
            restaurant_id: Set(input.restaurant_id),
            total_amount: Set(total_amount),
            status: Set(OrderStatus::Pending.as_str().into()),
            pickup_time: Set(input.pickup_time.map(Into::into)),
            special_instructions: Set(input.special_instructions),
            created_at: NotSet,
            updated_at: NotSet,
        }
        .insert(&txn)
        .await?;

        let mut items = Vec::with_capacity(lines.len());
        for line in &lines {
            let item = OrderItemActive {
                id: NotSet,
                order_id: Set(order.id),
                inventory_item_id: Set(line.inventory_item_id()),
                offer_id: Set(line.offer_id()),
                quantity: Set(line.quantity),
                unit_price: Set(line.unit_price),
                total_price: Set(line.total_price()),
                created_at: NotSet,
            }
            .insert(&txn)
            .await?;
            items.push(order_item_from_entity(item));

            // offers are templates, only counted stock is reserved
            if let LineRef::Inventory(id) = line.target {
                let reserved = InventoryItems::update_many()
                    .col_expr(InvCol::Quantity, Expr::col(InvCol::Quantity).sub(line.quantity))
                    .filter(InvCol::Id.eq(id))
                    .filter(InvCol::Quantity.gte(line.quantity))
                    .exec(&txn)
                    .await?;
                if reserved.rows_affected == 0 {
                    return Err(insufficient_stock(id));
                }
            }
        }

        txn.commit().await?;

        tracing::info!(
            order_id = order.id,
            user_id = order.user_id,
            restaurant_id = order.restaurant_id,
            total_amount = %order.total_amount,
            lines = items.len(),
            "order created"
        );

        Ok(OrderWithItems {
            order: order_from_entity(order),
            items,
        })
    }

    pub async fn get_order_by_id(&self, id: i64) -> AppResult<Order> {
        Orders::find_by_id(id)
            .one(&self.orm)
            .await?
            .map(order_from_entity)
            .ok_or(AppError::NotFound)
    }

    pub async fn get_order_items(&self, order_id: i64) -> AppResult<Vec<OrderItem>> {
        let items = OrderItems::find()
            .filter(OrderItemCol::OrderId.eq(order_id))
            .order_by_asc(OrderItemCol::Id)
            .all(&self.orm)
            .await?
            .into_iter()
            .map(order_item_from_entity)
            .collect();
        Ok(items)
    }

    pub async fn get_order_with_items(&self, id: i64) -> AppResult<OrderWithItems> {
        let order = self.get_order_by_id(id).await?;
        let items = self.get_order_items(order.id).await?;
        Ok(OrderWithItems { order, items })
    }

    pub async fn get_user_orders(&self, user_id: i64) -> AppResult<Vec<Order>> {
        self.list_orders(Condition::all().add(OrderCol::UserId.eq(user_id)))
            .await
    }

    pub async fn get_restaurant_orders(
        &self,
        restaurant_id: i64,
        status: Option<&str>,
    ) -> AppResult<Vec<Order>> {
        let mut condition = Condition::all().add(OrderCol::RestaurantId.eq(restaurant_id));
        if let Some(status) = status.filter(|s| !s.is_empty()) {
            condition = condition.add(OrderCol::Status.eq(status));
        }
        self.list_orders(condition).await
    }

    async fn list_orders(&self, condition: Condition) -> AppResult<Vec<Order>> {
        let orders = Orders::find()
            .filter(condition)
            .order_by_desc(OrderCol::CreatedAt)
            .order_by_desc(OrderCol::Id)
            .all(&self.orm)
            .await?
            .into_iter()
            .map(order_from_entity)
            .collect();
        Ok(orders)
    }

    /// Move an order forward along its pipeline. Cancellation goes through [`Self::cancel_order`].
    pub async fn update_status(&self, id: i64, status: &str) -> AppResult<Order> {
        let next: OrderStatus = status.parse().map_err(AppError::BadRequest)?;
        if next == OrderStatus::Cancelled {
            return Err(AppError::BadRequest(
                "use the cancel operation to cancel an order".into(),
            ));
        }

        let txn = self.orm.begin().await?;
        let existing = lock_order(&txn, id).await?;
        let current = stored_status(&existing)?;
        if !current.can_transition_to(next) {
            return Err(AppError::Conflict(format!(
                "cannot move order from {current} to {next}"
            )));
        }

        let mut active: OrderActive = existing.into();
        active.status = Set(next.as_str().into());
        active.updated_at = Set(self.clock.utc().into());
        let order = active.update(&txn).await?;

        txn.commit().await?;

        tracing::info!(order_id = order.id, status = %next, "order status updated");
        Ok(order_from_entity(order))
    }

    /// Cancel a non-terminal order and hand its reserved stock back.
    pub async fn cancel_order(&self, id: i64) -> AppResult<Order> {
        let txn = self.orm.begin().await?;
        let existing = lock_order(&txn, id).await?;
        let current = stored_status(&existing)?;
        if current.is_terminal() {
            return Err(AppError::Conflict(format!("order is already {current}")));
        }

        let items = OrderItems::find()
            .filter(OrderItemCol::OrderId.eq(id))
            .all(&txn)
            .await?;
        for item in &items {
            if let Some(inventory_item_id) = item.inventory_item_id {
                InventoryItems::update_many()
                    .col_expr(InvCol::Quantity, Expr::col(InvCol::Quantity).add(item.quantity))
                    .filter(InvCol::Id.eq(inventory_item_id))
                    .exec(&txn)
                    .await?;
            }
        }

        let mut active: OrderActive = existing.into();
        active.status = Set(OrderStatus::Cancelled.as_str().into());
        active.updated_at = Set(self.clock.utc().into());
        let order = active.update(&txn).await?;

        txn.commit().await?;

        tracing::info!(order_id = order.id, restored_lines = items.len(), "order cancelled");
        Ok(order_from_entity(order))
    }

    /// Payment placeholder: records a live order as paid without contacting a provider.
    ///
    /// Completed and cancelled orders are final and reject payment.
    pub async fn process_payment(&self, input: PaymentInput) -> AppResult<Order> {
        let txn = self.orm.begin().await?;
        let existing = lock_order(&txn, input.order_id).await?;
        let current = stored_status(&existing)?;
        if current.is_terminal() {
            return Err(AppError::Conflict(format!(
                "cannot pay for an order that is already {current}"
            )));
        }

        let mut active: OrderActive = existing.into();
        active.status = Set(OrderStatus::Paid.as_str().into());
        active.updated_at = Set(self.clock.utc().into());
        let order = active.update(&txn).await?;

        txn.commit().await?;

        tracing::info!(
            order_id = order.id,
            amount = %input.amount,
            payment_method = %input.payment_method,
            "payment recorded"
        );
        Ok(order_from_entity(order))
    }
}

/// Distinct inventory and offer ids referenced by `requested`, each ascending.
///
/// Rows are locked in this order so concurrent orders over the same items
/// always queue on the same first row instead of deadlocking.
fn ids_in_lock_order(requested: &[RequestedLine]) -> (Vec<i64>, Vec<i64>) {
    let mut inventory = BTreeSet::new();
    let mut offers = BTreeSet::new();
    for line in requested {
        match line.target {
            LineRef::Inventory(id) => inventory.insert(id),
            LineRef::Offer(id) => offers.insert(id),
        };
    }
    (inventory.into_iter().collect(), offers.into_iter().collect())
}

/// Read each line's price under a row lock, checking availability, ownership and stock.
async fn price_lines(
    txn: &DatabaseTransaction,
    restaurant_id: i64,
    requested: &[RequestedLine],
) -> AppResult<Vec<PricedLine>> {
    let (inventory_ids, offer_ids) = ids_in_lock_order(requested);

    let inventory: HashMap<i64, InventoryModel> = if inventory_ids.is_empty() {
        HashMap::new()
    } else {
        InventoryItems::find()
            .filter(InvCol::Id.is_in(inventory_ids))
            .filter(InvCol::IsAvailable.eq(true))
            .order_by_asc(InvCol::Id)
            .lock(LockType::Update)
            .all(txn)
            .await?
            .into_iter()
            .map(|item| (item.id, item))
            .collect()
    };
    let offers: HashMap<i64, OfferModel> = if offer_ids.is_empty() {
        HashMap::new()
    } else {
        Offers::find()
            .filter(OfferCol::Id.is_in(offer_ids))
            .filter(OfferCol::IsAvailable.eq(true))
            .order_by_asc(OfferCol::Id)
            .lock(LockType::Share)
            .all(txn)
            .await?
            .into_iter()
            .map(|offer| (offer.id, offer))
            .collect()
    };

    let mut demand: HashMap<i64, i32> = HashMap::new();
    let mut lines = Vec::with_capacity(requested.len());

    for line in requested {
        let unit_price = match line.target {
            LineRef::Inventory(id) => {
                let item = inventory.get(&id).ok_or_else(|| {
                    AppError::BadRequest(format!("inventory item {id} not found or unavailable"))
                })?;
                if item.restaurant_id != restaurant_id {
                    return Err(AppError::BadRequest(format!(
                        "inventory item {id} does not belong to restaurant {restaurant_id}"
                    )));
                }
                let wanted = demand.entry(id).or_insert(0);
                *wanted = wanted.saturating_add(line.quantity);
                if item.quantity < *wanted {
                    return Err(insufficient_stock(id));
                }
                item.surplus_price
            }
            LineRef::Offer(id) => {
                let offer = offers.get(&id).ok_or_else(|| {
                    AppError::BadRequest(format!("offer {id} not found or unavailable"))
                })?;
                if offer.restaurant_id != restaurant_id {
                    return Err(AppError::BadRequest(format!(
                        "offer {id} does not belong to restaurant {restaurant_id}"
                    )));
                }
                offer.surplus_price
            }
        };

        lines.push(PricedLine {
            target: line.target,
            quantity: line.quantity,
            unit_price,
        });
    }

    Ok(lines)
}

async fn lock_order(txn: &DatabaseTransaction, id: i64) -> AppResult<OrderModel> {
    Orders::find_by_id(id)
        .lock(LockType::Update)
        .one(txn)
        .await?
        .ok_or(AppError::NotFound)
}

fn stored_status(order: &OrderModel) -> AppResult<OrderStatus> {
    order
        .status
        .parse()
        .map_err(|err: String| AppError::Internal(anyhow::anyhow!(err)))
}

fn insufficient_stock(inventory_item_id: i64) -> AppError {
    AppError::BadRequest(format!(
        "insufficient stock for inventory item {inventory_item_id}"
    ))
}

fn order_from_entity(model: OrderModel) -> Order {
    Order {
        id: model.id,
        user_id: model.user_id,
        restaurant_id: model.restaurant_id,
        total_amount: model.total_amount,
        status: model.status,
        pickup_time: model.pickup_time.map(|dt| dt.with_timezone(&Utc)),
        special_instructions: model.special_instructions,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}

fn order_item_from_entity(model: OrderItemModel) -> OrderItem {
    OrderItem {
        id: model.id,
        order_id: model.order_id,
        inventory_item_id: model.inventory_item_id,
        offer_id: model.offer_id,
        quantity: model.quantity,
        unit_price: model.unit_price,
        total_price: model.total_price,
        created_at: model.created_at.with_timezone(&Utc),
    }
}
