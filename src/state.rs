use std::sync::Arc;

use mockable::Clock;

use crate::{
    db::{DbPool, OrmConn},
    services::{notification_service::NotificationService, order_service::OrderService},
    ws::Hub,
};

pub type SharedClock = Arc<dyn Clock + Send + Sync>;

/// Application context built once in `main` and cloned into every handler.
#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub orm: OrmConn,
    pub hub: Arc<Hub>,
    pub clock: SharedClock,
    pub orders: OrderService,
    pub notifications: Arc<NotificationService>,
}

impl AppState {
    pub fn new(pool: DbPool, orm: OrmConn, clock: SharedClock) -> Self {
        let hub = Arc::new(Hub::new());
        let notifications = Arc::new(NotificationService::new(
            pool.clone(),
            hub.clone(),
        ));
        let orders = OrderService::new(orm.clone(), clock.clone());
        Self {
            pool,
            orm,
            hub,
            clock,
            orders,
            notifications,
        }
    }
}
