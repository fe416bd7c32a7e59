pub mod inventory_items;
pub mod offers;
pub mod order_items;
pub mod orders;

pub use inventory_items::Entity as InventoryItems;
pub use offers::Entity as Offers;
pub use order_items::Entity as OrderItems;
pub use orders::Entity as Orders;
