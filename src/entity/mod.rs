pub mod audit_logs;
pub mod invoices;
pub mod messages;
pub mod order_items;
pub mod orders;
pub mod products;
pub mod users;

pub use audit_logs::Entity as AuditLogs;
pub use invoices::Entity as Invoices;
pub use messages::Entity as Messages;
pub use order_items::Entity as OrderItems;
pub use orders::Entity as Orders;
pub use products::Entity as Products;
pub use users::Entity as Users;
