//! Aggregates module
pub mod category;
pub mod order;
pub mod product;
pub mod settings;
pub mod user;

pub use category::{Category, CategoryError, CategoryStatus, CategoryTree, Crumb};
pub use order::{Order, OrderError, OrderItem, OrderStatus, PaymentMethod, PaymentStatus};
pub use product::{Product, ProductError, ProductStatus, StockOperation};
pub use settings::{Settings, SettingsError};
pub use user::{Role, User, UserError, UserStatus};
