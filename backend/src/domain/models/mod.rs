//! Domain models owned by the family ledger.

pub mod category;
pub mod child;
pub mod family;
pub mod task;
pub mod transaction;

pub use category::Category;
pub use child::{AllowanceType, Child, SavingsGoal};
pub use family::{AdditionalParent, Family};
pub use task::{PaymentRequest, PaymentRequestStatus, Task};
pub use transaction::{Transaction, TransactionType};
