pub mod renew;
pub mod subscribe;
pub mod unsubscribe;

pub use renew::{RenewOperation, RenewRequest, RenewResponse};
pub use subscribe::{SubscribeOperation, SubscribeRequest, SubscribeResponse};
pub use unsubscribe::{UnsubscribeOperation, UnsubscribeRequest};
