//! Registry services: the store and change notification.

mod notifier;
mod store;

pub use notifier::{ChangeNotifier, ChangeSubscription, DEFAULT_CHANNEL_CAPACITY};
pub use store::{RegistryStore, StoreSettings, WriteFailure};
