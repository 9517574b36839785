mod prolific;

use crate::core::error::FetchError;
use crate::core::models::Item;
use async_trait::async_trait;

pub use prolific::ProlificSource;

#[async_trait]
pub trait ListingSource: Send + Sync {
    fn name(&self) -> &'static str;
    async fn fetch_listing(&self) -> Result<Vec<Item>, FetchError>;
}
