pub mod gcp_token;
pub mod gcs;
pub mod secret_manager;
pub mod sendgrid;
pub mod shopify;

pub use gcp_token::{AdcTokenSource, StaticToken, TokenSource};
pub use gcs::GcsBlobStore;
pub use secret_manager::SecretManagerClient;
pub use sendgrid::SendGridMailer;
pub use shopify::ShopifyClient;
