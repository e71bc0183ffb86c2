//! Services
//!
//! Business logic behind the routes. Each service holds the store traits and
//! clients it needs and knows nothing about HTTP.

pub mod credentials;
pub mod dashboard;
pub mod fields;
pub mod prediction;
pub mod relay;

pub use credentials::{AuthResponse, CredentialService, LoginInput, ProfileResponse, RegisterInput};
pub use dashboard::{DashboardOverview, DashboardService};
pub use fields::{CreateCropInput, CreateFieldInput, FieldService};
pub use prediction::{HttpPredictionClient, LeafImage, PredictionClient};
pub use relay::{RelayService, YieldRequest};
