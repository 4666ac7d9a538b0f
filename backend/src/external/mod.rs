//! External collaborator integrations: sensor feed and forecast model

pub mod feed;
pub mod inference;
pub mod model;
pub mod openaq;

pub use feed::{SensorFeed, StaticFeed};
pub use inference::RemoteModelClient;
pub use model::{BaselineModel, ForecastFeatures, InferenceModel, ModelError, ModelPrediction};
pub use openaq::OpenAqClient;
