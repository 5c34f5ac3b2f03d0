pub mod assistant;
pub mod chat;
pub mod favorites;
pub mod providers;
pub mod recommendations;

pub use assistant::{Interpretation, PreferenceAssistant};
pub use chat::{ChatReply, IdentifiedTaste, TasteDiscovery};
pub use favorites::{FavoriteResolver, NewFavorite};
pub use recommendations::{RecommendationService, RecommendationSettings};
