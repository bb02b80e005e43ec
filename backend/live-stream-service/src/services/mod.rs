//! Service layer for Live Stream Service
//!
//! Business logic for the stream lifecycle, interaction ingestion (chat,
//! reactions), moderation, featured products, viewer sessions and analytics.
//! Every service works against [`crate::repository::LiveStore`].

pub mod analytics;
pub mod catalog;
pub mod chat;
pub mod featured_products;
pub mod moderation;
pub mod notifications;
pub mod rate_limiter;
pub mod reactions;
pub mod retention;
pub mod stream_registry;
pub mod viewer_sessions;

pub use analytics::AnalyticsService;
pub use catalog::{HttpProductCatalog, ProductCatalog, StaticProductCatalog};
pub use chat::ChatService;
pub use featured_products::{compute_product_performance, FeaturedProductService};
pub use moderation::{authorize_moderation, removal_target, ModerationService};
pub use notifications::{
    should_notify_live_start, LiveEvent, LiveEventPublisher, LiveStartNotifier,
    LoggingEventPublisher, NoRecipients, NotificationCandidate, NotificationPreferences,
    NotificationRecipients, QuietHours, RecordingEventPublisher,
};
pub use rate_limiter::{
    InMemoryRateLimiter, RateLimitAction, RateLimitKey, RateLimitPolicy, RateLimiter,
    RedisRateLimiter,
};
pub use reactions::{validate_reaction_emoji, ReactionService};
pub use stream_registry::StreamRegistry;
pub use viewer_sessions::{SessionSummary, ViewerSessionService};
