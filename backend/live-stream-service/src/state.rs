//! Shared application state handed to every handler

use crate::config::Config;
use crate::repository::LiveStore;
use crate::services::{
    AnalyticsService, ChatService, FeaturedProductService, LiveEventPublisher, LiveStartNotifier,
    ModerationService, NotificationRecipients, ProductCatalog, RateLimitPolicy, RateLimiter,
    ReactionService, StreamRegistry, ViewerSessionService,
};
use std::sync::Arc;
use std::time::Duration;

/// Tunables the services need, independent of where they came from
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub chat_policy: RateLimitPolicy,
    pub reaction_policy: RateLimitPolicy,
    pub max_featured_products: usize,
    pub kyc_verification_url: String,
}

impl EngineSettings {
    pub fn from_config(config: &Config) -> Self {
        let window = Duration::from_millis(config.limits.window_ms);
        Self {
            chat_policy: RateLimitPolicy::per_window(config.limits.chat_per_window, window),
            reaction_policy: RateLimitPolicy::per_window(
                config.limits.reactions_per_window,
                window,
            ),
            max_featured_products: config.limits.max_featured_products,
            kyc_verification_url: config.kyc.verification_url.clone(),
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        let window = Duration::from_secs(1);
        Self {
            chat_policy: RateLimitPolicy::per_window(5, window),
            reaction_policy: RateLimitPolicy::per_window(10, window),
            max_featured_products: crate::models::DEFAULT_MAX_ACTIVE_FEATURED_PRODUCTS,
            kyc_verification_url: "https://nova.app/settings/verification".to_string(),
        }
    }
}

/// External collaborators injected at startup
pub struct Collaborators {
    pub store: Arc<dyn LiveStore>,
    pub limiter: Arc<dyn RateLimiter>,
    pub catalog: Arc<dyn ProductCatalog>,
    pub events: Arc<dyn LiveEventPublisher>,
    pub recipients: Arc<dyn NotificationRecipients>,
}

pub struct AppState {
    pub streams: StreamRegistry,
    pub chat: ChatService,
    pub reactions: ReactionService,
    pub moderation: ModerationService,
    pub products: FeaturedProductService,
    pub sessions: ViewerSessionService,
    pub analytics: AnalyticsService,
    pub limiter: Arc<dyn RateLimiter>,
}

impl AppState {
    pub fn new(deps: Collaborators, settings: EngineSettings) -> Self {
        let Collaborators {
            store,
            limiter,
            catalog,
            events,
            recipients,
        } = deps;

        let notifier = Arc::new(LiveStartNotifier::new(recipients, events.clone()));

        Self {
            streams: StreamRegistry::new(
                store.clone(),
                events,
                notifier,
                settings.kyc_verification_url,
            ),
            chat: ChatService::new(store.clone(), limiter.clone(), settings.chat_policy),
            reactions: ReactionService::new(
                store.clone(),
                limiter.clone(),
                settings.reaction_policy,
            ),
            moderation: ModerationService::new(store.clone()),
            products: FeaturedProductService::new(
                store.clone(),
                catalog,
                settings.max_featured_products,
            ),
            sessions: ViewerSessionService::new(store.clone()),
            analytics: AnalyticsService::new(store),
            limiter,
        }
    }
}
