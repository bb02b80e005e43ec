//! Domain models for live streams and their interaction records

pub mod actor;
pub mod analytics;
pub mod chat;
pub mod product;
pub mod reaction;
pub mod requests;
pub mod session;
pub mod stream;

pub use actor::{Actor, AuthenticatedUser, ANONYMOUS_DISPLAY_NAME};
pub use analytics::{
    CommerceMetrics, EngagementMetrics, QualityMetrics, StreamAnalyticsSnapshot, ViewerMetrics,
};
pub use chat::{
    ChatFilter, ChatMessage, ChatPage, ChatStats, MessageType, ModerationStatus,
    MAX_CHAT_MESSAGE_CHARS,
};
pub use product::{
    validate_purchase_revenue, FeatureInsert, FeaturedProduct, FeaturedProductView, ProductEvent,
    ProductPerformance, ProductSort, DEFAULT_MAX_ACTIVE_FEATURED_PRODUCTS, MAX_PURCHASE_REVENUE,
};
pub use reaction::{Reaction, ReactionAggregation, ReactionReceipt};
pub use requests::{
    CreateStreamRequest, FeatureProductRequest, GetStreamQuery, JoinSessionRequest,
    ListChatQuery, ListProductsQuery, ListStreamsQuery, ModerationRequest, ProductEventKind,
    ProductEventRequest, QualityReportRequest, SendChatRequest, SendReactionRequest,
    UpdateStreamRequest, DEFAULT_CHAT_PAGE_SIZE, DEFAULT_STREAM_PAGE_SIZE,
};
pub use session::{QualityLayer, QualityReport, ViewerSession};
pub use stream::{
    EndStreamResponse, PrivacySetting, RecordingMetadata, RecordingStatus, Stream, StreamFilter,
    StreamListResponse, StreamPatch, StreamStatus, StreamType, DEFAULT_MAX_CAPACITY,
    STORE_STREAM_MIN_KYC_TIER,
};
