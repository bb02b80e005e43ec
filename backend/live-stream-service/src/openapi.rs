//! OpenAPI document for the live-stream HTTP surface
//!
//! Built by hand from the route table; schemas are left out and the
//! document only lists operations.

use actix_web::HttpResponse;
use once_cell::sync::Lazy;
use std::collections::BTreeMap;
use utoipa::openapi::path::{OperationBuilder, PathItemBuilder, PathItemType};
use utoipa::openapi::{InfoBuilder, OpenApi, OpenApiBuilder, PathsBuilder};

static DOC: Lazy<OpenApi> = Lazy::new(doc);

/// (path, method, tag, summary)
const OPERATIONS: &[(&str, PathItemType, &str, &str)] = &[
    ("/api/v1/streams", PathItemType::Post, "streams", "Create a scheduled stream"),
    ("/api/v1/streams", PathItemType::Get, "streams", "List streams"),
    ("/api/v1/streams/{stream_id}", PathItemType::Get, "streams", "Get a stream"),
    ("/api/v1/streams/{stream_id}", PathItemType::Patch, "streams", "Update stream details"),
    ("/api/v1/streams/{stream_id}/start", PathItemType::Post, "streams", "Go live"),
    ("/api/v1/streams/{stream_id}/end", PathItemType::Post, "streams", "End the broadcast"),
    ("/api/v1/streams/{stream_id}/chat", PathItemType::Post, "chat", "Send a chat message"),
    ("/api/v1/streams/{stream_id}/chat", PathItemType::Get, "chat", "Chat history"),
    ("/api/v1/streams/{stream_id}/chat/{message_id}", PathItemType::Delete, "chat", "Remove a message"),
    ("/api/v1/streams/{stream_id}/chat/{message_id}", PathItemType::Patch, "chat", "Set moderation status"),
    ("/api/v1/streams/{stream_id}/reactions", PathItemType::Post, "reactions", "Send a reaction"),
    ("/api/v1/streams/{stream_id}/reactions", PathItemType::Get, "reactions", "Reaction totals"),
    ("/api/v1/streams/{stream_id}/products", PathItemType::Post, "products", "Feature a product"),
    ("/api/v1/streams/{stream_id}/products", PathItemType::Get, "products", "Active featured products"),
    ("/api/v1/streams/{stream_id}/products/{feature_id}", PathItemType::Delete, "products", "Unfeature a product"),
    ("/api/v1/streams/{stream_id}/products/{feature_id}/events", PathItemType::Post, "products", "Record a view, click or purchase"),
    ("/api/v1/streams/{stream_id}/sessions", PathItemType::Post, "sessions", "Join as a viewer"),
    ("/api/v1/streams/{stream_id}/sessions/{session_id}/quality", PathItemType::Post, "sessions", "Report playback quality"),
    ("/api/v1/streams/{stream_id}/sessions/{session_id}/leave", PathItemType::Post, "sessions", "Leave the stream"),
    ("/api/v1/streams/{stream_id}/analytics", PathItemType::Get, "analytics", "Broadcaster analytics snapshot"),
];

pub fn doc() -> OpenApi {
    let mut by_path: BTreeMap<&str, PathItemBuilder> = BTreeMap::new();
    for (path, method, tag, summary) in OPERATIONS {
        let operation = OperationBuilder::new()
            .tag(*tag)
            .summary(Some(*summary))
            .build();
        let builder = by_path.remove(path).unwrap_or_else(PathItemBuilder::new);
        by_path.insert(*path, builder.operation(method.clone(), operation));
    }

    let paths = by_path
        .into_iter()
        .fold(PathsBuilder::new(), |paths, (path, item)| {
            paths.path(path, item.build())
        });

    OpenApiBuilder::new()
        .info(
            InfoBuilder::new()
                .title("Nova Live Stream Service API")
                .version(env!("CARGO_PKG_VERSION"))
                .description(Some(
                    "Live stream lifecycle, chat, reactions, featured products and broadcaster analytics.",
                ))
                .build(),
        )
        .paths(paths)
        .build()
}

pub async fn serve_openapi() -> HttpResponse {
    HttpResponse::Ok().json(&*DOC)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_doc_lists_every_route() {
        let doc = doc();
        let chat = doc
            .paths
            .paths
            .get("/api/v1/streams/{stream_id}/chat")
            .unwrap();
        assert_eq!(chat.operations.len(), 2);
        assert_eq!(doc.paths.paths.len(), 14);
    }
}
