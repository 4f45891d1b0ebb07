use crate::{
    auth::auth::AuthUser,
    events::{ChangeEvent, ChangeFeed},
    fetch::Collection,
};
use actix_web::{
    HttpResponse, Responder,
    http::header::{CacheControl, CacheDirective},
    web,
};
use futures_util::stream;
use tracing::{error, info};

/// One Server-Sent-Events frame per change.
fn sse_frame(event: &ChangeEvent) -> web::Bytes {
    match serde_json::to_string(event) {
        Ok(data) => web::Bytes::from(format!("event: change\ndata: {data}\n\n")),
        Err(e) => {
            error!(error = %e, "Failed to serialize change event");
            web::Bytes::from_static(b": dropped\n\n")
        }
    }
}

/// Change notifications for one collection as an SSE stream.
///
/// A notification only says the collection changed; clients re-fetch.
/// The subscription lives as long as the response stream, so it ends
/// when the client disconnects.
#[utoipa::path(
    get,
    path = "/api/events/{collection}",
    params(("collection" = Collection, Path, description = "Collection to watch")),
    responses(
        (status = 200, description = "text/event-stream of change notifications", content_type = "text/event-stream")
    ),
    security(("bearer_auth" = [])),
    tag = "Events"
)]
pub async fn subscribe(
    auth: AuthUser,
    feed: web::Data<ChangeFeed>,
    path: web::Path<Collection>,
) -> impl Responder {
    let collection = path.into_inner();
    let subscription = feed.subscribe(collection);
    info!(profile_id = auth.profile_id, collection = %collection, "Change feed opened");

    let body = stream::unfold(subscription, |mut sub| async move {
        sub.next()
            .await
            .map(|event| (Ok::<_, actix_web::Error>(sse_frame(&event)), sub))
    });

    HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header(CacheControl(vec![CacheDirective::NoCache]))
        .streaming(body)
}
