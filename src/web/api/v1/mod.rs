use tide::{Request, Response};

use crate::db::comments::{add_comment, get_comments};
use memory_lane_api_structs::CommentPayload;

pub(super) fn mount(mut route: tide::Route<crate::State>) {
    route.at("/photos").get(get_photos);

    route
        .at("/photo/:photo_id/comments")
        .get(list_comments)
        .post(create_comment);
}

fn photo_id(req: &Request<crate::State>) -> tide::Result<String> {
    let raw = req.param("photo_id")?;
    Ok(percent_encoding::percent_decode_str(raw)
        .decode_utf8_lossy()
        .to_string())
}

async fn get_photos(req: Request<crate::State>) -> tide::Result<Response> {
    let state = req.state();

    match state.timeline().await {
        Ok(timeline) => Ok(Response::builder(tide::http::StatusCode::Ok)
            .body(tide::Body::from_json(&*timeline)?)
            .build()),
        Err(err) => {
            tracing::error!(error = ?err, "loading photos failed");
            Ok(Response::builder(tide::http::StatusCode::BadGateway)
                .body(tide::convert::json!({
                    "reason": err.to_string(),
                }))
                .build())
        },
    }
}

async fn list_comments(req: Request<crate::State>) -> tide::Result<Response> {
    let state = req.state();
    let photo_id = photo_id(&req)?;

    let comments = match get_comments(state.comments.as_ref(), &photo_id).await {
        Ok(comments) => comments,
        Err(err) => {
            tracing::error!(error = ?err, %photo_id, "failed to get comments");
            Vec::new()
        },
    };

    Ok(Response::builder(tide::http::StatusCode::Ok)
        .body(tide::Body::from_json(&comments)?)
        .build())
}

async fn create_comment(mut req: Request<crate::State>) -> tide::Result<Response> {
    let payload: CommentPayload = req.body_json().await?;
    tracing::debug!("Received comment payload: {:?}", payload);

    let state = req.state();
    let photo_id = photo_id(&req)?;

    if payload.is_empty() {
        return Ok(Response::builder(tide::http::StatusCode::BadRequest)
            .body(tide::convert::json!({
                "success": false,
                "error": "Comment is empty",
            }))
            .build());
    }

    match add_comment(state.comments.as_ref(), &photo_id, payload).await {
        Ok(updated) => Ok(Response::builder(tide::http::StatusCode::Created)
            .body(tide::convert::json!({
                "success": true,
                "updated": updated,
            }))
            .build()),
        Err(err) => {
            tracing::error!(error = ?err, %photo_id, "failed to add comment");
            Ok(Response::builder(tide::http::StatusCode::InternalServerError)
                .body(tide::convert::json!({
                    "success": false,
                    "error": "Database error",
                }))
                .build())
        },
    }
}
