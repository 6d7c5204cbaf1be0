use serde::Serialize;
use tide::{Request, Response};

use crate::models::timeline::{sections_newest_first, Timeline};

pub mod utils;

use utils::render;

pub(in super::super) fn mount(route: &mut tide::Server<crate::State>) {
    route.at("/").get(timeline);
}

#[derive(Debug, Serialize)]
struct MapPin<'a> {
    id: &'a str,
    url: &'a str,
    lat: f64,
    lng: f64,
    name: Option<&'a str>,
}

fn map_pins(timeline: &Timeline) -> Vec<MapPin<'_>> {
    timeline
        .values()
        .flatten()
        .filter_map(|photo| {
            let location = photo.location.as_ref()?;
            Some(MapPin {
                id: &photo.id,
                url: &photo.url,
                lat: location.lat,
                lng: location.lng,
                name: location.name.as_deref(),
            })
        })
        .collect()
}

async fn timeline(req: Request<crate::State>) -> tide::Result<Response> {
    let state = req.state();

    let timeline = match state.timeline().await {
        Ok(timeline) => timeline,
        Err(err) => {
            tracing::error!(error = ?err, "loading photos failed");
            return Ok(Response::builder(tide::http::StatusCode::BadGateway)
                .content_type("text/plain")
                .body("Could not load photos right now.")
                .build());
        },
    };

    let mut context = tera::Context::new();
    context.insert("title", "memory lane");
    context.insert("canonical_href", &format!("{}/", state.args.base_url));
    context.insert("sections", &sections_newest_first(&timeline));
    context.insert("pins", &map_pins(&timeline));

    let body = render(state, "timeline.html", &context)?;
    let res = Response::builder(tide::http::StatusCode::Ok)
        .content_type("text/html")
        .body(body)
        .build();
    Ok(res)
}
