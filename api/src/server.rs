use axum::{Router, extract::MatchedPath, http::{HeaderName, HeaderValue, Request}};
use mir_common::views::ApiErrorResponse;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer}, trace::TraceLayer};
use tracing::info_span;
use utoipa::{ToSchema, openapi::{Info, License, OpenApi, RefOr, path::Operation}};
use utoipa_axum::{router::OpenApiRouter, routes};

use crate::{config::MirApiConfig, context::ApiContext, handlers};

const REQUEST_ID_HEADER: &str = "x-request-id";

fn routes() -> OpenApiRouter<ApiContext> {
    let openapi = OpenApi::builder()
        .info(
            Info::builder()
                .title("MIR Certificate Authority")
                .version(env!("CARGO_PKG_VERSION"))
                .license(Some(
                    License::builder()
                        .name("Apache 2.0 License")
                        .identifier(Some(env!("CARGO_PKG_LICENSE")))
                        .build()
                ))
        )
        .build();

    OpenApiRouter::with_openapi(openapi)
        .routes(routes!(handlers::health_check))
        .routes(routes!(handlers::certificates::request_certificate))
        .routes(routes!(handlers::certificates::get_chain))
        .routes(routes!(handlers::ocsp::respond))
}

/// The OpenAPI document, without building a server.
pub fn openapi() -> OpenApi {
    let (_, mut a) = routes().split_for_parts();
    apply_default_errors(&mut a);
    a
}

pub fn make(context: ApiContext, cfg: &MirApiConfig) -> anyhow::Result<(Router, OpenApi)> {
    let origin = cfg
        .public_url
        .parse::<HeaderValue>()
        .map_err(|e| anyhow::anyhow!("invalid public URL {}: {}", cfg.public_url, e))?;

    let x_request_id = HeaderName::from_static(REQUEST_ID_HEADER);
    let middleware = ServiceBuilder::new()
        .layer(SetRequestIdLayer::new(
            x_request_id.clone(),
            MakeRequestUuid,
        ))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &Request<_>| {
                    let request_id = req.headers().get(REQUEST_ID_HEADER);
                    let span = info_span!(
                        "http_request",
                        method = req.method().to_string(),
                        request_id = Option::<&str>::None,
                        path = Option::<&str>::None,
                    );

                    if let Some(request_id) = request_id.and_then(|id| id.to_str().ok()) {
                        span.record("request_id", request_id);
                    };

                    if let Some(path) = req.extensions().get::<MatchedPath>() {
                        span.record("path", path.as_str())
                    } else {
                        span.record("path", req.uri().path())
                    };

                    span
                }),
        )
        .layer(CorsLayer::new().allow_origin(origin))
        .layer(PropagateRequestIdLayer::new(x_request_id));

    let (r, mut a) = routes()
        .layer(middleware)
        .with_state(context)
        .split_for_parts();

    apply_default_errors(&mut a);
    Ok((r, a))
}

fn apply_default_errors(api: &mut OpenApi) {
    api.paths.paths.iter_mut().for_each(|(_path, item)| {
        apply_internal_error(&mut item.get);
        apply_internal_error(&mut item.post);
        apply_internal_error(&mut item.put);
    });
}

fn apply_internal_error(item: &mut Option<Operation>) {
    if let Some(item) = item {
        item.responses.responses.insert(
            "500".into(),
            RefOr::Ref(
                utoipa::openapi::Ref::builder()
                    .summary("Internal server error")
                    .ref_location_from_schema_name(ApiErrorResponse::name())
                    .build()
            )
        );
    }
}
