use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Stabsspel Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::admin::list_sessions,
        crate::routes::admin::create_session,
        crate::routes::admin::import_session,
        crate::routes::admin::team_preview,
        crate::routes::admin::get_session,
        crate::routes::admin::delete_session,
        crate::routes::admin::reset_session,
        crate::routes::admin::advance_phase,
        crate::routes::admin::new_round,
        crate::routes::admin::end_session,
        crate::routes::admin::timer_action,
        crate::routes::admin::timer_status,
        crate::routes::admin::update_score,
        crate::routes::admin::set_checkbox,
        crate::routes::admin::record_backlog_progress,
        crate::routes::admin::round_orders,
        crate::routes::team::team_order,
        crate::routes::team::save_order,
        crate::routes::team::submit_order,
        crate::routes::team::team_timer,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::session::CreateSessionRequest,
            crate::dto::session::SessionSummary,
            crate::dto::session::SessionDetail,
            crate::dto::session::TeamLink,
            crate::dto::session::TeamPreview,
            crate::dto::timer::TimerAction,
            crate::dto::timer::TimerActionRequest,
            crate::dto::timer::TimerResponse,
            crate::dto::admin::ActionResponse,
            crate::dto::admin::TransitionResponse,
            crate::dto::admin::ScoreUpdateRequest,
            crate::dto::admin::ScoreUpdateResponse,
            crate::dto::admin::CheckboxRequest,
            crate::dto::admin::BacklogProgressRequest,
            crate::dto::order::ActivityInput,
            crate::dto::order::OrderRequest,
            crate::dto::order::OrderAck,
            crate::dto::order::TeamOrderView,
            crate::dto::order::TeamOrder,
            crate::dto::order::RoundOrdersResponse,
            crate::dao::models::Phase,
            crate::dao::models::TimerStatus,
            crate::dao::models::TeamScore,
            crate::dao::models::OrderEntry,
            crate::dao::models::OrderPayload,
            crate::dao::models::Activity,
            crate::state::orders::Budget,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "admin", description = "Game control: sessions, phases, timer and scores"),
        (name = "team", description = "Order entry for teams holding a capability token"),
    )
)]
pub struct ApiDoc;
