//! HTTP and WebSocket route table

use warp::Filter;

use crate::app::AppState;
use crate::constants::WS_PATH;
use crate::handlers::filters::{
    authenticated, json_body, rate_limit, sanitized_json, sanitized_query, with_state,
};
use crate::handlers::{self, messages, profile, users};

/// Every route, behind the rate limiter, with rejection recovery and request logging
pub fn routes(
    state: AppState,
) -> impl Filter<Extract = (impl warp::Reply,), Error = std::convert::Infallible> + Clone {
    let users_routes = {
        let register = warp::path!("users" / "register")
            .and(warp::post())
            .and(with_state(state.clone()))
            .and(sanitized_json())
            .and_then(users::register);

        let login = warp::path!("users" / "login")
            .and(warp::post())
            .and(with_state(state.clone()))
            .and(sanitized_json())
            .and_then(users::login);

        let logout = warp::path!("users" / "logout")
            .and(warp::get())
            .and(with_state(state.clone()))
            .and(authenticated(state.clone()))
            .and_then(users::logout);

        register.or(login).or(logout)
    };

    let message_routes = {
        let list = warp::path!("messages" / "getAllMessages")
            .and(warp::get())
            .and(with_state(state.clone()))
            .and(authenticated(state.clone()))
            .and(sanitized_query())
            .and_then(messages::list_messages);

        let send = warp::path!("messages" / "sendMessage")
            .and(warp::post())
            .and(with_state(state.clone()))
            .and(authenticated(state.clone()))
            .and(json_body())
            .and_then(messages::send_message);

        let edit = warp::path!("messages" / String)
            .and(warp::put())
            .and(with_state(state.clone()))
            .and(authenticated(state.clone()))
            .and(json_body())
            .and_then(messages::edit_message);

        let delete = warp::path!("messages" / String)
            .and(warp::delete())
            .and(with_state(state.clone()))
            .and(authenticated(state.clone()))
            .and_then(messages::delete_message);

        list.or(send).or(edit).or(delete)
    };

    let profile_routes = {
        let details = warp::path!("profile" / "getProfileDetails")
            .and(warp::get())
            .and(authenticated(state.clone()))
            .and_then(profile::get_profile);

        let update = warp::path!("profile" / "updateProfileDetails")
            .and(warp::patch())
            .and(with_state(state.clone()))
            .and(authenticated(state.clone()))
            .and(sanitized_json())
            .and_then(profile::update_profile);

        details.or(update)
    };

    let health = warp::path!("health")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(handlers::health);

    let ws = warp::path(WS_PATH)
        .and(warp::path::end())
        .and(warp::ws())
        .and(warp::header::headers_cloned())
        .and(with_state(state.clone()))
        .and_then(handlers::ws_handshake);

    let log = warp::log::custom(|info| {
        log::info!(
            target: "rusty_chat::http",
            "{} {} {} {}ms",
            info.method(),
            info.path(),
            info.status().as_u16(),
            info.elapsed().as_millis()
        );
    });

    rate_limit(state)
        .and(
            users_routes
                .or(message_routes)
                .or(profile_routes)
                .or(health)
                .or(ws),
        )
        .recover(handlers::handle_rejection)
        .with(log)
}
