use actix_web::dev::Server;
use actix_web::{guard, middleware::Logger, web, App, HttpServer};
use std::net::TcpListener;
use std::sync::Arc;

use crate::configuration::{JwtSettings, WebhookSettings};
use crate::logger::LoggerMiddleware;
use crate::middleware::AccessTokenGuard;
use crate::routes::{create_user, entitlement_webhook, health_check, login, refresh, revoke, update_user};
use crate::session::AuthSessionService;
use crate::store::CredentialStore;

pub fn run(
    listener: TcpListener,
    store: Arc<dyn CredentialStore>,
    jwt_config: JwtSettings,
    webhook_config: WebhookSettings,
) -> Result<Server, std::io::Error> {
    let sessions = AuthSessionService::new(store, &jwt_config);
    let guard_sessions = sessions.clone();
    let sessions = web::Data::new(sessions);
    let webhook_config = web::Data::new(webhook_config);

    let server = HttpServer::new(move || {
        App::new()
            // Global middleware
            .wrap(Logger::default())
            .wrap(LoggerMiddleware)

            // Shared state
            .app_data(sessions.clone())
            .app_data(webhook_config.clone())

            .service(
                web::scope("/api")
                    .route("/healthz", web::get().to(health_check))
                    .route("/login", web::post().to(login))
                    .route("/refresh", web::post().to(refresh))
                    .route("/revoke", web::post().to(revoke))
                    .route("/webhooks/entitlement", web::post().to(entitlement_webhook))
                    .service(
                        web::resource("/users")
                            .guard(guard::Put())
                            .wrap(AccessTokenGuard::new(guard_sessions.clone()))
                            .route(web::put().to(update_user)),
                    )
                    .route("/users", web::post().to(create_user)),
            )
    })
    .listen(listener)?
    .run();

    Ok(server)
}
