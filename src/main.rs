use std::rc::Rc;

use actix_cors::Cors;
use actix_web::{App, HttpServer, web};
use actix_web::middleware::{Logger, from_fn};
use actix_web::http::header;
use actix_web::web::Data;
use env_logger::Env;

use courier::auth::presence_middleware;
use courier::config::Config;
use courier::db::Db;
use courier::jobs::{self, JobContext, JobQueue};
use courier::publisher::EventPublisher;
use courier::routes::{auth as auth_routes, chats as chats_routes, messages as messages_routes, realtime as realtime_routes, users as users_routes};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Init logger to show info by default, but can be overridden by RUST_LOG
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let cfg = Config::from_env_config();

    let db = Db::open(&cfg).await.expect("database init failed");

    let queue = JobQueue::new(&db);
    let publisher = EventPublisher::new(&cfg);

    jobs::start(Rc::new(JobContext {
        db: db.clone(),
        cfg: cfg.clone(),
        queue: queue.clone(),
        publisher,
    }));

    log::info!("Starting server at {}", cfg.listen);

    let listen_addr = cfg.listen.clone();
    HttpServer::new(move || {
        let cors = if cfg.production {
            let mut cors = Cors::default()
                .allowed_methods(vec!["GET", "POST", "PATCH", "PUT", "DELETE"])
                .allowed_headers(vec![header::AUTHORIZATION, header::ACCEPT, header::CONTENT_TYPE])
                .supports_credentials()
                .max_age(3600);
            for origin in &cfg.allowed_origins {
                cors = cors.allowed_origin(origin);
            }
            cors
        } else {
            Cors::permissive()
        };

        App::new()
            .wrap(Logger::default())
            .wrap(cors)
            .app_data(Data::new(cfg.clone()))
            .app_data(Data::new(db.clone()))
            .app_data(Data::new(queue.clone()))
            .service(
                web::scope("/api")
                    .wrap(from_fn(presence_middleware))
                    .service(web::scope("/auth")
                        .route("/register", web::post().to(auth_routes::register))
                        .route("/login", web::post().to(auth_routes::login))
                    )
                    .service(web::scope("/users")
                        .route("/me", web::get().to(users_routes::me))
                        .route("/{id}", web::get().to(users_routes::get_user))
                    )
                    .service(web::scope("/chats")
                        .route("", web::get().to(chats_routes::list_chats))
                        .route("", web::post().to(chats_routes::create_chat))
                        .route("/{id}", web::get().to(chats_routes::get_chat))
                        .route("/{id}", web::patch().to(chats_routes::patch_chat))
                        .route("/{id}", web::delete().to(chats_routes::delete_chat))
                        .route("/{id}/leave", web::post().to(chats_routes::leave_chat))
                    )
                    .service(web::scope("/messages")
                        .route("", web::get().to(messages_routes::list_messages))
                        .route("", web::post().to(messages_routes::post_message))
                        .route("/read_all", web::post().to(messages_routes::read_all_messages))
                        .route("/{id}", web::get().to(messages_routes::get_message))
                        .route("/{id}", web::patch().to(messages_routes::edit_message))
                        .route("/{id}", web::delete().to(messages_routes::delete_message))
                        .route("/{id}/read", web::post().to(messages_routes::read_message))
                    )
                    .service(web::scope("/realtime")
                        .route("/token", web::post().to(realtime_routes::connection_token))
                        .route("/subscription_token", web::post().to(realtime_routes::subscription_token))
                    )
            )
    })
    .bind(listen_addr)?
    .run()
    .await
}
