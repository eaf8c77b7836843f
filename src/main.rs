use actix_web::middleware::Logger;
use actix_web::{App, HttpServer};
use clap::Parser;
use scaffold_api::backend::InMemoryBackend;
use scaffold_api::config::Config;
use scaffold_api::{api, app};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::parse();
    if let Err(e) = config.validate() {
        log::error!("Invalid configuration: {e}");
        return Err(std::io::Error::new(std::io::ErrorKind::InvalidInput, e));
    }
    let rate_limit = config.rate_limit();
    log::info!(
        "Rate limit: {} requests per {:?} per client",
        rate_limit.limit,
        rate_limit.window
    );

    // Shared by every worker, so the limit holds across all of them
    let backend = InMemoryBackend::builder()
        .with_gc_interval(config.gc_interval())
        .build();

    let mut server = HttpServer::new(move || {
        App::new()
            .configure(app::configure(backend.clone(), rate_limit.clone()))
            .wrap(Logger::default())
            .wrap(api::security_headers())
    });
    if config.workers > 0 {
        server = server.workers(config.workers);
    }

    let (host, port) = config.bind_address();
    log::info!("Listening on http://{host}:{port}");
    server.bind((host, port))?.run().await
}
