use actix_cors::Cors;
use actix_web::http::header;
use actix_web::middleware::{ErrorHandlers, Logger};
use actix_web::{web, App, HttpServer};
use log::{info, warn};
use repohost::handlers::{self, log_server_error};
use repohost::providers::{GitCli, IosSim, XcodeBuild};
use repohost::{Config, Registry};
use rustls::ServerConfig;
use rustls_pemfile::{certs, pkcs8_private_keys};
use std::env;
use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;
use std::sync::Arc;

fn load_tls_config(cert_path: &Path, key_path: &Path) -> io::Result<ServerConfig> {
    let cert_file = &mut BufReader::new(File::open(cert_path)?);
    let key_file = &mut BufReader::new(File::open(key_path)?);
    let cert_chain = certs(cert_file).collect::<Result<Vec<_>, _>>()?;
    let mut keys = pkcs8_private_keys(key_file).collect::<Result<Vec<_>, _>>()?;

    if keys.is_empty() {
        return Err(io::Error::new(io::ErrorKind::Other, "No private keys found in key file"));
    }

    ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(cert_chain, keys.remove(0).into())
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenv::dotenv().ok();
    // Override the log level with RUST_LOG, e.g. `RUST_LOG=debug`.
    env::set_var("RUST_LOG", env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()));
    env_logger::init();

    let config = Config::from_env().map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    let addr = config.bind_addr();
    info!("Storing repositories under {}", config.storage_root.display());

    let registry = web::Data::new(Registry::new(
        config.storage_root.clone(),
        Arc::new(GitCli::new(config.git_bin.clone())),
        Arc::new(XcodeBuild::new(config.xcodebuild_bin.clone())),
        Arc::new(IosSim::new(config.ios_sim_bin.clone())),
    ));
    let app_config = web::Data::new(config.clone());

    let mut http_server = HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allowed_methods(vec!["GET", "POST", "PUT", "DELETE"])
            .allowed_headers(vec![header::ACCEPT, header::CONTENT_TYPE])
            .max_age(3600);

        let routes_config = app_config.clone();
        App::new()
            .wrap(ErrorHandlers::new().default_handler_server(log_server_error))
            .wrap(cors)
            .wrap(Logger::default())
            .app_data(registry.clone())
            .app_data(app_config.clone())
            .configure(move |cfg| handlers::configure(cfg, &routes_config))
    });

    match (&config.cert_path, &config.key_path) {
        (Some(cert_path), Some(key_path)) if cert_path.exists() && key_path.exists() => {
            info!("Attempting to start HTTPS server...");
            let tls = load_tls_config(cert_path, key_path)?;
            info!("Successfully configured TLS. Binding to https://{}", addr);
            http_server = http_server.bind_rustls_0_23(addr, tls)?;
        }
        (Some(_), Some(_)) => {
            warn!("CERT_PATH or KEY_PATH points to a non-existent file. Starting without HTTPS.");
            info!("Server running at http://{}", addr);
            http_server = http_server.bind(addr)?;
        }
        _ => {
            info!("No CERT_PATH or KEY_PATH found in env. Starting plain HTTP server.");
            info!("Server running at http://{}", addr);
            http_server = http_server.bind(addr)?;
        }
    }

    http_server.run().await
}
