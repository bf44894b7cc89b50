use crate::config::Config;
use crate::error::{AppError, Result};
use crate::models::CreateRepository;
use crate::providers::ProviderOutput;
use crate::registry::Registry;
use actix_files::{Files, NamedFile};
use actix_web::dev::ServiceResponse;
use actix_web::middleware::ErrorHandlerResponse;
use actix_web::{delete, get, post, put, web, HttpRequest, HttpResponse};
use log::{debug, error, info, warn};
use std::io;
use std::path::Path;
use std::time::Instant;

/// Registers the repository API and the bundled front-end assets.
pub fn configure(cfg: &mut web::ServiceConfig, config: &Config) {
    cfg.app_data(web::JsonConfig::default().error_handler(|err, _req| {
        AppError::Validation(err.to_string()).into()
    }))
    .app_data(web::PayloadConfig::new(config.max_upload_bytes))
    .service(index)
    .service(app_page)
    .service(create_repository)
    .service(list_repositories)
    .service(get_repository)
    .service(delete_repository)
    .service(build_repository)
    .service(run_repository)
    .service(get_repository_file)
    .service(put_repository_file);

    let static_dir = config.assets_dir.join("static");
    if static_dir.is_dir() {
        cfg.service(Files::new("/static", static_dir));
    }
}

/// Logs every 5xx with the request target before it goes out.
pub fn log_server_error<B>(res: ServiceResponse<B>) -> actix_web::Result<ErrorHandlerResponse<B>> {
    match res.response().error() {
        Some(err) => error!("Error serving {}: {}", res.request().uri(), err),
        None => error!("Error serving {}: {}", res.request().uri(), res.status()),
    }
    Ok(ErrorHandlerResponse::Response(res.map_into_left_body()))
}

async fn open_file(path: &Path) -> Result<NamedFile> {
    NamedFile::open_async(path).await.map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => AppError::not_found(path.display().to_string()),
        _ => AppError::Io(e),
    })
}

fn provider_response(output: ProviderOutput) -> HttpResponse {
    let mut builder = if output.success {
        HttpResponse::Ok()
    } else {
        HttpResponse::InternalServerError()
    };
    builder
        .content_type("text/plain; charset=utf-8")
        .body(output.output)
}

#[get("/")]
pub async fn index(config: web::Data<Config>) -> Result<NamedFile> {
    open_file(&config.assets_dir.join("index.html")).await
}

#[get("/app")]
pub async fn app_page(config: web::Data<Config>) -> Result<NamedFile> {
    open_file(&config.assets_dir.join("app.html")).await
}

#[post("/repositories")]
pub async fn create_repository(
    registry: web::Data<Registry>,
    body: web::Json<CreateRepository>,
) -> Result<HttpResponse> {
    let url = body.into_inner().url.unwrap_or_default();
    info!("Received request to clone repository: {}", url);
    let start_time = Instant::now();

    let registry = registry.into_inner();
    let repo = web::block(move || registry.create(&url)).await??;

    info!(
        "Cloned repository {} ({}) in {:.2?}.",
        repo.name,
        repo.id,
        start_time.elapsed()
    );
    Ok(HttpResponse::Ok().json(repo))
}

#[get("/repositories")]
pub async fn list_repositories(registry: web::Data<Registry>) -> Result<HttpResponse> {
    let registry = registry.into_inner();
    let repos = web::block(move || registry.list()).await??;
    Ok(HttpResponse::Ok().json(repos))
}

#[get("/repositories/{id}")]
pub async fn get_repository(
    registry: web::Data<Registry>,
    id: web::Path<String>,
) -> Result<HttpResponse> {
    let id = id.into_inner();
    debug!("Loading repository {}", id);
    let registry = registry.into_inner();
    let repo = web::block(move || registry.open(&id)).await??;
    Ok(HttpResponse::Ok().json(repo))
}

#[delete("/repositories/{id}")]
pub async fn delete_repository(
    registry: web::Data<Registry>,
    id: web::Path<String>,
) -> Result<HttpResponse> {
    let id = id.into_inner();
    info!("Received request to delete repository {}", id);
    let registry = registry.into_inner();
    web::block(move || registry.delete(&id)).await??;
    Ok(HttpResponse::Ok().finish())
}

#[post("/repositories/{id}/build")]
pub async fn build_repository(
    registry: web::Data<Registry>,
    id: web::Path<String>,
) -> Result<HttpResponse> {
    let id = id.into_inner();
    info!("Building repository {}", id);
    let start_time = Instant::now();
    let registry = registry.into_inner();
    let output = web::block(move || registry.build(&id)).await??;
    if !output.success {
        warn!("Build finished unsuccessfully after {:.2?}.", start_time.elapsed());
    }
    Ok(provider_response(output))
}

#[get("/repositories/{id}/run")]
pub async fn run_repository(
    registry: web::Data<Registry>,
    id: web::Path<String>,
) -> Result<HttpResponse> {
    let id = id.into_inner();
    info!("Launching repository {}", id);
    let registry = registry.into_inner();
    let output = web::block(move || registry.launch(&id)).await??;
    debug!("Launch output: {}", String::from_utf8_lossy(&output.output));
    Ok(provider_response(output))
}

#[get("/repositories/{id}/files/{path:.*}")]
pub async fn get_repository_file(
    req: HttpRequest,
    registry: web::Data<Registry>,
    path: web::Path<(String, String)>,
) -> Result<HttpResponse> {
    let (id, file) = path.into_inner();
    debug!("Reading file {} from repository {}", file, id);
    let registry = registry.into_inner();
    let resolved = web::block(move || registry.file_path(&id, &file)).await??;
    Ok(open_file(&resolved).await?.into_response(&req))
}

#[put("/repositories/{id}/files/{path:.*}")]
pub async fn put_repository_file(
    registry: web::Data<Registry>,
    path: web::Path<(String, String)>,
    body: web::Bytes,
) -> Result<HttpResponse> {
    let (id, file) = path.into_inner();
    debug!("Writing {} bytes to {} in repository {}", body.len(), file, id);
    let registry = registry.into_inner();
    web::block(move || registry.write_file(&id, &file, &body)).await??;
    Ok(HttpResponse::Ok().finish())
}
