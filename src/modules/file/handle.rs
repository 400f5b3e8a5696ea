use actix_multipart::Multipart;
use actix_web::http::header::{
    self, Charset, ContentDisposition, DispositionParam, DispositionType, ExtendedValue,
};
use actix_web::{web, HttpRequest, HttpResponse};
use futures_util::TryStreamExt;
use uuid::Uuid;

use crate::api::{error, success};
use crate::modules::file::model::FileUpload;
use crate::modules::file::schema::{FileInfo, FileListResponse, FileUploadResponse, ListQuery};
use crate::modules::file::service::FileService;
use crate::utils::{request_base_url, ValidatedQuery};

/// Name of the multipart field carrying the file.
const FILE_FIELD: &str = "file";

/// Upload file handler
pub async fn upload_file(
    mut payload: Multipart,
    req: HttpRequest,
    service: web::Data<FileService>,
) -> Result<success::Success<FileUploadResponse>, error::Error> {
    let max_size = service.config().max_file_size;

    while let Some(mut field) =
        payload.try_next().await.map_err(|e| error::Error::bad_request(e.to_string()))?
    {
        if field.name() != Some(FILE_FIELD) {
            // Drain fields we don't care about.
            while field.try_next().await.map_err(|e| error::Error::bad_request(e.to_string()))?.is_some() {}
            continue;
        }

        let original_name = field
            .content_disposition()
            .and_then(|cd| cd.get_filename())
            .map(str::to_string)
            .ok_or_else(|| error::Error::bad_request("No file selected"))?;

        let content_type = field.content_type().map(|m| m.to_string());

        // Read file bytes
        let mut bytes = Vec::new();
        while let Some(chunk) =
            field.try_next().await.map_err(|e| error::Error::bad_request(e.to_string()))?
        {
            if bytes.len() + chunk.len() > max_size {
                return Err(error::Error::PayloadTooLarge(
                    format!("File size exceeds maximum allowed size of {max_size} bytes").into(),
                ));
            }
            bytes.extend_from_slice(&chunk);
        }

        let base_url = request_base_url(&req, service.config().public_base_url.as_deref());
        let upload = FileUpload { original_name, content_type, bytes };
        let result = service.upload_file(upload, &base_url).await?;

        return Ok(success::Success::created(Some(result)).message("File uploaded successfully"));
    }

    Err(error::Error::bad_request("No file provided"))
}

/// Serve file bytes for `/{code}` or `/{code}.{ext}`
pub async fn view_file(
    filename: web::Path<String>,
    service: web::Data<FileService>,
) -> Result<HttpResponse, error::Error> {
    let file = service.get_file_content(&filename.into_inner()).await?;
    let max_age = service.seconds_until_expiry(&file.record, chrono::Utc::now());

    Ok(HttpResponse::Ok()
        .insert_header((header::CONTENT_TYPE, file.record.content_type.as_str()))
        .insert_header(content_disposition(&file.record.original_name))
        .insert_header((header::CACHE_CONTROL, format!("public, max-age={max_age}")))
        .body(file.bytes))
}

/// Get file metadata by code
pub async fn file_info(
    code: web::Path<String>,
    req: HttpRequest,
    service: web::Data<FileService>,
) -> Result<success::Success<FileInfo>, error::Error> {
    let base_url = request_base_url(&req, service.config().public_base_url.as_deref());
    let info = service.get_file_info(&code.into_inner(), &base_url).await?;
    Ok(success::Success::ok(Some(info)))
}

/// List files, newest first
pub async fn list_files(
    query: ValidatedQuery<ListQuery>,
    req: HttpRequest,
    service: web::Data<FileService>,
) -> Result<success::Success<FileListResponse>, error::Error> {
    let base_url = request_base_url(&req, service.config().public_base_url.as_deref());
    let files = service.list_files(query.0, &base_url).await?;
    Ok(success::Success::ok(Some(files)))
}

/// Delete file handler
pub async fn delete_file(
    file_id: web::Path<String>,
    service: web::Data<FileService>,
) -> Result<success::Success<()>, error::Error> {
    let file_id =
        Uuid::parse_str(&file_id.into_inner()).map_err(|_| error::Error::not_found("File not found"))?;

    service.delete_file(&file_id).await?;
    Ok(success::Success::ok(None).message("File deleted successfully"))
}

/// `inline` disposition carrying the uploader's filename. Non-ASCII names get
/// an RFC 5987 `filename*` next to an ASCII fallback.
fn content_disposition(original_name: &str) -> ContentDisposition {
    let cleaned: String = original_name.chars().filter(|c| !c.is_control()).collect();
    let fallback: String =
        cleaned.chars().map(|c| if c.is_ascii() && c != '"' && c != '\\' { c } else { '_' }).collect();

    let mut parameters = vec![DispositionParam::Filename(fallback)];
    if !cleaned.is_ascii() {
        parameters.push(DispositionParam::FilenameExt(ExtendedValue {
            charset: Charset::Ext("UTF-8".to_string()),
            language_tag: None,
            value: cleaned.into_bytes(),
        }));
    }

    ContentDisposition { disposition: DispositionType::Inline, parameters }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use actix_web::{http::StatusCode, test, App};
    use serde_json::Value;

    use super::*;
    use crate::modules::content::MemoryContentStore;
    use crate::modules::file::{model::FileConfig, repository_memory::FileMemoryRepository, route};

    const BOUNDARY: &str = "----dropcodeboundary";

    fn service(config: FileConfig) -> FileService {
        FileService::new(
            Arc::new(FileMemoryRepository::new()),
            Arc::new(MemoryContentStore::new()),
            config,
        )
        .unwrap()
    }

    fn multipart_body(field: &str, filename: &str, content_type: &str, data: &[u8]) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(format!("Content-Type: {content_type}\r\n\r\n").as_bytes());
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn upload_request(body: Vec<u8>) -> test::TestRequest {
        test::TestRequest::post()
            .uri("/upload")
            .insert_header((
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            ))
            .set_payload(body)
    }

    #[actix_web::test]
    async fn test_upload_then_download() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(service(FileConfig {
                    public_base_url: Some("https://drop.example".into()),
                    ..FileConfig::default()
                })))
                .configure(route::configure),
        )
        .await;

        let payload = b"\x89PNG\r\n\x1a\n00";
        let req = upload_request(multipart_body("file", "a.png", "image/png", payload)).to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::CREATED);

        let body: Value = test::read_body_json(res).await;
        let code = body["data"]["code"].as_str().unwrap().to_string();
        assert_eq!(code.len(), 4);
        assert_eq!(body["data"]["type"], "image/png");
        assert_eq!(body["data"]["size"], 10);
        assert_eq!(body["data"]["url"], format!("https://drop.example/{code}.png"));

        let req = test::TestRequest::get().uri(&format!("/{code}.png")).to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.headers().get(header::CONTENT_TYPE).unwrap(), "image/png");
        let disposition = res.headers().get(header::CONTENT_DISPOSITION).unwrap().to_str().unwrap();
        assert!(disposition.starts_with("inline"));
        assert!(disposition.contains("a.png"));
        assert_eq!(test::read_body(res).await.as_ref(), payload);

        let req = test::TestRequest::get().uri(&format!("/{code}.jpg")).to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn test_upload_requires_file_field() {
        let app = test::init_service(
            App::new().app_data(web::Data::new(service(FileConfig::default()))).configure(route::configure),
        )
        .await;

        let req = upload_request(multipart_body("other", "a.txt", "text/plain", b"x")).to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);

        let req = upload_request(multipart_body("file", "a.txt", "text/plain", b"")).to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_upload_over_limit_is_rejected() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(service(FileConfig {
                    max_file_size: 4,
                    ..FileConfig::default()
                })))
                .configure(route::configure),
        )
        .await;

        let req = upload_request(multipart_body("file", "a.txt", "text/plain", b"too big")).to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[actix_web::test]
    async fn test_info_list_and_delete() {
        let svc = service(FileConfig::default());
        let uploaded = svc
            .upload_file(
                FileUpload {
                    original_name: "notes.txt".into(),
                    content_type: Some("text/plain".into()),
                    bytes: b"hello".to_vec(),
                },
                "http://localhost",
            )
            .await
            .unwrap();
        let app = test::init_service(
            App::new().app_data(web::Data::new(svc)).configure(route::configure),
        )
        .await;

        let req = test::TestRequest::get().uri(&format!("/info/{}", uploaded.code)).to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["original_name"], "notes.txt");
        assert!(body["data"]["expires_in_seconds"].as_i64().unwrap() > 0);

        let req = test::TestRequest::get().uri("/files?limit=10").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["count"], 1);
        assert!(body["data"]["files"][0].get("bytes").is_none());

        let req = test::TestRequest::get().uri("/files?limit=0").to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);

        let uri = format!("/delete/{}", uploaded.file_id);
        let res = test::call_service(&app, test::TestRequest::delete().uri(&uri).to_request()).await;
        assert_eq!(res.status(), StatusCode::OK);

        let res = test::call_service(&app, test::TestRequest::post().uri(&uri).to_request()).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);

        let req = test::TestRequest::get().uri(&format!("/{}", uploaded.code)).to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);

        let req = test::TestRequest::get().uri(&format!("/info/{}", uploaded.code)).to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn test_delete_with_malformed_id_is_not_found() {
        let app = test::init_service(
            App::new().app_data(web::Data::new(service(FileConfig::default()))).configure(route::configure),
        )
        .await;

        let req = test::TestRequest::delete().uri("/delete/not-a-uuid").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn test_content_disposition_escapes_names() {
        let plain = content_disposition("report.pdf").to_string();
        assert_eq!(plain, "inline; filename=\"report.pdf\"");

        let quoted = content_disposition("a\"b\r\n.txt").to_string();
        assert_eq!(quoted, "inline; filename=\"a_b.txt\"");

        let unicode = content_disposition("ảnh.png").to_string();
        assert!(unicode.contains("filename*=UTF-8''"));
    }
}
