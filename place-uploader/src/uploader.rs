#![deny(clippy::perf, clippy::complexity, clippy::style, unused_imports)]
use std::{io, path::PathBuf};

use api_utils::{check_response, Accepted, SubmitError};
use place_records::{load_document, payload::form_fields, LoadError, UploadPayload};
use reqwest::multipart::{Form, Part};
use serde_json::Value;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncSeek};
use tracing::{debug, error, error_span, field, info, info_span};

use crate::{attachment::Attachment, config::Config};

/// Errors that end the run before or between records.
#[derive(Debug, Error)]
pub(crate) enum FatalError {
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error("opening attachment {} failed: {source}", .path.display())]
    Attachment {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("rewinding attachment failed: {0}")]
    Rewind(#[source] io::Error),
}

impl FatalError {
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            FatalError::Load(err) => err.kind(),
            FatalError::Attachment { .. } | FatalError::Rewind(_) => "AttachmentError",
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RunReport {
    pub total: usize,
    pub accepted: usize,
    pub failed: usize,
}

pub(crate) struct Uploader<'a> {
    client: &'a reqwest::Client,
    api_url: &'a str,
}

impl<'a> Uploader<'a> {
    pub(crate) fn new(client: &'a reqwest::Client, api_url: &'a str) -> Self {
        Self { client, api_url }
    }

    /// Sends one place with the attachment read from its current cursor.
    pub(crate) async fn submit<F: AsyncRead + AsyncSeek + Unpin>(
        &self,
        payload: &UploadPayload,
        attachment: &mut Attachment<F>,
    ) -> Result<Accepted, SubmitError> {
        let contents = attachment
            .read_contents()
            .await
            .map_err(SubmitError::unknown)?;
        let image = Part::bytes(contents).file_name(attachment.file_name().to_owned());
        let form = payload
            .form_fields()
            .into_iter()
            .fold(Form::new(), |form, (name, value)| form.text(name, value))
            .part(form_fields::IMAGE, image);

        let response = self
            .client
            .post(self.api_url)
            .multipart(form)
            .send()
            .await?;
        check_response(response).await
    }

    async fn upload_record<F: AsyncRead + AsyncSeek + Unpin>(
        &self,
        position: usize,
        record: &Value,
        attachment: &mut Attachment<F>,
    ) -> bool {
        let payload = match UploadPayload::from_record(record) {
            Ok(payload) => payload,
            Err(err) => {
                let err = SubmitError::unknown(err);
                error_span!("Uploading places", position, title = field::Empty).in_scope(|| {
                    error!("Upload failed! [{}]: {}", err.kind(), err);
                });
                return false;
            }
        };
        let span = info_span!("Uploading places", position, title = payload.title());
        if let Ok(json) = serde_json::to_string(&payload) {
            span.in_scope(|| debug!("Payload: {}", json));
        }

        match self.submit(&payload, attachment).await {
            Ok(accepted) => {
                span.in_scope(|| {
                    info!(
                        "Place uploaded!: {}, status: {}",
                        payload.title(),
                        accepted.status
                    );
                    debug!("Response: {}", accepted.body);
                });
                true
            }
            Err(err) => {
                error_span!("Uploading places", position, title = payload.title()).in_scope(
                    || {
                        error!(
                            "Upload failed! [{}]: {}: {}",
                            err.kind(),
                            payload.title(),
                            failure_message(&err)
                        );
                    },
                );
                false
            }
        }
    }

    /// Submits `records` in order, one request each.
    ///
    /// A failed record is logged and skipped. The attachment is rewound after
    /// every attempt and closed once the loop ends.
    pub(crate) async fn run<F: AsyncRead + AsyncSeek + Unpin>(
        &self,
        records: &[Value],
        mut attachment: Attachment<F>,
    ) -> Result<RunReport, FatalError> {
        let mut report = RunReport {
            total: records.len(),
            ..Default::default()
        };
        for (index, record) in records.iter().enumerate() {
            if self.upload_record(index + 1, record, &mut attachment).await {
                report.accepted += 1;
            } else {
                report.failed += 1;
            }
            if let Err(err) = attachment.rewind().await {
                attachment.close();
                return Err(FatalError::Rewind(err));
            }
        }
        attachment.close();
        Ok(report)
    }
}

/// The error text plus the server's answer, when there was one. The status is
/// already part of the error text.
fn failure_message(err: &SubmitError) -> String {
    match err.body() {
        Some(body) if !body.is_empty() => format!("{err}, body: {body}"),
        _ => err.to_string(),
    }
}

/// Loads the configured records file and uploads every record.
///
/// Nothing is sent when the file cannot be loaded or has no `records` list.
#[tracing::instrument(skip_all, fields(api_url = config.get_api_url()))]
pub(crate) async fn upload_places(config: &Config) -> Result<RunReport, FatalError> {
    let records = load_document(config.get_records_path())?.into_records()?;
    info!("Found {} place records", records.len());

    let image_path = config.get_image_path();
    let attachment = Attachment::open(image_path)
        .await
        .map_err(|source| FatalError::Attachment {
            path: image_path.clone(),
            source,
        })?;

    Uploader::new(config.get_http_client(), config.get_api_url())
        .run(&records, attachment)
        .await
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, Write};

    use serde_json::json;
    use tempfile::NamedTempFile;
    use wiremock::{
        matchers::{body_string_contains, header, method, path},
        Mock, MockServer, Request, ResponseTemplate,
    };

    use super::*;

    const IMAGE: &[u8] = b"<svg xmlns=\"http://www.w3.org/2000/svg\"><circle r=\"4\"/></svg>";
    const ENDPOINT: &str = "/api/place/add";

    fn client() -> reqwest::Client {
        Config::init_place_client("test-token").unwrap()
    }

    fn attachment() -> Attachment<Cursor<Vec<u8>>> {
        Attachment::new(Cursor::new(IMAGE.to_vec()), "next.svg")
    }

    fn body(request: &Request) -> String {
        String::from_utf8_lossy(&request.body).into_owned()
    }

    /// Content of the multipart part named `name`.
    fn part(body: &str, name: &str) -> Option<String> {
        let start = body.find(&format!("name=\"{name}\""))?;
        let content_start = start + body[start..].find("\r\n\r\n")? + 4;
        let content_end = content_start + body[content_start..].find("\r\n--")?;
        Some(body[content_start..content_end].to_string())
    }

    fn place(title: &str, lat: Value, lng: Value) -> Value {
        json!({
            "관광지명": title,
            "위도": lat,
            "경도": lng,
            "관광지소개": format!("{title} 소개"),
            "상세URL": "https://example.org/detail"
        })
    }

    async fn server_answering(status: u16) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(ENDPOINT))
            .respond_with(ResponseTemplate::new(status))
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn every_record_is_posted_with_mapped_fields() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(ENDPOINT))
            .and(header("authorization", "Bearer test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(3)
            .mount(&server)
            .await;
        let records = vec![
            place("경복궁", json!(37.5796), json!(126.977)),
            place("남산", json!("37.5512"), json!("126.9882")),
            place("해운대", json!(35.1587), json!(129)),
        ];
        let client = client();
        let url = format!("{}{}", server.uri(), ENDPOINT);

        let report = Uploader::new(&client, &url)
            .run(&records, attachment())
            .await
            .unwrap();

        assert_eq!(
            report,
            RunReport {
                total: 3,
                accepted: 3,
                failed: 0
            }
        );
        let requests = server.received_requests().await.unwrap();
        let first = body(&requests[0]);
        assert_eq!(part(&first, "placeTitle").as_deref(), Some("경복궁"));
        assert_eq!(part(&first, "lat").as_deref(), Some("37.5796"));
        assert_eq!(part(&first, "lng").as_deref(), Some("126.977"));
        assert_eq!(part(&first, "rating").as_deref(), Some("3"));
        assert_eq!(part(&first, "placeDescription").as_deref(), Some("경복궁 소개"));
        assert!(!first.contains("placeURL"));
        assert!(first.contains("name=\"placeImageURL\"; filename=\"next.svg\""));

        let third = body(&requests[2]);
        assert_eq!(part(&third, "placeTitle").as_deref(), Some("해운대"));
        assert_eq!(part(&third, "lng").as_deref(), Some("129"));
    }

    #[tokio::test]
    async fn attachment_is_identical_for_every_request() {
        let server = server_answering(200).await;
        let records = vec![
            place("a", json!(1.0), json!(2.0)),
            place("b", json!(1.0), json!(2.0)),
            place("c", json!(1.0), json!(2.0)),
        ];
        let client = client();
        let url = format!("{}{}", server.uri(), ENDPOINT);

        Uploader::new(&client, &url)
            .run(&records, attachment())
            .await
            .unwrap();

        let requests = server.received_requests().await.unwrap();
        let images: Vec<_> = requests
            .iter()
            .map(|request| part(&body(request), "placeImageURL"))
            .collect();
        assert_eq!(images.len(), 3);
        for image in images {
            assert_eq!(image.as_deref().map(str::as_bytes), Some(IMAGE));
        }
    }

    #[tokio::test]
    async fn failed_record_does_not_stop_the_run() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string_contains("깨진 장소"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .with_priority(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(2)
            .mount(&server)
            .await;
        let records = vec![
            place("깨진 장소", json!(1.0), json!(2.0)),
            place("b", json!(1.0), json!(2.0)),
            place("c", json!(1.0), json!(2.0)),
        ];
        let client = client();
        let url = format!("{}{}", server.uri(), ENDPOINT);

        let report = Uploader::new(&client, &url)
            .run(&records, attachment())
            .await
            .unwrap();

        assert_eq!(
            report,
            RunReport {
                total: 3,
                accepted: 2,
                failed: 1
            }
        );
        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 3);
        // The image is still complete after the rejected request.
        assert_eq!(
            part(&body(&requests[1]), "placeImageURL").as_deref().map(str::as_bytes),
            Some(IMAGE)
        );
    }

    #[tokio::test]
    async fn malformed_record_is_skipped_without_a_request() {
        let server = server_answering(200).await;
        let records = vec![json!("not a place"), place("b", json!(1.0), json!(2.0))];
        let client = client();
        let url = format!("{}{}", server.uri(), ENDPOINT);

        let report = Uploader::new(&client, &url)
            .run(&records, attachment())
            .await
            .unwrap();

        assert_eq!(report.accepted, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(server.received_requests().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unreachable_server_fails_each_record() {
        let client = client();
        let records = vec![
            place("a", json!(1.0), json!(2.0)),
            place("b", json!(1.0), json!(2.0)),
        ];

        let report = Uploader::new(&client, "http://127.0.0.1:9/api/place/add")
            .run(&records, attachment())
            .await
            .unwrap();

        assert_eq!(
            report,
            RunReport {
                total: 2,
                accepted: 0,
                failed: 2
            }
        );
    }

    #[test]
    fn failure_message_names_status_once() {
        let err = SubmitError::Status {
            status: reqwest::StatusCode::INTERNAL_SERVER_ERROR,
            body: "boom".to_string(),
        };

        let message = failure_message(&err);

        assert_eq!(
            message,
            "server rejected the request with 500 Internal Server Error, body: boom"
        );
        assert_eq!(message.matches("500").count(), 1);
    }

    #[test]
    fn failure_message_skips_empty_body() {
        let err = SubmitError::Status {
            status: reqwest::StatusCode::UNAUTHORIZED,
            body: String::new(),
        };

        assert_eq!(
            failure_message(&err),
            "server rejected the request with 401 Unauthorized"
        );
    }

    #[tokio::test]
    async fn submit_reports_status_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_string("token expired"))
            .mount(&server)
            .await;
        let client = client();
        let url = format!("{}{}", server.uri(), ENDPOINT);
        let payload = UploadPayload::from_record(&place("a", json!(1.0), json!(2.0))).unwrap();

        let err = Uploader::new(&client, &url)
            .submit(&payload, &mut attachment())
            .await
            .unwrap_err();

        assert_eq!(err.status().map(|status| status.as_u16()), Some(403));
        assert_eq!(err.body(), Some("token expired"));
    }

    fn config_for(server: &MockServer, records: &NamedTempFile, image: &NamedTempFile) -> Config {
        let url = format!("{}{}", server.uri(), ENDPOINT);
        let records_path = records.path().to_string_lossy().into_owned();
        let image_path = image.path().to_string_lossy().into_owned();
        Config::from_lookup(move |name| match name {
            "PLACE_API_TOKEN" => Some("test-token".to_string()),
            "PLACE_API_URL" => Some(url.clone()),
            "PLACE_RECORDS_PATH" => Some(records_path.clone()),
            "PLACE_IMAGE_PATH" => Some(image_path.clone()),
            _ => None,
        })
        .unwrap()
    }

    fn temp_file(contents: &[u8]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents).unwrap();
        file
    }

    #[tokio::test]
    async fn uploads_places_from_file() {
        let server = server_answering(200).await;
        let records = temp_file(
            json!({"records": [place("a", json!(1.0), json!(2.0)), place("b", json!(3), json!(4))]})
                .to_string()
                .as_bytes(),
        );
        let image = temp_file(IMAGE);

        let report = upload_places(&config_for(&server, &records, &image))
            .await
            .unwrap();

        assert_eq!(report.accepted, 2);
        assert_eq!(server.received_requests().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn missing_records_key_sends_nothing() {
        let server = server_answering(200).await;
        let records = temp_file(br#"{"items": []}"#);
        let image = temp_file(IMAGE);

        let err = upload_places(&config_for(&server, &records, &image))
            .await
            .unwrap_err();

        assert!(matches!(err, FatalError::Load(LoadError::Schema)));
        assert_eq!(err.kind(), "SchemaError");
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn malformed_json_sends_nothing() {
        let server = server_answering(200).await;
        let records = temp_file(br#"{"records": [{"#);
        let image = temp_file(IMAGE);

        let err = upload_places(&config_for(&server, &records, &image))
            .await
            .unwrap_err();

        assert!(matches!(err, FatalError::Load(LoadError::Parse(_))));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_image_sends_nothing() {
        let server = server_answering(200).await;
        let records = temp_file(
            json!({"records": [place("a", json!(1.0), json!(2.0))]})
                .to_string()
                .as_bytes(),
        );
        let image = temp_file(IMAGE);
        let config = config_for(&server, &records, &image);
        drop(image);

        let err = upload_places(&config).await.unwrap_err();

        assert!(matches!(err, FatalError::Attachment { .. }));
        assert!(server.received_requests().await.unwrap().is_empty());
    }
}
