//! Implementation of the actix server.

use std::sync::Arc;

use actix_web::{
    http::StatusCode, middleware::Logger, web::Data, App, HttpResponse, HttpServer, ResponseError,
};

use crate::{
    err::{LoadError, PanelError},
    panels::{GenePanel, PanelData},
};

use super::WebServerData;

#[derive(Debug)]
pub struct CustomError {
    err: anyhow::Error,
    status: StatusCode,
}

impl std::fmt::Display for CustomError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.err)
    }
}

impl CustomError {
    fn new(err: anyhow::Error) -> Self {
        Self::with_status(err, StatusCode::INTERNAL_SERVER_ERROR)
    }

    fn with_status(err: anyhow::Error, status: StatusCode) -> Self {
        CustomError { err, status }
    }
}

impl From<PanelError> for CustomError {
    fn from(err: PanelError) -> Self {
        CustomError {
            err: err.into(),
            status: StatusCode::BAD_REQUEST,
        }
    }
}

impl ResponseError for CustomError {
    fn status_code(&self) -> StatusCode {
        self.status
    }
}

/// Log and convert an invalid request.
fn bad_request(err: PanelError) -> CustomError {
    tracing::error!("{}", &err);
    err.into()
}

fn no_content() -> HttpResponse {
    HttpResponse::NoContent().finish()
}

/// Build the cache key from optional comma-separated query values.
fn panel_data(
    present_term: &Option<Vec<String>>,
    absent_term: &Option<Vec<String>>,
    rejected_gene: &Option<Vec<String>>,
) -> PanelData {
    PanelData::new(
        present_term.iter().flatten(),
        absent_term.iter().flatten(),
        rejected_gene.iter().flatten(),
    )
}

/// Load the panel for `key`; `None` if there is nothing to return.
fn load_panel(
    data: &WebServerData,
    key: &PanelData,
) -> Result<Option<Arc<GenePanel>>, CustomError> {
    if key.has_no_terms() {
        tracing::error!("No content provided.");
        return Ok(None);
    }
    match data.loader.get(key) {
        Ok(panel) => Ok(Some(panel)),
        Err(LoadError::Empty) => {
            tracing::warn!(
                "No content associated with [present-term: {:?}, absent-term: {:?}, rejected-gene: {:?}].",
                key.present_terms(),
                key.absent_terms(),
                key.rejected_genes()
            );
            Ok(None)
        }
        Err(e) => {
            tracing::error!("Failed to compute gene panel: {}", &e);
            Err(CustomError::new(e.into()))
        }
    }
}

// Code for `/panels`.
pub mod panels {
    use actix_web::{
        get,
        web::{self, Data, Path},
        HttpResponse,
    };
    use serde::Deserialize;
    use serde_with::{formats::CommaSeparator, StringWithSeparator};

    use crate::panels::paging::{page_panel, parse_param};

    use super::{bad_request, load_panel, no_content, panel_data, CustomError, WebServerData};

    /// Parameters for `handle`.
    ///
    /// - `present-term`, `absent-term`, `rejected-gene` -- comma-separated
    ///   identifiers
    /// - `startpage` -- 1-based page, defaults to 1
    /// - `limit` -- genes per page, all genes if missing or negative
    /// - `reqNo` -- echoed back to the client, defaults to 1
    #[serde_with::skip_serializing_none]
    #[serde_with::serde_as]
    #[derive(Deserialize, Debug, Clone)]
    struct Request {
        #[serde(rename = "present-term")]
        #[serde_as(as = "Option<StringWithSeparator::<CommaSeparator, String>>")]
        pub present_term: Option<Vec<String>>,
        #[serde(rename = "absent-term")]
        #[serde_as(as = "Option<StringWithSeparator::<CommaSeparator, String>>")]
        pub absent_term: Option<Vec<String>>,
        #[serde(rename = "rejected-gene")]
        #[serde_as(as = "Option<StringWithSeparator::<CommaSeparator, String>>")]
        pub rejected_gene: Option<Vec<String>>,
        pub startpage: Option<String>,
        pub limit: Option<String>,
        #[serde(rename = "reqNo")]
        pub req_no: Option<String>,
    }

    /// Page through the gene panel for the given terms.
    #[get("/panels")]
    pub async fn handle(
        data: Data<WebServerData>,
        _path: Path<()>,
        query: web::Query<Request>,
    ) -> actix_web::Result<HttpResponse, CustomError> {
        let start_page = parse_param(query.startpage.as_deref(), "startpage").map_err(bad_request)?;
        let limit = parse_param(query.limit.as_deref(), "limit").map_err(bad_request)?;
        let req_no = parse_param(query.req_no.as_deref(), "reqNo")
            .map_err(bad_request)?
            .unwrap_or(1);

        let key = panel_data(&query.present_term, &query.absent_term, &query.rejected_gene);
        let panel = match load_panel(&data, &key)? {
            Some(panel) => panel,
            None => return Ok(no_content()),
        };

        let mut result = page_panel(&panel, start_page, limit).map_err(bad_request)?;
        result["reqNo"] = req_no.into();
        Ok(HttpResponse::Ok().json(result))
    }
}

// Code for `/panels/livetable`.
pub mod livetable {
    use actix_web::{
        get,
        web::{self, Data, Path},
        HttpResponse,
    };
    use serde::Deserialize;
    use serde_with::{formats::CommaSeparator, StringWithSeparator};

    use crate::panels::paging::{offset_panel, parse_param};

    use super::{bad_request, load_panel, no_content, panel_data, CustomError, WebServerData};

    /// Parameters for `handle`.
    ///
    /// - `present-term`, `absent-term`, `rejected-gene` -- comma-separated
    ///   identifiers
    /// - `offset` -- 1-based first row, defaults to 1
    /// - `limit` -- maximal number of rows, all remaining rows if missing
    /// - `reqNo` -- echoed back to the client, defaults to 1
    #[serde_with::skip_serializing_none]
    #[serde_with::serde_as]
    #[derive(Deserialize, Debug, Clone)]
    struct Request {
        #[serde(rename = "present-term")]
        #[serde_as(as = "Option<StringWithSeparator::<CommaSeparator, String>>")]
        pub present_term: Option<Vec<String>>,
        #[serde(rename = "absent-term")]
        #[serde_as(as = "Option<StringWithSeparator::<CommaSeparator, String>>")]
        pub absent_term: Option<Vec<String>>,
        #[serde(rename = "rejected-gene")]
        #[serde_as(as = "Option<StringWithSeparator::<CommaSeparator, String>>")]
        pub rejected_gene: Option<Vec<String>>,
        pub offset: Option<String>,
        pub limit: Option<String>,
        #[serde(rename = "reqNo")]
        pub req_no: Option<String>,
    }

    /// Rows of the gene panel for a live table.
    #[get("/panels/livetable")]
    pub async fn handle(
        data: Data<WebServerData>,
        _path: Path<()>,
        query: web::Query<Request>,
    ) -> actix_web::Result<HttpResponse, CustomError> {
        let offset = parse_param(query.offset.as_deref(), "offset").map_err(bad_request)?;
        let limit = parse_param(query.limit.as_deref(), "limit").map_err(bad_request)?;
        let req_no = parse_param(query.req_no.as_deref(), "reqNo")
            .map_err(bad_request)?
            .unwrap_or(1);

        let key = panel_data(&query.present_term, &query.absent_term, &query.rejected_gene);
        let panel = match load_panel(&data, &key)? {
            Some(panel) => panel,
            None => return Ok(no_content()),
        };

        let mut result = offset_panel(&panel, offset, limit).map_err(bad_request)?;
        result["reqNo"] = req_no.into();
        Ok(HttpResponse::Ok().json(result))
    }
}

// Code for `/panels/match-counts`.
pub mod match_counts {
    use actix_web::{
        get,
        web::{self, Data, Path},
        HttpResponse,
    };
    use serde::Deserialize;
    use serde_with::{formats::CommaSeparator, StringWithSeparator};

    use crate::panels::match_count::{build_match_counts, MatchCount};

    use super::{no_content, panel_data, CustomError, WebServerData};

    /// Parameters for `handle`.
    ///
    /// - `present-term`, `rejected-gene` -- comma-separated identifiers
    #[serde_with::skip_serializing_none]
    #[serde_with::serde_as]
    #[derive(Deserialize, Debug, Clone)]
    struct Request {
        #[serde(rename = "present-term")]
        #[serde_as(as = "Option<StringWithSeparator::<CommaSeparator, String>>")]
        pub present_term: Option<Vec<String>>,
        #[serde(rename = "rejected-gene")]
        #[serde_as(as = "Option<StringWithSeparator::<CommaSeparator, String>>")]
        pub rejected_gene: Option<Vec<String>>,
    }

    /// Number of associated genes for each present term.
    #[get("/panels/match-counts")]
    pub async fn handle(
        data: Data<WebServerData>,
        _path: Path<()>,
        query: web::Query<Request>,
    ) -> actix_web::Result<HttpResponse, CustomError> {
        let key = panel_data(&query.present_term, &None, &query.rejected_gene);
        if key.present_terms().is_empty() {
            tracing::error!("No content provided.");
            return Ok(no_content());
        }

        let resolved = key.resolve(data.vocabulary_manager.as_ref());
        let match_counts = build_match_counts(&resolved.present_terms, &resolved.rejected_genes);
        if match_counts.is_empty() {
            tracing::warn!(
                "No genes associated with [present-term: {:?}].",
                key.present_terms()
            );
            return Ok(no_content());
        }

        Ok(HttpResponse::Ok().json(serde_json::json!({
            "count": match_counts.len(),
            "rows": match_counts.iter().map(MatchCount::to_json).collect::<Vec<_>>(),
        })))
    }
}

// Code for `/panels/invalidate`.
pub mod invalidate {
    use actix_web::{
        http::StatusCode,
        post,
        web::{Bytes, Data, Json},
        Responder,
    };
    use serde::Deserialize;

    use crate::panels::PanelData;

    use super::{CustomError, WebServerData};

    /// Body of the request; all cached panels are dropped if it is empty.
    #[derive(Deserialize, Debug, Clone, Default)]
    #[serde(deny_unknown_fields)]
    struct Request {
        #[serde(rename = "present-term", default)]
        pub present_term: Vec<String>,
        #[serde(rename = "absent-term", default)]
        pub absent_term: Vec<String>,
        #[serde(rename = "rejected-gene", default)]
        pub rejected_gene: Vec<String>,
    }

    /// Drop one or all cached panels and return the number still cached.
    #[post("/panels/invalidate")]
    pub async fn handle(
        data: Data<WebServerData>,
        body: Bytes,
    ) -> actix_web::Result<impl Responder, CustomError> {
        if body.iter().all(u8::is_ascii_whitespace) {
            tracing::info!("Invalidating all cached panels");
            data.loader.invalidate_all();
        } else {
            let body: Request = serde_json::from_slice(&body).map_err(|e| {
                tracing::error!("Invalid invalidation request: {}", &e);
                CustomError::with_status(e.into(), StatusCode::BAD_REQUEST)
            })?;
            let key = PanelData::new(&body.present_term, &body.absent_term, &body.rejected_gene);
            tracing::info!("Invalidating cached panel for {:?}", &key);
            data.loader.invalidate(key);
        }
        Ok(Json(serde_json::json!({ "cached": data.loader.size() })))
    }
}

#[actix_web::main]
pub async fn main(
    listen_host: &str,
    listen_port: u16,
    data: Data<WebServerData>,
) -> std::io::Result<()> {
    HttpServer::new(move || {
        App::new()
            .app_data(data.clone())
            .service(panels::handle)
            .service(livetable::handle)
            .service(match_counts::handle)
            .service(invalidate::handle)
            .wrap(Logger::default())
    })
    .bind((listen_host, listen_port))?
    .run()
    .await
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use actix_web::{http::StatusCode, test::TestRequest, web::Data, App};
    use pretty_assertions::assert_eq;
    use tracing_test::traced_test;

    use super::{load_panel, WebServerData};
    use crate::{
        panels::{panel::test::symbols, PanelData},
        vocab::memory::test::test_manager,
    };

    fn data() -> Data<WebServerData> {
        Data::new(WebServerData::new(Arc::new(test_manager())))
    }

    /// Run one request against a fresh app; the body is `Null` if empty.
    async fn call(data: Data<WebServerData>, req: TestRequest) -> (StatusCode, serde_json::Value) {
        let app = actix_web::test::init_service(
            App::new()
                .app_data(data)
                .service(super::panels::handle)
                .service(super::livetable::handle)
                .service(super::match_counts::handle)
                .service(super::invalidate::handle),
        )
        .await;
        let resp = actix_web::test::call_service(&app, req.to_request()).await;
        let status = resp.status();
        let body = actix_web::test::read_body(resp).await;
        let json = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    #[actix_web::test]
    async fn panels_paged() {
        let (status, json) = call(
            data(),
            TestRequest::get()
                .uri("/panels?present-term=HP:0001250,HP:0001263&startpage=2&limit=2&reqNo=7"),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(symbols(&json), vec!["KCNQ2"]);
        assert_eq!(json["totalpages"], 2);
        assert_eq!(json["totalrows"], 3);
        assert_eq!(json["returnedrows"], 1);
        assert_eq!(json["reqNo"], 7);
    }

    #[actix_web::test]
    async fn panels_rejected_gene() {
        let (status, json) = call(
            data(),
            TestRequest::get().uri("/panels?present-term=HP:0001250,HP:0001263&rejected-gene=SCN1A"),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        // equal counts, "Global developmental delay" sorts before "Seizure"
        assert_eq!(symbols(&json), vec!["STXBP1", "KCNQ2"]);
        assert_eq!(json["reqNo"], 1);
        assert_eq!(json["totalpages"], 1);
    }

    #[actix_web::test]
    async fn no_content() {
        for uri in [
            "/panels",
            "/panels?present-term=HP:0000118",
            "/panels/livetable?rejected-gene=SCN1A",
            "/panels/match-counts?present-term=HP:0000118",
        ] {
            let (status, json) = call(data(), TestRequest::get().uri(uri)).await;

            assert_eq!(status, StatusCode::NO_CONTENT, "{}", uri);
            assert_eq!(json, serde_json::Value::Null, "{}", uri);
        }
    }

    #[actix_web::test]
    async fn bad_request() {
        for uri in [
            "/panels?present-term=HP:0001250&startpage=-20",
            "/panels?present-term=HP:0001250&startpage=5&limit=1",
            "/panels?present-term=HP:0001250&limit=abc",
            "/panels/livetable?present-term=HP:0001250&offset=20",
        ] {
            let (status, _) = call(data(), TestRequest::get().uri(uri)).await;

            assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
        }
    }

    #[actix_web::test]
    async fn livetable_offset() {
        let (status, json) = call(
            data(),
            TestRequest::get()
                .uri("/panels/livetable?present-term=HP:0001250,HP:0001263&offset=2&limit=10&reqNo=3"),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(symbols(&json), vec!["STXBP1", "KCNQ2"]);
        assert_eq!(json["offset"], 2);
        assert_eq!(json["reqNo"], 3);
        assert_eq!(json["totalrows"], 3);
    }

    #[actix_web::test]
    async fn match_counts() {
        let (status, json) = call(
            data(),
            TestRequest::get()
                .uri("/panels/match-counts?present-term=HP:0001250,HP:0002133&rejected-gene=KCNQ2"),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["count"], 1);
        assert_eq!(json["rows"][0]["id"], "HP:0001250");
        assert_eq!(json["rows"][0]["genes"], serde_json::json!(["SCN1A"]));
    }

    #[actix_web::test]
    async fn invalidate() {
        let data = data();
        data.loader
            .get(&PanelData::from(vec!["HP:0001250"]))
            .expect("panel must load");
        data.loader
            .get(&PanelData::from(vec!["HP:0002133"]))
            .expect("panel must load");

        let (status, json) = call(
            data.clone(),
            TestRequest::post()
                .uri("/panels/invalidate")
                .set_json(serde_json::json!({"present-term": ["HP:0001250"]})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json, serde_json::json!({"cached": 1}));

        let (status, json) = call(data, TestRequest::post().uri("/panels/invalidate")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json, serde_json::json!({"cached": 0}));
    }

    #[actix_web::test]
    async fn invalidate_malformed_body_keeps_cache() {
        let data = data();
        data.loader
            .get(&PanelData::from(vec!["HP:0001250"]))
            .expect("panel must load");
        data.loader
            .get(&PanelData::from(vec!["HP:0002133"]))
            .expect("panel must load");

        for body in [
            r#"{"present-term": "HP:0001250"}"#,
            r#"{"present-term": ["HP:0001250"]"#,
            r#"{"present-terms": ["HP:0001250"]}"#,
            "[]",
        ] {
            let (status, _) = call(
                data.clone(),
                TestRequest::post()
                    .uri("/panels/invalidate")
                    .insert_header(("content-type", "application/json"))
                    .set_payload(body),
            )
            .await;

            assert_eq!(status, StatusCode::BAD_REQUEST, "{}", body);
            assert_eq!(data.loader.size(), 2, "{}", body);
        }
    }

    #[traced_test]
    #[test]
    fn load_panel_logs_missing_terms() -> Result<(), anyhow::Error> {
        let data = data();

        assert!(load_panel(&data, &PanelData::default())
            .map_err(|e| anyhow::anyhow!("{}", e))?
            .is_none());
        assert!(logs_contain("No content provided."));

        Ok(())
    }

    #[traced_test]
    #[test]
    fn load_panel_logs_empty_panel() -> Result<(), anyhow::Error> {
        let data = data();

        assert!(load_panel(&data, &PanelData::from(vec!["HP:0000118"]))
            .map_err(|e| anyhow::anyhow!("{}", e))?
            .is_none());
        assert!(logs_contain("No content associated with"));
        assert_eq!(data.loader.size(), 0);

        Ok(())
    }
}
