use std::path::PathBuf;
use std::time::Duration;

use httpmock::prelude::*;
use serde_json::{json, Value};

use semtab_backend_client::{AuthCredentials, BackendClient, ClientError, ServiceKind};
use semtab_enrich::{EnrichmentPipeline, ReconcileStep, ServiceRegistry, TableStore};
use semtab_model::ColumnStatus;

fn fixture(name: &str) -> Value {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(name);
    let text = std::fs::read_to_string(&path).unwrap_or_else(|e| panic!("cannot read {}: {e}", path.display()));
    serde_json::from_str(&text).unwrap()
}

fn client(server: &MockServer) -> BackendClient {
    let creds = AuthCredentials::new("tok".into(), server.url("/api"));
    BackendClient::new(creds, Duration::from_secs(5)).unwrap()
}

#[test]
fn get_table_sends_bearer_and_parses() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET)
            .path("/api/dataset/4/table/21")
            .header("Authorization", "Bearer tok");
        then.status(200)
            .header("content-type", "application/json")
            .json_body(fixture("table.get.json"));
    });

    let table = client(&server).get_table("4", "21").unwrap();

    mock.assert();
    assert_eq!(table.meta.id, "21");
    assert_eq!(table.meta.id_dataset, "4");
    assert_eq!(table.row_ids().collect::<Vec<_>>(), ["r1", "r2"]);
    assert_eq!(table.get_cell("r2", "City").unwrap().unwrap().label, "Turin");
}

#[test]
fn missing_table_is_http_error() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/api/dataset/4/table/99");
        then.status(404)
            .json_body(json!({"message": "table not found"}));
    });

    let err = client(&server).get_table("4", "99").unwrap_err();
    assert_eq!(err, ClientError::Http(404, "table not found".into()));
}

#[test]
fn store_errors_keep_status() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/api/dataset/4/table/21");
        then.status(500).body("<html>boom</html>");
    });

    let err = client(&server).get_raw_table("4", "21").unwrap_err();
    assert_eq!(err.status, Some(500));
}

#[test]
fn unreachable_backend_is_network_error() {
    let creds = AuthCredentials::new("tok".into(), "http://127.0.0.1:1/api".into());
    let client = BackendClient::new(creds, Duration::from_secs(2)).unwrap();
    match client.get_table("4", "21").unwrap_err() {
        ClientError::Network(_) => {}
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn service_catalogue_skips_malformed_entries() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/api/reconciliators/list");
        then.status(200).json_body(json!([
            {"id": "geonames", "relativeUrl": "/geonames", "name": "GeoNames"},
            {"id": "broken", "name": "No url"},
            {"id": "geocodingHere", "relativeUrl": "/here/geocoding", "name": "HERE"}
        ]));
    });
    server.mock(|when, then| {
        when.method(GET).path("/api/extenders/list");
        then.status(200).json_body(json!({"unexpected": true}));
    });

    let client = client(&server);
    let recon = client.list_reconciliators().unwrap();
    assert_eq!(recon.iter().map(|s| s.id.as_str()).collect::<Vec<_>>(), ["geonames", "geocodingHere"]);
    assert_eq!(recon[1].relative_url, "/here/geocoding");
    assert!(client.list_extenders().unwrap().is_empty());
}

#[test]
fn service_parameters_split_mandatory_and_optional() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET)
            .path("/api/extenders/list")
            .header("Authorization", "Bearer tok");
        then.status(200).json_body(json!([
            {"id": "reconciledColumnExt", "relativeUrl": "/reconciled", "name": "Reconciled column"},
            {
                "id": "meteoPropertiesOpenMeteo",
                "relativeUrl": "/meteo",
                "name": "Open-Meteo",
                "formParams": [
                    {
                        "id": "weatherParams",
                        "inputType": "checkbox",
                        "label": "Weather parameters",
                        "description": "Daily variables to fetch",
                        "rules": ["required"],
                        "options": [
                            {"id": "temperature_max", "label": "Max temperature"},
                            {"id": "precipitation_sum", "label": "Precipitation"}
                        ]
                    },
                    {"id": "dates", "inputType": "selectColumns", "rules": ["required"]},
                    {"id": "decimalFormat", "inputType": "checkbox", "infoText": "Comma separator", "rules": []}
                ]
            }
        ]));
    });

    let client = client(&server);
    let params = client
        .service_parameters(ServiceKind::Extender, "meteoPropertiesOpenMeteo")
        .unwrap();
    mock.assert();

    let mandatory: Vec<_> = params.mandatory.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(mandatory, ["weatherParams", "dates"]);
    assert_eq!(params.optional.len(), 1);
    assert_eq!(params.optional[0].info_text, "Comma separator");
    let weather = params.get("weatherParams").unwrap();
    assert_eq!(weather.input_type, "checkbox");
    assert_eq!(weather.description, "Daily variables to fetch");
    assert_eq!(weather.option_ids().collect::<Vec<_>>(), ["temperature_max", "precipitation_sum"]);

    let bare = client
        .service_parameters(ServiceKind::Extender, "reconciledColumnExt")
        .unwrap();
    assert!(bare.mandatory.is_empty() && bare.optional.is_empty());

    let err = client.service_parameters(ServiceKind::Extender, "nope").unwrap_err();
    assert_eq!(err, ClientError::UnknownService("nope".into()));
}

#[test]
fn pipeline_round_trip_through_backend() {
    let server = MockServer::start();
    let get = server.mock(|when, then| {
        when.method(GET).path("/api/dataset/4/table/21");
        then.status(200).json_body(fixture("table.get.json"));
    });
    let reconcile = server.mock(|when, then| {
        when.method(POST)
            .path("/api/reconciliators/geonames")
            .header("Authorization", "Bearer tok");
        then.status(200).json_body(json!([
            {"id": "City", "metadata": [{"id": "geo:6252001", "name": "Italian city", "score": 0, "match": true}]},
            {"id": "r1$City", "metadata": [{"id": "geo:1", "name": "Rome", "score": 0.9, "match": true}]},
            {"id": "r2$City", "metadata": [{"id": "geo:2", "name": "Turin", "score": 0.4, "match": false}]}
        ]));
    });
    let put = server.mock(|when, then| {
        when.method(PUT).path("/api/dataset/4/table/21");
        then.status(200).json_body(json!({"ok": true}));
    });

    let client = client(&server);
    let services = client.services();
    let registry = ServiceRegistry::builtin();
    let pipeline = EnrichmentPipeline::new(&registry, &client, &services, &services);

    let report = pipeline
        .run(
            "4",
            "21",
            Some(&ReconcileStep {
                column: "City".into(),
                reconciliator_id: "geonames".into(),
                secondary_columns: Vec::new(),
            }),
            &[],
        )
        .unwrap();

    get.assert();
    reconcile.assert();
    put.assert();
    assert_eq!(report.reconcile.unwrap().annotated_cells, 2);
    assert_eq!(report.document.table_instance.n_cells_reconciliated, 2);
    assert_eq!(report.document.table_instance.max_meta_score, 0.9);
    let city = report.document.columns.by_id.get("City").unwrap();
    assert_eq!(city.status, ColumnStatus::Reconciliated);
}

#[test]
fn service_error_surfaces_as_remote_service() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/api/dataset/4/table/21");
        then.status(200).json_body(fixture("table.get.json"));
    });
    server.mock(|when, then| {
        when.method(POST).path("/api/reconciliators/geonames");
        then.status(502).json_body(json!({"error": "upstream timeout"}));
    });
    let put = server.mock(|when, then| {
        when.method(PUT).path("/api/dataset/4/table/21");
        then.status(200);
    });

    let client = client(&server);
    let services = client.services();
    let registry = ServiceRegistry::builtin();
    let pipeline = EnrichmentPipeline::new(&registry, &client, &services, &services);

    let err = pipeline
        .run(
            "4",
            "21",
            Some(&ReconcileStep {
                column: "City".into(),
                reconciliator_id: "geonames".into(),
                secondary_columns: Vec::new(),
            }),
            &[],
        )
        .unwrap_err();

    assert_eq!(err.category(), "remote_service");
    assert!(err.to_string().contains("upstream timeout"), "message: {err}");
    put.assert_hits(0);
}
