use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct StartQueryExecutionRequest<'a> {
    pub query_string: &'a str,
    pub result_configuration: ResultConfiguration<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResultConfiguration<'a> {
    pub output_location: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StartQueryExecutionResponse {
    pub query_execution_id: String,
}

/// Body shared by `GetQueryExecution` and `StopQueryExecution`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct QueryExecutionIdRequest<'a> {
    pub query_execution_id: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GetQueryExecutionResponse {
    pub query_execution: QueryExecution,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct QueryExecution {
    pub status: QueryExecutionStatus,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct QueryExecutionStatus {
    pub state: String,
    #[serde(default)]
    pub state_change_reason: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct GetQueryResultsRequest<'a> {
    pub query_execution_id: &'a str,
    pub max_results: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_token: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GetQueryResultsResponse {
    #[serde(default)]
    pub result_set: ResultSet,
    #[serde(default)]
    pub next_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResultSet {
    #[serde(default)]
    pub rows: Vec<ResultRow>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResultRow {
    #[serde(default)]
    pub data: Vec<Datum>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Datum {
    #[serde(default)]
    pub var_char_value: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StopQueryExecutionResponse {}

#[derive(Debug, Deserialize)]
pub struct ErrorDocument {
    #[serde(rename = "__type", default)]
    pub kind: Option<String>,
    #[serde(default, alias = "Message")]
    pub message: Option<String>,
}
