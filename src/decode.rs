use crate::{
    wire, Cursor, ExecutionState, ExecutionStatus, PageData, QueryHandle, Row, ServiceError,
};

pub(crate) fn decode_handle(
    response: wire::StartQueryExecutionResponse,
) -> Result<QueryHandle, ServiceError> {
    let id = response.query_execution_id.trim();
    if id.is_empty() {
        return Err(ServiceError::Decode(
            "empty QueryExecutionId in StartQueryExecution response".to_owned(),
        ));
    }
    Ok(QueryHandle::new(id))
}

pub(crate) fn decode_status(
    response: wire::GetQueryExecutionResponse,
) -> Result<ExecutionStatus, ServiceError> {
    let status = response.query_execution.status;
    let state = ExecutionState::parse(&status.state).ok_or_else(|| {
        ServiceError::Decode(format!("unknown query execution state '{}'", status.state))
    })?;

    let reason = match state {
        ExecutionState::Failed | ExecutionState::Cancelled => status.state_change_reason,
        _ => None,
    };

    Ok(ExecutionStatus { state, reason })
}

pub(crate) fn decode_page(response: wire::GetQueryResultsResponse) -> PageData {
    let rows = response
        .result_set
        .rows
        .into_iter()
        .map(decode_row)
        .collect();

    let next_cursor = response
        .next_token
        .filter(|token| !token.is_empty())
        .map(Cursor::new);

    PageData { rows, next_cursor }
}

fn decode_row(row: wire::ResultRow) -> Row {
    row.data
        .into_iter()
        .map(|datum| datum.var_char_value.unwrap_or_default())
        .collect()
}

/// Maps a non-success response to the most specific error available.
pub(crate) fn decode_service_error(status: u16, body: String) -> ServiceError {
    let document = match serde_json::from_str::<wire::ErrorDocument>(&body) {
        Ok(document) => document,
        Err(_) => return ServiceError::Http { status, body },
    };

    match document.kind {
        Some(kind) => {
            let code = kind.rsplit('#').next().unwrap_or(&kind).to_owned();
            ServiceError::Api {
                status,
                code,
                message: document.message.unwrap_or_default(),
            }
        }
        None => ServiceError::Http { status, body },
    }
}
