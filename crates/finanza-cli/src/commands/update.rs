use finanza_core::TableName;

use crate::commands::common::{normalize_record_id, open_session, parse_fields, SessionOptions};
use crate::error::CliError;

pub async fn run_update(
    table: TableName,
    id: &str,
    assignments: &[String],
    data: Option<&str>,
    options: &SessionOptions,
) -> Result<(), CliError> {
    let id = normalize_record_id(id)?;
    let fields = parse_fields(assignments, data)?;
    let session = open_session(options).await?;

    let outcome = session.data().update(table, &id, fields).await;
    if !outcome.success {
        return Err(CliError::Operation(outcome.message));
    }
    println!("{}: {}", id, outcome.message);
    Ok(())
}
