use finanza_core::TableName;

use crate::commands::common::{normalize_record_id, open_session, SessionOptions};
use crate::error::CliError;

pub async fn run_delete(table: TableName, id: &str, options: &SessionOptions) -> Result<(), CliError> {
    let id = normalize_record_id(id)?;
    let session = open_session(options).await?;

    let outcome = session.data().delete(table, &id).await;
    if !outcome.success {
        return Err(CliError::Operation(outcome.message));
    }
    println!("{}: {}", id, outcome.message);
    Ok(())
}
