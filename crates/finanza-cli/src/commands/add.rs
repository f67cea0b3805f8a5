use finanza_core::TableName;

use crate::commands::common::{open_session, parse_fields, record_to_list_item, SessionOptions};
use crate::error::CliError;

pub async fn run_add(
    table: TableName,
    assignments: &[String],
    data: Option<&str>,
    as_json: bool,
    options: &SessionOptions,
) -> Result<(), CliError> {
    let fields = parse_fields(assignments, data)?;
    let session = open_session(options).await?;
    let outcome = session.data().write(table, fields).await;
    let Some(record) = outcome.record.filter(|_| outcome.success) else {
        return Err(CliError::Operation(outcome.message));
    };

    if as_json {
        println!(
            "{}",
            serde_json::to_string_pretty(&record_to_list_item(&record))?
        );
    } else {
        println!("{}", record.id);
        eprintln!("{}", outcome.message);
    }
    Ok(())
}
