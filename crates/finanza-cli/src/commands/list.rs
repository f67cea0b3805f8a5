use finanza_core::{ReadQuery, TableName};

use crate::commands::common::{
    format_record_lines, open_session, parse_month_arg, record_to_list_item, RecordListItem,
    SessionOptions,
};
use crate::error::CliError;

pub async fn run_list(
    table: TableName,
    month: Option<&str>,
    limit: usize,
    as_json: bool,
    options: &SessionOptions,
) -> Result<(), CliError> {
    let month = parse_month_arg(month)?;
    let session = open_session(options).await?;
    let query = month.map_or_else(ReadQuery::all, ReadQuery::month);
    let mut records = session.data().read(table, &query).await;
    records.truncate(limit);

    if as_json {
        let json_items = records
            .iter()
            .map(record_to_list_item)
            .collect::<Vec<RecordListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
    } else if records.is_empty() {
        println!("No records in {table}.");
    } else {
        for line in format_record_lines(&records) {
            println!("{line}");
        }
    }

    Ok(())
}
