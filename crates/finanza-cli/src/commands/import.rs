use std::path::Path;

use finanza_core::backup::import_json;

use crate::commands::common::{open_session, SessionOptions};
use crate::error::CliError;

pub async fn run_import(path: &Path, as_json: bool, options: &SessionOptions) -> Result<(), CliError> {
    let payload = std::fs::read_to_string(path)?;
    let session = open_session(options).await?;
    let store = session.store().ok_or_else(|| {
        CliError::Operation("Local store unavailable; cannot import".to_string())
    })?;
    let report = import_json(store.as_ref(), session.user_id(), &payload).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!(
        "Imported {} record(s), {} failed. Run `finanza sync` to upload them.",
        report.imported, report.failed
    );
    for error in &report.errors {
        eprintln!("  {error}");
    }
    Ok(())
}
