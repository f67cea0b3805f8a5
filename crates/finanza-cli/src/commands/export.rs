use std::path::Path;

use finanza_core::backup::export_json;

use crate::commands::common::{open_session, SessionOptions};
use crate::error::CliError;

pub async fn run_export(output_path: Option<&Path>, options: &SessionOptions) -> Result<(), CliError> {
    let session = open_session(options).await?;
    let store = session.store().ok_or_else(|| {
        CliError::Operation("Local store unavailable; nothing to export".to_string())
    })?;
    let rendered = export_json(store.as_ref(), session.user_id()).await?;

    if let Some(path) = output_path {
        std::fs::write(path, rendered)?;
        println!("{}", path.display());
    } else {
        print!("{rendered}");
    }

    Ok(())
}
