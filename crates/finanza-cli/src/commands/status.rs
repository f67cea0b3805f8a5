use crate::commands::common::{format_sync_timestamp, open_session, SessionOptions};
use crate::error::CliError;

pub async fn run_status(as_json: bool, options: &SessionOptions) -> Result<(), CliError> {
    let session = open_session(options).await?;
    let status = session.status().await;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!("User:       {}", session.user_id());
    println!("State:      {}", status.state);
    println!(
        "Connection: {}",
        if status.is_online { "online" } else { "offline" }
    );
    println!(
        "Last sync:  {}",
        status
            .last_sync_time
            .as_ref()
            .map_or_else(|| "never".to_string(), format_sync_timestamp)
    );
    match session.store() {
        Some(store) => println!("Storage:    {}", store.backend_name()),
        None => println!("Storage:    unavailable (remote only)"),
    }
    Ok(())
}
