use std::path::PathBuf;

use finanza_core::util::normalize_text_option;
use serde::Serialize;

use crate::cli::ConfigCommands;
use crate::commands::common::{resolve_store_backend, SessionOptions};
use crate::config_profiles::ProfileFile;
use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct ProfileView {
    pub profile: String,
    pub supabase_url: Option<String>,
    pub supabase_anon_key_set: bool,
    pub user_id: Option<String>,
    pub storage: String,
}

pub fn run_config(command: ConfigCommands, options: &SessionOptions) -> Result<(), CliError> {
    match command {
        ConfigCommands::Init {
            profile,
            supabase_url,
            supabase_anon_key,
            user_id,
            no_activate,
        } => run_config_init(
            profile.as_deref().or(options.profile.as_deref()),
            ProfileValues {
                supabase_url,
                supabase_anon_key,
                user_id,
                db_path: options.db_path.clone(),
            },
            no_activate,
        ),
        ConfigCommands::Show { json } => run_config_show(options.profile.as_deref(), json),
    }
}

/// Values passed to `config init`; missing ones keep the stored setting
#[derive(Debug, Default)]
pub struct ProfileValues {
    pub supabase_url: Option<String>,
    pub supabase_anon_key: Option<String>,
    pub user_id: Option<String>,
    pub db_path: Option<PathBuf>,
}

pub fn run_config_init(
    profile_name: Option<&str>,
    values: ProfileValues,
    no_activate: bool,
) -> Result<(), CliError> {
    let mut file = ProfileFile::load().map_err(CliError::Config)?;
    let profile_name = apply_profile_values(&mut file, profile_name, values, no_activate)?;

    let path = file.save().map_err(CliError::Config)?;
    println!("Profile '{profile_name}' saved to {}", path.display());

    let missing_fields = file.effective(&profile_name).missing_fields();
    if missing_fields.is_empty() {
        println!("Profile '{profile_name}' is ready. Run `finanza sync` to fetch your data.");
    } else {
        println!(
            "Profile '{profile_name}' is missing: {}",
            missing_fields.join(", ")
        );
    }

    Ok(())
}

/// Merge `values` into the named profile and return the resolved name.
pub fn apply_profile_values(
    file: &mut ProfileFile,
    profile_name: Option<&str>,
    values: ProfileValues,
    no_activate: bool,
) -> Result<String, CliError> {
    let profile_name = file.resolve_name(profile_name);

    let mut updated = file.profiles.get(&profile_name).cloned().unwrap_or_default();
    if let Some(value) = normalize_text_option(values.supabase_url) {
        updated.supabase_url = Some(value.trim_end_matches('/').to_string());
    }
    if let Some(value) = normalize_text_option(values.supabase_anon_key) {
        updated.supabase_anon_key = Some(value);
    }
    if let Some(value) = normalize_text_option(values.user_id) {
        updated.user_id = Some(value);
    }
    if let Some(path) = values.db_path {
        updated.db_path = Some(path);
    }
    updated.validate().map_err(CliError::Config)?;

    *file.entry(&profile_name) = updated;
    if !no_activate {
        file.active_profile = Some(profile_name.clone());
    }
    Ok(profile_name)
}

pub fn run_config_show(profile_name: Option<&str>, as_json: bool) -> Result<(), CliError> {
    let file = ProfileFile::load().map_err(CliError::Config)?;
    let profile_name = file.resolve_name(profile_name);
    let profile = file.effective(&profile_name);
    let storage = match resolve_store_backend(None, profile.db_path.clone()) {
        finanza_core::StoreBackend::Sqlite(path) => path.display().to_string(),
        finanza_core::StoreBackend::Memory => "in-memory".to_string(),
    };
    let view = ProfileView {
        profile: profile_name,
        supabase_url: profile.supabase_url,
        supabase_anon_key_set: profile.supabase_anon_key.is_some(),
        user_id: profile.user_id,
        storage,
    };

    if as_json {
        println!("{}", serde_json::to_string_pretty(&view)?);
        return Ok(());
    }

    println!("Profile:      {}", view.profile);
    println!(
        "Supabase URL: {}",
        view.supabase_url.as_deref().unwrap_or("(not set)")
    );
    println!(
        "Anon key:     {}",
        if view.supabase_anon_key_set { "set" } else { "(not set)" }
    );
    println!(
        "User:         {}",
        view.user_id.as_deref().unwrap_or("(not set)")
    );
    println!("Storage:      {}", view.storage);
    Ok(())
}
