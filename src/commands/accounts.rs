//! Accounts command handlers: interactive provisioning and listing.

use std::collections::HashMap;

use anyhow::{Result, bail};
use hostfetch_core::{AccountError, Field, Prompter};
use inquire::{Password, PasswordDisplayMode, Text};
use serde_json::Value;
use tracing::info;

use super::Context;

const MASK: &str = "********";

/// Key fragments that are always hidden, whatever the provider declares.
const SECRET_HINTS: [&str; 4] = ["password", "token", "cookie", "secret"];

/// Terminal prompts; sensitive fields are masked while typing.
struct InquirePrompter;

impl Prompter for InquirePrompter {
    fn prompt(&self, fields: &[Field]) -> Result<HashMap<String, String>, AccountError> {
        let mut answers = HashMap::with_capacity(fields.len());
        for field in fields {
            let answer = if field.sensitive {
                Password::new(field.label)
                    .without_confirmation()
                    .with_display_mode(PasswordDisplayMode::Masked)
                    .prompt()
            } else {
                let mut text = Text::new(field.label);
                if let Some(default) = field.default.as_deref() {
                    text = text.with_default(default);
                }
                text.prompt()
            };
            let value = answer.map_err(|e| AccountError::Prompt {
                reason: e.to_string(),
            })?;
            answers.insert(field.key.to_string(), value);
        }
        Ok(answers)
    }
}

pub async fn run_accounts_add_command(context: Context, provider: &str) -> Result<()> {
    let Context {
        registry,
        mut accounts,
        accounts_path,
        ..
    } = context;
    if accounts_path.is_none() {
        bail!(AccountError::ConfigDirUnavailable);
    }

    let accountant = registry
        .get(provider)
        .and_then(|p| p.accountant())
        .ok_or_else(|| AccountError::UnknownProvider {
            provider: provider.to_string(),
        })?;
    let record = accountant.new_account(&InquirePrompter).await?;
    let id = record.id.clone();
    accounts.add(record);
    accounts.save()?;

    info!(provider, account = %id, path = %accounts.path().display(), "Account stored");
    println!("added\t{provider}\t{id}");
    Ok(())
}

pub fn run_accounts_list_command(context: &Context) {
    let mut any = false;
    for (provider, records) in context.accounts.providers() {
        let declared: Vec<&str> = context
            .registry
            .get(provider)
            .and_then(|p| p.accountant())
            .map(|accountant| {
                accountant
                    .fields()
                    .into_iter()
                    .filter(|field| field.sensitive)
                    .map(|field| field.key)
                    .collect()
            })
            .unwrap_or_default();
        for record in records {
            any = true;
            println!("{provider}\t{}", redact(record, &declared));
        }
    }
    if !any {
        let location = context
            .accounts_path
            .as_ref()
            .map_or_else(|| "<no config dir>".to_string(), |p| p.display().to_string());
        println!("No accounts stored in {location}");
    }
}

/// Copy of `record` with secret values replaced by a mask.
fn redact(record: &Value, sensitive: &[&str]) -> Value {
    let Value::Object(map) = record else {
        return record.clone();
    };
    let redacted = map
        .iter()
        .map(|(key, value)| {
            let lowered = key.to_ascii_lowercase();
            let secret = sensitive.contains(&key.as_str())
                || SECRET_HINTS.iter().any(|hint| lowered.contains(hint));
            let value = if secret && !value.is_null() {
                Value::String(MASK.to_string())
            } else {
                value.clone()
            };
            (key.clone(), value)
        })
        .collect();
    Value::Object(redacted)
}
