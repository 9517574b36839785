use crate::core::config::AppConfig;
use crate::core::models::{format_cents, Item, ResultsSnapshot};
use crate::core::store::{ConfigStore, JsonFileStore};
use anyhow::Result;
use serde::Serialize;
use std::sync::Arc;

#[derive(Serialize)]
struct StatusOutput {
    #[serde(skip_serializing_if = "Option::is_none")]
    checked: Option<String>,
    count: usize,
    studies: Vec<StudyStatus>,
}

#[derive(Serialize)]
struct StudyStatus {
    id: String,
    name: String,
    researcher: String,
    reward: String,
    average_reward_per_hour: String,
    places_remaining: i64,
}

pub async fn run(json: bool) -> Result<()> {
    let config = AppConfig::load()?;
    let store = ConfigStore::new(Arc::new(JsonFileStore::new(config.storage_path()?)));
    let snapshot = store.snapshot().await?;

    let output = to_output(snapshot);
    if json {
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        print_text_output(&output);
    }

    Ok(())
}

fn to_output(snapshot: ResultsSnapshot) -> StatusOutput {
    StatusOutput {
        checked: snapshot.checked,
        count: snapshot.studies.len(),
        studies: snapshot.studies.iter().map(study_status).collect(),
    }
}

fn study_status(item: &Item) -> StudyStatus {
    StudyStatus {
        id: item.id.clone(),
        name: item.name.clone(),
        researcher: item.researcher_name().to_string(),
        reward: format_cents(item.reward),
        average_reward_per_hour: format_cents(item.average_reward_per_hour),
        places_remaining: item.remaining_places(),
    }
}

fn print_text_output(output: &StatusOutput) {
    match &output.checked {
        Some(checked) => println!("Last checked: {}", checked),
        None => println!("Not checked yet"),
    }

    if output.studies.is_empty() {
        println!("No studies available");
        return;
    }

    for study in &output.studies {
        println!();
        println!("{}", study.name);
        println!("  Hosted by {}", study.researcher);
        println!(
            "  Reward {} | Avg. {}/h",
            study.reward, study.average_reward_per_hour
        );
        println!("  Places {}", study.places_remaining);
    }
}
