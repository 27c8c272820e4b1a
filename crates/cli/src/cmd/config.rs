use anyhow::Result;
use serde::Serialize;

use crate::output::{OutputFormat, print_json, print_stat};
use crate::settings;

#[derive(Debug, Serialize)]
struct ConfigEntry {
  name: String,
  description: String,
  default: String,
  value: Option<String>,
}

pub fn cmd_config(output: OutputFormat) -> Result<()> {
  let configuration = settings::load()?;

  let entries: Vec<ConfigEntry> = configuration
    .configurations()
    .iter()
    .map(|c| {
      let (value, set) = configuration.resolve(&c.name);
      ConfigEntry {
        name: c.name.clone(),
        description: c.description.clone(),
        default: c.default.clone(),
        value: set.then_some(value),
      }
    })
    .collect();

  if output.is_json() {
    print_json(&entries)?;
    return Ok(());
  }

  for entry in &entries {
    println!("{}", entry.name);
    print_stat("Description", &entry.description);
    print_stat("Default", if entry.default.is_empty() {
      "<none>"
    } else {
      entry.default.as_str()
    });
    if let Some(value) = &entry.value {
      print_stat("Value", value);
    }
  }

  Ok(())
}
