//! List resolvable titles.

use super::Session;
use anyhow::Result;
use serde_json::json;

pub fn list_titles(session: &Session, json: bool) -> Result<()> {
    let titles = session.store.titles();

    if json {
        let entries: Vec<_> = titles
            .iter()
            .map(|(title, origin)| {
                json!({
                    "title": title,
                    "origin": origin.to_string(),
                    "shadowed": session.store.is_shadowed(title.as_str()),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    for (title, origin) in &titles {
        println!("{}\t{}", title, origin);
    }
    Ok(())
}
