//! Render a record once.

use super::Session;
use crate::RenderFormat;
use anyhow::{Context, Result};
use tiddle_core::NullSink;

pub fn render_record(session: &Session, title: Option<&str>, format: RenderFormat, metrics: bool) -> Result<()> {
    let title = session.title_or_root(title);
    if !session.store.exists(title) {
        tracing::warn!(title, "record does not exist, rendering it as missing");
    }

    let tree = session.store.render_tiddler(title);
    tree.mount(&mut NullSink);

    match format {
        RenderFormat::Text => println!("{}", tree.render_text()),
        RenderFormat::Json => println!("{}", tree.to_json().context("Failed to serialize render tree")?),
    }

    if metrics {
        eprintln!("{}", tree.metrics().snapshot());
    }

    Ok(())
}
