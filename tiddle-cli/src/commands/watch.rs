//! Keep a rendered record up to date while a clock record ticks.
//!
//! Every tick writes the clock record and flushes the store. A store
//! listener refreshes the render tree with the flushed batch and prints the
//! new text whenever a refresh re-executed anything.

use super::Session;
use anyhow::Result;
use chrono::Local;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tiddle_core::{ChangeMap, RecordingSink};
use tiddle_types::Tiddler;

pub struct WatchOptions {
    pub interval_ms: Option<u64>,
    pub ticks: Option<u64>,
}

pub async fn watch_record(session: &Session, title: Option<&str>, opts: WatchOptions) -> Result<()> {
    let store = session.store.clone();
    let title = session.title_or_root(title).to_string();
    let clock_title = session.config.watch.clock_title.clone();
    let interval_ms = opts.interval_ms.unwrap_or(session.config.watch.interval_ms).max(1);

    let tree = Arc::new(Mutex::new(store.render_tiddler(&title)));
    let sink = Arc::new(Mutex::new(RecordingSink::new()));
    {
        let tree = tree.lock();
        tree.mount(&mut *sink.lock());
        println!("{}", tree.render_text());
    }

    let listener = {
        let tree = tree.clone();
        let sink = sink.clone();
        store.add_event_listener("", move |changes: &ChangeMap| {
            let mut tree = tree.lock();
            let mut sink = sink.lock();
            let report = tree.refresh(changes, &mut *sink);
            let events = sink.take();
            tracing::debug!(
                reexecuted = report.reexecuted,
                forwarded = report.forwarded,
                sink_events = events.len(),
                "refreshed after store change"
            );
            if !report.is_noop() {
                println!("{}", tree.render_text());
            }
            Ok(())
        })
    };

    let mut interval = tokio::time::interval(Duration::from_millis(interval_ms));
    interval.tick().await;

    let mut count = 0u64;
    loop {
        if opts.ticks.is_some_and(|limit| count >= limit) {
            break;
        }
        tokio::select! {
            _ = interval.tick() => {}
            _ = tokio::signal::ctrl_c() => break,
        }

        store.add(Tiddler::new(
            clock_title.as_str(),
            format!("The time was recently {}", Local::now().format("%H:%M:%S%.3f")),
        ));
        store.flush_events();
        count += 1;
    }

    store.remove_event_listener(listener);
    tracing::info!(ticks = count, "{}", tree.lock().metrics().snapshot());
    Ok(())
}
