//! Card Organizer demo
//!
//! Loads a sample hiring board from the in-memory remote, drags a few
//! cards around and prints the result.

use std::path::PathBuf;
use std::sync::Arc;

use card_organizer::{
    Board, BoardConfig, BoardEvent, BoardKey, CardRenderer, ColumnId, DomainResult, DragEvent, InMemoryRemote, Item, SlotId,
};
use tracing::{info, warn};

struct PlainText;

impl CardRenderer for PlainText {
    type Visual = String;

    fn render_card(&self, item: &Item) -> String {
        let name = item.payload.get("name").and_then(|v| v.as_str()).unwrap_or("?");
        format!("  [{}] {} @{}", item.id, name, item.position)
    }
}

fn sample_items() -> Vec<Item> {
    vec![
        Item::new(1, "new", 16384).with_field("name", "Ada Lovelace"),
        Item::new(2, "new", 32768).with_field("name", "Alan Turing"),
        Item::new(3, "new", 49152).with_field("name", "Grace Hopper"),
        Item::new(4, "rejected", 65536).with_field("name", "Edsger Dijkstra"),
    ]
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let log_dir = std::env::temp_dir().join("card-organizer");
    if let Err(e) = rolling_logger::init_logger(log_dir, "card-organizer") {
        eprintln!("Logger disabled: {}", e);
    }

    if let Err(e) = run().await {
        let _ = rolling_logger::error(&format!("Demo failed: {}", e));
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> DomainResult<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => BoardConfig::load(&PathBuf::from(path))?,
        None => BoardConfig::default(),
    };

    let key = BoardKey::from("job-1");
    let remote = Arc::new(InMemoryRemote::new());
    remote.seed(&key, sample_items()).await;

    let mut board = Board::load(remote, key, config).await?;
    let mut events = board.subscribe();

    // Rejected candidate gets a second chance, between Ada and Alan
    board.handle_drag(DragEvent::start(SlotId::Item(4)));
    board.handle_drag(DragEvent::over(SlotId::Item(4), Some(SlotId::Item(2))));
    board.handle_drag(DragEvent::end(SlotId::Item(4), Some(SlotId::Item(4))));

    // Grace goes straight to interview
    let interview = SlotId::Placeholder(ColumnId::from("interview"));
    board.handle_drag(DragEvent::start(SlotId::Item(3)));
    board.handle_drag(DragEvent::over(SlotId::Item(3), Some(interview.clone())));
    board.handle_drag(DragEvent::end(SlotId::Item(3), Some(interview)));

    board.flush().await;

    while let Ok(event) = events.try_recv() {
        match &event {
            BoardEvent::MutationFailed { error } => warn!("{}", error),
            other => info!(event = ?other, "Board event"),
        }
    }

    for view in board.render(&PlainText) {
        println!("{}", view.label);
        for card in view.cards {
            println!("{}", card);
        }
    }
    Ok(())
}
