//! Test helpers: fixtures and a remote whose responses the test releases
//! one by one.

#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use card_organizer::{
    Board, BoardConfig, BoardKey, ColumnId, ColumnPage, DomainError, DomainResult, InMemoryRemote, Item, ItemId, Layout,
    Position, RemoteStore,
};
use tokio::sync::{mpsc, oneshot};

pub fn key() -> BoardKey {
    BoardKey::from("job-1")
}

/// Three candidates in "new", one in "rejected"
pub fn candidates() -> Vec<Item> {
    vec![
        Item::new(1, "new", 16384).with_field("name", "Ada"),
        Item::new(2, "new", 32768).with_field("name", "Alan"),
        Item::new(3, "new", 49152).with_field("name", "Grace"),
        Item::new(4, "rejected", 65536).with_field("name", "Edsger"),
    ]
}

pub fn ids(layout: &Layout, column: &str) -> Vec<ItemId> {
    layout.items(&ColumnId::from(column)).iter().map(|item| item.id).collect()
}

pub fn position(layout: &Layout, id: ItemId) -> Position {
    layout.get(id).expect("item on board").position
}

pub async fn setup_board(items: Vec<Item>) -> (Arc<InMemoryRemote>, Board<InMemoryRemote>) {
    let remote = Arc::new(InMemoryRemote::new());
    remote.seed(&key(), items).await;
    let board = Board::load(remote.clone(), key(), BoardConfig::default())
        .await
        .expect("Failed to load board");
    (remote, board)
}

// ========================
// Gated remote
// ========================

/// A mutation waiting for the test to answer it
pub struct MutationGate {
    pub item: Item,
    reply: oneshot::Sender<DomainResult<Item>>,
}

impl MutationGate {
    /// Echo the sent item back
    pub fn succeed(self) {
        let item = self.item.clone();
        let _ = self.reply.send(Ok(item));
    }

    pub fn succeed_with(self, item: Item) {
        let _ = self.reply.send(Ok(item));
    }

    pub fn fail(self, reason: &str) {
        let _ = self.reply.send(Err(DomainError::Remote(reason.to_string())));
    }
}

/// A page fetch waiting for the test to answer it
pub struct PageGate {
    pub column: ColumnId,
    pub after: Option<Position>,
    reply: oneshot::Sender<DomainResult<ColumnPage>>,
}

impl PageGate {
    pub fn respond(self, items: Vec<Item>, has_more: bool) {
        let _ = self.reply.send(Ok(ColumnPage { items, has_more }));
    }
}

pub struct GatedRemote {
    layout: Vec<Item>,
    mutations: mpsc::UnboundedSender<MutationGate>,
    pages: mpsc::UnboundedSender<PageGate>,
}

pub struct Gates {
    pub mutations: mpsc::UnboundedReceiver<MutationGate>,
    pub pages: mpsc::UnboundedReceiver<PageGate>,
}

impl Gates {
    pub async fn next_mutation(&mut self) -> MutationGate {
        self.mutations.recv().await.expect("mutation gate")
    }

    pub async fn next_page(&mut self) -> PageGate {
        self.pages.recv().await.expect("page gate")
    }
}

pub fn gated_remote(layout: Vec<Item>) -> (Arc<GatedRemote>, Gates) {
    let (mutations, mutations_rx) = mpsc::unbounded_channel();
    let (pages, pages_rx) = mpsc::unbounded_channel();
    let remote = Arc::new(GatedRemote { layout, mutations, pages });
    (
        remote,
        Gates {
            mutations: mutations_rx,
            pages: pages_rx,
        },
    )
}

pub async fn setup_gated_board(items: Vec<Item>, config: BoardConfig) -> (Board<GatedRemote>, Gates) {
    let (remote, gates) = gated_remote(items);
    let board = Board::load(remote, key(), config).await.expect("Failed to load board");
    (board, gates)
}

#[async_trait]
impl RemoteStore for GatedRemote {
    async fn fetch_layout(&self, _board: &BoardKey) -> DomainResult<Vec<Item>> {
        Ok(self.layout.clone())
    }

    async fn fetch_column_page(
        &self,
        _board: &BoardKey,
        column: &ColumnId,
        after: Option<Position>,
        _page_size: usize,
    ) -> DomainResult<ColumnPage> {
        let (reply, rx) = oneshot::channel();
        self.pages
            .send(PageGate {
                column: column.clone(),
                after,
                reply,
            })
            .map_err(|_| DomainError::Remote("test dropped the page channel".to_string()))?;
        rx.await
            .map_err(|_| DomainError::Remote("page never answered".to_string()))?
    }

    async fn mutate_item(&self, _board: &BoardKey, item: &Item) -> DomainResult<Item> {
        let (reply, rx) = oneshot::channel();
        self.mutations
            .send(MutationGate {
                item: item.clone(),
                reply,
            })
            .map_err(|_| DomainError::Remote("test dropped the mutation channel".to_string()))?;
        rx.await
            .map_err(|_| DomainError::Remote("mutation never answered".to_string()))?
    }
}
