use super::*;
use crate::screens::Screen;
use async_trait::async_trait;
use catalog::{CatalogError, RecipeCatalog};
use shared::domain::{
    Category, ChatId, Ingredient, RecipeId, RecipeRecord, RecipeSummary, UserId,
};
use std::{collections::VecDeque, sync::Mutex};
use storage::FavoritesStore;
use tokio::sync::oneshot;

struct EmptyCatalog;

#[async_trait]
impl RecipeCatalog for EmptyCatalog {
    async fn fetch_by_id(&self, _id: &RecipeId) -> Result<RecipeRecord, CatalogError> {
        Err(CatalogError::NotFound)
    }

    async fn fetch_random(&self) -> Result<RecipeRecord, CatalogError> {
        Err(CatalogError::NotFound)
    }

    async fn search(&self, _query: &str) -> Result<Vec<RecipeRecord>, CatalogError> {
        Err(CatalogError::NotFound)
    }

    async fn list_categories(&self) -> Result<Vec<Category>, CatalogError> {
        Err(CatalogError::NotFound)
    }

    async fn list_by_category(&self, _category: &str) -> Result<Vec<RecipeSummary>, CatalogError> {
        Err(CatalogError::NotFound)
    }
}

/// Answers every lookup with the same recipe after `delay`.
struct SlowCatalog {
    delay: Duration,
}

#[async_trait]
impl RecipeCatalog for SlowCatalog {
    async fn fetch_by_id(&self, id: &RecipeId) -> Result<RecipeRecord, CatalogError> {
        tokio::time::sleep(self.delay).await;
        Ok(RecipeRecord {
            id: id.clone(),
            name: "Teriyaki Chicken Casserole".into(),
            category: "Chicken".into(),
            area: "Japanese".into(),
            image: None,
            ingredients: vec![Ingredient {
                name: "soy sauce".into(),
                measure: "3/4 cup".into(),
            }],
            instructions: "Preheat oven to 350° F.".into(),
            video: None,
        })
    }

    async fn fetch_random(&self) -> Result<RecipeRecord, CatalogError> {
        Err(CatalogError::NotFound)
    }

    async fn search(&self, _query: &str) -> Result<Vec<RecipeRecord>, CatalogError> {
        Err(CatalogError::NotFound)
    }

    async fn list_categories(&self) -> Result<Vec<Category>, CatalogError> {
        Err(CatalogError::NotFound)
    }

    async fn list_by_category(&self, _category: &str) -> Result<Vec<RecipeSummary>, CatalogError> {
        Err(CatalogError::NotFound)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Sent {
    Screen(ChatId, String),
    Notice(ChatId, String),
    Ack(ChatId),
}

#[derive(Default)]
struct FakeTransport {
    batches: Mutex<VecDeque<anyhow::Result<Vec<InboundEvent>>>>,
    sent: Mutex<Vec<Sent>>,
}

impl FakeTransport {
    fn queue(&self, batch: anyhow::Result<Vec<InboundEvent>>) {
        self.batches.lock().expect("batches").push_back(batch);
    }

    fn sent(&self) -> Vec<Sent> {
        self.sent.lock().expect("sent").clone()
    }
}

#[async_trait]
impl ChatTransport for FakeTransport {
    async fn receive(&self) -> anyhow::Result<Vec<InboundEvent>> {
        let next = self.batches.lock().expect("batches").pop_front();
        match next {
            Some(batch) => batch,
            None => {
                tokio::time::sleep(Duration::from_millis(20)).await;
                Ok(Vec::new())
            }
        }
    }

    async fn send_screen(&self, target: &ReplyTarget, screen: &Screen) -> anyhow::Result<()> {
        self.sent
            .lock()
            .expect("sent")
            .push(Sent::Screen(target.chat_id, screen.body().to_string()));
        Ok(())
    }

    async fn send_notice(&self, target: &ReplyTarget, notice: &str) -> anyhow::Result<()> {
        self.sent
            .lock()
            .expect("sent")
            .push(Sent::Notice(target.chat_id, notice.to_string()));
        Ok(())
    }

    async fn acknowledge(&self, target: &ReplyTarget) -> anyhow::Result<()> {
        self.sent.lock().expect("sent").push(Sent::Ack(target.chat_id));
        Ok(())
    }
}

async fn router() -> Arc<ActionRouter> {
    router_over(Arc::new(EmptyCatalog)).await
}

async fn router_over(catalog: Arc<dyn RecipeCatalog>) -> Arc<ActionRouter> {
    let store = FavoritesStore::new("sqlite::memory:").await.expect("store");
    Arc::new(ActionRouter::new(store, catalog))
}

fn button_press(chat: i64, token: &str) -> InboundEvent {
    InboundEvent::Action {
        target: ReplyTarget {
            chat_id: ChatId(chat),
            message_id: Some(10),
            callback_id: Some(format!("cb-{chat}")),
        },
        user_id: UserId(chat),
        token: token.to_string(),
    }
}

#[tokio::test]
async fn button_press_without_notice_is_acknowledged() {
    let router = router().await;
    let transport = FakeTransport::default();
    let event = button_press(1, "open-main-menu");

    let reply = handle_event(&router, &event).await;
    deliver(&transport, event.target(), &reply).await.expect("deliver");

    let sent = transport.sent();
    assert_eq!(sent[0], Sent::Ack(ChatId(1)));
    assert!(matches!(&sent[1], Sent::Screen(ChatId(1), body) if body.contains("Main menu")));
}

#[tokio::test]
async fn text_message_notice_is_not_acknowledged() {
    let router = router().await;
    let transport = FakeTransport::default();
    let event = InboundEvent::Text {
        target: ReplyTarget::chat(ChatId(5)),
        user_id: UserId(5),
        display_name: None,
        text: "hello".into(),
    };

    let reply = handle_event(&router, &event).await;
    deliver(&transport, event.target(), &reply).await.expect("deliver");

    let sent = transport.sent();
    assert_eq!(sent.len(), 1);
    assert!(matches!(&sent[0], Sent::Notice(ChatId(5), _)));
}

#[tokio::test]
async fn serve_resumes_polling_after_back_off() {
    // The store is opened before the clock is paused so its pool never sees
    // virtual time.
    let router = router().await;
    tokio::time::pause();

    let transport = Arc::new(FakeTransport::default());
    transport.queue(Ok(vec![button_press(1, "open-search-menu"), button_press(2, "bogus")]));
    transport.queue(Err(anyhow::anyhow!("network down")));
    transport.queue(Ok(vec![button_press(3, "open-main-menu")]));

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let started = tokio::time::Instant::now();
    let handle = tokio::spawn(serve(transport.clone(), router, async move {
        let _ = stop_rx.await;
    }));

    let mut polls = 0;
    while !transport.sent().contains(&Sent::Ack(ChatId(3))) {
        assert!(polls < 100, "polling never resumed after the error");
        tokio::time::sleep(Duration::from_millis(100)).await;
        polls += 1;
    }
    assert!(started.elapsed() >= POLL_BACKOFF);

    stop_tx.send(()).expect("stop");
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("serve stops")
        .expect("join");

    let sent = transport.sent();
    assert!(sent.contains(&Sent::Ack(ChatId(1))));
    assert!(sent
        .iter()
        .any(|s| matches!(s, Sent::Screen(ChatId(1), body) if body.contains("Recipe search"))));
    assert!(sent.contains(&Sent::Notice(
        ChatId(2),
        "❌ Invalid request. Please use the buttons.".into()
    )));
    assert!(sent
        .iter()
        .any(|s| matches!(s, Sent::Screen(ChatId(3), body) if body.contains("Main menu"))));
}

#[tokio::test]
async fn shutdown_waits_for_in_flight_replies() {
    let router = router_over(Arc::new(SlowCatalog {
        delay: Duration::from_millis(300),
    }))
    .await;
    let transport = Arc::new(FakeTransport::default());
    transport.queue(Ok(vec![button_press(1, "view-recipe:52772")]));

    tokio::time::timeout(
        Duration::from_secs(5),
        serve(transport.clone(), router, tokio::time::sleep(Duration::from_millis(50))),
    )
    .await
    .expect("serve stops");

    let sent = transport.sent();
    assert!(sent.contains(&Sent::Ack(ChatId(1))));
    assert!(sent
        .iter()
        .any(|s| matches!(s, Sent::Screen(ChatId(1), body) if body.contains("Teriyaki"))));
}

#[tokio::test]
async fn shutdown_aborts_replies_after_grace_period() {
    let router = router_over(Arc::new(SlowCatalog {
        delay: Duration::from_secs(3600),
    }))
    .await;
    tokio::time::pause();
    let transport = Arc::new(FakeTransport::default());
    transport.queue(Ok(vec![button_press(1, "view-recipe:52772")]));

    let started = tokio::time::Instant::now();
    serve(transport.clone(), router, tokio::time::sleep(Duration::from_millis(50))).await;

    assert!(started.elapsed() >= SHUTDOWN_GRACE);
    assert!(started.elapsed() < Duration::from_secs(3600));
    assert!(transport.sent().is_empty());
}
