mod common;

use std::{sync::Arc, time::Duration};

use pairchat::{
    contacts::add_contact,
    error::ChatError,
    mirror::{self, ContactsOf, RoomMessages, Subscription},
    model::{RoomId, MAX_MESSAGE_CHARS},
    rooms::{mark_visible_as_read, resolve_room_id, send_message, DispatchMode, ReceiptOutcome, ViewableItem},
    store::{DocumentStore, Store},
};
use tokio::time::timeout;

use common::{seed_users, sqlite, FlakyStore};

async fn alice_and_bob(store: &dyn DocumentStore) -> RoomId {
    let users = seed_users(store, &[("alice", "Alice"), ("bob", "Bob")]).await;
    add_contact(store, &users[0], &users[1]).await.unwrap();
    resolve_room_id("alice", "bob").unwrap()
}

async fn next<T>(subscription: &mut Subscription<T>) -> Vec<T> {
    timeout(Duration::from_secs(5), subscription.next())
        .await
        .expect("no snapshot in time")
        .expect("subscription ended")
        .expect("snapshot read failed")
}

#[test]
fn alice_and_bob_share_one_room() {
    assert_eq!(resolve_room_id("alice", "bob").unwrap().as_str(), "alice_bob");
    assert_eq!(resolve_room_id("bob", "alice").unwrap().as_str(), "alice_bob");
}

#[tokio::test]
async fn each_send_appends_one_unread_message() {
    let store = sqlite().await;
    let room = alice_and_bob(&store).await;

    let mut previous = None;
    for (i, text) in ["hi bob", "  are you there?  ", "ok"].into_iter().enumerate() {
        let sent = send_message(&store, DispatchMode::BestEffort, &room, "alice", "bob", text)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(sent.text, text.trim());
        assert!(!sent.read);
        if let Some(previous) = previous {
            assert!(sent.sent_at > previous);
        }
        previous = Some(sent.sent_at);

        assert_eq!(store.list_messages(&room).await.unwrap().len(), i + 1);
    }

    let bobs_view = store.get_contact("bob", "alice").await.unwrap().unwrap();
    assert_eq!(bobs_view.last_message, "ok");
    assert_eq!(bobs_view.last_message_sender.as_deref(), Some("alice"));
    assert!(!bobs_view.last_message_read);
    let alices_view = store.get_contact("alice", "bob").await.unwrap().unwrap();
    assert_eq!(alices_view.last_message, "ok");
}

#[tokio::test]
async fn blank_text_writes_nothing() {
    let store = FlakyStore::new(sqlite().await);
    let room = alice_and_bob(&store).await;
    let before = store.writes();

    for text in ["", "   ", "\n\t"] {
        for mode in [DispatchMode::BestEffort, DispatchMode::Atomic] {
            let sent = send_message(&store, mode, &room, "alice", "bob", text).await.unwrap();
            assert!(sent.is_none());
        }
    }

    assert_eq!(store.writes(), before);
    assert!(store.list_messages(&room).await.unwrap().is_empty());
}

#[tokio::test]
async fn overlong_text_is_refused_before_any_write() {
    let store = FlakyStore::new(sqlite().await);
    let room = alice_and_bob(&store).await;
    let before = store.writes();

    let longest = "é".repeat(MAX_MESSAGE_CHARS);
    for mode in [DispatchMode::BestEffort, DispatchMode::Atomic] {
        let result = send_message(&store, mode, &room, "alice", "bob", &format!("{longest}!")).await;
        assert!(matches!(result, Err(ChatError::InvalidArgument(_))), "{mode:?}");
    }
    assert_eq!(store.writes(), before);

    // the limit counts characters, and surrounding blanks do not count
    let sent = send_message(&store, DispatchMode::BestEffort, &room, "alice", "bob", &format!("  {longest}  "))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(sent.text, longest);
}

// "ghost" has no user document, so bob's summary of ghost cannot be created.
#[tokio::test]
async fn best_effort_keeps_committed_writes_when_a_sibling_fails() {
    let store = sqlite().await;
    seed_users(&store, &[("bob", "Bob")]).await;
    let room = resolve_room_id("ghost", "bob").unwrap();

    let result = send_message(&store, DispatchMode::BestEffort, &room, "ghost", "bob", "boo").await;
    assert!(result.is_err());

    assert_eq!(store.list_messages(&room).await.unwrap().len(), 1);
    assert!(store.get_contact("ghost", "bob").await.unwrap().is_some());
    assert!(store.get_contact("bob", "ghost").await.unwrap().is_none());
}

#[tokio::test]
async fn atomic_dispatch_commits_all_or_nothing() {
    let store = sqlite().await;
    seed_users(&store, &[("bob", "Bob")]).await;
    let room = resolve_room_id("ghost", "bob").unwrap();

    let result = send_message(&store, DispatchMode::Atomic, &room, "ghost", "bob", "boo").await;
    assert!(result.is_err());

    assert!(store.list_messages(&room).await.unwrap().is_empty());
    assert!(store.get_contact("ghost", "bob").await.unwrap().is_none());
    assert!(store.get_contact("bob", "ghost").await.unwrap().is_none());

    let room = alice_and_bob(&store).await;
    let sent = send_message(&store, DispatchMode::Atomic, &room, "alice", "bob", "all in")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(store.list_messages(&room).await.unwrap(), [sent]);
    assert_eq!(store.get_contact("bob", "alice").await.unwrap().unwrap().last_message, "all in");
}

#[tokio::test]
async fn visible_messages_from_the_other_side_are_marked_read() {
    let store = FlakyStore::new(sqlite().await);
    let room = alice_and_bob(&store).await;

    for text in ["one", "two"] {
        send_message(&store, DispatchMode::BestEffort, &room, "bob", "alice", text).await.unwrap();
    }
    send_message(&store, DispatchMode::BestEffort, &room, "alice", "bob", "mine").await.unwrap();
    send_message(&store, DispatchMode::BestEffort, &room, "bob", "alice", "scrolled away").await.unwrap();

    let snapshot = store.list_messages(&room).await.unwrap();
    let items: Vec<ViewableItem> = snapshot
        .iter()
        .map(|message| ViewableItem {
            message: message.clone(),
            visible_percent: if message.text == "scrolled away" { 49 } else { 80 },
        })
        // the same message reported twice still counts once
        .chain(snapshot.iter().filter(|m| m.text == "one").map(|m| ViewableItem {
            message: m.clone(),
            visible_percent: 100,
        }))
        .collect();

    let outcome = mark_visible_as_read(&store, "alice", "bob", &room, &items).await;
    assert_eq!(outcome.batched, 2);
    assert_eq!(outcome.flipped, 2);
    assert_eq!(outcome.summaries_marked, 2);

    for message in store.list_messages(&room).await.unwrap() {
        let expect_read = message.text == "one" || message.text == "two";
        assert_eq!(message.read, expect_read, "{}", message.text);
    }
    assert!(store.get_contact("alice", "bob").await.unwrap().unwrap().last_message_read);
    assert!(store.get_contact("bob", "alice").await.unwrap().unwrap().last_message_read);
}

#[tokio::test]
async fn read_receipts_are_idempotent() {
    let store = FlakyStore::new(sqlite().await);
    let room = alice_and_bob(&store).await;
    send_message(&store, DispatchMode::BestEffort, &room, "bob", "alice", "hello").await.unwrap();

    let visible = |snapshot: Vec<_>| -> Vec<ViewableItem> {
        snapshot
            .into_iter()
            .map(|message| ViewableItem { message, visible_percent: 100 })
            .collect()
    };

    let first = visible(store.list_messages(&room).await.unwrap());
    mark_visible_as_read(&store, "alice", "bob", &room, &first).await;
    let writes = store.writes();

    let again = visible(store.list_messages(&room).await.unwrap());
    let outcome = mark_visible_as_read(&store, "alice", "bob", &room, &again).await;
    assert_eq!(outcome, ReceiptOutcome::default());
    assert_eq!(store.writes(), writes);

    // a stale snapshot still claiming unread flips nothing
    let outcome = mark_visible_as_read(&store, "alice", "bob", &room, &first).await;
    assert_eq!(outcome.flipped, 0);
}

#[tokio::test]
async fn room_mirror_delivers_full_snapshots() {
    let sqlite = sqlite().await;
    let room = alice_and_bob(&sqlite).await;
    let store: Store = Arc::new(sqlite);

    let mut subscription = mirror::subscribe(store.clone(), RoomMessages(room.clone()));

    let initial = next(&mut subscription).await;
    assert!(initial.is_empty());

    send_message(store.as_ref(), DispatchMode::Atomic, &room, "alice", "bob", "first").await.unwrap();
    let snapshot = next(&mut subscription).await;
    assert_eq!(snapshot.len(), 1);

    send_message(store.as_ref(), DispatchMode::Atomic, &room, "bob", "alice", "second").await.unwrap();
    let snapshot = next(&mut subscription).await;
    let texts: Vec<_> = snapshot.iter().map(|m| m.text.as_str()).collect();
    assert_eq!(texts, ["second", "first"]);
}

#[tokio::test]
async fn contacts_mirror_ignores_other_owners() {
    let sqlite = sqlite().await;
    let users = seed_users(&sqlite, &[("alice", "Alice"), ("bob", "Bob"), ("carol", "Carol"), ("dave", "Dave")]).await;
    let store: Store = Arc::new(sqlite);

    let mut subscription = mirror::subscribe(store.clone(), ContactsOf("alice".to_owned()));
    let initial = next(&mut subscription).await;
    assert!(initial.is_empty());

    add_contact(store.as_ref(), &users[2], &users[3]).await.unwrap();
    add_contact(store.as_ref(), &users[0], &users[1]).await.unwrap();

    let snapshot = next(&mut subscription).await;
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].uid, "bob");
}

#[tokio::test]
async fn cancelled_subscription_stops_listening() {
    let store: Store = Arc::new(sqlite().await);

    let subscription = mirror::subscribe(store.clone(), ContactsOf("alice".to_owned()));
    assert!(subscription.is_active());
    assert!(Arc::strong_count(&store) > 1);

    subscription.cancel();
    for _ in 0..100 {
        if Arc::strong_count(&store) == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(Arc::strong_count(&store), 1);
}
