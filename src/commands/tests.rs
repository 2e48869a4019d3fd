//! Gateway Tests
//!
//! Commands over an in-memory SQLite row store wrapped in a recorder.

use std::sync::Arc;

use super::*;
use crate::domain::{BoardPatch, CardPatch, DomainError, Table};
use crate::repository::recording::{Op, RecordingStore};
use crate::repository::{FsBlobStore, Query, RowStore, SqliteRowStore};

fn recorder() -> Arc<RecordingStore> {
    let inner = SqliteRowStore::open_in_memory().expect("Failed to open test DB");
    Arc::new(RecordingStore::new(Arc::new(inner)))
}

#[tokio::test]
async fn test_board_round_trip() {
    let rows = recorder();
    let boards = BoardCommands::new(rows.clone(), 255);

    let created = boards.create("  Roadmap ", "u1").await.unwrap();
    assert!(!created.id.is_empty());
    assert_eq!(created.title, "Roadmap");

    let fetched = boards.fetch_all("u1").await.unwrap();
    assert_eq!(fetched.len(), 1);
    assert_eq!(fetched[0].title, "Roadmap");
    assert_eq!(fetched[0].owner, "u1");
    assert!(boards.fetch_all("u2").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_invalid_title_never_reaches_backend() {
    let rows = recorder();
    let boards = BoardCommands::new(rows.clone(), 10);

    assert!(matches!(boards.create("   ", "u1").await, Err(DomainError::InvalidInput(_))));
    assert!(matches!(
        boards.create("far too long a title", "u1").await,
        Err(DomainError::InvalidInput(_))
    ));
    assert!(rows.calls().is_empty());
    assert!(matches!(boards.status().error, Some(DomainError::InvalidInput(_))));
    assert!(!boards.status().loading);
}

#[tokio::test]
async fn test_status_clears_after_success() {
    let rows = recorder();
    let boards = BoardCommands::new(rows.clone(), 255);

    rows.fail_next(DomainError::Backend("connection reset".into()));
    let err = boards.fetch_all("u1").await.unwrap_err();
    assert_eq!(err, DomainError::Backend("connection reset".into()));
    assert_eq!(boards.status().error, Some(err));

    boards.fetch_all("u1").await.unwrap();
    assert_eq!(boards.status(), GatewayStatus::default());
}

#[tokio::test]
async fn test_board_update_is_owner_guarded() {
    let rows = recorder();
    let boards = BoardCommands::new(rows.clone(), 255);
    let board = boards.create("Mine", "u1").await.unwrap();

    // Another user's guard matches no row
    boards.update(&board.id, BoardPatch::title("Stolen"), "u2").await.unwrap();
    boards.update(&board.id, BoardPatch::favorite(true), "u1").await.unwrap();

    let fetched = boards.fetch_all("u1").await.unwrap();
    assert_eq!(fetched[0].title, "Mine");
    assert!(fetched[0].is_favorite());
    assert!(matches!(
        boards.update(&board.id, BoardPatch::default(), "u1").await,
        Err(DomainError::InvalidInput(_))
    ));
}

#[tokio::test]
async fn test_board_delete_cascades_in_order() {
    let rows = recorder();
    let boards = BoardCommands::new(rows.clone(), 255);
    let lists = ListCommands::new(rows.clone(), 255);
    let cards = CardCommands::new(rows.clone(), 255);
    let comments = CommentCommands::new(rows.clone());

    let board = boards.create("Work", "u1").await.unwrap();
    let todo = lists.create("Todo", &board.id, 0).await.unwrap();
    let card = cards.create("Write docs", &todo.id, 0, None).await.unwrap();
    comments.add(&card.id, "u1", "first").await.unwrap();
    rows.clear();

    // Someone else's board matches nothing and deletes nothing
    boards.delete(&board.id, "u2").await.unwrap();
    assert!(rows.calls_of(Op::Delete).is_empty());
    assert_eq!(boards.fetch_all("u1").await.unwrap().len(), 1);
    boards.delete(&board.id, "u1").await.unwrap();

    let deleted: Vec<Table> = rows.calls_of(Op::Delete).iter().map(|c| c.table).collect();
    assert_eq!(deleted, vec![Table::Comments, Table::Cards, Table::Lists, Table::Boards]);
    for table in [Table::Boards, Table::Lists, Table::Cards, Table::Comments] {
        assert!(rows.select(table, &Query::new()).await.unwrap().is_empty());
    }
}

#[tokio::test]
async fn test_lists_fetch_in_position_order() {
    let rows = recorder();
    let board = BoardCommands::new(rows.clone(), 255).create("B", "u1").await.unwrap();
    let lists = ListCommands::new(rows.clone(), 255);

    lists.create("Done", &board.id, 2).await.unwrap();
    lists.create("Todo", &board.id, 0).await.unwrap();
    lists.create("Doing", &board.id, 1).await.unwrap();

    let titles: Vec<String> = lists
        .fetch_all(&board.id)
        .await
        .unwrap()
        .into_iter()
        .map(|l| l.title)
        .collect();
    assert_eq!(titles, vec!["Todo", "Doing", "Done"]);
}

#[tokio::test]
async fn test_cards_fetch_without_lists_skips_backend() {
    let rows = recorder();
    let cards = CardCommands::new(rows.clone(), 255);
    assert!(cards.fetch_all(&[]).await.unwrap().is_empty());
    assert!(rows.calls().is_empty());
}

#[tokio::test]
async fn test_card_update_needs_scope() {
    let rows = recorder();
    let board = BoardCommands::new(rows.clone(), 255).create("B", "u1").await.unwrap();
    let lists = ListCommands::new(rows.clone(), 255);
    let l1 = lists.create("One", &board.id, 0).await.unwrap();
    let l2 = lists.create("Two", &board.id, 1).await.unwrap();
    let cards = CardCommands::new(rows.clone(), 255);
    let card = cards.create("Task", &l1.id, 0, Some("notes".into())).await.unwrap();

    assert!(matches!(
        cards.update(&card.id, CardPatch::title("x"), &[]).await,
        Err(DomainError::InvalidInput(_))
    ));

    // Out-of-scope guard leaves the row alone
    cards
        .update(&card.id, CardPatch::moved(l2.id.clone(), 3), &[l2.id.clone()])
        .await
        .unwrap();
    let unchanged = cards.fetch_one(&card.id).await.unwrap().unwrap();
    assert_eq!(unchanged.list_id, l1.id);

    let scope = vec![l1.id.clone(), l2.id.clone()];
    cards
        .update(&card.id, CardPatch::moved(l2.id.clone(), 3), &scope)
        .await
        .unwrap();
    let moved = cards.fetch_one(&card.id).await.unwrap().unwrap();
    assert_eq!((moved.list_id.as_str(), moved.position), (l2.id.as_str(), 3));
    assert_eq!(moved.description.as_deref(), Some("notes"));
}

#[tokio::test]
async fn test_card_details_round_trip() {
    let rows = recorder();
    let board = BoardCommands::new(rows.clone(), 255).create("B", "u1").await.unwrap();
    let list = ListCommands::new(rows.clone(), 255).create("L", &board.id, 0).await.unwrap();
    let cards = CardCommands::new(rows.clone(), 255);
    let card = cards.create("Task", &list.id, 0, None).await.unwrap();

    let scope = vec![list.id.clone()];
    cards
        .update(
            &card.id,
            CardPatch::details("Spec it out", vec!["u1/notes.pdf".into()]),
            &scope,
        )
        .await
        .unwrap();
    let fetched = cards.fetch_one(&card.id).await.unwrap().unwrap();
    assert_eq!(fetched.description.as_deref(), Some("Spec it out"));
    assert_eq!(fetched.attachments, Some(vec!["u1/notes.pdf".to_string()]));
    assert!(cards.fetch_one("missing").await.unwrap().is_none());
}

#[tokio::test]
async fn test_comments_oldest_first() {
    let rows = recorder();
    let board = BoardCommands::new(rows.clone(), 255).create("B", "u1").await.unwrap();
    let list = ListCommands::new(rows.clone(), 255).create("L", &board.id, 0).await.unwrap();
    let card = CardCommands::new(rows.clone(), 255)
        .create("Task", &list.id, 0, None)
        .await
        .unwrap();
    let comments = CommentCommands::new(rows.clone());

    comments.add(&card.id, "u1", "first").await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    comments.add(&card.id, "u2", "second").await.unwrap();
    assert!(matches!(comments.add(&card.id, "u1", "  ").await, Err(DomainError::InvalidInput(_))));

    let fetched = comments.fetch_for_card(&card.id).await.unwrap();
    let texts: Vec<&str> = fetched.iter().map(|c| c.text.as_str()).collect();
    assert_eq!(texts, vec!["first", "second"]);
    assert_eq!(fetched[1].author, "u2");
    assert!(fetched[0].created_at.is_some());
}

#[tokio::test]
async fn test_list_delete_removes_cards() {
    let rows = recorder();
    let board = BoardCommands::new(rows.clone(), 255).create("B", "u1").await.unwrap();
    let lists = ListCommands::new(rows.clone(), 255);
    let list = lists.create("L", &board.id, 0).await.unwrap();
    let cards = CardCommands::new(rows.clone(), 255);
    cards.create("A", &list.id, 0, None).await.unwrap();

    lists.delete(&list.id, "other").await.unwrap();
    assert_eq!(lists.fetch_all(&board.id).await.unwrap().len(), 1);
    lists.delete(&list.id, &board.id).await.unwrap();
    assert!(lists.fetch_all(&board.id).await.unwrap().is_empty());
    assert!(rows.select(Table::Cards, &Query::new()).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_delete_of_missing_rows_succeeds() {
    let rows = recorder();
    let board = BoardCommands::new(rows.clone(), 255).create("B", "u1").await.unwrap();
    let list = ListCommands::new(rows.clone(), 255).create("L", &board.id, 0).await.unwrap();
    let boards = BoardCommands::new(rows.clone(), 255);
    let lists = ListCommands::new(rows.clone(), 255);
    let cards = CardCommands::new(rows.clone(), 255);
    rows.clear();

    boards.delete("gone", "u1").await.unwrap();
    lists.delete("gone", &board.id).await.unwrap();
    cards.delete("gone", &[list.id.clone()]).await.unwrap();
    assert!(rows.calls_of(Op::Delete).is_empty());
    assert_eq!(boards.status(), GatewayStatus::default());
}

#[test]
fn test_avatar_path() {
    assert_eq!(avatar_path("u1", "Me.PNG").unwrap(), "u1/avatar.png");
    assert!(avatar_path("u1", "noext").is_err());
    assert!(avatar_path("", "a.png").is_err());
}

#[tokio::test]
async fn test_avatar_upload_replaces() {
    let dir = tempfile::tempdir().unwrap();
    let avatars = AvatarCommands::new(Arc::new(FsBlobStore::new(dir.path())), "avatars");

    let key = avatars.upload("u1", "me.jpg", vec![1]).await.unwrap();
    assert_eq!(key, "avatars/u1/avatar.jpg");
    avatars.upload("u1", "other.jpg", vec![2]).await.unwrap();
    assert_eq!(std::fs::read(dir.path().join("avatars/u1/avatar.jpg")).unwrap(), vec![2]);
    assert!(avatars.upload("u1", "me.jpg", vec![]).await.is_err());
}
