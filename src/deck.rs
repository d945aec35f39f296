//! Deck and flashcard persistence.
//!
//! [`DeckStore`] is the narrow storage interface the import flow needs.
//! Every operation is scoped by an opaque `user_id`; a deck that belongs to
//! someone else is reported exactly like a missing one
//! ([`FlashcardError::DeckNotFound`]).
//!
//! Two implementations share the same record logic ([`DeckData`]):
//!
//! * [`MemoryDeckStore`]: process-local, for tests and embedding.
//! * [`JsonFileDeckStore`]: the whole store as one JSON file, rewritten
//!   atomically after every mutation. Used by the `doc2cards` CLI.

use crate::convert::write_atomic;
use crate::error::FlashcardError;
use crate::output::Flashcard;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

// ============================================================================
// Records
// ============================================================================

/// A named collection of flashcards owned by one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deck {
    pub id: Uuid,
    pub user_id: String,
    pub name: String,
    pub category: Option<String>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields for a deck about to be created.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDeck {
    pub name: String,
    pub category: Option<String>,
    pub description: Option<String>,
}

impl NewDeck {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// Partial update; `None` leaves the field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeckUpdate {
    pub name: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
}

impl DeckUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.category.is_none() && self.description.is_none()
    }
}

/// A flashcard persisted in a deck.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredFlashcard {
    pub id: Uuid,
    pub deck_id: Uuid,
    pub question: String,
    pub answer: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ============================================================================
// DeckStore trait
// ============================================================================

/// Storage for decks and their flashcards.
#[async_trait]
pub trait DeckStore: Send + Sync {
    async fn create_deck(&self, user_id: &str, deck: NewDeck) -> Result<Deck, FlashcardError>;

    /// Fetch one deck owned by `user_id`.
    async fn get_deck(&self, user_id: &str, deck_id: Uuid) -> Result<Deck, FlashcardError>;

    /// All decks owned by `user_id`, oldest first.
    async fn list_decks(&self, user_id: &str) -> Result<Vec<Deck>, FlashcardError>;

    /// Apply the provided fields and bump `updated_at`.
    async fn update_deck(
        &self,
        user_id: &str,
        deck_id: Uuid,
        update: DeckUpdate,
    ) -> Result<Deck, FlashcardError>;

    /// Delete a deck together with its flashcards.
    async fn delete_deck(&self, user_id: &str, deck_id: Uuid) -> Result<(), FlashcardError>;

    /// Flashcards of one deck in insertion order.
    async fn list_flashcards(
        &self,
        user_id: &str,
        deck_id: Uuid,
    ) -> Result<Vec<StoredFlashcard>, FlashcardError>;

    /// Append `cards` to a deck, preserving their order.
    async fn insert_flashcards(
        &self,
        user_id: &str,
        deck_id: Uuid,
        cards: Vec<Flashcard>,
    ) -> Result<Vec<StoredFlashcard>, FlashcardError>;
}

// ============================================================================
// Shared record logic
// ============================================================================

/// Complete store contents. This is also the on-disk JSON layout of
/// [`JsonFileDeckStore`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeckData {
    pub decks: Vec<Deck>,
    pub flashcards: Vec<StoredFlashcard>,
}

fn not_found(deck_id: Uuid) -> FlashcardError {
    FlashcardError::DeckNotFound {
        deck_id: deck_id.to_string(),
    }
}

impl DeckData {
    fn owned_mut(&mut self, user_id: &str, deck_id: Uuid) -> Result<&mut Deck, FlashcardError> {
        self.decks
            .iter_mut()
            .find(|d| d.id == deck_id && d.user_id == user_id)
            .ok_or_else(|| not_found(deck_id))
    }

    fn owned(&self, user_id: &str, deck_id: Uuid) -> Result<&Deck, FlashcardError> {
        self.decks
            .iter()
            .find(|d| d.id == deck_id && d.user_id == user_id)
            .ok_or_else(|| not_found(deck_id))
    }

    fn create_deck(&mut self, user_id: &str, new: NewDeck) -> Result<Deck, FlashcardError> {
        if new.name.trim().is_empty() {
            return Err(FlashcardError::InvalidDeck(
                "deck name must not be empty".into(),
            ));
        }
        let now = Utc::now();
        let deck = Deck {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            name: new.name,
            category: new.category,
            description: new.description,
            created_at: now,
            updated_at: now,
        };
        self.decks.push(deck.clone());
        Ok(deck)
    }

    fn list_decks(&self, user_id: &str) -> Vec<Deck> {
        self.decks
            .iter()
            .filter(|d| d.user_id == user_id)
            .cloned()
            .collect()
    }

    fn update_deck(
        &mut self,
        user_id: &str,
        deck_id: Uuid,
        update: DeckUpdate,
    ) -> Result<Deck, FlashcardError> {
        if matches!(&update.name, Some(n) if n.trim().is_empty()) {
            return Err(FlashcardError::InvalidDeck(
                "deck name must not be empty".into(),
            ));
        }
        let deck = self.owned_mut(user_id, deck_id)?;
        if let Some(name) = update.name {
            deck.name = name;
        }
        if let Some(category) = update.category {
            deck.category = Some(category);
        }
        if let Some(description) = update.description {
            deck.description = Some(description);
        }
        deck.updated_at = Utc::now();
        Ok(deck.clone())
    }

    fn delete_deck(&mut self, user_id: &str, deck_id: Uuid) -> Result<usize, FlashcardError> {
        self.owned(user_id, deck_id)?;
        self.decks.retain(|d| d.id != deck_id);
        let before = self.flashcards.len();
        self.flashcards.retain(|c| c.deck_id != deck_id);
        Ok(before - self.flashcards.len())
    }

    fn list_flashcards(
        &self,
        user_id: &str,
        deck_id: Uuid,
    ) -> Result<Vec<StoredFlashcard>, FlashcardError> {
        self.owned(user_id, deck_id)?;
        Ok(self
            .flashcards
            .iter()
            .filter(|c| c.deck_id == deck_id)
            .cloned()
            .collect())
    }

    fn insert_flashcards(
        &mut self,
        user_id: &str,
        deck_id: Uuid,
        cards: Vec<Flashcard>,
    ) -> Result<Vec<StoredFlashcard>, FlashcardError> {
        self.owned(user_id, deck_id)?;
        let now = Utc::now();
        let stored: Vec<StoredFlashcard> = cards
            .into_iter()
            .map(|card| StoredFlashcard {
                id: Uuid::new_v4(),
                deck_id,
                question: card.question,
                answer: card.answer,
                created_at: now,
                updated_at: now,
            })
            .collect();
        self.flashcards.extend(stored.iter().cloned());
        Ok(stored)
    }
}

// ============================================================================
// In-memory store
// ============================================================================

/// Process-local [`DeckStore`].
#[derive(Debug, Default)]
pub struct MemoryDeckStore {
    data: RwLock<DeckData>,
}

impl MemoryDeckStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read<T>(&self, f: impl FnOnce(&DeckData) -> Result<T, FlashcardError>) -> Result<T, FlashcardError> {
        let data = self
            .data
            .read()
            .map_err(|_| FlashcardError::Storage("deck store lock poisoned".into()))?;
        f(&data)
    }

    fn write<T>(
        &self,
        f: impl FnOnce(&mut DeckData) -> Result<T, FlashcardError>,
    ) -> Result<T, FlashcardError> {
        let mut data = self
            .data
            .write()
            .map_err(|_| FlashcardError::Storage("deck store lock poisoned".into()))?;
        f(&mut data)
    }
}

#[async_trait]
impl DeckStore for MemoryDeckStore {
    async fn create_deck(&self, user_id: &str, deck: NewDeck) -> Result<Deck, FlashcardError> {
        self.write(|d| d.create_deck(user_id, deck))
    }

    async fn get_deck(&self, user_id: &str, deck_id: Uuid) -> Result<Deck, FlashcardError> {
        self.read(|d| d.owned(user_id, deck_id).cloned())
    }

    async fn list_decks(&self, user_id: &str) -> Result<Vec<Deck>, FlashcardError> {
        self.read(|d| Ok(d.list_decks(user_id)))
    }

    async fn update_deck(
        &self,
        user_id: &str,
        deck_id: Uuid,
        update: DeckUpdate,
    ) -> Result<Deck, FlashcardError> {
        self.write(|d| d.update_deck(user_id, deck_id, update))
    }

    async fn delete_deck(&self, user_id: &str, deck_id: Uuid) -> Result<(), FlashcardError> {
        self.write(|d| d.delete_deck(user_id, deck_id)).map(|_| ())
    }

    async fn list_flashcards(
        &self,
        user_id: &str,
        deck_id: Uuid,
    ) -> Result<Vec<StoredFlashcard>, FlashcardError> {
        self.read(|d| d.list_flashcards(user_id, deck_id))
    }

    async fn insert_flashcards(
        &self,
        user_id: &str,
        deck_id: Uuid,
        cards: Vec<Flashcard>,
    ) -> Result<Vec<StoredFlashcard>, FlashcardError> {
        self.write(|d| d.insert_flashcards(user_id, deck_id, cards))
    }
}

// ============================================================================
// JSON file store
// ============================================================================

/// [`DeckStore`] backed by a single JSON file.
///
/// A missing file is an empty store. Mutations hold a lock across
/// load → change → save so concurrent callers in one process never lose
/// each other's writes.
#[derive(Debug)]
pub struct JsonFileDeckStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileDeckStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<DeckData, FlashcardError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                FlashcardError::Storage(format!(
                    "'{}' is not a valid deck store: {}",
                    self.path.display(),
                    e
                ))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(DeckData::default()),
            Err(e) => Err(FlashcardError::Storage(format!(
                "cannot read '{}': {}",
                self.path.display(),
                e
            ))),
        }
    }

    async fn save(&self, data: &DeckData) -> Result<(), FlashcardError> {
        let json = serde_json::to_vec_pretty(data)
            .map_err(|e| FlashcardError::Storage(format!("serialisation failed: {}", e)))?;
        write_atomic(&self.path, &json).await?;
        debug!(
            "Saved deck store '{}': {} decks, {} flashcards",
            self.path.display(),
            data.decks.len(),
            data.flashcards.len()
        );
        Ok(())
    }

    async fn read<T>(
        &self,
        f: impl FnOnce(&DeckData) -> Result<T, FlashcardError> + Send,
    ) -> Result<T, FlashcardError> {
        let _guard = self.lock.lock().await;
        let data = self.load().await?;
        f(&data)
    }

    async fn write<T>(
        &self,
        f: impl FnOnce(&mut DeckData) -> Result<T, FlashcardError> + Send,
    ) -> Result<T, FlashcardError> {
        let _guard = self.lock.lock().await;
        let mut data = self.load().await?;
        let out = f(&mut data)?;
        self.save(&data).await?;
        Ok(out)
    }
}

#[async_trait]
impl DeckStore for JsonFileDeckStore {
    async fn create_deck(&self, user_id: &str, deck: NewDeck) -> Result<Deck, FlashcardError> {
        self.write(|d| d.create_deck(user_id, deck)).await
    }

    async fn get_deck(&self, user_id: &str, deck_id: Uuid) -> Result<Deck, FlashcardError> {
        self.read(|d| d.owned(user_id, deck_id).cloned()).await
    }

    async fn list_decks(&self, user_id: &str) -> Result<Vec<Deck>, FlashcardError> {
        self.read(|d| Ok(d.list_decks(user_id))).await
    }

    async fn update_deck(
        &self,
        user_id: &str,
        deck_id: Uuid,
        update: DeckUpdate,
    ) -> Result<Deck, FlashcardError> {
        self.write(|d| d.update_deck(user_id, deck_id, update)).await
    }

    async fn delete_deck(&self, user_id: &str, deck_id: Uuid) -> Result<(), FlashcardError> {
        let removed = self.write(|d| d.delete_deck(user_id, deck_id)).await?;
        debug!("Deleted deck {} and {} flashcards", deck_id, removed);
        Ok(())
    }

    async fn list_flashcards(
        &self,
        user_id: &str,
        deck_id: Uuid,
    ) -> Result<Vec<StoredFlashcard>, FlashcardError> {
        self.read(|d| d.list_flashcards(user_id, deck_id)).await
    }

    async fn insert_flashcards(
        &self,
        user_id: &str,
        deck_id: Uuid,
        cards: Vec<Flashcard>,
    ) -> Result<Vec<StoredFlashcard>, FlashcardError> {
        self.write(|d| d.insert_flashcards(user_id, deck_id, cards))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn decks_are_scoped_by_user() {
        let store = MemoryDeckStore::new();
        let deck = store.create_deck("alice", NewDeck::named("Biology")).await.unwrap();
        store.create_deck("bob", NewDeck::named("History")).await.unwrap();

        let alice = store.list_decks("alice").await.unwrap();
        assert_eq!(alice.len(), 1);
        assert_eq!(alice[0].name, "Biology");

        let err = store.get_deck("bob", deck.id).await.unwrap_err();
        assert!(matches!(err, FlashcardError::DeckNotFound { .. }));
    }

    #[tokio::test]
    async fn update_changes_only_provided_fields() {
        let store = MemoryDeckStore::new();
        let deck = store
            .create_deck(
                "alice",
                NewDeck {
                    name: "Biology".into(),
                    category: Some("science".into()),
                    description: None,
                },
            )
            .await
            .unwrap();

        let updated = store
            .update_deck(
                "alice",
                deck.id,
                DeckUpdate {
                    description: Some("cells".into()),
                    ..DeckUpdate::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.name, "Biology");
        assert_eq!(updated.category.as_deref(), Some("science"));
        assert_eq!(updated.description.as_deref(), Some("cells"));
        assert!(updated.updated_at >= deck.updated_at);
        assert_eq!(updated.created_at, deck.created_at);
    }

    #[tokio::test]
    async fn empty_names_are_rejected() {
        let store = MemoryDeckStore::new();
        let err = store.create_deck("alice", NewDeck::named("  ")).await.unwrap_err();
        assert!(matches!(err, FlashcardError::InvalidDeck(_)), "got {err:?}");

        let deck = store.create_deck("alice", NewDeck::named("Kept")).await.unwrap();
        let rename = DeckUpdate {
            name: Some(String::new()),
            ..DeckUpdate::default()
        };
        let err = store.update_deck("alice", deck.id, rename).await.unwrap_err();
        assert!(matches!(err, FlashcardError::InvalidDeck(_)), "got {err:?}");
        assert_eq!(store.get_deck("alice", deck.id).await.unwrap().name, "Kept");
    }

    #[tokio::test]
    async fn delete_cascades_to_flashcards() {
        let store = MemoryDeckStore::new();
        let keep = store.create_deck("alice", NewDeck::named("Keep")).await.unwrap();
        let gone = store.create_deck("alice", NewDeck::named("Drop")).await.unwrap();
        store
            .insert_flashcards("alice", keep.id, vec![Flashcard::new("Q1", "A1")])
            .await
            .unwrap();
        store
            .insert_flashcards("alice", gone.id, vec![Flashcard::new("Q2", "A2")])
            .await
            .unwrap();

        store.delete_deck("alice", gone.id).await.unwrap();

        assert!(store.get_deck("alice", gone.id).await.is_err());
        let data = store.data.read().unwrap();
        assert_eq!(data.flashcards.len(), 1);
        assert_eq!(data.flashcards[0].deck_id, keep.id);
    }

    #[tokio::test]
    async fn foreign_deck_cannot_be_deleted_or_filled() {
        let store = MemoryDeckStore::new();
        let deck = store.create_deck("alice", NewDeck::named("Mine")).await.unwrap();

        assert!(store.delete_deck("mallory", deck.id).await.is_err());
        assert!(store
            .insert_flashcards("mallory", deck.id, vec![Flashcard::new("Q", "A")])
            .await
            .is_err());
        assert!(store.list_flashcards("alice", deck.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn inserted_cards_keep_order() {
        let store = MemoryDeckStore::new();
        let deck = store.create_deck("alice", NewDeck::named("Deck")).await.unwrap();
        let cards: Vec<Flashcard> = (0..5)
            .map(|i| Flashcard::new(format!("Q{i}"), format!("A{i}")))
            .collect();

        store.insert_flashcards("alice", deck.id, cards).await.unwrap();

        let questions: Vec<String> = store
            .list_flashcards("alice", deck.id)
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.question)
            .collect();
        assert_eq!(questions, vec!["Q0", "Q1", "Q2", "Q3", "Q4"]);
    }

    #[tokio::test]
    async fn json_store_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("decks.json");

        let deck = {
            let store = JsonFileDeckStore::new(&path);
            let deck = store.create_deck("alice", NewDeck::named("Persisted")).await.unwrap();
            store
                .insert_flashcards("alice", deck.id, vec![Flashcard::new("Q", "A")])
                .await
                .unwrap();
            deck
        };

        let reopened = JsonFileDeckStore::new(&path);
        assert_eq!(reopened.list_decks("alice").await.unwrap(), vec![deck.clone()]);
        let cards = reopened.list_flashcards("alice", deck.id).await.unwrap();
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].question, "Q");
    }

    #[tokio::test]
    async fn json_store_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileDeckStore::new(dir.path().join("absent.json"));
        assert!(store.list_decks("alice").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn json_store_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("decks.json");
        std::fs::write(&path, b"not json").unwrap();
        let err = JsonFileDeckStore::new(&path).list_decks("alice").await.unwrap_err();
        assert!(matches!(err, FlashcardError::Storage(_)));
    }
}
